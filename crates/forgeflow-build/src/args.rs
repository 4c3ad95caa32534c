//! コマンドライン引数の合成
//!
//! 正規化済み入力とリポジトリの事実 (public/private、デフォルトコンテキスト)
//! から、`depot build` のフラグ列を決定的な順序で組み立てます。フラグは常に
//! 位置引数 (ビルドコンテキスト) より前。buildx 互換フラグと depot 固有
//! フラグは分けて持ち、フォールバック時は後者を落とします。

use crate::error::BuildResult;
use crate::inputs::{BuildRequest, with_builder_id};
use crate::record;
use crate::secret;
use forgeflow_core::{GithubContext, TempSpace, actions};

/// 合成済みのビルド呼び出し
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// buildx 互換フラグ (セカンダリビルダーもそのまま受け付ける)
    pub buildx_args: Vec<String>,
    /// depot 固有フラグ (フォールバック時は落とす)
    pub depot_args: Vec<String>,
    /// 解決済みビルドコンテキスト (位置引数)
    pub context: String,
}

impl BuildPlan {
    /// `depot build ...` の引数列
    pub fn primary(&self) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        args.extend(self.buildx_args.iter().cloned());
        args.extend(self.depot_args.iter().cloned());
        args.push(self.context.clone());
        args
    }

    /// `docker buildx build ...` の引数列 (depot 固有フラグ抜き)
    pub fn fallback(&self) -> Vec<String> {
        let mut args = vec!["buildx".to_string(), "build".to_string()];
        args.extend(self.buildx_args.iter().cloned());
        args.push(self.context.clone());
        args
    }
}

/// リクエストからビルド計画を合成する
///
/// シークレットの実体化 (一時ファイル書き出し) もここで起きる。個々の
/// シークレットの失敗は警告して omit し、ビルドは続行する。
pub fn plan_build(
    req: &BuildRequest,
    ctx: &GithubContext,
    temp: &TempSpace,
) -> BuildResult<BuildPlan> {
    let default_context = ctx.default_build_context();
    let context = resolve_context(&req.context, &default_context)?;
    let secret_refs = resolve_secrets(req, temp, &context, &default_context);
    Ok(synthesize(req, ctx, temp, context, &secret_refs))
}

/// コンテキスト入力のテンプレート展開
///
/// `{{ defaultContext }}` で計算済みデフォルトコンテキストを参照できる。
pub fn resolve_context(input: &str, default_context: &str) -> BuildResult<String> {
    let mut vars = tera::Context::new();
    vars.insert("defaultContext", default_context);
    Ok(tera::Tera::one_off(input, &vars, false)?)
}

/// シークレット群を実体化して `--secret` 参照文字列の列にする
///
/// 順序は固定: リテラル、ファイル由来、最後に合成 GIT_AUTH_TOKEN。
/// 合成トークンは、github-token が設定され、ユーザー指定に GIT_AUTH_TOKEN が
/// 無く、解決済みコンテキストが呼び出し元リポジトリを指すときだけ加える。
pub fn resolve_secrets(
    req: &BuildRequest,
    temp: &TempSpace,
    resolved_context: &str,
    default_context: &str,
) -> Vec<String> {
    let mut refs = Vec::new();

    for spec in &req.secrets {
        match secret::materialize(spec, false, temp) {
            Ok(reference) => refs.push(reference),
            Err(err) => actions::warning(&err.to_string()),
        }
    }
    for spec in &req.secret_files {
        match secret::materialize(spec, true, temp) {
            Ok(reference) => refs.push(reference),
            Err(err) => actions::warning(&err.to_string()),
        }
    }

    if !req.github_token.is_empty()
        && !secret::has_git_auth_token(&req.secrets)
        && resolved_context.starts_with(default_context)
    {
        let spec = format!("{}={}", secret::GIT_AUTH_TOKEN, req.github_token);
        match secret::materialize(&spec, false, temp) {
            Ok(reference) => refs.push(reference),
            Err(err) => actions::warning(&err.to_string()),
        }
    }

    refs
}

/// フラグ列の純粋な組み立て
///
/// (リクエスト, リポジトリ事実, 一時ファイルパス, 解決済みシークレット) の
/// 関数で、他の入力源は持たない。
pub fn synthesize(
    req: &BuildRequest,
    ctx: &GithubContext,
    temp: &TempSpace,
    context: String,
    secret_refs: &[String],
) -> BuildPlan {
    let mut args = Vec::new();

    push_each(&mut args, "--add-host", &req.add_hosts);
    push_value(&mut args, "--allow", &req.allow.join(","));
    push_each(&mut args, "--attest", &req.attests);
    push_each(&mut args, "--build-arg", &req.build_args);
    push_each(&mut args, "--build-context", &req.build_contexts);
    push_each(&mut args, "--cache-from", &req.cache_from);
    push_each(&mut args, "--cache-to", &req.cache_to);
    push_value(&mut args, "--cgroup-parent", &req.cgroup_parent);
    push_value(&mut args, "--file", &req.file);
    if !is_local_or_tar_output(&req.outputs) {
        push_value(&mut args, "--iidfile", &temp.iidfile().to_string_lossy());
    }
    push_each(&mut args, "--label", &req.labels);
    push_switch(&mut args, "--load", req.load);
    push_value(
        &mut args,
        "--metadata-file",
        &temp.metadata_file().to_string_lossy(),
    );
    push_value(&mut args, "--network", &req.network);
    push_switch(&mut args, "--no-cache", req.no_cache);
    push_each(&mut args, "--no-cache-filter", &req.no_cache_filters);
    push_each(&mut args, "--output", &req.outputs);
    push_value(&mut args, "--platform", &req.platforms.join(","));
    push_switch(&mut args, "--pull", req.pull);
    push_switch(&mut args, "--push", req.push);
    push_value(&mut args, "--shm-size", &req.shm_size);
    push_each(&mut args, "--ssh", &req.ssh);
    push_each(&mut args, "--tag", &req.tags);
    push_value(&mut args, "--target", &req.target);
    push_each(&mut args, "--ulimit", &req.ulimit);
    push_each(&mut args, "--secret", secret_refs);

    if !req.provenance.is_empty() {
        push_value(&mut args, "--provenance", &req.provenance);
    } else if !has_docker_exporter(req) {
        // provenance 未指定で docker exporter も要求されていなければ、
        // リポジトリの公開状態に応じたデフォルト attestation を注入する。
        let default = if ctx.private_repo {
            with_builder_id("mode=min,inline-only=true", ctx)
        } else {
            with_builder_id("mode=max", ctx)
        };
        push_value(&mut args, "--provenance", &default);
    }

    let mut depot_args = Vec::new();
    push_value(&mut depot_args, "--project", &req.project);
    push_value(&mut depot_args, "--build-platform", &req.build_platform);
    push_switch(&mut depot_args, "--lint", req.lint);
    push_value(&mut depot_args, "--lint-fail-on", &req.lint_fail_on);
    push_value(&mut depot_args, "--sbom", &req.sbom);
    push_value(&mut depot_args, "--sbom-dir", &req.sbom_dir);
    push_switch(&mut depot_args, "--save", req.save);
    push_value(&mut depot_args, "--save-tag", &req.save_tag);

    BuildPlan {
        buildx_args: args,
        depot_args,
        context,
    }
}

fn push_value(args: &mut Vec<String>, flag: &str, value: &str) {
    if !value.is_empty() {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

fn push_each(args: &mut Vec<String>, flag: &str, values: &[String]) {
    for value in values {
        push_value(args, flag, value);
    }
}

fn push_switch(args: &mut Vec<String>, flag: &str, enabled: bool) {
    if enabled {
        args.push(flag.to_string());
    }
}

/// output 指定がローカルディレクトリ / tar 書き出しを要求しているか
///
/// `type=` を持たない単一フィールドはローカルディレクトリ出力とみなす。
/// その場合 image ID は生成されないため `--iidfile` を抑止する。
fn is_local_or_tar_output(outputs: &[String]) -> bool {
    for output in outputs {
        let fields = record::split_record(output);
        if fields.len() == 1 && !fields[0].starts_with("type=") {
            return true;
        }
        for field in &fields {
            if let ("type", Some(value)) = record::split_key_value(field)
                && (value == "local" || value == "tar")
            {
                return true;
            }
        }
    }
    false
}

/// docker 互換 exporter (`--load` or `type=docker`) が要求されているか
fn has_docker_exporter(req: &BuildRequest) -> bool {
    req.load || req.outputs.iter().any(|o| o.contains("type=docker"))
}
