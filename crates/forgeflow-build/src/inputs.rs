//! ステップ入力の正規化
//!
//! 生の文字列入力を型付きの [`BuildRequest`] に落とし込みます。
//! リスト入力は行ごとにクォート対応のカンマ分割、真偽値は YAML 真偽値、
//! context と provenance はここでデフォルトを解決します。

use crate::error::BuildResult;
use crate::record;
use forgeflow_core::{GithubContext, actions};

/// 正規化済み入力。1 ランにつき一度だけ構築し、以後不変。
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub add_hosts: Vec<String>,
    pub allow: Vec<String>,
    pub attests: Vec<String>,
    pub build_args: Vec<String>,
    pub build_contexts: Vec<String>,
    pub build_platform: String,
    pub buildx_fallback: bool,
    pub cache_from: Vec<String>,
    pub cache_to: Vec<String>,
    pub cgroup_parent: String,
    pub context: String,
    pub file: String,
    pub github_token: String,
    pub labels: Vec<String>,
    pub lint: bool,
    pub lint_fail_on: String,
    pub load: bool,
    pub network: String,
    pub no_cache: bool,
    pub no_cache_filters: Vec<String>,
    pub outputs: Vec<String>,
    pub platforms: Vec<String>,
    pub project: String,
    pub provenance: String,
    pub pull: bool,
    pub push: bool,
    pub save: bool,
    pub save_tag: String,
    pub sbom: String,
    pub sbom_dir: String,
    pub secret_files: Vec<String>,
    pub secrets: Vec<String>,
    pub shm_size: String,
    pub ssh: Vec<String>,
    pub tags: Vec<String>,
    pub target: String,
    pub token: Option<String>,
    pub ulimit: Vec<String>,
}

impl BuildRequest {
    /// ステップ入力からリクエストを構築
    pub fn from_action(ctx: &GithubContext) -> BuildResult<Self> {
        Ok(Self {
            add_hosts: list_input("add-hosts", false),
            allow: list_input("allow", false),
            attests: list_input("attests", true),
            build_args: list_input("build-args", true),
            build_contexts: list_input("build-contexts", true),
            build_platform: scalar_input("build-platform"),
            buildx_fallback: actions::get_bool_input("buildx-fallback")?,
            cache_from: list_input("cache-from", true),
            cache_to: list_input("cache-to", true),
            cgroup_parent: scalar_input("cgroup-parent"),
            context: actions::get_input("context")
                .unwrap_or_else(|| ctx.default_build_context()),
            file: scalar_input("file"),
            github_token: scalar_input("github-token"),
            labels: list_input("labels", true),
            lint: actions::get_bool_input("lint")?,
            lint_fail_on: scalar_input("lint-fail-on"),
            load: actions::get_bool_input("load")?,
            network: scalar_input("network"),
            no_cache: actions::get_bool_input("no-cache")?,
            no_cache_filters: list_input("no-cache-filters", true),
            outputs: list_input("outputs", true),
            platforms: list_input("platforms", false),
            project: scalar_input("project"),
            provenance: provenance_input(ctx),
            pull: actions::get_bool_input("pull")?,
            push: actions::get_bool_input("push")?,
            save: actions::get_bool_input("save")?,
            save_tag: scalar_input("save-tag"),
            sbom: scalar_input("sbom"),
            sbom_dir: scalar_input("sbom-dir"),
            secret_files: list_input("secret-files", true),
            secrets: list_input("secrets", true),
            shm_size: scalar_input("shm-size"),
            ssh: list_input("ssh", true),
            tags: list_input("tags", false),
            target: scalar_input("target"),
            token: actions::get_input("token").or_else(|| {
                std::env::var("DEPOT_TOKEN")
                    .ok()
                    .filter(|v| !v.is_empty())
            }),
            ulimit: list_input("ulimit", true),
        })
    }
}

fn scalar_input(name: &str) -> String {
    actions::get_input(name).unwrap_or_default()
}

fn list_input(name: &str, ignore_comma: bool) -> Vec<String> {
    match actions::get_input(name) {
        Some(source) => parse_list(&source, ignore_comma),
        None => Vec::new(),
    }
}

/// 複数行・カンマ区切りのリスト入力を項目列に正規化
///
/// 行ごとに 1 レコード。1 フィールドのレコードはカンマで再分割する
/// (値自体にカンマを含み得るフィールドは `ignore_comma` で行単位を保つ)。
/// 複数フィールドのレコードはフィールドごとに 1 項目。
pub fn parse_list(source: &str, ignore_comma: bool) -> Vec<String> {
    let mut items = Vec::new();

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields = record::split_record(line);
        match fields.len() {
            0 => {}
            1 => {
                if ignore_comma {
                    items.push(fields.into_iter().next().unwrap());
                } else {
                    items.extend(
                        fields[0]
                            .split(',')
                            .map(str::trim)
                            .filter(|i| !i.is_empty())
                            .map(str::to_string),
                    );
                }
            }
            _ => {
                if ignore_comma {
                    items.push(fields.join(","));
                } else {
                    items.extend(fields);
                }
            }
        }
    }

    items
}

/// provenance 入力の解決
///
/// 真偽値 `true` は `builder-id=<run url>`、`false` は文字列 "false"、
/// それ以外は builder-id 属性を補って通す。未指定は空。
fn provenance_input(ctx: &GithubContext) -> String {
    let Some(input) = actions::get_input("provenance") else {
        return String::new();
    };

    match actions::parse_bool(&input) {
        Some(true) => format!("builder-id={}", ctx.run_url()),
        Some(false) => "false".to_string(),
        None => with_builder_id(&input, ctx),
    }
}

/// provenance 属性列に builder-id 属性を補う
///
/// 入力を 1 レコードの `key=value` 属性列として読み、builder-id が
/// 既にあればそのまま、無ければ末尾に追加する。
pub fn with_builder_id(input: &str, ctx: &GithubContext) -> String {
    for field in record::split_record(input) {
        let (key, _) = record::split_key_value(&field);
        if key == "builder-id" {
            return input.to_string();
        }
    }
    format!("{},builder-id={}", input, ctx.run_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_comma_split() {
        assert_eq!(
            parse_list("linux/amd64,linux/arm64", false),
            vec!["linux/amd64", "linux/arm64"]
        );
    }

    #[test]
    fn test_parse_list_multiline() {
        assert_eq!(
            parse_list("FOO=bar\nBAZ=qux", true),
            vec!["FOO=bar", "BAZ=qux"]
        );
    }

    #[test]
    fn test_parse_list_ignore_comma_keeps_row() {
        assert_eq!(
            parse_list("type=registry,ref=user/app:cache", true),
            vec!["type=registry,ref=user/app:cache"]
        );
    }

    #[test]
    fn test_parse_list_quoted_value_with_comma() {
        // クォート内のカンマは値の一部
        assert_eq!(
            parse_list(r#""org.label=a,b",other=c"#, false),
            vec!["org.label=a,b", "other=c"]
        );
    }

    #[test]
    fn test_parse_list_drops_empty() {
        assert_eq!(parse_list("a,\n\n ,b", false), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_list_idempotent_on_single_tokens() {
        let once = parse_list("a,b,c", false);
        let again = parse_list(&once.join("\n"), false);
        assert_eq!(once, again);
    }

    fn ctx() -> GithubContext {
        GithubContext {
            server_url: "https://github.com".to_string(),
            owner: "acme".to_string(),
            repo: "app".to_string(),
            run_id: "99".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_with_builder_id_appends() {
        assert_eq!(
            with_builder_id("mode=max", &ctx()),
            "mode=max,builder-id=https://github.com/acme/app/actions/runs/99"
        );
    }

    #[test]
    fn test_with_builder_id_keeps_existing() {
        let input = "mode=min,builder-id=https://example.com/build/1";
        assert_eq!(with_builder_id(input, &ctx()), input);
    }

    #[test]
    fn test_from_action_defaults() {
        temp_env::with_vars(
            [
                ("INPUT_CONTEXT", None::<&str>),
                ("INPUT_PUSH", Some("true")),
                ("INPUT_TAGS", Some("app:latest,app:v1")),
                ("INPUT_TOKEN", None),
                ("DEPOT_TOKEN", Some("tok_env")),
            ],
            || {
                let ctx = GithubContext {
                    server_url: "https://github.com".to_string(),
                    owner: "acme".to_string(),
                    repo: "app".to_string(),
                    sha: "abc123".to_string(),
                    git_ref: "refs/heads/main".to_string(),
                    ..Default::default()
                };
                let req = BuildRequest::from_action(&ctx).unwrap();
                assert_eq!(req.context, "https://github.com/acme/app.git#abc123");
                assert!(req.push);
                assert!(!req.load);
                assert_eq!(req.tags, vec!["app:latest", "app:v1"]);
                assert_eq!(req.token.as_deref(), Some("tok_env"));
            },
        );
    }

    #[test]
    fn test_provenance_bool_inputs() {
        temp_env::with_var("INPUT_PROVENANCE", Some("true"), || {
            let req = BuildRequest::from_action(&ctx()).unwrap();
            assert_eq!(
                req.provenance,
                "builder-id=https://github.com/acme/app/actions/runs/99"
            );
        });
        temp_env::with_var("INPUT_PROVENANCE", Some("false"), || {
            let req = BuildRequest::from_action(&ctx()).unwrap();
            assert_eq!(req.provenance, "false");
        });
        temp_env::with_var("INPUT_PROVENANCE", Some("mode=min"), || {
            let req = BuildRequest::from_action(&ctx()).unwrap();
            assert_eq!(
                req.provenance,
                "mode=min,builder-id=https://github.com/acme/app/actions/runs/99"
            );
        });
    }
}
