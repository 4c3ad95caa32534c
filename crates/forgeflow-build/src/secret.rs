//! ビルドシークレットの実体化
//!
//! `KEY=VALUE` / `KEY=<file>` 形式のシークレット指定を一時ファイルに書き出し、
//! `--secret id=<key>,src=<path>` で参照できる形にします。個々の失敗は
//! 警告止まりで、ビルド全体は止めません (呼び出し側が omit する)。

use crate::error::{BuildError, BuildResult};
use forgeflow_core::TempSpace;
use std::path::Path;

/// 呼び出し元リポジトリ向けに合成する git 認証シークレットのキー
pub const GIT_AUTH_TOKEN: &str = "GIT_AUTH_TOKEN";

/// シークレット指定を一時ファイル化して参照文字列を返す
///
/// `from_file` の場合、value はファイルパスとして読み出す。
pub fn materialize(spec: &str, from_file: bool, temp: &TempSpace) -> BuildResult<String> {
    let (key, value) = spec
        .split_once('=')
        .ok_or_else(|| BuildError::InvalidSecret(key_of(spec)))?;
    if key.is_empty() || value.is_empty() {
        return Err(BuildError::InvalidSecret(key_of(spec)));
    }

    let value = if from_file {
        let path = Path::new(value);
        if !path.exists() {
            return Err(BuildError::SecretFileNotFound(value.to_string()));
        }
        std::fs::read_to_string(path)?
    } else {
        value.to_string()
    };

    let secret_file = temp.random_file()?;
    std::fs::write(&secret_file, value)?;
    Ok(format!("id={},src={}", key, secret_file.display()))
}

/// ユーザー指定シークレットに GIT_AUTH_TOKEN が含まれるか
pub fn has_git_auth_token(secrets: &[String]) -> bool {
    let prefix = format!("{}=", GIT_AUTH_TOKEN);
    secrets.iter().any(|s| s.starts_with(&prefix))
}

// 警告メッセージには key 部分だけを載せる (値をログに出さない)
fn key_of(spec: &str) -> String {
    spec.split('=').next().unwrap_or_default().to_string()
}
