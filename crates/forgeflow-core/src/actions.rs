//! GitHub Actions ランナーとの入出力
//!
//! ステップ入力は `INPUT_*` 環境変数、出力とフェーズ間 state は
//! `GITHUB_OUTPUT` / `GITHUB_STATE` ファイルへの追記、ログ装飾は
//! workflow command (`::group::` など) で行います。

use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fs::OpenOptions;
use std::io::Write;

/// 入力名を `INPUT_*` 環境変数名に変換
///
/// ランナーの規約に合わせ、スペースのみアンダースコアに置換する
/// (ハイフンはそのまま残る)。
fn input_env_name(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// ステップ入力を取得 (trim 済み、空文字は None)
pub fn get_input(name: &str) -> Option<String> {
    let value = std::env::var(input_env_name(name)).ok()?;
    let value = value.trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}

/// YAML 1.2 core schema の真偽値として解釈
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// 真偽値入力を取得 (未指定は false、解釈不能はエラー)
pub fn get_bool_input(name: &str) -> CoreResult<bool> {
    match get_input(name) {
        None => Ok(false),
        Some(value) => {
            parse_bool(&value).ok_or_else(|| CoreError::InvalidBoolInput(name.to_string()))
        }
    }
}

/// ステップ出力を `GITHUB_OUTPUT` に追記
///
/// 複数行の値を安全に渡すため、ランダムな heredoc デリミタを使う。
/// `GITHUB_OUTPUT` が無い環境 (ローカル実行など) では何もしない。
pub fn set_output(name: &str, value: &str) -> CoreResult<()> {
    append_command_file("GITHUB_OUTPUT", name, value)
}

/// フェーズ間 state を `GITHUB_STATE` に保存
pub fn save_state(name: &str, value: &str) -> CoreResult<()> {
    append_command_file("GITHUB_STATE", name, value)
}

/// 前フェーズで保存された state を取得
pub fn get_state(name: &str) -> Option<String> {
    std::env::var(format!("STATE_{}", name))
        .ok()
        .filter(|v| !v.is_empty())
}

fn append_command_file(env_name: &str, name: &str, value: &str) -> CoreResult<()> {
    let Ok(path) = std::env::var(env_name) else {
        tracing::debug!("{} not set, skipping '{}'", env_name, name);
        return Ok(());
    };

    let delimiter = heredoc_delimiter();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}<<{}", name, delimiter)?;
    writeln!(file, "{}", value)?;
    writeln!(file, "{}", delimiter)?;
    Ok(())
}

fn heredoc_delimiter() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    let suffix: String = bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect();
    format!("ghadelimiter_{}", suffix)
}

/// workflow command のデータ部エスケープ
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// 通常ログ行
pub fn info(message: &str) {
    println!("{}", message);
}

/// 折りたたみグループの開始
pub fn start_group(title: &str) {
    println!("::group::{}", escape_data(title));
}

/// 折りたたみグループの終了
pub fn end_group() {
    println!("::endgroup::");
}

/// 警告アノテーション
pub fn warning(message: &str) {
    println!("::warning::{}", escape_data(message));
}

/// エラーアノテーション
pub fn error(message: &str) {
    println!("::error::{}", escape_data(message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_env_name() {
        assert_eq!(input_env_name("context"), "INPUT_CONTEXT");
        assert_eq!(input_env_name("no-cache"), "INPUT_NO-CACHE");
        assert_eq!(input_env_name("my input"), "INPUT_MY_INPUT");
    }

    #[test]
    fn test_get_input_trims_and_drops_empty() {
        temp_env::with_vars(
            [
                ("INPUT_CONTEXT", Some("  ./app  ")),
                ("INPUT_FILE", Some("   ")),
            ],
            || {
                assert_eq!(get_input("context").as_deref(), Some("./app"));
                assert_eq!(get_input("file"), None);
                assert_eq!(get_input("target"), None);
            },
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("mode=max"), None);
    }

    #[test]
    fn test_get_bool_input() {
        temp_env::with_vars(
            [
                ("INPUT_PUSH", Some("true")),
                ("INPUT_LOAD", Some("banana")),
            ],
            || {
                assert!(get_bool_input("push").unwrap());
                assert!(!get_bool_input("pull").unwrap());
                assert!(get_bool_input("load").is_err());
            },
        );
    }

    #[test]
    fn test_set_output_writes_heredoc() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        temp_env::with_var("GITHUB_OUTPUT", Some(out.to_str().unwrap()), || {
            set_output("digest", "sha256:abc").unwrap();
            set_output("metadata", "{\n  \"a\": 1\n}").unwrap();
        });

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("digest<<ghadelimiter_"));
        assert!(content.contains("sha256:abc\n"));
        assert!(content.contains("metadata<<ghadelimiter_"));
        assert!(content.contains("  \"a\": 1\n"));
    }

    #[test]
    fn test_get_state() {
        temp_env::with_var("STATE_tempDir", Some("/tmp/forgeflow-x"), || {
            assert_eq!(get_state("tempDir").as_deref(), Some("/tmp/forgeflow-x"));
            assert_eq!(get_state("isPost"), None);
        });
    }

    #[test]
    fn test_escape_data() {
        assert_eq!(escape_data("a%b\nc"), "a%25b%0Ac");
    }
}
