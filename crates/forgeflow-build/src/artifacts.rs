//! ビルド結果の取り出し
//!
//! ビルダーが一時ディレクトリに書き残した iidfile / metadata-file を読み、
//! image ID・メタデータ・digest を取り出します。どれも無ければ無いままで、
//! エラーにはしません (書かれるかどうかはビルド構成次第)。

use forgeflow_core::TempSpace;
use std::path::Path;

const DIGEST_KEY: &str = "containerimage.digest";
const BUILD_IDENTITY_KEY: &str = "depot.build";

/// ビルドの副作用ファイルから取り出した結果
#[derive(Debug, Clone, Default)]
pub struct BuildArtifacts {
    pub image_id: Option<String>,
    pub metadata: Option<String>,
    pub digest: Option<String>,
    pub build_id: Option<String>,
    pub project_id: Option<String>,
}

impl BuildArtifacts {
    /// 一時ディレクトリの既知パスから結果を収集する
    pub fn collect(temp: &TempSpace) -> Self {
        let image_id = read_trimmed(&temp.iidfile());
        // メタデータのリテラル "null" は「値なし」の番兵
        let metadata = read_trimmed(&temp.metadata_file()).filter(|m| m != "null");
        let digest = metadata.as_deref().and_then(extract_digest);
        let (build_id, project_id) = metadata
            .as_deref()
            .map(extract_build_identity)
            .unwrap_or_default();

        Self {
            image_id,
            metadata,
            digest,
            build_id,
            project_id,
        }
    }
}

/// メタデータ JSON から content digest を取り出す
///
/// キーが無い・JSON が壊れている場合は None (エラーにしない)。
pub fn extract_digest(metadata: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(metadata)
        .ok()?
        .get(DIGEST_KEY)?
        .as_str()
        .map(str::to_string)
}

/// メタデータの build identity オブジェクトから build ID / project ID を取り出す
pub fn extract_build_identity(metadata: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(metadata) else {
        return (None, None);
    };
    let Some(build) = value.get(BUILD_IDENTITY_KEY) else {
        return (None, None);
    };
    let field = |name: &str| build.get(name)?.as_str().map(str::to_string);
    (field("buildID"), field("projectID"))
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_digest() {
        assert_eq!(
            extract_digest(r#"{"containerimage.digest":"sha256:abc"}"#).as_deref(),
            Some("sha256:abc")
        );
    }

    #[test]
    fn test_extract_digest_missing_key() {
        assert_eq!(extract_digest(r#"{"other":"x"}"#), None);
    }

    #[test]
    fn test_extract_digest_malformed_json() {
        assert_eq!(extract_digest("{not json"), None);
    }

    #[test]
    fn test_collect_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempSpace::at(dir.path());
        std::fs::write(temp.iidfile(), "sha256:imageid\n").unwrap();
        std::fs::write(
            temp.metadata_file(),
            r#"{"containerimage.digest":"sha256:digest"}"#,
        )
        .unwrap();

        let artifacts = BuildArtifacts::collect(&temp);
        assert_eq!(artifacts.image_id.as_deref(), Some("sha256:imageid"));
        assert_eq!(artifacts.digest.as_deref(), Some("sha256:digest"));
        assert!(artifacts.metadata.is_some());
    }

    #[test]
    fn test_collect_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempSpace::at(dir.path());

        let artifacts = BuildArtifacts::collect(&temp);
        assert!(artifacts.image_id.is_none());
        assert!(artifacts.metadata.is_none());
        assert!(artifacts.digest.is_none());
    }

    #[test]
    fn test_extract_build_identity() {
        let metadata = r#"{"depot.build":{"buildID":"b1","projectID":"p1"}}"#;
        let (build_id, project_id) = extract_build_identity(metadata);
        assert_eq!(build_id.as_deref(), Some("b1"));
        assert_eq!(project_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_extract_build_identity_missing() {
        assert_eq!(
            extract_build_identity(r#"{"containerimage.digest":"sha256:x"}"#),
            (None, None)
        );
    }

    #[test]
    fn test_collect_null_metadata_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempSpace::at(dir.path());
        std::fs::write(temp.metadata_file(), "null\n").unwrap();

        let artifacts = BuildArtifacts::collect(&temp);
        assert!(artifacts.metadata.is_none());
        assert!(artifacts.digest.is_none());
    }
}
