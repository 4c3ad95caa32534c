//! GitHub Actions 実行コンテキスト
//!
//! 環境変数とイベント payload (`GITHUB_EVENT_PATH`) から、ビルドに必要な
//! 事実だけを一度抽出して保持します。デフォルトビルドコンテキストや
//! provenance builder-id の URL もここで組み立てます。

use crate::error::{CoreError, CoreResult};
use serde::Deserialize;

const DEFAULT_SERVER_URL: &str = "https://github.com";

/// 1 回のランで不変な GitHub コンテキスト
#[derive(Debug, Clone, Default)]
pub struct GithubContext {
    pub server_url: String,
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    pub sha: String,
    pub run_id: String,
    pub event_name: String,
    /// payload の repository.private (payload が無ければ false)
    pub private_repo: bool,
    /// payload の repository.full_name
    pub repo_full_name: Option<String>,
    /// pull_request イベントかどうか (payload に pull_request があるか)
    pub has_pull_request: bool,
    /// pull_request.head.repo.full_name
    pub head_repo_full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    repository: Option<RepositoryPayload>,
    #[serde(default)]
    pull_request: Option<PullRequestPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryPayload {
    #[serde(default)]
    private: bool,
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PullRequestPayload {
    #[serde(default)]
    head: Option<PullRequestHead>,
}

#[derive(Debug, Default, Deserialize)]
struct PullRequestHead {
    #[serde(default)]
    repo: Option<HeadRepoPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct HeadRepoPayload {
    #[serde(default)]
    full_name: Option<String>,
}

impl GithubContext {
    /// 環境変数とイベント payload からコンテキストを構築
    pub fn from_env() -> CoreResult<Self> {
        let repository = std::env::var("GITHUB_REPOSITORY")
            .map_err(|_| CoreError::MissingEnv("GITHUB_REPOSITORY".to_string()))?;
        let (owner, repo) = repository
            .split_once('/')
            .map(|(o, r)| (o.to_string(), r.to_string()))
            .ok_or_else(|| CoreError::MissingEnv("GITHUB_REPOSITORY".to_string()))?;

        let payload = load_event_payload()?;
        let (private_repo, repo_full_name) = match payload.repository {
            Some(r) => (r.private, r.full_name),
            None => (false, None),
        };
        let head_repo_full_name = payload
            .pull_request
            .as_ref()
            .and_then(|pr| pr.head.as_ref())
            .and_then(|h| h.repo.as_ref())
            .and_then(|r| r.full_name.clone());

        Ok(Self {
            server_url: env_or("GITHUB_SERVER_URL", DEFAULT_SERVER_URL),
            owner,
            repo,
            git_ref: env_or("GITHUB_REF", ""),
            sha: env_or("GITHUB_SHA", ""),
            run_id: env_or("GITHUB_RUN_ID", ""),
            event_name: env_or("GITHUB_EVENT_NAME", ""),
            private_repo,
            repo_full_name,
            has_pull_request: payload.pull_request.is_some(),
            head_repo_full_name,
        })
    }

    /// `<server>/<owner>/<repo>`
    pub fn repo_url(&self) -> String {
        format!("{}/{}/{}", self.server_url, self.owner, self.repo)
    }

    /// provenance builder-id として使うラン URL
    pub fn run_url(&self) -> String {
        format!("{}/actions/runs/{}", self.repo_url(), self.run_id)
    }

    /// ビルドコンテキストに使う ref を解決
    ///
    /// sha がある場合、ブランチ名だけの ref は `refs/heads/` に展開した上で、
    /// pull request ref でなければ sha そのものを優先する。
    pub fn resolved_ref(&self) -> String {
        let mut r = self.git_ref.clone();
        if !self.sha.is_empty() && !r.is_empty() && !r.starts_with("refs/") {
            r = format!("refs/heads/{}", r);
        }
        if !self.sha.is_empty() && !r.starts_with("refs/pull/") {
            r = self.sha.clone();
        }
        r
    }

    /// デフォルトビルドコンテキスト: `<server>/<owner>/<repo>.git#<ref>`
    pub fn default_build_context(&self) -> String {
        format!(
            "{}/{}/{}.git#{}",
            self.server_url,
            self.owner,
            self.repo,
            self.resolved_ref()
        )
    }

    /// 公開リポジトリの fork からの pull request かどうか
    ///
    /// head リポジトリ名が base と異なる (取得できない場合も fork 扱い)。
    pub fn is_oss_pull_request(&self) -> bool {
        self.event_name == "pull_request"
            && !self.private_repo
            && self.has_pull_request
            && self.head_repo_full_name != self.repo_full_name
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn load_event_payload() -> CoreResult<EventPayload> {
    let Ok(path) = std::env::var("GITHUB_EVENT_PATH") else {
        return Ok(EventPayload::default());
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        tracing::debug!("event payload not readable at {}", path);
        return Ok(EventPayload::default());
    };
    Ok(serde_json::from_str(&content)?)
}
