//! Depot authentication via OIDC token exchange
//!
//! Resolves a short-lived bearer token for the build, trying in order:
//! an explicit token input, the GitHub Actions OIDC token exchanged at the
//! first-party endpoint, and (for pull requests from forks of public
//! repositories) the lower-trust public claim flow. Every tier is wrapped
//! in its own error boundary; an empty result means an anonymous build.

use crate::error::{BuildError, BuildResult};
use crate::inputs::BuildRequest;
use forgeflow_core::{GithubContext, actions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const AUDIENCE: &str = "https://depot.dev";
const FIRST_PARTY_EXCHANGE_URL: &str = "https://github.depot.dev/auth/oidc/github-actions";
const PUBLIC_CLAIM_URL: &str = "https://claim.actions-oidc.depot.dev/claim";
const PUBLIC_POLL_INTERVAL: Duration = Duration::from_secs(2);
const PUBLIC_POLL_ATTEMPTS: usize = 30;

/// どの経路でトークンを得たか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    FirstPartyExchange,
    ThirdPartyExchange,
}

/// ビルド 1 回分だけメモリに保持する bearer トークン
///
/// ログ・state には決して書かない。
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve a credential for the build, terminal on the first tier that
/// yields a token. Returns None for an anonymous build.
pub async fn resolve(req: &BuildRequest, ctx: &GithubContext) -> Option<Credential> {
    if let Some(token) = &req.token {
        return Some(Credential {
            token: token.clone(),
            source: CredentialSource::Explicit,
        });
    }

    let oss_pull_request = ctx.is_oss_pull_request();
    let client = reqwest::Client::new();

    match first_party_exchange(&client).await {
        Ok(token) => {
            actions::info("Exchanged GitHub Actions OIDC token for a temporary Depot token");
            return Some(Credential {
                token,
                source: CredentialSource::FirstPartyExchange,
            });
        }
        Err(err) => {
            // fork からの PR は id-token permission を持てないので、
            // 失敗をログに出して contributor を不安にさせない。
            if !oss_pull_request {
                actions::info(&format!(
                    "Unable to exchange GitHub OIDC token for a temporary Depot token: {}",
                    err
                ));
            }
        }
    }

    if oss_pull_request {
        actions::info("Attempting to acquire an open-source pull request OIDC token");
        match public_exchange(&client, ctx).await {
            Ok(token) => {
                actions::info("Using an open-source pull request OIDC token for Depot authentication");
                return Some(Credential {
                    token,
                    source: CredentialSource::ThirdPartyExchange,
                });
            }
            Err(err) => {
                actions::info(&format!(
                    "Unable to exchange open-source pull request OIDC token: {}",
                    err
                ));
            }
        }
    }

    None
}

#[derive(Deserialize)]
struct IdTokenResponse {
    value: String,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    token: &'a str,
}

#[derive(Default, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    token: Option<String>,
}

/// ランナーの OIDC トークンを取得し、first-party エンドポイントで交換する
async fn first_party_exchange(client: &reqwest::Client) -> BuildResult<String> {
    let request_url = std::env::var("ACTIONS_ID_TOKEN_REQUEST_URL").map_err(|_| {
        BuildError::Exchange("id-token permission is not granted to this workflow".to_string())
    })?;
    let request_token = std::env::var("ACTIONS_ID_TOKEN_REQUEST_TOKEN").map_err(|_| {
        BuildError::Exchange("id-token request token is not available".to_string())
    })?;

    let id_token = client
        .get(&request_url)
        .query(&[("audience", AUDIENCE)])
        .bearer_auth(&request_token)
        .send()
        .await?
        .error_for_status()?
        .json::<IdTokenResponse>()
        .await?
        .value;

    let response: ExchangeResponse = client
        .post(FIRST_PARTY_EXCHANGE_URL)
        .json(&ExchangeRequest { token: &id_token })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    match response.token {
        Some(token) if response.ok => Ok(token),
        _ => Err(BuildError::Exchange(
            "authentication endpoint returned no token".to_string(),
        )),
    }
}

#[derive(Serialize)]
struct ClaimRequest<'a> {
    #[serde(rename = "aud")]
    audience: &'a str,
    repo: String,
    #[serde(rename = "runID")]
    run_id: &'a str,
    #[serde(rename = "eventName")]
    event_name: &'a str,
}

#[derive(Deserialize)]
struct ClaimResponse {
    #[serde(rename = "challengeCode")]
    challenge_code: String,
    #[serde(rename = "exchangeURL")]
    exchange_url: String,
}

#[derive(Default, Deserialize)]
struct ClaimTokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// 公開リポジトリ fork PR 向けの低信頼 OIDC claim フロー
///
/// claim を登録するとチャレンジコードと交換 URL が返る。コードをログに
/// 出力してランの所有を証明し、交換 URL をポーリングしてトークンを得る。
async fn public_exchange(client: &reqwest::Client, ctx: &GithubContext) -> BuildResult<String> {
    let claim: ClaimResponse = client
        .post(PUBLIC_CLAIM_URL)
        .json(&ClaimRequest {
            audience: AUDIENCE,
            repo: format!("{}/{}", ctx.owner, ctx.repo),
            run_id: &ctx.run_id,
            event_name: &ctx.event_name,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    // チャレンジコードはランのログに現れることが所有の証明になる
    actions::info(&format!(
        "OIDC claim challenge code: {}",
        claim.challenge_code
    ));

    for _ in 0..PUBLIC_POLL_ATTEMPTS {
        let response = client
            .get(&claim.exchange_url)
            .send()
            .await?
            .error_for_status()?
            .json::<ClaimTokenResponse>()
            .await?;
        if let Some(token) = response.token {
            return Ok(token);
        }
        tokio::time::sleep(PUBLIC_POLL_INTERVAL).await;
    }

    Err(BuildError::Exchange(
        "claim exchange did not issue a token in time".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_token_short_circuits() {
        let req = BuildRequest {
            token: Some("tok_explicit".to_string()),
            ..Default::default()
        };
        let ctx = GithubContext::default();

        let credential = resolve(&req, &ctx).await.unwrap();
        assert_eq!(credential.token, "tok_explicit");
        assert_eq!(credential.source, CredentialSource::Explicit);
    }

    #[tokio::test]
    async fn test_no_token_and_no_runner_oidc_yields_anonymous() {
        // ACTIONS_ID_TOKEN_REQUEST_URL が無ければ first-party は即座に
        // フォールスルーし、fork PR でもないので None になる。
        let req = BuildRequest::default();
        let ctx = GithubContext::default();
        assert!(resolve(&req, &ctx).await.is_none());
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let credential = Credential {
            token: "tok_secret".to_string(),
            source: CredentialSource::Explicit,
        };
        let formatted = format!("{:?}", credential);
        assert!(!formatted.contains("tok_secret"));
        assert!(formatted.contains("<redacted>"));
    }
}
