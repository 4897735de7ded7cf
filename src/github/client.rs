use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("shipshape/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// Errors from the GitHub REST surface.
#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 401/403 — expired or invalid credential.
    #[error("auth error ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Any other non-2xx response.
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GithubError {
    fn from_status(status: u16, body: String) -> Self {
        if status == 401 || status == 403 {
            Self::Auth {
                status,
                message: body,
            }
        } else {
            Self::Api { status, body }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// Contents API response; `content` is base64 with embedded newlines.
#[derive(Debug, Deserialize)]
pub struct ContentsResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InstallationAccount {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct InstallationDetails {
    pub id: i64,
    pub account: InstallationAccount,
    #[serde(default)]
    pub suspended_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct InstallationRepos {
    repositories: Vec<RepoSummary>,
}

#[derive(Debug, Deserialize)]
struct RepoSummary {
    full_name: String,
}

/// Public key under which repository secrets must be sealed.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoPublicKey {
    pub key_id: String,
    /// Base64-encoded 32-byte X25519 public key.
    pub key: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin wrapper over a shared `reqwest::Client` with the GitHub base URL,
/// required headers, and a bounded per-request timeout baked in.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base: String,
}

impl GithubClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GithubError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }

    async fn json_or_error<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, GithubError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::from_status(status.as_u16(), body));
        }
        resp.json().await.map_err(GithubError::from)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<T, GithubError> {
        let resp = self
            .request(reqwest::Method::GET, path, token)
            .send()
            .await?;
        Self::json_or_error(resp).await
    }

    // -- Operations ---------------------------------------------------------

    /// `GET /repos/{owner}/{repo}/git/trees/{ref}?recursive=1`
    #[tracing::instrument(skip(self, token))]
    pub async fn git_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        token: Option<&str>,
    ) -> Result<TreeResponse, GithubError> {
        self.get_json(
            &format!("/repos/{owner}/{repo}/git/trees/{reference}?recursive=1"),
            token,
        )
        .await
    }

    /// `GET /repos/{owner}/{repo}/contents/{path}?ref={ref}`
    #[tracing::instrument(skip(self, token))]
    pub async fn contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
        token: Option<&str>,
    ) -> Result<ContentsResponse, GithubError> {
        self.get_json(
            &format!("/repos/{owner}/{repo}/contents/{path}?ref={reference}"),
            token,
        )
        .await
    }

    /// `POST /app/installations/{id}/access_tokens` — authenticated with the
    /// App assertion. Any non-2xx is an auth failure by contract.
    #[tracing::instrument(skip(self, assertion), err)]
    pub async fn create_installation_token(
        &self,
        assertion: &str,
        installation_id: i64,
    ) -> Result<InstallationToken, GithubError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/app/installations/{installation_id}/access_tokens"),
                Some(assertion),
            )
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::Auth {
                status: status.as_u16(),
                message: body,
            });
        }
        resp.json().await.map_err(GithubError::from)
    }

    /// `GET /app/installations/{id}` — installation metadata.
    #[tracing::instrument(skip(self, assertion), err)]
    pub async fn installation_details(
        &self,
        assertion: &str,
        installation_id: i64,
    ) -> Result<InstallationDetails, GithubError> {
        self.get_json(&format!("/app/installations/{installation_id}"), Some(assertion))
            .await
    }

    /// `GET /installation/repositories` — repositories visible to an
    /// installation token.
    #[tracing::instrument(skip(self, token), err)]
    pub async fn installation_repositories(
        &self,
        token: &str,
    ) -> Result<Vec<String>, GithubError> {
        let repos: InstallationRepos = self
            .get_json("/installation/repositories", Some(token))
            .await?;
        Ok(repos
            .repositories
            .into_iter()
            .map(|r| r.full_name)
            .collect())
    }

    /// `GET /repos/{owner}/{repo}/actions/secrets/public-key`
    #[tracing::instrument(skip(self, token), err)]
    pub async fn actions_public_key(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<RepoPublicKey, GithubError> {
        self.get_json(
            &format!("/repos/{owner}/{repo}/actions/secrets/public-key"),
            Some(token),
        )
        .await
    }

    /// `PUT /repos/{owner}/{repo}/actions/secrets/{name}` — idempotent upsert
    /// of a sealed secret value. GitHub answers 201 (created) or 204 (updated).
    #[tracing::instrument(skip(self, token, encrypted_value), err)]
    pub async fn put_actions_secret(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<(), GithubError> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/repos/{owner}/{repo}/actions/secrets/{name}"),
                Some(token),
            )
            .json(&serde_json::json!({
                "encrypted_value": encrypted_value,
                "key_id": key_id,
            }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::from_status(status.as_u16(), body));
        }
        Ok(())
    }
}
