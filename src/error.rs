use crate::github::GithubError;
use crate::provision::ProvisionError;
use crate::scanner::ScanError;
use crate::secrets::SecretError;

/// Crate-level error taxonomy. Domain modules carry their own error enums;
/// this is the surface the service facade and the CLI report against.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Missing or malformed keys/identifiers. Fatal at startup or first use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Expired or invalid upstream credential. Callers may re-mint and retry once.
    #[error("upstream auth error ({status}): {message}")]
    UpstreamAuth { status: u16, message: String },

    /// Non-2xx from GitHub. Surfaced with status and body, not retried here.
    #[error("upstream api error ({status}): {body}")]
    UpstreamApi { status: u16, body: String },

    /// Every branch candidate was exhausted.
    #[error("repository or branch not found: {owner}/{repo}")]
    RepositoryNotFound { owner: String, repo: String },

    /// Corrupted ciphertext or wrong key. Fatal for the affected batch.
    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GithubError> for CoreError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::Configuration(msg) => Self::Configuration(msg),
            GithubError::Auth { status, message } => Self::UpstreamAuth { status, message },
            GithubError::Api { status, body } => Self::UpstreamApi { status, body },
            GithubError::Network(e) => Self::Internal(e.into()),
            GithubError::InvalidResponse(msg) => {
                Self::Internal(anyhow::anyhow!("invalid GitHub response: {msg}"))
            }
        }
    }
}

impl From<ScanError> for CoreError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::InvalidRepoUrl(url) => {
                Self::BadRequest(format!("not a GitHub repository URL: {url}"))
            }
            ScanError::RepositoryNotFound { owner, repo } => {
                Self::RepositoryNotFound { owner, repo }
            }
            ScanError::Github(e) => Self::from(e),
        }
    }
}

impl From<ProvisionError> for CoreError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Configuration(msg) => Self::Configuration(msg),
            ProvisionError::Upstream { synced, source } => match source {
                GithubError::Auth { status, message } => Self::UpstreamAuth {
                    status,
                    message: format!("after {synced} synced secret(s): {message}"),
                },
                GithubError::Api { status, body } => Self::UpstreamApi {
                    status,
                    body: format!("after {synced} synced secret(s): {body}"),
                },
                other => Self::Internal(anyhow::anyhow!(
                    "provisioning stopped after {synced} synced secret(s): {other}"
                )),
            },
            ProvisionError::Secret(e) => Self::from(e),
        }
    }
}

impl From<SecretError> for CoreError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::Configuration(msg) => Self::Configuration(msg),
            SecretError::Decryption(msg) => Self::Decryption(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_maps_to_repository_not_found() {
        let err = CoreError::from(ScanError::RepositoryNotFound {
            owner: "acme".into(),
            repo: "widgets".into(),
        });
        assert!(matches!(err, CoreError::RepositoryNotFound { .. }));
        assert_eq!(
            err.to_string(),
            "repository or branch not found: acme/widgets"
        );
    }

    #[test]
    fn auth_error_carries_status() {
        let err = CoreError::from(GithubError::Auth {
            status: 401,
            message: "Bad credentials".into(),
        });
        assert!(err.to_string().contains("401"));
    }
}
