use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use super::client::{GithubClient, GithubError, InstallationDetails, InstallationToken};
use crate::config::Config;

/// Assertions identify the App for up to 10 minutes; 9 keeps headroom under
/// the GitHub maximum.
const ASSERTION_TTL_SECS: u64 = 9 * 60;
/// Issued-at is backdated to absorb clock skew between us and GitHub.
const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: u64,
    exp: u64,
    iss: String,
}

/// Mints short-lived App assertions and exchanges them for installation
/// access tokens. The signing key is loaded once, at construction.
///
/// Tokens are not cached: every call mints fresh credentials. A per-
/// installation expiry-aware cache is the documented extension point.
pub struct TokenBroker {
    client: GithubClient,
    app_id: u64,
    signing_key: EncodingKey,
}

impl std::fmt::Debug for TokenBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBroker")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl TokenBroker {
    /// Build a broker from configuration. Fails when the App id or the
    /// private key file is missing or unreadable.
    pub fn from_config(config: &Config, client: GithubClient) -> Result<Self, GithubError> {
        let app_id = config.github_app_id.ok_or_else(|| {
            GithubError::Configuration("SHIPSHAPE_GITHUB_APP_ID is not set".into())
        })?;
        let key_path = config.github_private_key_path.as_ref().ok_or_else(|| {
            GithubError::Configuration("SHIPSHAPE_GITHUB_PRIVATE_KEY_PATH is not set".into())
        })?;
        let pem = std::fs::read(key_path).map_err(|e| {
            GithubError::Configuration(format!(
                "cannot read private key {}: {e}",
                key_path.display()
            ))
        })?;
        Self::new(app_id, &pem, client)
    }

    pub fn new(app_id: u64, private_key_pem: &[u8], client: GithubClient) -> Result<Self, GithubError> {
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| GithubError::Configuration(format!("invalid RSA private key: {e}")))?;
        Ok(Self {
            client,
            app_id,
            signing_key,
        })
    }

    /// Signed RS256 assertion identifying the App: `iat` 60 seconds in the
    /// past, `exp` 9 minutes out, `iss` the App id.
    pub fn app_assertion(&self) -> Result<String, GithubError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GithubError::Configuration(format!("system clock error: {e}")))?
            .as_secs();

        let claims = Claims {
            iat: now.saturating_sub(CLOCK_SKEW_SECS),
            exp: now + ASSERTION_TTL_SECS,
            iss: self.app_id.to_string(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| GithubError::Configuration(format!("failed to sign assertion: {e}")))
    }

    /// Exchange a fresh assertion for an installation-scoped access token.
    #[tracing::instrument(skip(self), err)]
    pub async fn installation_token(
        &self,
        installation_id: i64,
    ) -> Result<InstallationToken, GithubError> {
        let assertion = self.app_assertion()?;
        let token = self
            .client
            .create_installation_token(&assertion, installation_id)
            .await?;
        tracing::debug!(installation_id, expires_at = %token.expires_at, "minted installation token");
        Ok(token)
    }

    /// Installation metadata (account login/type, suspension), read with the
    /// App-level assertion. Used during installation linking.
    #[tracing::instrument(skip(self), err)]
    pub async fn installation_details(
        &self,
        installation_id: i64,
    ) -> Result<InstallationDetails, GithubError> {
        let assertion = self.app_assertion()?;
        self.client
            .installation_details(&assertion, installation_id)
            .await
    }

    /// Full names of the repositories the installation can see.
    #[tracing::instrument(skip(self), err)]
    pub async fn installation_repositories(
        &self,
        installation_id: i64,
    ) -> Result<Vec<String>, GithubError> {
        let token = self.installation_token(installation_id).await?;
        self.client.installation_repositories(&token.token).await
    }
}
