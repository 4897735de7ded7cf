use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::github::client::RepoPublicKey;
use crate::github::{GithubClient, GithubError, TokenBroker};
use crate::secrets::{SecretError, SecretStore};
use crate::store::SecretScope;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Missing installation/owner/repo, or an unusable repository key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upstream failure after `synced` secrets were already provisioned.
    /// Already-pushed secrets are not rolled back.
    #[error("provisioning stopped after {synced} synced secret(s): {source}")]
    Upstream {
        synced: usize,
        #[source]
        source: GithubError,
    },

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Summary returned to the caller after a successful batch.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub owner: String,
    pub repo: String,
    pub synced: usize,
}

/// Pushes decrypted secret values to GitHub as repository-level encrypted
/// secrets. Values are sealed under the repository's public key before they
/// leave the process; plaintext is never transmitted or logged.
pub struct RemoteProvisioner {
    client: GithubClient,
    secrets: SecretStore,
}

impl RemoteProvisioner {
    pub fn new(client: GithubClient, secrets: SecretStore) -> Self {
        Self { client, secrets }
    }

    /// Provision every secret stored for `scope` into `owner`/`repo`.
    ///
    /// Secrets are pushed sequentially; the first failure stops the batch
    /// and the error carries how many were already synced. Each PUT is an
    /// idempotent upsert, so re-running after a partial failure converges.
    #[tracing::instrument(skip(self, broker), err)]
    pub async fn provision(
        &self,
        broker: &TokenBroker,
        installation_id: i64,
        owner: &str,
        repo: &str,
        scope: &SecretScope,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        if owner.is_empty() || repo.is_empty() {
            return Err(ProvisionError::Configuration(
                "owner and repo must be non-empty".into(),
            ));
        }

        // Decrypt the whole batch up front: a single undecryptable entry
        // aborts before anything is pushed.
        let pairs = self.secrets.decrypt_all(scope).await?;

        let token = broker
            .installation_token(installation_id)
            .await
            .map_err(|source| ProvisionError::Upstream { synced: 0, source })?;

        let public_key = self
            .client
            .actions_public_key(&token.token, owner, repo)
            .await
            .map_err(|source| ProvisionError::Upstream { synced: 0, source })?;
        let sealing_key = parse_repo_public_key(&public_key)?;

        let mut synced = 0usize;
        for (name, value) in pairs {
            let sealed = seal_value(&sealing_key, &value)?;
            self.client
                .put_actions_secret(&token.token, owner, repo, &name, &sealed, &public_key.key_id)
                .await
                .map_err(|source| ProvisionError::Upstream { synced, source })?;
            synced += 1;
            tracing::info!(owner, repo, name, "secret provisioned");
        }

        Ok(ProvisionOutcome {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            synced,
        })
    }
}

fn parse_repo_public_key(
    public_key: &RepoPublicKey,
) -> Result<crypto_box::PublicKey, ProvisionError> {
    let bytes = BASE64.decode(&public_key.key).map_err(|e| {
        ProvisionError::Configuration(format!("malformed repository public key: {e}"))
    })?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        ProvisionError::Configuration(format!(
            "repository public key must be 32 bytes, got {}",
            v.len()
        ))
    })?;
    Ok(crypto_box::PublicKey::from(bytes))
}

/// Anonymous sealed-box encryption: only GitHub's matching private key can
/// open the value; the sender needs no key pair of its own.
fn seal_value(
    recipient: &crypto_box::PublicKey,
    plaintext: &str,
) -> Result<String, ProvisionError> {
    let sealed = recipient
        .seal(&mut crypto_box::aead::OsRng, plaintext.as_bytes())
        .map_err(|e| ProvisionError::Configuration(format!("sealed-box encryption failed: {e}")))?;
    Ok(BASE64.encode(sealed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_key(secret: &crypto_box::SecretKey) -> RepoPublicKey {
        RepoPublicKey {
            key_id: "568250167242549743".into(),
            key: BASE64.encode(secret.public_key().as_bytes()),
        }
    }

    #[test]
    fn sealed_value_opens_under_recipient_key() {
        let recipient = crypto_box::SecretKey::generate(&mut crypto_box::aead::OsRng);
        let wire_key = repo_key(&recipient);

        let public = parse_repo_public_key(&wire_key).unwrap();
        let sealed_b64 = seal_value(&public, "hunter2").unwrap();

        let sealed = BASE64.decode(sealed_b64).unwrap();
        let opened = recipient.unseal(&sealed).unwrap();
        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn sealing_twice_differs() {
        let recipient = crypto_box::SecretKey::generate(&mut crypto_box::aead::OsRng);
        let public = parse_repo_public_key(&repo_key(&recipient)).unwrap();
        assert_ne!(
            seal_value(&public, "same").unwrap(),
            seal_value(&public, "same").unwrap()
        );
    }

    #[test]
    fn rejects_wrong_size_public_key() {
        let err = parse_repo_public_key(&RepoPublicKey {
            key_id: "1".into(),
            key: BASE64.encode(b"short"),
        })
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn rejects_non_base64_public_key() {
        let err = parse_repo_public_key(&RepoPublicKey {
            key_id: "1".into(),
            key: "not base64!!".into(),
        })
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }
}
