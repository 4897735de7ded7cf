use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{SecretCipher, SecretError};
use crate::store::{EncryptedSecret, SecretScope, Store};

/// Placeholder exposed wherever a secret value would otherwise appear.
pub const MASKED_VALUE: &str = "********";

/// Consumer-facing view of a stored secret. Carries no ciphertext and no
/// plaintext, only the masked placeholder.
#[derive(Debug, Clone, Serialize)]
pub struct SecretSummary {
    pub key: String,
    pub updated_at: DateTime<Utc>,
    pub value: &'static str,
}

/// Encrypted-secret collection manager with last-write-wins semantics per
/// key. All writes go through [`Store::with_secrets`], so the
/// remove-then-append sequence is atomic against concurrent upserts.
#[derive(Clone)]
pub struct SecretStore {
    store: Store,
    cipher: SecretCipher,
}

impl SecretStore {
    pub fn new(store: Store, cipher: SecretCipher) -> Self {
        Self { store, cipher }
    }

    /// Normalize a secret key to the `UPPER_SNAKE` convention.
    pub fn normalize_key(key: &str) -> String {
        key.trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' | '.' => '_',
                _ => c.to_ascii_uppercase(),
            })
            .collect()
    }

    /// Encrypt `value` and replace any existing entry with the same key in
    /// the scope. Returns false when the scope does not exist (unknown or
    /// suspended installation).
    #[tracing::instrument(skip(self, value), fields(%scope), err)]
    pub async fn upsert(
        &self,
        scope: &SecretScope,
        key: &str,
        value: &str,
    ) -> Result<bool, SecretError> {
        let key = Self::normalize_key(key);
        let sealed = self.cipher.encrypt(value)?;
        let entry = EncryptedSecret {
            key: key.clone(),
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            updated_at: Utc::now(),
        };

        let applied = self
            .store
            .with_secrets(scope, |secrets| {
                secrets.retain(|s| s.key != key);
                secrets.push(entry);
            })
            .await
            .is_some();

        if applied {
            tracing::info!(%scope, key, "secret upserted");
        }
        Ok(applied)
    }

    /// Masked listing. Never exposes ciphertext or plaintext.
    pub async fn list(&self, scope: &SecretScope) -> Vec<SecretSummary> {
        self.store
            .secrets(scope)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|s| SecretSummary {
                key: s.key,
                updated_at: s.updated_at,
                value: MASKED_VALUE,
            })
            .collect()
    }

    /// Idempotent delete: removing an absent key is not an error. Returns
    /// whether an entry was actually removed.
    #[tracing::instrument(skip(self), fields(%scope))]
    pub async fn delete(&self, scope: &SecretScope, key: &str) -> bool {
        let key = SecretStore::normalize_key(key);
        self.store
            .with_secrets(scope, |secrets| {
                let before = secrets.len();
                secrets.retain(|s| s.key != key);
                secrets.len() < before
            })
            .await
            .unwrap_or(false)
    }

    /// Decrypt every secret in the scope. Internal-only: consumed exclusively
    /// by the remote provisioner. All-or-nothing — one undecryptable entry
    /// fails the whole batch, so no partial secret set ever leaves here.
    #[tracing::instrument(skip(self), fields(%scope), err)]
    pub(crate) async fn decrypt_all(
        &self,
        scope: &SecretScope,
    ) -> Result<Vec<(String, String)>, SecretError> {
        let entries = self.store.secrets(scope).await.unwrap_or_default();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let value = self
                .cipher
                .decrypt(&entry.ciphertext, &entry.nonce)
                .map_err(|e| {
                    SecretError::Decryption(format!("secret '{}': {e}", entry.key))
                })?;
            out.push((entry.key, value));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_store() -> SecretStore {
        SecretStore::new(Store::new(), SecretCipher::new([42u8; 32]))
    }

    fn repo_scope() -> SecretScope {
        SecretScope::Repository("acme/widgets".into())
    }

    #[test]
    fn key_normalization() {
        assert_eq!(SecretStore::normalize_key("api-key"), "API_KEY");
        assert_eq!(SecretStore::normalize_key(" npm token "), "NPM_TOKEN");
        assert_eq!(SecretStore::normalize_key("DATABASE_URL"), "DATABASE_URL");
    }

    #[tokio::test]
    async fn upsert_replaces_same_key() {
        let secrets = secret_store();
        let scope = repo_scope();

        secrets.upsert(&scope, "K", "v1").await.unwrap();
        secrets.upsert(&scope, "K", "v2").await.unwrap();

        let listed = secrets.list(&scope).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "K");
        assert_eq!(listed[0].value, MASKED_VALUE);

        let decrypted = secrets.decrypt_all(&scope).await.unwrap();
        assert_eq!(decrypted, vec![("K".into(), "v2".into())]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let secrets = secret_store();
        let scope = repo_scope();

        secrets.upsert(&scope, "K", "v").await.unwrap();
        assert!(secrets.delete(&scope, "K").await);
        assert!(!secrets.delete(&scope, "K").await);
        assert!(secrets.list(&scope).await.is_empty());
    }

    #[tokio::test]
    async fn upsert_to_unknown_installation_scope_is_rejected() {
        let secrets = secret_store();
        let applied = secrets
            .upsert(&SecretScope::Installation(404), "K", "v")
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn decrypt_all_fails_atomically_on_one_bad_entry() {
        let store = Store::new();
        let scope = repo_scope();
        let secrets = SecretStore::new(store.clone(), SecretCipher::new([42u8; 32]));

        secrets.upsert(&scope, "GOOD", "value").await.unwrap();
        store
            .with_secrets(&scope, |entries| {
                entries.push(EncryptedSecret {
                    key: "BAD".into(),
                    ciphertext: "bm90LXJlYWwtY2lwaGVydGV4dA==".into(),
                    nonce: "AAAAAAAAAAAAAAAA".into(),
                    updated_at: Utc::now(),
                });
            })
            .await
            .unwrap();

        let err = secrets.decrypt_all(&scope).await.unwrap_err();
        assert!(matches!(err, SecretError::Decryption(_)));
        assert!(err.to_string().contains("BAD"));
    }

    #[tokio::test]
    async fn concurrent_upserts_of_same_key_leave_one_entry() {
        let secrets = secret_store();
        let scope = repo_scope();

        let mut handles = Vec::new();
        for i in 0..16 {
            let secrets = secrets.clone();
            let scope = scope.clone();
            handles.push(tokio::spawn(async move {
                secrets.upsert(&scope, "K", &format!("v{i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(secrets.list(&scope).await.len(), 1);
    }
}
