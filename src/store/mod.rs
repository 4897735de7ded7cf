pub mod models;

pub use models::{
    AccountType, EncryptedSecret, Installation, RepositoryConfig, ScanSnapshot, SecretScope,
};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// In-process document store over the two collections the core owns.
///
/// Compound updates (the remove-then-append secret upsert in particular) run
/// inside a single closure under the write lock, so two concurrent upserts of
/// the same key cannot both observe the pre-update state.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    installations: HashMap<i64, Installation>,
    repos: HashMap<String, RepositoryConfig>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Installations ------------------------------------------------------

    /// Insert or replace an installation document, keyed by installation id.
    /// Existing secrets survive a re-link.
    pub async fn upsert_installation(&self, mut installation: Installation) {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.installations.get(&installation.installation_id) {
            if installation.secrets.is_empty() && !existing.secrets.is_empty() {
                installation.secrets = existing.secrets.clone();
            }
        }
        inner
            .installations
            .insert(installation.installation_id, installation);
    }

    /// Look up an installation. Suspended installations are invisible.
    pub async fn installation(&self, installation_id: i64) -> Option<Installation> {
        let inner = self.inner.read().await;
        inner
            .installations
            .get(&installation_id)
            .filter(|i| !i.suspended)
            .cloned()
    }

    /// Replace the repository name list after an explicit sync. Returns false
    /// when the installation is unknown or suspended.
    pub async fn set_repositories(&self, installation_id: i64, repositories: Vec<String>) -> bool {
        let mut inner = self.inner.write().await;
        match inner.installations.get_mut(&installation_id) {
            Some(installation) if !installation.suspended => {
                installation.repositories = repositories;
                true
            }
            _ => false,
        }
    }

    // -- Repository configs -------------------------------------------------

    pub async fn repo_config(&self, full_name: &str) -> Option<RepositoryConfig> {
        let inner = self.inner.read().await;
        inner.repos.get(full_name).cloned()
    }

    /// Fold a scan result into the repository config, creating the document
    /// lazily on first persistence.
    pub async fn record_scan(&self, full_name: &str, snapshot: ScanSnapshot) {
        let mut inner = self.inner.write().await;
        let config = inner
            .repos
            .entry(full_name.to_owned())
            .or_insert_with(|| RepositoryConfig::new(full_name));
        config.last_scan = Some(snapshot);
    }

    /// Associate a repository config with its owning installation.
    pub async fn link_repo(&self, full_name: &str, installation_id: i64) {
        let mut inner = self.inner.write().await;
        let config = inner
            .repos
            .entry(full_name.to_owned())
            .or_insert_with(|| RepositoryConfig::new(full_name));
        config.installation_id = Some(installation_id);
    }

    // -- Secret collections -------------------------------------------------

    /// Run `f` against the secret collection for `scope` under the write
    /// lock. Repository scopes are created lazily; an unknown or suspended
    /// installation scope yields `None`.
    pub async fn with_secrets<R>(
        &self,
        scope: &SecretScope,
        f: impl FnOnce(&mut Vec<EncryptedSecret>) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.write().await;
        match scope {
            SecretScope::Installation(id) => match inner.installations.get_mut(id) {
                Some(installation) if !installation.suspended => {
                    Some(f(&mut installation.secrets))
                }
                _ => None,
            },
            SecretScope::Repository(full_name) => {
                let config = inner
                    .repos
                    .entry(full_name.clone())
                    .or_insert_with(|| RepositoryConfig::new(full_name.clone()));
                Some(f(&mut config.secrets))
            }
        }
    }

    /// Read-only snapshot of a scope's secrets.
    pub async fn secrets(&self, scope: &SecretScope) -> Option<Vec<EncryptedSecret>> {
        let inner = self.inner.read().await;
        match scope {
            SecretScope::Installation(id) => inner
                .installations
                .get(id)
                .filter(|i| !i.suspended)
                .map(|i| i.secrets.clone()),
            SecretScope::Repository(full_name) => {
                inner.repos.get(full_name).map(|r| r.secrets.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn installation(id: i64, suspended: bool) -> Installation {
        Installation {
            installation_id: id,
            account_login: "acme".into(),
            account_type: AccountType::Organization,
            repositories: vec![],
            suspended,
            installed_at: Utc::now(),
            secrets: vec![],
        }
    }

    #[tokio::test]
    async fn suspended_installations_are_invisible() {
        let store = Store::new();
        store.upsert_installation(installation(1, true)).await;
        assert!(store.installation(1).await.is_none());
        assert!(!store.set_repositories(1, vec!["acme/x".into()]).await);
        assert!(
            store
                .with_secrets(&SecretScope::Installation(1), |_| ())
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn relink_preserves_secrets() {
        let store = Store::new();
        let mut first = installation(1, false);
        first.secrets.push(EncryptedSecret {
            key: "API_KEY".into(),
            ciphertext: "ct".into(),
            nonce: "n".into(),
            updated_at: Utc::now(),
        });
        store.upsert_installation(first).await;
        store.upsert_installation(installation(1, false)).await;

        let linked = store.installation(1).await.unwrap();
        assert_eq!(linked.secrets.len(), 1);
    }

    #[tokio::test]
    async fn repo_config_created_lazily_on_scan() {
        let store = Store::new();
        assert!(store.repo_config("acme/widgets").await.is_none());
        store
            .record_scan(
                "acme/widgets",
                ScanSnapshot {
                    gaps: crate::scanner::GapReport::default(),
                    scanned_at: Utc::now(),
                },
            )
            .await;
        let config = store.repo_config("acme/widgets").await.unwrap();
        assert!(config.last_scan.is_some());
        assert!(config.installation_id.is_none());
    }

    #[tokio::test]
    async fn repo_scope_created_lazily_on_secret_write() {
        let store = Store::new();
        let scope = SecretScope::Repository("acme/widgets".into());
        store
            .with_secrets(&scope, |secrets| {
                secrets.push(EncryptedSecret {
                    key: "K".into(),
                    ciphertext: "ct".into(),
                    nonce: "n".into(),
                    updated_at: Utc::now(),
                });
            })
            .await
            .unwrap();
        assert_eq!(store.secrets(&scope).await.unwrap().len(), 1);
    }
}
