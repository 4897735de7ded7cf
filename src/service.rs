use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::classify::{self, JobObservation, RunClassification};
use crate::config::Config;
use crate::error::CoreError;
use crate::github::{GithubClient, TokenBroker};
use crate::provision::{ProvisionOutcome, RemoteProvisioner};
use crate::scanner::{GapReport, GapScanner, RepoRef, parse_repo_url};
use crate::scoring::{self, MaturityReport, Signals};
use crate::secrets::{SecretCipher, SecretStore, SecretSummary};
use crate::store::{AccountType, Installation, ScanSnapshot, SecretScope, Store};

/// The internal API surface exposed to collaborators (router/UI/CLI).
/// Holds the shared configuration, document store, and GitHub client; every
/// operation is request-scoped and stateless beyond the store.
#[derive(Clone)]
pub struct Service {
    config: Arc<Config>,
    store: Store,
    client: GithubClient,
    scanner: GapScanner,
}

impl Service {
    pub fn new(config: Config) -> Result<Self, CoreError> {
        let client = GithubClient::new(
            &config.github_api,
            Duration::from_secs(config.http_timeout_secs),
        )
        .map_err(CoreError::from)?;

        Ok(Self {
            config: Arc::new(config),
            store: Store::new(),
            client: client.clone(),
            scanner: GapScanner::new(client),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Token broker for App-authenticated calls. Built on demand: scan-only
    /// deployments never need App credentials.
    fn broker(&self) -> Result<TokenBroker, CoreError> {
        TokenBroker::from_config(&self.config, self.client.clone()).map_err(CoreError::from)
    }

    /// Secret store, built on demand: requires the master key (or dev mode),
    /// which scan-only deployments may not configure.
    fn secret_store(&self) -> Result<SecretStore, CoreError> {
        let cipher = SecretCipher::from_config(&self.config)?;
        Ok(SecretStore::new(self.store.clone(), cipher))
    }

    // -- Scanning & scoring -------------------------------------------------

    /// Scan a repository URL for DevOps artifact gaps and persist the result
    /// on the repository config.
    pub async fn scan(&self, repo_url: &str, branch: &str) -> Result<(RepoRef, GapReport), CoreError> {
        let repo = parse_repo_url(repo_url)?;
        let gaps = self
            .scanner
            .detect_gaps(&repo.owner, &repo.repo, branch, None)
            .await?;

        let full_name = format!("{}/{}", repo.owner, repo.repo);
        self.store
            .record_scan(
                &full_name,
                ScanSnapshot {
                    gaps,
                    scanned_at: Utc::now(),
                },
            )
            .await;

        Ok((repo, gaps))
    }

    /// Pure scoring of a gap report.
    pub fn score(gaps: GapReport) -> MaturityReport {
        scoring::score(&Signals::from(gaps))
    }

    // -- Installation linking -----------------------------------------------

    /// Fetch installation metadata and its repository list, and persist the
    /// installation document.
    pub async fn link_installation(&self, installation_id: i64) -> Result<Installation, CoreError> {
        let broker = self.broker()?;
        let details = broker.installation_details(installation_id).await?;
        let repositories = broker.installation_repositories(installation_id).await?;

        let installation = Installation {
            installation_id: details.id,
            account_login: details.account.login,
            account_type: AccountType::parse(&details.account.kind),
            repositories: repositories.clone(),
            suspended: details.suspended_at.is_some(),
            installed_at: Utc::now(),
            secrets: Vec::new(),
        };
        self.store.upsert_installation(installation.clone()).await;

        for full_name in &repositories {
            self.store.link_repo(full_name, installation_id).await;
        }

        tracing::info!(
            installation_id,
            account = installation.account_login,
            repositories = repositories.len(),
            "installation linked"
        );
        Ok(installation)
    }

    // -- Secrets ------------------------------------------------------------

    pub async fn list_secrets(&self, scope: &SecretScope) -> Result<Vec<SecretSummary>, CoreError> {
        Ok(self.secret_store()?.list(scope).await)
    }

    pub async fn upsert_secret(
        &self,
        scope: &SecretScope,
        key: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        let applied = self.secret_store()?.upsert(scope, key, value).await?;
        if applied {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("unknown scope: {scope}")))
        }
    }

    pub async fn delete_secret(&self, scope: &SecretScope, key: &str) -> Result<bool, CoreError> {
        Ok(self.secret_store()?.delete(scope, key).await)
    }

    /// Push every repository-scoped secret to GitHub as encrypted repository
    /// secrets.
    pub async fn sync_secrets(
        &self,
        installation_id: i64,
        repo_full_name: &str,
    ) -> Result<ProvisionOutcome, CoreError> {
        let Some((owner, repo)) = repo_full_name.split_once('/') else {
            return Err(CoreError::Configuration(format!(
                "repository full name must be owner/repo, got '{repo_full_name}'"
            )));
        };

        let broker = self.broker()?;
        let provisioner = RemoteProvisioner::new(self.client.clone(), self.secret_store()?);
        let scope = SecretScope::Repository(repo_full_name.to_owned());
        let outcome = provisioner
            .provision(&broker, installation_id, owner, repo, &scope)
            .await?;
        Ok(outcome)
    }

    // -- Classification -----------------------------------------------------

    /// Deterministic classification of a CI job observation. Never errors.
    pub fn classify(observation: &JobObservation) -> RunClassification {
        classify::classify(observation)
    }
}
