use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::GapReport;

/// One GitHub App installation on an account. Owns its installation-scoped
/// secrets and the list of repository full names it can see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    /// GitHub installation id. Globally unique.
    pub installation_id: i64,
    pub account_login: String,
    pub account_type: AccountType,
    pub repositories: Vec<String>,
    /// Suspended installations are excluded from all lookups.
    pub suspended: bool,
    pub installed_at: DateTime<Utc>,
    pub secrets: Vec<EncryptedSecret>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    User,
    Organization,
}

impl AccountType {
    /// GitHub reports the account type as a free-form string; anything that
    /// is not an organization is treated as a user account.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("organization") {
            Self::Organization
        } else {
            Self::User
        }
    }
}

/// One entry per repository under an installation. Created lazily on the
/// first secret write or the first persisted scan; never deleted
/// automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// `owner/repo`, unique across the whole store.
    pub full_name: String,
    /// Owning installation, once known. Lazy creation may precede linking.
    pub installation_id: Option<i64>,
    pub secrets: Vec<EncryptedSecret>,
    pub last_scan: Option<ScanSnapshot>,
}

impl RepositoryConfig {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            installation_id: None,
            secrets: Vec::new(),
            last_scan: None,
        }
    }
}

/// Result of the most recent gap scan, folded into the repository config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub gaps: GapReport,
    pub scanned_at: DateTime<Utc>,
}

/// An at-rest secret. The plaintext value is never persisted or logged;
/// ciphertext and nonce are base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub key: String,
    pub ciphertext: String,
    pub nonce: String,
    pub updated_at: DateTime<Utc>,
}

/// Addressing for a secret collection: installation-scoped or
/// repository-scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretScope {
    Installation(i64),
    Repository(String),
}

impl std::fmt::Display for SecretScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installation(id) => write!(f, "installation:{id}"),
            Self::Repository(name) => write!(f, "repository:{name}"),
        }
    }
}
