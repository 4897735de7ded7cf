use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::github::client::{GithubClient, TreeEntry};
use crate::github::GithubError;

const WORKFLOW_DIR: &str = ".github/workflows/";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Not a GitHub repository URL. Explicit variant, never a sentinel null.
    #[error("invalid repository URL: {0}")]
    InvalidRepoUrl(String),

    /// Every branch candidate was exhausted.
    #[error("repository or branch not found: {owner}/{repo}")]
    RepositoryNotFound { owner: String, repo: String },

    #[error(transparent)]
    Github(#[from] GithubError),
}

/// `owner`/`repo` pair extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

/// Presence snapshot of the four DevOps artifacts for one repository/branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub dockerfile: bool,
    pub ci: bool,
    pub readme: bool,
    pub tests: bool,
}

/// Extract `{owner, repo}` from a GitHub URL. A trailing `.git` or slash is
/// tolerated; anything that is not a GitHub repository path is an error.
pub fn parse_repo_url(raw: &str) -> Result<RepoRef, ScanError> {
    let invalid = || ScanError::InvalidRepoUrl(raw.to_owned());
    let url = url::Url::parse(raw).map_err(|_| invalid())?;

    match url.host_str() {
        Some("github.com" | "www.github.com") => {}
        _ => return Err(invalid()),
    }

    let mut segments = url.path_segments().ok_or_else(invalid)?;
    let owner = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let repo = segments
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid)?;

    Ok(RepoRef {
        owner: owner.to_owned(),
        repo: repo.to_owned(),
    })
}

/// Fetches a repository's tree and manifest and derives the gap report.
#[derive(Clone)]
pub struct GapScanner {
    client: GithubClient,
}

impl GapScanner {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }

    /// The branch candidates tried in order: the requested branch, then the
    /// two conventional defaults, deduplicated.
    fn branch_candidates(branch: &str) -> Vec<&str> {
        let mut candidates = vec![branch];
        for fallback in ["master", "main"] {
            if !candidates.contains(&fallback) {
                candidates.push(fallback);
            }
        }
        candidates
    }

    /// Recursive tree listing, falling back across branch candidates.
    /// Per-candidate failures are swallowed; only exhaustion surfaces.
    #[tracing::instrument(skip(self, token))]
    pub async fn fetch_tree(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<Vec<TreeEntry>, ScanError> {
        for candidate in Self::branch_candidates(branch) {
            match self.client.git_tree(owner, repo, candidate, token).await {
                Ok(tree) => {
                    tracing::debug!(owner, repo, branch = candidate, entries = tree.tree.len(), "tree fetched");
                    return Ok(tree.tree);
                }
                Err(e) => {
                    tracing::debug!(owner, repo, branch = candidate, error = %e, "tree fetch failed, trying next candidate");
                }
            }
        }
        Err(ScanError::RepositoryNotFound {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }

    /// `package.json` contents across branch candidates, base64 transport
    /// decoded. `None` when no candidate has one — non-fatal; the tests
    /// check is skipped rather than failed.
    #[tracing::instrument(skip(self, token))]
    pub async fn fetch_manifest(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Option<serde_json::Value> {
        for candidate in Self::branch_candidates(branch) {
            let Ok(contents) = self
                .client
                .contents(owner, repo, "package.json", candidate, token)
                .await
            else {
                continue;
            };
            let Some(encoded) = contents.content else {
                continue;
            };
            let raw = if contents.encoding.as_deref() == Some("base64") {
                let stripped: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                match BASE64.decode(stripped).map(String::from_utf8) {
                    Ok(Ok(text)) => text,
                    _ => continue,
                }
            } else {
                encoded
            };
            if let Ok(manifest) = serde_json::from_str(&raw) {
                return Some(manifest);
            }
        }
        None
    }

    /// Scan one repository/branch for the four artifacts.
    #[tracing::instrument(skip(self, token), err)]
    pub async fn detect_gaps(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<GapReport, ScanError> {
        let tree = self.fetch_tree(owner, repo, branch, token).await?;
        let manifest = self.fetch_manifest(owner, repo, branch, token).await;
        let report = gaps_from_tree(&tree, manifest.as_ref());
        tracing::info!(owner, repo, branch, ?report, "gap scan complete");
        Ok(report)
    }
}

/// Pure derivation of a gap report from tree entries and an optional
/// manifest.
pub fn gaps_from_tree(
    entries: &[TreeEntry],
    manifest: Option<&serde_json::Value>,
) -> GapReport {
    let root_name = |path: &str| (!path.contains('/')).then(|| path.to_ascii_lowercase());

    let dockerfile = entries
        .iter()
        .any(|e| root_name(&e.path).is_some_and(|name| name == "dockerfile"));

    // A path must start with the workflow directory prefix AND be strictly
    // longer, so the directory marker itself never counts as a workflow.
    let ci = entries
        .iter()
        .any(|e| e.path.starts_with(WORKFLOW_DIR) && e.path.len() > WORKFLOW_DIR.len());

    let readme = entries
        .iter()
        .any(|e| root_name(&e.path).is_some_and(|name| name.starts_with("readme")));

    let tests = manifest
        .and_then(|m| m.get("scripts"))
        .and_then(|s| s.get("test"))
        .and_then(|t| t.as_str())
        .is_some_and(|script| !script.trim().is_empty());

    GapReport {
        dockerfile,
        ci,
        readme,
        tests,
    }
}
