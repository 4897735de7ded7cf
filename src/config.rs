use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// GitHub App numeric identifier. Required for token brokering.
    pub github_app_id: Option<u64>,
    /// Path to the PEM-encoded RSA private key used to sign App assertions.
    pub github_private_key_path: Option<PathBuf>,
    /// Hex-encoded 32-byte master key for the local secret cipher.
    pub master_key: Option<String>,
    /// Base URL of the GitHub REST API.
    pub github_api: String,
    /// Timeout applied to every outbound GitHub call, in seconds.
    pub http_timeout_secs: u64,
    pub dev_mode: bool,
}

impl Config {
    /// Read configuration from the environment. Values a component requires
    /// but that are missing here surface as `Configuration` errors at first
    /// use, not at load.
    pub fn load() -> Self {
        Self {
            github_app_id: env::var("SHIPSHAPE_GITHUB_APP_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            github_private_key_path: env::var("SHIPSHAPE_GITHUB_PRIVATE_KEY_PATH")
                .ok()
                .map(PathBuf::from),
            master_key: env::var("SHIPSHAPE_MASTER_KEY").ok(),
            github_api: env::var("SHIPSHAPE_GITHUB_API")
                .unwrap_or_else(|_| "https://api.github.com".into()),
            http_timeout_secs: env::var("SHIPSHAPE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            dev_mode: env::var("SHIPSHAPE_DEV").ok().is_some_and(|v| v == "true"),
        }
    }
}
