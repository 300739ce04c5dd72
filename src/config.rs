//! Client configuration

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::Theme;

/// Default location of the durable store
pub const DEFAULT_STORE_PATH: &str = ".challenge-desk.json";

/// Configuration shared by the gateway and the polling views
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address every endpoint path is appended to (e.g. `http://localhost:5000/api`)
    pub api_base_url: String,

    /// File holding the credential and preferences
    pub storage_path: PathBuf,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Price/signal refresh period on the dashboard
    pub market_poll_interval: Duration,

    /// Leaderboard refresh period
    pub leaderboard_poll_interval: Duration,

    /// Symbol selected when the dashboard mounts
    pub default_symbol: String,

    /// Theme used when none has been stored yet
    pub default_theme: Theme,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            storage_path: PathBuf::from(DEFAULT_STORE_PATH),
            request_timeout: Duration::from_secs(30),
            market_poll_interval: Duration::from_secs(30),
            leaderboard_poll_interval: Duration::from_secs(60),
            default_symbol: "AAPL".to_string(),
            default_theme: Theme::Dark,
        }
    }
}

impl ClientConfig {
    /// Build configuration from environment variables
    ///
    /// Reads:
    /// - `CHALLENGE_API_URL` - API base address (required)
    /// - everything [`ClientConfig::with_env`] reads
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("CHALLENGE_API_URL")
            .context("CHALLENGE_API_URL environment variable not set")?;
        Self {
            api_base_url,
            ..Default::default()
        }
        .with_env()
    }

    /// Apply the optional environment overrides on top of `self`
    ///
    /// - `CHALLENGE_STORE_PATH` - durable store file
    /// - `CHALLENGE_TIMEOUT_SECS` - request timeout in seconds
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(path) = std::env::var("CHALLENGE_STORE_PATH") {
            self.storage_path = PathBuf::from(path);
        }
        if let Ok(v) = std::env::var("CHALLENGE_TIMEOUT_SECS") {
            let secs = v
                .parse::<u64>()
                .context("CHALLENGE_TIMEOUT_SECS must be a whole number of seconds")?;
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(self.normalized())
    }

    /// Base URL without a trailing slash
    pub fn normalized(mut self) -> Self {
        while self.api_base_url.ends_with('/') {
            self.api_base_url.pop();
        }
        self
    }

    /// Full URL for an endpoint path such as `/auth/me`
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}
