//! Configuration file support for scribe.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `SCRIBE_`, e.g., `SCRIBE_STORE_TOKEN`)
//! 3. Config file (~/.config/scribe/config.toml or ./scribe.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [store]
//! base_url = "https://records.example.com"
//! token = "rs_..."          # or use SCRIBE_STORE_TOKEN env var
//! collection = "commits"
//!
//! [github]
//! token = "ghp_..."         # or use SCRIBE_GITHUB_TOKEN env var
//!
//! [webhook]
//! secret = "..."            # or use SCRIBE_WEBHOOK_SECRET env var
//! bind = "127.0.0.1:8404"
//!
//! [sync]
//! chunk_size = 3
//! overlap_days = 1
//! fallback_lookback_days = 7
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use scribe::sync::{FALLBACK_LOOKBACK_DAYS, OVERLAP_DAYS, REPO_CHUNK_SIZE};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store configuration.
    pub store: StoreSection,
    /// GitHub configuration (backfill source).
    pub github: GitHubSection,
    /// Webhook receiver configuration.
    pub webhook: WebhookSection,
    /// Sync tuning.
    pub sync: SyncSection,
}

/// Record store configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Records API base URL.
    pub base_url: Option<String>,
    /// Records API token.
    /// Can also be set via SCRIBE_STORE_TOKEN environment variable.
    pub token: Option<String>,
    /// Collection holding the commit records.
    pub collection: Option<String>,
    /// Proactive requests-per-second limit against the store.
    pub requests_per_second: Option<u32>,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    /// GitHub API token.
    /// Can also be set via SCRIBE_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
}

/// Webhook receiver configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WebhookSection {
    /// Shared secret the event source signs payloads with.
    /// Can also be set via SCRIBE_WEBHOOK_SECRET environment variable.
    pub secret: Option<String>,
    /// Listen address.
    pub bind: String,
    /// Seconds the background write path may run before abandonment.
    pub write_timeout_secs: u64,
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            secret: None,
            bind: "127.0.0.1:8404".to_string(),
            write_timeout_secs: 60,
        }
    }
}

/// Sync tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Repositories processed concurrently per chunk.
    pub chunk_size: usize,
    /// Backward pad on the incremental sync cursor, in days.
    pub overlap_days: i64,
    /// Look-back window when a repository has nothing stored yet, in days.
    pub fallback_lookback_days: i64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            chunk_size: REPO_CHUNK_SIZE,
            overlap_days: OVERLAP_DAYS,
            fallback_lookback_days: FALLBACK_LOOKBACK_DAYS,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/scribe/config.toml)
    /// 3. Local config file (./scribe.toml)
    /// 4. Environment variables with SCRIBE_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        // Add XDG config file if it exists
        if let Some(proj_dirs) = ProjectDirs::from("", "", "scribe") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Add local config file (higher priority than XDG)
        let local_config = PathBuf::from("scribe.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./scribe.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // Add SCRIBE_ prefixed environment variables
        // e.g., SCRIBE_STORE_TOKEN -> store.token
        builder = builder.add_source(
            Environment::with_prefix("SCRIBE")
                .separator("_")
                .try_parsing(true),
        );

        // Build the config and deserialize
        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the GitHub token.
    pub fn github_token(&self) -> Option<String> {
        self.github.token.clone()
    }

    /// Get the webhook secret.
    pub fn webhook_secret(&self) -> Option<String> {
        self.webhook.secret.clone()
    }

    /// Get the default config file path.
    #[allow(dead_code)]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "scribe").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store.base_url.is_none());
        assert!(config.store.token.is_none());
        assert!(config.github.token.is_none());
        assert!(config.webhook.secret.is_none());
        assert_eq!(config.webhook.bind, "127.0.0.1:8404");
        assert_eq!(config.webhook.write_timeout_secs, 60);
        assert_eq!(config.sync.chunk_size, REPO_CHUNK_SIZE);
        assert_eq!(config.sync.overlap_days, OVERLAP_DAYS);
        assert_eq!(config.sync.fallback_lookback_days, FALLBACK_LOOKBACK_DAYS);
    }

    #[test]
    fn test_webhook_section_defaults() {
        let section = WebhookSection::default();
        assert!(section.bind.parse::<std::net::SocketAddr>().is_ok());
    }
}
