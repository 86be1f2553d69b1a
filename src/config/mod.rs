//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Jellyfin server base URL (no trailing slash)
    pub base_url: String,

    /// API key, sent as X-Emby-Token on every request
    pub api_key: String,

    /// User whose library view is validated
    pub user_id: String,

    /// Maximum movies validated per invocation
    pub batch_size: usize,

    /// Per-request timeout against the server
    pub request_timeout: Duration,

    /// Tag added to defective movies on the server
    pub defect_tag: String,

    /// Pacing delay between movies
    pub pause_between: Duration,

    /// Checkpoint file path
    pub checkpoint_path: String,

    /// Defect archive file path
    pub defect_log_path: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url =
            normalize_base_url(&env::var("JELLYFIN_URL").context("JELLYFIN_URL is required")?)?;

        let batch_size: usize = env::var("BATCH_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("Invalid BATCH_SIZE")?;
        if !(1..=100).contains(&batch_size) {
            bail!("BATCH_SIZE must be between 1 and 100");
        }

        let timeout_secs: u64 = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("Invalid REQUEST_TIMEOUT_SECS")?;
        if !(5..=120).contains(&timeout_secs) {
            bail!("REQUEST_TIMEOUT_SECS must be between 5 and 120");
        }

        let pause_secs: f64 = env::var("PAUSE_SECS")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse()
            .context("Invalid PAUSE_SECS")?;
        if !(0.0..=10.0).contains(&pause_secs) {
            bail!("PAUSE_SECS must be between 0 and 10");
        }

        Ok(Self {
            base_url,

            api_key: env::var("JELLYFIN_API_KEY").context("JELLYFIN_API_KEY is required")?,

            user_id: env::var("JELLYFIN_USER_ID").context("JELLYFIN_USER_ID is required")?,

            batch_size,

            request_timeout: Duration::from_secs(timeout_secs),

            defect_tag: env::var("DEFECT_TAG").unwrap_or_else(|_| "DEFECTIVE".to_string()),

            pause_between: Duration::from_secs_f64(pause_secs),

            checkpoint_path: env::var("CHECKPOINT_PATH")
                .unwrap_or_else(|_| "./data/progress.json".to_string()),

            defect_log_path: env::var("DEFECT_LOG_PATH")
                .unwrap_or_else(|_| "./data/defective_movies.txt".to_string()),
        })
    }
}

/// Validate the server URL and strip any trailing slashes.
fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim_end_matches('/');
    Url::parse(trimmed).with_context(|| format!("Invalid JELLYFIN_URL: {raw}"))?;
    Ok(trimmed.to_string())
}
