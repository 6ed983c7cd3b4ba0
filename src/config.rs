//! Configuration for Sexton
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Sexton - alarm and offline companion for HolySeeds
///
/// "Watch ye therefore ... at the cockcrowing, or in the morning" - Mark 13:35
#[derive(Parser, Debug, Clone)]
#[command(name = "sexton")]
#[command(about = "Alarm and offline gateway companion for the HolySeeds content client")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Origin of the content app fronted by the cache worker
    /// All same-origin GET traffic is proxied (and cached) against this base
    #[arg(long, env = "ORIGIN_URL", default_value = "http://localhost:3000")]
    pub origin_url: String,

    /// Content repository endpoint (PostgREST-style REST root)
    /// e.g. "https://abcdefgh.supabase.co/rest/v1"
    #[arg(long, env = "CONTENT_API_URL")]
    pub repo_url: Option<String>,

    /// API key sent to the content repository
    #[arg(long, env = "CONTENT_API_KEY", default_value = "")]
    pub repo_key: String,

    /// Directory holding the persisted alarm settings blob
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Public base URL of this daemon for handoff and focus links
    /// Defaults to http://{listen} when unset
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// What to do with the playback handoff when notification permission
    /// is denied: "always" hands off regardless, "granted-only" skips it
    #[arg(long, env = "HANDOFF_POLICY", default_value = "always")]
    pub handoff_policy: String,

    /// Activate a freshly installed cache worker immediately instead of
    /// leaving it waiting for a manual skip-waiting message
    #[arg(long, env = "WORKER_SKIP_WAITING", default_value = "true")]
    pub skip_waiting: bool,

    /// Seconds between install retries after a failed worker install
    #[arg(long, env = "WORKER_INSTALL_RETRY_SECS", default_value = "30")]
    pub install_retry_secs: u64,

    /// Request timeout in milliseconds for origin and repository calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get the effective public base URL (no trailing slash)
    pub fn public_url(&self) -> String {
        let base = self
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen));
        base.trim_end_matches('/').to_string()
    }

    /// Get the origin base with any trailing slash removed
    pub fn origin_base(&self) -> String {
        self.origin_url.trim_end_matches('/').to_string()
    }

    /// Path of the persisted alarm settings blob
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("alarm-settings.json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.origin_url.starts_with("http://") && !self.origin_url.starts_with("https://") {
            return Err("ORIGIN_URL must be an http(s) URL".to_string());
        }

        if let Some(ref url) = self.repo_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("CONTENT_API_URL must be an http(s) URL".to_string());
            }
        }

        if self.handoff_policy != "always" && self.handoff_policy != "granted-only" {
            return Err("HANDOFF_POLICY must be \"always\" or \"granted-only\"".to_string());
        }

        if self.install_retry_secs == 0 {
            return Err("WORKER_INSTALL_RETRY_SECS must be at least 1".to_string());
        }

        Ok(())
    }
}
