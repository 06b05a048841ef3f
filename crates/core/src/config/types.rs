use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Which torrent client backend to talk to.
    pub client: ClientBackend,
    #[serde(default)]
    pub qbittorrent: Option<QbittorrentConfig>,
    #[serde(default)]
    pub transmission: Option<TransmissionConfig>,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Available torrent client backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientBackend {
    Qbittorrent,
    Transmission,
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QbittorrentConfig {
    /// Base URL (e.g. "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub background: BackgroundTaskConfig,
}

/// Transmission RPC configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    /// RPC endpoint (e.g. "http://localhost:9091/transmission/rpc")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_http_timeout() -> u32 {
    30
}

/// Workflow-level settings shared by the add/update paths
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Pause after a state-changing call before the first verification poll,
    /// absorbing client-side propagation latency.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: f64,
    /// Category assigned to every added torrent.
    #[serde(default)]
    pub category: String,
    /// Tag assigned to every added torrent.
    #[serde(default)]
    pub tag: String,
    /// Render names dot-separated instead of space-separated.
    #[serde(default)]
    pub dot_spacing: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            category: String::new(),
            tag: String::new(),
            dot_spacing: false,
        }
    }
}

impl LifecycleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settle_delay_secs)
    }
}

fn default_settle_delay() -> f64 {
    10.0
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("renamarr.db")
}

/// Retry behavior for verified client operations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Pause between issuing an operation and its first verification check.
    #[serde(default = "default_verification_delay")]
    pub verification_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
            backoff_factor: default_backoff_factor(),
            verification_delay_secs: default_verification_delay(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs_f64(self.initial_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.max_delay_secs)
    }

    pub fn verification_delay(&self) -> Duration {
        Duration::from_secs_f64(self.verification_delay_secs)
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    10.0
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_verification_delay() -> f64 {
    3.0
}

/// Timeouts for synchronous client operations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Overall ceiling for composite operations.
    #[serde(default = "default_operation_timeout")]
    pub operation_secs: f64,
    /// Max wait for a recheck to enter the checking state.
    #[serde(default = "default_recheck_start_timeout")]
    pub recheck_start_secs: f64,
    /// Max wait for a recheck to finish when handled inline.
    #[serde(default = "default_recheck_complete_timeout")]
    pub recheck_complete_secs: f64,
    /// Interval between state polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            operation_secs: default_operation_timeout(),
            recheck_start_secs: default_recheck_start_timeout(),
            recheck_complete_secs: default_recheck_complete_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl TimeoutConfig {
    pub fn operation(&self) -> Duration {
        Duration::from_secs_f64(self.operation_secs)
    }

    pub fn recheck_start(&self) -> Duration {
        Duration::from_secs_f64(self.recheck_start_secs)
    }

    pub fn recheck_complete(&self) -> Duration {
        Duration::from_secs_f64(self.recheck_complete_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }
}

fn default_operation_timeout() -> f64 {
    360.0
}

fn default_recheck_start_timeout() -> f64 {
    100.0
}

fn default_recheck_complete_timeout() -> f64 {
    30.0
}

fn default_poll_interval() -> f64 {
    2.0
}

/// Background recheck supervision tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackgroundTaskConfig {
    /// Max concurrent supervised rechecks.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Overall ceiling for one background recheck.
    #[serde(default = "default_recheck_timeout")]
    pub recheck_timeout_secs: f64,
    /// No progress for this long logs a stall warning (the check continues).
    #[serde(default = "default_stall_timeout")]
    pub progress_stall_secs: f64,
    /// Interval between background state polls.
    #[serde(default = "default_background_poll")]
    pub poll_interval_secs: f64,
    /// Max wait to confirm a recheck actually started before handing the
    /// identifier to the background supervisor.
    #[serde(default = "default_quick_start_timeout")]
    pub quick_start_secs: f64,
}

impl Default for BackgroundTaskConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            recheck_timeout_secs: default_recheck_timeout(),
            progress_stall_secs: default_stall_timeout(),
            poll_interval_secs: default_background_poll(),
            quick_start_secs: default_quick_start_timeout(),
        }
    }
}

impl BackgroundTaskConfig {
    pub fn recheck_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.recheck_timeout_secs)
    }

    pub fn progress_stall(&self) -> Duration {
        Duration::from_secs_f64(self.progress_stall_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn quick_start(&self) -> Duration {
        Duration::from_secs_f64(self.quick_start_secs)
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_recheck_timeout() -> f64 {
    1800.0
}

fn default_stall_timeout() -> f64 {
    300.0
}

fn default_background_poll() -> f64 {
    10.0
}

fn default_quick_start_timeout() -> f64 {
    30.0
}
