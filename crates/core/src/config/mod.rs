//! Configuration loading and tunables.
//!
//! All retry/timeout/background tunables are plain values injected at client
//! construction; nothing in this crate reads ambient global state.

mod loader;
mod types;
mod validate;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    BackgroundTaskConfig, ClientBackend, Config, DatabaseConfig, LifecycleConfig,
    QbittorrentConfig, RetryConfig, TimeoutConfig, TransmissionConfig,
};
pub use validate::validate_config;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
