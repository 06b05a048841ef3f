//! Indexer abstraction.
//!
//! An indexer resolves a release page to metadata and a downloadable
//! .torrent payload. The concrete client (HTML scraping, session handling,
//! per-site quirks) lives outside this crate; the orchestrator only needs
//! this surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while talking to an indexer.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Release not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),
}

/// A release as resolved by the indexer. Immutable per lookup.
#[derive(Debug, Clone)]
pub struct IndexerTorrent {
    /// Release title as listed on the indexer.
    pub name: String,
    /// Stable item id/url, stored as the Title guid.
    pub url: String,
    /// Relative URL of the .torrent payload.
    pub torrent_url: String,
    /// When the release was (re)published.
    pub publish_date: DateTime<Utc>,
    /// Uploader.
    pub author: String,
}

/// Trait for indexer backends.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Base URL the relative item/payload URLs are joined onto.
    fn base_url(&self) -> &str;

    /// Resolve a release page to its current metadata.
    async fn get_torrent(&self, url: &str) -> Result<IndexerTorrent, IndexerError>;

    /// Download the raw .torrent payload.
    async fn download_torrent(&self, url: &str) -> Result<Vec<u8>, IndexerError>;
}
