//! Persisted per-release records.

mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteTitleStore;

/// Errors from the title store.
#[derive(Debug, Error)]
pub enum TitleStoreError {
    #[error("Database error: {0}")]
    Database(String),
}

/// One tracked release: everything needed to re-derive canonical names and
/// to find the release again on the indexer.
///
/// `hash` and `guid` are set only after a successful add; the orchestrator
/// persists the record only when a workflow succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    /// Unique key.
    pub code_name: String,
    /// Display title used in rendered names.
    pub torrent_name: String,
    /// Season as it appears in names (zero-padded, e.g. "01").
    pub season_number: String,
    /// Position of the episode number among extracted numeric tokens.
    /// `None` until resolved.
    pub episode_index: Option<usize>,
    /// Signed offset applied to every extracted episode number.
    pub adjusted_episode_number: i64,
    /// Download directory passed to the torrent client.
    pub download_dir: String,
    /// Release group rendered into names.
    pub release_group: String,
    /// Quality/source tag rendered into names (e.g. "WEB").
    pub meta: String,
    /// Publish date of the currently held release.
    pub publish_date: Option<DateTime<Utc>>,
    /// Identifier of the torrent currently held by the client.
    pub hash: Option<String>,
    /// Indexer item id the release was resolved from.
    pub guid: Option<String>,
    /// Whether the torrent bundles a strict subset of the season.
    pub is_partial_season: bool,
}

impl Title {
    /// Create a record with naming fields set and everything else unset.
    pub fn new(
        code_name: impl Into<String>,
        torrent_name: impl Into<String>,
        season_number: impl Into<String>,
    ) -> Self {
        Self {
            code_name: code_name.into(),
            torrent_name: torrent_name.into(),
            season_number: season_number.into(),
            episode_index: None,
            adjusted_episode_number: 0,
            download_dir: String::new(),
            release_group: String::new(),
            meta: String::new(),
            publish_date: None,
            hash: None,
            guid: None,
            is_partial_season: false,
        }
    }
}

/// Store for [`Title`] records, keyed by `code_name`.
pub trait TitleStore: Send + Sync {
    /// Load one record, `None` when unknown.
    fn load(&self, code_name: &str) -> Result<Option<Title>, TitleStoreError>;

    /// Insert or replace one record.
    fn save(&self, title: &Title) -> Result<(), TitleStoreError>;

    /// All records, ordered by code name.
    fn list(&self) -> Result<Vec<Title>, TitleStoreError>;
}
