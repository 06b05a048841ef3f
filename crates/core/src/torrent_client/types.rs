//! Types for torrent client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::background::CompletionCallback;
use crate::retry::RetryError;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("Duplicate torrent: {0}")]
    Conflict(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error(transparent)]
    RetryExhausted(#[from] RetryError),
}

/// Mutually exclusive classification of a torrent's remote status.
///
/// Backends report many status strings/codes; the lifecycle only cares which
/// bucket they land in. Statuses outside every bucket map to `Other`, which
/// callers treat as "keep polling" rather than a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    /// Downloading, uploading, stalled, forced, allocating, queued or
    /// fetching metadata.
    Active,
    /// Integrity check (including resume-data check) in progress.
    Checking,
    /// Paused or stopped.
    Stopped,
    /// Error, missing files, or the client's literal "unknown" status.
    Error,
    /// Unrecognized status; not a terminal classification.
    Other,
}

impl StateCategory {
    /// Returns the string representation for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateCategory::Active => "active",
            StateCategory::Checking => "checking",
            StateCategory::Stopped => "stopped",
            StateCategory::Error => "error",
            StateCategory::Other => "other",
        }
    }
}

/// Summary of one remote torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentSummary {
    /// Torrent identifier (content info-hash, lowercase hex).
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Classified state.
    pub state: StateCategory,
    /// Status exactly as the backend reported it, for log messages.
    pub raw_state: String,
    /// Completion fraction (0.0 - 1.0).
    pub progress: f64,
}

/// A file inside a torrent, possibly nested under a top-level folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentContentFile {
    /// Path within the torrent (canonical `/` separators).
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Request to add a new torrent from payload bytes.
#[derive(Debug, Clone)]
pub struct AddTorrentRequest {
    /// Raw .torrent file bytes.
    pub data: Vec<u8>,
    /// Optional category/label.
    pub category: Option<String>,
    /// Tags to assign.
    pub tags: Vec<String>,
    /// Start paused.
    pub paused: bool,
    /// Optional download directory override.
    pub download_dir: Option<String>,
}

impl AddTorrentRequest {
    /// Create a request with default options.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            category: None,
            tags: Vec::new(),
            paused: false,
            download_dir: None,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !category.is_empty() {
            self.category = Some(category);
        }
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !tag.is_empty() {
            self.tags.push(tag);
        }
        self
    }

    /// Set whether to start paused.
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Set the download directory.
    pub fn with_download_dir(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        if !dir.is_empty() {
            self.download_dir = Some(dir);
        }
        self
    }
}

/// Outcome of a recheck-and-resume request.
#[derive(Debug, Clone)]
pub struct RecheckStart {
    /// Whether the recheck was started (or found unnecessary).
    pub started: bool,
    /// Human-readable status folded into operation logs.
    pub message: String,
}

/// Trait for torrent client backends.
///
/// Implementations differ in recheck semantics: the async-supervised variant
/// hands long integrity checks to a background supervisor and returns
/// immediately, the synchronous variant completes the recheck inline. Callers
/// branch on [`TorrentClient::supports_background_recheck`] only where that
/// distinction matters.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Whether `recheck_and_resume` supervises completion in the background.
    fn supports_background_recheck(&self) -> bool;

    /// Add a torrent from payload bytes, verified by its content-derived
    /// identifier becoming visible.
    ///
    /// Returns `None` when the torrent is already present or lost an add
    /// race; `Some(hash)` on verified success.
    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<Option<String>, TorrentClientError>;

    /// List torrents, optionally restricted to one identifier.
    async fn list_torrents(
        &self,
        hash: Option<&str>,
    ) -> Result<Vec<TorrentSummary>, TorrentClientError>;

    /// Get one torrent by identifier, `None` when absent.
    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentSummary>, TorrentClientError>;

    /// Get the files of a torrent.
    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError>;

    /// Rename a file, verified by the new path being present and the old one
    /// gone. Renaming a file to its current path is a no-op success.
    async fn rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<bool, TorrentClientError>;

    /// Rename the top-level folder, verified on the leading path segment.
    async fn rename_folder(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<bool, TorrentClientError>;

    /// Rename the torrent's display name, verified against the summary.
    async fn rename_torrent(
        &self,
        hash: &str,
        new_name: &str,
    ) -> Result<bool, TorrentClientError>;

    /// Resume a torrent, verified by it reaching an active state.
    async fn resume_torrent(&self, hash: &str) -> Result<bool, TorrentClientError>;

    /// Delete a torrent, verified by its absence afterwards. Deleting an
    /// absent torrent is a success and issues no remote call.
    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<bool, TorrentClientError>;

    /// Start an integrity check without waiting for it.
    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Recheck the torrent and resume it once the check completes.
    ///
    /// `on_complete` fires exactly once with the final outcome; for the
    /// background-supervised variant that may be long after this call
    /// returned.
    async fn recheck_and_resume(
        &self,
        hash: &str,
        on_complete: Option<CompletionCallback>,
    ) -> Result<RecheckStart, TorrentClientError>;

    /// Release the client session. Idempotent.
    async fn end_session(&self) -> Result<(), TorrentClientError>;
}
