//! Types for the lifecycle workflows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indexer::{IndexerError, IndexerTorrent};
use crate::titles::{Title, TitleStoreError};
use crate::torrent_client::TorrentClientError;

/// Outcome class of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    Success,
    Failure,
}

/// Per-run outcome. Created fresh for every invocation and returned, never
/// reused.
#[derive(Debug)]
pub struct OperationResult {
    pub response_code: ResponseCode,
    /// Ordered, human-readable log of what happened.
    pub operation_logs: Vec<String>,
    /// Titles touched by this run.
    pub titles: Vec<Title>,
    /// Indexer results touched by this run.
    pub torrents: Vec<IndexerTorrent>,
}

impl Default for OperationResult {
    fn default() -> Self {
        Self {
            response_code: ResponseCode::Failure,
            operation_logs: Vec::new(),
            titles: Vec::new(),
            torrents: Vec::new(),
        }
    }
}

impl OperationResult {
    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        self.response_code == ResponseCode::Success
    }
}

/// Run-fatal workflow errors.
///
/// Expected failures (verification that never passes, business-rule
/// short-circuits) never surface here; they become a FAILURE result with a
/// log entry. What does surface is transient-exception exhaustion from the
/// retry executor and broken collaborators.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Client(#[from] TorrentClientError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error(transparent)]
    Store(#[from] TitleStoreError),
}
