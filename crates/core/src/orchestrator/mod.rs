//! Torrent lifecycle orchestration.
//!
//! Composes the indexer, torrent client, episode naming, and the title store
//! into two workflows:
//! - **add**: fetch payload, add paused, rename files/folder/torrent to
//!   canonical names, resume, persist.
//! - **update**: compare publish dates, and when changed replace the torrent
//!   (delete, re-add, recheck against the files already on disk).
//!
//! Expected failures surface as a FAILURE [`OperationResult`] with a log
//! entry; only run-fatal errors (transient-exception exhaustion, broken
//! collaborators) escape as [`LifecycleError`].

mod runner;
mod types;

pub use runner::LifecycleOrchestrator;
pub use types::{LifecycleError, OperationResult, ResponseCode};
