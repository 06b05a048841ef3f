//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait covering the lifecycle
//! operations the orchestrator needs (add, rename, resume, delete, recheck),
//! implemented for qBittorrent and Transmission backends. Every
//! state-changing operation is verified against remote state through the
//! retry executor.

mod qbittorrent;
mod transmission;
mod types;

pub use qbittorrent::QbittorrentClient;
pub use transmission::TransmissionClient;
pub use types::*;
