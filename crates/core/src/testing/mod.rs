//! Testing utilities and mock implementations.
//!
//! Mock collaborators for exercising the lifecycle workflows without a real
//! indexer or torrent client. The mocks record every call so tests can
//! assert on the exact sequence of remote operations.

mod mock_indexer;
mod mock_torrent_client;

pub use mock_indexer::MockIndexer;
pub use mock_torrent_client::MockTorrentClient;
