//! Mock indexer for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::indexer::{Indexer, IndexerError, IndexerTorrent};

/// Mock implementation of the [`Indexer`] trait.
///
/// Serves one scripted release and a fixed payload, recording every lookup
/// and download URL.
pub struct MockIndexer {
    base_url: String,
    torrent: Mutex<IndexerTorrent>,
    payload: Vec<u8>,
    lookups: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
}

impl MockIndexer {
    pub fn new(torrent: IndexerTorrent) -> Self {
        Self {
            base_url: "https://indexer.example".to_string(),
            torrent: Mutex::new(torrent),
            payload: b"torrent-bytes".to_vec(),
            lookups: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Change the publish date the next lookup reports.
    pub fn set_publish_date(&self, date: DateTime<Utc>) {
        self.torrent.lock().unwrap().publish_date = date;
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_torrent(&self, url: &str) -> Result<IndexerTorrent, IndexerError> {
        self.lookups.lock().unwrap().push(url.to_string());
        Ok(self.torrent.lock().unwrap().clone())
    }

    async fn download_torrent(&self, url: &str) -> Result<Vec<u8>, IndexerError> {
        self.downloads.lock().unwrap().push(url.to_string());
        Ok(self.payload.clone())
    }
}
