//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::background::CompletionCallback;
use crate::naming::top_folder;
use crate::torrent_client::{
    AddTorrentRequest, RecheckStart, StateCategory, TorrentClient, TorrentClientError,
    TorrentContentFile, TorrentSummary,
};

#[derive(Debug, Clone)]
struct MockTorrent {
    name: String,
    state: StateCategory,
    files: Vec<String>,
}

/// Mock implementation of the [`TorrentClient`] trait.
///
/// Adds are scripted via [`MockTorrentClient::prepare_add`]: each call to
/// `add_torrent` consumes one prepared (hash, files) pair. Every mutating
/// call is recorded for assertions, and failure flags flip individual
/// operations into verification failures.
pub struct MockTorrentClient {
    torrents: Mutex<HashMap<String, MockTorrent>>,
    prepared_adds: Mutex<VecDeque<(String, Vec<String>)>>,

    added: Mutex<Vec<AddTorrentRequest>>,
    renamed_files: Mutex<Vec<(String, String)>>,
    renamed_folders: Mutex<Vec<(String, String)>>,
    renamed_torrents: Mutex<Vec<String>>,
    resumed: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    rechecks: Mutex<Vec<String>>,
    end_sessions: AtomicU32,

    fail_resume: AtomicBool,
    fail_delete: AtomicBool,
    fail_recheck_start: AtomicBool,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self {
            torrents: Mutex::new(HashMap::new()),
            prepared_adds: Mutex::new(VecDeque::new()),
            added: Mutex::new(Vec::new()),
            renamed_files: Mutex::new(Vec::new()),
            renamed_folders: Mutex::new(Vec::new()),
            renamed_torrents: Mutex::new(Vec::new()),
            resumed: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            rechecks: Mutex::new(Vec::new()),
            end_sessions: AtomicU32::new(0),
            fail_resume: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_recheck_start: AtomicBool::new(false),
        }
    }

    /// Script what the next `add_torrent` call creates.
    pub fn prepare_add(&self, hash: &str, files: &[&str]) {
        self.prepared_adds.lock().unwrap().push_back((
            hash.to_string(),
            files.iter().map(|f| f.to_string()).collect(),
        ));
    }

    /// Pre-populate a torrent (for update flows).
    pub fn insert_torrent(&self, hash: &str, name: &str, files: &[&str], state: StateCategory) {
        self.torrents.lock().unwrap().insert(
            hash.to_string(),
            MockTorrent {
                name: name.to_string(),
                state,
                files: files.iter().map(|f| f.to_string()).collect(),
            },
        );
    }

    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_recheck_start(&self, fail: bool) {
        self.fail_recheck_start.store(fail, Ordering::SeqCst);
    }

    pub fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.lock().unwrap().contains_key(hash)
    }

    pub fn torrent_name(&self, hash: &str) -> Option<String> {
        self.torrents
            .lock()
            .unwrap()
            .get(hash)
            .map(|t| t.name.clone())
    }

    pub fn files_of(&self, hash: &str) -> Vec<String> {
        self.torrents
            .lock()
            .unwrap()
            .get(hash)
            .map(|t| t.files.clone())
            .unwrap_or_default()
    }

    pub fn added_count(&self) -> usize {
        self.added.lock().unwrap().len()
    }

    pub fn renamed_files(&self) -> Vec<(String, String)> {
        self.renamed_files.lock().unwrap().clone()
    }

    pub fn renamed_folders(&self) -> Vec<(String, String)> {
        self.renamed_folders.lock().unwrap().clone()
    }

    pub fn renamed_torrents(&self) -> Vec<String> {
        self.renamed_torrents.lock().unwrap().clone()
    }

    pub fn resumed(&self) -> Vec<String> {
        self.resumed.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn rechecks(&self) -> Vec<String> {
        self.rechecks.lock().unwrap().clone()
    }

    pub fn end_session_count(&self) -> u32 {
        self.end_sessions.load(Ordering::SeqCst)
    }

    fn summary(torrent: &MockTorrent, hash: &str) -> TorrentSummary {
        TorrentSummary {
            hash: hash.to_string(),
            name: torrent.name.clone(),
            state: torrent.state,
            raw_state: torrent.state.as_str().to_string(),
            progress: 1.0,
        }
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_background_recheck(&self) -> bool {
        true
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<Option<String>, TorrentClientError> {
        self.added.lock().unwrap().push(request);

        let Some((hash, files)) = self.prepared_adds.lock().unwrap().pop_front() else {
            return Err(TorrentClientError::InvalidTorrent(
                "no prepared add".to_string(),
            ));
        };

        let mut torrents = self.torrents.lock().unwrap();
        if torrents.contains_key(&hash) {
            return Ok(None);
        }

        let name = files
            .first()
            .map(|f| {
                let folder = top_folder(f);
                if folder.is_empty() {
                    f.clone()
                } else {
                    folder.to_string()
                }
            })
            .unwrap_or_else(|| hash.clone());

        torrents.insert(
            hash.clone(),
            MockTorrent {
                name,
                state: StateCategory::Stopped,
                files,
            },
        );

        Ok(Some(hash))
    }

    async fn list_torrents(
        &self,
        hash: Option<&str>,
    ) -> Result<Vec<TorrentSummary>, TorrentClientError> {
        let torrents = self.torrents.lock().unwrap();
        Ok(torrents
            .iter()
            .filter(|(h, _)| hash.is_none_or(|wanted| wanted == h.as_str()))
            .map(|(h, t)| Self::summary(t, h))
            .collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentSummary>, TorrentClientError> {
        let torrents = self.torrents.lock().unwrap();
        Ok(torrents.get(hash).map(|t| Self::summary(t, hash)))
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        let torrents = self.torrents.lock().unwrap();
        Ok(torrents
            .get(hash)
            .map(|t| {
                t.files
                    .iter()
                    .map(|f| TorrentContentFile {
                        path: f.clone(),
                        size_bytes: 0,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<bool, TorrentClientError> {
        if old_path == new_path {
            return Ok(true);
        }

        let mut torrents = self.torrents.lock().unwrap();
        let Some(torrent) = torrents.get_mut(hash) else {
            return Ok(false);
        };
        let Some(file) = torrent.files.iter_mut().find(|f| f.as_str() == old_path) else {
            return Ok(false);
        };
        *file = new_path.to_string();

        self.renamed_files
            .lock()
            .unwrap()
            .push((old_path.to_string(), new_path.to_string()));
        Ok(true)
    }

    async fn rename_folder(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<bool, TorrentClientError> {
        if old_path == new_path {
            return Ok(true);
        }

        let mut torrents = self.torrents.lock().unwrap();
        let Some(torrent) = torrents.get_mut(hash) else {
            return Ok(false);
        };
        for file in torrent.files.iter_mut() {
            if top_folder(file) == old_path {
                let rest = file
                    .split_once('/')
                    .map(|(_, rest)| rest.to_string())
                    .unwrap_or_else(|| file.clone());
                *file = format!("{}/{}", new_path, rest);
            }
        }

        self.renamed_folders
            .lock()
            .unwrap()
            .push((old_path.to_string(), new_path.to_string()));
        Ok(true)
    }

    async fn rename_torrent(
        &self,
        hash: &str,
        new_name: &str,
    ) -> Result<bool, TorrentClientError> {
        let mut torrents = self.torrents.lock().unwrap();
        let Some(torrent) = torrents.get_mut(hash) else {
            return Ok(false);
        };
        torrent.name = new_name.to_string();

        self.renamed_torrents
            .lock()
            .unwrap()
            .push(new_name.to_string());
        Ok(true)
    }

    async fn resume_torrent(&self, hash: &str) -> Result<bool, TorrentClientError> {
        if self.fail_resume.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let mut torrents = self.torrents.lock().unwrap();
        let Some(torrent) = torrents.get_mut(hash) else {
            return Ok(false);
        };
        torrent.state = StateCategory::Active;

        self.resumed.lock().unwrap().push(hash.to_string());
        Ok(true)
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        _delete_files: bool,
    ) -> Result<bool, TorrentClientError> {
        // Absent torrent: success without issuing a remote delete.
        if !self.torrents.lock().unwrap().contains_key(hash) {
            return Ok(true);
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Ok(false);
        }

        self.torrents.lock().unwrap().remove(hash);
        self.deleted.lock().unwrap().push(hash.to_string());
        Ok(true)
    }

    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        let mut torrents = self.torrents.lock().unwrap();
        if let Some(torrent) = torrents.get_mut(hash) {
            torrent.state = StateCategory::Checking;
        }
        self.rechecks.lock().unwrap().push(hash.to_string());
        Ok(())
    }

    async fn recheck_and_resume(
        &self,
        hash: &str,
        on_complete: Option<CompletionCallback>,
    ) -> Result<RecheckStart, TorrentClientError> {
        self.rechecks.lock().unwrap().push(hash.to_string());

        if self.fail_recheck_start.load(Ordering::SeqCst) {
            return Ok(RecheckStart {
                started: false,
                message: "Failed to start recheck: simulated".to_string(),
            });
        }

        if let Some(torrent) = self.torrents.lock().unwrap().get_mut(hash) {
            torrent.state = StateCategory::Active;
        }
        if let Some(callback) = on_complete {
            callback(true, "Torrent active after recheck".to_string());
        }

        Ok(RecheckStart {
            started: true,
            message: "Recheck checking, monitoring in background".to_string(),
        })
    }

    async fn end_session(&self) -> Result<(), TorrentClientError> {
        self.end_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
