//! qBittorrent torrent client implementation.
//!
//! Async-supervised variant: long integrity checks are handed to the
//! [`BackgroundTaskManager`] so `recheck_and_resume` returns within the
//! quick-start window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use reqwest::{multipart, Client};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::background::{BackgroundTaskManager, CheckSnapshot, CompletionCallback, RecheckClient};
use crate::config::QbittorrentConfig;
use crate::naming::top_folder;
use crate::retry::RetryExecutor;

use super::{
    AddTorrentRequest, RecheckStart, StateCategory, TorrentClient, TorrentClientError,
    TorrentContentFile, TorrentSummary,
};

/// qBittorrent client implementation.
pub struct QbittorrentClient {
    http: Arc<QbitHttp>,
    retry: RetryExecutor,
    tasks: Arc<BackgroundTaskManager>,
    config: QbittorrentConfig,
}

impl QbittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QbittorrentConfig) -> Self {
        Self {
            http: Arc::new(QbitHttp::new(&config)),
            retry: RetryExecutor::new(config.retry.clone()),
            tasks: Arc::new(BackgroundTaskManager::new(config.background.clone())),
            config,
        }
    }

    /// Cancel a running background recheck. Returns whether one was found.
    pub fn cancel_background_recheck(&self, hash: &str) -> bool {
        self.tasks.cancel(hash)
    }

    /// Whether a background recheck is being supervised for `hash`.
    pub fn is_background_recheck_active(&self, hash: &str) -> bool {
        self.tasks.is_active(hash)
    }

    /// Identifiers with an active background recheck.
    pub fn active_background_rechecks(&self) -> Vec<String> {
        self.tasks.active_ids()
    }

    /// Cancel background work and release the session.
    pub async fn shutdown(&self) {
        self.tasks.shutdown();
        if let Err(e) = self.end_session().await {
            debug!("Logout during shutdown failed: {}", e);
        }
    }

    /// Wait briefly for a requested recheck to actually start.
    async fn quick_wait_for_recheck_start(
        &self,
        hash: &str,
    ) -> Result<QuickStart, TorrentClientError> {
        let deadline = Instant::now() + self.config.background.quick_start();

        while Instant::now() < deadline {
            let Some(torrent) = self.http.find_torrent(hash).await? else {
                return Ok(QuickStart::NotStarted);
            };

            match torrent.state {
                StateCategory::Checking => return Ok(QuickStart::Checking),
                // Instantaneous recheck: the torrent is already past the
                // checking phase.
                StateCategory::Active => return Ok(QuickStart::AlreadyActive(torrent.raw_state)),
                _ => {}
            }

            tokio::time::sleep(self.config.timeouts.poll_interval()).await;
        }

        Ok(QuickStart::NotStarted)
    }
}

enum QuickStart {
    Checking,
    AlreadyActive(String),
    NotStarted,
}

#[async_trait]
impl TorrentClient for QbittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    fn supports_background_recheck(&self) -> bool {
        true
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<Option<String>, TorrentClientError> {
        let hash = compute_info_hash(&request.data)?;

        if self.http.find_torrent(&hash).await?.is_some() {
            info!("Torrent {:.8} already exists", hash);
            return Ok(None);
        }

        let conflict = AtomicBool::new(false);
        let http = &self.http;
        let request_ref = &request;
        let conflict_ref = &conflict;
        let hash_ref = &hash;

        let added = self
            .retry
            .run(
                "add torrent",
                || async move {
                    match http.send_add(request_ref).await {
                        // Lost an add race; verification decides what exists.
                        Err(TorrentClientError::Conflict(_)) => {
                            conflict_ref.store(true, Ordering::SeqCst);
                            Ok(())
                        }
                        other => other,
                    }
                },
                || async move { Ok(http.find_torrent(hash_ref).await?.is_some()) },
            )
            .await?;

        if conflict.load(Ordering::SeqCst) {
            info!("Torrent {:.8} already exists (add race)", hash);
            return Ok(None);
        }

        Ok(added.then_some(hash))
    }

    async fn list_torrents(
        &self,
        hash: Option<&str>,
    ) -> Result<Vec<TorrentSummary>, TorrentClientError> {
        self.http.list_torrents(hash).await
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentSummary>, TorrentClientError> {
        self.http.find_torrent(hash).await
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        self.http.files(hash).await
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

        let http = &self.http;
        let verified = self
            .retry
            .run(
                &format!("rename file '{}'", old_path),
                || async move { http.send_rename_file(hash, old_path, new_path).await },
                || async move {
                    let files = http.files(hash).await?;
                    let new_exists = files.iter().any(|f| f.path == new_path);
                    let old_exists = files.iter().any(|f| f.path == old_path);
                    Ok(new_exists && !old_exists)
                },
            )
            .await?;

        Ok(verified)
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

        let http = &self.http;
        let verified = self
            .retry
            .run(
                &format!("rename folder '{}'", old_path),
                || async move { http.send_rename_folder(hash, old_path, new_path).await },
                || async move {
                    let files = http.files(hash).await?;
                    let new_exists = files.iter().any(|f| top_folder(&f.path) == new_path);
                    let old_exists = files.iter().any(|f| top_folder(&f.path) == old_path);
                    Ok(new_exists && !old_exists)
                },
            )
            .await?;

        Ok(verified)
    }

    async fn rename_torrent(
        &self,
        hash: &str,
        new_name: &str,
    ) -> Result<bool, TorrentClientError> {
        let http = &self.http;
        let verified = self
            .retry
            .run(
                &format!("rename torrent to '{}'", new_name),
                || async move { http.send_rename(hash, new_name).await },
                || async move {
                    Ok(http
                        .find_torrent(hash)
                        .await?
                        .is_some_and(|t| t.name == new_name))
                },
            )
            .await?;

        Ok(verified)
    }

    async fn resume_torrent(&self, hash: &str) -> Result<bool, TorrentClientError> {
        let http = &self.http;
        let verified = self
            .retry
            .run(
                "resume torrent",
                || async move { http.send_resume(hash).await },
                || async move {
                    Ok(http
                        .find_torrent(hash)
                        .await?
                        .is_some_and(|t| t.state == StateCategory::Active))
                },
            )
            .await?;

        Ok(verified)
    }

    async fn delete_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<bool, TorrentClientError> {
        if self.http.find_torrent(hash).await?.is_none() {
            return Ok(true);
        }

        let http = &self.http;
        let verified = self
            .retry
            .run(
                "delete torrent",
                || async move { http.send_delete(hash, delete_files).await },
                || async move { Ok(http.find_torrent(hash).await?.is_none()) },
            )
            .await?;

        Ok(verified)
    }

    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.http.send_recheck(hash).await
    }

    async fn recheck_and_resume(
        &self,
        hash: &str,
        on_complete: Option<CompletionCallback>,
    ) -> Result<RecheckStart, TorrentClientError> {
        if self.http.find_torrent(hash).await?.is_none() {
            return Ok(RecheckStart {
                started: false,
                message: "Torrent not found".to_string(),
            });
        }

        if self.tasks.is_active(hash) {
            return Ok(RecheckStart {
                started: true,
                message: "Recheck already in progress (monitored)".to_string(),
            });
        }

        if let Err(e) = self.http.send_recheck(hash).await {
            return Ok(RecheckStart {
                started: false,
                message: format!("Failed to start recheck: {}", e),
            });
        }

        let phase = match self.quick_wait_for_recheck_start(hash).await? {
            QuickStart::Checking => "checking",
            QuickStart::AlreadyActive(raw_state) => {
                return Ok(RecheckStart {
                    started: true,
                    message: format!("Torrent already active: {}", raw_state),
                });
            }
            QuickStart::NotStarted => {
                if let Some(torrent) = self.http.find_torrent(hash).await? {
                    if torrent.state == StateCategory::Error {
                        return Ok(RecheckStart {
                            started: false,
                            message: format!("Torrent in error state: {}", torrent.raw_state),
                        });
                    }
                }
                "pending"
            }
        };

        let client = Arc::clone(&self.http) as Arc<dyn RecheckClient>;
        if !self.tasks.spawn(hash, client, on_complete) {
            return Ok(RecheckStart {
                started: true,
                message: "Recheck already in progress (monitored)".to_string(),
            });
        }

        Ok(RecheckStart {
            started: true,
            message: format!("Recheck {}, monitoring in background", phase),
        })
    }

    async fn end_session(&self) -> Result<(), TorrentClientError> {
        self.http.logout().await
    }
}

/// Compute the content info-hash of a .torrent payload before submission.
fn compute_info_hash(data: &[u8]) -> Result<String, TorrentClientError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(data).map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
    Ok(torrent.info_hash.as_string())
}

/// HTTP transport with cookie-session handling.
///
/// Shared between the client facade and the background supervisor.
struct QbitHttp {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    /// Whether a session cookie is believed valid (refreshed on 403).
    authenticated: RwLock<bool>,
}

impl QbitHttp {
    fn new(config: &QbittorrentConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            authenticated: RwLock::new(false),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v2{}", self.base_url, endpoint)
    }

    /// Login and mark the session valid.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/auth/login"))
            .form(&params)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.authenticated.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send a request, re-authenticating once when the session expired.
    async fn request<F>(&self, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let mut response = build(&self.client).send().await.map_err(map_transport_err)?;

        if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            *self.authenticated.write().await = false;
            self.login().await?;
            response = build(&self.client).send().await.map_err(map_transport_err)?;
        }

        let status = response.status();
        if status.as_u16() == 409 {
            let body = response.text().await.unwrap_or_default();
            return Err(TorrentClientError::Conflict(body));
        }
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        let url = self.url(endpoint);
        self.request(|c| c.get(&url)).await
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        let url = self.url(endpoint);
        self.request(|c| c.post(&url).form(&params)).await
    }

    async fn find_torrent(&self, hash: &str) -> Result<Option<TorrentSummary>, TorrentClientError> {
        let hash = hash.to_lowercase();
        let body = self
            .get(&format!("/torrents/info?hashes={}", hash))
            .await?;
        let torrents: Vec<QbTorrentInfo> = parse_json(&body)?;

        Ok(torrents
            .into_iter()
            .find(|t| t.hash.eq_ignore_ascii_case(&hash))
            .map(QbTorrentInfo::into_summary))
    }

    async fn list_torrents(
        &self,
        hash: Option<&str>,
    ) -> Result<Vec<TorrentSummary>, TorrentClientError> {
        let endpoint = match hash {
            Some(hash) => format!("/torrents/info?hashes={}", hash.to_lowercase()),
            None => "/torrents/info".to_string(),
        };
        let body = self.get(&endpoint).await?;
        let torrents: Vec<QbTorrentInfo> = parse_json(&body)?;
        Ok(torrents
            .into_iter()
            .map(QbTorrentInfo::into_summary)
            .collect())
    }

    async fn files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        let body = self
            .get(&format!("/torrents/files?hash={}", hash.to_lowercase()))
            .await?;
        let files: Vec<QbFileEntry> = parse_json(&body)?;

        Ok(files
            .into_iter()
            .map(|f| TorrentContentFile {
                path: f.name.replace('\\', "/"),
                size_bytes: f.size.max(0) as u64,
            })
            .collect())
    }

    async fn send_add(&self, request: &AddTorrentRequest) -> Result<(), TorrentClientError> {
        let url = self.url("/torrents/add");
        let body = self
            .request(|c| {
                let part = multipart::Part::bytes(request.data.clone())
                    .file_name("payload.torrent")
                    .mime_str("application/x-bittorrent")
                    .expect("static mime type");

                let mut form = multipart::Form::new().part("torrents", part);
                if let Some(dir) = &request.download_dir {
                    form = form.text("savepath", dir.clone());
                }
                if let Some(category) = &request.category {
                    form = form.text("category", category.clone());
                }
                if !request.tags.is_empty() {
                    form = form.text("tags", request.tags.join(","));
                }
                if request.paused {
                    form = form.text("paused", "true");
                }

                c.post(&url).multipart(form)
            })
            .await?;

        // Older API versions answer duplicates with 200 "Fails."
        if body.contains("Fails.") {
            return Err(TorrentClientError::Conflict(body));
        }
        Ok(())
    }

    async fn send_rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form(
            "/torrents/renameFile",
            &[("hash", &hash), ("oldPath", old_path), ("newPath", new_path)],
        )
        .await?;
        Ok(())
    }

    async fn send_rename_folder(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form(
            "/torrents/renameFolder",
            &[("hash", &hash), ("oldPath", old_path), ("newPath", new_path)],
        )
        .await?;
        Ok(())
    }

    async fn send_rename(&self, hash: &str, new_name: &str) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form("/torrents/rename", &[("hash", &hash), ("name", new_name)])
            .await?;
        Ok(())
    }

    async fn send_resume(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form("/torrents/resume", &[("hashes", &hash)])
            .await?;
        Ok(())
    }

    async fn send_delete(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };
        self.post_form(
            "/torrents/delete",
            &[("hashes", &hash), ("deleteFiles", delete_str)],
        )
        .await?;
        Ok(())
    }

    async fn send_recheck(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash = hash.to_lowercase();
        self.post_form("/torrents/recheck", &[("hashes", &hash)])
            .await?;
        Ok(())
    }

    /// Log out; any failure is ignored so teardown stays idempotent.
    async fn logout(&self) -> Result<(), TorrentClientError> {
        *self.authenticated.write().await = false;
        match self.client.post(self.url("/auth/logout")).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("qBittorrent logout failed: {}", e);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RecheckClient for QbitHttp {
    async fn check_state(
        &self,
        hash: &str,
    ) -> Result<Option<CheckSnapshot>, TorrentClientError> {
        Ok(self.find_torrent(hash).await?.map(|t| CheckSnapshot {
            state: t.state,
            progress: t.progress,
        }))
    }

    async fn request_resume(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.send_resume(hash).await
    }
}

fn map_transport_err(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, TorrentClientError> {
    serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QbTorrentInfo {
    hash: String,
    name: String,
    state: String,
    #[serde(default)]
    progress: f64,
}

impl QbTorrentInfo {
    fn into_summary(self) -> TorrentSummary {
        TorrentSummary {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            raw_state: self.state,
            progress: self.progress,
        }
    }
}

/// qBittorrent file entry response.
#[derive(Debug, Deserialize)]
struct QbFileEntry {
    name: String,
    #[serde(default)]
    size: i64,
}

/// Classify a qBittorrent status string.
fn parse_qb_state(state: &str) -> StateCategory {
    match state {
        "downloading" | "uploading" | "stalledDL" | "stalledUP" | "forcedDL" | "forcedUP"
        | "metaDL" | "allocating" | "queuedDL" | "queuedUP" => StateCategory::Active,
        "checkingDL" | "checkingUP" | "checkingResumeData" => StateCategory::Checking,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => StateCategory::Stopped,
        "error" | "missingFiles" | "unknown" => StateCategory::Error,
        _ => StateCategory::Other,
    }
}
