//! Transmission torrent client implementation.
//!
//! Synchronous-recheck variant: `recheck_and_resume` waits for the check
//! inline (bounded by the configured timeouts) instead of handing it to a
//! background supervisor. Talks Transmission RPC: JSON over POST with the
//! `X-Transmission-Session-Id` 409 handshake.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::background::CompletionCallback;
use crate::config::TransmissionConfig;
use crate::naming::{base_name, top_folder};
use crate::retry::RetryExecutor;

use super::{
    AddTorrentRequest, RecheckStart, StateCategory, TorrentClient, TorrentClientError,
    TorrentContentFile, TorrentSummary,
};

/// Transmission client implementation.
pub struct TransmissionClient {
    rpc: TransmissionRpc,
    retry: RetryExecutor,
    config: TransmissionConfig,
}

impl TransmissionClient {
    /// Create a new Transmission client.
    pub fn new(config: TransmissionConfig) -> Self {
        Self {
            rpc: TransmissionRpc::new(&config),
            retry: RetryExecutor::new(config.retry.clone()),
            config,
        }
    }

    /// Wait until the torrent enters, then leaves, the checking state.
    async fn wait_out_recheck(&self, hash: &str) -> Result<(), TorrentClientError> {
        let poll = self.config.timeouts.poll_interval();

        let start_deadline = Instant::now() + self.config.timeouts.recheck_start();
        let mut checking_seen = false;
        while Instant::now() < start_deadline {
            match self.rpc.find_torrent(hash).await? {
                Some(t) if t.state == StateCategory::Checking => {
                    checking_seen = true;
                    break;
                }
                Some(_) => {}
                None => return Ok(()),
            }
            tokio::time::sleep(poll).await;
        }

        if !checking_seen {
            return Ok(());
        }

        let complete_deadline = Instant::now() + self.config.timeouts.recheck_complete();
        while Instant::now() < complete_deadline {
            match self.rpc.find_torrent(hash).await? {
                Some(t) if t.state == StateCategory::Checking => {}
                _ => return Ok(()),
            }
            tokio::time::sleep(poll).await;
        }

        Ok(())
    }

    async fn recheck_and_resume_inner(
        &self,
        hash: &str,
    ) -> Result<(bool, String), TorrentClientError> {
        if self.rpc.find_torrent(hash).await?.is_none() {
            return Ok((false, "Torrent not found".to_string()));
        }

        if let Err(e) = self.rpc.send_verify(hash).await {
            return Ok((false, format!("Failed to start recheck: {}", e)));
        }

        self.wait_out_recheck(hash).await?;

        let poll = self.config.timeouts.poll_interval();
        for attempt in 1..=3u32 {
            if let Err(e) = self.rpc.send_start(hash).await {
                warn!("Resume attempt {} failed: {}", attempt, e);
            }

            tokio::time::sleep(poll).await;

            match self.rpc.find_torrent(hash).await? {
                Some(t) if t.state == StateCategory::Active => {
                    return Ok((true, format!("Torrent active in state: {}", t.raw_state)));
                }
                Some(t) if t.state == StateCategory::Error => {
                    return Ok((false, format!("Torrent in error state: {}", t.raw_state)));
                }
                Some(_) => {}
                None => return Ok((false, "Torrent not found after resume".to_string())),
            }

            tokio::time::sleep(poll * attempt).await;
        }

        match self.rpc.find_torrent(hash).await? {
            Some(t) if t.state != StateCategory::Error => {
                Ok((true, format!("Torrent exists in state: {}", t.raw_state)))
            }
            Some(t) => Ok((false, format!("Torrent in error state: {}", t.raw_state))),
            None => Ok((false, "Torrent not found after resume".to_string())),
        }
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    fn name(&self) -> &str {
        "transmission"
    }

    fn supports_background_recheck(&self) -> bool {
        false
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<Option<String>, TorrentClientError> {
        let hash = compute_info_hash(&request.data)?;

        if self.rpc.find_torrent(&hash).await?.is_some() {
            info!("Torrent {:.8} already exists", hash);
            return Ok(None);
        }

        let conflict = AtomicBool::new(false);
        let rpc = &self.rpc;
        let request_ref = &request;
        let conflict_ref = &conflict;
        let hash_ref = &hash;

        let added = self
            .retry
            .run(
                "add torrent",
                || async move {
                    match rpc.send_add(request_ref).await {
                        Err(TorrentClientError::Conflict(_)) => {
                            conflict_ref.store(true, Ordering::SeqCst);
                            Ok(())
                        }
                        other => other,
                    }
                },
                || async move { Ok(rpc.find_torrent(hash_ref).await?.is_some()) },
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
        self.rpc.list_torrents(hash).await
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentSummary>, TorrentClientError> {
        self.rpc.find_torrent(hash).await
    }

    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        self.rpc.files(hash).await
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

        let rpc = &self.rpc;
        let new_leaf = base_name(new_path);
        let verified = self
            .retry
            .run(
                &format!("rename file '{}'", old_path),
                || async move { rpc.send_rename_path(hash, old_path, new_leaf).await },
                || async move {
                    let files = rpc.files(hash).await?;
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

        let rpc = &self.rpc;
        let verified = self
            .retry
            .run(
                &format!("rename folder '{}'", old_path),
                || async move { rpc.send_rename_path(hash, old_path, new_path).await },
                || async move {
                    let files = rpc.files(hash).await?;
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
        // Transmission has no separate display name; renaming the root path
        // renames the torrent.
        let rpc = &self.rpc;
        let verified = self
            .retry
            .run(
                &format!("rename torrent to '{}'", new_name),
                || async move {
                    let Some(current) = rpc.find_torrent(hash).await? else {
                        return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
                    };
                    if current.name == new_name {
                        return Ok(());
                    }
                    rpc.send_rename_path(hash, &current.name, new_name).await
                },
                || async move {
                    Ok(rpc
                        .find_torrent(hash)
                        .await?
                        .is_some_and(|t| t.name == new_name))
                },
            )
            .await?;

        Ok(verified)
    }

    async fn resume_torrent(&self, hash: &str) -> Result<bool, TorrentClientError> {
        let rpc = &self.rpc;
        let verified = self
            .retry
            .run(
                "resume torrent",
                || async move { rpc.send_start(hash).await },
                || async move {
                    Ok(rpc
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
        if self.rpc.find_torrent(hash).await?.is_none() {
            return Ok(true);
        }

        let rpc = &self.rpc;
        let verified = self
            .retry
            .run(
                "delete torrent",
                || async move { rpc.send_remove(hash, delete_files).await },
                || async move { Ok(rpc.find_torrent(hash).await?.is_none()) },
            )
            .await?;

        Ok(verified)
    }

    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.rpc.send_verify(hash).await
    }

    async fn recheck_and_resume(
        &self,
        hash: &str,
        on_complete: Option<CompletionCallback>,
    ) -> Result<RecheckStart, TorrentClientError> {
        let (success, message) = self.recheck_and_resume_inner(hash).await?;

        if let Some(callback) = on_complete {
            let msg = message.clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(success, msg))).is_err() {
                error!("Recheck completion callback panicked");
            }
        }

        Ok(RecheckStart {
            started: success,
            message,
        })
    }

    async fn end_session(&self) -> Result<(), TorrentClientError> {
        // The RPC session is stateless beyond the CSRF token; nothing to
        // release.
        debug!("Transmission session released");
        Ok(())
    }
}

fn compute_info_hash(data: &[u8]) -> Result<String, TorrentClientError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(data).map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
    Ok(torrent.info_hash.as_string())
}

/// Transmission RPC transport.
struct TransmissionRpc {
    client: Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
    /// CSRF token, refreshed on 409.
    session_id: RwLock<Option<String>>,
}

impl TransmissionRpc {
    fn new(config: &TransmissionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            session_id: RwLock::new(None),
        }
    }

    async fn send_once(&self, body: &Value) -> Result<reqwest::Response, TorrentClientError> {
        let mut request = self.client.post(&self.url).json(body);

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        if let Some(session_id) = self.session_id.read().await.as_deref() {
            request = request.header("X-Transmission-Session-Id", session_id);
        }

        request.send().await.map_err(map_transport_err)
    }

    /// Issue one RPC call, redoing the 409 session-id handshake when needed.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, TorrentClientError> {
        let body = json!({ "method": method, "arguments": arguments });

        let mut response = self.send_once(&body).await?;
        if response.status().as_u16() == 409 {
            let token = response
                .headers()
                .get("X-Transmission-Session-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    TorrentClientError::ApiError("409 without session id header".to_string())
                })?;
            debug!("Transmission session id refreshed");
            *self.session_id.write().await = Some(token);
            response = self.send_once(&body).await?;
        }

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))?;

        let result = envelope["result"].as_str().unwrap_or("");
        if result != "success" {
            return Err(TorrentClientError::ApiError(format!(
                "RPC failure: {}",
                result
            )));
        }

        Ok(envelope["arguments"].clone())
    }

    async fn torrent_get(
        &self,
        hash: Option<&str>,
        fields: &[&str],
    ) -> Result<Vec<Value>, TorrentClientError> {
        let mut arguments = json!({ "fields": fields });
        if let Some(hash) = hash {
            arguments["ids"] = json!([hash.to_lowercase()]);
        }

        let response = self.call("torrent-get", arguments).await?;
        Ok(response["torrents"].as_array().cloned().unwrap_or_default())
    }

    async fn find_torrent(&self, hash: &str) -> Result<Option<TorrentSummary>, TorrentClientError> {
        let torrents = self
            .torrent_get(
                Some(hash),
                &["hashString", "name", "status", "error", "percentDone"],
            )
            .await?;

        Ok(torrents.first().map(value_to_summary))
    }

    async fn list_torrents(
        &self,
        hash: Option<&str>,
    ) -> Result<Vec<TorrentSummary>, TorrentClientError> {
        let torrents = self
            .torrent_get(
                hash,
                &["hashString", "name", "status", "error", "percentDone"],
            )
            .await?;

        Ok(torrents.iter().map(value_to_summary).collect())
    }

    async fn files(&self, hash: &str) -> Result<Vec<TorrentContentFile>, TorrentClientError> {
        let torrents = self.torrent_get(Some(hash), &["files"]).await?;
        let Some(torrent) = torrents.first() else {
            return Ok(Vec::new());
        };

        let files = torrent["files"].as_array().cloned().unwrap_or_default();
        Ok(files
            .iter()
            .map(|f| TorrentContentFile {
                path: f["name"].as_str().unwrap_or_default().replace('\\', "/"),
                size_bytes: f["length"].as_u64().unwrap_or(0),
            })
            .collect())
    }

    async fn send_add(&self, request: &AddTorrentRequest) -> Result<(), TorrentClientError> {
        let mut arguments = json!({
            "metainfo": BASE64.encode(&request.data),
            "paused": request.paused,
        });
        if let Some(dir) = &request.download_dir {
            arguments["download-dir"] = json!(dir);
        }
        let mut labels: Vec<&str> = Vec::new();
        if let Some(category) = &request.category {
            labels.push(category.as_str());
        }
        labels.extend(request.tags.iter().map(String::as_str));
        if !labels.is_empty() {
            arguments["labels"] = json!(labels);
        }

        let response = self.call("torrent-add", arguments).await?;
        if response.get("torrent-duplicate").is_some() {
            return Err(TorrentClientError::Conflict(
                "torrent-duplicate".to_string(),
            ));
        }
        Ok(())
    }

    async fn send_rename_path(
        &self,
        hash: &str,
        path: &str,
        name: &str,
    ) -> Result<(), TorrentClientError> {
        self.call(
            "torrent-rename-path",
            json!({ "ids": [hash.to_lowercase()], "path": path, "name": name }),
        )
        .await?;
        Ok(())
    }

    async fn send_start(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.call("torrent-start", json!({ "ids": [hash.to_lowercase()] }))
            .await?;
        Ok(())
    }

    async fn send_remove(&self, hash: &str, delete_files: bool) -> Result<(), TorrentClientError> {
        self.call(
            "torrent-remove",
            json!({ "ids": [hash.to_lowercase()], "delete-local-data": delete_files }),
        )
        .await?;
        Ok(())
    }

    async fn send_verify(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.call("torrent-verify", json!({ "ids": [hash.to_lowercase()] }))
            .await?;
        Ok(())
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

fn value_to_summary(torrent: &Value) -> TorrentSummary {
    let status = torrent["status"].as_i64().unwrap_or(-1);
    let error = torrent["error"].as_i64().unwrap_or(0);
    let (state, raw_state) = classify_tr_status(status, error);

    TorrentSummary {
        hash: torrent["hashString"]
            .as_str()
            .unwrap_or_default()
            .to_lowercase(),
        name: torrent["name"].as_str().unwrap_or_default().to_string(),
        state,
        raw_state,
        progress: torrent["percentDone"].as_f64().unwrap_or(0.0),
    }
}

/// Classify a Transmission numeric status (plus error flag).
fn classify_tr_status(status: i64, error: i64) -> (StateCategory, String) {
    if error != 0 {
        return (StateCategory::Error, format!("error({})", error));
    }
    match status {
        0 => (StateCategory::Stopped, "stopped".to_string()),
        1 | 2 => (StateCategory::Checking, "checking".to_string()),
        3 | 4 => (StateCategory::Active, "downloading".to_string()),
        5 | 6 => (StateCategory::Active, "seeding".to_string()),
        other => (StateCategory::Other, format!("status({})", other)),
    }
}
