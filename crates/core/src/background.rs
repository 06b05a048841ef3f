//! Background recheck supervision.
//!
//! Integrity checks can run for tens of minutes and must not block the
//! workflow that triggered them. The manager owns a bounded worker pool keyed
//! by torrent identifier: at most one supervised task per identifier,
//! cooperative cancellation, and a completion callback fired exactly once.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::BackgroundTaskConfig;
use crate::torrent_client::{StateCategory, TorrentClientError};

/// Callback invoked exactly once when a supervised recheck finishes.
pub type CompletionCallback = Box<dyn FnOnce(bool, String) + Send + 'static>;

/// Snapshot of a torrent while its integrity check runs.
#[derive(Debug, Clone, Copy)]
pub struct CheckSnapshot {
    pub state: StateCategory,
    /// Completion fraction (0.0 - 1.0).
    pub progress: f64,
}

/// Minimal client surface the supervisor polls while a check runs.
#[async_trait]
pub trait RecheckClient: Send + Sync {
    /// Current snapshot, or `None` when the torrent is gone.
    async fn check_state(&self, hash: &str)
        -> Result<Option<CheckSnapshot>, TorrentClientError>;

    /// Ask the backend to resume the torrent.
    async fn request_resume(&self, hash: &str) -> Result<(), TorrentClientError>;
}

/// Terminal state of one supervised task.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskOutcome {
    Completed(String),
    Failed(String),
    Cancelled,
}

/// Resume retry budget once a check has finished.
const RESUME_ATTEMPTS: u32 = 5;

/// Supervises recheck completion tasks, at most one per torrent identifier.
pub struct BackgroundTaskManager {
    config: BackgroundTaskConfig,
    workers: Arc<Semaphore>,
    active: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl BackgroundTaskManager {
    pub fn new(config: BackgroundTaskConfig) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(config.max_workers)),
            active: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Start supervising the recheck of `hash`.
    ///
    /// Returns `false` without spawning when the identifier is already
    /// supervised; the check-and-insert is atomic under the map lock. The
    /// task may queue behind the worker pool before it starts polling.
    pub fn spawn(
        self: &Arc<Self>,
        hash: &str,
        client: Arc<dyn RecheckClient>,
        on_complete: Option<CompletionCallback>,
    ) -> bool {
        let cancel = {
            let mut active = self.active.lock().expect("task map lock poisoned");
            if active.contains_key(hash) {
                return false;
            }
            let flag = Arc::new(AtomicBool::new(false));
            active.insert(hash.to_string(), Arc::clone(&flag));
            flag
        };

        let manager = Arc::clone(self);
        let hash = hash.to_string();
        tokio::spawn(async move {
            let _permit = manager
                .workers
                .acquire()
                .await
                .expect("worker semaphore closed");
            let outcome = manager.supervise(&hash, client.as_ref(), &cancel).await;
            manager.finish(&hash, outcome, on_complete);
        });

        true
    }

    /// Request cooperative cancellation. Returns whether a task was found.
    ///
    /// The flag is observed at the next poll; remote calls already issued are
    /// not rolled back.
    pub fn cancel(&self, hash: &str) -> bool {
        let active = self.active.lock().expect("task map lock poisoned");
        match active.get(hash) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Whether a supervised task exists for this identifier.
    pub fn is_active(&self, hash: &str) -> bool {
        self.active
            .lock()
            .expect("task map lock poisoned")
            .contains_key(hash)
    }

    /// Identifiers with a supervised task.
    pub fn active_ids(&self) -> Vec<String> {
        self.active
            .lock()
            .expect("task map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Cancel every supervised task (client teardown).
    pub fn shutdown(&self) {
        let active = self.active.lock().expect("task map lock poisoned");
        for flag in active.values() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    async fn supervise(
        &self,
        hash: &str,
        client: &dyn RecheckClient,
        cancel: &AtomicBool,
    ) -> TaskOutcome {
        let short = short_hash(hash);
        debug!("[recheck:{}] Starting recheck monitor", short);

        let final_state = match self.wait_for_check_completion(hash, client, cancel).await {
            Ok(state) => state,
            Err(outcome) => return outcome,
        };

        if cancel.load(Ordering::SeqCst) {
            return TaskOutcome::Cancelled;
        }

        debug!(
            "[recheck:{}] Recheck complete ({}), resuming",
            short,
            final_state.as_str()
        );
        self.resume_and_verify(hash, client).await
    }

    /// Poll until the torrent leaves the checking state, watching for stalls.
    async fn wait_for_check_completion(
        &self,
        hash: &str,
        client: &dyn RecheckClient,
        cancel: &AtomicBool,
    ) -> Result<StateCategory, TaskOutcome> {
        let cfg = &self.config;
        let short = short_hash(hash);
        let deadline = Instant::now() + cfg.recheck_timeout();
        let mut last_progress = 0.0_f64;
        let mut last_progress_at = Instant::now();
        let mut last_logged_pct = -1_i32;

        while Instant::now() < deadline {
            if cancel.load(Ordering::SeqCst) {
                return Err(TaskOutcome::Cancelled);
            }

            let snapshot = match client.check_state(hash).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    return Err(TaskOutcome::Failed(
                        "Torrent not found during recheck".to_string(),
                    ))
                }
                Err(e) => return Err(TaskOutcome::Failed(format!("Background error: {}", e))),
            };

            if snapshot.state != StateCategory::Checking {
                if snapshot.state == StateCategory::Error {
                    return Err(TaskOutcome::Failed(format!(
                        "Recheck failed: {} state",
                        snapshot.state.as_str()
                    )));
                }
                return Ok(snapshot.state);
            }

            let pct = (snapshot.progress * 100.0) as i32;
            if pct >= last_logged_pct + 10 {
                debug!("[recheck:{}] Recheck progress: {}%", short, pct);
                last_logged_pct = pct;
            }

            if snapshot.progress > last_progress + 0.001 {
                last_progress = snapshot.progress;
                last_progress_at = Instant::now();
            } else if last_progress_at.elapsed() > cfg.progress_stall() {
                // Checks legitimately pause while the client is busy with
                // other work; warn and keep waiting. Resetting the timer
                // avoids repeating the warning every poll.
                warn!(
                    "[recheck:{}] Recheck stalled at {}% for {:?}",
                    short,
                    pct,
                    cfg.progress_stall()
                );
                last_progress_at = Instant::now();
            }

            tokio::time::sleep(cfg.poll_interval()).await;
        }

        // Timed out; one final look in case the check finished on the boundary.
        match client.check_state(hash).await {
            Ok(Some(snapshot)) if snapshot.state == StateCategory::Checking => {
                Err(TaskOutcome::Failed(format!(
                    "Recheck timed out at {}%",
                    (snapshot.progress * 100.0) as i32
                )))
            }
            Ok(Some(snapshot)) => Ok(snapshot.state),
            Ok(None) => Err(TaskOutcome::Failed(
                "Torrent not found during recheck".to_string(),
            )),
            Err(e) => Err(TaskOutcome::Failed(format!("Background error: {}", e))),
        }
    }

    /// Resume with a bounded retry budget; any non-error final state counts
    /// as success.
    async fn resume_and_verify(&self, hash: &str, client: &dyn RecheckClient) -> TaskOutcome {
        let short = short_hash(hash);
        let poll = self.config.poll_interval();

        for attempt in 1..=RESUME_ATTEMPTS {
            if let Err(e) = client.request_resume(hash).await {
                warn!(
                    "[recheck:{}] Resume attempt {} failed: {}",
                    short, attempt, e
                );
            }

            tokio::time::sleep(poll).await;

            match client.check_state(hash).await {
                Ok(Some(snapshot)) => match snapshot.state {
                    StateCategory::Active => {
                        return TaskOutcome::Completed("Torrent active after recheck".to_string())
                    }
                    StateCategory::Error => {
                        return TaskOutcome::Failed(
                            "Torrent in error state after recheck".to_string(),
                        )
                    }
                    _ => {}
                },
                Ok(None) => {
                    return TaskOutcome::Failed("Torrent not found after resume".to_string())
                }
                Err(e) => {
                    warn!("[recheck:{}] State check failed: {}", short, e);
                }
            }

            tokio::time::sleep(poll * attempt).await;
        }

        match client.check_state(hash).await {
            Ok(Some(snapshot)) if snapshot.state != StateCategory::Error => TaskOutcome::Completed(
                format!("Torrent in {} state after recheck", snapshot.state.as_str()),
            ),
            _ => TaskOutcome::Failed(format!(
                "Failed to resume after {} attempts",
                RESUME_ATTEMPTS
            )),
        }
    }

    /// Drop the map entry, log the outcome, fire the callback exactly once.
    fn finish(&self, hash: &str, outcome: TaskOutcome, on_complete: Option<CompletionCallback>) {
        self.active
            .lock()
            .expect("task map lock poisoned")
            .remove(hash);

        let short = short_hash(hash);
        let (success, message) = match outcome {
            TaskOutcome::Completed(msg) => {
                info!("[recheck:{}] {}", short, msg);
                (true, msg)
            }
            TaskOutcome::Failed(msg) => {
                error!("[recheck:{}] {}", short, msg);
                (false, msg)
            }
            TaskOutcome::Cancelled => {
                info!("[recheck:{}] Cancelled", short);
                (false, "Cancelled".to_string())
            }
        };

        if let Some(callback) = on_complete {
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(success, message))).is_err() {
                error!("[recheck:{}] Completion callback panicked", short);
            }
        }
    }
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct FakeRecheckClient {
        /// Remaining polls that report a running check.
        checking_polls: AtomicU32,
        /// State reported once the check is over.
        state_after: Mutex<StateCategory>,
        resume_count: AtomicU32,
        /// Whether a resume request flips the final state to Active.
        resume_to_active: bool,
    }

    impl FakeRecheckClient {
        fn new(checking_polls: u32, state_after: StateCategory, resume_to_active: bool) -> Self {
            Self {
                checking_polls: AtomicU32::new(checking_polls),
                state_after: Mutex::new(state_after),
                resume_count: AtomicU32::new(0),
                resume_to_active,
            }
        }
    }

    #[async_trait]
    impl RecheckClient for FakeRecheckClient {
        async fn check_state(
            &self,
            _hash: &str,
        ) -> Result<Option<CheckSnapshot>, TorrentClientError> {
            let remaining = self.checking_polls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.checking_polls.fetch_sub(1, Ordering::SeqCst);
                return Ok(Some(CheckSnapshot {
                    state: StateCategory::Checking,
                    progress: 0.5,
                }));
            }
            Ok(Some(CheckSnapshot {
                state: *self.state_after.lock().unwrap(),
                progress: 1.0,
            }))
        }

        async fn request_resume(&self, _hash: &str) -> Result<(), TorrentClientError> {
            self.resume_count.fetch_add(1, Ordering::SeqCst);
            if self.resume_to_active {
                *self.state_after.lock().unwrap() = StateCategory::Active;
            }
            Ok(())
        }
    }

    fn fast_config() -> BackgroundTaskConfig {
        BackgroundTaskConfig {
            max_workers: 4,
            recheck_timeout_secs: 2.0,
            progress_stall_secs: 1.0,
            poll_interval_secs: 0.005,
            quick_start_secs: 0.05,
        }
    }

    type CallbackSink = Arc<Mutex<Option<(bool, String)>>>;

    fn capture() -> (CallbackSink, CompletionCallback) {
        let sink: CallbackSink = Arc::new(Mutex::new(None));
        let cloned = Arc::clone(&sink);
        let callback: CompletionCallback = Box::new(move |success, message| {
            *cloned.lock().unwrap() = Some((success, message));
        });
        (sink, callback)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn test_supervised_recheck_completes_and_resumes() {
        let manager = Arc::new(BackgroundTaskManager::new(fast_config()));
        let client = Arc::new(FakeRecheckClient::new(3, StateCategory::Stopped, true));
        let (sink, callback) = capture();

        assert!(manager.spawn("hash1", Arc::clone(&client) as _, Some(callback)));
        wait_until(|| sink.lock().unwrap().is_some()).await;

        let (success, message) = sink.lock().unwrap().clone().unwrap();
        assert!(success, "expected success, got: {}", message);
        assert!(client.resume_count.load(Ordering::SeqCst) >= 1);
        assert!(!manager.is_active("hash1"));
    }

    #[tokio::test]
    async fn test_at_most_one_task_per_identifier() {
        let manager = Arc::new(BackgroundTaskManager::new(fast_config()));
        let client = Arc::new(FakeRecheckClient::new(10_000, StateCategory::Stopped, true));

        assert!(manager.spawn("hash1", Arc::clone(&client) as _, None));
        assert!(!manager.spawn("hash1", Arc::clone(&client) as _, None));
        assert_eq!(manager.active_ids(), vec!["hash1".to_string()]);

        assert!(manager.cancel("hash1"));
        wait_until(|| !manager.is_active("hash1")).await;
    }

    #[tokio::test]
    async fn test_cancellation_skips_resume() {
        let manager = Arc::new(BackgroundTaskManager::new(fast_config()));
        let client = Arc::new(FakeRecheckClient::new(10_000, StateCategory::Stopped, true));
        let (sink, callback) = capture();

        assert!(manager.spawn("hash1", Arc::clone(&client) as _, Some(callback)));
        assert!(manager.cancel("hash1"));
        wait_until(|| sink.lock().unwrap().is_some()).await;

        let (success, message) = sink.lock().unwrap().clone().unwrap();
        assert!(!success);
        assert_eq!(message, "Cancelled");
        assert_eq!(client.resume_count.load(Ordering::SeqCst), 0);
        assert!(!manager.is_active("hash1"));
    }

    #[tokio::test]
    async fn test_error_state_reports_failure() {
        let manager = Arc::new(BackgroundTaskManager::new(fast_config()));
        let client = Arc::new(FakeRecheckClient::new(2, StateCategory::Error, false));
        let (sink, callback) = capture();

        assert!(manager.spawn("hash1", Arc::clone(&client) as _, Some(callback)));
        wait_until(|| sink.lock().unwrap().is_some()).await;

        let (success, message) = sink.lock().unwrap().clone().unwrap();
        assert!(!success);
        assert!(message.contains("Recheck failed"));
    }

    #[tokio::test]
    async fn test_resume_exhaustion_accepts_non_error_state() {
        let manager = Arc::new(BackgroundTaskManager::new(fast_config()));
        // Resume never turns the torrent active; it stays stopped.
        let client = Arc::new(FakeRecheckClient::new(1, StateCategory::Stopped, false));
        let (sink, callback) = capture();

        assert!(manager.spawn("hash1", Arc::clone(&client) as _, Some(callback)));
        wait_until(|| sink.lock().unwrap().is_some()).await;

        let (success, message) = sink.lock().unwrap().clone().unwrap();
        assert!(success, "non-error final state should count as success");
        assert!(message.contains("stopped"));
        assert_eq!(
            client.resume_count.load(Ordering::SeqCst),
            RESUME_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn test_callback_panic_is_caught() {
        let manager = Arc::new(BackgroundTaskManager::new(fast_config()));
        let client = Arc::new(FakeRecheckClient::new(1, StateCategory::Stopped, true));
        let callback: CompletionCallback = Box::new(|_, _| panic!("listener bug"));

        assert!(manager.spawn("hash1", Arc::clone(&client) as _, Some(callback)));
        wait_until(|| !manager.is_active("hash1")).await;
    }

    #[tokio::test]
    async fn test_worker_pool_queues_excess_tasks() {
        let mut config = fast_config();
        config.max_workers = 1;
        let manager = Arc::new(BackgroundTaskManager::new(config));

        let first = Arc::new(FakeRecheckClient::new(5, StateCategory::Stopped, true));
        let second = Arc::new(FakeRecheckClient::new(5, StateCategory::Stopped, true));
        let (sink1, cb1) = capture();
        let (sink2, cb2) = capture();

        assert!(manager.spawn("hash1", Arc::clone(&first) as _, Some(cb1)));
        assert!(manager.spawn("hash2", Arc::clone(&second) as _, Some(cb2)));

        wait_until(|| sink1.lock().unwrap().is_some() && sink2.lock().unwrap().is_some()).await;
        assert!(sink1.lock().unwrap().clone().unwrap().0);
        assert!(sink2.lock().unwrap().clone().unwrap().0);
    }
}
