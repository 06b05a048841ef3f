//! Lifecycle workflow implementation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::background::CompletionCallback;
use crate::config::LifecycleConfig;
use crate::indexer::{Indexer, IndexerTorrent};
use crate::naming::{self, EpisodeIndexResolver, NamingScheme};
use crate::titles::{Title, TitleStore};
use crate::torrent_client::{AddTorrentRequest, TorrentClient};

use super::types::{LifecycleError, OperationResult, ResponseCode};

/// Drives the add/update workflows against the torrent client.
///
/// One invocation runs on one logical task; concurrent runs against the same
/// Title are unsupported. The only background element is the client's own
/// recheck supervisor.
pub struct LifecycleOrchestrator {
    indexer: Arc<dyn Indexer>,
    client: Arc<dyn TorrentClient>,
    titles: Arc<dyn TitleStore>,
    config: LifecycleConfig,
    episode_resolver: Option<EpisodeIndexResolver>,
}

impl LifecycleOrchestrator {
    pub fn new(
        indexer: Arc<dyn Indexer>,
        client: Arc<dyn TorrentClient>,
        titles: Arc<dyn TitleStore>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            indexer,
            client,
            titles,
            config,
            episode_resolver: None,
        }
    }

    /// Inject the chooser invoked when a new Title has no episode index yet.
    pub fn with_episode_resolver(mut self, resolver: EpisodeIndexResolver) -> Self {
        self.episode_resolver = Some(resolver);
        self
    }

    /// Add a release for the first time.
    pub async fn add(
        &self,
        title: Title,
        torrent: IndexerTorrent,
    ) -> Result<OperationResult, LifecycleError> {
        let mut result = OperationResult::default();
        result.titles.push(title.clone());
        result.torrents.push(torrent.clone());

        let outcome = self.process_torrent(&mut result, title, &torrent, true).await;

        // Terminal adds release the session regardless of outcome.
        if let Err(e) = self.client.end_session().await {
            warn!("Failed to end client session: {}", e);
        }

        outcome?;
        Ok(result)
    }

    /// Replace a tracked release's torrent when the indexer shows a newer
    /// publish date (or unconditionally with `force`).
    pub async fn update(
        &self,
        code_name: &str,
        force: bool,
    ) -> Result<OperationResult, LifecycleError> {
        let mut result = OperationResult::default();

        let Some(title) = self.titles.load(code_name)? else {
            self.fail(&mut result, "Title not found".to_string());
            return Ok(result);
        };
        result.titles.push(title.clone());

        let guid = title.guid.clone().unwrap_or_default();
        let item_url = join_url(self.indexer.base_url(), &guid);
        let torrent = self.indexer.get_torrent(&item_url).await?;
        result.torrents.push(torrent.clone());

        if !force && title.publish_date == Some(torrent.publish_date) {
            let message = format!("Update not required: {}", torrent.name);
            info!("{}", message);
            result.operation_logs.push(message);
            result.response_code = ResponseCode::Success;
            return Ok(result);
        }

        let message = if force {
            format!("Forced update: {}", torrent.name)
        } else {
            format!("Date is different: {}", torrent.name)
        };
        info!("{}", message);
        result.operation_logs.push(message);

        let Some(hash) = title.hash.clone() else {
            self.fail(
                &mut result,
                format!("No stored torrent for: {}", torrent.name),
            );
            return Ok(result);
        };

        // Partial seasons were renamed to an episode-span folder; put the
        // base season folder back so the replacement torrent finds the
        // existing files on disk.
        if title.is_partial_season {
            info!("Processing partial season update");
            let files = self.client.get_files(&hash).await?;
            if let Some(first) = files.first() {
                let old_folder = naming::top_folder(&first.path);
                if !old_folder.is_empty() {
                    let base = self.scheme_for(&title).base_folder();
                    if !self.client.rename_folder(&hash, old_folder, &base).await? {
                        warn!("Could not revert folder '{}' to '{}'", old_folder, base);
                    }
                }
            }
        }

        if !self.client.delete_torrent(&hash, false).await? {
            self.fail(
                &mut result,
                format!("Failed to delete old torrent: {}", torrent.name),
            );
            return Ok(result);
        }

        tokio::time::sleep(self.config.settle_delay()).await;

        self.process_torrent(&mut result, title, &torrent, false)
            .await?;
        Ok(result)
    }

    /// Shared add/re-add path: download payload, add paused, rename
    /// everything to canonical names, start (or recheck), persist.
    async fn process_torrent(
        &self,
        result: &mut OperationResult,
        mut title: Title,
        torrent: &IndexerTorrent,
        new: bool,
    ) -> Result<(), LifecycleError> {
        title.publish_date = Some(torrent.publish_date);

        let payload_url = join_url(self.indexer.base_url(), &torrent.torrent_url);
        let payload = self.indexer.download_torrent(&payload_url).await?;

        let request = AddTorrentRequest::new(payload)
            .with_category(self.config.category.clone())
            .with_tag(self.config.tag.clone())
            .with_paused(true)
            .with_download_dir(title.download_dir.clone());

        let Some(hash) = self.client.add_torrent(request).await? else {
            self.fail(result, format!("Torrent already exists: {}", torrent.name));
            return Ok(());
        };

        tokio::time::sleep(self.config.settle_delay()).await;

        title.hash = Some(hash.clone());

        if self.client.get_torrent(&hash).await?.is_none() {
            self.fail(
                result,
                format!("Failed to get torrent info after adding: {}", torrent.name),
            );
            return Ok(());
        }

        let files = self.client.get_files(&hash).await?;
        let Some(first_file) = files.first().cloned() else {
            self.fail(result, format!("Torrent has no files: {}", torrent.name));
            return Ok(());
        };

        if new {
            title.guid = Some(torrent.url.clone());
            if title.episode_index.is_none() {
                let candidates = naming::extract_numbers(&first_file.path);
                let selection = self
                    .episode_resolver
                    .as_ref()
                    .and_then(|resolve| resolve(&candidates));
                let Some((index, adjustment)) = selection else {
                    self.fail(
                        result,
                        format!("Episode index not resolved for: {}", torrent.name),
                    );
                    return Ok(());
                };
                debug!(
                    "Episode index {} selected with adjustment {}",
                    index, adjustment
                );
                title.episode_index = Some(index);
                title.adjusted_episode_number = adjustment;
            }
        }

        let Some(episode_index) = title.episode_index else {
            self.fail(
                result,
                format!("Episode index not resolved for: {}", torrent.name),
            );
            return Ok(());
        };

        let scheme = self.scheme_for(&title);
        let mut episodes: Vec<i64> = Vec::new();

        for file in &files {
            let tokens = naming::extract_numbers(&file.path);
            let Some(source_episode) = tokens.get(episode_index) else {
                self.fail(
                    result,
                    format!(
                        "No numeric token at position {} in: {}",
                        episode_index + 1,
                        file.path
                    ),
                );
                return Ok(());
            };
            let Some(episode) =
                naming::shift_episode(source_episode, title.adjusted_episode_number)
            else {
                self.fail(
                    result,
                    format!(
                        "Cannot adjust episode number '{}' in: {}",
                        source_episode, file.path
                    ),
                );
                return Ok(());
            };
            episodes.push(episode.parse().unwrap_or_default());

            let new_name = scheme.file_name(&episode, naming::extension(&file.path));
            let new_path = naming::with_file_name(&file.path, &new_name);

            // Files that already carry their canonical name stay put so a
            // recheck can reuse them.
            if title.is_partial_season
                && naming::base_name(&file.path) == naming::base_name(&new_path)
            {
                debug!("Skipping rename for existing file: {}", file.path);
                continue;
            }

            if !self.client.rename_file(&hash, &file.path, &new_path).await? {
                warn!(
                    "Could not verify rename of '{}' to '{}'",
                    file.path, new_path
                );
            }
        }

        let folder_name = if title.is_partial_season {
            let min = episodes.iter().min().copied().unwrap_or(0);
            let max = episodes.iter().max().copied().unwrap_or(0);
            scheme.episode_span_folder(min, max)
        } else {
            scheme.season_folder()
        };

        let old_folder = naming::top_folder(&first_file.path);
        if !old_folder.is_empty()
            && !self
                .client
                .rename_folder(&hash, old_folder, &folder_name)
                .await?
        {
            warn!(
                "Could not verify rename of folder '{}' to '{}'",
                old_folder, folder_name
            );
        }

        if !self.client.rename_torrent(&hash, &folder_name).await? {
            warn!("Could not verify rename of torrent to '{}'", folder_name);
        }

        if new {
            if !self.client.resume_torrent(&hash).await? {
                self.fail(result, format!("Failed to start torrent: {}", torrent.name));
                return Ok(());
            }
        } else {
            let torrent_name = torrent.name.clone();
            let on_complete: CompletionCallback = Box::new(move |success, message| {
                info!(
                    "Background recheck completed for {}: {}, {}",
                    torrent_name, success, message
                );
            });

            let start = self
                .client
                .recheck_and_resume(&hash, Some(on_complete))
                .await?;
            if !start.message.is_empty() {
                if start.started {
                    info!("{}", start.message);
                } else {
                    error!("{}", start.message);
                }
                result.operation_logs.push(start.message.clone());
            }
            if !start.started {
                self.fail(
                    result,
                    format!("Failed to start recheck for torrent: {}", torrent.name),
                );
                return Ok(());
            }
        }

        self.titles.save(&title)?;
        result.response_code = ResponseCode::Success;
        Ok(())
    }

    fn scheme_for(&self, title: &Title) -> NamingScheme {
        NamingScheme {
            title: title.torrent_name.clone(),
            season: title.season_number.clone(),
            meta: title.meta.clone(),
            release_group: title.release_group.clone(),
            dot_spacing: self.config.dot_spacing,
        }
    }

    fn fail(&self, result: &mut OperationResult, message: String) {
        error!("{}", message);
        result.operation_logs.push(message);
        result.response_code = ResponseCode::Failure;
    }
}

fn join_url(base: &str, tail: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        tail.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::testing::{MockIndexer, MockTorrentClient};
    use crate::titles::SqliteTitleStore;
    use crate::torrent_client::StateCategory;

    fn test_config(dot_spacing: bool) -> LifecycleConfig {
        LifecycleConfig {
            settle_delay_secs: 0.0,
            category: "tv".to_string(),
            tag: "renamarr".to_string(),
            dot_spacing,
        }
    }

    fn sample_torrent() -> IndexerTorrent {
        IndexerTorrent {
            name: "My Show S01".to_string(),
            url: "t123".to_string(),
            torrent_url: "t123.torrent".to_string(),
            publish_date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            author: "uploader".to_string(),
        }
    }

    fn sample_title() -> Title {
        Title {
            code_name: "myshow-s01".to_string(),
            torrent_name: "My Show".to_string(),
            season_number: "01".to_string(),
            episode_index: Some(0),
            adjusted_episode_number: 0,
            download_dir: "/downloads/tv".to_string(),
            release_group: "RG".to_string(),
            meta: "WEB".to_string(),
            publish_date: None,
            hash: None,
            guid: None,
            is_partial_season: false,
        }
    }

    struct Harness {
        indexer: Arc<MockIndexer>,
        client: Arc<MockTorrentClient>,
        store: Arc<SqliteTitleStore>,
        orchestrator: LifecycleOrchestrator,
    }

    fn harness(dot_spacing: bool) -> Harness {
        let indexer = Arc::new(MockIndexer::new(sample_torrent()));
        let client = Arc::new(MockTorrentClient::new());
        let store = Arc::new(SqliteTitleStore::in_memory().unwrap());

        let orchestrator = LifecycleOrchestrator::new(
            Arc::clone(&indexer) as Arc<dyn Indexer>,
            Arc::clone(&client) as Arc<dyn TorrentClient>,
            Arc::clone(&store) as Arc<dyn TitleStore>,
            test_config(dot_spacing),
        );

        Harness {
            indexer,
            client,
            store,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_add_renames_files_folder_and_torrent() {
        let h = harness(true);
        h.client
            .prepare_add("hash1", &["My Show S01/My Show S01E01.mkv"]);

        let result = h
            .orchestrator
            .add(sample_title(), sample_torrent())
            .await
            .unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        assert_eq!(
            h.client.renamed_files(),
            vec![(
                "My Show S01/My Show S01E01.mkv".to_string(),
                "My Show S01/My.Show.S01E01.WEBRG.mkv".to_string()
            )]
        );
        assert_eq!(
            h.client.renamed_folders(),
            vec![("My Show S01".to_string(), "My.Show.S01.WEB[RG]".to_string())]
        );
        assert_eq!(
            h.client.renamed_torrents(),
            vec!["My.Show.S01.WEB[RG]".to_string()]
        );
        assert_eq!(h.client.resumed(), vec!["hash1".to_string()]);
        assert_eq!(h.client.end_session_count(), 1);

        let saved = h.store.load("myshow-s01").unwrap().unwrap();
        assert_eq!(saved.hash.as_deref(), Some("hash1"));
        assert_eq!(saved.guid.as_deref(), Some("t123"));
        assert_eq!(
            saved.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );

        assert_eq!(
            h.indexer.downloads(),
            vec!["https://indexer.example/t123.torrent".to_string()]
        );
    }

    #[tokio::test]
    async fn test_add_duplicate_torrent_fails() {
        let h = harness(true);
        h.client.insert_torrent(
            "hash1",
            "My Show S01",
            &["My Show S01/a.mkv"],
            StateCategory::Active,
        );
        h.client.prepare_add("hash1", &["My Show S01/a.mkv"]);

        let result = h
            .orchestrator
            .add(sample_title(), sample_torrent())
            .await
            .unwrap();

        assert!(!result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Torrent already exists")));
        assert!(h.store.load("myshow-s01").unwrap().is_none());
        // The session is still released on the terminal add path.
        assert_eq!(h.client.end_session_count(), 1);
    }

    #[tokio::test]
    async fn test_add_resolves_episode_index_via_injected_resolver() {
        let h = harness(false);
        let orchestrator =
            h.orchestrator
                .with_episode_resolver(Arc::new(|candidates: &[String]| {
                    // Pick the last token (the E-number) and shift by one.
                    Some((candidates.len() - 1, 1))
                }));
        h.client
            .prepare_add("hash1", &["My Show S01/My Show S01E02.mkv"]);

        let mut title = sample_title();
        title.episode_index = None;

        let result = orchestrator.add(title, sample_torrent()).await.unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        assert_eq!(
            h.client.renamed_files(),
            vec![(
                "My Show S01/My Show S01E02.mkv".to_string(),
                "My Show S01/My Show S01E03 WEB-RG.mkv".to_string()
            )]
        );

        let saved = h.store.load("myshow-s01").unwrap().unwrap();
        assert_eq!(saved.episode_index, Some(2));
        assert_eq!(saved.adjusted_episode_number, 1);
    }

    #[tokio::test]
    async fn test_add_without_resolver_fails() {
        let h = harness(false);
        h.client
            .prepare_add("hash1", &["My Show S01/My Show S01E02.mkv"]);

        let mut title = sample_title();
        title.episode_index = None;

        let result = h.orchestrator.add(title, sample_torrent()).await.unwrap();

        assert!(!result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Episode index not resolved")));
        assert!(h.store.load("myshow-s01").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_season_skips_already_named_files() {
        let h = harness(true);
        h.client
            .prepare_add("hash1", &["My Show S01/My.Show.S01E05.WEBRG.mkv"]);

        let mut title = sample_title();
        title.is_partial_season = true;
        title.episode_index = Some(2);

        let result = h.orchestrator.add(title, sample_torrent()).await.unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        assert!(h.client.renamed_files().is_empty());
        // Folder and torrent names are still normalized unconditionally.
        assert_eq!(
            h.client.renamed_folders(),
            vec![(
                "My Show S01".to_string(),
                "My.Show.S01E05.WEB[RG]".to_string()
            )]
        );
        assert_eq!(
            h.client.renamed_torrents(),
            vec!["My.Show.S01E05.WEB[RG]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_partial_season_range_folder() {
        let h = harness(false);
        h.client.prepare_add(
            "hash1",
            &[
                "My Show S01/My Show S01E01.mkv",
                "My Show S01/My Show S01E03.mkv",
            ],
        );

        let mut title = sample_title();
        title.is_partial_season = true;
        title.episode_index = Some(2);

        let result = h.orchestrator.add(title, sample_torrent()).await.unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        assert_eq!(
            h.client.renamed_torrents(),
            vec!["My Show S01E01-E03 WEB[RG]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_add_failed_resume_fails() {
        let h = harness(true);
        h.client
            .prepare_add("hash1", &["My Show S01/My Show S01E01.mkv"]);
        h.client.set_fail_resume(true);

        let result = h
            .orchestrator
            .add(sample_title(), sample_torrent())
            .await
            .unwrap();

        assert!(!result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Failed to start torrent")));
        assert!(h.store.load("myshow-s01").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_not_required_when_date_unchanged() {
        let h = harness(true);
        let mut title = sample_title();
        title.hash = Some("hash1".to_string());
        title.guid = Some("t123".to_string());
        title.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        h.store.save(&title).unwrap();
        h.client.insert_torrent(
            "hash1",
            "My.Show.S01.WEB[RG]",
            &["My.Show.S01.WEB[RG]/My.Show.S01E01.WEBRG.mkv"],
            StateCategory::Active,
        );

        let result = h.orchestrator.update("myshow-s01", false).await.unwrap();

        assert!(result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Update not required")));
        assert!(h.client.deleted().is_empty());
        assert_eq!(h.client.added_count(), 0);
    }

    #[tokio::test]
    async fn test_update_replaces_torrent_and_rechecks() {
        let h = harness(true);
        let mut title = sample_title();
        title.hash = Some("hash1".to_string());
        title.guid = Some("t123".to_string());
        title.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        h.store.save(&title).unwrap();
        h.client.insert_torrent(
            "hash1",
            "My.Show.S01.WEB[RG]",
            &["My.Show.S01.WEB[RG]/My.Show.S01E01.WEBRG.mkv"],
            StateCategory::Active,
        );
        h.client
            .prepare_add("hash2", &["My Show S01/My Show S01E01.mkv"]);

        let result = h.orchestrator.update("myshow-s01", false).await.unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        assert_eq!(h.client.deleted(), vec!["hash1".to_string()]);
        assert_eq!(h.client.rechecks(), vec!["hash2".to_string()]);
        // Resume happens through the recheck path, not a separate call.
        assert!(h.client.resumed().is_empty());
        // The update path never ends the session.
        assert_eq!(h.client.end_session_count(), 0);

        let saved = h.store.load("myshow-s01").unwrap().unwrap();
        assert_eq!(saved.hash.as_deref(), Some("hash2"));
        assert_eq!(
            saved.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_update_failed_recheck_is_not_persisted() {
        let h = harness(true);
        let mut title = sample_title();
        title.hash = Some("hash1".to_string());
        title.guid = Some("t123".to_string());
        title.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        h.store.save(&title).unwrap();
        h.client.insert_torrent(
            "hash1",
            "My.Show.S01.WEB[RG]",
            &["My.Show.S01.WEB[RG]/My.Show.S01E01.WEBRG.mkv"],
            StateCategory::Active,
        );
        h.client
            .prepare_add("hash2", &["My Show S01/My Show S01E01.mkv"]);
        h.client.set_fail_recheck_start(true);

        let result = h.orchestrator.update("myshow-s01", false).await.unwrap();

        assert!(!result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Failed to start recheck")));

        let saved = h.store.load("myshow-s01").unwrap().unwrap();
        assert_eq!(saved.hash.as_deref(), Some("hash1"));
        assert_eq!(
            saved.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_update_failed_delete_aborts_before_re_add() {
        let h = harness(true);
        let mut title = sample_title();
        title.hash = Some("hash1".to_string());
        title.guid = Some("t123".to_string());
        title.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        h.store.save(&title).unwrap();
        h.client.insert_torrent(
            "hash1",
            "My.Show.S01.WEB[RG]",
            &["My.Show.S01.WEB[RG]/My.Show.S01E01.WEBRG.mkv"],
            StateCategory::Active,
        );
        h.client.set_fail_delete(true);

        let result = h.orchestrator.update("myshow-s01", false).await.unwrap();

        assert!(!result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Failed to delete old torrent")));
        assert_eq!(h.client.added_count(), 0);
    }

    #[tokio::test]
    async fn test_update_partial_season_reverts_folder_first() {
        let h = harness(false);
        let mut title = sample_title();
        title.is_partial_season = true;
        title.episode_index = Some(2);
        title.hash = Some("hash1".to_string());
        title.guid = Some("t123".to_string());
        title.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        h.store.save(&title).unwrap();
        h.client.insert_torrent(
            "hash1",
            "My Show S01E01-E02 WEB[RG]",
            &["My Show S01E01-E02 WEB[RG]/My Show S01E01 WEB-RG.mkv"],
            StateCategory::Active,
        );
        h.client.prepare_add(
            "hash2",
            &[
                "My Show S01/My Show S01E01 WEB-RG.mkv",
                "My Show S01/My Show S01E02.mkv",
            ],
        );

        let result = h.orchestrator.update("myshow-s01", false).await.unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        let folders = h.client.renamed_folders();
        assert_eq!(
            folders.first(),
            Some(&(
                "My Show S01E01-E02 WEB[RG]".to_string(),
                "My Show S01".to_string()
            ))
        );
        assert_eq!(
            folders.last(),
            Some(&(
                "My Show S01".to_string(),
                "My Show S01E01-E02 WEB[RG]".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_update_unknown_title_fails() {
        let h = harness(true);

        let result = h.orchestrator.update("missing", false).await.unwrap();

        assert!(!result.is_success());
        assert!(result
            .operation_logs
            .iter()
            .any(|l| l.contains("Title not found")));
    }

    #[tokio::test]
    async fn test_force_update_skips_date_comparison() {
        let h = harness(true);
        let mut title = sample_title();
        title.hash = Some("hash1".to_string());
        title.guid = Some("t123".to_string());
        // Same date as the indexer reports: only force proceeds.
        title.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        h.store.save(&title).unwrap();
        h.client.insert_torrent(
            "hash1",
            "My.Show.S01.WEB[RG]",
            &["My.Show.S01.WEB[RG]/My.Show.S01E01.WEBRG.mkv"],
            StateCategory::Active,
        );
        h.client
            .prepare_add("hash2", &["My Show S01/My Show S01E01.mkv"]);

        let result = h.orchestrator.update("myshow-s01", true).await.unwrap();

        assert!(result.is_success(), "logs: {:?}", result.operation_logs);
        assert_eq!(h.client.deleted(), vec!["hash1".to_string()]);
        assert_eq!(
            h.store.load("myshow-s01").unwrap().unwrap().hash.as_deref(),
            Some("hash2")
        );
    }
}
