//! SQLite-backed title store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{Title, TitleStore, TitleStoreError};

/// SQLite-backed title store.
pub struct SqliteTitleStore {
    conn: Mutex<Connection>,
}

impl SqliteTitleStore {
    /// Open the store, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, TitleStoreError> {
        let conn = Connection::open(path).map_err(|e| TitleStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, TitleStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TitleStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TitleStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS titles (
                code_name TEXT PRIMARY KEY,
                torrent_name TEXT NOT NULL,
                season_number TEXT NOT NULL,
                episode_index INTEGER,
                adjusted_episode_number INTEGER NOT NULL DEFAULT 0,
                download_dir TEXT NOT NULL DEFAULT '',
                release_group TEXT NOT NULL DEFAULT '',
                meta TEXT NOT NULL DEFAULT '',
                publish_date TEXT,
                hash TEXT,
                guid TEXT,
                is_partial_season INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_title(row: &rusqlite::Row) -> rusqlite::Result<Title> {
        let episode_index: Option<i64> = row.get(3)?;
        let publish_date_str: Option<String> = row.get(8)?;
        let publish_date = publish_date_str.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(Title {
            code_name: row.get(0)?,
            torrent_name: row.get(1)?,
            season_number: row.get(2)?,
            episode_index: episode_index.and_then(|v| usize::try_from(v).ok()),
            adjusted_episode_number: row.get(4)?,
            download_dir: row.get(5)?,
            release_group: row.get(6)?,
            meta: row.get(7)?,
            publish_date,
            hash: row.get(9)?,
            guid: row.get(10)?,
            is_partial_season: row.get::<_, i64>(11)? != 0,
        })
    }
}

const TITLE_COLUMNS: &str = "code_name, torrent_name, season_number, episode_index, \
    adjusted_episode_number, download_dir, release_group, meta, publish_date, hash, guid, \
    is_partial_season";

impl TitleStore for SqliteTitleStore {
    fn load(&self, code_name: &str) -> Result<Option<Title>, TitleStoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM titles WHERE code_name = ?",
                TITLE_COLUMNS
            ))
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        let mut rows = stmt
            .query_map(params![code_name], Self::row_to_title)
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| TitleStoreError::Database(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    fn save(&self, title: &Title) -> Result<(), TitleStoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO titles ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                TITLE_COLUMNS
            ),
            params![
                title.code_name,
                title.torrent_name,
                title.season_number,
                title.episode_index.map(|v| v as i64),
                title.adjusted_episode_number,
                title.download_dir,
                title.release_group,
                title.meta,
                title.publish_date.map(|d| d.to_rfc3339()),
                title.hash,
                title.guid,
                title.is_partial_season as i64,
            ],
        )
        .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list(&self) -> Result<Vec<Title>, TitleStoreError> {
        let conn = self.conn.lock().expect("connection lock poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM titles ORDER BY code_name",
                TITLE_COLUMNS
            ))
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_title)
            .map_err(|e| TitleStoreError::Database(e.to_string()))?;

        let mut titles = Vec::new();
        for row in rows {
            titles.push(row.map_err(|e| TitleStoreError::Database(e.to_string()))?);
        }
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_title() -> Title {
        Title {
            code_name: "show-s01".to_string(),
            torrent_name: "My Show".to_string(),
            season_number: "01".to_string(),
            episode_index: Some(2),
            adjusted_episode_number: -9,
            download_dir: "/downloads/tv".to_string(),
            release_group: "RG".to_string(),
            meta: "WEB".to_string(),
            publish_date: Some(Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()),
            hash: Some("abc123".to_string()),
            guid: Some("t12345".to_string()),
            is_partial_season: true,
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = SqliteTitleStore::in_memory().unwrap();
        let title = sample_title();

        store.save(&title).unwrap();
        let loaded = store.load("show-s01").unwrap().unwrap();
        assert_eq!(loaded, title);
    }

    #[test]
    fn test_load_unknown_returns_none() {
        let store = SqliteTitleStore::in_memory().unwrap();
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = SqliteTitleStore::in_memory().unwrap();
        let mut title = sample_title();

        store.save(&title).unwrap();
        title.hash = Some("def456".to_string());
        title.episode_index = None;
        store.save(&title).unwrap();

        let loaded = store.load("show-s01").unwrap().unwrap();
        assert_eq!(loaded.hash.as_deref(), Some("def456"));
        assert_eq!(loaded.episode_index, None);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_is_ordered() {
        let store = SqliteTitleStore::in_memory().unwrap();
        let mut b = sample_title();
        b.code_name = "b-show".to_string();
        let mut a = sample_title();
        a.code_name = "a-show".to_string();

        store.save(&b).unwrap();
        store.save(&a).unwrap();

        let titles = store.list().unwrap();
        assert_eq!(titles[0].code_name, "a-show");
        assert_eq!(titles[1].code_name, "b-show");
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.db");

        {
            let store = SqliteTitleStore::new(&path).unwrap();
            store.save(&sample_title()).unwrap();
        }

        let store = SqliteTitleStore::new(&path).unwrap();
        assert!(store.load("show-s01").unwrap().is_some());
    }
}
