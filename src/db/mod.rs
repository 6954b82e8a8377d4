pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        // WAL mode for better concurrent read performance
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Delete any database at `path` and open a new, empty one.
    pub fn recreate(path: &Path) -> Result<Self> {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            match std::fs::remove_file(&file) {
                Ok(()) => log::debug!("Removed {}", Path::new(&file).display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.ensure_schema()
    }

    /// Create the four history tables and their constraints if missing.
    pub fn ensure_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        log::debug!("Schema at version {}", SCHEMA_VERSION);
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// V1: tracks, episodes, playbacks and the links between them
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS track (
                id              TEXT PRIMARY KEY,
                uri             TEXT UNIQUE NOT NULL,
                track_name      TEXT,
                artist_name     TEXT
            );

            CREATE TABLE IF NOT EXISTS episode (
                id              TEXT PRIMARY KEY,
                uri             TEXT UNIQUE NOT NULL,
                episode_name    TEXT,
                show_name       TEXT
            );

            CREATE TABLE IF NOT EXISTS playback (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                played_at       TEXT NOT NULL,
                ms_played       INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS playback_activity (
                playback_id     INTEGER NOT NULL REFERENCES playback(id) ON DELETE CASCADE,
                track_id        TEXT REFERENCES track(id) ON DELETE CASCADE,
                episode_id      TEXT REFERENCES episode(id) ON DELETE CASCADE,
                CHECK (track_id IS NOT NULL OR episode_id IS NOT NULL)
            );

            CREATE INDEX IF NOT EXISTS idx_activity_playback ON playback_activity(playback_id);
            CREATE INDEX IF NOT EXISTS idx_activity_track ON playback_activity(track_id);
            CREATE INDEX IF NOT EXISTS idx_activity_episode ON playback_activity(episode_id);
            CREATE INDEX IF NOT EXISTS idx_playback_played_at ON playback(played_at);
            ",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(db: &Database) -> Vec<String> {
        let mut stmt = db
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn creates_history_tables() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            table_names(&db),
            vec!["episode", "playback", "playback_activity", "track"]
        );
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute("INSERT INTO playback (played_at, ms_played) VALUES ('2020-01-01T00:00:00Z', 5000)", [])
            .unwrap();

        db.ensure_schema().unwrap();
        db.migrate_v1().unwrap();

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM playback", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn link_needs_existing_track() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute("INSERT INTO playback (played_at, ms_played) VALUES ('2020-01-01T00:00:00Z', 5000)", [])
            .unwrap();
        let result = db.conn.execute(
            "INSERT INTO playback_activity (playback_id, track_id) VALUES (1, 'missing')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn link_needs_some_target() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute("INSERT INTO playback (played_at, ms_played) VALUES ('2020-01-01T00:00:00Z', 5000)", [])
            .unwrap();
        let result = db.conn.execute(
            "INSERT INTO playback_activity (playback_id) VALUES (1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn recreate_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn
                .execute("INSERT INTO playback (played_at, ms_played) VALUES ('2020-01-01T00:00:00Z', 5000)", [])
                .unwrap();
        }

        let db = Database::recreate(&path).unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM playback", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
