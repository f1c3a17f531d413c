use super::models::{AssetStatus, Backfill, MusicAsset, MusicMetadata};
use super::schema::MUSIC_VERSIONED_SCHEMAS;
use super::MusicStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, external_id, title, artist, album, duration_secs, cover_url, \
     audio_url, lyric_url, source, play_count, status, created_at, updated_at";

pub struct SqliteMusicStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMusicStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open music database at {:?}", path))?;
        // Play-count increments and parses hit the same rows concurrently.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        open_versioned(&mut conn, MUSIC_VERSIONED_SCHEMAS, is_new_db, "music")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn row_to_asset(row: &rusqlite::Row) -> rusqlite::Result<MusicAsset> {
        Ok(MusicAsset {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            title: row.get("title")?,
            artist: row.get("artist")?,
            album: row.get("album")?,
            duration_secs: row.get("duration_secs")?,
            cover_url: row.get("cover_url")?,
            audio_url: row.get("audio_url")?,
            lyric_url: row.get("lyric_url")?,
            source: row.get("source")?,
            play_count: row.get("play_count")?,
            status: AssetStatus::from_i64(row.get("status")?),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl MusicStore for SqliteMusicStore {
    fn get_by_id(&self, id: i64) -> Result<Option<MusicAsset>> {
        let conn = self.conn.lock().unwrap();
        let asset = conn
            .query_row(
                &format!("SELECT {} FROM music WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    fn get_by_external_id(&self, external_id: &str) -> Result<Option<MusicAsset>> {
        let conn = self.conn.lock().unwrap();
        let asset = conn
            .query_row(
                &format!("SELECT {} FROM music WHERE external_id = ?1", SELECT_COLUMNS),
                params![external_id],
                Self::row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    fn insert(&self, metadata: &MusicMetadata) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let now = Self::now();

        let inserted = conn.execute(
            "INSERT INTO music (external_id, title, artist, album, duration_secs, cover_url,
                                audio_url, lyric_url, source, play_count, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?11)
             ON CONFLICT(external_id) DO NOTHING",
            params![
                metadata.external_id,
                metadata.title,
                metadata.artist,
                metadata.album,
                metadata.duration_secs,
                metadata.cover_url,
                metadata.audio_url,
                metadata.lyric_url,
                metadata.source_or_default(),
                AssetStatus::Active.as_i64(),
                now,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    fn backfill(&self, id: i64, fields: &Backfill) -> Result<bool> {
        if fields.is_empty() {
            return Ok(false);
        }

        let conn = self.conn.lock().unwrap();
        // A column is only written while it is still NULL or empty, so a
        // concurrent writer that got there first wins.
        let updated = conn.execute(
            "UPDATE music SET
                cover_url = COALESCE(NULLIF(cover_url, ''), ?1, cover_url),
                audio_url = COALESCE(NULLIF(audio_url, ''), ?2, audio_url),
                lyric_url = COALESCE(NULLIF(lyric_url, ''), ?3, lyric_url),
                updated_at = ?4
             WHERE id = ?5",
            params![
                fields.cover_url,
                fields.audio_url,
                fields.lyric_url,
                Self::now(),
                id
            ],
        )?;
        Ok(updated > 0)
    }

    fn increment_play_count(&self, id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let play_count = conn
            .query_row(
                "UPDATE music SET play_count = play_count + 1 \
                 WHERE id = ?1 AND status = ?2 RETURNING play_count",
                params![id, AssetStatus::Active.as_i64()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(play_count)
    }

    fn set_status(&self, id: i64, status: AssetStatus) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE music SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_i64(), Self::now(), id],
        )?;
        Ok(updated > 0)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM music WHERE status = ?1",
            params![AssetStatus::Active.as_i64()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
