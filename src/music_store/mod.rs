mod models;
mod schema;
mod sqlite_music_store;

pub use models::*;
pub use schema::MUSIC_VERSIONED_SCHEMAS;
pub use sqlite_music_store::SqliteMusicStore;

use anyhow::Result;

/// Persistent catalog of music assets, keyed by internal id and unique
/// external id.
pub trait MusicStore: Send + Sync {
    fn get_by_id(&self, id: i64) -> Result<Option<MusicAsset>>;
    fn get_by_external_id(&self, external_id: &str) -> Result<Option<MusicAsset>>;

    /// Inserts a new asset. Returns `None` when the external id already exists.
    fn insert(&self, metadata: &MusicMetadata) -> Result<Option<i64>>;

    /// Fills columns that are still NULL or empty. Returns whether a row matched.
    fn backfill(&self, id: i64, fields: &Backfill) -> Result<bool>;

    /// Atomically bumps the play counter of an active asset, returning the
    /// new value. `None` for unknown or deleted assets.
    fn increment_play_count(&self, id: i64) -> Result<Option<i64>>;

    fn set_status(&self, id: i64, status: AssetStatus) -> Result<bool>;

    /// Number of active assets.
    fn count(&self) -> Result<usize>;
}
