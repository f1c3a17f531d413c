//! SQLite schema definitions for the music catalog database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

// =============================================================================
// Version 1 - Music assets
// =============================================================================

const MUSIC_TABLE_V1: Table = Table {
    name: "music",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "external_id",
            &SqlType::Text,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("duration_secs", &SqlType::Integer),
        sqlite_column!("cover_url", &SqlType::Text),
        sqlite_column!("audio_url", &SqlType::Text),
        sqlite_column!("lyric_url", &SqlType::Text),
        sqlite_column!(
            "source",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'kuwo'")
        ),
        sqlite_column!(
            "play_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        // 1 = active, 0 = soft deleted
        sqlite_column!(
            "status",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
    ],
    indices: &[
        ("idx_music_created_at", "created_at"),
        ("idx_music_status", "status"),
    ],
};

pub const MUSIC_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[MUSIC_TABLE_V1],
    migration: None,
}];
