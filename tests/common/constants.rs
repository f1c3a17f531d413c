//! Shared constants for end-to-end tests
//!
//! When the fake upstream data changes, update only this file.

// ============================================================================
// Songs known to the fake parse API
// ============================================================================

/// External id of "Sunny Day", resolvable and returned by search
pub const SONG_1_ID: &str = "228908";
pub const SONG_1_TITLE: &str = "Sunny Day";
pub const SONG_1_ARTIST: &str = "Jay";

/// External id of a second resolvable song
pub const SONG_2_ID: &str = "440613";
pub const SONG_2_TITLE: &str = "Rainy Night";

/// External id the parse API answers with a non-200 code
pub const UNKNOWN_SONG_ID: &str = "999999";

/// Keyword the fake search endpoint matches to SONG_1
pub const SEARCH_KEYWORD: &str = "sunny";

// ============================================================================
// Upstream
// ============================================================================

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_BUCKET: &str = "songs-125";

/// Size of every source file served by the fake upstream
pub const SOURCE_AUDIO_SIZE_BYTES: usize = 16 * 1024;

/// Bytes the copy engine prepends to its output
pub const ENCODED_HEADER: &[u8] = b"ID3";

// ============================================================================
// Timeouts
// ============================================================================

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;
