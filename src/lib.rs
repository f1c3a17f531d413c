//! Songvault Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod config;
pub mod music_store;
pub mod pipeline;
pub mod playback;
pub mod resolver;
pub mod retrieval;
pub mod scratch;
pub mod server;
pub mod sqlite_persistence;
pub mod transcoder;
pub mod uploader;

// Re-export commonly used types for convenience
pub use catalog::CatalogService;
pub use music_store::{MusicStore, SqliteMusicStore};
pub use pipeline::{Pipeline, PipelineError};
pub use server::run_server;
