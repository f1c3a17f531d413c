//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, SONG_1_ID, SONG_1_TITLE};
//!
//! #[tokio::test]
//! async fn test_parse() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let id = client.parse_ok(SONG_1_ID, SONG_1_TITLE).await;
//!     assert!(id > 0);
//! }
//! ```
#![allow(dead_code)]

mod client;
mod constants;
mod engine;
mod server;
mod upstream;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
pub use upstream::source_audio;
