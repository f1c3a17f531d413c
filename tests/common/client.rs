//! HTTP client for end-to-end tests
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// POST /api/music/parse
    pub async fn parse(&self, external_id: &str, title: &str) -> Response {
        self.parse_body(json!({
            "externalId": external_id,
            "title": title,
            "artist": SONG_1_ARTIST,
            "durationSecs": 269,
        }))
        .await
    }

    pub async fn parse_body(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/api/music/parse", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Parse request failed")
    }

    /// GET /api/music/{id}/play
    pub async fn play_info(&self, id: i64) -> Response {
        self.client
            .get(format!("{}/api/music/{}/play", self.base_url, id))
            .send()
            .await
            .expect("Play info request failed")
    }

    /// GET /api/music/{id}/stream, optionally with a Range header
    pub async fn stream(&self, id: i64, range: Option<&str>) -> Response {
        let mut request = self
            .client
            .get(format!("{}/api/music/{}/stream", self.base_url, id));
        if let Some(range) = range {
            request = request.header("Range", range);
        }
        request.send().await.expect("Stream request failed")
    }

    /// GET /api/search
    pub async fn search(&self, keyword: &str) -> Response {
        self.client
            .get(format!("{}/api/search", self.base_url))
            .query(&[("keyword", keyword), ("pageSize", "5")])
            .send()
            .await
            .expect("Search request failed")
    }

    /// GET /api/search/quick
    pub async fn quick_search(&self, keyword: &str) -> Response {
        self.client
            .get(format!("{}/api/search/quick", self.base_url))
            .query(&[("keyword", keyword)])
            .send()
            .await
            .expect("Quick search request failed")
    }

    /// Parses a song and returns its asset id, panicking on failure.
    pub async fn parse_ok(&self, external_id: &str, title: &str) -> i64 {
        let response = self.parse(external_id, title).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "parse of {} failed",
            external_id
        );
        let body: serde_json::Value = response.json().await.expect("Invalid parse body");
        body["id"].as_i64().expect("asset id missing")
    }
}
