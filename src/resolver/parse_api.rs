//! reqwest client for the third-party parse API and the catalog search
//! endpoint.

use super::{build_lyric_url, AudioSources, CatalogSearchProvider, SearchHit, SearchPage};
use crate::config::ProviderSettings;
use crate::pipeline::PipelineError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_REFERER: &str = "http://www.kuwo.cn/";

pub struct ParseApiProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

#[derive(Debug, Deserialize)]
struct ParseApiResponse {
    code: Option<i64>,
    data: Option<ParseApiData>,
}

#[derive(Debug, Deserialize)]
struct ParseApiData {
    #[serde(rename = "music_mp3Url")]
    mp3_url: Option<String>,
    #[serde(rename = "music_flacUrl")]
    flac_url: Option<String>,
}

impl ParseApiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .context("Failed to create provider HTTP client")?;

        Ok(Self { client, settings })
    }

    fn detail_page_url(&self, external_id: &str) -> String {
        format!(
            "{}/{}",
            self.settings.detail_page_url.trim_end_matches('/'),
            external_id
        )
    }

    fn resolve_request_url(&self, api_key: &str, external_id: &str) -> String {
        format!(
            "{}?key={}&url={}",
            self.settings.parse_api_url,
            urlencoding::encode(api_key),
            urlencoding::encode(&self.detail_page_url(external_id))
        )
    }

    async fn get_text(&self, request: reqwest::RequestBuilder) -> Result<String, PipelineError> {
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Resolution(format!("provider request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Resolution(format!(
                "provider responded with status {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PipelineError::Resolution(format!("failed to read provider body: {}", e)))
    }
}

#[async_trait]
impl CatalogSearchProvider for ParseApiProvider {
    async fn resolve_audio_sources(
        &self,
        external_id: &str,
    ) -> Result<AudioSources, PipelineError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                PipelineError::Configuration("parse API key is not configured".to_string())
            })?;

        debug!("Resolving audio sources for {}", external_id);
        let body = self
            .get_text(self.client.get(self.resolve_request_url(api_key, external_id)))
            .await?;

        let parsed: ParseApiResponse = parse_lenient_json(&body)
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or_else(|| {
                PipelineError::Resolution("provider returned a malformed payload".to_string())
            })?;

        match (parsed.code, parsed.data) {
            (Some(200), Some(data)) => Ok(AudioSources {
                compressed_url: data.mp3_url.filter(|u| !u.is_empty()),
                lossless_url: data.flac_url.filter(|u| !u.is_empty()),
            }),
            (code, _) => {
                warn!(
                    "Parse API gave no usable data for {} (code {:?})",
                    external_id, code
                );
                Err(PipelineError::Resolution(format!(
                    "provider has no playable data for {}",
                    external_id
                )))
            }
        }
    }

    async fn search(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> Result<SearchPage, PipelineError> {
        // The provider counts pages from zero.
        let provider_page = page.max(1) - 1;
        let provider_page = provider_page.to_string();
        let page_size = page_size.to_string();

        let request = self
            .client
            .get(&self.settings.search_url)
            .header(header::REFERER, SEARCH_REFERER)
            .query(&[
                ("all", keyword),
                ("ft", "music"),
                ("newsearch", "1"),
                ("alflac", "1"),
                ("itemset", "web_2013"),
                ("client", "kt"),
                ("cluster", "0"),
                ("pn", provider_page.as_str()),
                ("rn", page_size.as_str()),
                ("vermerge", "1"),
                ("rformat", "json"),
                ("encoding", "utf8"),
                ("show_copyright_off", "1"),
                ("pcmp4", "1"),
                ("ver", "mbox"),
                ("plat", "pc"),
                ("devid", "0"),
            ]);

        let body = self.get_text(request).await?;
        let Some(value) = parse_lenient_json(&body) else {
            warn!("Search for '{}' returned a non-JSON body", keyword);
            return Ok(SearchPage::default());
        };

        Ok(parse_search_page(&value, &self.settings.cover_base_url))
    }

    fn lyric_url(&self, external_id: &str) -> String {
        build_lyric_url(&self.settings.lyric_url, external_id)
    }
}

/// Decodes the provider's quasi-JSON: a BOM or surrounding whitespace is
/// tolerated and single-quoted documents are retried with double quotes.
pub(crate) fn parse_lenient_json(body: &str) -> Option<Value> {
    let trimmed = body.trim().trim_start_matches('\u{feff}').trim();
    serde_json::from_str(trimmed)
        .ok()
        .or_else(|| serde_json::from_str(&trimmed.replace('\'', "\"")).ok())
}

/// `MUSIC_228908` -> `228908`.
pub(crate) fn external_id_from_record_id(record_id: &str) -> Option<&str> {
    let (_, id) = record_id.rsplit_once('_')?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn parse_search_page(value: &Value, cover_base_url: &str) -> SearchPage {
    let Some(list) = value.get("abslist").and_then(Value::as_array) else {
        return SearchPage::default();
    };

    let rows: Vec<SearchHit> = list
        .iter()
        .filter_map(|item| {
            let record_id = text_field(item, "MUSICRID")?;
            let external_id = external_id_from_record_id(&record_id)?.to_string();
            let cover_url = text_field(item, "web_albumpic_short").map(|cover| {
                if cover.starts_with("http") {
                    cover
                } else {
                    format!("{}{}", cover_base_url, cover)
                }
            });

            Some(SearchHit {
                external_id,
                title: text_field(item, "NAME").unwrap_or_default(),
                artist: text_field(item, "ARTIST"),
                album: text_field(item, "ALBUM"),
                duration_secs: number_field(item, "DURATION"),
                cover_url,
                play_count: number_field(item, "PLAYCNT").unwrap_or(0),
            })
        })
        .collect();

    let total = number_field(value, "TOTAL")
        .map(|t| t.max(0) as u64)
        .unwrap_or(rows.len() as u64);

    SearchPage { total, rows }
}

/// Non-empty string field; numbers are stringified.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer field that the provider may send either as a number or a string.
fn number_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
