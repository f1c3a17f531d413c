//! Fake third-party services on one local axum server: the parse API, the
//! catalog search endpoint, the source audio host and the storage bucket.

use super::constants::*;
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct UpstreamState {
    base_url: String,
    objects: Mutex<HashMap<String, Bytes>>,
    seen_ranges: Mutex<Vec<Option<String>>>,
    parse_calls: AtomicUsize,
    search_calls: AtomicUsize,
    puts: AtomicUsize,
    failing_puts: AtomicUsize,
}

pub struct FakeUpstream {
    pub base_url: String,
    state: Arc<UpstreamState>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

pub fn source_audio() -> Vec<u8> {
    (0..SOURCE_AUDIO_SIZE_BYTES).map(|i| (i % 251) as u8).collect()
}

impl FakeUpstream {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind upstream port");
        let base_url = format!(
            "http://{}",
            listener.local_addr().expect("Failed to get upstream address")
        );

        let state = Arc::new(UpstreamState {
            base_url: base_url.clone(),
            ..Default::default()
        });

        let bucket_path = format!("/{}/{{*key}}", TEST_BUCKET);
        let app = Router::new()
            .route("/parse", get(parse_api))
            .route("/search", get(search))
            .route("/source/{name}", get(source))
            .route(
                &bucket_path,
                get(get_object).put(put_object).delete(delete_object),
            )
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Upstream failed");
        });

        Self {
            base_url,
            state,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn bucket_url(&self) -> String {
        format!("{}/{}", self.base_url, TEST_BUCKET)
    }

    pub fn parse_calls(&self) -> usize {
        self.state.parse_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.state.search_calls.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.state.puts.load(Ordering::SeqCst)
    }

    /// Makes the next `count` bucket writes answer 503.
    pub fn fail_puts(&self, count: usize) {
        self.state.failing_puts.store(count, Ordering::SeqCst);
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.state.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state.objects.lock().unwrap().get(key).cloned()
    }

    /// Range headers received by bucket reads, in order.
    pub fn seen_ranges(&self) -> Vec<Option<String>> {
        self.state.seen_ranges.lock().unwrap().clone()
    }
}

async fn parse_api(
    State(state): State<Arc<UpstreamState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.parse_calls.fetch_add(1, Ordering::SeqCst);

    if params.get("key").map(String::as_str) != Some(TEST_API_KEY) {
        return (StatusCode::OK, r#"{"code":403,"msg":"bad key"}"#).into_response();
    }

    let id = params
        .get("url")
        .and_then(|url| url.rsplit('/').next())
        .unwrap_or_default();
    if id != SONG_1_ID && id != SONG_2_ID {
        return Json(json!({ "code": 404, "msg": "not found" })).into_response();
    }

    // Single quotes, like the real provider sometimes sends.
    let body = format!(
        "{{'code':200,'data':{{'music_mp3Url':'{}/source/{}.mp3'}}}}",
        state.base_url, id
    );
    (StatusCode::OK, body).into_response()
}

async fn search(
    State(state): State<Arc<UpstreamState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    state.search_calls.fetch_add(1, Ordering::SeqCst);

    let keyword = params.get("all").map(|k| k.to_lowercase()).unwrap_or_default();
    if !keyword.contains(SEARCH_KEYWORD) {
        return Json(json!({ "TOTAL": "0", "abslist": [] }));
    }

    Json(json!({
        "TOTAL": "1",
        "abslist": [{
            "MUSICRID": format!("MUSIC_{}", SONG_1_ID),
            "NAME": SONG_1_TITLE,
            "ARTIST": SONG_1_ARTIST,
            "ALBUM": "Fantasy",
            "DURATION": "269",
            "web_albumpic_short": "120/s4s1/22/123.jpg",
            "PLAYCNT": "1024"
        }]
    }))
}

async fn source(Path(name): Path<String>) -> Response {
    let id = name.trim_end_matches(".mp3");
    if id != SONG_1_ID && id != SONG_2_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        [(header::CONTENT_TYPE, "audio/mpeg")],
        source_audio(),
    )
        .into_response()
}

async fn put_object(
    State(state): State<Arc<UpstreamState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> StatusCode {
    state.puts.fetch_add(1, Ordering::SeqCst);
    let failing = state
        .failing_puts
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if failing {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    state.objects.lock().unwrap().insert(key, body);
    StatusCode::OK
}

async fn delete_object(
    State(state): State<Arc<UpstreamState>>,
    Path(key): Path<String>,
) -> StatusCode {
    match state.objects.lock().unwrap().remove(&key) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Serves `bytes=start-` and `bytes=start-end`, like an object store would.
async fn get_object(
    State(state): State<Arc<UpstreamState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen_ranges.lock().unwrap().push(range.clone());

    let Some(object) = state.objects.lock().unwrap().get(&key).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let len = object.len();

    let Some((start, end)) = range.as_deref().and_then(|r| parse_range(r, len)) else {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "audio/mpeg")
            .header(header::CONTENT_LENGTH, len)
            .body(Body::from(object))
            .unwrap();
    };

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CONTENT_LENGTH, end - start + 1)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, len),
        )
        .body(Body::from(object.slice(start..=end)))
        .unwrap()
}

fn parse_range(range: &str, len: usize) -> Option<(usize, usize)> {
    let (start, end) = range.strip_prefix("bytes=")?.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = if end.is_empty() {
        len.checked_sub(1)?
    } else {
        end.parse::<usize>().ok()?.min(len.checked_sub(1)?)
    };
    (start <= end).then_some((start, end))
}
