//! HTTP adapters for the chunk source and progress refresher ports.

use std::sync::Arc;

use arcade_protocol::{
    ChunkSource, ChunkStream, ProgressRefresher, RefreshError, StreamError, StreamRequest,
    StreamResult,
};
use arcade_stream::Utf8ChunkDecoder;
use async_trait::async_trait;
use futures_util::StreamExt;
use indexmap::IndexMap;
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::config::ClientConfig;

const EVENT_STREAM: &str = "text/event-stream";

/// Streams the query endpoint's response body as UTF-8 text chunks.
#[derive(Debug, Clone)]
pub struct HttpChunkSource {
    http: Client,
    url: String,
}

impl HttpChunkSource {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &ClientConfig) -> Self {
        Self {
            http,
            url: config.stream_url(),
        }
    }
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    #[instrument(skip(self, request), fields(url = %self.url, mode = %request.mode))]
    async fn open(&self, request: &StreamRequest) -> StreamResult<ChunkStream> {
        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, EVENT_STREAM)
            .json(request)
            .send()
            .await
            .map_err(|error| StreamError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
            });
        }
        debug!(%status, "stream opened");

        let chunks = async_stream::stream! {
            let mut body = response.bytes_stream();
            let mut decoder = Utf8ChunkDecoder::new();
            loop {
                match body.next().await {
                    Some(Ok(bytes)) => {
                        let text = decoder.decode(&bytes);
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Some(Err(error)) => {
                        yield Err(StreamError::Transport(error.to_string()));
                        break;
                    }
                    None => {
                        if let Some(rest) = decoder.finish() {
                            yield Ok(rest);
                        }
                        break;
                    }
                }
            }
        };
        Ok(chunks.boxed())
    }
}

/// One track's completion as reported by `/api/worlds/progress`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackProgress {
    pub world_slug: String,
    pub track_slug: String,
    pub label: String,
    pub progress: f64,
    pub total_quests: u32,
    pub completed_quests: u32,
}

#[derive(Debug, Default, Deserialize)]
struct WorldProgressResponse {
    #[serde(default)]
    tracks: Vec<TrackProgress>,
}

/// Track progress keyed by track slug, replaced wholesale on every refresh.
///
/// Each refresh bumps a generation counter that listeners can watch.
#[derive(Debug, Clone)]
pub struct TrackProgressCache {
    tracks: Arc<RwLock<IndexMap<String, TrackProgress>>>,
    generation: Arc<watch::Sender<u64>>,
}

impl Default for TrackProgressCache {
    fn default() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            tracks: Arc::default(),
            generation: Arc::new(generation),
        }
    }
}

impl TrackProgressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress of a track, `0.0` when unknown.
    pub fn progress(&self, track_slug: &str) -> f64 {
        self.tracks
            .read()
            .get(track_slug)
            .map_or(0.0, |track| track.progress)
    }

    pub fn track(&self, track_slug: &str) -> Option<TrackProgress> {
        self.tracks.read().get(track_slug).cloned()
    }

    pub fn set_progress(&self, track_slug: &str, progress: f64) {
        let mut tracks = self.tracks.write();
        let entry = tracks
            .entry(track_slug.to_owned())
            .or_insert_with(|| TrackProgress {
                track_slug: track_slug.to_owned(),
                ..Default::default()
            });
        entry.progress = progress;
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn replace(&self, tracks: Vec<TrackProgress>) {
        {
            let mut current = self.tracks.write();
            current.clear();
            current.extend(
                tracks
                    .into_iter()
                    .map(|track| (track.track_slug.clone(), track)),
            );
        }
        self.generation.send_modify(|generation| *generation += 1);
    }
}

/// Re-fetches world progress after a boss is defeated.
#[derive(Debug, Clone)]
pub struct HttpProgressRefresher {
    http: Client,
    url: String,
    cache: TrackProgressCache,
}

impl HttpProgressRefresher {
    pub fn new(config: &ClientConfig, cache: TrackProgressCache) -> Self {
        Self::with_client(Client::new(), config, cache)
    }

    pub fn with_client(http: Client, config: &ClientConfig, cache: TrackProgressCache) -> Self {
        Self {
            http,
            url: config.progress_url(),
            cache,
        }
    }

    pub fn cache(&self) -> &TrackProgressCache {
        &self.cache
    }
}

#[async_trait]
impl ProgressRefresher for HttpProgressRefresher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn refresh(&self) -> Result<(), RefreshError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|error| RefreshError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status {
                status: status.as_u16(),
            });
        }

        let body: WorldProgressResponse = response
            .json()
            .await
            .map_err(|error| RefreshError::Transport(error.to_string()))?;
        debug!(tracks = body.tracks.len(), "world progress refreshed");
        self.cache.replace(body.tracks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn collect(mut chunks: ChunkStream) -> (String, Option<StreamError>) {
        let mut text = String::new();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => text.push_str(&chunk),
                Err(error) => return (text, Some(error)),
            }
        }
        (text, None)
    }

    #[tokio::test]
    async fn streams_the_response_body() {
        let app = Router::new().route(
            "/apps/arcade_app/users/{user}/sessions/{session}/query/stream",
            post(|headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                assert_eq!(headers[ACCEPT.as_str()], EVENT_STREAM);
                format!(
                    "event: text_delta\ndata: {}:{}\n\ndata: [DONE]\n\n",
                    body["mode"].as_str().unwrap_or_default(),
                    body["message"].as_str().unwrap_or_default()
                )
            }),
        );
        let base = serve(app).await;
        let config = ClientConfig::new(base).user("ada").session_id("s-1");
        let source = HttpChunkSource::new(&config);

        let chunks = source
            .open(&StreamRequest::new("héllo").mode("boss"))
            .await
            .unwrap();
        let (text, error) = collect(chunks).await;
        assert_eq!(error, None);
        assert_eq!(text, "event: text_delta\ndata: boss:héllo\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/apps/arcade_app/users/{user}/sessions/{session}/query/stream",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;
        let source = HttpChunkSource::new(&ClientConfig::new(base));

        let error = source.open(&StreamRequest::new("hi")).await.err().unwrap();
        assert_eq!(error, StreamError::Status { status: 503 });
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = HttpChunkSource::new(&ClientConfig::new(format!("http://{addr}")));

        let error = source.open(&StreamRequest::new("hi")).await.err().unwrap();
        assert!(matches!(error, StreamError::Transport(_)));
    }

    #[tokio::test]
    async fn refresh_replaces_the_cache() {
        let app = Router::new().route(
            "/api/worlds/progress",
            get(|| async {
                axum::Json(json!({
                    "tracks": [
                        { "world_slug": "w1", "track_slug": "rust-basics", "label": "Rust",
                          "progress": 0.5, "total_quests": 10, "completed_quests": 5 },
                        { "world_slug": "w1", "track_slug": "async", "progress": 0.1 }
                    ]
                }))
            }),
        );
        let base = serve(app).await;
        let cache = TrackProgressCache::new();
        cache.set_progress("stale-track", 1.0);
        let mut updates = cache.subscribe();
        let refresher = HttpProgressRefresher::new(&ClientConfig::new(base), cache.clone());

        refresher.refresh().await.unwrap();

        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.progress("rust-basics"), 0.5);
        assert_eq!(cache.progress("stale-track"), 0.0);
        assert_eq!(cache.track("async").map(|t| t.total_quests), Some(0));
    }

    #[tokio::test]
    async fn refresh_reports_status_failures() {
        let app = Router::new().route(
            "/api/worlds/progress",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(app).await;
        let cache = TrackProgressCache::new();
        cache.set_progress("kept", 0.3);
        let refresher = HttpProgressRefresher::new(&ClientConfig::new(base), cache.clone());

        let error = refresher.refresh().await.unwrap_err();
        assert!(matches!(error, RefreshError::Status { status: 500 }));
        assert_eq!(refresher.cache().progress("kept"), 0.3);
        assert_eq!(refresher.cache().generation(), 0);
    }
}
