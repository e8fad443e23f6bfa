use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arcade_protocol::{StreamEvent, StreamRequest};
use async_stream::stream;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures_util::Stream;
use parking_lot::Mutex;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod script;

use crate::script::{ProgressBoard, as_sse_event, done_event, reply_events};

#[derive(Debug, Parser)]
#[command(name = "arcade-mock")]
#[command(about = "Scripted live-encounter backend")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,
    /// Pause between streamed events.
    #[arg(long, default_value_t = 40)]
    delay_ms: u64,
}

#[derive(Clone)]
struct AppState {
    delay: Duration,
    fail_streaks: Arc<Mutex<HashMap<String, u32>>>,
    progress: Arc<Mutex<ProgressBoard>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let state = AppState {
        delay: Duration::from_millis(cli.delay_ms),
        fail_streaks: Arc::default(),
        progress: Arc::default(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/apps/arcade_app/users/{user}/sessions/{session_id}/query/stream",
            post(query_stream),
        )
        .route("/api/worlds/progress", get(world_progress))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, "arcade-mock listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "arcade-mock"
    }))
}

async fn query_stream(
    Path((user, session_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(request): Json<StreamRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let key = format!("{user}/{session_id}");
    let fail_streak = state.fail_streaks.lock().get(&key).copied().unwrap_or(0);
    let events = reply_events(&request, fail_streak);

    for event in &events {
        if let StreamEvent::EncounterOutcome(outcome) = event {
            let mut streaks = state.fail_streaks.lock();
            streaks.insert(key.clone(), outcome.fail_streak.unwrap_or(0));
            if outcome.passed {
                state
                    .progress
                    .lock()
                    .complete_quest(request.track_id.as_ref().map(|track| track.as_str()));
            }
        }
    }
    info!(%user, %session_id, mode = %request.mode, events = events.len(), "scripted reply");

    let delay = state.delay;
    let stream = stream! {
        for event in events {
            tokio::time::sleep(delay).await;
            yield Ok(as_sse_event(&event));
        }
        yield Ok(done_event());
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn world_progress(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tracks = state.progress.lock().tracks();
    Json(json!({ "tracks": tracks }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
