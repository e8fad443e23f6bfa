//! Inbound ports for the live-encounter subsystem.
//!
//! These traits are the only boundary between the decoder/client and the
//! outside world: where stream text comes from, and who gets told when a
//! boss was defeated.
//!
//! Object-safety note:
//! - Traits use `async-trait` for async dyn-dispatch.
//! - Streaming uses boxed trait objects (`ChunkStream`).

use crate::error::{RefreshError, StreamResult};
use crate::ids::{CodexId, TrackId, WorldId};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Text chunks in arrival order. Chunk boundaries are arbitrary and may fall
/// inside a frame, a line, or a delimiter.
pub type ChunkStream = BoxStream<'static, StreamResult<String>>;

/// Body of a streaming query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub message: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<WorldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<TrackId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_id: Option<CodexId>,
}

impl StreamRequest {
    pub const DEFAULT_MODE: &'static str = "judge";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: Self::DEFAULT_MODE.to_owned(),
            world_id: None,
            track_id: None,
            codex_id: None,
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn world(mut self, world_id: impl Into<WorldId>) -> Self {
        self.world_id = Some(world_id.into());
        self
    }

    pub fn track(mut self, track_id: impl Into<TrackId>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    pub fn codex(mut self, codex_id: impl Into<CodexId>) -> Self {
        self.codex_id = Some(codex_id.into());
        self
    }
}

#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Open one stream. Only a single attempt is made; failures are surfaced.
    async fn open(&self, request: &StreamRequest) -> StreamResult<ChunkStream>;
}

/// Best-effort notification after a boss was defeated. Invoked without
/// awaiting; a failure is logged and never affects stream processing.
#[async_trait]
pub trait ProgressRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), RefreshError>;
}
