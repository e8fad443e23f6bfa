//! # arcade-protocol: Live Encounter Protocol
//!
//! Shared types and trait interfaces for the live-encounter subsystem: the
//! stream decoder, the boss encounter state machine, and the client that
//! wires them to a backend.
//!
//! It is intentionally dependency-light (no tokio, no HTTP client) so it can
//! be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (SessionId, BossId, CodexId, WorldId, TrackId)
//! - [`event`]: EventType classification + StreamEvent and its payloads
//! - [`encounter`]: EncounterStatus, Difficulty, EncounterSpec, SpawnNotice
//! - [`transcript`]: Role, TranscriptEntry, Transcript
//! - [`ports`]: Inbound ports (chunk source, progress refresher)
//! - [`error`]: StreamError, DecodeError, RefreshError

pub mod encounter;
pub mod error;
pub mod event;
pub mod ids;
pub mod ports;
pub mod transcript;

// Re-export the most commonly used types at the crate root.
pub use encounter::{Difficulty, EncounterSpec, EncounterStatus, SpawnNotice};
pub use error::{DecodeError, RefreshError, StreamError, StreamResult};
pub use event::{
    DONE_SENTINEL, EncounterOutcome, EventType, GradeSnapshot, NpcIdentity, ProgressUpdate,
    StreamEvent,
};
pub use ids::{BossId, CodexId, SessionId, TrackId, WorldId};
pub use ports::{ChunkSource, ChunkStream, ProgressRefresher, StreamRequest};
pub use transcript::{Role, Transcript, TranscriptEntry};
