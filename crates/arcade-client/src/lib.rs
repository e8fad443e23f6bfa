//! # arcade-client: Live Encounter Client
//!
//! Wires the stream decoder and the encounter state machine to a backend.
//!
//! - [`client`]: `ArcadeClient` and its builder (`send_message`, `stop_stream`)
//! - [`config`]: `ClientConfig` and endpoint URLs
//! - [`http`]: reqwest-backed chunk source and progress refresher
//! - [`replay`]: chunk source replaying captured stream text

pub mod client;
pub mod config;
pub mod http;
pub mod replay;

pub use client::{ArcadeClient, ArcadeClientBuilder, SendOutcome};
pub use config::{APP_NAME, ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER};
pub use http::{HttpChunkSource, HttpProgressRefresher, TrackProgress, TrackProgressCache};
pub use replay::ReplaySource;
