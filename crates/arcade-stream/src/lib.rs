//! # arcade-stream: Live Stream Decoder
//!
//! Turns an arbitrarily chunked SSE-style text stream into ordered,
//! typed side effects on the live feed and the encounter state machine.
//!
//! - [`utf8`]: incremental UTF-8 decoding of transport byte chunks
//! - [`frame`]: frame splitting on blank-line delimiters
//! - [`parse`]: `event:`/`data:` frame parsing
//! - [`dispatch`]: one side effect per decoded event
//! - [`decoder`]: the cancellable decode loop
//! - [`feed`], [`hub`]: the live feed state and its broadcast fan-out
//! - [`abort`]: stream cancellation

pub mod abort;
pub mod decoder;
pub mod dispatch;
pub mod feed;
pub mod frame;
pub mod hub;
pub mod parse;
pub mod utf8;

pub use abort::{AbortHandle, AbortSignal};
pub use decoder::{DecodeSummary, StreamDecoder, Termination};
pub use dispatch::Dispatcher;
pub use feed::{FeedState, LiveFeed};
pub use frame::FrameSplitter;
pub use hub::{DEFAULT_FEED_BUFFER, FeedHub};
pub use parse::{ParsedFrame, RawEvent, parse_frame};
pub use utf8::Utf8ChunkDecoder;
