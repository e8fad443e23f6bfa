//! # arcade-encounter: Boss Encounter State Machine
//!
//! - [`session`]: `EncounterSession`, the authoritative client-side model of
//!   the current boss fight and its transitions
//! - [`handle`]: `EncounterHandle`, the shared, injectable owner of the session
//! - [`clock`]: wall-clock abstraction (system, monotonic and manual)
//! - [`countdown`]: 1 Hz countdown driver, its supervisor, and HUD helpers

pub mod clock;
pub mod countdown;
pub mod handle;
pub mod session;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use countdown::{CountdownDriver, CountdownSupervisor, TICK_PERIOD, Urgency, format_mmss};
pub use handle::EncounterHandle;
pub use session::{DEFAULT_INTEGRITY_MAX, EncounterSession, TIMEOUT_INTEGRITY_DELTA};
