use std::sync::Arc;

use arcade_protocol::{CodexId, EncounterOutcome, EncounterSpec};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::session::EncounterSession;

/// Shared owner of the single tracked encounter.
///
/// Cloning the handle shares the session; the stream dispatcher and the
/// countdown driver each hold a clone. The watch channel owns the session,
/// so every operation mutates and publishes under the same lock and
/// [`EncounterHandle::subscribe`] watchers see changes in the order they
/// were applied.
#[derive(Debug, Clone)]
pub struct EncounterHandle {
    session: Arc<watch::Sender<EncounterSession>>,
    clock: Arc<dyn Clock>,
}

impl Default for EncounterHandle {
    fn default() -> Self {
        Self::new(EncounterSession::default(), Arc::new(SystemClock))
    }
}

impl EncounterHandle {
    pub fn new(session: EncounterSession, clock: Arc<dyn Clock>) -> Self {
        let (session, _) = watch::channel(session);
        Self {
            session: Arc::new(session),
            clock,
        }
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(EncounterSession::default(), clock)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> EncounterSession {
        self.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EncounterSession> {
        self.session.subscribe()
    }

    pub fn remaining_secs(&self) -> u64 {
        let now = self.now();
        self.session.borrow().remaining_secs(now)
    }

    /// Returns the epoch of the new encounter.
    pub fn start(&self, spec: &EncounterSpec) -> u64 {
        let now = self.now();
        let epoch = self.mutate(|session| session.start(spec, now));
        info!(
            boss_id = %spec.boss_id,
            difficulty = ?spec.difficulty,
            duration_secs = spec.duration_secs,
            epoch,
            "encounter started"
        );
        epoch
    }

    pub fn apply_outcome(&self, outcome: EncounterOutcome) {
        let boss_id = outcome.boss_id.clone();
        let passed = outcome.passed;
        let delta = outcome.integrity_delta;
        let integrity = self.mutate(|session| {
            session.apply_outcome(outcome);
            session.integrity_current()
        });
        info!(%boss_id, passed, delta, integrity, "encounter outcome applied");
    }

    /// Returns whether the timeout took effect.
    pub fn timeout(&self) -> bool {
        let fired = self.mutate(EncounterSession::timeout);
        if fired {
            info!("encounter timed out");
        } else {
            debug!("timeout ignored: no active encounter");
        }
        fired
    }

    pub fn timeout_if_current(&self, epoch: u64) -> bool {
        let fired = self.mutate(|session| session.timeout_if_current(epoch));
        if fired {
            info!(epoch, "encounter timed out");
        } else {
            debug!(epoch, "timeout ignored: encounter superseded or closed");
        }
        fired
    }

    pub fn unlock_hint(&self, codex_id: CodexId) {
        info!(%codex_id, "hint unlocked");
        self.mutate(|session| session.unlock_hint(codex_id));
    }

    pub fn mark_hint_read(&self) {
        self.mutate(EncounterSession::mark_hint_read);
    }

    pub fn reset(&self) {
        self.mutate(EncounterSession::reset);
        debug!("encounter reset");
    }

    fn mutate<R: Default>(&self, op: impl FnOnce(&mut EncounterSession) -> R) -> R {
        let mut result = R::default();
        self.session.send_if_modified(|session| {
            let before = session.clone();
            result = op(session);
            debug_assert!(session.is_consistent(), "encounter invariants violated");
            *session != before
        });
        result
    }
}
