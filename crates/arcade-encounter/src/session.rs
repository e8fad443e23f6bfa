//! Encounter session model and transitions.
//!
//! States: `idle → active → {defeated, failed} → (start) → active → …`.
//! Every operation is legal in every state; calls that make no sense in the
//! current state are absorbed as no-ops rather than rejected.
//!
//! Integrity is the player's persistent health-like resource. It survives
//! across encounters and only changes through outcome deltas, always clamped
//! to `[0, integrity_max]` after the addition.

use arcade_protocol::{
    BossId, CodexId, Difficulty, EncounterOutcome, EncounterSpec, EncounterStatus,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

pub const DEFAULT_INTEGRITY_MAX: i32 = 100;

/// Integrity change applied when the clock runs out, regardless of the
/// encounter's configured fail penalty.
pub const TIMEOUT_INTEGRITY_DELTA: i32 = -10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterSession {
    id: Option<BossId>,
    name: Option<String>,
    difficulty: Option<Difficulty>,
    status: EncounterStatus,
    deadline: Option<DateTime<Utc>>,
    integrity_current: i32,
    integrity_max: i32,
    last_outcome: Option<EncounterOutcome>,
    hint_codex_id: Option<CodexId>,
    hint_unread: bool,
    /// Bumped by every `start`; lets countdown drivers detect that the
    /// encounter they were installed for has been superseded.
    epoch: u64,
}

impl Default for EncounterSession {
    fn default() -> Self {
        Self::new(DEFAULT_INTEGRITY_MAX)
    }
}

impl EncounterSession {
    pub fn new(integrity_max: i32) -> Self {
        let integrity_max = integrity_max.max(0);
        Self {
            id: None,
            name: None,
            difficulty: None,
            status: EncounterStatus::Idle,
            deadline: None,
            integrity_current: integrity_max,
            integrity_max,
            last_outcome: None,
            hint_codex_id: None,
            hint_unread: false,
            epoch: 0,
        }
    }

    pub fn id(&self) -> Option<&BossId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn status(&self) -> EncounterStatus {
        self.status
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn integrity_current(&self) -> i32 {
        self.integrity_current
    }

    pub fn integrity_max(&self) -> i32 {
        self.integrity_max
    }

    pub fn last_outcome(&self) -> Option<&EncounterOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn hint_codex_id(&self) -> Option<&CodexId> {
        self.hint_codex_id.as_ref()
    }

    pub fn hint_unread(&self) -> bool {
        self.hint_unread
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start (or overwrite) the tracked encounter. Returns the new epoch.
    pub fn start(&mut self, spec: &EncounterSpec, now: DateTime<Utc>) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.id = Some(spec.boss_id.clone());
        self.name = Some(spec.name.clone());
        self.difficulty = Some(spec.difficulty);
        self.status = EncounterStatus::Active;
        self.deadline = Some(deadline_after(now, spec.duration_secs));
        self.last_outcome = None;
        self.hint_codex_id = None;
        self.hint_unread = false;
        self.epoch
    }

    /// Close the encounter with a server-computed result.
    pub fn apply_outcome(&mut self, outcome: EncounterOutcome) {
        self.integrity_current = self
            .integrity_current
            .saturating_add(outcome.integrity_delta)
            .clamp(0, self.integrity_max);
        self.status = if outcome.passed {
            EncounterStatus::Defeated
        } else {
            EncounterStatus::Failed
        };
        self.id = None;
        self.deadline = None;
        // The server decides when a hint is due; the client applies it as told.
        if let Some(codex_id) = outcome.hint_codex_id.clone() {
            self.hint_codex_id = Some(codex_id);
            self.hint_unread = true;
        }
        self.last_outcome = Some(outcome);
    }

    /// Fail the active encounter because its deadline passed.
    ///
    /// Returns `false` (and changes nothing) unless the encounter is active.
    pub fn timeout(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        let Some(boss_id) = self.id.clone() else {
            return false;
        };
        // `start` clears `last_outcome`, so there is no earlier score to keep.
        let outcome = EncounterOutcome {
            boss_id,
            passed: false,
            score: 0.0,
            integrity_delta: TIMEOUT_INTEGRITY_DELTA,
            xp_awarded: 0,
            breakdown: Default::default(),
            fail_streak: None,
            hint_codex_id: None,
        };
        self.apply_outcome(outcome);
        true
    }

    /// `timeout` for drivers that captured an epoch when they were installed.
    pub fn timeout_if_current(&mut self, epoch: u64) -> bool {
        self.epoch == epoch && self.timeout()
    }

    pub fn unlock_hint(&mut self, codex_id: CodexId) {
        self.hint_codex_id = Some(codex_id);
        self.hint_unread = true;
    }

    /// Consume the "new" badge; the hint itself stays available.
    pub fn mark_hint_read(&mut self) {
        self.hint_unread = false;
    }

    /// Hard reset to idle. Integrity and hint state are left alone.
    pub fn reset(&mut self) {
        self.id = None;
        self.status = EncounterStatus::Idle;
        self.deadline = None;
        self.last_outcome = None;
    }

    /// Whole seconds left on the clock; zero when not active.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match (self.status, self.deadline) {
            (EncounterStatus::Active, Some(deadline)) => {
                let millis = (deadline - now).num_milliseconds();
                u64::try_from(millis / 1000).unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Checks the structural invariants between status, id and deadline.
    pub fn is_consistent(&self) -> bool {
        let active = self.status.is_active();
        let lifecycle = active == (self.id.is_some() && self.deadline.is_some());
        let closed = !self.status.is_closed() || (self.id.is_none() && self.deadline.is_none());
        let integrity = (0..=self.integrity_max).contains(&self.integrity_current);
        lifecycle && closed && integrity
    }
}

fn deadline_after(now: DateTime<Utc>, duration_secs: u64) -> DateTime<Utc> {
    i64::try_from(duration_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|duration| now.checked_add_signed(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
