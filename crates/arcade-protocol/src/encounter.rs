//! Encounter lifecycle types.
//!
//! The state machine itself lives in `arcade-encounter`; this module only
//! carries the vocabulary shared with the stream side and the UI.

use crate::ids::BossId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of the tracked encounter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    #[default]
    Idle,
    /// The only state with a live deadline.
    Active,
    Defeated,
    Failed,
}

impl EncounterStatus {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// Terminal display states: the session is closed but the last outcome
    /// is kept for read-only display.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Defeated | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Normal,
    Hard,
}

/// Everything needed to start an encounter.
///
/// `hp_penalty_on_fail` and `base_xp_reward` are informational: the server
/// computes the real deltas and the client only applies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSpec {
    pub boss_id: BossId,
    pub name: String,
    pub difficulty: Difficulty,
    pub duration_secs: u64,
    pub hp_penalty_on_fail: i32,
    pub base_xp_reward: i64,
}

/// `boss_spawn` notification as pushed by the game socket.
///
/// Every field is optional; missing ones fall back to the reactor-core boss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnNotice {
    pub boss_id: Option<BossId>,
    pub name: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub duration_seconds: Option<u64>,
    pub hp_penalty_on_fail: Option<i32>,
    pub base_xp_reward: Option<i64>,
}

impl SpawnNotice {
    pub const DEFAULT_BOSS_ID: &'static str = "boss-reactor-core";
    pub const DEFAULT_NAME: &'static str = "Reactor Core Meltdown";
    pub const DEFAULT_DURATION_SECS: u64 = 30 * 60;
    pub const DEFAULT_HP_PENALTY: i32 = 10;
    pub const DEFAULT_XP_REWARD: i64 = 300;

    pub fn into_spec(self) -> EncounterSpec {
        EncounterSpec {
            boss_id: self
                .boss_id
                .unwrap_or_else(|| BossId::from_string(Self::DEFAULT_BOSS_ID)),
            name: self.name.unwrap_or_else(|| Self::DEFAULT_NAME.to_owned()),
            difficulty: self.difficulty.unwrap_or_default(),
            duration_secs: self
                .duration_seconds
                .filter(|secs| *secs > 0)
                .unwrap_or(Self::DEFAULT_DURATION_SECS),
            hp_penalty_on_fail: self
                .hp_penalty_on_fail
                .unwrap_or(Self::DEFAULT_HP_PENALTY),
            base_xp_reward: self.base_xp_reward.unwrap_or(Self::DEFAULT_XP_REWARD),
        }
    }
}

impl From<SpawnNotice> for EncounterSpec {
    fn from(notice: SpawnNotice) -> Self {
        notice.into_spec()
    }
}
