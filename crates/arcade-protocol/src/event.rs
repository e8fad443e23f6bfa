//! Stream event taxonomy.
//!
//! The backend multiplexes several event kinds over one SSE-style text
//! stream. Each frame names its kind with an `event:` line; the payload is
//! either raw text (`text_delta`) or a JSON document.
//!
//! Forward-compatible: frames without an `event:` line classify as
//! [`EventType::Message`], unknown names as [`EventType::Other`], and both
//! decode into [`StreamEvent::Unclassified`] instead of failing.

use crate::error::DecodeError;
use crate::ids::{BossId, CodexId, WorldId};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data value marking the end of the stream's useful content.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event-type classification taken from a frame's `event:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum EventType {
    Grade,
    Progress,
    TextDelta,
    NpcIdentity,
    BossResult,
    /// No `event:` line was present.
    #[default]
    Message,
    Other(String),
}

impl EventType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "grade" => Self::Grade,
            "progress" => Self::Progress,
            "text_delta" => Self::TextDelta,
            "npc_identity" => Self::NpcIdentity,
            "boss_result" => Self::BossResult,
            "message" => Self::Message,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Grade => "grade",
            Self::Progress => "progress",
            Self::TextDelta => "text_delta",
            Self::NpcIdentity => "npc_identity",
            Self::BossResult => "boss_result",
            Self::Message => "message",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Payloads ──────────────────────────────────────────────────────

/// Scoring snapshot emitted by the judge.
///
/// Every field defaults, so partial snapshots still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeSnapshot {
    pub weighted_score: f64,
    pub coverage: f64,
    pub correctness: f64,
    pub clarity: f64,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric_used: Option<String>,
}

/// XP and level changes after an answer was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub xp_gained: i64,
    pub world_id: WorldId,
    #[serde(default)]
    pub new_world_level: u32,
    #[serde(default)]
    pub world_level_up: bool,
    #[serde(default)]
    pub new_global_level: u32,
    #[serde(default)]
    pub global_level_up: bool,
}

/// Persona speaking in the current assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcIdentity {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub avatar_icon: String,
    #[serde(default)]
    pub color: String,
}

/// Server-computed result of a boss encounter (`boss_result` on the wire).
///
/// `breakdown` is opaque display data (per-category scores, boss HP values)
/// and keeps the server's key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterOutcome {
    pub boss_id: BossId,
    pub passed: bool,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub integrity_delta: i32,
    #[serde(default)]
    pub xp_awarded: i64,
    #[serde(default)]
    pub breakdown: IndexMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_streak: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_codex_id: Option<CodexId>,
}

// ─── StreamEvent ───────────────────────────────────────────────────

/// One decoded event from the live stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Grade(GradeSnapshot),
    Progress(ProgressUpdate),
    TextDelta(String),
    NpcIdentity(NpcIdentity),
    EncounterOutcome(EncounterOutcome),
    /// Generic `message` frames and event names this client does not know.
    Unclassified { event_type: String, data: String },
}

impl StreamEvent {
    /// Decode a frame's data according to its event type.
    pub fn decode(event_type: &EventType, data: &str) -> Result<Self, DecodeError> {
        match event_type {
            EventType::Grade => decode_json(event_type, data).map(Self::Grade),
            EventType::Progress => decode_json(event_type, data).map(Self::Progress),
            EventType::TextDelta => Ok(Self::TextDelta(data.to_owned())),
            EventType::NpcIdentity => decode_json(event_type, data).map(Self::NpcIdentity),
            EventType::BossResult => decode_json(event_type, data).map(Self::EncounterOutcome),
            EventType::Message | EventType::Other(_) => Ok(Self::Unclassified {
                event_type: event_type.as_str().to_owned(),
                data: data.to_owned(),
            }),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::Grade(_) => EventType::Grade,
            Self::Progress(_) => EventType::Progress,
            Self::TextDelta(_) => EventType::TextDelta,
            Self::NpcIdentity(_) => EventType::NpcIdentity,
            Self::EncounterOutcome(_) => EventType::BossResult,
            Self::Unclassified { event_type, .. } => EventType::from_name(event_type),
        }
    }

    /// Wire form of the payload, the inverse of [`StreamEvent::decode`].
    pub fn to_data(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Grade(grade) => serde_json::to_string(grade),
            Self::Progress(progress) => serde_json::to_string(progress),
            Self::TextDelta(delta) => Ok(delta.clone()),
            Self::NpcIdentity(npc) => serde_json::to_string(npc),
            Self::EncounterOutcome(outcome) => serde_json::to_string(outcome),
            Self::Unclassified { data, .. } => Ok(data.clone()),
        }
    }
}

fn decode_json<T: DeserializeOwned>(event_type: &EventType, data: &str) -> Result<T, DecodeError> {
    serde_json::from_str(data).map_err(|source| DecodeError::Payload {
        event_type: event_type.as_str().to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_are_stable() {
        for name in ["grade", "progress", "text_delta", "npc_identity", "boss_result", "message"] {
            assert_eq!(EventType::from_name(name).as_str(), name);
        }
        assert_eq!(
            EventType::from_name("quest_complete"),
            EventType::Other("quest_complete".into())
        );
        assert_eq!(EventType::default(), EventType::Message);
    }

    #[test]
    fn partial_grade_decodes_with_defaults() {
        let event = StreamEvent::decode(&EventType::Grade, r#"{"weighted_score":80}"#).unwrap();
        let StreamEvent::Grade(grade) = event else {
            panic!("should be Grade");
        };
        assert_eq!(grade.weighted_score, 80.0);
        assert_eq!(grade.comment, "");
        assert!(grade.rubric_used.is_none());
    }

    #[test]
    fn text_delta_is_raw_text() {
        let event = StreamEvent::decode(&EventType::TextDelta, "{not json").unwrap();
        assert_eq!(event, StreamEvent::TextDelta("{not json".into()));
    }

    #[test]
    fn malformed_structured_payload_is_a_decode_error() {
        let err = StreamEvent::decode(&EventType::NpcIdentity, "{\"name\":").unwrap_err();
        assert!(err.to_string().contains("npc_identity"));
    }

    #[test]
    fn unknown_event_becomes_unclassified() {
        let event = StreamEvent::decode(&EventType::from_name("future_thing"), "{}").unwrap();
        assert_eq!(
            event,
            StreamEvent::Unclassified {
                event_type: "future_thing".into(),
                data: "{}".into(),
            }
        );
        assert_eq!(event.event_type(), EventType::Other("future_thing".into()));
    }

    #[test]
    fn boss_result_keeps_breakdown_order_and_optional_hint() {
        let data = r#"{
            "boss_id": "boss-reactor-core",
            "passed": false,
            "score": 45,
            "integrity_delta": -10,
            "xp_awarded": 0,
            "breakdown": {"structure": 10, "async": 15, "boss_hp": 40},
            "fail_streak": 2,
            "hint_codex_id": "boss-reactor-core"
        }"#;
        let StreamEvent::EncounterOutcome(outcome) =
            StreamEvent::decode(&EventType::BossResult, data).unwrap()
        else {
            panic!("should be EncounterOutcome");
        };
        assert_eq!(outcome.integrity_delta, -10);
        assert_eq!(outcome.fail_streak, Some(2));
        assert_eq!(
            outcome.hint_codex_id.as_ref().map(CodexId::as_str),
            Some("boss-reactor-core")
        );
        let keys: Vec<_> = outcome.breakdown.keys().map(String::as_str).collect();
        assert_eq!(keys, ["structure", "async", "boss_hp"]);
    }

    #[test]
    fn boss_result_without_delta_defaults_to_zero() {
        let data = r#"{"boss_id":"b","passed":true,"score":92}"#;
        let StreamEvent::EncounterOutcome(outcome) =
            StreamEvent::decode(&EventType::BossResult, data).unwrap()
        else {
            panic!("should be EncounterOutcome");
        };
        assert_eq!(outcome.integrity_delta, 0);
        assert!(outcome.breakdown.is_empty());
        assert!(outcome.hint_codex_id.is_none());
    }

    #[test]
    fn to_data_feeds_back_into_decode() {
        let npc = StreamEvent::NpcIdentity(NpcIdentity {
            name: "Orion".into(),
            title: "Archivist".into(),
            avatar_icon: "owl".into(),
            color: "#0ff".into(),
        });
        let data = npc.to_data().unwrap();
        let back = StreamEvent::decode(&npc.event_type(), &data).unwrap();
        assert_eq!(back, npc);
    }
}
