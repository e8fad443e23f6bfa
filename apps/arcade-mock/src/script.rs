//! Deterministic replies for the mock backend.

use arcade_protocol::{
    BossId, CodexId, DONE_SENTINEL, EncounterOutcome, GradeSnapshot, NpcIdentity, ProgressUpdate,
    StreamEvent, StreamRequest, WorldId,
};
use axum::response::sse::Event;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;

pub const BOSS_MODE: &str = "boss";
pub const DEFAULT_BOSS: &str = "boss-reactor-core";
pub const DEFAULT_WORLD: &str = "rust-world";
pub const PASS_THRESHOLD: f64 = 70.0;
pub const FAIL_INTEGRITY_DELTA: i32 = -15;
pub const BOSS_XP_REWARD: i64 = 300;
/// Consecutive boss failures after which the reply unlocks a hint.
pub const HINT_AFTER_FAILS: u32 = 2;

const WORDS_PER_DELTA: usize = 3;

/// Score an answer from surface features only.
pub fn judge(message: &str) -> GradeSnapshot {
    let words = message.split_whitespace().count();
    let coverage = (words as f64 * 4.0).min(100.0);
    let correctness = if message.contains('`') || message.contains("fn ") {
        85.0
    } else {
        60.0
    };
    let clarity = if message.trim_end().ends_with(['.', '?', '!']) {
        80.0
    } else {
        65.0
    };
    let weighted_score = (0.4 * coverage + 0.4 * correctness + 0.2 * clarity).round();
    let comment = if weighted_score >= PASS_THRESHOLD {
        "Solid answer."
    } else {
        "Needs more depth."
    };
    GradeSnapshot {
        weighted_score,
        coverage,
        correctness,
        clarity,
        comment: comment.to_owned(),
        rubric: Some(vec![
            "coverage".to_owned(),
            "correctness".to_owned(),
            "clarity".to_owned(),
        ]),
        rubric_used: Some("surface-v1".to_owned()),
    }
}

fn npc_for(mode: &str) -> NpcIdentity {
    if mode == BOSS_MODE {
        NpcIdentity {
            name: "Reactor Core".to_owned(),
            title: "Boss".to_owned(),
            avatar_icon: "flame".to_owned(),
            color: "#ff4d2e".to_owned(),
        }
    } else {
        NpcIdentity {
            name: "Ada".to_owned(),
            title: "Judge".to_owned(),
            avatar_icon: "gavel".to_owned(),
            color: "#3b82f6".to_owned(),
        }
    }
}

/// Split text into deltas of a few words; every delta after the first keeps
/// its leading space.
pub fn text_deltas(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split(' ').collect();
    words
        .chunks(WORDS_PER_DELTA)
        .enumerate()
        .map(|(index, chunk)| {
            let joined = chunk.join(" ");
            if index == 0 {
                joined
            } else {
                format!(" {joined}")
            }
        })
        .collect()
}

/// The full event sequence for one query, given the session's current
/// boss fail streak.
pub fn reply_events(request: &StreamRequest, fail_streak: u32) -> Vec<StreamEvent> {
    let grade = judge(&request.message);
    let passed = grade.weighted_score >= PASS_THRESHOLD;
    let boss = request.mode == BOSS_MODE;

    let mut events = vec![StreamEvent::NpcIdentity(npc_for(&request.mode))];
    let text = format!(
        "{}\nCoverage {:.0}, correctness {:.0}, clarity {:.0}.",
        grade.comment, grade.coverage, grade.correctness, grade.clarity
    );
    events.extend(text_deltas(&text).into_iter().map(StreamEvent::TextDelta));
    events.push(StreamEvent::Grade(grade.clone()));

    if boss {
        events.push(StreamEvent::EncounterOutcome(boss_outcome(
            request, &grade, passed, fail_streak,
        )));
    }
    if passed {
        let xp_gained = if boss {
            BOSS_XP_REWARD
        } else {
            (grade.weighted_score / 4.0).round() as i64
        };
        events.push(StreamEvent::Progress(ProgressUpdate {
            xp_gained,
            world_id: request
                .world_id
                .clone()
                .unwrap_or_else(|| WorldId::from_string(DEFAULT_WORLD)),
            new_world_level: 1,
            world_level_up: false,
            new_global_level: 1,
            global_level_up: false,
        }));
    }
    events
}

fn boss_outcome(
    request: &StreamRequest,
    grade: &GradeSnapshot,
    passed: bool,
    fail_streak: u32,
) -> EncounterOutcome {
    let fail_streak = if passed { 0 } else { fail_streak + 1 };
    let hint_codex_id = (fail_streak >= HINT_AFTER_FAILS).then(|| {
        request
            .codex_id
            .clone()
            .unwrap_or_else(|| CodexId::from_string(DEFAULT_BOSS))
    });
    let mut breakdown = IndexMap::new();
    breakdown.insert("coverage".to_owned(), grade.coverage);
    breakdown.insert("correctness".to_owned(), grade.correctness);
    breakdown.insert("clarity".to_owned(), grade.clarity);
    breakdown.insert(
        "boss_hp".to_owned(),
        if passed { 0.0 } else { 100.0 - grade.weighted_score },
    );

    EncounterOutcome {
        boss_id: BossId::from_string(DEFAULT_BOSS),
        passed,
        score: grade.weighted_score,
        integrity_delta: if passed { 0 } else { FAIL_INTEGRITY_DELTA },
        xp_awarded: if passed { BOSS_XP_REWARD } else { 0 },
        breakdown,
        fail_streak: Some(fail_streak),
        hint_codex_id,
    }
}

pub fn as_sse_event(event: &StreamEvent) -> Event {
    let payload = event
        .to_data()
        .unwrap_or_else(|error| json!({ "error": error.to_string() }).to_string());
    Event::default()
        .event(event.event_type().as_str())
        .data(payload)
}

pub fn done_event() -> Event {
    Event::default().data(DONE_SENTINEL)
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackRow {
    pub world_slug: String,
    pub track_slug: String,
    pub label: String,
    pub progress: f64,
    pub total_quests: u32,
    pub completed_quests: u32,
}

/// World progress served by `/api/worlds/progress`.
#[derive(Debug, Clone)]
pub struct ProgressBoard {
    tracks: IndexMap<String, TrackRow>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        let mut board = Self {
            tracks: IndexMap::new(),
        };
        board.add(DEFAULT_WORLD, "ownership", "Ownership & Borrowing", 8);
        board.add(DEFAULT_WORLD, "async", "Async Rust", 10);
        board
    }
}

impl ProgressBoard {
    fn add(&mut self, world: &str, track: &str, label: &str, total_quests: u32) {
        self.tracks.insert(
            track.to_owned(),
            TrackRow {
                world_slug: world.to_owned(),
                track_slug: track.to_owned(),
                label: label.to_owned(),
                progress: 0.0,
                total_quests,
                completed_quests: 0,
            },
        );
    }

    /// Credit one quest on `track`, or on the first track when unknown.
    pub fn complete_quest(&mut self, track: Option<&str>) {
        let row = match track.and_then(|slug| self.tracks.get_index_of(slug)) {
            Some(index) => self.tracks.get_index_mut(index).map(|(_, row)| row),
            None => self.tracks.get_index_mut(0).map(|(_, row)| row),
        };
        if let Some(row) = row {
            row.completed_quests = (row.completed_quests + 1).min(row.total_quests);
            row.progress = f64::from(row.completed_quests) / f64::from(row.total_quests.max(1));
        }
    }

    pub fn tracks(&self) -> Vec<TrackRow> {
        self.tracks.values().cloned().collect()
    }
}
