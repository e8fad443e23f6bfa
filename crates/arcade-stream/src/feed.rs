use std::sync::Arc;

use arcade_protocol::{GradeSnapshot, NpcIdentity, ProgressUpdate, Transcript};
use parking_lot::Mutex;
use serde::Serialize;

/// Everything the live stream has told the UI so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedState {
    pub latest_grade: Option<GradeSnapshot>,
    pub last_progress: Option<ProgressUpdate>,
    pub transcript: Transcript,
    pub is_streaming: bool,
}

/// Shared, cloneable view of [`FeedState`].
#[derive(Debug, Clone, Default)]
pub struct LiveFeed {
    state: Arc<Mutex<FeedState>>,
}

impl LiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FeedState {
        self.state.lock().clone()
    }

    pub fn latest_grade(&self) -> Option<GradeSnapshot> {
        self.state.lock().latest_grade.clone()
    }

    pub fn last_progress(&self) -> Option<ProgressUpdate> {
        self.state.lock().last_progress.clone()
    }

    pub fn transcript(&self) -> Transcript {
        self.state.lock().transcript.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().is_streaming
    }

    /// Open a new exchange: the user's text plus an empty assistant entry.
    ///
    /// Returns `false` and changes nothing while another stream is running.
    pub fn begin_exchange(&self, user_text: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        if state.is_streaming {
            return false;
        }
        state.transcript.begin_exchange(user_text);
        state.is_streaming = true;
        true
    }

    pub fn finish_exchange(&self) {
        self.state.lock().is_streaming = false;
    }

    pub fn set_grade(&self, grade: GradeSnapshot) {
        self.state.lock().latest_grade = Some(grade);
    }

    pub fn set_progress(&self, progress: ProgressUpdate) {
        self.state.lock().last_progress = Some(progress);
    }

    pub fn append_text(&self, delta: &str) -> bool {
        self.state.lock().transcript.append_text(delta)
    }

    pub fn attach_npc(&self, npc: NpcIdentity) -> bool {
        self.state.lock().transcript.attach_npc(npc)
    }

    pub fn annotate_error(&self, message: &str) -> bool {
        self.state.lock().transcript.annotate_error(message)
    }
}
