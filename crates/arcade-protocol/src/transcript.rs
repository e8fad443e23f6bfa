//! Conversation transcript.
//!
//! Append-only, except that the last entry may be amended in place while it
//! is an assistant entry being streamed.

use crate::event::NpcIdentity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc: Option<NpcIdentity>,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            npc: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            npc: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// Append the user's message followed by an empty assistant entry that
    /// the stream will fill in.
    pub fn begin_exchange(&mut self, user_text: impl Into<String>) {
        self.push(TranscriptEntry::user(user_text));
        self.push(TranscriptEntry::assistant(String::new()));
    }

    /// The last entry, only if it is an assistant entry.
    pub fn streaming_entry_mut(&mut self) -> Option<&mut TranscriptEntry> {
        self.entries
            .last_mut()
            .filter(|entry| entry.role == Role::Assistant)
    }

    /// Returns `false` when there is no assistant entry to amend.
    pub fn append_text(&mut self, delta: &str) -> bool {
        match self.streaming_entry_mut() {
            Some(entry) => {
                entry.content.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Later identities for the same message overwrite earlier ones.
    pub fn attach_npc(&mut self, npc: NpcIdentity) -> bool {
        match self.streaming_entry_mut() {
            Some(entry) => {
                entry.npc = Some(npc);
                true
            }
            None => false,
        }
    }

    pub fn annotate_error(&mut self, message: &str) -> bool {
        self.append_text(&format!("\n[Error: {message}]"))
    }
}
