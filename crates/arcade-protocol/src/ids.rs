//! Typed ID wrappers.
//!
//! IDs are opaque String wrappers (serde-transparent). Boss and codex IDs
//! are slugs chosen by the backend (`boss-reactor-core`); session IDs are
//! generated client-side as UUID v4 strings.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Conversation session on the backend service.
    SessionId
);
typed_id!(
    /// Boss definition slug, e.g. `boss-reactor-core`.
    BossId
);
typed_id!(
    /// Codex entry slug; used for unlockable hint guides.
    CodexId
);
typed_id!(
    /// World slug.
    WorldId
);
typed_id!(
    /// Track slug within a world.
    TrackId
);

impl SessionId {
    /// Create a new session ID using UUID v4 (random).
    pub fn new_uuid() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new_uuid()
    }
}
