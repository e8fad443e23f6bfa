use arcade_encounter::DEFAULT_INTEGRITY_MAX;
use arcade_protocol::{SessionId, StreamRequest};
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_USER: &str = "test";
pub const APP_NAME: &str = "arcade_app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub user: String,
    pub session_id: SessionId,
    pub default_mode: String,
    pub integrity_max: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            user: DEFAULT_USER.to_owned(),
            session_id: SessionId::new_uuid(),
            default_mode: StreamRequest::DEFAULT_MODE.to_owned(),
            integrity_max: DEFAULT_INTEGRITY_MAX,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn default_mode(mut self, mode: impl Into<String>) -> Self {
        self.default_mode = mode.into();
        self
    }

    pub fn integrity_max(mut self, integrity_max: i32) -> Self {
        self.integrity_max = integrity_max.max(0);
        self
    }

    /// `POST` target of the streaming query. User and session are
    /// percent-encoded as single path segments.
    pub fn stream_url(&self) -> String {
        self.endpoint(&[
            "apps",
            APP_NAME,
            "users",
            &self.user,
            "sessions",
            self.session_id.as_str(),
            "query",
            "stream",
        ])
    }

    pub fn progress_url(&self) -> String {
        self.endpoint(&["api", "worlds", "progress"])
    }

    fn endpoint(&self, segments: &[&str]) -> String {
        if let Ok(mut url) = Url::parse(&self.base_url) {
            let appended = url
                .path_segments_mut()
                .map(|mut path| {
                    path.pop_if_empty().extend(segments);
                })
                .is_ok();
            if appended {
                return url.into();
            }
        }
        // Not a usable base; the request itself reports the bad URL.
        format!("{}/{}", self.base_url, segments.join("/"))
    }
}
