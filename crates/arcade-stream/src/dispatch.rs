use std::sync::Arc;

use arcade_encounter::EncounterHandle;
use arcade_protocol::{DecodeError, ProgressRefresher, StreamEvent};
use tracing::{debug, trace, warn};

use crate::feed::LiveFeed;
use crate::hub::FeedHub;
use crate::parse::RawEvent;

/// Routes decoded events to their single side effect.
#[derive(Clone)]
pub struct Dispatcher {
    feed: LiveFeed,
    encounter: EncounterHandle,
    hub: FeedHub,
    refresher: Option<Arc<dyn ProgressRefresher>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("feed", &self.feed)
            .field("encounter", &self.encounter)
            .field("has_refresher", &self.refresher.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(feed: LiveFeed, encounter: EncounterHandle, hub: FeedHub) -> Self {
        Self {
            feed,
            encounter,
            hub,
            refresher: None,
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn ProgressRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    pub fn encounter(&self) -> &EncounterHandle {
        &self.encounter
    }

    pub fn dispatch_raw(&self, raw: &RawEvent) -> Result<(), DecodeError> {
        let event = StreamEvent::decode(&raw.event_type, &raw.data)?;
        self.dispatch(event);
        Ok(())
    }

    /// Apply one event. Must be called inside a tokio runtime when a
    /// refresher is configured.
    pub fn dispatch(&self, event: StreamEvent) {
        match &event {
            StreamEvent::Grade(grade) => self.feed.set_grade(grade.clone()),
            StreamEvent::Progress(progress) => self.feed.set_progress(progress.clone()),
            StreamEvent::TextDelta(delta) => {
                if !self.feed.append_text(delta) {
                    debug!("text delta without an assistant entry");
                }
            }
            StreamEvent::NpcIdentity(npc) => {
                if !self.feed.attach_npc(npc.clone()) {
                    debug!(npc = %npc.name, "npc identity without an assistant entry");
                }
            }
            StreamEvent::EncounterOutcome(outcome) => {
                self.encounter.apply_outcome(outcome.clone());
                if outcome.passed {
                    self.spawn_refresh();
                }
            }
            StreamEvent::Unclassified { event_type, data } => {
                trace!(%event_type, bytes = data.len(), "ignoring unclassified event");
                return;
            }
        }
        self.hub.publish(event);
    }

    fn spawn_refresh(&self) {
        let Some(refresher) = self.refresher.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(error) = refresher.refresh().await {
                warn!(%error, "world progress refresh failed");
            }
        });
    }
}
