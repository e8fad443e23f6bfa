use std::sync::Arc;

use arcade_encounter::{Clock, CountdownSupervisor, EncounterHandle, EncounterSession, SystemClock};
use arcade_protocol::{
    ChunkSource, GradeSnapshot, ProgressRefresher, ProgressUpdate, SpawnNotice, StreamError,
    StreamEvent, StreamRequest, Transcript,
};
use arcade_stream::{
    AbortHandle, DEFAULT_FEED_BUFFER, DecodeSummary, Dispatcher, FeedHub, LiveFeed, StreamDecoder,
    Termination,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::config::ClientConfig;
use crate::http::{HttpChunkSource, HttpProgressRefresher, TrackProgressCache};

/// How a `send_message` call ended, short of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed(DecodeSummary),
    /// Stopped by [`ArcadeClient::stop_stream`]. Not an error.
    Aborted(DecodeSummary),
    /// Another stream is still running; nothing was sent.
    Busy,
    /// The message was blank; nothing was sent.
    EmptyMessage,
}

pub struct ArcadeClientBuilder {
    config: ClientConfig,
    source: Option<Arc<dyn ChunkSource>>,
    refresher: Option<Arc<dyn ProgressRefresher>>,
    progress_refresh: bool,
    encounter: Option<EncounterHandle>,
    clock: Arc<dyn Clock>,
    feed_buffer: usize,
}

impl ArcadeClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            source: None,
            refresher: None,
            progress_refresh: true,
            encounter: None,
            clock: Arc::new(SystemClock),
            feed_buffer: DEFAULT_FEED_BUFFER,
        }
    }

    pub fn chunk_source(mut self, source: Arc<dyn ChunkSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn progress_refresher(mut self, refresher: Arc<dyn ProgressRefresher>) -> Self {
        self.refresher = Some(refresher);
        self.progress_refresh = true;
        self
    }

    pub fn without_progress_refresh(mut self) -> Self {
        self.refresher = None;
        self.progress_refresh = false;
        self
    }

    /// Share an existing encounter instead of creating one.
    pub fn encounter(mut self, encounter: EncounterHandle) -> Self {
        self.encounter = Some(encounter);
        self
    }

    /// Ignored when an encounter handle is supplied.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn feed_buffer(mut self, buffer: usize) -> Self {
        self.feed_buffer = buffer.max(1);
        self
    }

    pub fn build(self) -> ArcadeClient {
        let progress = TrackProgressCache::new();
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(HttpChunkSource::new(&self.config)));
        let refresher = match (self.progress_refresh, self.refresher) {
            (false, _) => None,
            (true, Some(refresher)) => Some(refresher),
            (true, None) => Some(Arc::new(HttpProgressRefresher::new(
                &self.config,
                progress.clone(),
            )) as Arc<dyn ProgressRefresher>),
        };
        let encounter = self.encounter.unwrap_or_else(|| {
            EncounterHandle::new(EncounterSession::new(self.config.integrity_max), self.clock)
        });

        let feed = LiveFeed::new();
        let hub = FeedHub::new(self.feed_buffer);
        let mut dispatcher = Dispatcher::new(feed.clone(), encounter.clone(), hub.clone());
        if let Some(refresher) = refresher {
            dispatcher = dispatcher.with_refresher(refresher);
        }

        ArcadeClient {
            config: self.config,
            source,
            dispatcher,
            feed,
            hub,
            encounter,
            progress,
            active: Arc::new(Mutex::new(None)),
        }
    }
}

/// Ends the exchange even when the `send` future is dropped mid-stream.
struct ExchangeGuard<'a> {
    client: &'a ArcadeClient,
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        *self.client.active.lock() = None;
        self.client.feed.finish_exchange();
    }
}

/// Composition root of the live-encounter client.
///
/// One stream runs at a time. Clones share the feed, the encounter and the
/// running stream, so any clone can stop it.
#[derive(Clone)]
pub struct ArcadeClient {
    config: ClientConfig,
    source: Arc<dyn ChunkSource>,
    dispatcher: Dispatcher,
    feed: LiveFeed,
    hub: FeedHub,
    encounter: EncounterHandle,
    progress: TrackProgressCache,
    active: Arc<Mutex<Option<AbortHandle>>>,
}

impl ArcadeClient {
    pub fn builder(config: ClientConfig) -> ArcadeClientBuilder {
        ArcadeClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send with the configured default mode.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, StreamError> {
        let request = StreamRequest::new(text).mode(self.config.default_mode.clone());
        self.send(request).await
    }

    /// Send one message and decode the streamed reply into the feed and the
    /// encounter.
    ///
    /// Transport failures are returned and also appended to the streaming
    /// assistant entry as `[Error: ...]`.
    #[instrument(skip(self, request), fields(session_id = %self.config.session_id, mode = %request.mode))]
    pub async fn send(&self, mut request: StreamRequest) -> Result<SendOutcome, StreamError> {
        request.message = request.message.trim().to_owned();
        if request.message.is_empty() {
            return Ok(SendOutcome::EmptyMessage);
        }

        let abort = AbortHandle::new();
        let exchange = {
            // Held across `begin_exchange` so `stop_stream` never sees a
            // running exchange without its abort handle.
            let mut active = self.active.lock();
            if !self.feed.begin_exchange(request.message.clone()) {
                return Ok(SendOutcome::Busy);
            }
            *active = Some(abort.clone());
            ExchangeGuard { client: self }
        };
        let result = self.run_stream(&request, &abort).await;
        drop(exchange);

        match result {
            Ok(summary) if summary.termination == Termination::Aborted => {
                info!(dispatched = summary.frames_dispatched, "stream stopped");
                Ok(SendOutcome::Aborted(summary))
            }
            Ok(summary) => Ok(SendOutcome::Completed(summary)),
            Err(StreamError::Aborted) => Ok(SendOutcome::Aborted(DecodeSummary {
                frames_dispatched: 0,
                frames_dropped: 0,
                termination: Termination::Aborted,
            })),
            Err(error) => {
                warn!(%error, "stream failed");
                self.feed.annotate_error(&error.to_string());
                Err(error)
            }
        }
    }

    async fn run_stream(
        &self,
        request: &StreamRequest,
        abort: &AbortHandle,
    ) -> Result<DecodeSummary, StreamError> {
        let mut signal = abort.signal();
        let chunks = tokio::select! {
            biased;
            () = signal.aborted() => return Err(StreamError::Aborted),
            opened = self.source.open(request) => opened?,
        };
        StreamDecoder::new(self.dispatcher.clone())
            .run(chunks, &mut signal)
            .await
    }

    /// Abort the running stream, if any. Returns whether one was running.
    pub fn stop_stream(&self) -> bool {
        match self.active.lock().take() {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.feed.is_streaming()
    }

    pub fn latest_grade(&self) -> Option<GradeSnapshot> {
        self.feed.latest_grade()
    }

    pub fn last_progress(&self) -> Option<ProgressUpdate> {
        self.feed.last_progress()
    }

    pub fn transcript(&self) -> Transcript {
        self.feed.transcript()
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    pub fn subscribe_feed(&self) -> broadcast::Receiver<StreamEvent> {
        self.hub.subscribe()
    }

    pub fn encounter(&self) -> &EncounterHandle {
        &self.encounter
    }

    /// Start an encounter from a `boss_spawn` notification.
    pub fn spawn_encounter(&self, notice: SpawnNotice) -> u64 {
        self.encounter.start(&notice.into_spec())
    }

    /// Keep a countdown running for whichever encounter is active.
    pub fn spawn_countdown(&self) -> CountdownSupervisor {
        CountdownSupervisor::spawn(self.encounter.clone())
    }

    /// Filled by the default HTTP progress refresher.
    pub fn track_progress(&self) -> &TrackProgressCache {
        &self.progress
    }
}
