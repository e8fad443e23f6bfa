use arcade_protocol::{ChunkStream, StreamError, StreamResult};
use futures_util::StreamExt;
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::abort::AbortSignal;
use crate::dispatch::Dispatcher;
use crate::frame::FrameSplitter;
use crate::parse::{ParsedFrame, parse_frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub frames_dispatched: usize,
    /// Frames whose payload failed to decode.
    pub frames_dropped: usize,
    pub termination: Termination,
}

/// Drives one chunk stream through splitting, parsing and dispatch.
///
/// Frames are dispatched strictly in order; frame N's side effect is applied
/// before frame N+1 is parsed.
#[derive(Debug)]
pub struct StreamDecoder {
    splitter: FrameSplitter,
    dispatcher: Dispatcher,
    dispatched: usize,
    dropped: usize,
}

impl StreamDecoder {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            splitter: FrameSplitter::new(),
            dispatcher,
            dispatched: 0,
            dropped: 0,
        }
    }

    /// Consume `chunks` until it ends, fails, or `abort` fires.
    ///
    /// Abort is not an error. A source that itself reports
    /// [`StreamError::Aborted`] is treated the same way.
    #[instrument(skip_all)]
    pub async fn run(
        mut self,
        mut chunks: ChunkStream,
        abort: &mut AbortSignal,
    ) -> StreamResult<DecodeSummary> {
        loop {
            if abort.is_aborted() {
                return Ok(self.summary(Termination::Aborted));
            }
            let next = tokio::select! {
                biased;
                () = abort.aborted() => return Ok(self.summary(Termination::Aborted)),
                next = chunks.next() => next,
            };
            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(StreamError::Aborted)) => return Ok(self.summary(Termination::Aborted)),
                Some(Err(error)) => {
                    warn!(%error, dispatched = self.dispatched, "stream failed");
                    return Err(error);
                }
            };
            trace!(bytes = chunk.len(), "chunk received");
            for frame in self.splitter.push(&chunk) {
                if abort.is_aborted() {
                    return Ok(self.summary(Termination::Aborted));
                }
                self.handle_frame(&frame);
            }
        }

        if let Some(tail) = self.splitter.finish() {
            if abort.is_aborted() {
                return Ok(self.summary(Termination::Aborted));
            }
            debug!("flushing unterminated final frame");
            self.handle_frame(&tail);
        }
        Ok(self.summary(Termination::Completed))
    }

    fn handle_frame(&mut self, frame: &str) {
        match parse_frame(frame) {
            ParsedFrame::Event(raw) => match self.dispatcher.dispatch_raw(&raw) {
                Ok(()) => {
                    self.dispatched += 1;
                    trace!(event_type = %raw.event_type, "frame dispatched");
                }
                Err(error) => {
                    self.dropped += 1;
                    warn!(%error, "dropping malformed frame");
                }
            },
            ParsedFrame::Done => trace!("done sentinel"),
            ParsedFrame::Empty => trace!("frame without data"),
        }
    }

    fn summary(&self, termination: Termination) -> DecodeSummary {
        let summary = DecodeSummary {
            frames_dispatched: self.dispatched,
            frames_dropped: self.dropped,
            termination,
        };
        debug!(?summary, "stream decode finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortHandle;
    use crate::feed::{FeedState, LiveFeed};
    use crate::hub::FeedHub;
    use arcade_encounter::EncounterHandle;
    use arcade_protocol::{BossId, Difficulty, EncounterSpec, EncounterStatus};
    use futures_util::stream;

    const SCRIPT: &str = "event: npc_identity\ndata: {\"name\":\"Ada\",\"title\":\"Judge\"}\n\n\
        event: text_delta\ndata: Nice\n\n\
        event: text_delta\r\ndata:  work\r\ndata: so far\r\n\r\n\
        event: grade\ndata: {\"weighted_score\":80,\"coverage\":70,\"comment\":\"ok\"}\n\n\
        event: progress\ndata: {\"xp_gained\":25,\"world_id\":\"w1\"}\n\n\
        data: [DONE]\n\n";

    fn chunks_of(text: &str, size: usize) -> ChunkStream {
        let chars: Vec<char> = text.chars().collect();
        let pieces: Vec<StreamResult<String>> = chars
            .chunks(size)
            .map(|piece| Ok(piece.iter().collect()))
            .collect();
        stream::iter(pieces).boxed()
    }

    fn decoder() -> (StreamDecoder, LiveFeed, EncounterHandle) {
        let feed = LiveFeed::new();
        let encounter = EncounterHandle::default();
        let dispatcher = Dispatcher::new(feed.clone(), encounter.clone(), FeedHub::default());
        (StreamDecoder::new(dispatcher), feed, encounter)
    }

    async fn run_script(text: &str, size: usize) -> (DecodeSummary, FeedState) {
        let (decoder, feed, _) = decoder();
        feed.begin_exchange("question");
        let mut signal = AbortHandle::new().signal();
        let summary = decoder.run(chunks_of(text, size), &mut signal).await.unwrap();
        (summary, feed.snapshot())
    }

    #[tokio::test]
    async fn full_script_updates_the_feed() {
        let (summary, feed) = run_script(SCRIPT, 4096).await;
        assert_eq!(summary.frames_dispatched, 5);
        assert_eq!(summary.frames_dropped, 0);
        assert_eq!(summary.termination, Termination::Completed);

        let last = feed.transcript.last().unwrap();
        assert_eq!(last.content, "Nice work\nso far");
        assert_eq!(last.npc.as_ref().map(|n| n.name.as_str()), Some("Ada"));
        assert_eq!(feed.latest_grade.map(|g| g.weighted_score), Some(80.0));
        assert_eq!(feed.last_progress.map(|p| p.xp_gained), Some(25));
    }

    #[tokio::test]
    async fn chunk_size_does_not_change_the_result() {
        let expected = run_script(SCRIPT, SCRIPT.len()).await;
        for size in 1..=40 {
            assert_eq!(run_script(SCRIPT, size).await, expected, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn grade_split_into_three_chunks() {
        let (decoder, feed, _) = decoder();
        let chunks: Vec<StreamResult<String>> = vec![
            Ok("event: gra".into()),
            Ok("de\ndata: {\"weighted_sc".into()),
            Ok("ore\":80}\n\n".into()),
        ];
        let mut signal = AbortHandle::new().signal();
        let summary = decoder
            .run(stream::iter(chunks).boxed(), &mut signal)
            .await
            .unwrap();
        assert_eq!(summary.frames_dispatched, 1);
        assert_eq!(feed.latest_grade().map(|g| g.weighted_score), Some(80.0));
    }

    #[tokio::test]
    async fn malformed_frame_does_not_stop_the_stream() {
        let text = "event: grade\ndata: {oops\n\nevent: grade\ndata: {\"weighted_score\":55}\n\n";
        let (summary, feed) = run_script(text, 7).await;
        assert_eq!(summary.frames_dropped, 1);
        assert_eq!(summary.frames_dispatched, 1);
        assert_eq!(feed.latest_grade.map(|g| g.weighted_score), Some(55.0));
    }

    #[tokio::test]
    async fn unterminated_last_frame_is_flushed() {
        let (summary, feed) = run_script("event: text_delta\ndata: tail", 3).await;
        assert_eq!(summary.frames_dispatched, 1);
        assert_eq!(feed.transcript.last().map(|e| e.content.as_str()), Some("tail"));
    }

    #[tokio::test]
    async fn boss_result_closes_the_encounter() {
        let (decoder, _feed, encounter) = decoder();
        encounter.start(&EncounterSpec {
            boss_id: BossId::from_string("boss-reactor-core"),
            name: "Reactor Core Meltdown".into(),
            difficulty: Difficulty::Normal,
            duration_secs: 1_800,
            hp_penalty_on_fail: 10,
            base_xp_reward: 300,
        });
        let text = "event: boss_result\ndata: {\"boss_id\":\"boss-reactor-core\",\"passed\":false,\
            \"score\":42,\"integrity_delta\":-20,\"hint_codex_id\":\"codex-7\"}\n\n";
        let mut signal = AbortHandle::new().signal();
        decoder.run(chunks_of(text, 5), &mut signal).await.unwrap();

        let snapshot = encounter.snapshot();
        assert_eq!(snapshot.status(), EncounterStatus::Failed);
        assert_eq!(snapshot.integrity_current(), 80);
        assert!(snapshot.hint_unread());
        assert_eq!(snapshot.hint_codex_id().map(|c| c.as_str()), Some("codex-7"));
    }

    #[tokio::test]
    async fn transport_error_is_returned() {
        let (decoder, feed, _) = decoder();
        let chunks: Vec<StreamResult<String>> = vec![
            Ok("event: grade\ndata: {\"weighted_score\":10}\n\n".into()),
            Err(StreamError::Transport("connection reset".into())),
            Ok("event: grade\ndata: {\"weighted_score\":99}\n\n".into()),
        ];
        let mut signal = AbortHandle::new().signal();
        let error = decoder
            .run(stream::iter(chunks).boxed(), &mut signal)
            .await
            .unwrap_err();
        assert_eq!(error, StreamError::Transport("connection reset".into()));
        assert_eq!(feed.latest_grade().map(|g| g.weighted_score), Some(10.0));
    }

    #[tokio::test]
    async fn abort_before_start_dispatches_nothing() {
        let (decoder, feed, _) = decoder();
        let handle = AbortHandle::new();
        handle.abort();
        let mut signal = handle.signal();
        let summary = decoder.run(chunks_of(SCRIPT, 8), &mut signal).await.unwrap();
        assert_eq!(summary.termination, Termination::Aborted);
        assert_eq!(summary.frames_dispatched, 0);
        assert_eq!(feed.latest_grade(), None);
    }

    #[tokio::test]
    async fn abort_while_waiting_for_a_chunk() {
        let (decoder, feed, _) = decoder();
        let handle = AbortHandle::new();
        let mut signal = handle.signal();
        let first = stream::iter(vec![Ok::<_, StreamError>(
            "event: grade\ndata: {\"weighted_score\":1}\n\n".to_string(),
        )]);
        let chunks = first.chain(stream::pending()).boxed();

        let task = tokio::spawn(async move { decoder.run(chunks, &mut signal).await });
        tokio::task::yield_now().await;
        handle.abort();

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.termination, Termination::Aborted);
        assert_eq!(summary.frames_dispatched, 1);
        assert_eq!(feed.latest_grade().map(|g| g.weighted_score), Some(1.0));
    }

    #[tokio::test]
    async fn source_abort_is_not_an_error() {
        let (decoder, _, _) = decoder();
        let chunks: Vec<StreamResult<String>> = vec![Err(StreamError::Aborted)];
        let mut signal = AbortHandle::new().signal();
        let summary = decoder
            .run(stream::iter(chunks).boxed(), &mut signal)
            .await
            .unwrap();
        assert_eq!(summary.termination, Termination::Aborted);
    }
}
