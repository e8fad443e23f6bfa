use arcade_protocol::{ChunkSource, ChunkStream, StreamError, StreamRequest, StreamResult};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tracing::debug;

/// Replays captured stream text in fixed-size chunks.
///
/// Chunks are cut on character boundaries, so `chunk_size` counts
/// characters. An optional failure can be injected after a number of chunks.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    text: String,
    chunk_size: usize,
    fail_after: Option<(usize, StreamError)>,
}

impl ReplaySource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunk_size: 64,
            fail_after: None,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Emit `error` after `chunks` chunks instead of the rest of the text.
    pub fn fail_after(mut self, chunks: usize, error: StreamError) -> Self {
        self.fail_after = Some((chunks, error));
        self
    }

    fn chunks(&self) -> Vec<StreamResult<String>> {
        let chars: Vec<char> = self.text.chars().collect();
        let mut chunks: Vec<StreamResult<String>> = chars
            .chunks(self.chunk_size)
            .map(|piece| Ok(piece.iter().collect()))
            .collect();
        if let Some((after, error)) = &self.fail_after {
            chunks.truncate(*after);
            chunks.push(Err(error.clone()));
        }
        chunks
    }
}

#[async_trait]
impl ChunkSource for ReplaySource {
    async fn open(&self, request: &StreamRequest) -> StreamResult<ChunkStream> {
        let chunks = self.chunks();
        debug!(mode = %request.mode, chunks = chunks.len(), "replaying captured stream");
        Ok(stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(source: &ReplaySource) -> Vec<StreamResult<String>> {
        source
            .open(&StreamRequest::new("replay"))
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn cuts_on_character_boundaries() {
        let source = ReplaySource::new("aé🙂b").chunk_size(2);
        let chunks = drain(&source).await;
        assert_eq!(chunks, vec![Ok("aé".to_string()), Ok("🙂b".to_string())]);
    }

    #[tokio::test]
    async fn injected_failure_replaces_the_tail() {
        let source = ReplaySource::new("abcdef")
            .chunk_size(2)
            .fail_after(1, StreamError::Transport("reset".into()));
        let chunks = drain(&source).await;
        assert_eq!(
            chunks,
            vec![
                Ok("ab".to_string()),
                Err(StreamError::Transport("reset".into()))
            ]
        );
    }
}
