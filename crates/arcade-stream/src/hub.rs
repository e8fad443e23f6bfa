use arcade_protocol::StreamEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

pub const DEFAULT_FEED_BUFFER: usize = 256;

/// Fan-out of applied stream events to presentation layers.
///
/// Slow subscribers lag and miss events rather than slowing the decoder.
#[derive(Debug, Clone)]
pub struct FeedHub {
    sender: broadcast::Sender<StreamEvent>,
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_BUFFER)
    }
}

impl FeedHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn publish(&self, event: StreamEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<StreamEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
