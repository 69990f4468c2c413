// In memory implementation of the ChangeNotifier port.
//
// Purpose
// - Support handler tests that verify which streams were announced, and when nothing was.
//
// Responsibilities
// - Record every published stream id in order for inspection.
// - Let a test inject a change as if another session had announced it.

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tracing::warn;

use crate::shared::infrastructure::change_notifier::{
    ChangeNotifier, ChangeSubscription, StreamChanged,
};

pub struct InMemoryChangeNotifier {
    pub published: Mutex<Vec<String>>,
    remote: broadcast::Sender<StreamChanged>,
}

impl Default for InMemoryChangeNotifier {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl InMemoryChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` bounds how many injected changes a subscriber may fall behind before it skips.
    pub fn with_capacity(capacity: usize) -> Self {
        let (remote, _) = broadcast::channel(capacity.max(1));
        Self {
            published: Mutex::new(Vec::new()),
            remote,
        }
    }

    pub async fn published(&self) -> Vec<String> {
        self.published.lock().await.clone()
    }

    /// Delivers `stream_id` to current subscribers as a change made elsewhere.
    pub fn inject_remote(&self, stream_id: &str) {
        let _ = self.remote.send(StreamChanged {
            stream_id: stream_id.to_string(),
        });
    }
}

#[async_trait]
impl ChangeNotifier for InMemoryChangeNotifier {
    type Subscription = InMemorySubscription;

    async fn publish(&self, stream_id: &str) {
        self.published.lock().await.push(stream_id.to_string());
    }

    fn subscribe(&self) -> InMemorySubscription {
        InMemorySubscription {
            receiver: self.remote.subscribe(),
        }
    }
}

pub struct InMemorySubscription {
    receiver: broadcast::Receiver<StreamChanged>,
}

#[async_trait]
impl ChangeSubscription for InMemorySubscription {
    async fn recv(&mut self) -> Option<StreamChanged> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed injected stream changes");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
