//! In-process broadcast implementation of the ChangeNotifier port.
//!
//! One [`BroadcastHub`] exists per shared store. Each session joins the hub and gets its own
//! [`BroadcastNotifier`], tagged with a fresh [`SessionId`] so its own announcements are filtered
//! out of its subscription.

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::shared::infrastructure::change_notifier::{
    ChangeNotifier, ChangeSubscription, SessionId, StreamChanged,
};

#[derive(Debug, Clone)]
struct Announcement {
    origin: SessionId,
    change: StreamChanged,
}

#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Announcement>,
}

impl BroadcastHub {
    /// `capacity` is how many announcements a slow subscriber may fall behind before it skips.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn join(&self) -> BroadcastNotifier {
        BroadcastNotifier {
            session: SessionId::new(),
            sender: self.sender.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    session: SessionId,
    sender: broadcast::Sender<Announcement>,
}

impl BroadcastNotifier {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

#[async_trait]
impl ChangeNotifier for BroadcastNotifier {
    type Subscription = BroadcastSubscription;

    async fn publish(&self, stream_id: &str) {
        let announcement = Announcement {
            origin: self.session,
            change: StreamChanged {
                stream_id: stream_id.to_string(),
            },
        };
        match self.sender.send(announcement) {
            Ok(listeners) => debug!(session = %self.session, stream_id, listeners, "Announced stream change"),
            Err(_) => debug!(session = %self.session, stream_id, "No session listening for stream changes"),
        }
    }

    fn subscribe(&self) -> BroadcastSubscription {
        BroadcastSubscription {
            session: self.session,
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct BroadcastSubscription {
    session: SessionId,
    receiver: broadcast::Receiver<Announcement>,
}

#[async_trait]
impl ChangeSubscription for BroadcastSubscription {
    async fn recv(&mut self) -> Option<StreamChanged> {
        loop {
            match self.receiver.recv().await {
                Ok(announcement) if announcement.origin == self.session => continue,
                Ok(announcement) => return Some(announcement.change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(session = %self.session, skipped, "Missed stream change announcements");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
