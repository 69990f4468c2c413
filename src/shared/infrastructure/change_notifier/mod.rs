// Change notifier port: advisory "this stream may have changed" signals between sessions.
//
// Purpose
// - Let a session announce a committed append to every other session sharing the same store.
// - Let a session listen for announcements made by the others.
//
// Delivery
// - Topic key is the stream identifier. The signal carries nothing else.
// - Best effort and at most once per commit. Sessions that are not listening miss it.
// - A session never receives its own announcements.
// - No ordering is promised across sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod broadcast;
pub mod in_memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChanged {
    pub stream_id: String,
}

#[async_trait]
pub trait ChangeSubscription: Send + 'static {
    /// Next change announced by another session. `None` once no announcement can arrive anymore.
    async fn recv(&mut self) -> Option<StreamChanged>;
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync + 'static {
    type Subscription: ChangeSubscription;

    /// Fire and forget.
    async fn publish(&self, stream_id: &str);

    fn subscribe(&self) -> Self::Subscription;
}
