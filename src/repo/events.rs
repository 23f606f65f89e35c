//! repo::events
//!
//! Change notifications published after each successful refresh.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::state::RepositoryState;

/// Published after every successful refresh of a root.
#[derive(Debug, Clone)]
pub struct RepositoryChanged {
    /// The refreshed root
    pub root: PathBuf,
    /// The snapshot now visible through lookup
    pub state: Arc<RepositoryState>,
    /// Whether refs, HEAD or operation state differ from the previous snapshot
    pub changed: bool,
}

/// Broadcast channel shared by a manager and its repositories.
///
/// Subscribers that fall more than the channel capacity behind miss the
/// oldest events and observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RepositoryChanged>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryChanged> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: RepositoryChanged) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
