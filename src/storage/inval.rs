use std::sync::{
    mpsc::{channel, Receiver, Sender},
    Arc, Mutex,
};

use log::{debug, warn};

use crate::relation::RelationLocatorBackend;

/// Destination of shared invalidation messages telling every worker to
/// release its handle of a relation.
pub trait InvalidationSink {
    /// Tell every worker, this one included, to close the files of the
    /// relation and forget its cached sizes.
    fn broadcast_smgr(&mut self, rlocator: RelationLocatorBackend);
}

/// Invalidation channel shared by the workers of a cluster.
///
/// Each subscriber gets its own queue of messages, drained by
/// [accept_invalidation_messages](crate::storage::StorageManager::accept_invalidation_messages).
#[derive(Debug, Clone, Default)]
pub struct InvalidationBus {
    subscribers: Arc<Mutex<Vec<Sender<RelationLocatorBackend>>>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving every message broadcast from now on.
    pub fn subscribe(&self) -> Receiver<RelationLocatorBackend> {
        let (tx, rx) = channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(err) => warn!("could not subscribe to invalidation bus: {}", err),
        }
        rx
    }

    /// Number of live subscribers.
    pub fn num_subscribers(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl InvalidationSink for InvalidationBus {
    fn broadcast_smgr(&mut self, rlocator: RelationLocatorBackend) {
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                // Subscribers that went away are dropped from the bus.
                subscribers.retain(|tx| tx.send(rlocator).is_ok());
                debug!(
                    "broadcast smgr invalidation of {} to {} workers",
                    rlocator,
                    subscribers.len()
                );
            }
            Err(err) => warn!("could not broadcast invalidation of {}: {}", rlocator, err),
        }
    }
}
