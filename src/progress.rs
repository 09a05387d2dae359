use crate::types::{Category, ProgressEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

/// Bounded per-session capacity; a slow subscriber loses old events instead
/// of ever stalling the fetch loop.
const CHANNEL_CAPACITY: usize = 64;

/// Registry of per-session progress channels.
///
/// One broadcast channel per fetch session; publishing never blocks, and a
/// session with no subscribers simply drops its events. Sessions are
/// unregistered once their terminal event has gone out.
#[derive(Debug, Default)]
pub struct ProgressBroker {
    sessions: RwLock<HashMap<Uuid, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a channel exists for `session_id` so subscribers can attach
    /// before the fetch itself starts.
    pub fn register(&self, session_id: Uuid) -> broadcast::Sender<ProgressEvent> {
        let mut sessions = self.sessions.write().expect("progress registry poisoned");
        sessions
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Attach to a live session. `None` once the session has finished or if
    /// it never existed; a mid-session subscriber only sees events emitted
    /// after attachment.
    pub fn subscribe(&self, session_id: Uuid) -> Option<BroadcastStream<ProgressEvent>> {
        let sessions = self.sessions.read().expect("progress registry poisoned");
        sessions
            .get(&session_id)
            .map(|tx| BroadcastStream::new(tx.subscribe()))
    }

    /// Bind a publisher for one fetch session. `category` is the requested
    /// name as the caller sent it.
    pub fn open_session(
        self: &Arc<Self>,
        session_id: Uuid,
        category: String,
        target: usize,
    ) -> Arc<ProgressPublisher> {
        let tx = self.register(session_id);
        Arc::new(ProgressPublisher {
            broker: Arc::clone(self),
            session_id,
            category,
            target,
            tx,
            fetched: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        })
    }

    fn unregister(&self, session_id: &Uuid) {
        let mut sessions = self.sessions.write().expect("progress registry poisoned");
        sessions.remove(session_id);
    }

    #[cfg(test)]
    fn active_sessions(&self) -> usize {
        self.sessions.read().expect("progress registry poisoned").len()
    }
}

/// Producer half of one session's progress channel.
///
/// The terminal `done = true` event is emitted exactly once: explicitly via
/// `finish`, or from `Drop` if the session unwound without reaching it.
#[derive(Debug)]
pub struct ProgressPublisher {
    broker: Arc<ProgressBroker>,
    session_id: Uuid,
    category: String,
    target: usize,
    tx: broadcast::Sender<ProgressEvent>,
    fetched: AtomicUsize,
    finished: AtomicBool,
}

impl ProgressPublisher {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Emit an incremental event. Never blocks; send failures mean nobody is
    /// listening and the event is dropped.
    pub fn publish(&self, category: Category, items_fetched: usize, target: usize) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        if category.as_str() == self.category {
            self.fetched.store(items_fetched, Ordering::SeqCst);
        }
        let _ = self.tx.send(ProgressEvent {
            category: category.to_string(),
            items_fetched,
            target,
            done: false,
        });
    }

    /// Emit the terminal event and retire the session. Safe to call more
    /// than once; only the first call sends.
    pub fn finish(&self, items_fetched: usize) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(ProgressEvent {
            category: self.category.clone(),
            items_fetched,
            target: self.target,
            done: true,
        });
        self.broker.unregister(&self.session_id);
        debug!("session {} finished with {} items", self.session_id, items_fetched);
    }
}

impl Drop for ProgressPublisher {
    fn drop(&mut self) {
        self.finish(self.fetched.load(Ordering::SeqCst));
    }
}
