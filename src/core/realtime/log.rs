//! Bounded call event log and binary frame store.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::base::{MessageKind, MessagePayload, MessageSource, RealtimeMessage};
use crate::utils::now_millis;

/// Default number of entries kept in the log.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Capacity of the live subscriber channel.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Path prefix of binary frame locators.
pub const FRAME_LOCATOR_PREFIX: &str = "/api/session/frames/";

/// Append-only event log retaining the last `capacity` entries.
///
/// Entries are never modified after insertion. Every append is also sent to
/// live subscribers; slow subscribers lag and miss entries instead of
/// blocking the producers.
pub struct MessageLog {
    capacity: usize,
    entries: Mutex<VecDeque<RealtimeMessage>>,
    next_id: AtomicU64,
    live: broadcast::Sender<RealtimeMessage>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            next_id: AtomicU64::new(1),
            live,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn append(
        &self,
        kind: MessageKind,
        source: MessageSource,
        payload: MessagePayload,
    ) -> RealtimeMessage {
        let message = RealtimeMessage {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            payload,
            timestamp: now_millis(),
            source,
        };

        {
            let mut entries = self.entries.lock();
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(message.clone());
        }

        // No subscribers is fine
        let _ = self.live.send(message.clone());
        message
    }

    /// Shorthand for a text entry.
    pub fn note(
        &self,
        kind: MessageKind,
        source: MessageSource,
        text: impl Into<String>,
    ) -> RealtimeMessage {
        self.append(kind, source, MessagePayload::text(text))
    }

    /// Entries in arrival order, oldest first.
    pub fn snapshot(&self) -> Vec<RealtimeMessage> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Receive every entry appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.live.subscribe()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Bounded store of binary frames addressed by locator.
///
/// Cloning is cheap; clones share the same storage.
#[derive(Clone)]
pub struct FrameStore {
    inner: Arc<Mutex<FrameStoreInner>>,
    capacity: usize,
}

struct FrameStoreInner {
    order: VecDeque<String>,
    frames: HashMap<String, Bytes>,
}

impl FrameStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FrameStoreInner {
                order: VecDeque::new(),
                frames: HashMap::new(),
            })),
            capacity: capacity.max(1),
        }
    }

    /// Store a frame and return its locator.
    pub fn insert(&self, data: Bytes) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut inner = self.inner.lock();
        while inner.order.len() >= self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.frames.remove(&evicted);
            }
        }
        inner.order.push_back(id.clone());
        inner.frames.insert(id.clone(), data);
        format!("{FRAME_LOCATOR_PREFIX}{id}")
    }

    /// Look a frame up by id or by full locator.
    pub fn get(&self, id_or_locator: &str) -> Option<Bytes> {
        let id = id_or_locator
            .strip_prefix(FRAME_LOCATOR_PREFIX)
            .unwrap_or(id_or_locator);
        self.inner.lock().frames.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.order.clear();
        inner.frames.clear();
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
