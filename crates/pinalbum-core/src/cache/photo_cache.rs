use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered change notifications per subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One cached photo. `payload` is `None` while the image is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Option<Vec<u8>>,
    /// Insertion sequence number; lower sorts first in `list()`.
    pub order: u64,
}

impl CacheEntry {
    pub fn is_pending(&self) -> bool {
        self.payload.is_none()
    }
}

/// Change notification delivered to `subscribe()` receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Inserted { key: String, pending: bool },
    Updated { key: String, pending: bool },
    Removed { keys: Vec<String> },
    Cleared { removed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    next_order: u64,
}

impl Inner {
    fn insert(&mut self, key: &str, payload: Option<Vec<u8>>) {
        let order = self.next_order;
        self.next_order += 1;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload,
                order,
            },
        );
    }
}

/// Ordered, keyed store of photo bytes shared between an album session and its observers.
///
/// Every mutation takes the one internal lock, so concurrent `put`s from
/// parallel downloads are atomic and `list()` is always a consistent snapshot.
/// Events are sent while that lock is held, so subscribers see them in
/// mutation order.
pub struct PhotoCache {
    inner: Mutex<Inner>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for PhotoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    /// Receive change notifications for every mutation from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: CacheEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Insert or overwrite `key`. A new key is appended after all current
    /// entries; an existing key keeps its position.
    pub fn put(&self, key: &str, payload: Option<Vec<u8>>) -> PutResult {
        let mut inner = self.inner.lock();
        let pending = payload.is_none();

        if let Some(entry) = inner.entries.get_mut(key) {
            if entry.payload == payload {
                return PutResult::Unchanged;
            }
            entry.payload = payload;
            self.notify(CacheEvent::Updated {
                key: key.to_string(),
                pending,
            });
            return PutResult::Updated;
        }

        inner.insert(key, payload);
        self.notify(CacheEvent::Inserted {
            key: key.to_string(),
            pending,
        });
        PutResult::Inserted
    }

    /// Reserve a slot for `key` with a pending payload. Existing entries are left alone.
    pub fn put_placeholder(&self, key: &str) -> PutResult {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(key) {
            return PutResult::Unchanged;
        }
        inner.insert(key, None);
        self.notify(CacheEvent::Inserted {
            key: key.to_string(),
            pending: true,
        });
        PutResult::Inserted
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Remove the given keys, returning how many were present.
    pub fn delete<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        let mut inner = self.inner.lock();
        let removed: Vec<String> = keys
            .iter()
            .filter_map(|k| inner.entries.remove(k.as_ref()).map(|e| e.key))
            .collect();

        let count = removed.len();
        if count > 0 {
            debug!(count, "Removed cache entries");
            self.notify(CacheEvent::Removed { keys: removed });
        }
        count
    }

    /// Remove every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        if removed > 0 {
            self.notify(CacheEvent::Cleared { removed });
        }
        removed
    }

    /// Snapshot of all entries in insertion order.
    pub fn list(&self) -> Vec<CacheEntry> {
        let inner = self.inner.lock();
        let mut entries: Vec<CacheEntry> = inner.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.order);
        entries
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keyed: Vec<(u64, &String)> =
            inner.entries.values().map(|e| (e.order, &e.key)).collect();
        keyed.sort_by_key(|(order, _)| *order);
        keyed.into_iter().map(|(_, k)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| e.is_pending())
            .count()
    }

    /// Bulk-load entries in the given order, e.g. when reading an album back from disk.
    pub fn restore<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Option<Vec<u8>>)>,
    {
        entries
            .into_iter()
            .map(|(key, payload)| self.put(&key, payload))
            .filter(|r| *r == PutResult::Inserted)
            .count()
    }
}

// ============================================================================
// Tests
// ============================================================================
