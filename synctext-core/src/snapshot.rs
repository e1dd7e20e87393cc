//! Lock-free copy-on-write snapshot buffers.
//!
//! Each logical buffer is a single atomically swappable pointer to an
//! immutable `Arc<Vec<T>>`. Readers load the current snapshot without
//! coordination and own it independently; it never mutates underfoot.
//! Writers clone the current contents, mutate the clone, and publish it
//! through a compare-and-swap retry loop, so concurrent appends to the
//! same buffer cannot lose updates. The memory-ordering details live
//! entirely inside `arc-swap`; call sites only see `read`, `append`,
//! and `drain`.
//!
//! ```text
//!  append(x)                   read()
//!     │                          │
//!     ▼                          ▼
//!  clone ──► push ──► CAS    Arc<Vec<T>> (immutable snapshot)
//!     ▲                │
//!     └── retry on ────┘
//!         contention
//! ```
//!
//! Ordering contract: within one buffer, every published snapshot is a
//! superset-in-order of its predecessor until an explicit [`drain`]
//! swaps in an empty one. Items never disappear any other way. The
//! intended discipline is still one producer per operation buffer (the
//! poll loop feeds the local buffer, the listener feeds the remote
//! buffer); the CAS loop makes violations safe, not idiomatic.
//!
//! [`drain`]: SnapshotCell::drain

use arc_swap::ArcSwap;
use std::sync::Arc;

/// An atomically swappable handle to an immutable snapshot of `Vec<T>`.
pub struct SnapshotCell<T> {
    inner: ArcSwap<Vec<T>>,
}

impl<T: Clone> SnapshotCell<T> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Capture the current snapshot. Wait-free; the caller owns the
    /// returned snapshot and never observes later appends through it.
    pub fn read(&self) -> Arc<Vec<T>> {
        self.inner.load_full()
    }

    /// Clone-then-mutate-then-publish. Returns the length of the newly
    /// published snapshot. The closure-free API keeps contention retries
    /// internal: on a concurrent publish the clone-and-push is redone
    /// against the fresh snapshot.
    pub fn append(&self, item: T) -> usize {
        let mut published = 0;
        self.inner.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(item.clone());
            published = next.len();
            next
        });
        published
    }

    /// Atomically swap in an empty snapshot and return the consumed one.
    pub fn drain(&self) -> Arc<Vec<T>> {
        self.inner.swap(Arc::new(Vec::new()))
    }

    /// Length of the currently published snapshot.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded ring of human-readable notification strings.
///
/// Behaves like a [`SnapshotCell`] whose appends evict the oldest entry
/// once `capacity` is exceeded. Notifications are never drained; they
/// age out.
pub struct NotificationRing {
    inner: ArcSwap<Vec<String>>,
    capacity: usize,
}

impl NotificationRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArcSwap::from_pointee(Vec::new()),
            capacity,
        }
    }

    /// Publish a new snapshot containing `message`, evicting from the
    /// front when over capacity.
    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        let capacity = self.capacity;
        self.inner.rcu(|current| {
            let mut next = (**current).clone();
            next.push(message.clone());
            while next.len() > capacity {
                next.remove(0);
            }
            next
        });
    }

    /// Capture the current notification snapshot, oldest first.
    pub fn read(&self) -> Arc<Vec<String>> {
        self.inner.load_full()
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The process-wide store: one buffer of locally-detected unsent
/// operations, one of remotely-received unmerged operations, and the
/// notification ring. Owns the only live pointer of each buffer.
pub struct SyncStore<T> {
    pub local: SnapshotCell<T>,
    pub remote: SnapshotCell<T>,
    pub notifications: NotificationRing,
}

impl<T: Clone> SyncStore<T> {
    pub fn new(notification_capacity: usize) -> Self {
        Self {
            local: SnapshotCell::new(),
            remote: SnapshotCell::new(),
            notifications: NotificationRing::new(notification_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_cell() {
        let cell: SnapshotCell<u64> = SnapshotCell::new();
        assert!(cell.is_empty());
        assert_eq!(cell.len(), 0);
        assert!(cell.read().is_empty());
    }

    #[test]
    fn test_append_publishes_in_order() {
        let cell = SnapshotCell::new();
        assert_eq!(cell.append(1), 1);
        assert_eq!(cell.append(2), 2);
        assert_eq!(cell.append(3), 3);
        assert_eq!(*cell.read(), vec![1, 2, 3]);
    }

    #[test]
    fn test_snapshot_isolation() {
        let cell = SnapshotCell::new();
        cell.append("a".to_string());

        let captured = cell.read();
        cell.append("b".to_string());

        // The captured snapshot never observes the later append.
        assert_eq!(*captured, vec!["a".to_string()]);
        // A fresh read does.
        assert_eq!(cell.read().len(), 2);
    }

    #[test]
    fn test_drain_returns_consumed_snapshot() {
        let cell = SnapshotCell::new();
        cell.append(10);
        cell.append(20);

        let drained = cell.drain();
        assert_eq!(*drained, vec![10, 20]);
        assert!(cell.is_empty());

        // Draining an empty buffer is a harmless no-op.
        assert!(cell.drain().is_empty());
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let cell = Arc::new(SnapshotCell::new());
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100u64 {
                    cell.append(t * 1000 + i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.len(), 400);

        // Per-producer order is preserved within the merged snapshot.
        let snapshot = cell.read();
        for t in 0..4u64 {
            let mine: Vec<u64> = snapshot
                .iter()
                .copied()
                .filter(|v| v / 1000 == t)
                .collect();
            let expected: Vec<u64> = (0..100).map(|i| t * 1000 + i).collect();
            assert_eq!(mine, expected);
        }
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let ring = NotificationRing::new(3);
        for i in 0..5 {
            ring.push(format!("msg {i}"));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(
            *ring.read(),
            vec!["msg 2".to_string(), "msg 3".to_string(), "msg 4".to_string()]
        );
    }

    #[test]
    fn test_ring_capacity_accessor() {
        let ring = NotificationRing::new(5);
        assert_eq!(ring.capacity(), 5);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_store_buffers_are_independent() {
        let store: SyncStore<u32> = SyncStore::new(5);
        store.local.append(1);
        store.remote.append(2);
        store.remote.append(3);

        assert_eq!(store.local.len(), 1);
        assert_eq!(store.remote.len(), 2);

        store.local.drain();
        assert!(store.local.is_empty());
        assert_eq!(store.remote.len(), 2);
    }
}
