//! Shared headline cache.
//!
//! The store keeps the latest [`Snapshot`] behind a read-many/write-one lock.
//! A snapshot is reference counted, so the write lock is held only for the
//! pointer swap and a reader leaves the lock with its own handle to a
//! complete list. Readers never observe a half-written list.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::news::HeadlineItem;

/// Immutable, wholesale-replaceable list of headlines in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<[HeadlineItem]>);

impl Snapshot {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Returns true if both snapshots are the same installed value.
    pub fn same_as(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<HeadlineItem>> for Snapshot {
    fn from(items: Vec<HeadlineItem>) -> Self {
        Self(Arc::from(items))
    }
}

impl Deref for Snapshot {
    type Target = [HeadlineItem];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Holder of the current headline snapshot.
///
/// Written by exactly one refresher, read by every session.
#[derive(Debug, Default)]
pub struct CacheStore {
    current: RwLock<Snapshot>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(snapshot),
        }
    }

    /// Returns the current snapshot.
    ///
    /// Never waits on a fetch: the refresher builds the new list before
    /// taking the write lock.
    pub fn read(&self) -> Snapshot {
        self.current.read().clone()
    }

    /// Installs `snapshot` for all subsequent reads.
    pub fn replace(&self, snapshot: Snapshot) {
        *self.current.write() = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn items(tag: &str, count: usize) -> Vec<HeadlineItem> {
        (0..count)
            .map(|i| HeadlineItem {
                headline: format!("{tag}-{i}"),
                summary: tag.to_string(),
                link: format!("https://example.com/{tag}/{i}"),
            })
            .collect()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = CacheStore::new();
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_replace_is_visible_to_next_read() {
        let store = CacheStore::new();
        store.replace(Snapshot::from(items("a", 3)));

        let snapshot = store.read();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].headline, "a-0");
        assert_eq!(snapshot[2].headline, "a-2");
    }

    #[test]
    fn test_old_snapshot_survives_replace() {
        let store = CacheStore::with_snapshot(Snapshot::from(items("old", 2)));
        let held = store.read();

        store.replace(Snapshot::from(items("new", 4)));

        assert_eq!(held.len(), 2);
        assert!(held.iter().all(|item| item.summary == "old"));
        assert_eq!(store.read().len(), 4);
        assert!(!held.same_as(&store.read()));
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_snapshot() {
        let store = CacheStore::with_snapshot(Snapshot::from(items("gen0", 8)));

        thread::scope(|scope| {
            scope.spawn(|| {
                for generation in 1..200 {
                    let tag = format!("gen{generation}");
                    store.replace(Snapshot::from(items(&tag, 8)));
                }
            });

            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let snapshot = store.read();
                        assert_eq!(snapshot.len(), 8);
                        let tag = &snapshot[0].summary;
                        assert!(snapshot.iter().all(|item| &item.summary == tag));
                    }
                });
            }
        });
    }
}
