//! In-memory notification store.
//!
//! Holds the ordered notification collection for one session, newest-first,
//! and derives the unread count from it. The store is the single source of
//! truth for every surface; network reconciliation lives in the service
//! layer, so store invariants never depend on request outcomes.

use std::sync::Mutex;

use thiserror::Error;

use super::models::Notification;

/// Error type for seeding the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The store was already seeded this session.
    #[error("notification store is already seeded")]
    AlreadySeeded,
}

struct Collection {
    records: Vec<Notification>,
    seeded: bool,
}

impl Collection {
    fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|record| record.id == id)
    }
}

/// Session-scoped notification collection.
///
/// All mutations are synchronous under one lock, so no caller can observe a
/// half-applied change. Records are kept newest-first: pushes prepend, the
/// one-time seed fills in behind whatever already arrived live.
pub struct NotificationStore {
    collection: Mutex<Collection>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    /// Create an empty, not-yet-seeded store.
    pub fn new() -> Self {
        Self {
            collection: Mutex::new(Collection {
                records: Vec::new(),
                seeded: false,
            }),
        }
    }

    /// One-time seed with the fetched backlog.
    ///
    /// Records pushed before the backlog arrived stay at the front (they are
    /// newer by definition); the backlog fills in behind them, skipping ids
    /// already present. A second call is rejected and changes nothing.
    ///
    /// Returns the unread count after seeding.
    pub fn load(&self, initial: Vec<Notification>) -> Result<usize, LoadError> {
        let mut collection = self.collection.lock().unwrap();
        if collection.seeded {
            return Err(LoadError::AlreadySeeded);
        }
        collection.seeded = true;
        for record in initial {
            if !collection.contains(&record.id) {
                collection.records.push(record);
            }
        }
        Ok(count_unread(&collection.records))
    }

    /// Prepend a pushed notification.
    ///
    /// Duplicate deliveries (same `id` already present) leave the collection
    /// untouched and return `false`.
    pub fn insert_pushed(&self, record: Notification) -> bool {
        let mut collection = self.collection.lock().unwrap();
        if collection.contains(&record.id) {
            return false;
        }
        collection.records.insert(0, record);
        true
    }

    /// Flag every record as read. Returns how many flags flipped.
    pub fn mark_all_read(&self) -> usize {
        let mut collection = self.collection.lock().unwrap();
        let mut flipped = 0;
        for record in collection.records.iter_mut() {
            if !record.read {
                record.read = true;
                flipped += 1;
            }
        }
        flipped
    }

    /// Remove the record with the given id. Returns `false` if absent,
    /// which covers a delete racing a push-side removal.
    pub fn delete_by_id(&self, id: &str) -> bool {
        let mut collection = self.collection.lock().unwrap();
        let before = collection.records.len();
        collection.records.retain(|record| record.id != id);
        collection.records.len() < before
    }

    /// Count of records with `read == false`, derived on demand.
    pub fn unread_count(&self) -> usize {
        let collection = self.collection.lock().unwrap();
        count_unread(&collection.records)
    }

    /// Copy of the current collection, newest-first.
    pub fn snapshot(&self) -> Vec<Notification> {
        let collection = self.collection.lock().unwrap();
        collection.records.clone()
    }

    pub fn len(&self) -> usize {
        let collection = self.collection.lock().unwrap();
        collection.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the one-time seed already happened.
    pub fn is_loaded(&self) -> bool {
        let collection = self.collection.lock().unwrap();
        collection.seeded
    }

    /// Empty the collection on session teardown.
    ///
    /// Seeding stays closed afterwards: a straggling backlog response cannot
    /// repopulate a torn-down session. A new login builds a fresh store.
    pub fn clear(&self) {
        let mut collection = self.collection.lock().unwrap();
        collection.records.clear();
        collection.seeded = true;
    }
}

fn count_unread(records: &[Notification]) -> usize {
    records.iter().filter(|record| !record.read).count()
}
