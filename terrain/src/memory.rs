//! In-process replicated store.
//!
//! Every [`MemoryStore`] connected to the same [`MemoryHub`] sees the same map,
//! the way clients of the real collaboration service do once writes round-trip.
//! Like the real service, a write never replaces an entry carrying a newer
//! timestamp. Used for offline sessions and for exercising several clients in
//! one test.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::store::{StoreError, TerrainStore, VertexDelta};

#[derive(Debug, Default)]
struct HubState {
    entries: BTreeMap<String, VertexDelta>,
    /// Bumped on every successful write or delete.
    revision: u64,
    offline: bool,
    failing_deletes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new client handle. Its first [`MemoryStore::take_changed`] reports a
    /// change if the hub already holds data.
    pub fn connect(&self) -> MemoryStore {
        MemoryStore {
            hub: self.clone(),
            seen_revision: 0,
        }
    }

    /// While offline, every write and delete fails with [`StoreError::Disconnected`].
    pub fn set_online(&self, online: bool) {
        self.lock().offline = !online;
    }

    /// Makes deletes of these keys fail until [`MemoryHub::heal_deletes`].
    pub fn fail_deletes_for<I>(&self, keys: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.lock()
            .failing_deletes
            .extend(keys.into_iter().map(Into::into));
    }

    pub fn heal_deletes(&self) {
        self.lock().failing_deletes.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One client's connection to a [`MemoryHub`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    hub: MemoryHub,
    seen_revision: u64,
}

impl MemoryStore {
    /// Whether the hub changed since this handle last asked.
    pub fn take_changed(&mut self) -> bool {
        let revision = self.hub.revision();
        let changed = revision != self.seen_revision;
        self.seen_revision = revision;
        changed
    }

    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

impl TerrainStore for MemoryStore {
    fn set(&mut self, key: &str, value: VertexDelta) -> Result<(), StoreError> {
        let mut state = self.hub.lock();
        if state.offline {
            return Err(StoreError::Disconnected);
        }
        if state
            .entries
            .get(key)
            .is_some_and(|current| current.timestamp_ms > value.timestamp_ms)
        {
            return Ok(());
        }
        state.entries.insert(key.to_string(), value);
        state.revision += 1;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let mut state = self.hub.lock();
        if state.offline {
            return Err(StoreError::Disconnected);
        }
        if state.failing_deletes.contains(key) {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "delete failed".to_string(),
            });
        }
        if state.entries.remove(key).is_some() {
            state.revision += 1;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<VertexDelta> {
        self.hub.lock().entries.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.hub.lock().entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.hub.len()
    }

    fn entries(&self) -> Vec<(String, VertexDelta)> {
        self.hub
            .lock()
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: u32, ts: i64) -> VertexDelta {
        VertexDelta {
            vertex_index: index,
            height: index as f32,
            color: None,
            timestamp_ms: ts,
            author: "a".to_string(),
        }
    }

    #[test]
    fn writes_are_visible_to_every_handle() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();

        a.set("3", delta(3, 10)).unwrap();

        assert!(b.take_changed());
        assert!(!b.take_changed());
        assert_eq!(b.get("3"), Some(delta(3, 10)));
        assert!(a.take_changed());
    }

    #[test]
    fn later_write_overwrites_in_place() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();

        a.set("3", delta(3, 10)).unwrap();
        a.set("3", delta(3, 20)).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(a.get("3").map(|d| d.timestamp_ms), Some(20));
    }

    #[test]
    fn late_older_write_does_not_replace_newer_entry() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();

        a.set("3", delta(3, 20)).unwrap();
        let revision = hub.revision();
        a.set("3", delta(3, 10)).unwrap();

        assert_eq!(a.get("3").map(|d| d.timestamp_ms), Some(20));
        assert_eq!(hub.revision(), revision);
    }

    #[test]
    fn offline_hub_rejects_writes() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        hub.set_online(false);

        assert_eq!(a.set("1", delta(1, 1)), Err(StoreError::Disconnected));
        assert_eq!(
            a.set_batch(vec![delta(1, 1), delta(2, 1)]),
            Err(StoreError::Partial {
                failed: vec!["1".into(), "2".into()]
            })
        );
        assert!(hub.is_empty());

        hub.set_online(true);
        a.set_batch(vec![delta(1, 1), delta(2, 1)]).unwrap();
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn clear_reports_keys_it_could_not_delete() {
        let hub = MemoryHub::new();
        let mut a = hub.connect();
        a.set_batch(vec![delta(1, 1), delta(2, 1), delta(3, 1)])
            .unwrap();
        hub.fail_deletes_for(["2"]);

        assert_eq!(
            a.clear(),
            Err(StoreError::Partial {
                failed: vec!["2".into()]
            })
        );
        assert_eq!(a.keys(), vec!["2".to_string()]);

        hub.heal_deletes();
        a.clear().unwrap();
        assert!(a.is_empty());
    }
}
