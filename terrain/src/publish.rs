use std::collections::BTreeSet;

use crate::{
    dirty::DirtySet,
    grid::TerrainGrid,
    store::{StoreError, TerrainStore, VertexDelta, parse_vertex_key},
};

/// Minimum wall-clock gap between throttled publishes during a stroke.
pub const DEFAULT_PUBLISH_INTERVAL_MS: i64 = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was dirty.
    Idle,
    /// A publish went out less than the interval ago.
    Throttled,
    /// Records were handed to the store.
    Sent {
        /// Vertex index and record timestamp of every successful write.
        written: Vec<(usize, i64)>,
        /// Indices left dirty because their write failed.
        pending: usize,
        timestamp_ms: i64,
    },
}

/// Turns dirty vertices into [`VertexDelta`] records and writes them to the store.
#[derive(Debug, Clone)]
pub struct SyncPublisher {
    author: String,
    interval_ms: i64,
    last_publish_ms: Option<i64>,
}

impl SyncPublisher {
    pub fn new(author: impl Into<String>, interval_ms: i64) -> Self {
        Self {
            author: author.into(),
            interval_ms,
            last_publish_ms: None,
        }
    }

    /// Publishes unless the last publish was less than the interval ago.
    pub fn maybe_publish<S: TerrainStore + ?Sized>(
        &mut self,
        grid: &TerrainGrid,
        dirty: &mut DirtySet,
        store: &mut S,
        now_ms: i64,
        last_seen: impl Fn(usize) -> Option<i64>,
    ) -> PublishOutcome {
        if dirty.is_empty() {
            return PublishOutcome::Idle;
        }
        if self
            .last_publish_ms
            .is_some_and(|last| now_ms - last < self.interval_ms)
        {
            return PublishOutcome::Throttled;
        }
        self.flush(grid, dirty, store, now_ms, last_seen)
    }

    /// Publishes every dirty vertex now, regardless of the throttle.
    ///
    /// Each record carries the vertex's current height and color and this
    /// client's id. It is stamped `now_ms`, or one past `last_seen(index)` when
    /// that is not older, so a local edit always supersedes the state it was
    /// made on top of even under clock skew. Indices whose write failed stay
    /// dirty so the next publish re-sends their then-current state.
    pub fn flush<S: TerrainStore + ?Sized>(
        &mut self,
        grid: &TerrainGrid,
        dirty: &mut DirtySet,
        store: &mut S,
        now_ms: i64,
        last_seen: impl Fn(usize) -> Option<i64>,
    ) -> PublishOutcome {
        if dirty.is_empty() {
            return PublishOutcome::Idle;
        }

        let records: Vec<VertexDelta> = dirty
            .iter()
            .filter_map(|index| {
                let timestamp_ms = last_seen(index)
                    .map_or(now_ms, |seen| now_ms.max(seen.saturating_add(1)));
                self.record(grid, index, timestamp_ms)
            })
            .collect();
        let attempted: Vec<(usize, i64)> = records
            .iter()
            .map(|r| (r.vertex_index as usize, r.timestamp_ms))
            .collect();
        self.last_publish_ms = Some(now_ms);

        let failed: BTreeSet<usize> = match store.set_batch(records) {
            Ok(()) => BTreeSet::new(),
            Err(StoreError::Partial { failed }) => failed
                .iter()
                .filter_map(|key| parse_vertex_key(key))
                .collect(),
            Err(err) => {
                log::warn!("terrain publish of {} vertices failed: {err}", attempted.len());
                attempted.iter().map(|(index, _)| *index).collect()
            }
        };

        if failed.is_empty() {
            dirty.clear();
        } else {
            dirty.retain_only(&failed);
        }

        PublishOutcome::Sent {
            written: attempted
                .into_iter()
                .filter(|(index, _)| !failed.contains(index))
                .collect(),
            pending: dirty.len(),
            timestamp_ms: now_ms,
        }
    }

    fn record(&self, grid: &TerrainGrid, index: usize, timestamp_ms: i64) -> Option<VertexDelta> {
        let vertex_index = u32::try_from(index).ok()?;
        Some(VertexDelta {
            vertex_index,
            height: grid.height(index)?,
            color: grid.color(index),
            timestamp_ms,
            author: self.author.clone(),
        })
    }
}
