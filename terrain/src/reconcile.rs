//! Applies the shared store's contents to the local grid.
//!
//! Per vertex, the delta with the greatest timestamp wins. A client never
//! re-applies its own writes when they echo back, and an empty store that was
//! previously non-empty means somebody reset the terrain.

use std::collections::HashMap;

use crate::{
    grid::TerrainGrid,
    store::{VertexDelta, parse_vertex_key},
};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub updated: usize,
    pub skipped_own: usize,
    pub skipped_stale: usize,
    /// Malformed keys, out-of-range indices and non-finite values.
    pub rejected: usize,
    /// This pass was the one-time unfiltered bootstrap.
    pub bootstrap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The store is empty and was empty before.
    Unchanged,
    /// The store went from non-empty to empty; the grid is back at baseline.
    Reset,
    Applied(ApplyStats),
}

impl ReconcileOutcome {
    /// Whether grid buffers changed and normals need recomputing.
    pub fn grid_changed(&self) -> bool {
        match self {
            ReconcileOutcome::Unchanged => false,
            ReconcileOutcome::Reset => true,
            ReconcileOutcome::Applied(stats) => stats.updated > 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteReconciler {
    /// Timestamp of the newest delta applied (or published locally) per vertex.
    applied: HashMap<usize, i64>,
    bootstrapped: bool,
    last_len: usize,
}

impl RemoteReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn last_applied(&self, index: usize) -> Option<i64> {
        self.applied.get(&index).copied()
    }

    /// Records a local publish so an older remote delta cannot overwrite it.
    ///
    /// The store now holds at least this entry, so seeing it empty later
    /// counts as a reset even if no pass ran in between.
    pub fn note_local_write(&mut self, index: usize, timestamp_ms: i64) {
        self.applied
            .entry(index)
            .and_modify(|ts| *ts = (*ts).max(timestamp_ms))
            .or_insert(timestamp_ms);
        self.last_len = self.last_len.max(1);
    }

    /// Forgets applied timestamps after a local reset.
    pub fn clear(&mut self) {
        self.applied.clear();
        self.last_len = 0;
    }

    /// Runs one pass over the store's full contents.
    pub fn on_store_changed(
        &mut self,
        grid: &mut TerrainGrid,
        entries: &[(String, VertexDelta)],
        local_author: &str,
    ) -> ReconcileOutcome {
        if entries.is_empty() {
            let was_populated = self.last_len > 0;
            self.last_len = 0;
            if !was_populated {
                return ReconcileOutcome::Unchanged;
            }
            log::info!("terrain store emptied remotely; restoring baseline");
            grid.restore_baseline();
            self.applied.clear();
            return ReconcileOutcome::Reset;
        }
        self.last_len = entries.len();

        let bootstrap = !self.bootstrapped;
        self.bootstrapped = true;

        let mut stats = ApplyStats {
            bootstrap,
            ..ApplyStats::default()
        };

        for (key, record) in entries {
            let Some(index) = parse_vertex_key(key) else {
                log::debug!("discarding terrain delta with malformed key {key:?}");
                stats.rejected += 1;
                continue;
            };
            if record.author == local_author {
                stats.skipped_own += 1;
                continue;
            }
            if !grid.color_slot_in_bounds(index) {
                log::debug!("discarding terrain delta for out-of-range vertex {index}");
                stats.rejected += 1;
                continue;
            }
            if !bootstrap
                && self
                    .last_applied(index)
                    .is_some_and(|ts| record.timestamp_ms <= ts)
            {
                stats.skipped_stale += 1;
                continue;
            }
            if !record.height.is_finite() || record.color.is_some_and(|c| !c.is_finite()) {
                log::debug!("discarding non-finite terrain delta for vertex {index}");
                stats.rejected += 1;
                continue;
            }

            grid.set_height(index, record.height);
            if let Some(color) = record.color {
                grid.set_color(index, color);
            }
            self.applied.insert(index, record.timestamp_ms);
            stats.updated += 1;
        }

        if bootstrap {
            log::info!(
                "terrain bootstrap applied {} of {} entries",
                stats.updated,
                entries.len()
            );
        }

        ReconcileOutcome::Applied(stats)
    }
}
