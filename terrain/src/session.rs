use glam::Vec3;

use crate::{
    brush::{self, Brush},
    config::TerrainConfig,
    dirty::DirtySet,
    grid::TerrainGrid,
    publish::{PublishOutcome, SyncPublisher},
    reconcile::{ReconcileOutcome, RemoteReconciler},
    store::{StoreError, TerrainStore, VertexDelta},
    transform::WorldToGridTransform,
};

/// Which grid buffers changed since the rendering layer last looked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryChanges {
    /// Heights changed: re-upload positions and recompute normals.
    pub positions: bool,
    pub colors: bool,
}

impl GeometryChanges {
    pub const ALL: Self = Self {
        positions: true,
        colors: true,
    };

    pub fn any(&self) -> bool {
        self.positions || self.colors
    }

    fn merge(&mut self, other: Self) {
        self.positions |= other.positions;
        self.colors |= other.colors;
    }
}

/// Result of [`TerrainSession::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    /// Entries the store held when the reset started.
    pub cleared: usize,
    /// Entries that survived a failed delete.
    pub remaining: usize,
}

/// One client's view of a shared terrain room.
///
/// Owns the grid, its baseline, the dirty set and the applied-timestamp map.
/// All methods run on the caller's update loop; store writes never block it.
#[derive(Debug, Clone)]
pub struct TerrainSession {
    client_id: String,
    grid: TerrainGrid,
    transform: WorldToGridTransform,
    dirty: DirtySet,
    publisher: SyncPublisher,
    reconciler: RemoteReconciler,
    stroke_active: bool,
    changes: GeometryChanges,
}

impl TerrainSession {
    pub fn new(
        config: &TerrainConfig,
        client_id: impl Into<String>,
        transform: WorldToGridTransform,
    ) -> Self {
        Self::from_grid(
            TerrainGrid::new(config.layout()),
            client_id,
            transform,
            config.publish_interval_ms,
        )
    }

    pub fn from_grid(
        grid: TerrainGrid,
        client_id: impl Into<String>,
        transform: WorldToGridTransform,
        publish_interval_ms: i64,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            publisher: SyncPublisher::new(client_id.clone(), publish_interval_ms),
            client_id,
            grid,
            transform,
            dirty: DirtySet::new(),
            reconciler: RemoteReconciler::new(),
            stroke_active: false,
            changes: GeometryChanges::default(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    pub fn transform(&self) -> &WorldToGridTransform {
        &self.transform
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn reconciler(&self) -> &RemoteReconciler {
        &self.reconciler
    }

    pub fn is_stroke_active(&self) -> bool {
        self.stroke_active
    }

    /// Applies one frame of `brush` at the world-space point `center`.
    pub fn apply_brush(&mut self, center: Vec3, brush: &Brush, dt: f32) -> usize {
        let touched = brush::apply_brush(
            &mut self.grid,
            &self.transform,
            center,
            brush,
            dt,
            &mut self.dirty,
        );
        if touched > 0 {
            self.changes.merge(GeometryChanges {
                positions: brush.tool.changes_heights(),
                colors: brush.tool.changes_colors(),
            });
        }
        touched
    }

    /// The pointer went down: an edit gesture starts.
    pub fn begin_stroke(&mut self) {
        self.stroke_active = true;
    }

    /// Throttled publish, called every frame.
    ///
    /// Publishes while a stroke is active, and also re-sends vertices left
    /// dirty by a failed write once the stroke is over.
    pub fn update_stroke<S: TerrainStore + ?Sized>(
        &mut self,
        store: &mut S,
        now_ms: i64,
    ) -> PublishOutcome {
        let reconciler = &self.reconciler;
        let outcome = self.publisher.maybe_publish(
            &self.grid,
            &mut self.dirty,
            store,
            now_ms,
            |index| reconciler.last_applied(index),
        );
        self.note_written(&outcome);
        outcome
    }

    /// The pointer was released: publish whatever is still dirty, ignoring the
    /// throttle, so the end of a stroke is never lost.
    pub fn end_stroke<S: TerrainStore + ?Sized>(
        &mut self,
        store: &mut S,
        now_ms: i64,
    ) -> PublishOutcome {
        self.stroke_active = false;
        let reconciler = &self.reconciler;
        let outcome = self.publisher.flush(
            &self.grid,
            &mut self.dirty,
            store,
            now_ms,
            |index| reconciler.last_applied(index),
        );
        self.note_written(&outcome);
        outcome
    }

    fn note_written(&mut self, outcome: &PublishOutcome) {
        if let PublishOutcome::Sent { written, .. } = outcome {
            for &(index, timestamp_ms) in written {
                self.reconciler.note_local_write(index, timestamp_ms);
            }
        }
    }

    /// Store change notification with the store's full contents.
    pub fn on_store_changed(&mut self, entries: &[(String, VertexDelta)]) -> ReconcileOutcome {
        let outcome = self
            .reconciler
            .on_store_changed(&mut self.grid, entries, &self.client_id);
        if outcome.grid_changed() {
            self.changes.merge(GeometryChanges::ALL);
        }
        outcome
    }

    /// Reads the store's contents and reconciles against them.
    pub fn reconcile<S: TerrainStore + ?Sized>(&mut self, store: &S) -> ReconcileOutcome {
        let entries = store.entries();
        self.on_store_changed(&entries)
    }

    /// Puts the terrain back to its baseline here and, by emptying the store,
    /// on every other client.
    ///
    /// If some deletes fail the local grid is still reset; other clients then
    /// see a non-empty store and apply the survivors as ordinary deltas.
    pub fn reset<S: TerrainStore + ?Sized>(&mut self, store: &mut S) -> ResetReport {
        self.grid.restore_baseline();
        self.dirty.clear();
        self.reconciler.clear();
        self.stroke_active = false;
        self.changes.merge(GeometryChanges::ALL);

        let cleared = store.len();
        let remaining = match store.clear() {
            Ok(()) => 0,
            Err(StoreError::Partial { failed }) => failed.len(),
            Err(err) => {
                log::warn!("terrain reset could not clear the store: {err}");
                store.len()
            }
        };

        if remaining > 0 {
            log::warn!("terrain reset left {remaining} of {cleared} store entries behind");
        } else {
            log::info!("terrain reset cleared {cleared} store entries");
        }

        ResetReport { cleared, remaining }
    }

    /// Hands pending buffer changes to the rendering layer and forgets them.
    pub fn take_geometry_changes(&mut self) -> GeometryChanges {
        std::mem::take(&mut self.changes)
    }
}
