//! Collaborative terrain sculpting over a shared key-value store.
//!
//! Each client owns a [`TerrainSession`]: brush strokes mutate its grid
//! immediately, dirty vertices are published to the shared store as
//! last-write-wins [`VertexDelta`] records, and store changes from other
//! clients are reconciled back into the grid.

pub mod brush;
pub mod config;
pub mod dirty;
pub mod grid;
pub mod memory;
pub mod publish;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod transform;

pub use brush::{Brush, Tool, apply_brush};
pub use config::TerrainConfig;
pub use dirty::DirtySet;
pub use grid::{Baseline, GridLayout, Rgb, TerrainGrid};
pub use memory::{MemoryHub, MemoryStore};
pub use publish::{PublishOutcome, SyncPublisher};
pub use reconcile::{ApplyStats, ReconcileOutcome, RemoteReconciler};
pub use session::{GeometryChanges, ResetReport, TerrainSession};
pub use store::{StoreError, TerrainStore, VertexDelta, parse_vertex_key, vertex_key};
pub use transform::WorldToGridTransform;

pub use glam;
