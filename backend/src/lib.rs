mod reducers;

use spacetimedb::{Identity, ReducerContext, Table};

/// Linear RGB, each channel in `0..=1`.
#[derive(spacetimedb::SpacetimeType, Debug, Default, Clone, Copy, PartialEq)]
pub struct TerrainColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// The latest edit of one terrain vertex. Vertices without a row sit at
/// their baseline; an empty table means the terrain was reset.
#[spacetimedb::table(name = terrain_vertex, public)]
#[derive(Debug, Clone)]
pub struct TerrainVertex {
    /// Row-major index into the `(cols + 1) * (rows + 1)` vertex grid.
    #[primary_key]
    pub vertex_index: u32,

    pub height: f32,

    /// Absent when the writer only changed the height.
    pub color: Option<TerrainColor>,

    /// Writer's wall clock in milliseconds. A row is only ever replaced by a
    /// write with an equal or later timestamp.
    pub timestamp_ms: i64,

    /// Client id of the writer.
    pub author: String,
}

#[spacetimedb::table(name = player, public)]
pub struct Player {
    #[primary_key]
    identity: Identity,
}

#[spacetimedb::reducer(client_connected)]
pub fn identity_connected(ctx: &ReducerContext) {
    ctx.db.player().insert(Player {
        identity: ctx.sender,
    });
}

#[spacetimedb::reducer(client_disconnected)]
pub fn identity_disconnected(ctx: &ReducerContext) {
    ctx.db.player().identity().delete(ctx.sender);
}
