use crate::{TerrainColor, TerrainVertex, terrain_vertex};
use spacetimedb::{ReducerContext, Table};

fn validate(vertex: &TerrainVertex) -> Result<(), String> {
    if !vertex.height.is_finite() {
        return Err(format!(
            "vertex {} has non-finite height {}",
            vertex.vertex_index, vertex.height
        ));
    }
    if let Some(TerrainColor { r, g, b }) = vertex.color {
        if ![r, g, b].iter().all(|c| c.is_finite()) {
            return Err(format!(
                "vertex {} has non-finite color ({r}, {g}, {b})",
                vertex.vertex_index
            ));
        }
    }
    Ok(())
}

/// Inserts or replaces the row, unless the stored row is newer.
/// Returns whether the table changed.
fn upsert(ctx: &ReducerContext, vertex: TerrainVertex) -> Result<bool, String> {
    if let Err(reason) = validate(&vertex) {
        log::warn!("terrain write rejected: {reason}");
        return Err(reason);
    }

    let table = ctx.db.terrain_vertex();
    match table.vertex_index().find(vertex.vertex_index) {
        Some(current) if current.timestamp_ms > vertex.timestamp_ms => {
            log::debug!(
                "ignoring stale write to vertex {} ({} < {})",
                vertex.vertex_index,
                vertex.timestamp_ms,
                current.timestamp_ms
            );
            Ok(false)
        }
        Some(_) => {
            table.vertex_index().update(vertex);
            Ok(true)
        }
        None => {
            table.insert(vertex);
            Ok(true)
        }
    }
}

#[spacetimedb::reducer]
pub fn set_terrain_vertex(ctx: &ReducerContext, vertex: TerrainVertex) -> Result<(), String> {
    upsert(ctx, vertex).map(|_| ())
}

/// Writes a whole publish in one transaction. Invalid rows are skipped; the
/// rest still land.
#[spacetimedb::reducer]
pub fn set_terrain_vertices(
    ctx: &ReducerContext,
    vertices: Vec<TerrainVertex>,
) -> Result<(), String> {
    let total = vertices.len();
    let mut rejected = 0;
    for vertex in vertices {
        if upsert(ctx, vertex).is_err() {
            rejected += 1;
        }
    }
    if rejected == total && total > 0 {
        return Err(format!("all {total} terrain writes were rejected"));
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn delete_terrain_vertex(ctx: &ReducerContext, vertex_index: u32) {
    ctx.db.terrain_vertex().vertex_index().delete(vertex_index);
}

/// Empties the table. Every subscribed client sees the reset.
#[spacetimedb::reducer]
pub fn clear_terrain(ctx: &ReducerContext) {
    let indices: Vec<u32> = ctx
        .db
        .terrain_vertex()
        .iter()
        .map(|row| row.vertex_index)
        .collect();
    for index in &indices {
        ctx.db.terrain_vertex().vertex_index().delete(index);
    }
    log::info!("terrain cleared by {} ({} vertices)", ctx.sender, indices.len());
}
