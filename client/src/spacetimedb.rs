use crate::{
    config::ClientRuntimeConfig,
    module_bindings::{
        DbConnection, RemoteTables, TerrainColor, TerrainVertex, TerrainVertexTableAccess,
        clear_terrain, delete_terrain_vertex, set_terrain_vertex, set_terrain_vertices,
    },
};
use bevy::prelude::*;
use bevy_spacetimedb::{
    ReadDeleteMessage, ReadInsertMessage, ReadStdbConnectedMessage, ReadUpdateMessage,
    StdbConnection, StdbPlugin,
};
use spacetimedb_sdk::Table;
use terrain::{Rgb, StoreError, TerrainStore, VertexDelta, parse_vertex_key, vertex_key};

pub type SpacetimeDB<'a> = Res<'a, StdbConnection<DbConnection>>;

/// Set whenever the subscribed `terrain_vertex` rows change; cleared by the
/// reconcile system once it has caught up.
#[derive(Resource, Debug, Default)]
pub struct TerrainStoreChanged(pub bool);

pub(super) fn plugin(app: &mut App) {
    let config = app
        .world()
        .get_resource::<ClientRuntimeConfig>()
        .cloned()
        .unwrap_or_else(ClientRuntimeConfig::from_env);

    app.add_plugins(
        StdbPlugin::default()
            .with_uri(&config.spacetime_url)
            .with_module_name(&config.spacetime_name)
            .add_table(RemoteTables::terrain_vertex)
            .with_run_fn(DbConnection::run_threaded),
    );
    app.init_resource::<TerrainStoreChanged>();
    app.add_systems(Update, (on_connect, track_store_changes));
}

fn on_connect(mut messages: ReadStdbConnectedMessage, stdb: SpacetimeDB) {
    for message in messages.read() {
        info!("SpacetimeDB module connected: {:?}", message.identity);

        stdb.subscription_builder()
            .subscribe(vec!["SELECT * FROM player", "SELECT * FROM terrain_vertex"]);
    }
}

fn track_store_changes(
    mut inserted: ReadInsertMessage<TerrainVertex>,
    mut updated: ReadUpdateMessage<TerrainVertex>,
    mut deleted: ReadDeleteMessage<TerrainVertex>,
    mut changed: ResMut<TerrainStoreChanged>,
) {
    // Drain all three readers every frame.
    let count = inserted.read().count() + updated.read().count() + deleted.read().count();
    if count > 0 {
        changed.0 = true;
    }
}

/// [`TerrainStore`] over the SpacetimeDB client cache.
///
/// Reads see the subscribed rows; writes go through reducers and show up in
/// the cache once the server has applied them.
pub struct StdbTerrainStore<'a> {
    conn: &'a StdbConnection<DbConnection>,
}

impl<'a> StdbTerrainStore<'a> {
    pub fn new(conn: &'a StdbConnection<DbConnection>) -> Self {
        Self { conn }
    }
}

impl TerrainStore for StdbTerrainStore<'_> {
    fn set(&mut self, key: &str, value: VertexDelta) -> Result<(), StoreError> {
        if parse_vertex_key(key) != Some(value.vertex_index as usize) {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: format!("key does not match vertex {}", value.vertex_index),
            });
        }
        self.conn
            .reducers()
            .set_terrain_vertex(to_row(value))
            .map_err(|err| {
                warn!("set_terrain_vertex failed: {err}");
                StoreError::Disconnected
            })
    }

    /// One reducer call per publish.
    fn set_batch(&mut self, values: Vec<VertexDelta>) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = values.iter().map(VertexDelta::key).collect();
        let rows = values.into_iter().map(to_row).collect();
        self.conn
            .reducers()
            .set_terrain_vertices(rows)
            .map_err(|err| {
                warn!("set_terrain_vertices failed for {} vertices: {err}", keys.len());
                StoreError::Partial { failed: keys }
            })
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let Some(index) = parse_vertex_key(key).and_then(|i| u32::try_from(i).ok()) else {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "not a vertex key".to_string(),
            });
        };
        self.conn
            .reducers()
            .delete_terrain_vertex(index)
            .map_err(|err| {
                warn!("delete_terrain_vertex failed: {err}");
                StoreError::Disconnected
            })
    }

    /// A single `clear_terrain` call; the server empties the table in one
    /// transaction.
    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn.reducers().clear_terrain().map_err(|err| {
            warn!("clear_terrain failed: {err}");
            StoreError::Partial { failed: self.keys() }
        })
    }

    fn get(&self, key: &str) -> Option<VertexDelta> {
        let index = u32::try_from(parse_vertex_key(key)?).ok()?;
        self.conn
            .db()
            .terrain_vertex()
            .vertex_index()
            .find(&index)
            .map(from_row)
    }

    fn keys(&self) -> Vec<String> {
        self.conn
            .db()
            .terrain_vertex()
            .iter()
            .map(|row| vertex_key(row.vertex_index as usize))
            .collect()
    }

    fn len(&self) -> usize {
        self.conn.db().terrain_vertex().count() as usize
    }

    fn entries(&self) -> Vec<(String, VertexDelta)> {
        self.conn
            .db()
            .terrain_vertex()
            .iter()
            .map(|row| (vertex_key(row.vertex_index as usize), from_row(row)))
            .collect()
    }
}

fn to_row(delta: VertexDelta) -> TerrainVertex {
    TerrainVertex {
        vertex_index: delta.vertex_index,
        height: delta.height,
        color: delta.color.map(|c| TerrainColor {
            r: c.r,
            g: c.g,
            b: c.b,
        }),
        timestamp_ms: delta.timestamp_ms,
        author: delta.author,
    }
}

fn from_row(row: TerrainVertex) -> VertexDelta {
    VertexDelta {
        vertex_index: row.vertex_index,
        height: row.height,
        color: row.color.map(|c| Rgb::new(c.r, c.g, c.b)),
        timestamp_ms: row.timestamp_ms,
        author: row.author,
    }
}
