//! The editable terrain: owns the [`TerrainSession`], renders its grid as a
//! vertex-colored mesh and keeps it in step with the shared store.

use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
};
use bevy_spacetimedb::ReadStdbConnectedMessage;
use terrain::{GridLayout, TerrainGrid, TerrainSession, WorldToGridTransform};

use crate::{
    config::ClientRuntimeConfig,
    spacetimedb::{SpacetimeDB, StdbTerrainStore, TerrainStoreChanged},
};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<ResetTerrain>();
    app.add_systems(Update, start_session);
    app.add_systems(
        Update,
        (reconcile_store, reset_terrain, upload_geometry)
            .chain()
            .after(crate::brush::BrushSystems)
            .run_if(resource_exists::<TerrainSessionRes>),
    );
}

#[derive(Resource)]
pub struct TerrainSessionRes(pub TerrainSession);

/// Marks the entity rendering the terrain grid.
#[derive(Component)]
pub struct TerrainSurface;

#[derive(Resource)]
struct TerrainMeshHandle(Handle<Mesh>);

/// Requests a reset of the shared terrain back to its baseline.
#[derive(Message, Debug, Clone, Copy, Default)]
pub struct ResetTerrain;

/// The session needs the client identity as its author id, so it starts once
/// the connection is up.
fn start_session(
    mut commands: Commands,
    mut connected: ReadStdbConnectedMessage,
    config: Res<ClientRuntimeConfig>,
    existing: Option<Res<TerrainSessionRes>>,
    mut changed: ResMut<TerrainStoreChanged>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(message) = connected.read().last() else {
        return;
    };
    if existing.is_some() {
        // Reconnected: the subscription delivers the rows again.
        changed.0 = true;
        return;
    }

    let client_id = message.identity.to_hex().to_string();
    let session = TerrainSession::new(
        &config.terrain,
        client_id.clone(),
        WorldToGridTransform::IDENTITY,
    );
    info!(
        "terrain session {client_id} started on a {}x{} grid",
        config.terrain.cols, config.terrain.rows
    );

    let mesh = meshes.add(build_mesh(session.grid()));
    commands.spawn((
        TerrainSurface,
        Mesh3d(mesh.clone()),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::WHITE,
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::from_matrix(Mat4::from(session.transform().local_to_world())),
    ));
    commands.insert_resource(TerrainMeshHandle(mesh));
    commands.insert_resource(TerrainSessionRes(session));
    // Catch rows that arrived before the session existed.
    changed.0 = true;
}

fn reconcile_store(
    mut changed: ResMut<TerrainStoreChanged>,
    stdb: SpacetimeDB,
    mut session: ResMut<TerrainSessionRes>,
) {
    if !changed.0 {
        return;
    }
    changed.0 = false;

    let store = StdbTerrainStore::new(&stdb);
    let outcome = session.0.reconcile(&store);
    if outcome == terrain::ReconcileOutcome::Reset {
        info!("terrain was reset by another client");
    }
}

fn reset_terrain(
    mut requests: MessageReader<ResetTerrain>,
    stdb: SpacetimeDB,
    mut session: ResMut<TerrainSessionRes>,
) {
    if requests.read().count() == 0 {
        return;
    }
    let mut store = StdbTerrainStore::new(&stdb);
    let report = session.0.reset(&mut store);
    if report.remaining > 0 {
        warn!(
            "terrain reset left {} of {} entries in the store",
            report.remaining, report.cleared
        );
    }
}

fn upload_geometry(
    mut session: ResMut<TerrainSessionRes>,
    handle: Option<Res<TerrainMeshHandle>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let changes = session.0.take_geometry_changes();
    if !changes.any() {
        return;
    }
    let Some(handle) = handle else {
        return;
    };
    let Some(mesh) = meshes.get_mut(&handle.0) else {
        return;
    };

    let grid = session.0.grid();
    if changes.positions {
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions(grid));
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, grid.compute_normals());
    }
    if changes.colors {
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors(grid));
    }
}

fn build_mesh(grid: &TerrainGrid) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions(grid));
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, grid.compute_normals());
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors(grid));
    mesh.insert_indices(Indices::U32(triangle_indices(grid.layout())));
    mesh
}

fn positions(grid: &TerrainGrid) -> Vec<[f32; 3]> {
    (0..grid.vertex_count())
        .map(|index| grid.local_position(index).to_array())
        .collect()
}

fn colors(grid: &TerrainGrid) -> Vec<[f32; 4]> {
    grid.colors()
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2], 1.0])
        .collect()
}

/// Two counter-clockwise (seen from +Y) triangles per cell.
fn triangle_indices(layout: &GridLayout) -> Vec<u32> {
    let stride = layout.vertices_per_row() as u32;
    let mut indices = Vec::with_capacity(layout.cols as usize * layout.rows as usize * 6);
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let i = row * stride + col;
            indices.extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
        }
    }
    indices
}
