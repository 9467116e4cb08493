//! Turns pointer input into brush strokes on the terrain session.
//!
//! LMB down starts a stroke, every held frame applies the brush under the
//! cursor and attempts a throttled publish, LMB up publishes the remainder.

use std::time::{SystemTime, UNIX_EPOCH};

use bevy::{prelude::*, window::PrimaryWindow};
use bevy_egui::EguiContexts;
use terrain::{Brush, Tool, WorldToGridTransform};

use crate::{
    config::ClientRuntimeConfig,
    flycam::{FlyCam, FlyCamActive},
    spacetimedb::{SpacetimeDB, StdbTerrainStore},
    terrain_mesh::{TerrainSessionRes, TerrainSurface},
};

/// Frame deltas above this are clamped so a hitch doesn't dump a huge edit.
const MAX_BRUSH_DT: f32 = 1.0 / 20.0;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, init_active_brush);
    app.add_systems(
        Update,
        (stroke, draw_brush_cursor)
            .chain()
            .in_set(BrushSystems)
            .run_if(resource_exists::<TerrainSessionRes>),
    );
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrushSystems;

/// Brush settings edited by the toolbar and used by the next stroke.
#[derive(Resource, Debug, Clone, Copy)]
pub struct ActiveBrush(pub Brush);

fn init_active_brush(mut commands: Commands, config: Res<ClientRuntimeConfig>) {
    commands.insert_resource(ActiveBrush(Brush {
        base_strength: config.terrain.base_strength,
        ..Brush::default()
    }));
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[allow(clippy::too_many_arguments)]
fn stroke(
    buttons: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    flycam_active: Res<FlyCamActive>,
    mut contexts: EguiContexts,
    brush: Res<ActiveBrush>,
    window: Single<&Window, With<PrimaryWindow>>,
    camera: Single<(&Camera, &GlobalTransform), With<FlyCam>>,
    surface: Query<Entity, With<TerrainSurface>>,
    mut ray_cast: MeshRayCast,
    stdb: SpacetimeDB,
    mut session: ResMut<TerrainSessionRes>,
) {
    let mut store = StdbTerrainStore::new(&stdb);
    let now = now_ms();

    if session.0.is_stroke_active() {
        if !buttons.pressed(MouseButton::Left) || flycam_active.0 {
            session.0.end_stroke(&mut store, now);
            return;
        }
    } else {
        let pointer_over_egui = contexts
            .ctx_mut()
            .map(|ctx| ctx.is_pointer_over_area())
            .unwrap_or(false);
        let starts = buttons.just_pressed(MouseButton::Left)
            && !flycam_active.0
            && !pointer_over_egui
            && brush.0.tool.mutates_grid();
        if !starts {
            // Retries vertices left dirty by a failed publish.
            session.0.update_stroke(&mut store, now);
            return;
        }
        session.0.begin_stroke();
    }

    let (cam, cam_gt) = *camera;
    let hit = window
        .cursor_position()
        .and_then(|cursor| cam.viewport_to_world(cam_gt, cursor).ok())
        .and_then(|ray| {
            pick_surface(&mut ray_cast, &surface, ray)
                .or_else(|| intersect_grid_plane(session.0.transform(), ray))
        });

    if let Some(center) = hit {
        let dt = time.delta_secs().min(MAX_BRUSH_DT);
        session.0.apply_brush(center, &brush.0, dt);
    }
    session.0.update_stroke(&mut store, now);
}

fn pick_surface(
    ray_cast: &mut MeshRayCast,
    surface: &Query<Entity, With<TerrainSurface>>,
    ray: Ray3d,
) -> Option<Vec3> {
    let filter = |entity: Entity| surface.contains(entity);
    let settings = MeshRayCastSettings::default().with_filter(&filter);
    ray_cast
        .cast_ray(ray, &settings)
        .first()
        .map(|(_, hit)| hit.point)
}

/// Intersects the ray with the grid's zero-height plane.
fn intersect_grid_plane(transform: &WorldToGridTransform, ray: Ray3d) -> Option<Vec3> {
    let origin = transform.to_local(ray.origin);
    let direction = transform.to_local(ray.origin + *ray.direction) - origin;
    if direction.y.abs() < 1e-6 {
        return None;
    }
    let t = -origin.y / direction.y;
    if t <= 0.0 {
        return None;
    }
    Some(transform.to_world(origin + direction * t))
}

fn draw_brush_cursor(
    brush: Res<ActiveBrush>,
    flycam_active: Res<FlyCamActive>,
    window: Single<&Window, With<PrimaryWindow>>,
    camera: Single<(&Camera, &GlobalTransform), With<FlyCam>>,
    surface: Query<Entity, With<TerrainSurface>>,
    mut ray_cast: MeshRayCast,
    session: Res<TerrainSessionRes>,
    mut gizmos: Gizmos,
) {
    if flycam_active.0 || brush.0.tool == Tool::Move {
        return;
    }
    let (cam, cam_gt) = *camera;
    let Some(ray) = window
        .cursor_position()
        .and_then(|cursor| cam.viewport_to_world(cam_gt, cursor).ok())
    else {
        return;
    };
    let Some(center) = pick_surface(&mut ray_cast, &surface, ray)
        .or_else(|| intersect_grid_plane(session.0.transform(), ray))
    else {
        return;
    };

    let transform = session.0.transform();
    let up = (transform.to_world(Vec3::Y) - transform.to_world(Vec3::ZERO)).normalize_or(Vec3::Y);
    let color = brush.0.color;
    gizmos.circle(
        Isometry3d::new(center + up * 0.02, Quat::from_rotation_arc(Vec3::Z, up)),
        brush.0.radius,
        Color::srgb(color.r, color.g, color.b),
    );
}
