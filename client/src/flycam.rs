use bevy::{
    input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel},
    prelude::*,
    window::{CursorGrabMode, CursorOptions, PrimaryWindow},
};
use bevy_egui::EguiContexts;
use terrain::Tool;

use crate::brush::ActiveBrush;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<FlyCamSettings>();
    app.init_resource::<FlyCamActive>();

    app.add_systems(Startup, spawn_camera);

    // Resolved once per frame so brush and hotkey systems gate on the same state.
    app.add_systems(Update, update_flycam_active);

    app.add_systems(
        Update,
        (
            flycam_toggle_capture,
            flycam_look.run_if(flycam_is_active),
            flycam_move.run_if(flycam_is_active),
            flycam_pan,
            flycam_scroll_zoom,
        )
            .after(update_flycam_active),
    );
}

#[derive(Component)]
pub struct FlyCam;

#[derive(Resource)]
pub struct FlyCamSettings {
    /// Meters/second while RMB is held.
    pub fly_speed: f32,
    /// Radians per pixel.
    pub mouse_sensitivity: f32,
    /// Meters per pixel while panning.
    pub pan_sensitivity: f32,
    /// Dolly distance per scroll step, as a multiple of `fly_speed`.
    ///
    /// Wheels and trackpads report different units:
    /// - `MouseScrollUnit::Line` (wheel): each line is one step
    /// - `MouseScrollUnit::Pixel` (trackpad): pixels are converted to steps
    pub scroll_zoom_speed_ratio: f32,
    /// Trackpad pixels that count as one scroll step. Lower is faster.
    pub trackpad_pixels_per_scroll: f32,
    /// Keeps the camera from looking straight up or down, where yaw flips.
    pub max_pitch_radians: f32,
}

impl Default for FlyCamSettings {
    fn default() -> Self {
        Self {
            fly_speed: 12.0,
            mouse_sensitivity: 0.0025,
            pan_sensitivity: 0.02,
            // A quarter of the fly speed per wheel tick.
            scroll_zoom_speed_ratio: 0.25,
            trackpad_pixels_per_scroll: 1024.0,
            max_pitch_radians: 1.54, // ~88 degrees
        }
    }
}

/// Looks down on the grid from one side.
const CAMERA_START: Vec3 = Vec3::new(0.0, 22.0, -26.0);

/// Whether the camera owns the mouse this frame (RMB held, press started
/// outside the UI). Brush strokes and tool hotkeys are suspended meanwhile.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlyCamActive(pub bool);

fn update_flycam_active(
    buttons: Res<ButtonInput<MouseButton>>,
    mut active: ResMut<FlyCamActive>,
    mut contexts: EguiContexts,
) {
    // Hovering counts, not only clicks on a widget.
    let pointer_over_egui = contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false);

    // The press decides: a drag that starts on a panel never steers the camera.
    if buttons.just_pressed(MouseButton::Right) {
        active.0 = !pointer_over_egui;
    }
    // Also covers a release missed while the window lost focus.
    if !buttons.pressed(MouseButton::Right) {
        active.0 = false;
    }
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        FlyCam,
        Camera3d::default(),
        Transform::from_translation(CAMERA_START).looking_at(Vec3::ZERO, Vec3::Y),
        DistanceFog {
            color: Color::srgba(0.35, 0.48, 0.66, 1.0),
            falloff: FogFalloff::from_visibility_colors(
                400.0, // visibility distance
                Color::srgb(0.35, 0.5, 0.66),
                Color::srgb(0.8, 0.8, 0.7),
            ),
            ..default()
        },
    ));
}

fn flycam_is_active(active: Res<FlyCamActive>) -> bool {
    active.0
}

fn flycam_toggle_capture(
    buttons: Res<ButtonInput<MouseButton>>,
    flycam_active: Res<FlyCamActive>,
    mut cursor: Single<&mut CursorOptions, With<PrimaryWindow>>,
) {
    // Lock only once the camera owns the mouse, so RMB over a panel leaves the
    // cursor free.
    if buttons.just_pressed(MouseButton::Right) && flycam_active.0 {
        cursor.grab_mode = CursorGrabMode::Locked;
        cursor.visible = false;
    }
    // Releasing an unlocked cursor is harmless.
    if buttons.just_released(MouseButton::Right) {
        cursor.grab_mode = CursorGrabMode::None;
        cursor.visible = true;
    }
}

fn flycam_look(
    mut motion: MessageReader<MouseMotion>,
    settings: Res<FlyCamSettings>,
    mut camera: Single<&mut Transform, With<FlyCam>>,
) {
    let delta: Vec2 = motion.read().map(|ev| ev.delta).sum();
    if delta == Vec2::ZERO {
        return;
    }

    // Mouse right turns right, mouse up looks up.
    let yaw = -delta.x * settings.mouse_sensitivity;
    camera.rotate(Quat::from_axis_angle(Vec3::Y, yaw));

    // Pitch about the camera's own right axis, measured from the horizon.
    let current_pitch = camera.forward().y.asin();
    let target_pitch = (current_pitch - delta.y * settings.mouse_sensitivity)
        .clamp(-settings.max_pitch_radians, settings.max_pitch_radians);
    let right = camera.right();
    camera.rotate(Quat::from_axis_angle(*right, target_pitch - current_pitch));
}

fn flycam_move(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    settings: Res<FlyCamSettings>,
    mut camera: Single<&mut Transform, With<FlyCam>>,
) {
    let axis = |positive: KeyCode, negative: KeyCode| {
        f32::from(u8::from(keys.pressed(positive))) - f32::from(u8::from(keys.pressed(negative)))
    };
    // x: strafe, y: world up/down, z: forward/back.
    let input = Vec3::new(
        axis(KeyCode::KeyD, KeyCode::KeyA),
        axis(KeyCode::KeyE, KeyCode::KeyQ),
        axis(KeyCode::KeyW, KeyCode::KeyS),
    );
    if input == Vec3::ZERO {
        return;
    }

    let direction = (*camera.right() * input.x + Vec3::Y * input.y + *camera.forward() * input.z)
        .normalize_or_zero(); // diagonals are no faster
    camera.translation += direction * settings.fly_speed * time.delta_secs();
}

/// MMB always pans; LMB pans while the Move tool is selected.
fn flycam_pan(
    mut motion: MessageReader<MouseMotion>,
    buttons: Res<ButtonInput<MouseButton>>,
    brush: Option<Res<ActiveBrush>>,
    settings: Res<FlyCamSettings>,
    mut contexts: EguiContexts,
    mut camera: Single<&mut Transform, With<FlyCam>>,
) {
    let delta: Vec2 = motion.read().map(|ev| ev.delta).sum();
    if delta == Vec2::ZERO {
        return;
    }

    let move_tool = brush.is_some_and(|b| b.0.tool == Tool::Move);
    let over_ui = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);
    let panning = buttons.pressed(MouseButton::Middle)
        || (move_tool && buttons.pressed(MouseButton::Left) && !over_ui);
    if !panning {
        return;
    }

    // Grab-and-drag: the view follows the pointer, so the camera moves the
    // opposite way horizontally.
    let right = *camera.right();
    camera.translation += right * (-delta.x * settings.pan_sensitivity);
    camera.translation += Vec3::Y * (delta.y * settings.pan_sensitivity);
}

fn flycam_scroll_zoom(
    mut wheel: MessageReader<MouseWheel>,
    settings: Res<FlyCamSettings>,
    mut contexts: EguiContexts,
    mut camera: Single<&mut Transform, With<FlyCam>>,
) {
    let over_ui = contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false);
    let step = settings.fly_speed * settings.scroll_zoom_speed_ratio;
    let amount: f32 = wheel
        .read()
        .map(|ev| match ev.unit {
            // Discrete wheel ticks: one step each, independent of frame time.
            MouseScrollUnit::Line => ev.y * step,
            // Continuous trackpad scroll arrives in pixels.
            MouseScrollUnit::Pixel => ev.y / settings.trackpad_pixels_per_scroll.max(1.0) * step,
        })
        .sum();
    if over_ui || amount == 0.0 {
        return;
    }

    let forward = *camera.forward();
    camera.translation += forward * amount;
}
