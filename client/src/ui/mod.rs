mod app_bar;
pub mod brush_tools;

use bevy::{
    camera::{CameraOutputMode, visibility::RenderLayers},
    prelude::*,
    render::render_resource::BlendState,
};
use bevy_egui::{EguiGlobalSettings, EguiPlugin, PrimaryEguiContext};

pub fn plugin(app: &mut App) {
    // Register egui once, from a central place.
    app.add_plugins((EguiPlugin::default(), app_bar::plugin, brush_tools::plugin));
    app.add_systems(Startup, setup);
}

fn setup(mut commands: Commands, mut egui_global_settings: ResMut<EguiGlobalSettings>) {
    // The primary context is attached to a dedicated UI camera drawn over the world.
    egui_global_settings.auto_create_primary_context = false;
    commands.spawn((
        PrimaryEguiContext,
        Camera2d,
        RenderLayers::none(),
        Camera {
            order: 1,
            output_mode: CameraOutputMode::Write {
                blend_state: Some(BlendState::ALPHA_BLENDING),
                clear_color: ClearColorConfig::None,
            },
            clear_color: ClearColorConfig::Custom(Color::NONE),
            ..default()
        },
    ));
}
