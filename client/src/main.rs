mod brush;
mod config;
mod flycam;
mod module_bindings;
mod spacetimedb;
mod terrain_mesh;
mod ui;

use bevy::color::palettes::css::ALICE_BLUE;
use bevy::prelude::*;

use crate::config::ClientRuntimeConfig;

fn main() {
    // Load `.env` from the client crate directory so it works from the workspace root too.
    let client_crate_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let _ = dotenvy::from_path(client_crate_dir.join(".env"));

    let config = ClientRuntimeConfig::from_env();

    let mut app = App::new();
    app.insert_resource(config);
    app.add_plugins((
        DefaultPlugins,
        spacetimedb::plugin,
        terrain_mesh::plugin,
        brush::plugin,
        ui::plugin,
        flycam::plugin,
    ));
    app.add_systems(Startup, setup_sun);
    app.insert_resource(AmbientLight {
        color: ALICE_BLUE.into(),
        brightness: 1_500.,
        ..AmbientLight::default()
    });
    app.run();
}

fn setup_sun(mut commands: Commands) {
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            ..default()
        },
        // Low sun so relief casts visible shadows.
        Transform::from_xyz(0.0, 10.0, 0.0).looking_at(Vec3::new(1.0, -0.6, 0.8), Vec3::Y),
    ));
}
