use bevy::{app::AppExit, ecs::message::MessageWriter};
use bevy_egui::egui::Ui;

use crate::terrain_mesh::ResetTerrain;

pub(super) fn render(
    ui: &mut Ui,
    mut exit: MessageWriter<AppExit>,
    mut reset: MessageWriter<ResetTerrain>,
    connected: bool,
) {
    ui.menu_button("File", |ui| {
        let reset_button = ui
            .add_enabled(connected, bevy_egui::egui::Button::new("Reset terrain"))
            .on_hover_text("Revert the terrain to its baseline for everyone in the room");
        if reset_button.clicked() {
            reset.write(ResetTerrain);
            ui.close();
        }

        ui.separator();

        if ui.button("Quit").clicked() {
            ui.close();
            exit.write(AppExit::Success);
        }
    });
}
