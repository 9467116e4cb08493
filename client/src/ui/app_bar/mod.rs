mod file_menu;

use bevy::{
    app::{App, AppExit},
    ecs::{
        message::MessageWriter,
        system::{Res, ResMut},
    },
};
use bevy_egui::{EguiContexts, EguiPrimaryContextPass, egui};

use crate::brush::ActiveBrush;
use crate::terrain_mesh::{ResetTerrain, TerrainSessionRes};

pub(super) fn plugin(app: &mut App) {
    // Render panels in the egui pass schedule so the pass state is initialized.
    app.add_systems(EguiPrimaryContextPass, render);
}

fn render(
    mut contexts: EguiContexts,
    exit: MessageWriter<AppExit>,
    reset: MessageWriter<ResetTerrain>,
    session: Option<Res<TerrainSessionRes>>,
    active_brush: Option<ResMut<ActiveBrush>>,
) {
    let Ok(ctx) = contexts.ctx_mut() else {
        return;
    };

    egui::TopBottomPanel::top("top_app_bar")
        .resizable(false)
        .exact_height(32.0)
        .show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                egui::MenuBar::new().ui(ui, |ui| {
                    file_menu::render(ui, exit, reset, session.is_some());

                    if let Some(mut active_brush) = active_brush {
                        ui.separator();
                        let locked = session.as_ref().is_some_and(|s| s.0.is_stroke_active());
                        crate::ui::brush_tools::render_toolbar(ui, &mut active_brush, locked);
                    }

                    ui.add_space(ui.available_width());
                });
            });

            // Prevent the panel from collapsing to minimal height in some layouts.
            ui.allocate_rect(ui.available_rect_before_wrap(), egui::Sense::hover());
        });
}
