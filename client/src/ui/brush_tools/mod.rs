//! Brush toolbar: tool toggle group, radius slider and paint color.
//!
//! Number keys 1-6 select tools. Switching is disabled while a stroke is in
//! progress so a gesture keeps the tool it started with.

use bevy::prelude::*;
use bevy_egui::{EguiContexts, egui};
use terrain::Tool;

use crate::{brush::ActiveBrush, flycam::FlyCamActive, terrain_mesh::TerrainSessionRes};

const RADIUS_RANGE: std::ops::RangeInclusive<f32> = 0.25..=10.0;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Update, handle_hotkeys);
}

const TOOL_KEYS: [(KeyCode, Tool); 6] = [
    (KeyCode::Digit1, Tool::Raise),
    (KeyCode::Digit2, Tool::Lower),
    (KeyCode::Digit3, Tool::Paint),
    (KeyCode::Digit4, Tool::Smooth),
    (KeyCode::Digit5, Tool::Erase),
    (KeyCode::Digit6, Tool::Move),
];

/// Renders into the top app bar. `locked` disables tool switching.
pub fn render_toolbar(ui: &mut egui::Ui, brush: &mut ActiveBrush, locked: bool) {
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 6.0;

        for tool in Tool::ALL {
            let text = format!("{} ({})", tool.label(), tool.hotkey());
            let resp = ui.add_enabled(
                !locked,
                egui::Button::new(text).selected(brush.0.tool == tool),
            );
            if resp.clicked() {
                brush.0.tool = tool;
            }
        }

        ui.separator();
        ui.add(egui::Slider::new(&mut brush.0.radius, RADIUS_RANGE).text("Radius"));

        let mut rgb = brush.0.color.to_array();
        if egui::color_picker::color_edit_button_rgb(ui, &mut rgb).changed() {
            brush.0.color = terrain::Rgb::from_array(rgb);
        }
    });
}

fn handle_hotkeys(
    keys: Res<ButtonInput<KeyCode>>,
    flycam_active: Res<FlyCamActive>,
    session: Option<Res<TerrainSessionRes>>,
    brush: Option<ResMut<ActiveBrush>>,
    mut contexts: EguiContexts,
) {
    let Some(mut brush) = brush else {
        return;
    };
    if session.is_some_and(|s| s.0.is_stroke_active()) {
        return;
    }
    // Camera keys share the keyboard with the tool hotkeys.
    if flycam_active.0 {
        return;
    }
    if let Ok(ctx) = contexts.ctx_mut() {
        if ctx.wants_keyboard_input() || ctx.wants_pointer_input() {
            return;
        }
    }

    if let Some((_, tool)) = TOOL_KEYS.iter().find(|(key, _)| keys.just_pressed(*key)) {
        brush.0.tool = *tool;
    }
}
