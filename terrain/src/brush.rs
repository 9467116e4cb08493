//! Brush effects: how a single brush application mutates the grid.
//!
//! Effects are time-based (`strength` scales with `dt`), fall off smoothly from
//! the brush center to zero at its rim, and never touch a vertex at or beyond
//! the radius.

use glam::{Vec2, Vec3};

use crate::{
    dirty::DirtySet,
    grid::{Rgb, TerrainGrid},
    transform::WorldToGridTransform,
};

/// Effect rate per second at the brush center.
pub const DEFAULT_BASE_STRENGTH: f32 = 8.0;

/// Height tools move this many units per unit of strength.
const HEIGHT_RATE: f32 = 3.0;
/// Paint converges faster than the height tools.
const PAINT_RATE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Raise,
    Lower,
    Paint,
    Smooth,
    Erase,
    /// Camera navigation. Leaves the grid alone.
    Move,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Raise,
        Tool::Lower,
        Tool::Paint,
        Tool::Smooth,
        Tool::Erase,
        Tool::Move,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Raise => "Raise",
            Tool::Lower => "Lower",
            Tool::Paint => "Paint",
            Tool::Smooth => "Smooth",
            Tool::Erase => "Erase",
            Tool::Move => "Move",
        }
    }

    pub fn hotkey(self) -> &'static str {
        match self {
            Tool::Raise => "1",
            Tool::Lower => "2",
            Tool::Paint => "3",
            Tool::Smooth => "4",
            Tool::Erase => "5",
            Tool::Move => "6",
        }
    }

    pub fn mutates_grid(self) -> bool {
        self != Tool::Move
    }

    pub fn changes_heights(self) -> bool {
        matches!(self, Tool::Raise | Tool::Lower | Tool::Smooth | Tool::Erase)
    }

    pub fn changes_colors(self) -> bool {
        matches!(self, Tool::Paint | Tool::Erase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Footprint radius in grid-local units.
    pub radius: f32,
    pub tool: Tool,
    /// Target color of the paint tool.
    pub color: Rgb,
    /// Effect rate per second at the center.
    pub base_strength: f32,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            radius: 2.0,
            tool: Tool::Raise,
            color: Rgb::new(0.35, 0.6, 0.25),
            base_strength: DEFAULT_BASE_STRENGTH,
        }
    }
}

/// Smoothstep of the linear falloff: 1 at the center, 0 at the rim.
pub fn smooth_falloff(normalized_dist: f32) -> f32 {
    let falloff = 1.0 - normalized_dist;
    falloff * falloff * (3.0 - 2.0 * falloff)
}

/// Applies `brush` centered at the world-space point `center` for `dt` seconds.
///
/// Every mutated vertex index is added to `dirty`; the return value is how
/// many vertices were touched. Recomputing normals afterwards is up to the
/// caller. Radius and `dt` are not validated.
pub fn apply_brush(
    grid: &mut TerrainGrid,
    transform: &WorldToGridTransform,
    center: Vec3,
    brush: &Brush,
    dt: f32,
    dirty: &mut DirtySet,
) -> usize {
    if !brush.tool.mutates_grid() {
        return 0;
    }

    let local = transform.to_local(center);
    let center = Vec2::new(local.x, local.z);
    let radius = brush.radius;
    let radius_sq = radius * radius;
    let layout = *grid.layout();

    let Some((col_start, col_end)) = layout.col_span(center.x - radius, center.x + radius) else {
        return 0;
    };
    let Some((row_start, row_end)) = layout.row_span(center.y - radius, center.y + radius) else {
        return 0;
    };

    let mut mutated = 0;
    for row in row_start..=row_end {
        let dz = layout.row_z(row) - center.y;
        if dz.abs() > radius {
            continue;
        }

        for col in col_start..=col_end {
            let dx = layout.col_x(col) - center.x;
            if dx.abs() > radius {
                continue;
            }

            let dist_sq = dx * dx + dz * dz;
            if dist_sq >= radius_sq {
                continue;
            }

            let strength = smooth_falloff(dist_sq.sqrt() / radius) * brush.base_strength * dt;
            let index = layout.index(row, col);
            apply_tool(grid, index, row, col, brush, strength);
            dirty.mark(index);
            mutated += 1;
        }
    }

    mutated
}

fn apply_tool(
    grid: &mut TerrainGrid,
    index: usize,
    row: usize,
    col: usize,
    brush: &Brush,
    strength: f32,
) {
    let height = grid.heights()[index];
    match brush.tool {
        Tool::Raise => {
            grid.set_height(index, height + strength * HEIGHT_RATE);
        }
        Tool::Lower => {
            grid.set_height(index, height - strength * HEIGHT_RATE);
        }
        Tool::Paint => {
            if let Some(color) = grid.color(index) {
                let blend = (strength * PAINT_RATE).min(1.0);
                grid.set_color(index, color.lerp(brush.color, blend));
            }
        }
        Tool::Smooth => {
            let average = neighbour_average(grid, row, col, height);
            let blend = strength.min(1.0);
            grid.set_height(index, height + (average - height) * blend);
        }
        Tool::Erase => {
            let blend = strength.min(1.0);
            let base_height = grid.baseline().height(index);
            let base_color = grid.baseline().color();
            grid.set_height(index, height + (base_height - height) * blend);
            if let Some(color) = grid.color(index) {
                grid.set_color(index, color.lerp(base_color, blend));
            }
        }
        Tool::Move => {}
    }
}

/// Mean of a vertex and its in-bounds 4-neighbours, read from the live buffer.
fn neighbour_average(grid: &TerrainGrid, row: usize, col: usize, height: f32) -> f32 {
    let layout = grid.layout();
    let heights = grid.heights();
    let last_row = layout.vertex_rows() - 1;
    let last_col = layout.vertices_per_row() - 1;

    let mut sum = height;
    let mut count = 1.0;
    let mut add = |r: usize, c: usize| {
        sum += heights[layout.index(r, c)];
        count += 1.0;
    };

    if row > 0 {
        add(row - 1, col);
    }
    if row < last_row {
        add(row + 1, col);
    }
    if col > 0 {
        add(row, col - 1);
    }
    if col < last_col {
        add(row, col + 1);
    }

    sum / count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridLayout;
    use glam::Quat;

    fn raise(radius: f32) -> Brush {
        Brush {
            radius,
            tool: Tool::Raise,
            ..Brush::default()
        }
    }

    #[test]
    fn falloff_is_one_at_center_and_zero_at_rim() {
        assert_eq!(smooth_falloff(0.0), 1.0);
        assert_eq!(smooth_falloff(1.0), 0.0);
        assert!((smooth_falloff(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn raise_at_center_of_three_by_three() {
        let mut grid = TerrainGrid::new(GridLayout::new(2, 2, 1.5));
        let mut dirty = DirtySet::new();
        let center = grid.local_position(4);

        let touched = apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            center,
            &raise(1.5),
            1.0,
            &mut dirty,
        );

        assert!((grid.heights()[4] - 24.0).abs() < 1e-4);
        // Vertex 1 sits exactly 1.5 away: on the rim, so untouched.
        assert_eq!(grid.heights()[1], 0.0);
        assert_eq!(touched, 1);
        assert_eq!(dirty.iter().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn nothing_at_or_beyond_radius_is_mutated() {
        let layout = GridLayout::new(20, 20, 0.5);
        let mut grid = TerrainGrid::new(layout);
        let mut dirty = DirtySet::new();
        let center = Vec3::new(0.3, 0.0, -1.1);
        let radius = 2.0;

        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            center,
            &raise(radius),
            0.5,
            &mut dirty,
        );

        for index in 0..grid.vertex_count() {
            let p = layout.local_position(index);
            let dist = p.distance(Vec2::new(center.x, center.z));
            if dist >= radius {
                assert_eq!(grid.heights()[index], 0.0, "vertex {index} at {dist}");
                assert!(!dirty.contains(index));
            }
        }
        assert!(!dirty.is_empty());
    }

    #[test]
    fn lower_mirrors_raise() {
        let mut grid = TerrainGrid::new(GridLayout::new(4, 4, 1.0));
        let mut dirty = DirtySet::new();
        let brush = Brush {
            tool: Tool::Lower,
            ..raise(1.0)
        };

        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::ZERO,
            &brush,
            0.1,
            &mut dirty,
        );

        assert!((grid.heights()[12] + 2.4).abs() < 1e-4);
    }

    #[test]
    fn paint_blends_toward_brush_color_and_saturates() {
        let mut grid = TerrainGrid::new(GridLayout::new(2, 2, 1.0));
        let mut dirty = DirtySet::new();
        let red = Rgb::new(1.0, 0.0, 0.0);
        let brush = Brush {
            tool: Tool::Paint,
            color: red,
            ..raise(1.0)
        };

        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::ZERO,
            &brush,
            1.0,
            &mut dirty,
        );

        assert_eq!(grid.color(4), Some(red));
        assert_eq!(grid.heights()[4], 0.0);

        // A tiny dt only nudges the color.
        let mut grid = TerrainGrid::new(GridLayout::new(2, 2, 1.0));
        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::ZERO,
            &brush,
            0.01,
            &mut dirty,
        );
        let color = grid.color(4).unwrap();
        assert!((color.r - (0.75 + 0.25 * 0.4)).abs() < 1e-5);
        assert!((color.g - 0.75 * 0.6).abs() < 1e-5);
    }

    #[test]
    fn smooth_pulls_a_spike_toward_its_neighbours() {
        let layout = GridLayout::new(2, 2, 1.0);
        let mut heights = vec![0.0; 9];
        heights[4] = 5.0;
        let mut grid = TerrainGrid::with_heights(layout, heights);
        let mut dirty = DirtySet::new();
        let brush = Brush {
            tool: Tool::Smooth,
            ..raise(0.5)
        };

        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::ZERO,
            &brush,
            1.0,
            &mut dirty,
        );

        // Blend clamps to 1, so the spike lands on the 5-sample mean.
        assert!((grid.heights()[4] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn smooth_on_corner_uses_only_in_bounds_neighbours() {
        let layout = GridLayout::new(2, 2, 1.0);
        let mut heights = vec![0.0; 9];
        heights[0] = 3.0;
        let mut grid = TerrainGrid::with_heights(layout, heights);
        let mut dirty = DirtySet::new();
        let corner = grid.local_position(0);
        let brush = Brush {
            tool: Tool::Smooth,
            ..raise(0.5)
        };

        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            corner,
            &brush,
            1.0,
            &mut dirty,
        );

        assert!((grid.heights()[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn erase_returns_height_and_color_to_baseline() {
        let layout = GridLayout::new(2, 2, 1.0);
        let mut grid = TerrainGrid::with_heights(layout, vec![1.0; 9]);
        grid.set_height(4, 9.0);
        grid.set_color(4, Rgb::new(0.0, 0.0, 0.0));
        let mut dirty = DirtySet::new();
        let brush = Brush {
            tool: Tool::Erase,
            ..raise(0.5)
        };

        apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::ZERO,
            &brush,
            1.0,
            &mut dirty,
        );

        assert_eq!(grid.heights()[4], 1.0);
        assert_eq!(grid.color(4), Some(Rgb::DEFAULT_TERRAIN));
    }

    #[test]
    fn move_tool_is_a_no_op() {
        let mut grid = TerrainGrid::new(GridLayout::new(2, 2, 1.0));
        let mut dirty = DirtySet::new();
        let brush = Brush {
            tool: Tool::Move,
            ..raise(5.0)
        };

        let touched = apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::ZERO,
            &brush,
            1.0,
            &mut dirty,
        );

        assert_eq!(touched, 0);
        assert!(dirty.is_empty());
        assert!(grid.heights().iter().all(|h| *h == 0.0));
    }

    #[test]
    fn brush_center_is_taken_in_grid_space() {
        let mut grid = TerrainGrid::new(GridLayout::new(4, 4, 1.0));
        let mut dirty = DirtySet::new();
        let transform = WorldToGridTransform::from_translation_rotation(
            Vec3::new(100.0, 5.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::PI),
        );
        // Local vertex (row 2, col 3) sits at local (1, 0); a half turn puts it at world x = 99.
        let target = grid.layout().index(2, 3);

        apply_brush(
            &mut grid,
            &transform,
            Vec3::new(99.0, 5.0, 0.0),
            &raise(0.5),
            0.1,
            &mut dirty,
        );

        assert_eq!(dirty.iter().collect::<Vec<_>>(), vec![target]);
        assert!(grid.heights()[target] > 0.0);
    }

    #[test]
    fn brush_off_the_grid_touches_nothing() {
        let mut grid = TerrainGrid::new(GridLayout::new(4, 4, 1.0));
        let mut dirty = DirtySet::new();

        let touched = apply_brush(
            &mut grid,
            &WorldToGridTransform::IDENTITY,
            Vec3::new(50.0, 0.0, 50.0),
            &raise(3.0),
            1.0,
            &mut dirty,
        );

        assert_eq!(touched, 0);
        assert!(dirty.is_empty());
    }
}
