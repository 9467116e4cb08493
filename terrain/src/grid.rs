use glam::{Vec2, Vec3};

/// Linear RGB color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// Mid-gray every vertex starts with.
    pub const DEFAULT_TERRAIN: Self = Self::new(0.75, 0.75, 0.75);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            r: self.r + (target.r - self.r) * t,
            g: self.g + (target.g - self.g) * t,
            b: self.b + (target.b - self.b) * t,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_array([r, g, b]: [f32; 3]) -> Self {
        Self { r, g, b }
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::DEFAULT_TERRAIN
    }
}

/// Shape of a terrain grid: `cols` x `rows` cells, `cell_size` apart.
///
/// Vertices are addressed by a single linear index `row * (cols + 1) + col`.
/// The grid is centered on the local origin; columns run along +X and rows
/// along +Z, height is along +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub cell_size: f32,
}

impl GridLayout {
    pub const fn new(cols: u32, rows: u32, cell_size: f32) -> Self {
        Self {
            cols,
            rows,
            cell_size,
        }
    }

    pub fn vertices_per_row(&self) -> usize {
        self.cols as usize + 1
    }

    pub fn vertex_rows(&self) -> usize {
        self.rows as usize + 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices_per_row() * self.vertex_rows()
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.vertices_per_row() + col
    }

    pub fn row_col(&self, index: usize) -> (usize, usize) {
        let per_row = self.vertices_per_row();
        (index / per_row, index % per_row)
    }

    /// Half of the grid's width (X) and depth (Z).
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(
            self.cols as f32 * self.cell_size * 0.5,
            self.rows as f32 * self.cell_size * 0.5,
        )
    }

    pub fn col_x(&self, col: usize) -> f32 {
        col as f32 * self.cell_size - self.half_extents().x
    }

    pub fn row_z(&self, row: usize) -> f32 {
        row as f32 * self.cell_size - self.half_extents().y
    }

    /// Horizontal local position (x, z) of a vertex.
    pub fn local_position(&self, index: usize) -> Vec2 {
        let (row, col) = self.row_col(index);
        Vec2::new(self.col_x(col), self.row_z(row))
    }

    /// Columns whose x may fall inside `[min_x, max_x]`, padded by one on each
    /// side so rounding never drops a vertex. `None` when the span misses the grid.
    pub fn col_span(&self, min_x: f32, max_x: f32) -> Option<(usize, usize)> {
        let half = self.half_extents().x;
        Self::span(min_x + half, max_x + half, self.cell_size, self.cols as usize)
    }

    /// Row counterpart of [`GridLayout::col_span`].
    pub fn row_span(&self, min_z: f32, max_z: f32) -> Option<(usize, usize)> {
        let half = self.half_extents().y;
        Self::span(min_z + half, max_z + half, self.cell_size, self.rows as usize)
    }

    fn span(lo: f32, hi: f32, cell: f32, last: usize) -> Option<(usize, usize)> {
        if !(lo.is_finite() && hi.is_finite()) || cell <= 0.0 || hi < lo {
            return None;
        }
        let first = (lo / cell).floor() - 1.0;
        let end = (hi / cell).ceil() + 1.0;
        if end < 0.0 || first > last as f32 {
            return None;
        }
        let first = first.max(0.0) as usize;
        let end = (end as usize).min(last);
        Some((first, end))
    }
}

/// Heights and color the grid had when it was created. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    heights: Vec<f32>,
    color: Rgb,
}

impl Baseline {
    pub fn height(&self, index: usize) -> f32 {
        self.heights.get(index).copied().unwrap_or(0.0)
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }
}

/// The shared height-field: one height and one RGB color per vertex.
///
/// `heights` has one entry per vertex, `colors` three (stride 3). The rendering
/// layer reads both buffers directly after a brush stroke or reconciliation.
#[derive(Debug, Clone)]
pub struct TerrainGrid {
    layout: GridLayout,
    heights: Vec<f32>,
    colors: Vec<f32>,
    baseline: Baseline,
}

impl TerrainGrid {
    /// A flat grid at height 0 painted with [`Rgb::DEFAULT_TERRAIN`].
    pub fn new(layout: GridLayout) -> Self {
        Self::with_heights(layout, vec![0.0; layout.vertex_count()])
    }

    /// A grid starting from `heights`, which also become the baseline.
    /// Missing entries are filled with 0, extra ones dropped.
    pub fn with_heights(layout: GridLayout, mut heights: Vec<f32>) -> Self {
        let count = layout.vertex_count();
        if heights.len() != count {
            log::warn!(
                "terrain grid expected {} heights, got {}; resizing",
                count,
                heights.len()
            );
            heights.resize(count, 0.0);
        }

        let color = Rgb::DEFAULT_TERRAIN;
        let colors = std::iter::repeat_n(color.to_array(), count)
            .flatten()
            .collect();

        Self {
            layout,
            baseline: Baseline {
                heights: heights.clone(),
                color,
            },
            heights,
            colors,
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.heights.len()
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    pub fn height(&self, index: usize) -> Option<f32> {
        self.heights.get(index).copied()
    }

    pub fn color(&self, index: usize) -> Option<Rgb> {
        if !self.color_slot_in_bounds(index) {
            return None;
        }
        let base = index * 3;
        Some(Rgb::new(
            self.colors[base],
            self.colors[base + 1],
            self.colors[base + 2],
        ))
    }

    /// Whether `index * 3 + 2` addresses the color buffer (and `index` the height buffer).
    pub fn color_slot_in_bounds(&self, index: usize) -> bool {
        index < self.heights.len()
            && index
                .checked_mul(3)
                .and_then(|i| i.checked_add(2))
                .is_some_and(|last| last < self.colors.len())
    }

    /// Returns `false` (and writes nothing) for an out-of-range index.
    pub fn set_height(&mut self, index: usize, height: f32) -> bool {
        match self.heights.get_mut(index) {
            Some(slot) => {
                *slot = height;
                true
            }
            None => false,
        }
    }

    /// Returns `false` (and writes nothing) for an out-of-range index.
    pub fn set_color(&mut self, index: usize, color: Rgb) -> bool {
        if !self.color_slot_in_bounds(index) {
            return false;
        }
        let base = index * 3;
        self.colors[base..base + 3].copy_from_slice(&color.to_array());
        true
    }

    /// Local-space position of a vertex, height included.
    pub fn local_position(&self, index: usize) -> Vec3 {
        let p = self.layout.local_position(index);
        Vec3::new(p.x, self.heights[index], p.y)
    }

    /// Puts every vertex back to the baseline height and color.
    pub fn restore_baseline(&mut self) {
        self.heights.copy_from_slice(&self.baseline.heights);
        let color = self.baseline.color.to_array();
        for slot in self.colors.chunks_exact_mut(3) {
            slot.copy_from_slice(&color);
        }
    }

    /// Per-vertex surface normals from central height differences.
    ///
    /// O(vertex count): call once per batch of changes, not per vertex.
    pub fn compute_normals(&self) -> Vec<[f32; 3]> {
        let per_row = self.layout.vertices_per_row();
        let rows = self.layout.vertex_rows();
        let cell = self.layout.cell_size;

        (0..self.heights.len())
            .map(|index| {
                let (row, col) = self.layout.row_col(index);
                let left = col.saturating_sub(1);
                let right = (col + 1).min(per_row - 1);
                let up = row.saturating_sub(1);
                let down = (row + 1).min(rows - 1);

                let dx = (right - left) as f32 * cell;
                let dz = (down - up) as f32 * cell;
                let slope_x = if dx > 0.0 {
                    (self.heights[self.layout.index(row, right)]
                        - self.heights[self.layout.index(row, left)])
                        / dx
                } else {
                    0.0
                };
                let slope_z = if dz > 0.0 {
                    (self.heights[self.layout.index(down, col)]
                        - self.heights[self.layout.index(up, col)])
                        / dz
                } else {
                    0.0
                };

                Vec3::new(-slope_x, 1.0, -slope_z)
                    .normalize_or(Vec3::Y)
                    .to_array()
            })
            .collect()
    }
}
