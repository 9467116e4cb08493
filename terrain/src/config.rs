use std::str::FromStr;

use crate::{brush::DEFAULT_BASE_STRENGTH, grid::GridLayout, publish::DEFAULT_PUBLISH_INTERVAL_MS};

/// Largest accepted `cols` or `rows`. A 4096x4096 grid has 4097^2 vertices.
const MAX_GRID_SIDE: u32 = 4096;

/// Terrain session settings.
///
/// Environment variables (all optional):
/// - `TERRAIN_GRID_COLS`           (default: `64`)
/// - `TERRAIN_GRID_ROWS`           (default: `64`)
/// - `TERRAIN_CELL_SIZE`           (default: `0.5`)
/// - `TERRAIN_BRUSH_STRENGTH`      (default: `8.0`)
/// - `TERRAIN_PUBLISH_INTERVAL_MS` (default: `150`)
///
/// Grid sides are capped at 4096 cells so every vertex index fits
/// the `u32` carried by a published delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainConfig {
    pub cols: u32,
    pub rows: u32,
    pub cell_size: f32,
    pub base_strength: f32,
    pub publish_interval_ms: i64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            cols: 64,
            rows: 64,
            cell_size: 0.5,
            base_strength: DEFAULT_BASE_STRENGTH,
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
        }
    }
}

impl TerrainConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset, empty or unparsable values
    /// (and values outside their valid range) fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cols: parse_or(&lookup, "TERRAIN_GRID_COLS", defaults.cols, valid_side),
            rows: parse_or(&lookup, "TERRAIN_GRID_ROWS", defaults.rows, valid_side),
            cell_size: parse_or(&lookup, "TERRAIN_CELL_SIZE", defaults.cell_size, |v| {
                v.is_finite() && *v > 0.0
            }),
            base_strength: parse_or(
                &lookup,
                "TERRAIN_BRUSH_STRENGTH",
                defaults.base_strength,
                |v| v.is_finite() && *v >= 0.0,
            ),
            publish_interval_ms: parse_or(
                &lookup,
                "TERRAIN_PUBLISH_INTERVAL_MS",
                defaults.publish_interval_ms,
                |v| *v >= 0,
            ),
        }
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::new(self.cols, self.rows, self.cell_size)
    }
}

fn valid_side(cells: &u32) -> bool {
    (1..=MAX_GRID_SIDE).contains(cells)
}

fn parse_or<T, L>(lookup: &L, key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|s| !s.trim().is_empty()) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            log::warn!("ignoring invalid {key}={raw:?}; using {default:?}");
            default
        }
    }
}
