use bevy::prelude::*;
use terrain::TerrainConfig;

/// Runtime configuration for the terrain editor client.
///
/// Initialized once at startup and stored as a Bevy `Resource`.
///
/// Environment variables:
/// - `EDITOR_SPACETIME_URL`  (default: `http://127.0.0.1:3000`)
/// - `EDITOR_SPACETIME_NAME` (default: `terrain`)
/// - `TERRAIN_*`             (see [`TerrainConfig`])
#[derive(Resource, Clone, Debug)]
pub struct ClientRuntimeConfig {
    /// SpacetimeDB host URL, e.g. "http://127.0.0.1:3000"
    pub spacetime_url: String,
    /// SpacetimeDB database/module name, e.g. "terrain"
    pub spacetime_name: String,
    pub terrain: TerrainConfig,
}

impl ClientRuntimeConfig {
    pub fn from_env() -> Self {
        let spacetime_url = std::env::var("EDITOR_SPACETIME_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:3000".to_string());

        let spacetime_name = std::env::var("EDITOR_SPACETIME_NAME")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "terrain".to_string());

        Self {
            spacetime_url,
            spacetime_name,
            terrain: TerrainConfig::from_env(),
        }
    }
}
