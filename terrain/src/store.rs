//! The shared key-value store contract.
//!
//! Terrain state is replicated through a mapping from `String(vertex_index)` to
//! the vertex's latest [`VertexDelta`]. The store is a map, not a log: a later
//! write for the same vertex replaces the earlier one in place.

use crate::grid::Rgb;

/// One vertex's published state.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexDelta {
    pub vertex_index: u32,
    pub height: f32,
    /// `None` when the delta carries no color change.
    pub color: Option<Rgb>,
    /// Milliseconds since the Unix epoch, taken when the delta was published.
    pub timestamp_ms: i64,
    /// Client id of the publisher.
    pub author: String,
}

impl VertexDelta {
    pub fn key(&self) -> String {
        vertex_key(self.vertex_index as usize)
    }
}

pub fn vertex_key(index: usize) -> String {
    index.to_string()
}

/// Parses a store key back into a vertex index. Rejects anything that is not a
/// plain decimal number (signs, whitespace, empty).
pub fn parse_vertex_key(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("shared store is not connected")]
    Disconnected,
    #[error("store rejected write for key {key}: {reason}")]
    Rejected { key: String, reason: String },
    #[error("{} store operations failed", .failed.len())]
    Partial { failed: Vec<String> },
}

/// Replicated string-keyed map of vertex deltas.
///
/// Writes are fire-and-forget from the caller's side: `Ok` means the write was
/// handed to the transport, not that other clients have seen it.
pub trait TerrainStore {
    fn set(&mut self, key: &str, value: VertexDelta) -> Result<(), StoreError>;

    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Option<VertexDelta>;

    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry.
    fn entries(&self) -> Vec<(String, VertexDelta)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }

    /// Writes every record under its vertex key. On failure, the keys that were
    /// not written are reported in [`StoreError::Partial`].
    fn set_batch(&mut self, values: Vec<VertexDelta>) -> Result<(), StoreError> {
        let mut failed = Vec::new();
        for value in values {
            let key = value.key();
            if let Err(err) = self.set(&key, value) {
                log::warn!("terrain store write for {key} failed: {err}");
                failed.push(key);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Partial { failed })
        }
    }

    /// Deletes every entry. Keys that could not be deleted are reported in
    /// [`StoreError::Partial`].
    fn clear(&mut self) -> Result<(), StoreError> {
        let mut failed = Vec::new();
        for key in self.keys() {
            if let Err(err) = self.delete(&key) {
                log::warn!("terrain store delete for {key} failed: {err}");
                failed.push(key);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Partial { failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_plain_decimal_indices() {
        assert_eq!(vertex_key(42), "42");
        assert_eq!(parse_vertex_key("42"), Some(42));
        assert_eq!(parse_vertex_key("007"), Some(7));
        assert_eq!(parse_vertex_key(""), None);
        assert_eq!(parse_vertex_key("-1"), None);
        assert_eq!(parse_vertex_key("+1"), None);
        assert_eq!(parse_vertex_key(" 1"), None);
        assert_eq!(parse_vertex_key("1.5"), None);
        assert_eq!(parse_vertex_key("99999999999999999999999999"), None);
    }

    #[test]
    fn partial_error_counts_failures() {
        let err = StoreError::Partial {
            failed: vec!["1".into(), "2".into()],
        };
        assert_eq!(err.to_string(), "2 store operations failed");
    }
}
