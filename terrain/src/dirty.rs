use std::collections::BTreeSet;

/// Vertex indices mutated locally since the last successful publish.
///
/// Ordered so a publish batch always goes out in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    indices: BTreeSet<usize>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, index: usize) {
        self.indices.insert(index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    /// Drops every index not in `keep`.
    pub fn retain_only(&mut self, keep: &BTreeSet<usize>) {
        self.indices.retain(|index| keep.contains(index));
    }
}

impl Extend<usize> for DirtySet {
    fn extend<T: IntoIterator<Item = usize>>(&mut self, iter: T) {
        self.indices.extend(iter);
    }
}
