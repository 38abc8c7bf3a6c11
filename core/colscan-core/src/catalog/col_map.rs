//! Column ID → output ordinal map.

use crate::catalog::descriptor::{Column, ColumnId};
use ahash::AHashMap;

/// Maps column identifiers to their position in a scan's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnOrdinalMap {
    ordinals: AHashMap<ColumnId, usize>,
}

impl ColumnOrdinalMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map each column to its index in `columns`.
    pub fn from_columns<'a>(columns: impl IntoIterator<Item = &'a Column>) -> Self {
        let mut map = Self::new();
        for (ordinal, col) in columns.into_iter().enumerate() {
            map.set(col.id, ordinal);
        }
        map
    }

    pub fn set(&mut self, id: ColumnId, ordinal: usize) {
        self.ordinals.insert(id, ordinal);
    }

    pub fn get(&self, id: ColumnId) -> Option<usize> {
        self.ordinals.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Entries sorted by ordinal.
    pub fn entries(&self) -> Vec<(ColumnId, usize)> {
        let mut entries: Vec<_> = self.ordinals.iter().map(|(id, ord)| (*id, *ord)).collect();
        entries.sort_by_key(|(_, ord)| *ord);
        entries
    }

    pub fn clear(&mut self) {
        self.ordinals.clear();
    }
}
