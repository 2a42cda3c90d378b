//! Precomputed storage layout for a set of keys.
//!
//! An [`Index`] is built once from a [`Values`](crate::core::values::Values) for an ordered key
//! subset and reused on every optimizer iteration. It stays valid as long as the layout of the
//! store does not change: callers must not hold an index across a `remove` + `cleanup` pair or
//! across a `set` that changes the stored type of an indexed key.

use crate::core::key::Key;
use crate::manifold::TypeTag;

/// Location and size of one key's data inside a `Values` storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexEntry {
    pub key: Key,
    pub type_tag: TypeTag,
    /// Offset of the first scalar in the storage buffer
    pub offset: usize,
    pub storage_dim: usize,
    pub tangent_dim: usize,
}

impl IndexEntry {
    pub fn new(key: Key, type_tag: TypeTag, offset: usize) -> Self {
        Self {
            key,
            type_tag,
            offset,
            storage_dim: type_tag.storage_dim(),
            tangent_dim: type_tag.tangent_dim(),
        }
    }

    /// One past the last storage element of this entry.
    pub fn end(&self) -> usize {
        self.offset + self.storage_dim
    }

    /// Like [`end`](Self::end), but `None` when the range does not fit in `usize`.
    pub fn checked_end(&self) -> Option<usize> {
        self.offset.checked_add(self.storage_dim)
    }
}

/// Ordered entries for a key subset, with total storage and tangent dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Index {
    pub entries: Vec<IndexEntry>,
    pub storage_dim: usize,
    pub tangent_dim: usize,
}

impl Index {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        let storage_dim = entries.iter().map(|e| e.storage_dim).sum();
        let tangent_dim = entries.iter().map(|e| e.tangent_dim).sum();
        Self {
            entries,
            storage_dim,
            tangent_dim,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|e| e.key).collect()
    }

    /// Offsets of each entry within a concatenated tangent vector over this index.
    pub fn tangent_offsets(&self) -> Vec<usize> {
        self.entries
            .iter()
            .scan(0, |acc, e| {
                let start = *acc;
                *acc += e.tangent_dim;
                Some(start)
            })
            .collect()
    }
}
