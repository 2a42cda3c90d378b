//! Typed, heterogeneous variable store.
//!
//! [`Values`] maps [`Key`]s to variables of any supported type (see [`crate::manifold`]). All
//! variables live in one contiguous `Vec<f64>`; a side map from key to [`IndexEntry`] records
//! where each variable sits and what type it has.
//!
//! # Layout rules
//!
//! - New keys are appended at the end of storage, so offsets grow with insertion order.
//! - `set` on an existing key with the same type overwrites in place. With a different type the
//!   entry is re-allocated at the end and the old range becomes a tombstone.
//! - `remove` deletes the map entry and leaves a tombstone; offsets of other keys do not move.
//! - `cleanup` compacts storage and returns how many scalars it reclaimed.
//!
//! The optimizer works through precomputed [`Index`]es so that the hot loop never hashes keys:
//!
//! ```
//! use symopt::core::key::Key;
//! use symopt::core::values::Values;
//! use symopt::manifold::{Pose2, Rot3};
//!
//! let mut values = Values::new();
//! values.set(Key::with_sub('x', 0), Pose2::from_xy_angle(1.0, 2.0, 0.1));
//! values.set(Key::new('r'), Rot3::from_euler_angles(0.1, 0.2, 0.3));
//!
//! let index = values.create_index(&[Key::new('r')]).unwrap();
//! values.retract(&index, &[0.0, 0.0, 0.1], 1e-9).unwrap();
//! ```

use std::collections::HashMap;
use std::fmt;

use nalgebra::DVector;

use crate::core::index::{Index, IndexEntry};
use crate::core::key::Key;
use crate::core::{CoreError, CoreResult};
use crate::manifold::{LieGroupOps, MAX_MATRIX_DIM, TypeTag};

/// Largest storage size of a single supported type (a 9x9 matrix).
const MAX_STORAGE_DIM: usize = MAX_MATRIX_DIM * MAX_MATRIX_DIM;

/// Key-addressed store of optimization variables.
#[derive(Debug, Clone, Default)]
pub struct Values {
    map: HashMap<Key, IndexEntry>,
    data: Vec<f64>,
}

/// Serializable form of a [`Values`]: entries in storage order plus the flat buffer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValuesSnapshot {
    pub entries: Vec<IndexEntry>,
    pub data: Vec<f64>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. Returns true iff the key was not present before.
    pub fn set<T: LieGroupOps>(&mut self, key: Key, value: T) -> bool {
        let tag = T::type_tag();
        let (entry, inserted) = match self.map.get(&key) {
            Some(entry) if entry.type_tag == tag => (*entry, false),
            Some(_) => (self.allocate(key, tag), false),
            None => (self.allocate(key, tag), true),
        };
        value.to_storage(&mut self.data[entry.offset..entry.end()]);
        inserted
    }

    /// Write `value` directly at a previously obtained entry, skipping the key lookup.
    pub fn set_at<T: LieGroupOps>(&mut self, entry: &IndexEntry, value: T) -> CoreResult<()> {
        self.check_entry::<T>(entry)?;
        value.to_storage(&mut self.data[entry.offset..entry.end()]);
        Ok(())
    }

    pub fn at<T: LieGroupOps>(&self, key: &Key) -> CoreResult<T> {
        let entry = self.entry(key)?;
        self.at_entry(&entry)
    }

    /// Read the value at a previously obtained entry, skipping the key lookup.
    pub fn at_entry<T: LieGroupOps>(&self, entry: &IndexEntry) -> CoreResult<T> {
        self.check_entry::<T>(entry)?;
        Ok(T::from_storage(&self.data[entry.offset..entry.end()])?)
    }

    pub fn entry(&self, key: &Key) -> CoreResult<IndexEntry> {
        self.map
            .get(key)
            .copied()
            .ok_or(CoreError::NotFound(*key))
    }

    pub fn has(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    /// Remove `key`, leaving its storage as a tombstone. Returns whether it was present.
    pub fn remove(&mut self, key: &Key) -> bool {
        self.map.remove(key).is_some()
    }

    pub fn remove_all(&mut self) {
        self.map.clear();
        self.data.clear();
    }

    pub fn num_entries(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All keys, in storage order if `sort_by_offset`, otherwise in map order.
    pub fn keys(&self, sort_by_offset: bool) -> Vec<Key> {
        if sort_by_offset {
            self.entries_by_offset().iter().map(|e| e.key).collect()
        } else {
            self.map.keys().copied().collect()
        }
    }

    pub fn items(&self) -> &HashMap<Key, IndexEntry> {
        &self.map
    }

    /// Flat storage buffer, including tombstones not yet reclaimed.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Build an index over `keys` in the given order.
    pub fn create_index(&self, keys: &[Key]) -> CoreResult<Index> {
        let entries = keys
            .iter()
            .map(|key| self.entry(key).map_err(|e| e.log()))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Index::new(entries))
    }

    /// Copy the blocks addressed by `index` from `other`. The index must be valid for both.
    pub fn update(&mut self, index: &Index, other: &Values) -> CoreResult<()> {
        self.update_with(index, index, other)
    }

    /// Copy blocks from `other` using separate indices for each store.
    ///
    /// Both indices must list the same keys in the same order; offsets may differ.
    pub fn update_with(
        &mut self,
        index_this: &Index,
        index_other: &Index,
        other: &Values,
    ) -> CoreResult<()> {
        if index_this.len() != index_other.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "Index lengths differ: {} vs {}",
                index_this.len(),
                index_other.len()
            ))
            .log());
        }

        for (this_entry, other_entry) in index_this.entries.iter().zip(&index_other.entries) {
            if this_entry.key != other_entry.key
                || this_entry.storage_dim != other_entry.storage_dim
            {
                return Err(CoreError::DimensionMismatch(format!(
                    "Index entries disagree: {} ({}) vs {} ({})",
                    this_entry.key,
                    this_entry.type_tag,
                    other_entry.key,
                    other_entry.type_tag
                ))
                .log());
            }
            self.check_range(this_entry)?;
            other.check_range(other_entry)?;
            self.data[this_entry.offset..this_entry.end()]
                .copy_from_slice(&other.data[other_entry.offset..other_entry.end()]);
        }
        Ok(())
    }

    /// Like [`update`](Self::update) with `index` computed on `other`, inserting keys this
    /// store does not have yet.
    pub fn update_or_set(&mut self, index: &Index, other: &Values) -> CoreResult<()> {
        for other_entry in &index.entries {
            other.check_range(other_entry)?;
            let this_entry = match self.map.get(&other_entry.key) {
                Some(entry) if entry.type_tag == other_entry.type_tag => *entry,
                _ => self.allocate(other_entry.key, other_entry.type_tag),
            };
            self.data[this_entry.offset..this_entry.end()]
                .copy_from_slice(&other.data[other_entry.offset..other_entry.end()]);
        }
        Ok(())
    }

    /// Move every variable in `index` along its slice of the tangent vector `delta`.
    pub fn retract(&mut self, index: &Index, delta: &[f64], epsilon: f64) -> CoreResult<()> {
        if delta.len() != index.tangent_dim {
            return Err(CoreError::InvalidState(format!(
                "Retract step has dimension {}, index tangent dimension is {}",
                delta.len(),
                index.tangent_dim
            ))
            .log());
        }

        let mut scratch = [0.0; MAX_STORAGE_DIM];
        let mut tangent_offset = 0;
        for entry in &index.entries {
            self.check_range(entry)?;
            let current = &mut scratch[..entry.storage_dim];
            current.copy_from_slice(&self.data[entry.offset..entry.end()]);
            entry.type_tag.retract_storage(
                current,
                &delta[tangent_offset..tangent_offset + entry.tangent_dim],
                epsilon,
                &mut self.data[entry.offset..entry.end()],
            )?;
            tangent_offset += entry.tangent_dim;
        }
        Ok(())
    }

    /// Tangent vector that takes `other`'s values to this store's values, for every key in
    /// `index` (so for scalars the result is `this - other`).
    ///
    /// `index` addresses this store. Each key is looked up in `other` separately, so the two
    /// stores may lay out their storage differently but must agree on every key's type.
    pub fn local_coordinates(
        &self,
        other: &Values,
        index: &Index,
        epsilon: f64,
    ) -> CoreResult<DVector<f64>> {
        let mut tangent = DVector::zeros(index.tangent_dim);
        let mut tangent_offset = 0;
        for entry in &index.entries {
            self.check_range(entry)?;
            let other_entry = other.entry(&entry.key).map_err(|e| e.log())?;
            if other_entry.type_tag != entry.type_tag {
                return Err(CoreError::InvalidState(format!(
                    "Key {} is {} in this store but {} in the other",
                    entry.key, entry.type_tag, other_entry.type_tag
                ))
                .log());
            }
            other.check_range(&other_entry)?;
            entry.type_tag.local_coordinates_storage(
                &other.data[other_entry.offset..other_entry.end()],
                &self.data[entry.offset..entry.end()],
                epsilon,
                &mut tangent.as_mut_slice()[tangent_offset..tangent_offset + entry.tangent_dim],
            )?;
            tangent_offset += entry.tangent_dim;
        }
        Ok(tangent)
    }

    /// Compact storage, removing tombstones. Returns the number of scalars reclaimed.
    pub fn cleanup(&mut self) -> usize {
        let entries = self.entries_by_offset();
        let mut data = Vec::with_capacity(entries.iter().map(|e| e.storage_dim).sum());
        for entry in entries {
            let offset = data.len();
            data.extend_from_slice(&self.data[entry.offset..entry.end()]);
            if let Some(live) = self.map.get_mut(&entry.key) {
                live.offset = offset;
            }
        }
        let reclaimed = self.data.len() - data.len();
        self.data = data;
        reclaimed
    }

    pub fn snapshot(&self) -> ValuesSnapshot {
        ValuesSnapshot {
            entries: self.entries_by_offset(),
            data: self.data.clone(),
        }
    }

    /// Rebuild a store from a snapshot, validating every entry against the buffer.
    pub fn from_snapshot(snapshot: ValuesSnapshot) -> CoreResult<Self> {
        let mut entries = snapshot.entries;
        entries.sort_by_key(|e| e.offset);

        let mut map = HashMap::with_capacity(entries.len());
        let mut previous_end = 0;
        for entry in entries {
            if !entry.type_tag.is_supported()
                || entry.storage_dim != entry.type_tag.storage_dim()
                || entry.tangent_dim != entry.type_tag.tangent_dim()
            {
                return Err(CoreError::InvalidState(format!(
                    "Snapshot entry {} has inconsistent type {}",
                    entry.key, entry.type_tag
                ))
                .log());
            }
            let end = entry
                .checked_end()
                .filter(|&end| entry.offset >= previous_end && end <= snapshot.data.len())
                .ok_or_else(|| {
                    CoreError::InvalidState(format!(
                        "Snapshot entry {} overlaps or exceeds storage",
                        entry.key
                    ))
                    .log()
                })?;
            if map.insert(entry.key, entry).is_some() {
                return Err(CoreError::InvalidState(format!(
                    "Snapshot contains duplicate key {}",
                    entry.key
                ))
                .log());
            }
            previous_end = end;
        }

        Ok(Self {
            map,
            data: snapshot.data,
        })
    }

    fn allocate(&mut self, key: Key, tag: TypeTag) -> IndexEntry {
        let entry = IndexEntry::new(key, tag, self.data.len());
        self.data.resize(entry.end(), 0.0);
        self.map.insert(key, entry);
        entry
    }

    fn entries_by_offset(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self.map.values().copied().collect();
        entries.sort_by_key(|e| e.offset);
        entries
    }

    fn check_range(&self, entry: &IndexEntry) -> CoreResult<()> {
        match entry.checked_end() {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(CoreError::InvalidState(format!(
                "Entry for {} at offset {} with {} scalars exceeds storage of length {}",
                entry.key,
                entry.offset,
                entry.storage_dim,
                self.data.len()
            ))
            .log()),
        }
    }

    fn check_entry<T: LieGroupOps>(&self, entry: &IndexEntry) -> CoreResult<()> {
        if entry.type_tag != T::type_tag() {
            return Err(CoreError::TypeMismatch {
                key: entry.key,
                stored: entry.type_tag,
                requested: T::type_tag(),
            });
        }
        if entry.storage_dim != T::STORAGE_DIM {
            return Err(CoreError::InvalidState(format!(
                "Entry for {} claims {} scalars, {} needs {}",
                entry.key,
                entry.storage_dim,
                entry.type_tag,
                T::STORAGE_DIM
            ))
            .log());
        }
        self.check_range(entry)
    }
}

impl PartialEq for Values {
    fn eq(&self, other: &Self) -> bool {
        self.map.len() == other.map.len()
            && self.map.iter().all(|(key, entry)| {
                other.map.get(key).is_some_and(|other_entry| {
                    entry.type_tag == other_entry.type_tag
                        && self.data[entry.offset..entry.end()]
                            == other.data[other_entry.offset..other_entry.end()]
                })
            })
    }
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Values ({} entries, {} scalars):", self.map.len(), self.data.len())?;
        for entry in self.entries_by_offset() {
            writeln!(
                f,
                "  {} [{}] {:?}",
                entry.key,
                entry.type_tag,
                &self.data[entry.offset..entry.end()]
            )?;
        }
        Ok(())
    }
}
