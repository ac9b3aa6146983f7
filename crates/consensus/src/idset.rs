use blockdag_types::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Set of unique block ids, optionally carrying a value per id.
///
/// Iteration is always in ascending id order so that anything derived from an
/// `IdSet` is deterministic across nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSet<V = ()> {
    entries: BTreeMap<BlockId, V>,
}

impl<V> Default for IdSet<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl IdSet<()> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`; returns `false` if it was already present.
    pub fn add(&mut self, id: BlockId) -> bool {
        self.entries.insert(id, ()).is_none()
    }

    pub fn from_ids<I: IntoIterator<Item = BlockId>>(ids: I) -> Self {
        ids.into_iter().collect()
    }
}

impl<V> IdSet<V> {
    /// Insert `id` with `value`, replacing any previous value.
    pub fn add_pair(&mut self, id: BlockId, value: V) -> Option<V> {
        self.entries.insert(id, value)
    }

    pub fn get(&self, id: BlockId) -> Option<&V> {
        self.entries.get(&id)
    }

    pub fn has(&self, id: BlockId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remove(&mut self, id: BlockId) -> Option<V> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = BlockId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, BlockId, V> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<BlockId> {
        self.ids().collect()
    }

    pub fn first(&self) -> Option<BlockId> {
        self.entries.keys().next().copied()
    }

    /// Keep only the ids for which `keep` returns true.
    pub fn retain<F: FnMut(BlockId, &V) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|id, value| keep(*id, value));
    }

    /// True when both sets contain the same ids, ignoring values.
    pub fn same_ids<W>(&self, other: &IdSet<W>) -> bool {
        self.len() == other.len() && self.ids().all(|id| other.has(id))
    }
}

impl<V: Clone> IdSet<V> {
    /// Add every entry of `other` that is not already present.
    pub fn add_set(&mut self, other: &IdSet<V>) {
        for (id, value) in other.iter() {
            self.entries.entry(*id).or_insert_with(|| value.clone());
        }
    }

    /// Entries present in both sets (values taken from `self`).
    pub fn intersection<W>(&self, other: &IdSet<W>) -> IdSet<V> {
        self.iter()
            .filter(|(id, _)| other.has(**id))
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }

    /// Entries of `self` that are absent from `other`.
    pub fn exclude<W>(&self, other: &IdSet<W>) -> IdSet<V> {
        self.iter()
            .filter(|(id, _)| !other.has(**id))
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }
}

impl FromIterator<BlockId> for IdSet<()> {
    fn from_iter<I: IntoIterator<Item = BlockId>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|id| (id, ())).collect(),
        }
    }
}

impl<V> FromIterator<(BlockId, V)> for IdSet<V> {
    fn from_iter<I: IntoIterator<Item = (BlockId, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<V> Extend<(BlockId, V)> for IdSet<V> {
    fn extend<I: IntoIterator<Item = (BlockId, V)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl Extend<BlockId> for IdSet<()> {
    fn extend<I: IntoIterator<Item = BlockId>>(&mut self, iter: I) {
        self.entries.extend(iter.into_iter().map(|id| (id, ())));
    }
}

impl<'a, V> IntoIterator for &'a IdSet<V> {
    type Item = (&'a BlockId, &'a V);
    type IntoIter = btree_map::Iter<'a, BlockId, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reports_duplicates() {
        let mut set = IdSet::new();
        assert!(set.add(3));
        assert!(!set.add(3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn iteration_is_sorted_regardless_of_insertion() {
        let set = IdSet::from_ids([9, 2, 5, 0]);
        assert_eq!(set.to_vec(), vec![0, 2, 5, 9]);
        assert_eq!(set.first(), Some(0));
    }

    #[test]
    fn pairs_keep_values() {
        let mut orders: IdSet<u32> = IdSet::default();
        orders.add_pair(1, 10);
        orders.add_pair(2, 20);
        assert_eq!(orders.add_pair(1, 11), Some(10));
        assert_eq!(orders.get(1), Some(&11));
        assert_eq!(orders.get(7), None);
    }

    #[test]
    fn set_algebra() {
        let a = IdSet::from_ids([1, 2, 3, 4]);
        let b = IdSet::from_ids([3, 4, 5]);
        assert_eq!(a.intersection(&b).to_vec(), vec![3, 4]);
        assert_eq!(a.exclude(&b).to_vec(), vec![1, 2]);

        let mut union = a.clone();
        union.add_set(&b);
        assert_eq!(union.to_vec(), vec![1, 2, 3, 4, 5]);
        assert_ne!(union, a);
        assert_eq!(union.clone(), union);
    }

    #[test]
    fn same_ids_ignores_values() {
        let plain = IdSet::from_ids([1, 2]);
        let valued: IdSet<&str> = [(1, "a"), (2, "b")].into_iter().collect();
        assert!(plain.same_ids(&valued));
        assert!(!plain.same_ids(&IdSet::from_ids([1])));
    }
}
