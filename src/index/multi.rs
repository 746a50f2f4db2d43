//! Multi-valued key index
//!
//! Keys map to sorted position lists for deterministic ordering. Duplicate
//! keys are allowed; a position maps to exactly one key at a time, so a
//! (key, position) pair never repeats. Reaping one position removes only
//! that pair.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::datum::FixedDatum;
use super::errors::{IndexError, IndexResult};
use super::projection::{InMemoryProjection, ProjectionView};
use super::store::MetadataStore;

/// Key to sorted positions map with a reverse position index
#[derive(Debug)]
pub struct MultiView<K> {
    /// Positions per key, sorted ascending
    by_key: BTreeMap<K, Vec<usize>>,
    by_position: BTreeMap<usize, K>,
}

impl<K> Default for MultiView<K> {
    fn default() -> Self {
        Self {
            by_key: BTreeMap::new(),
            by_position: BTreeMap::new(),
        }
    }
}

impl<K: FixedDatum> MultiView<K> {
    /// Positions mapped by `key`, sorted ascending
    pub fn positions_of(&self, key: &K) -> Vec<usize> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    /// Positions for keys in `[min, max]`; `None` leaves a side open
    ///
    /// Sorted ascending.
    pub fn positions_in_range(&self, min: Option<&K>, max: Option<&K>) -> Vec<usize> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Vec::new();
            }
        }
        let lower = min.map_or(Bound::Unbounded, Bound::Included);
        let upper = max.map_or(Bound::Unbounded, Bound::Included);

        let mut positions: Vec<usize> = self
            .by_key
            .range::<K, _>((lower, upper))
            .flat_map(|(_, positions)| positions.iter().copied())
            .collect();
        positions.sort_unstable();
        positions
    }
}

impl<K: FixedDatum> ProjectionView<K> for MultiView<K> {
    fn validate_add(&self, _position: usize, _key: &K) -> IndexResult<()> {
        Ok(())
    }

    fn validate_update(&self, _position: usize, _key: &K) -> IndexResult<()> {
        Ok(())
    }

    fn validate_present(&self, position: usize, key: &K) -> IndexResult<()> {
        match self.by_key.get(key) {
            Some(positions) if positions.binary_search(&position).is_ok() => Ok(()),
            _ => Err(IndexError::key_not_found(position)),
        }
    }

    fn map(&mut self, key: K, position: usize) -> IndexResult<()> {
        if let Some(previous) = self.by_position.insert(position, key.clone()) {
            self.remove_pair(&previous, position);
        }
        let positions = self.by_key.entry(key).or_default();
        if let Err(at) = positions.binary_search(&position) {
            positions.insert(at, position);
        }
        Ok(())
    }

    fn unmap(&mut self, key: &K, position: usize) -> bool {
        if self.by_position.get(&position) != Some(key) {
            return false;
        }
        self.by_position.remove(&position);
        self.remove_pair(key, position);
        true
    }

    fn clear(&mut self) {
        self.by_key.clear();
        self.by_position.clear();
    }

    fn key_at(&self, position: usize) -> Option<&K> {
        self.by_position.get(&position)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    fn key_count(&self) -> usize {
        self.by_key.len()
    }

    fn position_count(&self) -> usize {
        self.by_position.len()
    }

    fn entries(&self) -> Vec<(K, usize)> {
        self.by_key
            .iter()
            .flat_map(|(k, positions)| positions.iter().map(move |p| (k.clone(), *p)))
            .collect()
    }
}

impl<K: FixedDatum> MultiView<K> {
    /// Drop `position` from `key`'s list, and the key once its list is empty
    fn remove_pair(&mut self, key: &K, position: usize) {
        if let Some(positions) = self.by_key.get_mut(key) {
            if let Ok(at) = positions.binary_search(&position) {
                positions.remove(at);
            }
            if positions.is_empty() {
                self.by_key.remove(key);
            }
        }
    }
}

/// Projection allowing many positions per key
pub type MultiIndex<S> = InMemoryProjection<S, MultiView<<S as MetadataStore>::Datum>>;

impl<S: MetadataStore> InMemoryProjection<S, MultiView<S::Datum>> {
    /// Positions currently mapped by `key`, sorted ascending
    pub fn positions_of(&self, key: &S::Datum) -> IndexResult<Vec<usize>> {
        Ok(self.view()?.positions_of(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_allowed() {
        let mut view = MultiView::<u32>::default();
        assert!(view.validate_add(1, &7).is_ok());
        view.map(7, 3).unwrap();
        view.map(7, 1).unwrap();
        view.map(8, 2).unwrap();

        assert_eq!(view.positions_of(&7), vec![1, 3]);
        assert_eq!(view.key_count(), 2);
        assert_eq!(view.position_count(), 3);
    }

    #[test]
    fn test_unmap_removes_only_one_position() {
        let mut view = MultiView::<u32>::default();
        view.map(7, 0).unwrap();
        view.map(7, 1).unwrap();

        assert!(view.unmap(&7, 1));
        assert_eq!(view.positions_of(&7), vec![0]);
        assert!(view.contains_key(&7));

        assert!(view.unmap(&7, 0));
        assert!(!view.contains_key(&7));
        assert!(!view.unmap(&7, 0));
    }

    #[test]
    fn test_remap_position_moves_pair() {
        let mut view = MultiView::<u32>::default();
        view.map(7, 0).unwrap();
        view.map(8, 0).unwrap();

        assert_eq!(view.positions_of(&7), Vec::<usize>::new());
        assert_eq!(view.key_at(0), Some(&8));
        assert_eq!(view.entries(), vec![(8, 0)]);
    }

    #[test]
    fn test_validate_present() {
        let mut view = MultiView::<u32>::default();
        view.map(7, 0).unwrap();

        assert!(view.validate_present(0, &7).is_ok());
        assert!(view.validate_present(1, &7).is_err());
    }

    #[test]
    fn test_positions_in_range() {
        let mut view = MultiView::<u32>::default();
        view.map(10, 4).unwrap();
        view.map(20, 1).unwrap();
        view.map(20, 3).unwrap();
        view.map(30, 0).unwrap();

        assert_eq!(view.positions_in_range(Some(&15), Some(&30)), vec![0, 1, 3]);
        assert_eq!(view.positions_in_range(None, Some(&10)), vec![4]);
        assert_eq!(view.positions_in_range(Some(&25), None), vec![0]);
    }
}
