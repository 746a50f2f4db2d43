//! Unique key index
//!
//! One position per key. Adding or inserting a key that is already mapped
//! is rejected with `AERO_INDEX_DUPLICATE_KEY`; updating a position to the
//! key it already holds is allowed.

use std::collections::BTreeMap;

use super::datum::FixedDatum;
use super::errors::{IndexError, IndexResult};
use super::projection::{InMemoryProjection, ProjectionView};
use super::store::MetadataStore;

/// Key to position map with a reverse position index
#[derive(Debug)]
pub struct UniqueView<K> {
    by_key: BTreeMap<K, usize>,
    by_position: BTreeMap<usize, K>,
}

impl<K> Default for UniqueView<K> {
    fn default() -> Self {
        Self {
            by_key: BTreeMap::new(),
            by_position: BTreeMap::new(),
        }
    }
}

impl<K: FixedDatum> UniqueView<K> {
    /// Position mapped by `key`
    pub fn position_of(&self, key: &K) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    fn reject_collision(&self, position: usize, key: &K) -> IndexResult<()> {
        match self.by_key.get(key) {
            Some(&existing) if existing != position => {
                Err(IndexError::duplicate_key(key, position, existing))
            }
            _ => Ok(()),
        }
    }
}

impl<K: FixedDatum> ProjectionView<K> for UniqueView<K> {
    fn validate_add(&self, position: usize, key: &K) -> IndexResult<()> {
        match self.by_key.get(key) {
            Some(&existing) => Err(IndexError::duplicate_key(key, position, existing)),
            None => Ok(()),
        }
    }

    fn validate_update(&self, position: usize, key: &K) -> IndexResult<()> {
        self.reject_collision(position, key)
    }

    fn validate_present(&self, position: usize, key: &K) -> IndexResult<()> {
        match self.by_key.get(key) {
            Some(&existing) if existing == position => Ok(()),
            _ => Err(IndexError::key_not_found(position)),
        }
    }

    fn map(&mut self, key: K, position: usize) -> IndexResult<()> {
        self.reject_collision(position, &key)?;
        if let Some(previous) = self.by_position.insert(position, key.clone()) {
            self.by_key.remove(&previous);
        }
        self.by_key.insert(key, position);
        Ok(())
    }

    fn unmap(&mut self, key: &K, position: usize) -> bool {
        if self.by_key.get(key) != Some(&position) {
            return false;
        }
        self.by_key.remove(key);
        self.by_position.remove(&position);
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
        self.by_key.iter().map(|(k, p)| (k.clone(), *p)).collect()
    }
}

/// Projection enforcing one position per key
pub type UniqueIndex<S> = InMemoryProjection<S, UniqueView<<S as MetadataStore>::Datum>>;

impl<S: MetadataStore> InMemoryProjection<S, UniqueView<S::Datum>> {
    /// Position currently mapped by `key`
    pub fn position_of(&self, key: &S::Datum) -> IndexResult<Option<usize>> {
        Ok(self.view()?.position_of(key))
    }
}
