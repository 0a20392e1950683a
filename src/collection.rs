//! Keyed record containers for list pages.
//!
//! Node lists, config maps, roles and audit events are all held as a
//! [`Collection`] inside their segment. Every update method reports whether
//! anything actually changed, so reducers can hand back the original `Arc`
//! when, for example, a refresh returns exactly the records already loaded.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A record that can live in a [`Collection`].
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    type Key: Ord + Clone + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Immutable ordered map of records by key.
///
/// Records are stored behind `Arc`s; an unchanged record keeps its `Arc`
/// across updates, so per-record getters stay memoized too.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R: Record> {
    items: BTreeMap<R::Key, Arc<R>>,
}

impl<R: Record> Default for Collection<R> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<R: Record> Collection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        Self {
            items: records
                .into_iter()
                .map(|record| (record.key(), Arc::new(record)))
                .collect(),
        }
    }

    pub fn get(&self, key: &R::Key) -> Option<&Arc<R>> {
        self.items.get(key)
    }

    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<R>> {
        self.items.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &R::Key> {
        self.items.keys()
    }

    /// Insert or replace `records`. `None` when every record was already
    /// present with an equal value.
    pub fn with_upserted(&self, records: impl IntoIterator<Item = R>) -> Option<Self> {
        let mut next: Option<BTreeMap<R::Key, Arc<R>>> = None;
        for record in records {
            let key = record.key();
            let current = next.as_ref().unwrap_or(&self.items);
            if current.get(&key).is_some_and(|existing| **existing == record) {
                continue;
            }
            next.get_or_insert_with(|| self.items.clone())
                .insert(key, Arc::new(record));
        }
        next.map(|items| Self { items })
    }

    /// Remove the record under `key`. `None` when it was absent.
    pub fn with_removed(&self, key: &R::Key) -> Option<Self> {
        if !self.items.contains_key(key) {
            return None;
        }
        let mut items = self.items.clone();
        items.remove(key);
        Some(Self { items })
    }

    /// Replace the whole content with `records`. `None` when the result
    /// would equal the current content.
    pub fn with_replaced(&self, records: impl IntoIterator<Item = R>) -> Option<Self> {
        let mut changed = false;
        let mut items = BTreeMap::new();
        for record in records {
            let key = record.key();
            let entry = match self.items.get(&key) {
                Some(existing) if **existing == record => Arc::clone(existing),
                _ => {
                    changed = true;
                    Arc::new(record)
                }
            };
            items.insert(key, entry);
        }
        if !changed && items.len() == self.items.len() {
            return None;
        }
        Some(Self { items })
    }

    /// Reducer helper: runs `update` and keeps `state` itself when it
    /// reports no change.
    pub fn apply<F>(state: &Arc<Self>, update: F) -> Arc<Self>
    where
        F: FnOnce(&Self) -> Option<Self>,
    {
        match update(state) {
            Some(next) => Arc::new(next),
            None => Arc::clone(state),
        }
    }

    pub fn upsert_all(state: &Arc<Self>, records: impl IntoIterator<Item = R>) -> Arc<Self> {
        Self::apply(state, |current| current.with_upserted(records))
    }

    pub fn remove(state: &Arc<Self>, key: &R::Key) -> Arc<Self> {
        Self::apply(state, |current| current.with_removed(key))
    }

    pub fn replace_all(state: &Arc<Self>, records: impl IntoIterator<Item = R>) -> Arc<Self> {
        Self::apply(state, |current| current.with_replaced(records))
    }
}

impl<R: Record> FromIterator<R> for Collection<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
