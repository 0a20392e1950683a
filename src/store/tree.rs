//! Immutable snapshots of the composed state tree.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::StoreError;
use super::segment::{same_ref, ErasedState, SegmentState};

/// One published snapshot: every registered segment's current state.
///
/// Snapshots are never modified after publication. The dispatcher builds a
/// new snapshot that shares every untouched segment `Arc` with its
/// predecessor.
#[derive(Clone)]
pub struct StateTree {
    version: u64,
    index: Arc<HashMap<Arc<str>, usize>>,
    names: Arc<Vec<Arc<str>>>,
    states: Vec<ErasedState>,
}

impl StateTree {
    pub(crate) fn empty() -> Self {
        Self {
            version: 0,
            index: Arc::new(HashMap::new()),
            names: Arc::new(Vec::new()),
            states: Vec::new(),
        }
    }

    /// Monotonic counter bumped on every published snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Segment names in registration order.
    pub fn segment_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| name.as_ref())
    }

    /// Typed access to a segment's current state.
    pub fn get<S: SegmentState>(&self, name: &str) -> Result<Arc<S>, StoreError> {
        let erased = Arc::clone(self.erased(name)?);
        erased
            .downcast::<S>()
            .map_err(|_| StoreError::SegmentTypeMismatch {
                segment: name.to_string(),
                expected: type_name::<S>(),
            })
    }

    /// Whether `name` holds the identical state reference in both snapshots.
    ///
    /// Returns false when either snapshot lacks the segment.
    pub fn same_segment(&self, other: &StateTree, name: &str) -> bool {
        match (self.erased(name), other.erased(name)) {
            (Ok(a), Ok(b)) => same_ref(a, b),
            _ => false,
        }
    }

    pub(crate) fn erased(&self, name: &str) -> Result<&ErasedState, StoreError> {
        self.index
            .get(name)
            .and_then(|slot| self.states.get(*slot))
            .ok_or_else(|| StoreError::UnknownSegment {
                name: name.to_string(),
            })
    }

    pub(crate) fn state_at(&self, slot: usize) -> Option<&ErasedState> {
        self.states.get(slot)
    }

    /// New snapshot with one more segment appended.
    pub(crate) fn with_segment(&self, name: Arc<str>, state: ErasedState) -> Self {
        let mut index = (*self.index).clone();
        index.insert(Arc::clone(&name), self.states.len());
        let mut names = (*self.names).clone();
        names.push(name);
        let mut states = self.states.clone();
        states.push(state);
        Self {
            version: self.version + 1,
            index: Arc::new(index),
            names: Arc::new(names),
            states,
        }
    }

    /// New snapshot with the given slots replaced.
    pub(crate) fn with_updates(&self, updates: Vec<(usize, ErasedState)>) -> Self {
        let mut states = self.states.clone();
        for (slot, state) in updates {
            if let Some(current) = states.get_mut(slot) {
                *current = state;
            }
        }
        Self {
            version: self.version + 1,
            index: Arc::clone(&self.index),
            names: Arc::clone(&self.names),
            states,
        }
    }
}

impl std::fmt::Debug for StateTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTree")
            .field("version", &self.version)
            .field("segments", &self.names)
            .finish()
    }
}
