//! Memoized read-side derivations over the state tree.
//!
//! A [`Getter`] names an ordered list of dependencies and a pure compute
//! function. Evaluation resolves every dependency to an `Arc`; when the tuple
//! of dependency references is identical to the one seen last time, the
//! cached result is returned as the very same `Arc`. Reducers guarantee that
//! unchanged state keeps its reference, so pointer comparison is enough and
//! expensive derivations (filtering and sorting thousands of records) are
//! skipped whenever unrelated state changed.

mod subscription;

pub use subscription::SubscriptionId;
pub(crate) use subscription::{Notification, Watch, Watcher};

use std::any::type_name;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::{SegmentState, StateTree, StoreError};

/// Identity of a resolved dependency value.
pub type DepKey = Arc<dyn std::any::Any + Send + Sync>;

fn dep_key<V: SegmentState>(value: &Arc<V>) -> DepKey {
    value.clone()
}

fn same_keys(a: &[DepKey], b: &[DepKey]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            std::ptr::eq(Arc::as_ptr(x) as *const (), Arc::as_ptr(y) as *const ())
        })
}

type Resolver<V> = dyn Fn(&StateTree) -> Result<Arc<V>, StoreError> + Send + Sync;

/// One dependency of a getter: a segment, or a sub-value inside a segment.
///
/// Sub-values must be held as `Arc`s inside the segment state so that their
/// identity survives updates to sibling fields.
pub struct Dep<V> {
    segment: Arc<str>,
    path: Arc<str>,
    resolve: Arc<Resolver<V>>,
}

impl<V> Clone for Dep<V> {
    fn clone(&self) -> Self {
        Self {
            segment: Arc::clone(&self.segment),
            path: Arc::clone(&self.path),
            resolve: Arc::clone(&self.resolve),
        }
    }
}

impl<V: SegmentState> Dep<V> {
    /// The whole state of segment `name`, whose state type is `V`.
    pub fn segment(name: impl Into<Arc<str>>) -> Self {
        let segment: Arc<str> = name.into();
        let lookup = Arc::clone(&segment);
        Self {
            segment,
            path: Arc::from(""),
            resolve: Arc::new(move |tree: &StateTree| tree.get::<V>(&lookup)),
        }
    }

    /// A sub-value of segment `name` selected by `project`.
    ///
    /// `path` labels the projection in errors. A projection returning `None`
    /// resolves to `UnknownGetterPath`.
    pub fn path<S, P>(name: impl Into<Arc<str>>, path: impl Into<Arc<str>>, project: P) -> Self
    where
        S: SegmentState,
        P: Fn(&S) -> Option<Arc<V>> + Send + Sync + 'static,
    {
        let segment: Arc<str> = name.into();
        let path: Arc<str> = path.into();
        let (lookup, label) = (Arc::clone(&segment), Arc::clone(&path));
        Self {
            segment,
            path,
            resolve: Arc::new(move |tree: &StateTree| {
                let state = tree.get::<S>(&lookup)?;
                project(&state).ok_or_else(|| StoreError::UnknownGetterPath {
                    segment: lookup.to_string(),
                    path: label.to_string(),
                })
            }),
        }
    }

    pub fn segment_name(&self) -> &str {
        &self.segment
    }

    /// The path label, empty for whole-segment dependencies.
    pub fn path_label(&self) -> &str {
        &self.path
    }

    pub fn resolve(&self, tree: &StateTree) -> Result<Arc<V>, StoreError> {
        (self.resolve)(tree)
    }
}

impl<V> std::fmt::Debug for Dep<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("segment", &self.segment)
            .field("path", &self.path)
            .field("value", &type_name::<V>())
            .finish()
    }
}

/// An ordered tuple of dependencies, `(Dep<A>,)` up to `(Dep<A>, .., Dep<D>)`.
pub trait Deps: Send + Sync + 'static {
    /// The resolved values handed to the compute function.
    type Values;

    #[doc(hidden)]
    fn resolve_all(&self, tree: &StateTree) -> Result<(Self::Values, Vec<DepKey>), StoreError>;
}

macro_rules! impl_deps {
    ($($dep:ident: $value:ident),+) => {
        impl<$($value: SegmentState),+> Deps for ($(Dep<$value>,)+) {
            type Values = ($(Arc<$value>,)+);

            fn resolve_all(
                &self,
                tree: &StateTree,
            ) -> Result<(Self::Values, Vec<DepKey>), StoreError> {
                let ($($dep,)+) = self;
                $(let $dep = $dep.resolve(tree)?;)+
                let keys = vec![$(dep_key(&$dep)),+];
                Ok((($($dep,)+), keys))
            }
        }
    };
}

impl_deps!(a: A);
impl_deps!(a: A, b: B);
impl_deps!(a: A, b: B, c: C);
impl_deps!(a: A, b: B, c: C, d: D);

trait Evaluate<T>: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, tree: &StateTree) -> Result<Arc<T>, StoreError>;
}

/// A getter over one dependency with no compute step.
struct Passthrough<V> {
    name: String,
    dep: Dep<V>,
}

impl<V: SegmentState> Evaluate<V> for Passthrough<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, tree: &StateTree) -> Result<Arc<V>, StoreError> {
        self.dep.resolve(tree)
    }
}

struct Cached<T> {
    keys: Vec<DepKey>,
    value: Arc<T>,
}

struct Memoized<D, T, F> {
    name: String,
    deps: D,
    compute: F,
    cache: Mutex<Option<Cached<T>>>,
}

impl<D, T, F> Evaluate<T> for Memoized<D, T, F>
where
    D: Deps,
    T: Send + Sync,
    F: Fn(&D::Values) -> T + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, tree: &StateTree) -> Result<Arc<T>, StoreError> {
        let (values, keys) = self.deps.resolve_all(tree)?;
        if let Some(cached) = self.cache.lock().as_ref() {
            if same_keys(&cached.keys, &keys) {
                return Ok(Arc::clone(&cached.value));
            }
        }

        tracing::trace!(getter = %self.name, "Recomputing");
        let value = Arc::new((self.compute)(&values));
        *self.cache.lock() = Some(Cached {
            keys,
            value: Arc::clone(&value),
        });
        Ok(value)
    }
}

/// A named, memoized derivation. Cheap to clone; clones share one cache.
///
/// ```ignore
/// let visible = Getter::new(
///     "visible_nodes",
///     (Dep::<Collection<Node>>::segment("nodes"), Dep::<String>::segment("node_filter")),
///     |(nodes, filter)| nodes.iter().filter(|n| n.matches(filter)).cloned().collect::<Vec<_>>(),
/// );
/// let first = store.evaluate(&visible)?;
/// let again = store.evaluate(&visible)?;
/// assert!(Arc::ptr_eq(&first, &again));
/// ```
pub struct Getter<T> {
    inner: Arc<dyn Evaluate<T>>,
}

impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Getter<T> {
    /// A getter computing `T` from the resolved `deps`.
    pub fn new<D, F>(name: impl Into<String>, deps: D, compute: F) -> Self
    where
        D: Deps,
        F: Fn(&D::Values) -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Memoized {
                name: name.into(),
                deps,
                compute,
                cache: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub(crate) fn evaluate_on(&self, tree: &StateTree) -> Result<Arc<T>, StoreError> {
        self.inner.evaluate(tree)
    }
}

impl<V: SegmentState> Getter<V> {
    /// A getter returning a segment's state reference as-is.
    pub fn segment(name: impl Into<Arc<str>>) -> Self {
        let dep = Dep::<V>::segment(name);
        Self::from_dep(dep)
    }

    /// A getter returning one dependency's reference as-is.
    pub fn from_dep(dep: Dep<V>) -> Self {
        let name = if dep.path_label().is_empty() {
            dep.segment_name().to_string()
        } else {
            format!("{}.{}", dep.segment_name(), dep.path_label())
        };
        Self {
            inner: Arc::new(Passthrough { name, dep }),
        }
    }
}

impl<T> std::fmt::Debug for Getter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getter")
            .field("name", &self.inner.name())
            .finish()
    }
}
