//! Collections the adapters iterate over.
//!
//! A [`Collection`] is either an index-addressable sequence or a mapping
//! from string keys to values. Iterations work on a [`SharedCollection`]
//! so the caller may keep mutating it while the iteration is in flight.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};

/// Ordered sequence or keyed mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection<T> {
    /// Index-addressable values
    Sequence(Vec<T>),
    /// String keys in insertion order
    Mapping(IndexMap<String, T>),
}

/// Position of a value inside a [`Collection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Index into a sequence
    Index(usize),
    /// Key of a mapping entry
    Name(String),
}

impl Key {
    /// Sequence index, if this is one
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }

    /// Mapping key, if this is one
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Index(_) => None,
            Key::Name(name) => Some(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl<T> Collection<T> {
    /// Empty sequence
    pub fn sequence() -> Self {
        Collection::Sequence(Vec::new())
    }

    /// Empty mapping
    pub fn mapping() -> Self {
        Collection::Mapping(IndexMap::new())
    }

    /// Number of present elements
    pub fn len(&self) -> usize {
        match self {
            Collection::Sequence(values) => values.len(),
            Collection::Mapping(entries) => entries.len(),
        }
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Collection::Sequence(_))
    }

    /// Whether this is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Collection::Mapping(_))
    }

    /// Empty collection of the same kind
    pub fn empty_like(&self) -> Self {
        match self {
            Collection::Sequence(_) => Collection::sequence(),
            Collection::Mapping(_) => Collection::mapping(),
        }
    }

    /// Borrow the sequence values
    pub fn as_sequence(&self) -> Option<&[T]> {
        match self {
            Collection::Sequence(values) => Some(values),
            Collection::Mapping(_) => None,
        }
    }

    /// Borrow the mapping entries
    pub fn as_mapping(&self) -> Option<&IndexMap<String, T>> {
        match self {
            Collection::Sequence(_) => None,
            Collection::Mapping(entries) => Some(entries),
        }
    }

    /// Look up a value. A key of the wrong kind is never present.
    pub fn get(&self, key: &Key) -> Option<&T> {
        match (self, key) {
            (Collection::Sequence(values), Key::Index(i)) => values.get(*i),
            (Collection::Mapping(entries), Key::Name(name)) => entries.get(name.as_str()),
            _ => None,
        }
    }

    /// Whether `key` is currently present
    pub fn contains(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Add a value.
    ///
    /// Sequences append and ignore the key; mappings insert under the key
    /// (an index key is stored under its decimal form).
    pub fn insert(&mut self, key: Key, value: T) {
        match self {
            Collection::Sequence(values) => values.push(value),
            Collection::Mapping(entries) => {
                entries.insert(key.to_string(), value);
            }
        }
    }

    /// Remove a value.
    ///
    /// Removing from a sequence shifts the following elements down.
    pub fn remove(&mut self, key: &Key) -> Option<T> {
        match (self, key) {
            (Collection::Sequence(values), Key::Index(i)) if *i < values.len() => {
                Some(values.remove(*i))
            }
            (Collection::Mapping(entries), Key::Name(name)) => entries.shift_remove(name.as_str()),
            _ => None,
        }
    }

    /// Remove the last element
    pub fn pop(&mut self) -> Option<T> {
        match self {
            Collection::Sequence(values) => values.pop(),
            Collection::Mapping(entries) => entries.pop().map(|(_, value)| value),
        }
    }

    /// Remove every element
    pub fn clear(&mut self) {
        match self {
            Collection::Sequence(values) => values.clear(),
            Collection::Mapping(entries) => entries.clear(),
        }
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection::sequence()
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(values: Vec<T>) -> Self {
        Collection::Sequence(values)
    }
}

impl<T> From<IndexMap<String, T>> for Collection<T> {
    fn from(entries: IndexMap<String, T>) -> Self {
        Collection::Mapping(entries)
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Collection::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Indices or keys to visit, fixed when an iteration starts.
#[derive(Debug, Clone)]
pub(crate) enum Domain {
    Indices(usize),
    Keys(Vec<String>),
}

impl Domain {
    pub(crate) fn snapshot<T>(collection: &Collection<T>) -> Self {
        match collection {
            Collection::Sequence(values) => Domain::Indices(values.len()),
            Collection::Mapping(entries) => Domain::Keys(entries.keys().cloned().collect()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Domain::Indices(len) => *len,
            Domain::Keys(keys) => keys.len(),
        }
    }

    pub(crate) fn key(&self, position: usize) -> Option<Key> {
        match self {
            Domain::Indices(len) => (position < *len).then_some(Key::Index(position)),
            Domain::Keys(keys) => keys.get(position).cloned().map(Key::Name),
        }
    }
}

/// Collection shared between its owner and in-flight iterations.
///
/// Cloning is cheap and yields a handle to the same collection.
pub struct SharedCollection<T> {
    inner: Arc<Mutex<Collection<T>>>,
}

impl<T> SharedCollection<T> {
    /// Wrap a collection
    pub fn new(collection: impl Into<Collection<T>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(collection.into())),
        }
    }

    /// Lock the collection for reading or mutation.
    ///
    /// Iterations only hold this lock while copying one value out, never
    /// while a callback runs, so callbacks may lock it too.
    pub fn lock(&self) -> MutexGuard<'_, Collection<T>> {
        self.inner.lock()
    }

    /// Number of present elements
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a value
    pub fn remove(&self, key: impl Into<Key>) -> Option<T> {
        self.inner.lock().remove(&key.into())
    }

    /// Remove the last element
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().pop()
    }

    /// Add a value
    pub fn insert(&self, key: impl Into<Key>, value: T) {
        self.inner.lock().insert(key.into(), value);
    }

    pub(crate) fn domain(&self) -> Domain {
        Domain::snapshot(&self.inner.lock())
    }

    /// Fresh empty collection of the same kind, for accumulating results.
    pub(crate) fn empty_like(&self) -> Collection<T> {
        self.inner.lock().empty_like()
    }
}

impl<T: Clone> SharedCollection<T> {
    /// Copy of the current contents
    pub fn snapshot(&self) -> Collection<T> {
        self.inner.lock().clone()
    }

    /// Copy out the element at `position` of `domain`, if still present.
    pub(crate) fn fetch(&self, domain: &Domain, position: usize) -> Option<(Key, T)> {
        let key = domain.key(position)?;
        let value = self.inner.lock().get(&key).cloned()?;
        Some((key, value))
    }
}

impl<T> Clone for SharedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCollection")
            .field(&*self.inner.lock())
            .finish()
    }
}

impl<T> From<Collection<T>> for SharedCollection<T> {
    fn from(collection: Collection<T>) -> Self {
        Self::new(collection)
    }
}

impl<T> From<Vec<T>> for SharedCollection<T> {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

impl<T> From<IndexMap<String, T>> for SharedCollection<T> {
    fn from(entries: IndexMap<String, T>) -> Self {
        Self::new(entries)
    }
}
