use crate::ir::program::TermId;
use std::ops::{Index, IndexMut};

/// A dense side table keyed by term index.
///
/// Reads of indices that were never written yield the default value; writes
/// grow the table on demand. Term indices are never reused, so an entry can
/// never silently alias a different term.
#[derive(Clone, Debug)]
pub struct TermMap<T> {
    values: Vec<T>,
    default: T,
}

impl<T: Default + Clone> TermMap<T> {
    /// An empty map.
    pub fn new() -> TermMap<T> {
        TermMap {
            values: Vec::new(),
            default: T::default(),
        }
    }

    fn ensure(&mut self, id: TermId) {
        if self.values.len() <= id.index() {
            self.values.resize(id.index() + 1, T::default());
        }
    }

    /// Reset every entry to the default value.
    pub fn clear(&mut self) {
        for v in &mut self.values {
            *v = T::default();
        }
    }
}

impl<T: Default + Clone> Default for TermMap<T> {
    fn default() -> Self {
        TermMap::new()
    }
}

impl<T: Default + Clone> Index<TermId> for TermMap<T> {
    type Output = T;

    fn index(&self, id: TermId) -> &T {
        self.values.get(id.index()).unwrap_or(&self.default)
    }
}

impl<T: Default + Clone> IndexMut<TermId> for TermMap<T> {
    fn index_mut(&mut self, id: TermId) -> &mut T {
        self.ensure(id);
        &mut self.values[id.index()]
    }
}

/// A sparse side table keyed by term index: entries exist only once written.
///
/// Indexing an unwritten entry panics; passes use [`TermMapOptional::get`]
/// or [`TermMapOptional::has`] where absence is expected.
#[derive(Clone, Debug)]
pub struct TermMapOptional<T> {
    values: Vec<Option<T>>,
}

impl<T> TermMapOptional<T> {
    /// An empty map.
    pub fn new() -> TermMapOptional<T> {
        TermMapOptional { values: Vec::new() }
    }

    /// Write the value for `id`.
    pub fn set(&mut self, id: TermId, value: T) {
        if self.values.len() <= id.index() {
            self.values.resize_with(id.index() + 1, || None);
        }
        self.values[id.index()] = Some(value);
    }

    /// The value for `id`, if one was written.
    pub fn get(&self, id: TermId) -> Option<&T> {
        self.values.get(id.index()).and_then(|v| v.as_ref())
    }

    /// Whether a value was written for `id`.
    pub fn has(&self, id: TermId) -> bool {
        self.get(id).is_some()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        for v in &mut self.values {
            *v = None;
        }
    }
}

impl<T> Default for TermMapOptional<T> {
    fn default() -> Self {
        TermMapOptional::new()
    }
}

impl<T> Index<TermId> for TermMapOptional<T> {
    type Output = T;

    fn index(&self, id: TermId) -> &T {
        self.get(id)
            .unwrap_or_else(|| panic!("no value recorded for term {}", id))
    }
}
