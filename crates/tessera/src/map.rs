//! Ordered map with case-insensitive string keys.

use indexmap::IndexMap;

/// Insertion-ordered map whose lookups ignore case. The first spelling of a
/// key is kept for iteration.
#[derive(Debug, Clone)]
pub struct NameMap<V> {
    entries: IndexMap<String, (String, V)>,
}

impl<V> Default for NameMap<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl<V> NameMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, name: &str, value: V) -> Option<V> {
        match self.entries.get_mut(&fold(name)) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.insert(fold(name), (name.to_string(), value));
                None
            }
        }
    }

    /// Insert only when `name` is not present yet.
    pub fn insert_if_absent(&mut self, name: &str, value: V) {
        self.entries
            .entry(fold(name))
            .or_insert_with(|| (name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(&fold(name)).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(&fold(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order, with their original spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }
}
