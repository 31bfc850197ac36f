//! The membership set: which peers currently receive broadcasts.

/// Ordered collection of the peers currently eligible for broadcast.
///
/// Entries keep insertion order and are unique by key. Lookups are linear
/// scans, which is the right trade at the expected scale of a handful to a
/// few hundred peers.
#[derive(Debug)]
pub struct Roster<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Roster<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq, V> Roster<K, V> {
    /// Appends an entry for `key` unless one already exists.
    ///
    /// Returns `true` if the entry was inserted, `false` if the key was
    /// already present (the existing entry is kept and `value` is dropped).
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    /// Removes the entry for `key`, returning its value.
    ///
    /// Removing an absent key returns `None`; a peer that is already gone
    /// is a valid end state, not an error.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<K, V> Default for Roster<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}
