use std::{collections::HashMap, fmt::Debug, hash::Hash};

/// Map that refuses silent overwrites and removal of missing keys.
pub struct CheckedMap<K: Eq + Hash + Debug, V> {
    inner: HashMap<K, V>,
}

impl<K: Eq + Hash + Debug, V> Default for CheckedMap<K, V> {
    fn default() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Debug + Clone, V: Clone> Clone for CheckedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Eq + Hash + Debug, V> CheckedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.inner.contains_key(&key) {
            panic!("CheckedMap: key {:?} is already registered. Check first.", key);
        }
        self.inner.insert(key, value);
    }

    pub fn remove(&mut self, key: &K) -> V {
        match self.inner.remove(key) {
            Some(value) => value,
            None => panic!(
                "CheckedMap: key {:?} is not registered. Check whether the map contains it first.",
                key
            ),
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
