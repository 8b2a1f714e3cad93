//! Insertion-ordered string-keyed map.

use std::collections::HashMap;
use std::fmt;

/// A map that keeps first-insertion order. Inserting an existing key replaces the value in
/// place, so later entries win without reordering. Lookups go through a key index.
#[derive(Clone)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

// The index is derived from the entries, so only they take part in equality.
impl<V: PartialEq> PartialEq for OrderedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V: fmt::Debug> fmt::Debug for OrderedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut map = OrderedMap::new();
        assert_eq!(map.insert("a", 1), None);
        map.insert("b", 2);
        assert_eq!(map.insert("a", 3), Some(1));

        let entries: Vec<(&str, &i32)> = map.iter().collect();
        assert_eq!(entries, vec![("a", &3), ("b", &2)]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_from_iterator_keeps_last_value() {
        let map: OrderedMap<i32> = vec![("x", 1), ("y", 2), ("x", 9)].into_iter().collect();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(map.get("x"), Some(&9));
        assert!(map.contains_key("y"));
        assert!(!map.contains_key("z"));
    }

    #[test]
    fn test_many_keys_stay_indexed() {
        let mut map = OrderedMap::new();
        for i in 0..10_000 {
            map.insert(format!("k{}", i), i);
        }
        for i in (0..10_000).step_by(7) {
            map.insert(format!("k{}", i), -i);
        }
        assert_eq!(map.len(), 10_000);
        assert_eq!(map.get("k0"), Some(&0));
        assert_eq!(map.get("k7"), Some(&-7));
        assert_eq!(map.get("k9999"), Some(&9999));
        assert_eq!(map.keys().nth(7), Some("k7"));
        assert_eq!(map.values().nth(7), Some(&-7));
    }

    #[test]
    fn test_equality_ignores_index_layout() {
        let mut a = OrderedMap::new();
        a.insert("x", 1);
        a.insert("y", 2);
        let b: OrderedMap<i32> = vec![("x", 0), ("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(format!("{:?}", a), r#"{"x": 1, "y": 2}"#);

        let c: OrderedMap<i32> = vec![("y", 2), ("x", 1)].into_iter().collect();
        assert_ne!(a, c);
    }
}
