use std::collections::HashMap;
use std::hash::Hash;

/// Map that iterates in first-insertion order.
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        OrderedMap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Value for `key`, inserting `default()` at the end if the key is new.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.index.insert(key.clone(), idx);
                self.entries.push((key, default()));
                idx
            }
        };
        &mut self.entries[idx].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_insertion_order() {
        let mut map: OrderedMap<String, Vec<u32>> = OrderedMap::new();
        map.get_or_insert_with("b".into(), Vec::new).push(1);
        map.get_or_insert_with("a".into(), Vec::new).push(2);
        map.get_or_insert_with("b".into(), Vec::new).push(3);

        let entries: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
        assert_eq!(entries, [("b", &[1, 3][..]), ("a", &[2][..])]);
    }

    #[test]
    fn empty() {
        let map: OrderedMap<String, ()> = OrderedMap::new();
        assert_eq!(map.iter().count(), 0);
    }
}
