use core::convert::Infallible;
use std::collections::BTreeMap;

use crate::traits::StateStore;

/// In-memory storage backend.
///
/// All data lives in a `BTreeMap`; nothing touches disk. Ideal for tests
/// and for peers that keep their replica in memory.
///
/// # Example
///
/// ```
/// use vault_sync_store::{MemoryStore, StateStore};
///
/// let mut store = MemoryStore::new();
/// store.put("vaults", "v1", b"{}").unwrap();
///
/// let data = store.get("vaults", "v1").unwrap().unwrap();
/// assert_eq!(data, b"{}");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// (namespace, key) -> value
    state: BTreeMap<(String, String), Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries across all namespaces.
    pub fn state_count(&self) -> usize {
        self.state.len()
    }

    fn ns_key(namespace: &str, key: &str) -> (String, String) {
        (namespace.to_string(), key.to_string())
    }
}

impl StateStore for MemoryStore {
    type Error = Infallible;

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.state
            .insert(Self::ns_key(namespace, key), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.state.get(&Self::ns_key(namespace, key)).cloned())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), Self::Error> {
        self.state.remove(&Self::ns_key(namespace, key));
        Ok(())
    }

    fn list_keys(&self, namespace: &str) -> Result<Vec<String>, Self::Error> {
        let keys = self
            .state
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect();
        Ok(keys)
    }

    fn exists(&self, namespace: &str, key: &str) -> Result<bool, Self::Error> {
        Ok(self.state.contains_key(&Self::ns_key(namespace, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_put_get_delete() {
        let mut store = MemoryStore::new();

        store.put("ns", "k1", b"hello").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), Some(b"hello".to_vec()));

        store.put("ns", "k1", b"world").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), Some(b"world".to_vec()));

        store.delete("ns", "k1").unwrap();
        assert_eq!(store.get("ns", "k1").unwrap(), None);
    }

    #[test]
    fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("ns", "nope").unwrap(), None);
    }

    #[test]
    fn state_namespace_isolation() {
        let mut store = MemoryStore::new();
        store.put("a", "k1", b"alpha").unwrap();
        store.put("b", "k1", b"beta").unwrap();

        assert_eq!(store.get("a", "k1").unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(store.get("b", "k1").unwrap(), Some(b"beta".to_vec()));
        assert_eq!(store.state_count(), 2);
    }

    #[test]
    fn state_list_keys() {
        let mut store = MemoryStore::new();
        store.put("ns", "b", b"2").unwrap();
        store.put("ns", "a", b"1").unwrap();
        store.put("other", "c", b"3").unwrap();

        let keys = store.list_keys("ns").unwrap();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn state_exists() {
        let mut store = MemoryStore::new();
        assert!(!store.exists("ns", "k").unwrap());
        store.put("ns", "k", b"v").unwrap();
        assert!(store.exists("ns", "k").unwrap());
    }
}
