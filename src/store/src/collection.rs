use crate::error::StoreError;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub(crate) struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

struct Inner<T> {
    docs: BTreeMap<String, Versioned<T>>,
    /// Bumped on every write so query results can be validated as a whole.
    version: u64,
    next_version: u64,
    indexes: HashSet<&'static str>,
}

/// One typed document collection. Every document carries a version stamp;
/// transactions validate the versions they read before their writes land.
pub struct Collection<T> {
    name: &'static str,
    /// Store-wide commit gate, shared across all collections so direct
    /// writes serialize with transaction commits.
    gate: Arc<Mutex<()>>,
    inner: RwLock<Inner<T>>,
}

/// Version access for transaction validation, independent of the payload type.
pub(crate) trait Validate: Send + Sync {
    fn doc_version(&self, id: &str) -> Option<u64>;
    fn collection_version(&self) -> u64;
    fn name(&self) -> &'static str;
}

impl<T: Clone + Send + Sync> Validate for Collection<T> {
    fn doc_version(&self, id: &str) -> Option<u64> {
        self.inner
            .read()
            .expect("collection lock poisoned")
            .docs
            .get(id)
            .map(|d| d.version)
    }

    fn collection_version(&self) -> u64 {
        self.inner.read().expect("collection lock poisoned").version
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Clone + Send + Sync> Collection<T> {
    pub(crate) fn new(name: &'static str, gate: Arc<Mutex<()>>) -> Self {
        Collection {
            name,
            gate,
            inner: RwLock::new(Inner {
                docs: BTreeMap::new(),
                version: 0,
                next_version: 1,
                indexes: HashSet::new(),
            }),
        }
    }

    /// Declares a composite index so ordered queries over this collection
    /// succeed. Undeclared orderings return `MissingIndex`.
    pub fn declare_index(&self, index: &'static str) {
        self.inner
            .write()
            .expect("collection lock poisoned")
            .indexes
            .insert(index);
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner
            .read()
            .expect("collection lock poisoned")
            .docs
            .get(id)
            .map(|d| d.value.clone())
    }

    pub(crate) fn snapshot(&self, id: &str) -> (Option<u64>, Option<T>) {
        let inner = self.inner.read().expect("collection lock poisoned");
        match inner.docs.get(id) {
            Some(d) => (Some(d.version), Some(d.value.clone())),
            None => (None, None),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("collection lock poisoned").docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unordered filter scan in key order.
    pub fn scan<F: Fn(&str, &T) -> bool>(&self, filter: F) -> Vec<(String, T)> {
        self.inner
            .read()
            .expect("collection lock poisoned")
            .docs
            .iter()
            .filter(|(id, d)| filter(id, &d.value))
            .map(|(id, d)| (id.clone(), d.value.clone()))
            .collect()
    }

    /// Ordered query; requires `index` to have been declared, otherwise the
    /// caller gets `MissingIndex` and is expected to fall back to `scan`.
    pub fn query_ordered<K, F, KF>(
        &self,
        filter: F,
        key_of: KF,
        index: &'static str,
    ) -> Result<Vec<(String, T)>, StoreError>
    where
        K: Ord,
        F: Fn(&str, &T) -> bool,
        KF: Fn(&T) -> K,
    {
        {
            let inner = self.inner.read().expect("collection lock poisoned");
            if !inner.indexes.contains(index) {
                return Err(StoreError::MissingIndex {
                    collection: self.name,
                    index,
                });
            }
        }
        let mut rows = self.scan(filter);
        rows.sort_by(|a, b| key_of(&a.1).cmp(&key_of(&b.1)));
        Ok(rows)
    }

    /// Create-if-absent, the primitive behind plans, operational locks and
    /// idempotent queue entries.
    pub fn create(&self, id: &str, value: T) -> Result<(), StoreError> {
        let _gate = self.gate.lock().expect("commit gate poisoned");
        let mut inner = self.inner.write().expect("collection lock poisoned");
        if inner.docs.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                collection: self.name,
                id: id.to_string(),
            });
        }
        let version = inner.next_version;
        inner.next_version += 1;
        inner.version = version;
        inner.docs.insert(id.to_string(), Versioned { version, value });
        Ok(())
    }

    /// Direct upsert outside any transaction.
    pub fn put(&self, id: &str, value: T) {
        let _gate = self.gate.lock().expect("commit gate poisoned");
        self.apply_put(id, value);
    }

    /// Direct delete outside any transaction.
    pub fn remove(&self, id: &str) -> bool {
        let _gate = self.gate.lock().expect("commit gate poisoned");
        self.apply_remove(id)
    }

    pub(crate) fn apply_put(&self, id: &str, value: T) {
        let mut inner = self.inner.write().expect("collection lock poisoned");
        let version = inner.next_version;
        inner.next_version += 1;
        inner.version = version;
        inner.docs.insert(id.to_string(), Versioned { version, value });
    }

    pub(crate) fn apply_remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write().expect("collection lock poisoned");
        let removed = inner.docs.remove(id).is_some();
        if removed {
            let version = inner.next_version;
            inner.next_version += 1;
            inner.version = version;
        }
        removed
    }
}
