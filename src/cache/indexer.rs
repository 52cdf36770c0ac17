// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Indexed object store
//!
//! [`Indexer`] is the contract the reader needs from the store that an
//! informer populates. [`ThreadSafeIndexer`] is an in-memory implementation
//! that maintains the namespace, tenant and tenant+namespace indices plus any
//! registered field indices, using exactly the key formats from
//! [`keys`](super::keys).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::keys::{self, IndexName};
use super::object::{CacheObject, StoredObject};
use crate::error::IndexerError;

/// Read access to an indexed object store.
///
/// All methods must be safe to call concurrently, including while the store is
/// being written to, and each call must observe a consistent snapshot.
pub trait Indexer: Send + Sync {
    /// Look up a single object by its store key
    fn get_by_key(&self, key: &str) -> Result<Option<StoredObject>, IndexerError>;

    /// All objects whose index values for `index` include `key`
    fn by_index(&self, index: &IndexName, key: &str) -> Result<Vec<StoredObject>, IndexerError>;

    /// Every object in the store, unindexed
    fn list(&self) -> Vec<StoredObject>;
}

impl<I: Indexer + ?Sized> Indexer for Arc<I> {
    fn get_by_key(&self, key: &str) -> Result<Option<StoredObject>, IndexerError> {
        (**self).get_by_key(key)
    }

    fn by_index(&self, index: &IndexName, key: &str) -> Result<Vec<StoredObject>, IndexerError> {
        (**self).by_index(index, key)
    }

    fn list(&self) -> Vec<StoredObject> {
        (**self).list()
    }
}

/// Extracts the values of one field from an object
pub type FieldExtractor = Arc<dyn Fn(&dyn CacheObject) -> Vec<String> + Send + Sync>;

/// Store key of an object: `[tenant|][namespace/]name`
pub fn store_key_for(obj: &dyn CacheObject) -> Result<String, IndexerError> {
    let meta = obj
        .metadata()
        .ok_or_else(|| IndexerError::KeyFunc(format!("{} has no metadata", obj.type_name())))?;
    let name = meta
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| IndexerError::KeyFunc("object has no name".to_string()))?;
    let namespace = meta.namespace.as_deref().unwrap_or("");
    let tenant = obj.tenant().unwrap_or("");
    if tenant.contains(keys::TENANT_SEPARATOR) {
        return Err(IndexerError::KeyFunc(format!(
            "tenant {:?} of {} contains '{}'",
            tenant,
            name,
            keys::TENANT_SEPARATOR
        )));
    }
    Ok(keys::tenant_aware_key(tenant, namespace, name))
}

/// Index values of an object for one index
fn index_values(
    index: &IndexName,
    obj: &dyn CacheObject,
    fields: &HashMap<String, FieldExtractor>,
) -> Vec<String> {
    let namespace = obj
        .metadata()
        .and_then(|m| m.namespace.as_deref())
        .unwrap_or("");
    let tenant = obj.tenant();

    match index {
        IndexName::Namespace => {
            if namespace.is_empty() {
                vec![]
            } else {
                vec![namespace.to_string()]
            }
        }
        IndexName::Tenant => tenant
            .map(|t| vec![keys::tenant_aware_key(t, "", "")])
            .unwrap_or_default(),
        IndexName::TenantNamespace => tenant
            .map(|t| vec![keys::tenant_aware_key(t, namespace, "")])
            .unwrap_or_default(),
        IndexName::Field(path) => {
            let Some(extract) = fields.get(path) else {
                return vec![];
            };
            let tenant = tenant.map(keys::Tenant::from);
            let mut out = Vec::new();
            for value in extract(obj) {
                // Namespaced objects are reachable both from their namespace
                // and from the all-namespaces variant
                if !namespace.is_empty() {
                    out.push(keys::field_index_key(None, namespace, &value));
                }
                out.push(keys::field_index_key(None, "", &value));
                if let Some(t) = &tenant {
                    if !namespace.is_empty() {
                        out.push(keys::field_index_key(Some(t), namespace, &value));
                    }
                    out.push(keys::field_index_key(Some(t), "", &value));
                }
            }
            out
        }
    }
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, StoredObject>,
    /// index -> index key -> store keys
    indices: HashMap<IndexName, HashMap<String, BTreeSet<String>>>,
    fields: HashMap<String, FieldExtractor>,
}

impl Inner {
    fn index_names(&self) -> Vec<IndexName> {
        self.indices.keys().cloned().collect()
    }

    fn insert_index_entries(&mut self, store_key: &str, obj: &dyn CacheObject) {
        for index in self.index_names() {
            let values = index_values(&index, obj, &self.fields);
            let entries = self.indices.entry(index).or_default();
            for value in values {
                entries.entry(value).or_default().insert(store_key.to_string());
            }
        }
    }

    fn remove_index_entries(&mut self, store_key: &str, obj: &dyn CacheObject) {
        for index in self.index_names() {
            let values = index_values(&index, obj, &self.fields);
            if let Some(entries) = self.indices.get_mut(&index) {
                for value in values {
                    if let Some(set) = entries.get_mut(&value) {
                        set.remove(store_key);
                        if set.is_empty() {
                            entries.remove(&value);
                        }
                    }
                }
            }
        }
    }
}

/// In-memory thread-safe store with secondary indices.
///
/// Writers (`add`, `update`, `delete`) take an exclusive lock; readers share a
/// read lock for the duration of one call.
pub struct ThreadSafeIndexer {
    inner: RwLock<Inner>,
}

impl Default for ThreadSafeIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadSafeIndexer {
    /// Create an empty store with the namespace, tenant and tenant+namespace indices
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for index in [IndexName::Namespace, IndexName::Tenant, IndexName::TenantNamespace] {
            inner.indices.insert(index, HashMap::new());
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Register an index over `path`, rebuilding it for objects already stored
    pub fn add_field_index<F>(&self, path: impl Into<String>, extract: F)
    where
        F: Fn(&dyn CacheObject) -> Vec<String> + Send + Sync + 'static,
    {
        let path = path.into();
        let index = IndexName::field(path.clone());
        let mut inner = self.inner.write();
        inner.fields.insert(path, Arc::new(extract));

        let mut entries: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (store_key, obj) in &inner.items {
            for value in index_values(&index, obj.as_ref(), &inner.fields) {
                entries.entry(value).or_default().insert(store_key.clone());
            }
        }
        trace!(index = %index, keys = entries.len(), "registered field index");
        inner.indices.insert(index, entries);
    }

    /// Register a field index using the object's own [`CacheObject::field_value`]
    pub fn add_default_field_index(&self, path: impl Into<String>) {
        let path = path.into();
        let lookup = path.clone();
        self.add_field_index(path, move |obj| obj.field_value(&lookup).into_iter().collect());
    }

    /// Insert or replace an object
    pub fn add(&self, obj: StoredObject) -> Result<(), IndexerError> {
        let store_key = store_key_for(obj.as_ref())?;
        let mut inner = self.inner.write();
        if let Some(old) = inner.items.remove(&store_key) {
            inner.remove_index_entries(&store_key, old.as_ref());
        }
        inner.insert_index_entries(&store_key, obj.as_ref());
        inner.items.insert(store_key, obj);
        Ok(())
    }

    /// Remove an object, returning the stored instance if it was present
    pub fn delete(&self, obj: &dyn CacheObject) -> Result<Option<StoredObject>, IndexerError> {
        let store_key = store_key_for(obj)?;
        let mut inner = self.inner.write();
        let removed = inner.items.remove(&store_key);
        if let Some(old) = &removed {
            inner.remove_index_entries(&store_key, old.as_ref());
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }
}

impl Indexer for ThreadSafeIndexer {
    fn get_by_key(&self, key: &str) -> Result<Option<StoredObject>, IndexerError> {
        trace!(key, "get_by_key");
        Ok(self.inner.read().items.get(key).cloned())
    }

    fn by_index(&self, index: &IndexName, key: &str) -> Result<Vec<StoredObject>, IndexerError> {
        let inner = self.inner.read();
        let entries = inner
            .indices
            .get(index)
            .ok_or_else(|| IndexerError::IndexNotFound(index.to_string()))?;
        let Some(store_keys) = entries.get(key) else {
            return Ok(Vec::new());
        };
        Ok(store_keys
            .iter()
            .filter_map(|k| inner.items.get(k).cloned())
            .collect())
    }

    fn list(&self) -> Vec<StoredObject> {
        self.inner.read().items.values().cloned().collect()
    }
}
