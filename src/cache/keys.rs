// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Store key and index key construction
//!
//! The reader and the indexer must agree bit-for-bit on every key format in
//! this module, otherwise lookups silently miss. Formats:
//!
//! - store key: `[tenant|][namespace/]name`
//! - tenant index key: `tenant|`
//! - tenant+namespace index key: `tenant|namespace/`
//! - field index key: `[tenant|]namespace/value`, with `__all_namespaces`
//!   standing in for the namespace when listing across all namespaces
//!
//! Kubernetes names and namespaces never contain `/` or `|`, and tenant
//! names must not contain `|`, which keeps the encodings injective.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CacheError;

/// Namespace token used in field index keys when listing across all namespaces.
///
/// Not a valid namespace name (DNS labels cannot contain `_`).
pub const ALL_NAMESPACES: &str = "__all_namespaces";

/// Separates the tenant from the rest of a key; never valid inside a tenant name
pub const TENANT_SEPARATOR: char = '|';

/// Prefix that separates field-derived index names from the fixed ones
const FIELD_INDEX_PREFIX: &str = "field:";

/// A logical partition of the object space.
///
/// Objects in different tenants with the same namespace and name are distinct.
/// An empty tenant is treated the same as no tenant.
///
/// Names must not contain [`TENANT_SEPARATOR`]. [`Tenant::new`] and the `From`
/// impls take that as a precondition; untrusted input goes through `parse`
/// (and deserialization), which rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tenant(String);

impl Tenant {
    /// Unchecked constructor; `name` must not contain `|`
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `None` for the empty tenant
    pub fn non_empty(&self) -> Option<&Tenant> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tenant {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(TENANT_SEPARATOR) {
            return Err(CacheError::InvalidTenant(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Tenant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl From<&str> for Tenant {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Tenant {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a single object in the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Explicit tenant; falls back to the request context when absent or empty
    pub tenant: Option<Tenant>,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant: None,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped object
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    pub fn in_tenant(mut self, tenant: impl Into<Tenant>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Build a tenant-scoped key.
///
/// Shared by the store key function and the tenant / tenant+namespace indices:
/// `tenant_aware_key("t", "", "")` is `t|`, `tenant_aware_key("t", "ns", "")`
/// is `t|ns/`.
pub fn tenant_aware_key(tenant: &str, namespace: &str, name: &str) -> String {
    let mut key = String::with_capacity(tenant.len() + namespace.len() + name.len() + 2);
    if !tenant.is_empty() {
        key.push_str(tenant);
        key.push(TENANT_SEPARATOR);
    }
    if !namespace.is_empty() {
        key.push_str(namespace);
        key.push('/');
    }
    key.push_str(name);
    key
}

/// Encode an object identity as a store key.
///
/// Must stay in sync with the indexer's key function
/// ([`store_key_for`](super::indexer::store_key_for)).
pub fn object_key_to_store_key(key: &ObjectKey, tenant: Option<&Tenant>) -> String {
    match tenant.and_then(Tenant::non_empty) {
        Some(tenant) => tenant_aware_key(tenant.as_str(), &key.namespace, &key.name),
        None if key.namespace.is_empty() => key.name.clone(),
        None => format!("{}/{}", key.namespace, key.name),
    }
}

/// Prefix an index key with a namespace for use in field selector indexes.
///
/// An empty namespace selects the all-namespaces variant.
pub fn namespaced_index_key(namespace: &str, base_key: &str) -> String {
    let ns = if namespace.is_empty() {
        ALL_NAMESPACES
    } else {
        namespace
    };
    format!("{}/{}", ns, base_key)
}

/// Key into a field index, tenant-prefixed when a tenant is active
pub fn field_index_key(tenant: Option<&Tenant>, namespace: &str, value: &str) -> String {
    let base = namespaced_index_key(namespace, value);
    match tenant.and_then(Tenant::non_empty) {
        Some(tenant) => tenant_aware_key(tenant.as_str(), "", &base),
        None => base,
    }
}

/// Closed set of secondary indices the reader knows how to query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexName {
    /// Objects by namespace; key is the bare namespace
    Namespace,
    /// Objects by tenant; key is `tenant|`
    Tenant,
    /// Objects by tenant and namespace; key is `tenant|namespace/`
    TenantNamespace,
    /// Objects by the value of a field path; key per [`field_index_key`]
    Field(String),
}

impl IndexName {
    pub fn field(path: impl Into<String>) -> Self {
        IndexName::Field(path.into())
    }

    /// Stable string identifier of the index
    pub fn name(&self) -> std::borrow::Cow<'_, str> {
        match self {
            IndexName::Namespace => "namespace".into(),
            IndexName::Tenant => "tenant".into(),
            IndexName::TenantNamespace => "tenant-namespace".into(),
            IndexName::Field(path) => format!("{}{}", FIELD_INDEX_PREFIX, path).into(),
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
