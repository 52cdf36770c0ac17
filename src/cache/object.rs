// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Object model for values held in the cache
//!
//! The cache stores heterogeneous objects behind `Arc<dyn CacheObject>`. The
//! reader only relies on three facets of an object: its type descriptor
//! (group/version/kind), its metadata (labels, namespace, name) and its
//! ability to produce an independent deep copy.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use kube::api::{DynamicObject, GroupVersionKind, ObjectMeta, TypeMeta};

/// Annotation carrying the tenant (logical cluster) an object belongs to
pub const TENANT_ANNOTATION: &str = "kcp.io/cluster";

/// A cached object as seen by the indexer and the reader
pub type StoredObject = Arc<dyn CacheObject>;

/// Type-erasure helpers, implemented for every `Send + Sync + 'static` type.
///
/// Call these on `&dyn CacheObject` / `Arc<dyn CacheObject>` directly; calling
/// them through an extra reference layer resolves to the impl for the wrapper.
pub trait AsAny: Any + Send + Sync {
    fn into_any_box(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    /// Concrete type name, for error messages
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any_box(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Capabilities the cache needs from a stored object
pub trait CacheObject: AsAny + Debug {
    /// Object metadata, or `None` when the object does not expose any
    fn metadata(&self) -> Option<&ObjectMeta>;

    /// The type descriptor currently set on the object
    fn gvk(&self) -> Option<GroupVersionKind>;

    /// Stamp the type descriptor onto the object
    fn set_gvk(&mut self, gvk: &GroupVersionKind);

    /// An independent copy sharing no mutable state with `self`
    fn deep_copy(&self) -> Box<dyn CacheObject>;

    /// Tenant the object belongs to, if any
    fn tenant(&self) -> Option<&str> {
        self.metadata()?
            .annotations
            .as_ref()?
            .get(TENANT_ANNOTATION)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    /// String value at a dotted field path, for field indices
    fn field_value(&self, path: &str) -> Option<String> {
        let meta = self.metadata()?;
        match path {
            "metadata.name" => meta.name.clone(),
            "metadata.namespace" => Some(meta.namespace.clone().unwrap_or_default()),
            _ => None,
        }
    }
}

/// Labels of an object; an object without labels has the empty set
pub fn labels_of(meta: &ObjectMeta) -> &BTreeMap<String, String> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    meta.labels.as_ref().unwrap_or(&EMPTY)
}

impl CacheObject for DynamicObject {
    fn metadata(&self) -> Option<&ObjectMeta> {
        Some(&self.metadata)
    }

    fn gvk(&self) -> Option<GroupVersionKind> {
        let types = self.types.as_ref()?;
        GroupVersionKind::try_from(types).ok()
    }

    fn set_gvk(&mut self, gvk: &GroupVersionKind) {
        self.types = Some(TypeMeta {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
        });
    }

    fn deep_copy(&self) -> Box<dyn CacheObject> {
        Box::new(self.clone())
    }

    fn field_value(&self, path: &str) -> Option<String> {
        match path {
            "metadata.name" => self.metadata.name.clone(),
            "metadata.namespace" => Some(self.metadata.namespace.clone().unwrap_or_default()),
            _ => lookup_data_path(&self.data, path),
        }
    }
}

/// Resolve a dotted path inside the free-form body of a dynamic object.
///
/// Strings are returned verbatim, other scalars in their JSON form; objects,
/// arrays and nulls have no index value.
fn lookup_data_path(data: &serde_json::Value, path: &str) -> Option<String> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    match current {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
