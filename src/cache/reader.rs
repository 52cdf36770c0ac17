// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cache reader: Get and List over an indexer for a single resource type

use kube::api::GroupVersionKind;
use kube::discovery::Scope;
use tracing::{debug, trace};

use super::context::RequestContext;
use super::copy_policy::{Cached, CopyPolicy, ensure_type};
use super::indexer::Indexer;
use super::keys::{ObjectKey, Tenant, object_key_to_store_key};
use super::object::{CacheObject, labels_of};
use super::planner::{IndexPlan, ListQuery, QueryPlanner};
use crate::error::{CacheError, Result};

/// Read-only view of an indexer for one resource type.
///
/// Performs no writes and holds no locks; concurrent use relies on the
/// indexer's own guarantees.
pub struct CacheReader<I> {
    indexer: I,
    gvk: GroupVersionKind,
    scope: Scope,
    copy_policy: CopyPolicy,
    planner: QueryPlanner,
}

impl<I: Indexer> CacheReader<I> {
    /// Reader with the default [`CopyPolicy::Safe`]
    pub fn new(indexer: I, gvk: GroupVersionKind, scope: Scope) -> Self {
        Self {
            indexer,
            gvk,
            scope,
            copy_policy: CopyPolicy::default(),
            planner: QueryPlanner::new(),
        }
    }

    pub fn with_copy_policy(mut self, copy_policy: CopyPolicy) -> Self {
        self.copy_policy = copy_policy;
        self
    }

    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    pub fn copy_policy(&self) -> CopyPolicy {
        self.copy_policy
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    /// Get an object, resolving the tenant from the key or the request context
    pub fn get<T: CacheObject>(
        &self,
        ctx: &RequestContext,
        key: &ObjectKey,
    ) -> Result<Cached<T>> {
        self.get_in(ctx.resolve_tenant(key.tenant.as_ref()), key)
    }

    /// List objects, resolving the tenant from the query or the request context
    pub fn list<T: CacheObject>(
        &self,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> Result<Vec<Cached<T>>> {
        self.list_in(ctx.resolve_tenant(query.tenant.as_ref()), query)
    }

    /// Get a single object within an explicit tenant.
    ///
    /// The key's own `tenant` field is ignored here; callers resolve it first.
    pub fn get_in<T: CacheObject>(
        &self,
        tenant: Option<&Tenant>,
        key: &ObjectKey,
    ) -> Result<Cached<T>> {
        let mut key = key.clone();
        if self.scope == Scope::Cluster {
            key.namespace.clear();
        }
        let store_key = object_key_to_store_key(&key, tenant);
        trace!(kind = %self.gvk.kind, store_key = %store_key, "cache get");

        let Some(stored) = self.indexer.get_by_key(&store_key)? else {
            return Err(CacheError::NotFound {
                group: self.gvk.group.clone(),
                kind: self.gvk.kind.clone(),
                name: key.name,
            });
        };

        self.copy_policy.apply(&stored, &self.gvk)
    }

    /// List objects within an explicit tenant.
    ///
    /// Results come back in the order the index yields them, truncated at the
    /// query's limit. Either every candidate is processed or the call fails
    /// with no partial results.
    pub fn list_in<T: CacheObject>(
        &self,
        tenant: Option<&Tenant>,
        query: &ListQuery,
    ) -> Result<Vec<Cached<T>>> {
        let plan = self.planner.plan(tenant, query)?;
        debug!(kind = %self.gvk.kind, plan = %plan, "cache list");

        let candidates = match &plan {
            IndexPlan::ByIndex { index, key } => self.indexer.by_index(index, key)?,
            IndexPlan::All => self.indexer.list(),
        };

        let limit = query.effective_limit();
        let label_selector = query.label_selector.as_ref().filter(|s| !s.is_empty());
        let mut out = Vec::with_capacity(limit.map_or(candidates.len(), |l| l.min(candidates.len())));

        for stored in &candidates {
            if limit.is_some_and(|l| out.len() >= l) {
                break;
            }

            ensure_type::<T>(stored)?;
            let meta = stored.metadata().ok_or_else(|| CacheError::MetadataAccess {
                type_name: stored.as_ref().type_name(),
            })?;

            if let Some(selector) = label_selector
                && !selector.matches(labels_of(meta))
            {
                continue;
            }

            out.push(self.copy_policy.apply(stored, &self.gvk)?);
        }

        debug!(
            kind = %self.gvk.kind,
            candidates = candidates.len(),
            returned = out.len(),
            "cache list complete"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::indexer::ThreadSafeIndexer;
    use crate::cache::keys::IndexName;
    use crate::cache::object::{StoredObject, TENANT_ANNOTATION};
    use crate::error::IndexerError;
    use kube::api::{ApiResource, DynamicObject, ObjectMeta};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn pod_gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", "Pod")
    }

    fn pod(
        tenant: Option<&str>,
        ns: &str,
        name: &str,
        labels: &[(&str, &str)],
        phase: &str,
    ) -> DynamicObject {
        let ar = ApiResource::from_gvk(&pod_gvk());
        let mut obj = DynamicObject::new(name, &ar)
            .within(ns)
            .data(json!({ "status": { "phase": phase } }));
        // the informer strips type information before storing
        obj.types = None;
        if !labels.is_empty() {
            obj.metadata.labels = Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        if let Some(t) = tenant {
            obj.metadata.annotations =
                Some(BTreeMap::from([(TENANT_ANNOTATION.to_string(), t.to_string())]));
        }
        obj
    }

    fn pod_reader(objs: Vec<DynamicObject>) -> CacheReader<Arc<ThreadSafeIndexer>> {
        let indexer = Arc::new(ThreadSafeIndexer::new());
        indexer.add_default_field_index("status.phase");
        for obj in objs {
            indexer.add(Arc::new(obj)).unwrap();
        }
        CacheReader::new(indexer, pod_gvk(), Scope::Namespaced)
    }

    fn names(objs: &[Cached<DynamicObject>]) -> Vec<String> {
        let mut names: Vec<String> = objs
            .iter()
            .filter_map(|o| o.metadata.name.clone())
            .collect();
        names.sort();
        names
    }

    fn fixture() -> Vec<DynamicObject> {
        vec![
            pod(None, "ns1", "a", &[("app", "x")], "Running"),
            pod(None, "ns1", "b", &[("app", "y")], "Pending"),
            pod(None, "ns2", "c", &[("app", "x")], "Running"),
            pod(None, "ns2", "d", &[], "Running"),
        ]
    }

    #[test]
    fn test_get_found() {
        let reader = pod_reader(fixture());
        let ctx = RequestContext::new();
        let got: Cached<DynamicObject> = reader.get(&ctx, &ObjectKey::new("ns1", "a")).unwrap();
        assert_eq!(got.metadata.name.as_deref(), Some("a"));
        assert_eq!(got.types.as_ref().map(|t| t.api_version.as_str()), Some("v1"));
        assert_eq!(got.types.as_ref().map(|t| t.kind.as_str()), Some("Pod"));
    }

    #[test]
    fn test_get_not_found_carries_kind() {
        let reader = pod_reader(fixture());
        let err = reader
            .get::<DynamicObject>(&RequestContext::new(), &ObjectKey::new("ns1", "missing"))
            .unwrap_err();
        match err {
            CacheError::NotFound { group, kind, name } => {
                assert_eq!(group, "");
                assert_eq!(kind, "Pod");
                assert_eq!(name, "missing");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_get_cluster_scoped_ignores_namespace() {
        let gvk = GroupVersionKind::gvk("", "v1", "Node");
        let ar = ApiResource::from_gvk(&gvk);
        let indexer = Arc::new(ThreadSafeIndexer::new());
        indexer.add(Arc::new(DynamicObject::new("node-1", &ar))).unwrap();
        let reader = CacheReader::new(indexer, gvk, Scope::Cluster);
        let ctx = RequestContext::new();

        let with_ns: Cached<DynamicObject> =
            reader.get(&ctx, &ObjectKey::new("ignored", "node-1")).unwrap();
        let without_ns: Cached<DynamicObject> =
            reader.get(&ctx, &ObjectKey::cluster_scoped("node-1")).unwrap();
        assert_eq!(with_ns.metadata, without_ns.metadata);

        let err = reader
            .get::<DynamicObject>(&ctx, &ObjectKey::new("ignored", "node-2"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[derive(Debug, Clone)]
    struct OtherKind {
        meta: ObjectMeta,
    }

    impl CacheObject for OtherKind {
        fn metadata(&self) -> Option<&ObjectMeta> {
            Some(&self.meta)
        }
        fn gvk(&self) -> Option<GroupVersionKind> {
            None
        }
        fn set_gvk(&mut self, _gvk: &GroupVersionKind) {}
        fn deep_copy(&self) -> Box<dyn CacheObject> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_get_type_mismatch() {
        let reader = pod_reader(fixture());
        let err = reader
            .get::<OtherKind>(&RequestContext::new(), &ObjectKey::new("ns1", "a"))
            .unwrap_err();
        match err {
            CacheError::TypeMismatch { stored, requested } => {
                assert!(stored.ends_with("DynamicObject"));
                assert!(requested.ends_with("OtherKind"));
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_list_type_mismatch_has_no_partial_results() {
        let reader = pod_reader(fixture());
        let result = reader.list::<OtherKind>(&RequestContext::new(), &ListQuery::new());
        assert!(matches!(result, Err(CacheError::TypeMismatch { .. })));
    }

    #[test]
    fn test_list_all() {
        let reader = pod_reader(fixture());
        let all = reader
            .list::<DynamicObject>(&RequestContext::new(), &ListQuery::new())
            .unwrap();
        assert_eq!(names(&all), vec!["a", "b", "c", "d"]);
        assert!(all.iter().all(|o| o.types.is_some()));
    }

    #[test]
    fn test_list_namespace() {
        let reader = pod_reader(fixture());
        let q = ListQuery::new().in_namespace("ns2");
        let got = reader.list::<DynamicObject>(&RequestContext::new(), &q).unwrap();
        assert_eq!(names(&got), vec!["c", "d"]);
    }

    #[test]
    fn test_list_label_selector_on_every_path() {
        let reader = pod_reader(fixture());
        let ctx = RequestContext::new();
        let sel: crate::cache::LabelSelector = "app=x".parse().unwrap();

        let queries = [
            ListQuery::new(),
            ListQuery::new().in_namespace("ns1"),
            ListQuery::new().matching_fields("status.phase=Running".parse().unwrap()),
        ];
        let expected = [vec!["a", "c"], vec!["a"], vec!["a", "c"]];

        for (q, want) in queries.into_iter().zip(expected) {
            let got = reader
                .list::<DynamicObject>(&ctx, &q.matching_labels(sel.clone()))
                .unwrap();
            assert_eq!(names(&got), want);
            for obj in &got {
                assert_eq!(
                    obj.metadata.labels.as_ref().and_then(|l| l.get("app")).map(String::as_str),
                    Some("x")
                );
            }
        }
    }

    #[test]
    fn test_list_field_selector() {
        let reader = pod_reader(fixture());
        let ctx = RequestContext::new();

        let q = ListQuery::new().matching_fields("status.phase=Running".parse().unwrap());
        let got = reader.list::<DynamicObject>(&ctx, &q).unwrap();
        assert_eq!(names(&got), vec!["a", "c", "d"]);

        let q = ListQuery::new()
            .in_namespace("ns1")
            .matching_fields("status.phase=Running".parse().unwrap());
        let got = reader.list::<DynamicObject>(&ctx, &q).unwrap();
        assert_eq!(names(&got), vec!["a"]);
    }

    #[test]
    fn test_list_inequality_field_selector_fails() {
        let reader = pod_reader(fixture());
        let q = ListQuery::new().matching_fields("status.phase!=Running".parse().unwrap());
        let err = reader
            .list::<DynamicObject>(&RequestContext::new(), &q)
            .unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedSelector(_)));
    }

    #[test]
    fn test_list_unindexed_field_propagates_store_error() {
        let reader = pod_reader(fixture());
        let q = ListQuery::new().matching_fields("spec.nodeName=n1".parse().unwrap());
        let err = reader
            .list::<DynamicObject>(&RequestContext::new(), &q)
            .unwrap_err();
        assert!(matches!(
            err,
            CacheError::Store(IndexerError::IndexNotFound(ref name)) if name == "field:spec.nodeName"
        ));
    }

    #[test]
    fn test_list_limit() {
        let reader = pod_reader(fixture());
        let ctx = RequestContext::new();

        let got = reader
            .list::<DynamicObject>(&ctx, &ListQuery::new().limit(2))
            .unwrap();
        assert_eq!(got.len(), 2);

        let got = reader
            .list::<DynamicObject>(&ctx, &ListQuery::new().limit(10))
            .unwrap();
        assert_eq!(got.len(), 4);

        let got = reader
            .list::<DynamicObject>(&ctx, &ListQuery::new().limit(0))
            .unwrap();
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn test_list_limit_counts_accepted_results() {
        let reader = pod_reader(fixture());
        let q = ListQuery::new()
            .matching_labels("app=x".parse().unwrap())
            .limit(2);
        let got = reader.list::<DynamicObject>(&RequestContext::new(), &q).unwrap();
        assert_eq!(names(&got), vec!["a", "c"]);
    }

    #[test]
    fn test_safe_mode_isolates_mutation() {
        let reader = pod_reader(fixture());
        let ctx = RequestContext::new();
        let key = ObjectKey::new("ns1", "a");

        let mut got: Cached<DynamicObject> = reader.get(&ctx, &key).unwrap();
        got.as_owned_mut()
            .unwrap()
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("app".to_string(), "mutated".to_string());

        let again: Cached<DynamicObject> = reader.get(&ctx, &key).unwrap();
        assert_eq!(
            again.metadata.labels.as_ref().and_then(|l| l.get("app")).map(String::as_str),
            Some("x")
        );

        let mut listed = reader
            .list::<DynamicObject>(&ctx, &ListQuery::new().in_namespace("ns1"))
            .unwrap();
        for obj in &mut listed {
            obj.as_owned_mut().unwrap().metadata.labels = None;
        }
        let again = reader
            .list::<DynamicObject>(&ctx, &ListQuery::new().in_namespace("ns1"))
            .unwrap();
        assert!(again.iter().all(|o| o.metadata.labels.is_some()));
    }

    /// Object with interior mutability, to observe aliasing
    #[derive(Debug)]
    struct Counter {
        meta: ObjectMeta,
        hits: Mutex<u32>,
    }

    impl CacheObject for Counter {
        fn metadata(&self) -> Option<&ObjectMeta> {
            Some(&self.meta)
        }
        fn gvk(&self) -> Option<GroupVersionKind> {
            None
        }
        fn set_gvk(&mut self, _gvk: &GroupVersionKind) {}
        fn deep_copy(&self) -> Box<dyn CacheObject> {
            Box::new(Counter {
                meta: self.meta.clone(),
                hits: Mutex::new(*self.hits.lock()),
            })
        }
    }

    fn counter_reader(policy: CopyPolicy) -> CacheReader<Arc<ThreadSafeIndexer>> {
        let indexer = Arc::new(ThreadSafeIndexer::new());
        let counter: StoredObject = Arc::new(Counter {
            meta: ObjectMeta {
                name: Some("c".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            hits: Mutex::new(0),
        });
        indexer.add(counter).unwrap();
        let gvk = GroupVersionKind::gvk("example.dev", "v1", "Counter");
        CacheReader::new(indexer, gvk, Scope::Namespaced).with_copy_policy(policy)
    }

    #[test]
    fn test_aliased_mode_exposes_shared_state() {
        let reader = counter_reader(CopyPolicy::Aliased);
        let ctx = RequestContext::new();
        let key = ObjectKey::new("ns", "c");

        let first: Cached<Counter> = reader.get(&ctx, &key).unwrap();
        assert!(first.is_shared());
        *first.hits.lock() += 1;

        let second: Cached<Counter> = reader.get(&ctx, &key).unwrap();
        assert_eq!(*second.hits.lock(), 1);

        let listed = reader.list::<Counter>(&ctx, &ListQuery::new()).unwrap();
        assert_eq!(*listed[0].hits.lock(), 1);
    }

    #[test]
    fn test_safe_mode_does_not_expose_shared_state() {
        let reader = counter_reader(CopyPolicy::Safe);
        let ctx = RequestContext::new();
        let key = ObjectKey::new("ns", "c");

        let first: Cached<Counter> = reader.get(&ctx, &key).unwrap();
        *first.hits.lock() += 1;

        let second: Cached<Counter> = reader.get(&ctx, &key).unwrap();
        assert_eq!(*second.hits.lock(), 0);
    }

    #[test]
    fn test_aliased_mode_skips_stamping() {
        let reader = pod_reader(fixture()).with_copy_policy(CopyPolicy::Aliased);
        let got: Cached<DynamicObject> = reader
            .get(&RequestContext::new(), &ObjectKey::new("ns1", "a"))
            .unwrap();
        assert!(got.types.is_none());
    }

    #[derive(Debug, Clone)]
    struct Opaque;

    impl CacheObject for Opaque {
        fn metadata(&self) -> Option<&ObjectMeta> {
            None
        }
        fn gvk(&self) -> Option<GroupVersionKind> {
            None
        }
        fn set_gvk(&mut self, _gvk: &GroupVersionKind) {}
        fn deep_copy(&self) -> Box<dyn CacheObject> {
            Box::new(self.clone())
        }
    }

    /// Indexer that hands back objects the reference store would refuse to key
    struct FixedIndexer(Vec<StoredObject>);

    impl Indexer for FixedIndexer {
        fn get_by_key(&self, _key: &str) -> std::result::Result<Option<StoredObject>, IndexerError> {
            Ok(self.0.first().cloned())
        }
        fn by_index(
            &self,
            index: &IndexName,
            _key: &str,
        ) -> std::result::Result<Vec<StoredObject>, IndexerError> {
            Err(IndexerError::IndexNotFound(index.to_string()))
        }
        fn list(&self) -> Vec<StoredObject> {
            self.0.clone()
        }
    }

    #[test]
    fn test_list_metadata_error_aborts() {
        let reader = CacheReader::new(
            FixedIndexer(vec![Arc::new(Opaque)]),
            pod_gvk(),
            Scope::Namespaced,
        );
        let err = reader
            .list::<Opaque>(&RequestContext::new(), &ListQuery::new())
            .unwrap_err();
        assert!(matches!(err, CacheError::MetadataAccess { .. }));
    }

    #[test]
    fn test_list_store_error_passes_through() {
        let reader = CacheReader::new(FixedIndexer(vec![]), pod_gvk(), Scope::Namespaced);
        let err = reader
            .list::<DynamicObject>(&RequestContext::new(), &ListQuery::new().in_namespace("ns"))
            .unwrap_err();
        assert_eq!(err.to_string(), "index with name namespace does not exist");
    }

    #[test]
    fn test_list_limit_stops_before_bad_candidates() {
        let good: StoredObject = Arc::new(pod(None, "ns", "a", &[], "Running"));
        let bad: StoredObject = Arc::new(Opaque);
        let reader = CacheReader::new(FixedIndexer(vec![good, bad]), pod_gvk(), Scope::Namespaced);
        let got = reader
            .list::<DynamicObject>(&RequestContext::new(), &ListQuery::new().limit(1))
            .unwrap();
        assert_eq!(got.len(), 1);
    }

    fn tenant_fixture() -> Vec<DynamicObject> {
        vec![
            pod(Some("t1"), "ns", "foo", &[("owner", "t1")], "Running"),
            pod(Some("t2"), "ns", "foo", &[("owner", "t2")], "Running"),
            pod(Some("t2"), "other", "bar", &[("owner", "t2")], "Running"),
        ]
    }

    fn owner(obj: &DynamicObject) -> Option<&str> {
        obj.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get("owner"))
            .map(String::as_str)
    }

    #[test]
    fn test_tenant_isolation_get() {
        let reader = pod_reader(tenant_fixture());

        for tenant in ["t1", "t2"] {
            let ctx = RequestContext::with_tenant(tenant);
            let got: Cached<DynamicObject> = reader.get(&ctx, &ObjectKey::new("ns", "foo")).unwrap();
            assert_eq!(owner(&got), Some(tenant));

            // explicit tenant on the key, no ambient tenant
            let key = ObjectKey::new("ns", "foo").in_tenant(tenant);
            let got: Cached<DynamicObject> = reader.get(&RequestContext::new(), &key).unwrap();
            assert_eq!(owner(&got), Some(tenant));
        }

        let err = reader
            .get::<DynamicObject>(&RequestContext::with_tenant("t3"), &ObjectKey::new("ns", "foo"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_tenant_isolation_list() {
        let reader = pod_reader(tenant_fixture());
        let ctx = RequestContext::with_tenant("t1");

        let queries = [
            ListQuery::new(),
            ListQuery::new().in_namespace("ns"),
            ListQuery::new().matching_fields("status.phase=Running".parse().unwrap()),
            ListQuery::new()
                .in_namespace("ns")
                .matching_fields("status.phase=Running".parse().unwrap()),
        ];
        for q in &queries {
            let got = reader.list::<DynamicObject>(&ctx, q).unwrap();
            assert_eq!(got.len(), 1, "query {q:?}");
            assert_eq!(owner(&got[0]), Some("t1"));
        }

        let got = reader
            .list::<DynamicObject>(&RequestContext::with_tenant("t2"), &ListQuery::new())
            .unwrap();
        assert_eq!(names(&got), vec!["bar", "foo"]);
    }

    #[test]
    fn test_list_explicit_tenant_overrides_context() {
        let reader = pod_reader(tenant_fixture());
        let ctx = RequestContext::with_tenant("t1");
        let got = reader
            .list::<DynamicObject>(&ctx, &ListQuery::new().in_tenant("t2").in_namespace("ns"))
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(owner(&got[0]), Some("t2"));
    }

    #[test]
    fn test_concurrent_readers() {
        let reader = Arc::new(pod_reader(fixture()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reader = Arc::clone(&reader);
                std::thread::spawn(move || {
                    let ctx = RequestContext::new();
                    for _ in 0..100 {
                        let got = reader
                            .list::<DynamicObject>(&ctx, &ListQuery::new().in_namespace("ns1"))
                            .unwrap();
                        assert_eq!(got.len(), 2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
