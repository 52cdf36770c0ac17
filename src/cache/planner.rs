// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Index plan selection for list queries.
//!
//! The planner looks at a list query and picks exactly one physical lookup:
//! - a field index, when a single exact-match field selector is given
//! - the namespace (or tenant+namespace) index, when a namespace is given
//! - the tenant index, or a full scan, otherwise
//!
//! Tenant scoping is applied by the index choice itself, so the candidate set
//! is narrowed to one tenant before any other filter runs. Label selectors are
//! never pushed into an index; the reader evaluates them on the candidates.

use std::fmt;

use super::field_selectors::FieldSelector;
use super::keys::{self, IndexName, Tenant};
use super::label_selectors::LabelSelector;
use crate::error::CacheError;

/// Parameters of a list call
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Explicit tenant; falls back to the request context when absent or empty
    pub tenant: Option<Tenant>,
    /// Restrict to one namespace; `None` or empty lists all namespaces
    pub namespace: Option<String>,
    /// Must be a single `field=value` requirement
    pub field_selector: Option<FieldSelector>,
    pub label_selector: Option<LabelSelector>,
    /// Advisory maximum number of results; `0` means no limit
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_tenant(mut self, tenant: impl Into<Tenant>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn matching_fields(mut self, selector: FieldSelector) -> Self {
        self.field_selector = Some(selector);
        self
    }

    pub fn matching_labels(mut self, selector: LabelSelector) -> Self {
        self.label_selector = Some(selector);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The namespace filter, treating an empty string as "all namespaces"
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Effective limit, `None` when unlimited
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&l| l > 0)
    }
}

/// The single lookup a list call performs against the indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPlan {
    /// Query one secondary index with one key
    ByIndex { index: IndexName, key: String },
    /// Unindexed full listing
    All,
}

impl fmt::Display for IndexPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPlan::ByIndex { index, key } => write!(f, "index {} key {:?}", index, key),
            IndexPlan::All => f.write_str("full scan"),
        }
    }
}

/// Chooses the index plan for list queries
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan a list query for an already-resolved tenant.
    ///
    /// Fails with `UnsupportedSelector` when a field selector is anything but a
    /// single equality requirement.
    pub fn plan(&self, tenant: Option<&Tenant>, query: &ListQuery) -> Result<IndexPlan, CacheError> {
        let tenant = tenant.and_then(Tenant::non_empty);
        let namespace = query.namespace().unwrap_or("");

        if let Some(selector) = &query.field_selector {
            return self.plan_field_selector(tenant, namespace, selector);
        }

        if !namespace.is_empty() {
            return Ok(match tenant {
                None => IndexPlan::ByIndex {
                    index: IndexName::Namespace,
                    key: namespace.to_string(),
                },
                Some(t) => IndexPlan::ByIndex {
                    index: IndexName::TenantNamespace,
                    key: keys::tenant_aware_key(t.as_str(), namespace, ""),
                },
            });
        }

        Ok(match tenant {
            None => IndexPlan::All,
            Some(t) => IndexPlan::ByIndex {
                index: IndexName::Tenant,
                key: keys::tenant_aware_key(t.as_str(), "", ""),
            },
        })
    }

    fn plan_field_selector(
        &self,
        tenant: Option<&Tenant>,
        namespace: &str,
        selector: &FieldSelector,
    ) -> Result<IndexPlan, CacheError> {
        let (field, value) = selector
            .requires_exact_match()
            .ok_or_else(|| CacheError::UnsupportedSelector(selector.to_string()))?;

        Ok(IndexPlan::ByIndex {
            index: IndexName::field(field),
            key: keys::field_index_key(tenant, namespace, value),
        })
    }
}
