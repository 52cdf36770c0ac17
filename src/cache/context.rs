// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Request-scoped context
//!
//! The reader's core operations take the tenant as an explicit parameter.
//! [`RequestContext`] is the boundary adapter: it carries whatever tenant the
//! incoming request was scoped to and resolves the effective tenant once.

use super::keys::Tenant;

/// Ambient data of one incoming request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    tenant: Option<Tenant>,
}

impl RequestContext {
    /// Context with no ambient tenant
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(tenant: impl Into<Tenant>) -> Self {
        Self {
            tenant: Some(tenant.into()),
        }
    }

    /// The ambient tenant, if the request carries a non-empty one
    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref().and_then(Tenant::non_empty)
    }

    /// Effective tenant for a call: the explicit one when present and
    /// non-empty, otherwise the ambient one.
    ///
    /// An explicitly empty tenant does not mean "all tenants"; it defers to the
    /// context like an absent one.
    pub fn resolve_tenant<'a>(&'a self, explicit: Option<&'a Tenant>) -> Option<&'a Tenant> {
        explicit
            .and_then(Tenant::non_empty)
            .or_else(|| self.tenant())
    }
}
