// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! k8scache: Get and List over an in-process, indexed Kubernetes object cache.
//!
//! A [`CacheReader`](cache::CacheReader) serves one resource type. It turns
//! list queries into a single index lookup (field, namespace, tenant or
//! tenant+namespace index, or a full scan), filters the candidates by label
//! selector, truncates at the requested limit and hands out either deep
//! copies or shared references depending on its [`CopyPolicy`](cache::CopyPolicy).
//!
//! ```ignore
//! let indexer = Arc::new(ThreadSafeIndexer::new());
//! indexer.add(Arc::new(pod))?;
//! let reader = CacheReader::new(indexer, GroupVersionKind::gvk("", "v1", "Pod"), Scope::Namespaced);
//! let pods = reader.list::<DynamicObject>(
//!     &RequestContext::new(),
//!     &ListQuery::new().in_namespace("default").matching_labels("app=nginx".parse()?),
//! )?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod snapshot;

pub use error::{CacheError, IndexerError};
