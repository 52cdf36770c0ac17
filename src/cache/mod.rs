// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Read-only query layer over an indexed object cache

mod context;
mod copy_policy;
pub mod field_selectors;
mod indexer;
pub mod keys;
pub mod label_selectors;
mod object;
mod planner;
mod reader;

pub use context::RequestContext;
pub use copy_policy::{Cached, CopyPolicy};
pub use field_selectors::FieldSelector;
pub use indexer::{FieldExtractor, Indexer, ThreadSafeIndexer, store_key_for};
pub use keys::{IndexName, ObjectKey, Tenant};
pub use label_selectors::LabelSelector;
pub use object::{AsAny, CacheObject, StoredObject, TENANT_ANNOTATION, labels_of};
pub use planner::{IndexPlan, ListQuery, QueryPlanner};
pub use reader::CacheReader;
