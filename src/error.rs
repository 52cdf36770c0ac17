// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for cache reads and the indexer contract

use thiserror::Error;

/// Errors returned by an [`Indexer`](crate::cache::Indexer) implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexerError {
    /// The requested secondary index was never registered
    #[error("index with name {0} does not exist")]
    IndexNotFound(String),

    /// An object could not be turned into a store key
    #[error("cannot compute store key: {0}")]
    KeyFunc(String),
}

/// Errors returned by [`CacheReader`](crate::cache::CacheReader) Get and List
#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry exists for the computed store key
    #[error("{kind}{} \"{name}\" not found", group_suffix(.group))]
    NotFound {
        group: String,
        kind: String,
        name: String,
    },

    /// The stored value is not of the type the caller asked for
    #[error("cache had type {stored}, but {requested} was asked for")]
    TypeMismatch {
        stored: &'static str,
        requested: &'static str,
    },

    /// Field selector is not a single exact-match requirement
    #[error("non-exact field matches are not supported by the cache: {0}")]
    UnsupportedSelector(String),

    /// Selector text could not be parsed
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Tenant name contains the key separator
    #[error("invalid tenant {0:?}: tenant names must not contain '|'")]
    InvalidTenant(String),

    /// Candidate exposes no object metadata
    #[error("cache contained {type_name}, which has no object metadata")]
    MetadataAccess { type_name: &'static str },

    #[error(transparent)]
    Store(#[from] IndexerError),
}

impl CacheError {
    /// True for [`CacheError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

fn group_suffix(group: &str) -> String {
    if group.is_empty() {
        String::new()
    } else {
        format!(".{}", group)
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
