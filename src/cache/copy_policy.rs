// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Copy policy for objects leaving the cache

use std::any::TypeId;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use kube::api::GroupVersionKind;
use serde::{Deserialize, Serialize};

use super::object::{CacheObject, StoredObject};
use crate::error::CacheError;

/// How the reader hands out stored objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyPolicy {
    /// Every returned object is a deep copy with its type descriptor stamped
    /// with the resource's group/version/kind. Callers may mutate freely.
    #[default]
    Safe,
    /// The stored instance is returned as a shared reference, uncopied and
    /// unstamped.
    ///
    /// Precondition: callers must never mutate a returned object, including
    /// through interior mutability. Any such mutation is a mutation of the
    /// shared cache state. This is not checked.
    #[serde(alias = "unsafe")]
    Aliased,
}

impl fmt::Display for CopyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyPolicy::Safe => f.write_str("safe"),
            CopyPolicy::Aliased => f.write_str("aliased"),
        }
    }
}

/// An object returned by the reader
#[derive(Debug)]
pub enum Cached<T> {
    /// Independent deep copy owned by the caller
    Owned(T),
    /// The cache's own instance. Must be treated as read-only; see [`CopyPolicy::Aliased`].
    Shared(Arc<T>),
}

impl<T> Cached<T> {
    pub fn is_shared(&self) -> bool {
        matches!(self, Cached::Shared(_))
    }

    /// Mutable access to an owned copy; `None` for a shared instance
    pub fn as_owned_mut(&mut self) -> Option<&mut T> {
        match self {
            Cached::Owned(obj) => Some(obj),
            Cached::Shared(_) => None,
        }
    }
}

impl<T: Clone> Cached<T> {
    /// Take ownership, cloning a shared instance that the cache still holds
    pub fn into_owned(self) -> T {
        match self {
            Cached::Owned(obj) => obj,
            Cached::Shared(arc) => Arc::unwrap_or_clone(arc),
        }
    }
}

impl<T> Deref for Cached<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Cached::Owned(obj) => obj,
            Cached::Shared(arc) => arc,
        }
    }
}

/// Check that a stored object is a `T` without copying it
pub fn ensure_type<T: CacheObject>(stored: &StoredObject) -> Result<(), CacheError> {
    if stored.as_ref().type_id() == TypeId::of::<T>() {
        Ok(())
    } else {
        Err(type_mismatch::<T>(stored))
    }
}

fn type_mismatch<T: CacheObject>(stored: &StoredObject) -> CacheError {
    CacheError::TypeMismatch {
        stored: stored.as_ref().type_name(),
        requested: std::any::type_name::<T>(),
    }
}

impl CopyPolicy {
    /// Finalize a stored object for the caller.
    ///
    /// Fails with `TypeMismatch` when the stored value is not a `T`.
    pub fn apply<T: CacheObject>(
        self,
        stored: &StoredObject,
        gvk: &GroupVersionKind,
    ) -> Result<Cached<T>, CacheError> {
        ensure_type::<T>(stored)?;

        match self {
            CopyPolicy::Safe => {
                let mut copy = stored.deep_copy();
                copy.set_gvk(gvk);
                let obj = copy
                    .into_any_box()
                    .downcast::<T>()
                    .map_err(|_| type_mismatch::<T>(stored))?;
                Ok(Cached::Owned(*obj))
            }
            CopyPolicy::Aliased => {
                let obj = Arc::clone(stored)
                    .into_any_arc()
                    .downcast::<T>()
                    .map_err(|_| type_mismatch::<T>(stored))?;
                Ok(Cached::Shared(obj))
            }
        }
    }
}
