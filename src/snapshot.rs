// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Snapshot loading
//!
//! A snapshot is a YAML or JSON file holding Kubernetes objects, in any of the
//! shapes `kubectl get -o yaml|json` produces:
//! - a single object
//! - a list of objects
//! - a `kind: List` (or `PodList`, ...) document with `items`
//! - several YAML documents separated by `---`
//!
//! Loaded objects are filtered to one resource type and put into a
//! [`ThreadSafeIndexer`] with the configured field indices.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use kube::api::{DynamicObject, GroupVersionKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheObject, ThreadSafeIndexer};

/// Build a `GroupVersionKind` from an `apiVersion` string and a kind
pub fn parse_gvk(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

/// Read and parse a snapshot file
pub fn load(path: &Path) -> Result<Vec<DynamicObject>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse snapshot file: {}", path.display()))
}

/// Parse snapshot content, detecting JSON by its first character
pub fn parse(content: &str) -> Result<Vec<DynamicObject>> {
    let trimmed = content.trim_start();
    let documents: Vec<Value> = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        vec![serde_json::from_str(trimmed).context("Invalid JSON")?]
    } else {
        serde_yaml::Deserializer::from_str(content)
            .map(Value::deserialize)
            .collect::<Result<_, _>>()
            .context("Invalid YAML")?
    };

    let mut objects = Vec::new();
    for document in documents {
        flatten_into(document, &mut objects)?;
    }
    Ok(objects)
}

fn flatten_into(document: Value, out: &mut Vec<DynamicObject>) -> Result<()> {
    match document {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
            Ok(())
        }
        Value::Object(mut map) if is_list_kind(&map) => {
            if let Some(Value::Array(items)) = map.remove("items") {
                for item in items {
                    flatten_into(item, out)?;
                }
            }
            Ok(())
        }
        Value::Object(_) => {
            let obj: DynamicObject =
                serde_json::from_value(document).context("Document is not a Kubernetes object")?;
            out.push(obj);
            Ok(())
        }
        other => bail!("Unexpected top-level value in snapshot: {}", other),
    }
}

fn is_list_kind(map: &serde_json::Map<String, Value>) -> bool {
    let kind_is_list = map
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|k| k.ends_with("List"));
    kind_is_list && map.get("items").is_some_and(Value::is_array)
}

/// Keep the objects of one resource type.
///
/// Objects without `apiVersion`/`kind` (as list items sometimes are) are
/// assumed to be of the requested type and get it stamped on.
pub fn of_kind(objects: Vec<DynamicObject>, gvk: &GroupVersionKind) -> Vec<DynamicObject> {
    objects
        .into_iter()
        .filter_map(|mut obj| match obj.gvk() {
            Some(found) if &found == gvk => Some(obj),
            Some(found) => {
                debug!(
                    name = ?obj.metadata.name,
                    kind = %found.kind,
                    "skipping object of another type"
                );
                None
            }
            None => {
                obj.set_gvk(gvk);
                Some(obj)
            }
        })
        .collect()
}

/// Create an indexer holding `objects`, with one field index per path
pub fn build_indexer(
    objects: Vec<DynamicObject>,
    field_indices: &[String],
) -> Result<ThreadSafeIndexer> {
    let indexer = ThreadSafeIndexer::new();
    for path in field_indices {
        indexer.add_default_field_index(path.clone());
    }

    let total = objects.len();
    let mut skipped = 0usize;
    for obj in objects {
        if obj.metadata.name.is_none() {
            warn!("skipping snapshot object without metadata.name");
            skipped += 1;
            continue;
        }
        indexer
            .add(Arc::new(obj))
            .context("Failed to add object to cache")?;
    }

    debug!(total, skipped, stored = indexer.len(), "snapshot loaded");
    Ok(indexer)
}
