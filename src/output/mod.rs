// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod json;
mod table;
mod yaml;

pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use k8scache::cache::{CacheObject, labels_of};
use serde_json::{Map, Value};

use crate::cli::OutputFormat;

/// Columns shown for cached objects
pub const OBJECT_COLUMNS: &[&str] = &["tenant", "namespace", "name", "kind", "labels"];

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn format(&self, format: &OutputFormat, no_headers: bool) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self, no_headers),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    /// Rows keyed by column name, in column order
    pub fn to_json_rows(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, val)| (col.clone(), Value::String(val.clone())))
                    .collect()
            })
            .collect()
    }
}

/// Build a result with one row per object
pub fn objects_result<'a, T, I>(objects: I) -> QueryResult
where
    T: CacheObject + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let rows = objects.into_iter().map(object_row).collect();
    QueryResult {
        columns: OBJECT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

fn object_row<T: CacheObject>(obj: &T) -> Vec<String> {
    let kind = obj.gvk().map(|g| g.kind).unwrap_or_default();
    let Some(meta) = obj.metadata() else {
        return vec![String::new(), String::new(), String::new(), kind, String::new()];
    };
    let labels = labels_of(meta)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    vec![
        obj.tenant().unwrap_or_default().to_string(),
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
        kind,
        labels,
    ]
}
