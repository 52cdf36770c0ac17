// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use k8scache::cache::Tenant;

#[derive(Parser, Debug)]
#[command(name = "k8scache")]
#[command(author, version, about = "Query a snapshot of Kubernetes objects through an indexed cache")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Snapshot file to load (YAML or JSON, single object, list or multi-document)
    #[arg(short, long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// API version of the resource type to serve, e.g. v1 or apps/v1
    #[arg(long, default_value = "v1")]
    pub api_version: String,

    /// Kind of the resource type to serve
    #[arg(short, long, default_value = "Pod")]
    pub kind: String,

    /// Treat the resource type as cluster-scoped
    #[arg(long)]
    pub cluster_scoped: bool,

    /// Tenant (logical cluster) to read from. Overrides default_tenant from config.
    #[arg(short, long)]
    pub tenant: Option<Tenant>,

    /// Return shared cache instances instead of copies
    #[arg(long)]
    pub aliased: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long)]
    pub no_headers: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Get a single object by name
    Get {
        name: String,

        /// Namespace of the object (ignored for cluster-scoped types)
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// List objects, optionally filtered by namespace and selectors
    List {
        /// Restrict to one namespace; all namespaces when omitted
        #[arg(short, long)]
        namespace: Option<String>,

        /// Label selector, e.g. "app=web,tier in (fe,be)"
        #[arg(short = 'l', long = "selector")]
        selector: Option<String>,

        /// Field selector; must be a single field=value requirement
        #[arg(long)]
        field_selector: Option<String>,

        /// Maximum number of objects to return (0 = unlimited)
        #[arg(long)]
        limit: Option<usize>,

        /// Print the index plan instead of the results
        #[arg(long)]
        explain: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}
