// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use kube::api::DynamicObject;
use kube::discovery::Scope;
use tracing::info;
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use k8scache::cache::{
    CacheReader, CopyPolicy, FieldSelector, LabelSelector, ListQuery, ObjectKey, QueryPlanner,
    RequestContext, ThreadSafeIndexer,
};
use k8scache::{config, snapshot};

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping up to 5 files
    let log_path = log_dir.join("k8scache.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(guard);

    let filter = if verbose { "k8scache=debug" } else { "k8scache=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = config::Config::load()?;

    // Config default tenant is the ambient one; --tenant is passed explicitly
    // per call and wins over it
    let ctx = match &config.default_tenant {
        Some(tenant) => RequestContext::with_tenant(tenant.clone()),
        None => RequestContext::new(),
    };
    let tenant = args.tenant.clone();

    let copy_policy = if args.aliased {
        CopyPolicy::Aliased
    } else {
        config.copy_policy
    };

    let reader = build_reader(&args, &config)?.with_copy_policy(copy_policy);

    match &args.command {
        Command::Get { name, namespace } => {
            let mut key = ObjectKey::new(namespace.clone().unwrap_or_default(), name.clone());
            if let Some(t) = &tenant {
                key = key.in_tenant(t.clone());
            }
            let obj = reader.get::<DynamicObject>(&ctx, &key)?;
            let result = output::objects_result([&*obj]);
            println!("{}", result.format(&args.output, args.no_headers));
        }
        Command::List {
            namespace,
            selector,
            field_selector,
            limit,
            explain,
        } => {
            let mut query = ListQuery::new();
            query.tenant = tenant;
            query.namespace = namespace.clone();
            query.limit = *limit;
            if let Some(s) = selector {
                let parsed: LabelSelector = s
                    .parse()
                    .with_context(|| format!("Invalid label selector: {}", s))?;
                query = query.matching_labels(parsed);
            }
            if let Some(s) = field_selector {
                let parsed: FieldSelector = s
                    .parse()
                    .with_context(|| format!("Invalid field selector: {}", s))?;
                query = query.matching_fields(parsed);
            }

            if *explain {
                let effective = ctx.resolve_tenant(query.tenant.as_ref());
                let plan = QueryPlanner::new().plan(effective, &query)?;
                println!("{}", plan);
                return Ok(());
            }

            let objects = reader.list::<DynamicObject>(&ctx, &query)?;
            let result = output::objects_result(objects.iter().map(|o| &**o));
            println!("{}", result.format(&args.output, args.no_headers));
        }
    }

    Ok(())
}

fn build_reader(args: &Args, config: &config::Config) -> Result<CacheReader<ThreadSafeIndexer>> {
    let gvk = snapshot::parse_gvk(&args.api_version, &args.kind);
    let scope = if args.cluster_scoped {
        Scope::Cluster
    } else {
        Scope::Namespaced
    };

    let objects = snapshot::load(&args.snapshot)?;
    let objects = snapshot::of_kind(objects, &gvk);
    let indexer = snapshot::build_indexer(objects, &config.field_indices)?;
    info!(
        snapshot = %args.snapshot.display(),
        kind = %gvk.kind,
        objects = indexer.len(),
        "cache populated"
    );

    Ok(CacheReader::new(indexer, gvk, scope))
}
