// groupcache-emf - CloudWatch EMF exporter for groupcache statistics
// Copyright (C) 2025 groupcache-emf Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//! Demo program for the groupcache EMF exporter.
//!
//! Queries two simulated cache groups every few seconds while the exporter
//! publishes their statistics.

mod demo;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::Parser;
use demo::FileGroup;
use groupcache_emf::{Exporter, ExporterOptions, GroupStatistics};
use groupcache_emf_config::{
    CloudWatchSettings, Config, ConfigLoader, ExporterSettings, Validator,
};
use groupcache_emf_observability::{init_tracing_with_config, LogConfig, LogFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const QUERY_INTERVAL: Duration = Duration::from_secs(5);
const DEMO_INTERVAL_SECS: u64 = 20;

#[derive(Parser)]
#[command(name = "groupcache-emf-demo")]
#[command(version, about = "Export simulated groupcache statistics as CloudWatch EMF")]
#[command(
    long_about = "Runs two simulated cache groups, queries them on a loop and exports \
their statistics as CloudWatch Embedded Metric Format documents, either to stdout \
or to CloudWatch Logs with --send."
)]
#[command(author = "groupcache-emf Contributors")]
struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Application name used for dimensions, log group and log stream
    #[arg(short, long)]
    application: Option<String>,

    /// Send metrics to CloudWatch Logs instead of stdout
    #[arg(long)]
    send: bool,

    /// Log every group's statistics on each export pass
    #[arg(long)]
    debug_exporter: bool,

    /// Export interval in seconds
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Add the hostname as a dimension
    #[arg(long)]
    enable_hostname_tag: bool,

    /// Log format (pretty|compact|json)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli).await?;
    init_logging(&config, cli.verbose)?;

    let sdk_config = if config.cloudwatch.enabled {
        Some(load_aws_config(&config.cloudwatch).await)
    } else {
        None
    };

    let caches = [
        Arc::new(FileGroup::new("files", 64, 4)),
        Arc::new(FileGroup::new("files-small", 16, 2)),
    ];

    let groups: Vec<Arc<dyn GroupStatistics>> = caches
        .iter()
        .map(|cache| Arc::clone(cache) as Arc<dyn GroupStatistics>)
        .collect();
    let source = move || groups.clone();

    let mut options = exporter_options(&config.exporter);
    if let Some(sdk_config) = sdk_config {
        options = options.with_aws_config(sdk_config);
    }

    let exporter = Exporter::new(options, source)
        .await
        .context("failed to start exporter")?;

    info!(
        application = %exporter.options().application,
        send = config.cloudwatch.enabled,
        "demo running, press Ctrl-C to stop"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(QUERY_INTERVAL);
    let mut round: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupt received, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let fake_key = format!("fake-{}", round);
                for cache in &caches {
                    // repeat key, then a key that always misses and gets evicted
                    query(cache, "/etc/passwd").await;
                    query(cache, &fake_key).await;
                }
                round += 1;
            }
        }
    }

    exporter.shutdown().await.context("exporter did not stop cleanly")?;
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = ConfigLoader::without_validation()
        .load_with_overrides(cli.config.as_ref())
        .await
        .context("failed to load configuration")?;

    apply_flags(cli, &mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Flags win over file and environment
fn apply_flags(cli: &Cli, config: &mut Config) {
    if let Some(application) = &cli.application {
        config.exporter.application = application.clone();
    }
    if config.exporter.application.trim().is_empty() {
        config.exporter.application = executable_name();
    }
    if let Some(interval) = cli.interval {
        config.exporter.export_interval_secs = interval;
    } else if cli.config.is_none() {
        config.exporter.export_interval_secs = DEMO_INTERVAL_SECS;
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    config.exporter.debug |= cli.debug_exporter;
    config.exporter.enable_hostname_tag |= cli.enable_hostname_tag;
    config.cloudwatch.enabled |= cli.send;
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let format: LogFormat = config.logging.format.parse()?;
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };

    init_tracing_with_config(LogConfig::new().with_format(format).with_level(level))?;
    Ok(())
}

async fn load_aws_config(settings: &CloudWatchSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &settings.endpoint_url {
        debug!("Using custom CloudWatch Logs endpoint: {}", endpoint);
        loader = loader.endpoint_url(endpoint);
    }
    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

fn exporter_options(settings: &ExporterSettings) -> ExporterOptions {
    let mut options = ExporterOptions::new(settings.application.clone())
        .with_export_interval(settings.export_interval())
        .with_namespace(settings.namespace.clone())
        .with_retention_in_days(settings.retention_in_days)
        .with_debug(settings.debug)
        .with_evict_stale_groups(settings.evict_stale_groups);
    if settings.enable_hostname_tag {
        options = options.with_hostname_tag(settings.hostname_tag_key.clone());
    }
    if let Some(log_group) = &settings.log_group {
        options = options.with_log_group(log_group.clone());
    }
    options
}

/// Basename of the running executable, the default application name
fn executable_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

async fn query(cache: &FileGroup, key: &str) {
    match cache.get(key).await {
        Ok(value) => debug!(group = cache.name(), key, bytes = value.len(), "cache answer"),
        Err(e) => debug!(group = cache.name(), key, error = %e, "cache answer failed"),
    }
}
