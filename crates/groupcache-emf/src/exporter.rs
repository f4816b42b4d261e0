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

//! Export scheduler
//!
//! An [`Exporter`] owns one background task. Every interval the task lists
//! the cache groups, turns their cumulative statistics into interval deltas,
//! accumulates one [`MetricBatch`] and flushes it once to the sink.
//!
//! The previous snapshot of each group lives inside that task and nowhere
//! else, so independent exporters never share state.
//!
//! Shutdown is a cancellation token observed between passes: a pass already
//! running always completes, and no new pass starts once the token is seen.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::delta::{compute_delta, CacheTypeDelta};
use crate::dimensions::{DimensionBuilder, Dimensions, HostnameTag};
use crate::emf::{MetricBatch, MetricDefinition, Unit};
use crate::error::ExporterResult;
use crate::options::ExporterOptions;
use crate::sink::{CloudWatchConfig, CloudWatchSink, MetricSink, StreamSink};
use crate::stats::{CacheType, GroupSnapshot, GroupSource, GroupStatistics};

/// Gets
pub const METRIC_GETS: MetricDefinition = MetricDefinition::count("gets");
/// Hits
pub const METRIC_HITS: MetricDefinition = MetricDefinition::count("hits");
/// Slowest peer fetch, a gauge
pub const METRIC_GET_FROM_PEERS_LATENCY_LOWER: MetricDefinition = MetricDefinition::with_unit(
    "get_from_peers_latency_slowest_milliseconds",
    Unit::Milliseconds,
);
/// Loads served by peers
pub const METRIC_PEER_LOADS: MetricDefinition = MetricDefinition::count("peer_loads");
/// Failed peer fetches
pub const METRIC_PEER_ERRORS: MetricDefinition = MetricDefinition::count("peer_errors");
/// Loads after cache misses
pub const METRIC_LOADS: MetricDefinition = MetricDefinition::count("loads");
/// Loads after deduplication
pub const METRIC_LOADS_DEDUPED: MetricDefinition = MetricDefinition::count("loads_deduped");
/// Successful local loads
pub const METRIC_LOCAL_LOADS: MetricDefinition = MetricDefinition::count("local_load");
/// Failed local loads
pub const METRIC_LOCAL_LOAD_ERRS: MetricDefinition = MetricDefinition::count("local_load_errs");
/// Requests received from peers
pub const METRIC_SERVER_REQUESTS: MetricDefinition = MetricDefinition::count("server_requests");
/// Requests refused for another owner
pub const METRIC_CROSSTALK_REFUSALS: MetricDefinition =
    MetricDefinition::count("crosstalk_refusals");

/// Items in a partition, a gauge
pub const METRIC_CACHE_ITEMS: MetricDefinition = MetricDefinition::count("cache_items");
/// Bytes in a partition, a gauge
pub const METRIC_CACHE_BYTES: MetricDefinition =
    MetricDefinition::with_unit("cache_bytes", Unit::Bytes);
/// Partition gets
pub const METRIC_CACHE_GETS: MetricDefinition = MetricDefinition::count("cache_gets");
/// Partition hits
pub const METRIC_CACHE_HITS: MetricDefinition = MetricDefinition::count("cache_hits");
/// Partition evictions
pub const METRIC_CACHE_EVICTIONS: MetricDefinition = MetricDefinition::count("cache_evictions");
/// Partition evictions of unexpired entries
pub const METRIC_CACHE_EVICTIONS_NONEXPIRED: MetricDefinition =
    MetricDefinition::count("cache_evictions_nonexpired");

/// Metrics recorded once per group
pub const GROUP_METRICS: [MetricDefinition; 11] = [
    METRIC_GETS,
    METRIC_HITS,
    METRIC_GET_FROM_PEERS_LATENCY_LOWER,
    METRIC_PEER_LOADS,
    METRIC_PEER_ERRORS,
    METRIC_LOADS,
    METRIC_LOADS_DEDUPED,
    METRIC_LOCAL_LOADS,
    METRIC_LOCAL_LOAD_ERRS,
    METRIC_SERVER_REQUESTS,
    METRIC_CROSSTALK_REFUSALS,
];

/// Metrics recorded once per group and partition
pub const CACHE_TYPE_METRICS: [MetricDefinition; 6] = [
    METRIC_CACHE_ITEMS,
    METRIC_CACHE_BYTES,
    METRIC_CACHE_GETS,
    METRIC_CACHE_HITS,
    METRIC_CACHE_EVICTIONS,
    METRIC_CACHE_EVICTIONS_NONEXPIRED,
];

/// Records emitted per group
pub const RECORDS_PER_GROUP: usize =
    GROUP_METRICS.len() + CACHE_TYPE_METRICS.len() * CacheType::ALL.len();

/// Handle to a running exporter
///
/// Dropping the handle signals the background task like
/// [`Exporter::close`] without waiting for it; use [`Exporter::shutdown`]
/// to wait for the pass in flight.
#[derive(Debug)]
pub struct Exporter {
    options: ExporterOptions,
    cancel: CancellationToken,
    closed: AtomicBool,
    worker: Option<JoinHandle<()>>,
}

impl Exporter {
    /// Create an exporter and start its background task.
    ///
    /// With `aws_config` set the CloudWatch Logs sink is prepared first and
    /// any setup error is returned before the task starts. Otherwise EMF
    /// documents go to stdout.
    ///
    /// Must be called within a tokio runtime.
    pub async fn new(
        options: ExporterOptions,
        source: impl GroupSource + 'static,
    ) -> ExporterResult<Self> {
        let options = options.resolve()?;

        let sink: Box<dyn MetricSink> = match &options.aws_config {
            Some(sdk_config) => {
                let config = CloudWatchConfig {
                    log_group: options.log_group_name(),
                    log_stream: options.application.clone(),
                    retention_in_days: options.retention_in_days,
                };
                Box::new(CloudWatchSink::new(sdk_config, config).await?)
            }
            None => Box::new(StreamSink::stdout()),
        };

        Ok(Self::start(options, Box::new(source), sink))
    }

    /// Create an exporter delivering to a caller-provided sink.
    ///
    /// `aws_config` is ignored. Must be called within a tokio runtime.
    pub fn with_sink(
        options: ExporterOptions,
        source: impl GroupSource + 'static,
        sink: impl MetricSink + 'static,
    ) -> ExporterResult<Self> {
        let options = options.resolve()?;
        Ok(Self::start(options, Box::new(source), Box::new(sink)))
    }

    fn start(
        options: ExporterOptions,
        source: Box<dyn GroupSource>,
        sink: Box<dyn MetricSink>,
    ) -> Self {
        let hostname = if options.enable_hostname_tag {
            HostnameTag::resolve(options.hostname_tag_key.clone())
        } else {
            None
        };

        let worker = ExportWorker {
            namespace: options.namespace.clone(),
            debug: options.debug,
            evict_stale_groups: options.evict_stale_groups,
            dimensions: DimensionBuilder::new(options.application.clone(), hostname),
            source,
            sink,
            previous: HashMap::new(),
        };

        info!(
            application = %options.application,
            namespace = %options.namespace,
            interval_secs = options.export_interval.as_secs_f64(),
            sink = worker.sink.name(),
            "starting groupcache exporter"
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(options.export_interval, cancel.clone()));

        Exporter {
            options,
            cancel,
            closed: AtomicBool::new(false),
            worker: Some(handle),
        }
    }

    /// Effective options, defaults applied
    pub fn options(&self) -> &ExporterOptions {
        &self.options
    }

    /// Signal the background task to stop.
    ///
    /// Returns immediately. A pass in flight completes; no further pass
    /// starts. Calling it again is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("exporter already closed");
            return;
        }
        self.cancel.cancel();
        info!(application = %self.options.application, "groupcache exporter closing");
    }

    /// Whether close has been requested
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close and wait for the background task to finish its current pass
    pub async fn shutdown(mut self) -> ExporterResult<()> {
        self.close();
        if let Some(handle) = self.worker.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Outcome of one export pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassSummary {
    pub groups: usize,
    pub records: usize,
    pub delivered: bool,
}

/// State owned by the background task
struct ExportWorker {
    namespace: String,
    debug: bool,
    evict_stale_groups: bool,
    dimensions: DimensionBuilder,
    source: Box<dyn GroupSource>,
    sink: Box<dyn MetricSink>,
    previous: HashMap<String, GroupSnapshot>,
}

impl ExportWorker {
    async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let summary = self.export_once().await;
            debug!(
                groups = summary.groups,
                records = summary.records,
                delivered = summary.delivered,
                "export pass finished"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("groupcache exporter stopped");
    }

    /// Collect every group, then flush the batch once
    async fn export_once(&mut self) -> PassSummary {
        let groups = self.source.list_groups();
        let mut batch = MetricBatch::new();
        let mut seen = HashSet::with_capacity(groups.len());

        for group in &groups {
            self.export_group(&mut batch, group.as_ref());
            seen.insert(group.name().to_string());
        }

        if self.evict_stale_groups {
            self.previous.retain(|name, _| {
                let keep = seen.contains(name);
                if !keep {
                    debug!(group = %name, "forgetting stale group");
                }
                keep
            });
        }

        let records = batch.len();
        let delivered = match self.sink.flush(&batch).await {
            Ok(()) => true,
            Err(e) => {
                error!(sink = self.sink.name(), error = %e, "groupcache export error");
                false
            }
        };

        PassSummary {
            groups: groups.len(),
            records,
            delivered,
        }
    }

    fn export_group(&mut self, batch: &mut MetricBatch, group: &dyn GroupStatistics) {
        let name = group.name();
        let stats = group.collect();

        if self.debug {
            info!(group = %name, stats = ?stats, "export group");
        }

        let delta = compute_delta(self.previous.get(name), &stats);
        let dimensions = self.dimensions.group(name);
        let ns = self.namespace.as_str();

        batch.record(ns, METRIC_GETS, &dimensions, delta.gets);
        batch.record(ns, METRIC_HITS, &dimensions, delta.hits);
        batch.record(
            ns,
            METRIC_GET_FROM_PEERS_LATENCY_LOWER,
            &dimensions,
            delta.get_from_peers_latency_lower,
        );
        batch.record(ns, METRIC_PEER_LOADS, &dimensions, delta.peer_loads);
        batch.record(ns, METRIC_PEER_ERRORS, &dimensions, delta.peer_errors);
        batch.record(ns, METRIC_LOADS, &dimensions, delta.loads);
        batch.record(ns, METRIC_LOADS_DEDUPED, &dimensions, delta.loads_deduped);
        batch.record(ns, METRIC_LOCAL_LOADS, &dimensions, delta.local_loads);
        batch.record(ns, METRIC_LOCAL_LOAD_ERRS, &dimensions, delta.local_load_errs);
        batch.record(ns, METRIC_SERVER_REQUESTS, &dimensions, delta.server_requests);
        batch.record(ns, METRIC_CROSSTALK_REFUSALS, &dimensions, delta.crosstalk_refusals);

        for cache_type in CacheType::ALL {
            let dimensions = self.dimensions.cache_type(name, cache_type);
            export_cache_type(batch, ns, &dimensions, delta.cache_type(cache_type));
        }

        // save for next collection
        self.previous.insert(name.to_string(), stats);
    }
}

fn export_cache_type(
    batch: &mut MetricBatch,
    ns: &str,
    dimensions: &Dimensions,
    delta: &CacheTypeDelta,
) {
    batch.record(ns, METRIC_CACHE_ITEMS, dimensions, delta.items);
    batch.record(ns, METRIC_CACHE_BYTES, dimensions, delta.bytes);
    batch.record(ns, METRIC_CACHE_GETS, dimensions, delta.gets);
    batch.record(ns, METRIC_CACHE_HITS, dimensions, delta.hits);
    batch.record(ns, METRIC_CACHE_EVICTIONS, dimensions, delta.evictions);
    batch.record(
        ns,
        METRIC_CACHE_EVICTIONS_NONEXPIRED,
        dimensions,
        delta.evictions_nonexpired,
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::emf::{MetricRecord, MetricValue};
    use crate::sink::MemorySink;
    use crate::stats::{CacheTypeSnapshot, StaticGroup};
    use std::sync::Arc;

    fn worker(source: impl GroupSource + 'static, sink: MemorySink) -> ExportWorker {
        ExportWorker {
            namespace: "groupcache".to_string(),
            debug: false,
            evict_stale_groups: false,
            dimensions: DimensionBuilder::new("app1", None),
            source: Box::new(source),
            sink: Box::new(sink),
            previous: HashMap::new(),
        }
    }

    fn source_of(groups: Vec<Arc<StaticGroup>>) -> impl GroupSource + 'static {
        move || -> Vec<Arc<dyn GroupStatistics>> {
            groups
                .iter()
                .map(|g| Arc::clone(g) as Arc<dyn GroupStatistics>)
                .collect()
        }
    }

    fn find<'a>(
        records: &'a [MetricRecord],
        group: &str,
        cache_type: Option<&str>,
        metric: &str,
    ) -> &'a MetricRecord {
        records
            .iter()
            .find(|r| {
                r.metric.name == metric
                    && r.dimensions["group"] == group
                    && r.dimensions.get("type").map(String::as_str) == cache_type
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_baseline_then_delta() {
        let g1 = Arc::new(StaticGroup::new(
            "g1",
            GroupSnapshot {
                gets: 10,
                hits: 5,
                ..Default::default()
            },
        ));
        let sink = MemorySink::new();
        let mut worker = worker(source_of(vec![Arc::clone(&g1)]), sink.clone());

        worker.export_once().await;
        g1.set(GroupSnapshot {
            gets: 15,
            hits: 8,
            ..Default::default()
        });
        worker.export_once().await;

        let batches = sink.batches().await;
        assert_eq!(batches.len(), 2);

        let first = batches[0].records();
        assert_eq!(find(first, "g1", None, "gets").value, MetricValue::Int(10));
        assert_eq!(find(first, "g1", None, "hits").value, MetricValue::Int(5));

        let second = batches[1].records();
        assert_eq!(find(second, "g1", None, "gets").value, MetricValue::Int(5));
        assert_eq!(find(second, "g1", None, "hits").value, MetricValue::Int(3));
    }

    #[tokio::test]
    async fn test_gauges_are_not_differenced() {
        let snapshot = |items, bytes| GroupSnapshot {
            main: CacheTypeSnapshot {
                items,
                bytes,
                ..Default::default()
            },
            ..Default::default()
        };
        let g1 = Arc::new(StaticGroup::new("g1", snapshot(100, 4096)));
        let sink = MemorySink::new();
        let mut worker = worker(source_of(vec![Arc::clone(&g1)]), sink.clone());

        worker.export_once().await;
        g1.set(snapshot(90, 3700));
        worker.export_once().await;

        let batches = sink.batches().await;
        let first = batches[0].records();
        assert_eq!(find(first, "g1", Some("main"), "cache_items").value, MetricValue::Int(100));
        assert_eq!(find(first, "g1", Some("main"), "cache_bytes").value, MetricValue::Int(4096));

        let second = batches[1].records();
        assert_eq!(find(second, "g1", Some("main"), "cache_items").value, MetricValue::Int(90));
        assert_eq!(find(second, "g1", Some("main"), "cache_bytes").value, MetricValue::Int(3700));
    }

    #[tokio::test]
    async fn test_one_flush_per_pass() {
        let groups = vec![
            Arc::new(StaticGroup::new("g1", GroupSnapshot::default())),
            Arc::new(StaticGroup::new("g2", GroupSnapshot::default())),
            Arc::new(StaticGroup::new("g3", GroupSnapshot::default())),
        ];
        let sink = MemorySink::new();
        let mut worker = worker(source_of(groups), sink.clone());

        let summary = worker.export_once().await;

        assert_eq!(sink.attempts(), 1);
        assert_eq!(summary.groups, 3);
        assert_eq!(summary.records, 3 * RECORDS_PER_GROUP);
        assert!(summary.delivered);
    }

    #[tokio::test]
    async fn test_record_dimensions() {
        let g1 = Arc::new(StaticGroup::new("g1", GroupSnapshot::default()));
        let sink = MemorySink::new();
        let mut worker = worker(source_of(vec![g1]), sink.clone());

        worker.export_once().await;

        let batches = sink.batches().await;
        let records = batches[0].records();
        assert_eq!(records.len(), RECORDS_PER_GROUP);

        for record in records {
            assert_eq!(record.namespace, "groupcache");
            assert_eq!(record.dimensions["application"], "app1");
            assert_eq!(record.dimensions["group"], "g1");
            assert!(!record.dimensions.contains_key("pod_name"));
        }

        let typed: Vec<&str> = records
            .iter()
            .filter_map(|r| r.dimensions.get("type").map(String::as_str))
            .collect();
        assert_eq!(typed.iter().filter(|t| **t == "main").count(), 6);
        assert_eq!(typed.iter().filter(|t| **t == "hot").count(), 6);
    }

    #[tokio::test]
    async fn test_hostname_dimension() {
        let g1 = Arc::new(StaticGroup::new("g1", GroupSnapshot::default()));
        let sink = MemorySink::new();
        let mut worker = worker(source_of(vec![g1]), sink.clone());
        worker.dimensions = DimensionBuilder::new(
            "app1",
            Some(HostnameTag {
                key: "pod_name".to_string(),
                value: "pod-1".to_string(),
            }),
        );

        worker.export_once().await;

        let batches = sink.batches().await;
        assert!(batches[0]
            .records()
            .iter()
            .all(|r| r.dimensions["pod_name"] == "pod-1"));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_state() {
        let g1 = Arc::new(StaticGroup::new(
            "g1",
            GroupSnapshot {
                gets: 10,
                ..Default::default()
            },
        ));
        let sink = MemorySink::new();
        sink.fail_next(1);
        let mut worker = worker(source_of(vec![Arc::clone(&g1)]), sink.clone());

        let summary = worker.export_once().await;
        assert!(!summary.delivered);

        g1.set(GroupSnapshot {
            gets: 25,
            ..Default::default()
        });
        let summary = worker.export_once().await;
        assert!(summary.delivered);

        // deltas follow the observed snapshots, not what was delivered
        let batches = sink.batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(find(batches[0].records(), "g1", None, "gets").value, MetricValue::Int(15));
    }

    #[tokio::test]
    async fn test_stale_groups_retained_by_default() {
        let g1 = Arc::new(StaticGroup::new("g1", GroupSnapshot::default()));
        let present = Arc::new(AtomicBool::new(true));
        let source = {
            let present = Arc::clone(&present);
            move || {
                if present.load(Ordering::SeqCst) {
                    vec![Arc::clone(&g1) as Arc<dyn GroupStatistics>]
                } else {
                    Vec::new()
                }
            }
        };
        let mut worker = worker(source, MemorySink::new());

        worker.export_once().await;
        present.store(false, Ordering::SeqCst);
        worker.export_once().await;
        assert!(worker.previous.contains_key("g1"));

        worker.evict_stale_groups = true;
        worker.export_once().await;
        assert!(worker.previous.is_empty());
    }

    #[tokio::test]
    async fn test_debug_mode_still_exports() {
        let g1 = Arc::new(StaticGroup::new("g1", GroupSnapshot::default()));
        let sink = MemorySink::new();
        let mut worker = worker(source_of(vec![g1]), sink.clone());
        worker.debug = true;

        let summary = worker.export_once().await;
        assert_eq!(summary.records, RECORDS_PER_GROUP);
    }

    #[tokio::test]
    async fn test_empty_source_flushes_empty_batch() {
        let sink = MemorySink::new();
        let mut worker = worker(Vec::<Arc<dyn GroupStatistics>>::new, sink.clone());

        let summary = worker.export_once().await;
        assert_eq!(summary.groups, 0);
        assert_eq!(sink.attempts(), 1);
        assert!(sink.batches().await[0].is_empty());
    }

    #[tokio::test]
    async fn test_with_sink_requires_application() {
        let err = Exporter::with_sink(
            ExporterOptions::default(),
            Vec::<Arc<dyn GroupStatistics>>::new,
            MemorySink::new(),
        )
            .unwrap_err();
        assert!(matches!(err, crate::error::ExporterError::MissingApplication));
    }
}
