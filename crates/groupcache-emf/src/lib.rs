//! groupcache EMF exporter
//!
//! Periodically harvests cumulative groupcache statistics and publishes them
//! as interval deltas in CloudWatch Embedded Metric Format.
//!
//! # Features
//!
//! - **Delta engine**: counters reported as per-interval differences, gauges as-is
//! - **Stable dimensions**: `application`, `group`, optional hostname tag, `type`
//! - **Background scheduling**: one tokio task per exporter, one flush per pass
//! - **Pluggable sinks**: stdout, CloudWatch Logs, or your own [`MetricSink`]
//!
//! # Example
//!
//! ```ignore
//! use groupcache_emf::{Exporter, ExporterOptions, GroupStatistics};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let groups: Vec<Arc<dyn GroupStatistics>> = my_cache_groups();
//!
//!     let options = ExporterOptions::new("my-app")
//!         .with_export_interval(Duration::from_secs(20));
//!     let exporter = Exporter::new(options, move || groups.clone()).await?;
//!
//!     // ... serve traffic ...
//!
//!     exporter.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod delta;
pub mod dimensions;
pub mod emf;
pub mod error;
pub mod exporter;
pub mod options;
pub mod sink;
pub mod stats;

pub use delta::{compute_delta, CacheTypeDelta, DeltaRecord};
pub use dimensions::{is_reserved_key, DimensionBuilder, Dimensions, HostnameTag};
pub use emf::{MetricBatch, MetricDefinition, MetricRecord, MetricValue, Unit};
pub use error::{ExporterError, ExporterResult, SinkError, SinkResult};
pub use exporter::Exporter;
pub use options::ExporterOptions;
pub use sink::MetricSink;
pub use stats::{CacheType, CacheTypeSnapshot, GroupSnapshot, GroupSource, GroupStatistics};
