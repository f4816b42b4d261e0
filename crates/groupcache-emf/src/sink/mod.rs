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

//! Metric sinks
//!
//! A sink receives the finalized batch of one export pass. The exporter
//! flushes exactly once per pass and never retries; a failed flush is logged
//! and the next pass proceeds, catching up through the cumulative snapshots.
//!
//! Built-in sinks:
//! - [`StreamSink`]: EMF documents written one per line to stdout or any writer
//! - [`CloudWatchSink`]: EMF documents pushed as CloudWatch Logs events
//! - [`MemorySink`]: in-memory capture for tests

pub mod cloudwatch;
pub mod memory;
pub mod stream;

use async_trait::async_trait;
use std::fmt::Debug;

use crate::emf::MetricBatch;
use crate::error::SinkResult;

pub use cloudwatch::{CloudWatchConfig, CloudWatchSink};
pub use memory::MemorySink;
pub use stream::StreamSink;

/// Delivery target for metric batches
///
/// Implementations must be `Send + Sync` so the exporter can own them inside
/// its background task.
#[async_trait]
pub trait MetricSink: Send + Sync + Debug {
    /// Short name used in log fields
    fn name(&self) -> &'static str;

    /// Deliver one batch
    ///
    /// Called once per export pass, also when the batch is empty.
    async fn flush(&self, batch: &MetricBatch) -> SinkResult<()>;
}
