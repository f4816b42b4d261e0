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

//! In-memory sink for testing
//!
//! Records every flushed batch and can be told to fail upcoming flushes.
//! Clones share the same storage, so a test keeps one handle while the
//! exporter owns another.
//!
//! # Examples
//!
//! ```rust,no_run
//! use groupcache_emf::sink::{MemorySink, MetricSink};
//! use groupcache_emf::emf::MetricBatch;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = MemorySink::new();
//!     sink.fail_next(1);
//!
//!     assert!(sink.flush(&MetricBatch::new()).await.is_err());
//!     assert!(sink.flush(&MetricBatch::new()).await.is_ok());
//!     assert_eq!(sink.batches().await.len(), 1);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::MetricSink;
use crate::emf::MetricBatch;
use crate::error::{SinkError, SinkResult};

/// In-memory sink recording delivered batches
#[derive(Clone, Default)]
pub struct MemorySink {
    batches: Arc<RwLock<Vec<MetricBatch>>>,
    attempts: Arc<AtomicUsize>,
    failures_pending: Arc<AtomicUsize>,
}

impl MemorySink {
    /// Empty sink that accepts every batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` flushes fail without recording their batch
    pub fn fail_next(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Successfully delivered batches, oldest first
    pub async fn batches(&self) -> Vec<MetricBatch> {
        self.batches.read().await.clone()
    }

    /// Flush calls so far, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn flush(&self, batch: &MetricBatch) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::other(anyhow::anyhow!("injected flush failure")));
        }

        self.batches.write().await.push(batch.clone());
        Ok(())
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_records_batches() {
        let sink = MemorySink::new();
        sink.flush(&MetricBatch::new()).await.unwrap();
        sink.flush(&MetricBatch::new()).await.unwrap();

        assert_eq!(sink.batches().await.len(), 2);
        assert_eq!(sink.attempts(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let sink = MemorySink::new();
        sink.fail_next(2);

        assert_err!(sink.flush(&MetricBatch::new()).await);
        assert_err!(sink.flush(&MetricBatch::new()).await);
        assert_ok!(sink.flush(&MetricBatch::new()).await);

        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.batches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let sink = MemorySink::new();
        let handle = sink.clone();

        sink.flush(&MetricBatch::new()).await.unwrap();
        assert_eq!(handle.batches().await.len(), 1);
    }
}
