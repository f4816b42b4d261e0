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

//! Local stream sink
//!
//! Fallback used when no AWS configuration is supplied. Each EMF document is
//! written as one JSON line, which is also the format the CloudWatch agent
//! and Lambda runtimes pick up from stdout.

use async_trait::async_trait;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use super::MetricSink;
use crate::emf::MetricBatch;
use crate::error::{SinkError, SinkResult};

/// Writes EMF documents to a stream
pub struct StreamSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StreamSink {
    /// Sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Sink writing to an arbitrary writer
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        StreamSink {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

#[async_trait]
impl MetricSink for StreamSink {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn flush(&self, batch: &MetricBatch) -> SinkResult<()> {
        let lines = batch.to_json_lines()?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::other(anyhow::anyhow!("stream writer lock poisoned")))?;
        for line in &lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dimensions::Dimensions;
    use crate::emf::MetricDefinition;
    use std::sync::Arc;

    /// Writer sharing its buffer with the test
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_document() {
        let buf = SharedBuf::default();
        let sink = StreamSink::new(buf.clone());

        let mut g1 = Dimensions::new();
        g1.insert("group".to_string(), "g1".to_string());
        let mut g2 = Dimensions::new();
        g2.insert("group".to_string(), "g2".to_string());

        let mut batch = MetricBatch::new();
        batch.record("groupcache", MetricDefinition::count("gets"), &g1, 1i64);
        batch.record("groupcache", MetricDefinition::count("gets"), &g2, 2i64);

        sink.flush(&batch).await.unwrap();

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let doc: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["group"], "g2");
        assert_eq!(doc["gets"], 2);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let buf = SharedBuf::default();
        let sink = StreamSink::new(buf.clone());

        sink.flush(&MetricBatch::new()).await.unwrap();
        assert!(buf.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let sink = StreamSink::new(BrokenWriter);
        let mut batch = MetricBatch::new();
        batch.record("groupcache", MetricDefinition::count("gets"), &Dimensions::new(), 1i64);

        let err = sink.flush(&batch).await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
