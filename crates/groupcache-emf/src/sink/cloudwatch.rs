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

//! CloudWatch Logs sink
//!
//! Pushes EMF documents as log events to a log group / log stream pair.
//! CloudWatch extracts the metrics from the `_aws` metadata of each event.
//!
//! On construction the sink makes sure the log group exists with the
//! configured retention and that the log stream exists. "Already exists"
//! answers are expected on every restart and are not errors.
//!
//! Delivery is a plain `PutLogEvents` per chunk: no retries, no buffering
//! across passes.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use std::fmt;
use tracing::{debug, info};

use super::MetricSink;
use crate::emf::MetricBatch;
use crate::error::{SinkError, SinkResult};

/// Maximum events per PutLogEvents call
pub const MAX_EVENTS_PER_CALL: usize = 10_000;
/// Maximum PutLogEvents payload, in bytes
pub const MAX_BATCH_BYTES: usize = 1_048_576;
/// Per-event overhead counted against the payload limit
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Where the sink writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudWatchConfig {
    /// Log group name
    pub log_group: String,
    /// Log stream name
    pub log_stream: String,
    /// Retention applied to the log group
    pub retention_in_days: i32,
}

/// CloudWatch Logs sink
#[derive(Clone)]
pub struct CloudWatchSink {
    client: Client,
    config: CloudWatchConfig,
}

impl CloudWatchSink {
    /// Build a client from `sdk_config` and prepare the log group and stream
    pub async fn new(sdk_config: &SdkConfig, config: CloudWatchConfig) -> SinkResult<Self> {
        Self::with_client(Client::new(sdk_config), config).await
    }

    /// Prepare the log group and stream using an existing client
    pub async fn with_client(client: Client, config: CloudWatchConfig) -> SinkResult<Self> {
        let sink = CloudWatchSink { client, config };
        sink.ensure_log_group().await?;
        sink.ensure_retention().await?;
        sink.ensure_log_stream().await?;

        info!(
            log_group = %sink.config.log_group,
            log_stream = %sink.config.log_stream,
            retention_in_days = sink.config.retention_in_days,
            "cloudwatch logs sink ready"
        );
        Ok(sink)
    }

    /// Target log group and stream
    pub fn config(&self) -> &CloudWatchConfig {
        &self.config
    }

    async fn ensure_log_group(&self) -> SinkResult<()> {
        match self
            .client
            .create_log_group()
            .log_group_name(&self.config.log_group)
            .send()
            .await
        {
            Ok(_) => {
                debug!(log_group = %self.config.log_group, "created log group");
                Ok(())
            }
            Err(e) => {
                let err = e.into_service_error();
                if err.is_resource_already_exists_exception() {
                    Ok(())
                } else {
                    Err(SinkError::cloudwatch(
                        "CreateLogGroup",
                        DisplayErrorContext(&err).to_string(),
                    ))
                }
            }
        }
    }

    async fn ensure_retention(&self) -> SinkResult<()> {
        self.client
            .put_retention_policy()
            .log_group_name(&self.config.log_group)
            .retention_in_days(self.config.retention_in_days)
            .send()
            .await
            .map_err(|e| {
                SinkError::cloudwatch("PutRetentionPolicy", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }

    async fn ensure_log_stream(&self) -> SinkResult<()> {
        match self
            .client
            .create_log_stream()
            .log_group_name(&self.config.log_group)
            .log_stream_name(&self.config.log_stream)
            .send()
            .await
        {
            Ok(_) => {
                debug!(log_stream = %self.config.log_stream, "created log stream");
                Ok(())
            }
            Err(e) => {
                let err = e.into_service_error();
                if err.is_resource_already_exists_exception() {
                    Ok(())
                } else {
                    Err(SinkError::cloudwatch(
                        "CreateLogStream",
                        DisplayErrorContext(&err).to_string(),
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl MetricSink for CloudWatchSink {
    fn name(&self) -> &'static str {
        "cloudwatch"
    }

    async fn flush(&self, batch: &MetricBatch) -> SinkResult<()> {
        let messages = batch.to_json_lines()?;
        if messages.is_empty() {
            return Ok(());
        }

        let timestamp = batch.timestamp().timestamp_millis();
        for chunk in chunk_messages(messages) {
            let count = chunk.len();
            let events = chunk
                .into_iter()
                .map(|message| {
                    InputLogEvent::builder()
                        .timestamp(timestamp)
                        .message(message)
                        .build()
                        .map_err(|e| SinkError::cloudwatch("PutLogEvents", e.to_string()))
                })
                .collect::<SinkResult<Vec<_>>>()?;

            self.client
                .put_log_events()
                .log_group_name(&self.config.log_group)
                .log_stream_name(&self.config.log_stream)
                .set_log_events(Some(events))
                .send()
                .await
                .map_err(|e| {
                    SinkError::cloudwatch("PutLogEvents", DisplayErrorContext(&e).to_string())
                })?;

            debug!(events = count, "sent log events");
        }
        Ok(())
    }
}

impl fmt::Debug for CloudWatchSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudWatchSink")
            .field("log_group", &self.config.log_group)
            .field("log_stream", &self.config.log_stream)
            .finish()
    }
}

/// Split messages into PutLogEvents-sized chunks, preserving order.
///
/// A single message larger than the payload limit still gets its own chunk;
/// CloudWatch rejects it and the failure is reported for that pass.
fn chunk_messages(messages: Vec<String>) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_bytes = 0;

    for message in messages {
        let size = message.len() + EVENT_OVERHEAD_BYTES;
        let full = current.len() >= MAX_EVENTS_PER_CALL || current_bytes + size > MAX_BATCH_BYTES;
        if full && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(message);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
