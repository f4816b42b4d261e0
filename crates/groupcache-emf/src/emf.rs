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

//! CloudWatch Embedded Metric Format batches
//!
//! A [`MetricBatch`] accumulates records for one export pass. At flush time
//! records sharing a namespace and dimension set are folded into a single EMF
//! document, a JSON object whose `_aws` member tells CloudWatch which fields
//! to extract as metrics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

use crate::dimensions::{Dimensions, EMF_METADATA_KEY};

/// CloudWatch metric unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    /// Plain count
    Count,
    /// Duration in milliseconds
    Milliseconds,
    /// Size in bytes
    Bytes,
}

impl Unit {
    /// Name as written in EMF directives
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Count => "Count",
            Unit::Milliseconds => "Milliseconds",
            Unit::Bytes => "Bytes",
        }
    }
}

/// Name and unit of an emitted metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricDefinition {
    /// Metric name, also the document member holding the value
    pub name: &'static str,
    /// CloudWatch unit
    pub unit: Unit,
}

impl MetricDefinition {
    /// Metric counted in `Count` units
    pub const fn count(name: &'static str) -> Self {
        MetricDefinition {
            name,
            unit: Unit::Count,
        }
    }

    /// Metric with an explicit unit
    pub const fn with_unit(name: &'static str, unit: Unit) -> Self {
        MetricDefinition { name, unit }
    }
}

/// Numeric metric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
}

impl MetricValue {
    /// Value as `f64`
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }

    fn to_json(self) -> Value {
        match self {
            MetricValue::Int(v) => Value::from(v),
            // NaN and infinities are not representable in JSON
            MetricValue::Float(v) if v.is_finite() => Value::from(v),
            MetricValue::Float(_) => Value::from(0),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A single value to emit
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// CloudWatch namespace
    pub namespace: String,
    /// Metric name and unit
    pub metric: MetricDefinition,
    /// Dimension set
    pub dimensions: Dimensions,
    /// Value for the interval
    pub value: MetricValue,
}

/// Records collected during one export pass
#[derive(Debug, Clone)]
pub struct MetricBatch {
    timestamp: DateTime<Utc>,
    records: Vec<MetricRecord>,
}

impl MetricBatch {
    /// Empty batch stamped with the current time
    pub fn new() -> Self {
        Self::with_timestamp(Utc::now())
    }

    /// Empty batch stamped with `timestamp`
    pub fn with_timestamp(timestamp: DateTime<Utc>) -> Self {
        MetricBatch {
            timestamp,
            records: Vec::new(),
        }
    }

    /// Append one record
    pub fn record(
        &mut self,
        namespace: &str,
        metric: MetricDefinition,
        dimensions: &Dimensions,
        value: impl Into<MetricValue>,
    ) {
        self.records.push(MetricRecord {
            namespace: namespace.to_string(),
            metric,
            dimensions: dimensions.clone(),
            value: value.into(),
        });
    }

    /// Timestamp of the pass
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Records in insertion order
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fold records into EMF documents, in first-seen order.
    ///
    /// A metric name appears at most once per document; a repeated name for
    /// the same namespace and dimensions starts a new document.
    pub fn documents(&self) -> Vec<Value> {
        let mut pending: Vec<(&str, &Dimensions, Vec<&MetricRecord>)> = Vec::new();

        for record in &self.records {
            let slot = pending.iter_mut().find(|(namespace, dimensions, metrics)| {
                *namespace == record.namespace
                    && *dimensions == &record.dimensions
                    && !metrics.iter().any(|m| m.metric.name == record.metric.name)
            });
            match slot {
                Some((_, _, metrics)) => metrics.push(record),
                None => pending.push((record.namespace.as_str(), &record.dimensions, vec![record])),
            }
        }

        let timestamp = self.timestamp.timestamp_millis();
        pending
            .into_iter()
            .map(|(namespace, dimensions, metrics)| {
                render_document(timestamp, namespace, dimensions, &metrics)
            })
            .collect()
    }

    /// EMF documents serialized one per line
    pub fn to_json_lines(&self) -> serde_json::Result<Vec<String>> {
        self.documents()
            .iter()
            .map(serde_json::to_string)
            .collect()
    }
}

impl Default for MetricBatch {
    fn default() -> Self {
        Self::new()
    }
}

fn render_document(
    timestamp: i64,
    namespace: &str,
    dimensions: &Dimensions,
    metrics: &[&MetricRecord],
) -> Value {
    let dimension_keys: Vec<&String> = dimensions.keys().collect();
    let definitions: Vec<Value> = metrics
        .iter()
        .map(|m| json!({ "Name": m.metric.name, "Unit": m.metric.unit.as_str() }))
        .collect();

    let mut root = Map::new();
    root.insert(
        EMF_METADATA_KEY.to_string(),
        json!({
            "Timestamp": timestamp,
            "CloudWatchMetrics": [{
                "Namespace": namespace,
                "Dimensions": [dimension_keys],
                "Metrics": definitions,
            }],
        }),
    );
    for (key, value) in dimensions {
        root.insert(key.clone(), Value::String(value.clone()));
    }
    for m in metrics {
        root.insert(m.metric.name.to_string(), m.value.to_json());
    }

    Value::Object(root)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dims(group: &str) -> Dimensions {
        let mut d = Dimensions::new();
        d.insert("application".to_string(), "app1".to_string());
        d.insert("group".to_string(), group.to_string());
        d
    }

    fn fixed_batch() -> MetricBatch {
        MetricBatch::with_timestamp(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    #[test]
    fn test_empty_batch() {
        let batch = fixed_batch();
        assert!(batch.is_empty());
        assert!(batch.documents().is_empty());
    }

    #[test]
    fn test_records_fold_by_dimensions() {
        let mut batch = fixed_batch();
        batch.record("groupcache", MetricDefinition::count("gets"), &dims("g1"), 10i64);
        batch.record("groupcache", MetricDefinition::count("hits"), &dims("g1"), 5i64);
        batch.record("groupcache", MetricDefinition::count("gets"), &dims("g2"), 7i64);

        let docs = batch.documents();
        assert_eq!(batch.len(), 3);
        assert_eq!(docs.len(), 2);

        let first = &docs[0];
        assert_eq!(first["group"], "g1");
        assert_eq!(first["gets"], 10);
        assert_eq!(first["hits"], 5);
        assert_eq!(first["_aws"]["Timestamp"], 1_700_000_000_000i64);

        let directive = &first["_aws"]["CloudWatchMetrics"][0];
        assert_eq!(directive["Namespace"], "groupcache");
        assert_eq!(directive["Dimensions"][0], json!(["application", "group"]));
        assert_eq!(directive["Metrics"][1], json!({"Name": "hits", "Unit": "Count"}));

        assert_eq!(docs[1]["gets"], 7);
    }

    #[test]
    fn test_repeated_metric_starts_new_document() {
        let mut batch = fixed_batch();
        batch.record("groupcache", MetricDefinition::count("gets"), &dims("g1"), 1i64);
        batch.record("groupcache", MetricDefinition::count("gets"), &dims("g1"), 2i64);

        let docs = batch.documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["gets"], 1);
        assert_eq!(docs[1]["gets"], 2);
    }

    #[test]
    fn test_namespaces_are_separate_documents() {
        let mut batch = fixed_batch();
        batch.record("a", MetricDefinition::count("gets"), &dims("g1"), 1i64);
        batch.record("b", MetricDefinition::count("hits"), &dims("g1"), 2i64);

        assert_eq!(batch.documents().len(), 2);
    }

    #[test]
    fn test_units_and_float_values() {
        let mut batch = fixed_batch();
        let latency = MetricDefinition::with_unit("latency", Unit::Milliseconds);
        batch.record("groupcache", latency, &dims("g1"), 12.5f64);
        batch.record("groupcache", MetricDefinition::count("bad"), &dims("g1"), f64::NAN);

        let doc = &batch.documents()[0];
        assert_eq!(doc["latency"], 12.5);
        assert_eq!(doc["bad"], 0);
        assert_eq!(
            doc["_aws"]["CloudWatchMetrics"][0]["Metrics"][0]["Unit"],
            "Milliseconds"
        );
    }

    #[test]
    fn test_json_lines() {
        let mut batch = fixed_batch();
        batch.record("groupcache", MetricDefinition::count("gets"), &dims("g1"), -3i64);

        let lines = batch.to_json_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].contains('\n'));
        assert!(lines[0].contains("\"gets\":-3"));
    }
}
