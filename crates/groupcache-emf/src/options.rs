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

//! Exporter options and their defaults

use aws_config::SdkConfig;
use std::time::Duration;

use crate::dimensions::is_reserved_key;
use crate::error::{ExporterError, ExporterResult};

/// Default pause between export passes
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(60);
/// Default CloudWatch metrics namespace
pub const DEFAULT_NAMESPACE: &str = "groupcache";
/// Default dimension key for the hostname tag
pub const DEFAULT_HOSTNAME_TAG_KEY: &str = "pod_name";
/// Default CloudWatch Logs retention
pub const DEFAULT_RETENTION_IN_DAYS: i32 = 30;

/// Log group used when none is configured: `/groupcache/{application}`
pub fn default_log_group(application: &str) -> String {
    format!("/groupcache/{}", application)
}

/// Exporter options
///
/// Only `application` is required. Empty strings and zero values are
/// replaced by the defaults when the exporter is built, so options loaded
/// from partially filled configuration files behave like omitted ones.
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    /// Application name, used as a dimension, the log stream name and in the
    /// default log group
    pub application: String,

    /// AWS SDK configuration for sending EMF documents to CloudWatch Logs.
    /// When absent, documents are written to stdout.
    pub aws_config: Option<SdkConfig>,

    /// Log group retention in days
    pub retention_in_days: i32,

    /// Pause between export passes
    pub export_interval: Duration,

    /// Dimension key for the hostname tag
    pub hostname_tag_key: String,

    /// Add `{hostname_tag_key}: {hostname}` to every record.
    ///
    /// Off by default: many distinct hostnames over time raise metric
    /// cardinality, and CloudWatch bills per metric.
    pub enable_hostname_tag: bool,

    /// Log every collected snapshot
    pub debug: bool,

    /// CloudWatch metrics namespace
    pub namespace: String,

    /// CloudWatch Logs group, `None` for `/groupcache/{application}`
    pub log_group: Option<String>,

    /// Forget the previous snapshot of groups missing from a pass
    pub evict_stale_groups: bool,
}

impl Default for ExporterOptions {
    fn default() -> Self {
        ExporterOptions {
            application: String::new(),
            aws_config: None,
            retention_in_days: DEFAULT_RETENTION_IN_DAYS,
            export_interval: DEFAULT_EXPORT_INTERVAL,
            hostname_tag_key: DEFAULT_HOSTNAME_TAG_KEY.to_string(),
            enable_hostname_tag: false,
            debug: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            log_group: None,
            evict_stale_groups: false,
        }
    }
}

impl ExporterOptions {
    /// Options for `application` with every other field defaulted
    pub fn new(application: impl Into<String>) -> Self {
        ExporterOptions {
            application: application.into(),
            ..Default::default()
        }
    }

    /// Deliver to CloudWatch Logs using `config`
    pub fn with_aws_config(mut self, config: SdkConfig) -> Self {
        self.aws_config = Some(config);
        self
    }

    /// Pause between passes
    pub fn with_export_interval(mut self, interval: Duration) -> Self {
        self.export_interval = interval;
        self
    }

    /// CloudWatch metrics namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Log group, instead of `/groupcache/{application}`
    pub fn with_log_group(mut self, log_group: impl Into<String>) -> Self {
        self.log_group = Some(log_group.into());
        self
    }

    /// Log group retention
    pub fn with_retention_in_days(mut self, days: i32) -> Self {
        self.retention_in_days = days;
        self
    }

    /// Enable the hostname tag under `key`
    pub fn with_hostname_tag(mut self, key: impl Into<String>) -> Self {
        self.enable_hostname_tag = true;
        self.hostname_tag_key = key.into();
        self
    }

    /// Log every collected snapshot
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Forget groups missing from a listing
    pub fn with_evict_stale_groups(mut self, evict: bool) -> Self {
        self.evict_stale_groups = evict;
        self
    }

    /// Effective log group name
    pub fn log_group_name(&self) -> String {
        match &self.log_group {
            Some(group) if !group.is_empty() => group.clone(),
            _ => default_log_group(&self.application),
        }
    }

    /// Check the required fields and fill in defaults for unset ones
    pub fn resolve(mut self) -> ExporterResult<Self> {
        if self.application.trim().is_empty() {
            return Err(ExporterError::MissingApplication);
        }
        if self.export_interval.is_zero() {
            self.export_interval = DEFAULT_EXPORT_INTERVAL;
        }
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if self.hostname_tag_key.is_empty() {
            self.hostname_tag_key = DEFAULT_HOSTNAME_TAG_KEY.to_string();
        }
        if self.enable_hostname_tag && is_reserved_key(&self.hostname_tag_key) {
            return Err(ExporterError::invalid_option(
                "hostname_tag_key",
                format!(
                    "{:?} is a reserved dimension or metric name",
                    self.hostname_tag_key
                ),
            ));
        }
        if self.retention_in_days == 0 {
            self.retention_in_days = DEFAULT_RETENTION_IN_DAYS;
        }
        if self.retention_in_days < 0 {
            return Err(ExporterError::invalid_option(
                "retention_in_days",
                format!("must be positive, got {}", self.retention_in_days),
            ));
        }
        self.log_group = Some(self.log_group_name());
        Ok(self)
    }
}
