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
//! Configuration file schema
//!
//! Every field has a default, so an empty file is a valid configuration.
//! The application name may be left empty here; the binary falls back to
//! its executable name.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Exporter behaviour
    pub exporter: ExporterSettings,

    /// CloudWatch Logs delivery
    pub cloudwatch: CloudWatchSettings,

    /// Diagnostic logging of the exporter process itself
    pub logging: LoggingSettings,
}

/// Exporter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterSettings {
    /// Application name
    pub application: String,

    /// Seconds between export passes
    pub export_interval_secs: u64,

    /// CloudWatch metrics namespace
    pub namespace: String,

    /// CloudWatch Logs group; `/groupcache/{application}` when unset
    pub log_group: Option<String>,

    /// Dimension key for the hostname tag
    pub hostname_tag_key: String,

    /// Tag every record with the local hostname
    pub enable_hostname_tag: bool,

    /// Log every collected snapshot
    pub debug: bool,

    /// Log group retention in days
    pub retention_in_days: i32,

    /// Forget groups that disappear from the cache
    pub evict_stale_groups: bool,
}

impl ExporterSettings {
    /// Export interval as a `Duration`
    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }
}

impl Default for ExporterSettings {
    fn default() -> Self {
        ExporterSettings {
            application: String::new(),
            export_interval_secs: default_export_interval_secs(),
            namespace: default_namespace(),
            log_group: None,
            hostname_tag_key: default_hostname_tag_key(),
            enable_hostname_tag: false,
            debug: false,
            retention_in_days: default_retention_in_days(),
            evict_stale_groups: false,
        }
    }
}

/// CloudWatch Logs settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudWatchSettings {
    /// Send EMF documents to CloudWatch Logs instead of stdout
    pub enabled: bool,

    /// AWS region override; the SDK default chain applies when unset
    pub region: Option<String>,

    /// Custom endpoint, e.g. LocalStack
    pub endpoint_url: Option<String>,

    /// Named AWS profile
    pub profile: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level filter (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, compact, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Retention values accepted by CloudWatch Logs
pub const VALID_RETENTION_DAYS: &[i32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
    2922, 3288, 3653,
];

fn default_export_interval_secs() -> u64 {
    60
}

fn default_namespace() -> String {
    "groupcache".to_string()
}

fn default_hostname_tag_key() -> String {
    "pod_name".to_string()
}

fn default_retention_in_days() -> i32 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
