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
//! Validation of loaded settings

use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;

/// Keys a hostname tag may not use: the built-in dimensions, the EMF
/// metadata member and every emitted metric name
pub const RESERVED_DIMENSION_KEYS: &[&str] = &[
    "application",
    "group",
    "type",
    "_aws",
    "gets",
    "hits",
    "get_from_peers_latency_slowest_milliseconds",
    "peer_loads",
    "peer_errors",
    "loads",
    "loads_deduped",
    "local_load",
    "local_load_errs",
    "server_requests",
    "crosstalk_refusals",
    "cache_items",
    "cache_bytes",
    "cache_gets",
    "cache_hits",
    "cache_evictions",
    "cache_evictions_nonexpired",
];

/// Validator for configuration settings
pub trait Validator {
    /// Check the settings, returning the first problem found
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.exporter.validate()?;
        self.cloudwatch.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Validator for ExporterSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.export_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "exporter.export_interval_secs",
                "must be at least 1 second",
            ));
        }

        if self.namespace.trim().is_empty() {
            return Err(ConfigError::MissingRequired("exporter.namespace".to_string()));
        }

        if self.enable_hostname_tag && self.hostname_tag_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "exporter.hostname_tag_key".to_string(),
            ));
        }

        if self.enable_hostname_tag
            && RESERVED_DIMENSION_KEYS.contains(&self.hostname_tag_key.as_str())
        {
            return Err(ConfigError::invalid_value(
                "exporter.hostname_tag_key",
                format!(
                    "'{}' is a reserved dimension or metric name",
                    self.hostname_tag_key
                ),
            ));
        }

        if let Some(log_group) = &self.log_group {
            if log_group.is_empty() || log_group.len() > 512 {
                return Err(ConfigError::invalid_value(
                    "exporter.log_group",
                    "log group name must be 1-512 characters long",
                ));
            }
        }

        if !VALID_RETENTION_DAYS.contains(&self.retention_in_days) {
            return Err(ConfigError::invalid_value(
                "exporter.retention_in_days",
                format!(
                    "must be one of {:?}, got {}",
                    VALID_RETENTION_DAYS, self.retention_in_days
                ),
            ));
        }

        Ok(())
    }
}

impl Validator for CloudWatchSettings {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "cloudwatch.region",
                    "region must not be empty when set",
                ));
            }
        }

        if let Some(endpoint) = &self.endpoint_url {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::invalid_value(
                    "cloudwatch.endpoint_url",
                    format!("must start with http:// or https://, got {}", endpoint),
                ));
            }
        }

        Ok(())
    }
}

impl Validator for LoggingSettings {
    fn validate(&self) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.exporter.export_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_namespace_rejected() {
        let mut config = Config::default();
        config.exporter.namespace = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_hostname_key_required_when_enabled() {
        let mut config = Config::default();
        config.exporter.hostname_tag_key = String::new();
        assert!(config.validate().is_ok());

        config.exporter.enable_hostname_tag = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hostname_key_must_not_be_reserved() {
        let mut config = Config::default();
        config.exporter.enable_hostname_tag = true;

        for key in ["group", "application", "type", "_aws", "gets", "cache_items"] {
            config.exporter.hostname_tag_key = key.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidValue { .. })),
                "key {} accepted",
                key
            );
        }

        config.exporter.hostname_tag_key = "node".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_must_be_supported() {
        let mut config = Config::default();
        config.exporter.retention_in_days = 14;
        assert!(config.validate().is_ok());

        config.exporter.retention_in_days = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_scheme() {
        let mut config = Config::default();
        config.cloudwatch.endpoint_url = Some("http://localhost:4566".to_string());
        assert!(config.validate().is_ok());

        config.cloudwatch.endpoint_url = Some("localhost:4566".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_values() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_string();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
