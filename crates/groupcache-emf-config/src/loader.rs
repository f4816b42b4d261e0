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
//! Configuration file loading and environment overrides

use crate::error::{ConfigError, ConfigResult};
use crate::schema::Config;
use crate::validation::Validator;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "GROUPCACHE_EMF_";

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yaml` or `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    validate: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).await?;

        info!(
            "Loaded {} configuration file: {}",
            format.name(),
            path.display()
        );

        self.load_from_string(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let config: Config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Load a file if given, else start from defaults, then apply
    /// `GROUPCACHE_EMF_*` environment overrides
    pub async fn load_with_overrides<P: AsRef<Path>>(
        &self,
        path: Option<P>,
    ) -> ConfigResult<Config> {
        self.load_with_overrides_from(path, |key| std::env::var(key).ok())
            .await
    }

    /// Like [`ConfigLoader::load_with_overrides`], with overrides looked up
    /// through `lookup`.
    ///
    /// Validation runs once, after the overrides, so an override can fix a
    /// value the file alone gets wrong.
    pub async fn load_with_overrides_from<P, F>(
        &self,
        path: Option<P>,
        lookup: F,
    ) -> ConfigResult<Config>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => ConfigLoader::without_validation().load_file(path).await?,
            None => Config::default(),
        };
        self.apply_overrides_from(&mut config, lookup)?;

        if self.validate {
            config.validate()?;
        }
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        self.apply_overrides_from(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by full variable name
    pub fn apply_overrides_from<F>(&self, config: &mut Config, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        // Exporter settings
        if let Some(value) = var("APPLICATION") {
            config.exporter.application = value;
        }
        if let Some(value) = var("EXPORT_INTERVAL_SECS") {
            config.exporter.export_interval_secs = value.parse().map_err(|_| {
                ConfigError::env_var_parsing_error(
                    "GROUPCACHE_EMF_EXPORT_INTERVAL_SECS",
                    &value,
                    "expected a whole number of seconds",
                )
            })?;
        }
        if let Some(value) = var("NAMESPACE") {
            config.exporter.namespace = value;
        }
        if let Some(value) = var("LOG_GROUP") {
            config.exporter.log_group = Some(value);
        }
        if let Some(value) = var("HOSTNAME_TAG_KEY") {
            config.exporter.hostname_tag_key = value;
        }
        if let Some(value) = var("ENABLE_HOSTNAME_TAG") {
            config.exporter.enable_hostname_tag =
                parse_bool("GROUPCACHE_EMF_ENABLE_HOSTNAME_TAG", &value)?;
        }
        if let Some(value) = var("DEBUG") {
            config.exporter.debug = parse_bool("GROUPCACHE_EMF_DEBUG", &value)?;
        }
        if let Some(value) = var("RETENTION_IN_DAYS") {
            config.exporter.retention_in_days = value.parse().map_err(|_| {
                ConfigError::env_var_parsing_error(
                    "GROUPCACHE_EMF_RETENTION_IN_DAYS",
                    &value,
                    "expected valid integer",
                )
            })?;
        }
        if let Some(value) = var("EVICT_STALE_GROUPS") {
            config.exporter.evict_stale_groups =
                parse_bool("GROUPCACHE_EMF_EVICT_STALE_GROUPS", &value)?;
        }

        // CloudWatch settings
        if let Some(value) = var("CLOUDWATCH_ENABLED") {
            config.cloudwatch.enabled = parse_bool("GROUPCACHE_EMF_CLOUDWATCH_ENABLED", &value)?;
        }
        if let Some(value) = var("CLOUDWATCH_REGION") {
            config.cloudwatch.region = Some(value);
        }
        if let Some(value) = var("CLOUDWATCH_ENDPOINT_URL") {
            config.cloudwatch.endpoint_url = Some(value);
        }
        if let Some(value) = var("CLOUDWATCH_PROFILE") {
            config.cloudwatch.profile = Some(value);
        }

        // Logging settings
        if let Some(value) = var("LOG_LEVEL") {
            config.logging.level = value;
        }
        if let Some(value) = var("LOG_FORMAT") {
            config.logging.format = value;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse boolean from string (accepts: true, false, yes, no, 1, 0, on, off)
fn parse_bool(variable_name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::env_var_parsing_error(
            variable_name,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}
