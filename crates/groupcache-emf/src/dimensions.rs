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

//! Dimension builder
//!
//! Every record carries `application` and `group`. The hostname tag is only
//! added when explicitly enabled, since pod names churn and would inflate
//! metric cardinality. Partition records add `type`.

use crate::exporter::{CACHE_TYPE_METRICS, GROUP_METRICS};
use crate::stats::CacheType;
use std::collections::BTreeMap;
use tracing::error;

/// Tag key to tag value
pub type Dimensions = BTreeMap<String, String>;

/// Dimension key holding the application name
pub const DIMENSION_APPLICATION: &str = "application";
/// Dimension key holding the group name
pub const DIMENSION_GROUP: &str = "group";
/// Dimension key holding the partition label
pub const DIMENSION_TYPE: &str = "type";

/// Root member of an EMF document holding the metric directives
pub const EMF_METADATA_KEY: &str = "_aws";

/// Whether `key` would collide with a built-in dimension, the EMF metadata
/// member or an emitted metric name when used as an extra dimension key.
///
/// Dimensions and metric values share the root of an EMF document, so any
/// such collision corrupts either the series or the document.
pub fn is_reserved_key(key: &str) -> bool {
    [
        DIMENSION_APPLICATION,
        DIMENSION_GROUP,
        DIMENSION_TYPE,
        EMF_METADATA_KEY,
    ]
    .contains(&key)
        || GROUP_METRICS
            .iter()
            .chain(CACHE_TYPE_METRICS.iter())
            .any(|metric| metric.name == key)
}

/// A `key=hostname` tag attached to every record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameTag {
    /// Dimension key
    pub key: String,
    /// Resolved hostname
    pub value: String,
}

impl HostnameTag {
    /// Resolve the local hostname into a tag under `key`.
    ///
    /// Resolution failure is logged and yields `None`, the exporter then
    /// runs without a hostname tag.
    pub fn resolve(key: impl Into<String>) -> Option<Self> {
        match hostname::get() {
            Ok(name) => {
                let value = name.to_string_lossy().into_owned();
                if value.is_empty() {
                    return None;
                }
                Some(HostnameTag {
                    key: key.into(),
                    value,
                })
            }
            Err(e) => {
                error!(error = %e, "hostname resolution failed, hostname tag disabled");
                None
            }
        }
    }
}

/// Builds the stable tag set for an exporter instance
#[derive(Debug, Clone)]
pub struct DimensionBuilder {
    application: String,
    hostname: Option<HostnameTag>,
}

impl DimensionBuilder {
    /// Builder for `application`, with an optional hostname tag
    pub fn new(application: impl Into<String>, hostname: Option<HostnameTag>) -> Self {
        DimensionBuilder {
            application: application.into(),
            hostname,
        }
    }

    /// Hostname tag in use, if any
    pub fn hostname(&self) -> Option<&HostnameTag> {
        self.hostname.as_ref()
    }

    /// Dimensions for a group, optionally narrowed to one partition
    pub fn build(&self, group: &str, cache_type: Option<CacheType>) -> Dimensions {
        let mut dimensions = Dimensions::new();
        dimensions.insert(DIMENSION_APPLICATION.to_string(), self.application.clone());
        dimensions.insert(DIMENSION_GROUP.to_string(), group.to_string());

        if let Some(tag) = &self.hostname {
            dimensions.insert(tag.key.clone(), tag.value.clone());
        }

        if let Some(cache_type) = cache_type {
            dimensions.insert(DIMENSION_TYPE.to_string(), cache_type.as_label().to_string());
        }

        dimensions
    }

    /// Dimensions for group-level metrics
    pub fn group(&self, group: &str) -> Dimensions {
        self.build(group, None)
    }

    /// Dimensions for partition-level metrics
    pub fn cache_type(&self, group: &str, cache_type: CacheType) -> Dimensions {
        self.build(group, Some(cache_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys() {
        for key in ["application", "group", "type", "_aws"] {
            assert!(is_reserved_key(key), "{}", key);
        }
        for metric in GROUP_METRICS.iter().chain(CACHE_TYPE_METRICS.iter()) {
            assert!(is_reserved_key(metric.name), "{}", metric.name);
        }
        assert!(!is_reserved_key("pod_name"));
        assert!(!is_reserved_key("host"));
    }

    fn pod_tag() -> HostnameTag {
        HostnameTag {
            key: "pod_name".to_string(),
            value: "web-7d9f".to_string(),
        }
    }

    #[test]
    fn test_group_dimensions() {
        let builder = DimensionBuilder::new("app1", None);
        let dims = builder.group("g1");

        assert_eq!(dims.len(), 2);
        assert_eq!(dims["application"], "app1");
        assert_eq!(dims["group"], "g1");
    }

    #[test]
    fn test_cache_type_dimensions() {
        let builder = DimensionBuilder::new("app1", None);

        assert_eq!(builder.cache_type("g1", CacheType::Main)["type"], "main");
        assert_eq!(builder.cache_type("g1", CacheType::Hot)["type"], "hot");
        assert!(!builder.group("g1").contains_key("type"));
    }

    #[test]
    fn test_hostname_tag_present_only_when_configured() {
        let with_host = DimensionBuilder::new("app1", Some(pod_tag()));
        let without_host = DimensionBuilder::new("app1", None);

        let dims = with_host.cache_type("g1", CacheType::Hot);
        assert_eq!(dims["pod_name"], "web-7d9f");
        assert_eq!(dims.len(), 4);

        assert!(!without_host.group("g1").contains_key("pod_name"));
    }

    #[test]
    fn test_custom_hostname_key() {
        let tag = HostnameTag {
            key: "host".to_string(),
            value: "node-a".to_string(),
        };
        let dims = DimensionBuilder::new("app1", Some(tag)).group("g1");
        assert_eq!(dims["host"], "node-a");
        assert!(!dims.contains_key("pod_name"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = DimensionBuilder::new("app1", Some(pod_tag()));
        assert_eq!(builder.group("g1"), builder.group("g1"));
    }
}
