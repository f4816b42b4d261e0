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

//! Cumulative cache statistics and the source that produces them
//!
//! A [`GroupSource`] enumerates the live cache groups; each
//! [`GroupStatistics`] produces a [`GroupSnapshot`] on demand. The exporter
//! only ever reads snapshots, it never talks to the cache directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Statistics for one cache partition ("main" or "hot") of a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTypeSnapshot {
    /// Number of items currently held (gauge)
    pub items: i64,
    /// Bytes currently held (gauge)
    pub bytes: i64,
    /// Cumulative lookups
    pub gets: i64,
    /// Cumulative lookups that found an item
    pub hits: i64,
    /// Cumulative evictions
    pub evictions: i64,
    /// Cumulative evictions of items that had not expired yet
    pub evictions_nonexpired: i64,
}

/// Cumulative statistics for a single cache group at one observation instant
///
/// Every field except `get_from_peers_latency_lower` and the partition
/// gauges is a monotonically non-decreasing counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    /// Any get request, including from peers
    pub gets: i64,
    /// Either cache was good
    pub hits: i64,
    /// Slowest observed peer fetch in milliseconds (gauge)
    pub get_from_peers_latency_lower: f64,
    /// Either remote load or remote cache hit (not an error)
    pub peer_loads: i64,
    /// Errors fetching from peers
    pub peer_errors: i64,
    /// gets - cache hits
    pub loads: i64,
    /// After singleflight
    pub loads_deduped: i64,
    /// Total good local loads
    pub local_loads: i64,
    /// Total bad local loads
    pub local_load_errs: i64,
    /// Gets that came over the network from peers
    pub server_requests: i64,
    /// Requests refused because they crossed a peer boundary
    pub crosstalk_refusals: i64,
    /// Main partition
    pub main: CacheTypeSnapshot,
    /// Hot partition
    pub hot: CacheTypeSnapshot,
}

/// Partition label used for the `type` dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    /// Items owned by this peer
    Main,
    /// Items owned by other peers, replicated locally
    Hot,
}

impl CacheType {
    /// Both partitions, in emission order
    pub const ALL: [CacheType; 2] = [CacheType::Main, CacheType::Hot];

    /// Dimension value for this partition
    pub fn as_label(&self) -> &'static str {
        match self {
            CacheType::Main => "main",
            CacheType::Hot => "hot",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl GroupSnapshot {
    /// Partition snapshot by type
    pub fn cache_type(&self, cache_type: CacheType) -> &CacheTypeSnapshot {
        match cache_type {
            CacheType::Main => &self.main,
            CacheType::Hot => &self.hot,
        }
    }
}

/// One live cache group
pub trait GroupStatistics: Send + Sync {
    /// Stable group name, used as the state key and the `group` dimension
    fn name(&self) -> &str;

    /// Grab the current cumulative statistics
    fn collect(&self) -> GroupSnapshot;
}

/// Enumerates the cache groups to export
///
/// Closures returning a group list implement this trait, so an exporter can
/// be wired to any cache backend without a dedicated type.
pub trait GroupSource: Send + Sync {
    /// Current list of groups
    fn list_groups(&self) -> Vec<Arc<dyn GroupStatistics>>;
}

impl<F> GroupSource for F
where
    F: Fn() -> Vec<Arc<dyn GroupStatistics>> + Send + Sync,
{
    fn list_groups(&self) -> Vec<Arc<dyn GroupStatistics>> {
        self()
    }
}

/// A group whose snapshot can be replaced from outside
///
/// Handy for tests and for adapting caches that push their statistics
/// instead of being polled.
#[derive(Debug)]
pub struct StaticGroup {
    name: String,
    snapshot: std::sync::Mutex<GroupSnapshot>,
}

impl StaticGroup {
    /// Create a group reporting `snapshot` until replaced
    pub fn new(name: impl Into<String>, snapshot: GroupSnapshot) -> Self {
        StaticGroup {
            name: name.into(),
            snapshot: std::sync::Mutex::new(snapshot),
        }
    }

    /// Replace the reported snapshot
    pub fn set(&self, snapshot: GroupSnapshot) {
        let mut guard = self
            .snapshot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = snapshot;
    }
}

impl GroupStatistics for StaticGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> GroupSnapshot {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_type_labels() {
        assert_eq!(CacheType::Main.as_label(), "main");
        assert_eq!(CacheType::Hot.as_label(), "hot");
        assert_eq!(CacheType::Hot.to_string(), "hot");
    }

    #[test]
    fn test_cache_type_accessor() {
        let snapshot = GroupSnapshot {
            main: CacheTypeSnapshot {
                items: 3,
                ..Default::default()
            },
            hot: CacheTypeSnapshot {
                items: 7,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(snapshot.cache_type(CacheType::Main).items, 3);
        assert_eq!(snapshot.cache_type(CacheType::Hot).items, 7);
    }

    #[test]
    fn test_closure_source() {
        let group: Arc<dyn GroupStatistics> =
            Arc::new(StaticGroup::new("g1", GroupSnapshot::default()));
        let source = move || vec![Arc::clone(&group)];

        let groups = source.list_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), "g1");
    }

    #[test]
    fn test_static_group_set() {
        let group = StaticGroup::new("g1", GroupSnapshot::default());
        group.set(GroupSnapshot {
            gets: 42,
            ..Default::default()
        });
        assert_eq!(group.collect().gets, 42);
    }
}
