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

//! Delta engine
//!
//! CloudWatch metrics are per-interval values, while groupcache exposes
//! cumulative counters. Counters are reported as `current - previous`, gauges
//! as the current value. A group seen for the first time is compared against
//! an all-zero baseline, so its first delta equals the raw cumulative values.
//!
//! Counter resets are not detected: a restarted group yields negative deltas,
//! which are emitted as-is.

use crate::stats::{CacheType, CacheTypeSnapshot, GroupSnapshot};
use serde::Serialize;

/// Per-interval values for one cache partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheTypeDelta {
    /// Current item count (gauge, not differenced)
    pub items: i64,
    /// Current byte size (gauge, not differenced)
    pub bytes: i64,
    /// Gets during the interval
    pub gets: i64,
    /// Hits during the interval
    pub hits: i64,
    /// Evictions during the interval
    pub evictions: i64,
    /// Evictions of unexpired entries during the interval
    pub evictions_nonexpired: i64,
}

/// Per-interval values for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeltaRecord {
    /// Gets during the interval
    pub gets: i64,
    /// Hits during the interval
    pub hits: i64,
    /// Current slowest peer fetch (gauge, not differenced)
    pub get_from_peers_latency_lower: f64,
    /// Loads served by peers
    pub peer_loads: i64,
    /// Failed peer fetches
    pub peer_errors: i64,
    /// Loads after cache misses
    pub loads: i64,
    /// Loads after request deduplication
    pub loads_deduped: i64,
    /// Successful local loads
    pub local_loads: i64,
    /// Failed local loads
    pub local_load_errs: i64,
    /// Requests received from peers
    pub server_requests: i64,
    /// Requests refused for belonging to another owner
    pub crosstalk_refusals: i64,
    /// Main cache partition
    pub main: CacheTypeDelta,
    /// Hot cache partition
    pub hot: CacheTypeDelta,
}

impl DeltaRecord {
    /// Partition delta by type
    pub fn cache_type(&self, cache_type: CacheType) -> &CacheTypeDelta {
        match cache_type {
            CacheType::Main => &self.main,
            CacheType::Hot => &self.hot,
        }
    }
}

/// Compute the interval delta between two observations of the same group.
///
/// `previous` is `None` the first time a group is seen.
pub fn compute_delta(previous: Option<&GroupSnapshot>, current: &GroupSnapshot) -> DeltaRecord {
    let baseline = GroupSnapshot::default();
    let prev = previous.unwrap_or(&baseline);

    DeltaRecord {
        gets: current.gets.wrapping_sub(prev.gets),
        hits: current.hits.wrapping_sub(prev.hits),
        get_from_peers_latency_lower: current.get_from_peers_latency_lower,
        peer_loads: current.peer_loads.wrapping_sub(prev.peer_loads),
        peer_errors: current.peer_errors.wrapping_sub(prev.peer_errors),
        loads: current.loads.wrapping_sub(prev.loads),
        loads_deduped: current.loads_deduped.wrapping_sub(prev.loads_deduped),
        local_loads: current.local_loads.wrapping_sub(prev.local_loads),
        local_load_errs: current.local_load_errs.wrapping_sub(prev.local_load_errs),
        server_requests: current.server_requests.wrapping_sub(prev.server_requests),
        crosstalk_refusals: current
            .crosstalk_refusals
            .wrapping_sub(prev.crosstalk_refusals),
        main: compute_cache_type_delta(&prev.main, &current.main),
        hot: compute_cache_type_delta(&prev.hot, &current.hot),
    }
}

/// Partition-level counterpart of [`compute_delta`]
pub fn compute_cache_type_delta(
    previous: &CacheTypeSnapshot,
    current: &CacheTypeSnapshot,
) -> CacheTypeDelta {
    CacheTypeDelta {
        items: current.items,
        bytes: current.bytes,
        gets: current.gets.wrapping_sub(previous.gets),
        hits: current.hits.wrapping_sub(previous.hits),
        evictions: current.evictions.wrapping_sub(previous.evictions),
        evictions_nonexpired: current
            .evictions_nonexpired
            .wrapping_sub(previous.evictions_nonexpired),
    }
}
