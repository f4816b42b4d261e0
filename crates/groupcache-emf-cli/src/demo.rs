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
//! Simulated cache group for the demo binary.
//!
//! Each group keeps a bounded main cache of locally loaded values and a small
//! hot cache of values that would have been fetched from peers. Keys are file
//! paths; a miss reads the file from disk.

use groupcache_emf::{CacheTypeSnapshot, GroupSnapshot, GroupStatistics};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Bounded FIFO cache partition with groupcache-style counters
#[derive(Debug)]
struct Partition {
    capacity: usize,
    entries: HashMap<String, Vec<u8>>,
    order: VecDeque<String>,
    bytes: i64,
    gets: i64,
    hits: i64,
    evictions: i64,
}

impl Partition {
    fn new(capacity: usize) -> Self {
        Partition {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
            bytes: 0,
            gets: 0,
            hits: 0,
            evictions: 0,
        }
    }

    fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        self.gets += 1;
        let value = self.entries.get(key).cloned();
        if value.is_some() {
            self.hits += 1;
        }
        value
    }

    fn add(&mut self, key: &str, value: Vec<u8>) {
        if self.entries.contains_key(key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.bytes -= (oldest.len() + evicted.len()) as i64;
                self.evictions += 1;
            }
        }
        self.bytes += (key.len() + value.len()) as i64;
        self.order.push_back(key.to_string());
        self.entries.insert(key.to_string(), value);
    }

    fn snapshot(&self) -> CacheTypeSnapshot {
        CacheTypeSnapshot {
            items: self.entries.len() as i64,
            bytes: self.bytes,
            gets: self.gets,
            hits: self.hits,
            evictions: self.evictions,
            // Entries never expire here, so every eviction is non-expired.
            evictions_nonexpired: self.evictions,
        }
    }
}

#[derive(Debug)]
struct Caches {
    main: Partition,
    hot: Partition,
}

/// A cache group backed by the local filesystem
#[derive(Debug)]
pub struct FileGroup {
    name: String,
    hot_every: i64,
    caches: Mutex<Caches>,
    gets: AtomicI64,
    hits: AtomicI64,
    loads: AtomicI64,
    local_loads: AtomicI64,
    local_load_errs: AtomicI64,
}

impl FileGroup {
    /// Create a group whose main cache holds `capacity` entries.
    ///
    /// Every `hot_every`th load is also promoted into the hot cache.
    pub fn new(name: impl Into<String>, capacity: usize, hot_every: i64) -> Self {
        FileGroup {
            name: name.into(),
            hot_every: hot_every.max(1),
            caches: Mutex::new(Caches {
                main: Partition::new(capacity.max(1)),
                hot: Partition::new((capacity / 8).max(1)),
            }),
            gets: AtomicI64::new(0),
            hits: AtomicI64::new(0),
            loads: AtomicI64::new(0),
            local_loads: AtomicI64::new(0),
            local_load_errs: AtomicI64::new(0),
        }
    }

    /// Look up `key`, reading the file named by it on a miss.
    pub async fn get(&self, key: &str) -> std::io::Result<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::Relaxed);

        if let Some(value) = self.lookup_cache(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let loads = self.loads.fetch_add(1, Ordering::Relaxed) + 1;
        match tokio::fs::read(Path::new(key)).await {
            Ok(value) => {
                self.local_loads.fetch_add(1, Ordering::Relaxed);
                self.populate(key, &value, loads % self.hot_every == 0);
                Ok(value)
            }
            Err(e) => {
                self.local_load_errs.fetch_add(1, Ordering::Relaxed);
                debug!(group = %self.name, key, error = %e, "load failed");
                Err(e)
            }
        }
    }

    fn lookup_cache(&self, key: &str) -> Option<Vec<u8>> {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.main.get(key).or_else(|| caches.hot.get(key))
    }

    fn populate(&self, key: &str, value: &[u8], hot: bool) {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.main.add(key, value.to_vec());
        if hot {
            caches.hot.add(key, value.to_vec());
        }
    }
}

impl GroupStatistics for FileGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self) -> GroupSnapshot {
        let caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        let loads = self.loads.load(Ordering::Relaxed);
        GroupSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            loads,
            loads_deduped: loads,
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
            main: caches.main.snapshot(),
            hot: caches.hot.snapshot(),
            ..GroupSnapshot::default()
        }
    }
}
