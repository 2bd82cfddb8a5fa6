// Copyright 2018 The RangeKV Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client-side map of the keyspace, keyed by region start key.
//!
//! Lookups are served from an ordered snapshot under a read lock. A miss
//! falls through to the coordinator, and concurrent misses inside the same
//! uncovered gap coalesce onto one in-flight refresh, so a cold cache hit
//! by a burst of lookups issues a single region scan.

use std::collections::BTreeMap;
use std::ops::Bound::{Included, Unbounded};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use coordinator::CoordinatorClient;
use errors::{Error, Result};
use region::{Epoch, Key, Region};
use util::collections::HashMap;
use util::escape;
use util::HandyRwLock;

use self::metrics::*;

mod metrics;

// A lookup alternates cached-probe and refresh; under topology churn a
// refresh may install a region that still leaves the key uncovered, so a
// few rounds are allowed before the key is declared unroutable.
const MAX_LOOKUP_ROUNDS: usize = 4;

struct CacheEntry {
    region: Arc<Region>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| Instant::now() >= at)
    }
}

#[derive(Default)]
struct CacheCore {
    regions: BTreeMap<Key, CacheEntry>,
    // region id -> start key, for invalidation by id.
    region_ids: HashMap<u64, Key>,
}

impl CacheCore {
    fn remove(&mut self, start_key: &[u8]) -> Option<Arc<Region>> {
        if let Some(entry) = self.regions.remove(start_key) {
            self.region_ids.remove(&entry.region.id);
            return Some(entry.region);
        }
        None
    }

    fn prune_expired(&mut self) {
        let expired: Vec<Key> = self
            .regions
            .iter()
            .filter(|&(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for start in expired {
            self.remove(&start);
        }
    }

    /// Starts of cached regions overlapping `[start_key, end_key)`.
    fn overlapping(&self, start_key: &[u8], end_key: &[u8]) -> Vec<Key> {
        self.regions
            .iter()
            .take_while(|&(start, _)| end_key.is_empty() || start.as_slice() < end_key)
            .filter(|&(_, e)| e.region.is_last() || e.region.end_key.as_slice() > start_key)
            .map(|(start, _)| start.clone())
            .collect()
    }
}

enum FlightState {
    Pending,
    Done(Option<Error>),
}

struct Flight {
    state: Mutex<FlightState>,
    cond: Condvar,
}

impl Flight {
    fn new() -> Flight {
        Flight {
            state: Mutex::new(FlightState::Pending),
            cond: Condvar::new(),
        }
    }

    fn finish(&self, err: Option<Error>) {
        let mut state = self.state.lock().unwrap();
        *state = FlightState::Done(err);
        self.cond.notify_all();
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        loop {
            match *state {
                FlightState::Pending => state = self.cond.wait(state).unwrap(),
                FlightState::Done(None) => return Ok(()),
                FlightState::Done(Some(ref e)) => {
                    return Err(e
                        .maybe_clone()
                        .unwrap_or_else(|| Error::Internal(format!("region refresh failed: {}", e))));
                }
            }
        }
    }
}

pub struct MetaCache {
    coordinator: Arc<dyn CoordinatorClient>,
    core: RwLock<CacheCore>,
    // In-flight refreshes, keyed by the start of the uncovered gap.
    flights: Mutex<HashMap<Key, Arc<Flight>>>,
    ttl: Option<Duration>,
}

impl MetaCache {
    pub fn new(coordinator: Arc<dyn CoordinatorClient>, ttl: Duration) -> MetaCache {
        let ttl = if ttl == Duration::from_secs(0) {
            None
        } else {
            Some(ttl)
        };
        MetaCache {
            coordinator: coordinator,
            core: RwLock::new(CacheCore::default()),
            flights: Mutex::new(HashMap::default()),
            ttl: ttl,
        }
    }

    /// The region owning `key`, from cache or, on a miss, from the
    /// coordinator.
    pub fn lookup_region_by_key(&self, key: &[u8]) -> Result<Arc<Region>> {
        for _ in 0..MAX_LOOKUP_ROUNDS {
            if let Some(region) = self.cached(key) {
                CACHE_LOOKUP_COUNTER_VEC.with_label_values(&["hit"]).inc();
                return Ok(region);
            }
            CACHE_LOOKUP_COUNTER_VEC.with_label_values(&["miss"]).inc();
            self.refresh(key)?;
        }
        Err(Error::RegionNotFound(key.to_vec()))
    }

    /// Drop the cached entry for `region_id` unless a newer epoch than the
    /// one the caller observed has been installed in the meantime.
    pub fn invalidate_region(&self, region_id: u64, observed: Epoch) {
        let mut core = self.core.wl();
        let start = match core.region_ids.get(&region_id) {
            Some(start) => start.clone(),
            None => return,
        };
        let stale = core
            .regions
            .get(&start)
            .map_or(false, |e| !e.region.epoch.is_newer_than(&observed));
        if stale {
            core.remove(&start);
            CACHE_INVALIDATE_COUNTER.inc();
            debug!("meta cache invalidated region {}", region_id);
        }
    }

    /// Atomically replace every cached region overlapping `region` with
    /// `region`, provided its epoch strictly supersedes all of them.
    /// Returns whether the install happened.
    pub fn overlap_install(&self, region: Region) -> bool {
        let mut core = self.core.wl();
        core.prune_expired();
        self.install_locked(&mut core, Arc::new(region))
    }

    fn install_locked(&self, core: &mut CacheCore, region: Arc<Region>) -> bool {
        let overlaps = core.overlapping(&region.start_key, &region.end_key);
        for start in &overlaps {
            let cached_epoch = core.regions[start].region.epoch;
            if !region.epoch.is_newer_than(&cached_epoch) {
                debug!(
                    "skip installing region {} at epoch {:?}, cache holds {:?}",
                    region.id, region.epoch, cached_epoch
                );
                return false;
            }
        }
        for start in overlaps {
            core.remove(&start);
        }
        let start_key = region.start_key.clone();
        core.region_ids.insert(region.id, start_key.clone());
        core.regions.insert(
            start_key,
            CacheEntry {
                expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
                region: region,
            },
        );
        true
    }

    fn cached(&self, key: &[u8]) -> Option<Arc<Region>> {
        let expired = {
            let core = self.core.rl();
            match core
                .regions
                .range::<[u8], _>((Unbounded, Included(key)))
                .next_back()
            {
                Some((_, entry)) if entry.region.contains(key) => {
                    if !entry.is_expired() {
                        return Some(Arc::clone(&entry.region));
                    }
                    true
                }
                _ => false,
            }
        };
        if expired {
            CACHE_LOOKUP_COUNTER_VEC.with_label_values(&["expired"]).inc();
            let mut core = self.core.wl();
            let stale_start = match core
                .regions
                .range::<[u8], _>((Unbounded, Included(key)))
                .next_back()
            {
                Some((start, entry)) if entry.region.contains(key) && entry.is_expired() => {
                    Some(start.clone())
                }
                _ => None,
            };
            if let Some(start) = stale_start {
                core.remove(&start);
            }
        }
        None
    }

    /// Start of the uncovered gap `key` falls into, used to coalesce
    /// concurrent refreshes of the same gap.
    fn gap_start(&self, key: &[u8]) -> Key {
        let core = self.core.rl();
        match core
            .regions
            .range::<[u8], _>((Unbounded, Included(key)))
            .next_back()
        {
            Some((_, entry)) if !entry.region.contains(key) => entry.region.end_key.clone(),
            _ => Vec::new(),
        }
    }

    fn refresh(&self, key: &[u8]) -> Result<()> {
        let gap = self.gap_start(key);
        let (flight, leader) = {
            let mut flights = self.flights.lock().unwrap();
            match flights.get(&gap) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    flights.insert(gap.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };
        if !leader {
            return flight.wait();
        }

        // A refresh finishing between our probe and taking leadership may
        // already have covered the key; re-check before going upstream.
        let res = if self.cached(key).is_some() {
            Ok(())
        } else {
            self.refresh_from_coordinator(key)
        };
        flight.finish(res.as_ref().err().map(|e| {
            e.maybe_clone()
                .unwrap_or_else(|| Error::Internal(format!("region refresh failed: {}", e)))
        }));
        self.flights.lock().unwrap().remove(&gap);
        res
    }

    fn refresh_from_coordinator(&self, key: &[u8]) -> Result<()> {
        let region = match self.coordinator.get_region(key) {
            Ok(region) => region,
            Err(e) => {
                CACHE_REFRESH_COUNTER_VEC.with_label_values(&["err"]).inc();
                warn!("region refresh for key {} failed: {}", escape(key), e);
                return Err(e);
            }
        };
        CACHE_REFRESH_COUNTER_VEC.with_label_values(&["ok"]).inc();
        info!(
            "meta cache installing region {} [{}, {}) at epoch {:?}",
            region.id,
            escape(&region.start_key),
            escape(&region.end_key),
            region.epoch
        );
        let mut core = self.core.wl();
        core.prune_expired();
        self.install_locked(&mut core, Arc::new(region));
        Ok(())
    }

    #[cfg(test)]
    fn cached_region_count(&self) -> usize {
        self.core.rl().regions.len()
    }
}
