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

//! Executes one logical RPC against one region: pick the leader replica,
//! send, interpret routing errors, refresh the cache, back off, retry.
//!
//! Retrying a write across leaders is only safe because a logical call
//! keeps one request id across every attempt and stores apply a request id
//! at most once. Callers plugging in a store without that discipline must
//! set `request-max-retry = 1`.

use std::cmp;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use cache::MetaCache;
use config::Config;
use errors::{Error, Result};
use region::Region;
use rpc::{KvChannel, KvRequest, KvResponse, RegionError};
use util::escape;
use util::time::{duration_to_sec, remaining};

use super::metrics::*;

/// Exponential backoff with jitter. Pauses start at `base`, double per
/// failure and never exceed `cap`; each pause is drawn from
/// `[next/2, next]` so synchronized retries fan out.
pub struct Backoff {
    base: Duration,
    cap: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Backoff {
        Backoff {
            base: base,
            cap: cap,
            next: base,
        }
    }

    pub fn reset(&mut self) {
        self.next = self.base;
    }

    /// The pause to take before the next attempt.
    pub fn next_pause(&mut self) -> Duration {
        let millis = self.next.as_secs() * 1000 + u64::from(self.next.subsec_nanos()) / 1_000_000;
        let half = millis / 2;
        let jittered = half + rand::thread_rng().gen_range(0..=millis - half);
        self.next = cmp::min(self.next * 2, self.cap);
        Duration::from_millis(jittered)
    }
}

pub struct RpcController {
    cache: Arc<MetaCache>,
    channel: Arc<dyn KvChannel>,
    request_timeout: Duration,
    max_retry: usize,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl RpcController {
    pub fn new(cache: Arc<MetaCache>, channel: Arc<dyn KvChannel>, cfg: &Config) -> RpcController {
        RpcController {
            cache: cache,
            channel: channel,
            request_timeout: cfg.request_timeout.0,
            max_retry: cfg.request_max_retry,
            backoff_base: cfg.backoff_base.0,
            backoff_cap: cfg.backoff_cap.0,
        }
    }

    pub fn cache(&self) -> &Arc<MetaCache> {
        &self.cache
    }

    /// Run `req` against `region` until it succeeds, turns out to be
    /// unrecoverable, or the attempt/deadline budget runs out. On error the
    /// response must not be consumed by the caller.
    pub fn call(
        &self,
        req: &mut KvRequest,
        region: Arc<Region>,
        deadline: Instant,
    ) -> Result<KvResponse> {
        let method = req.method();
        let start = Instant::now();
        let timer = RPC_DURATION_HISTOGRAM_VEC.with_label_values(&[method]);

        let mut region = region;
        let mut leader_idx = pick_leader(&region)?;
        let mut backoff = Backoff::new(self.backoff_base, self.backoff_cap);
        let mut attempt = 0;
        let mut last_err;

        loop {
            let budget = match remaining(deadline) {
                Some(budget) => budget,
                None => return Err(Error::Timeout(start.elapsed())),
            };
            attempt += 1;
            req.context.region_id = region.id;
            req.context.epoch = region.epoch;
            let timeout = cmp::min(self.request_timeout, budget);
            let addr = region.replicas[leader_idx].addr.clone();

            RPC_SEND_COUNTER_VEC.with_label_values(&[method]).inc();
            match self.channel.call(&addr, req, timeout) {
                Ok(KvResponse {
                    region_error: None,
                    body,
                }) => {
                    timer.observe(duration_to_sec(start.elapsed()));
                    return Ok(KvResponse::ok(body));
                }
                Ok(KvResponse {
                    region_error: Some(region_err),
                    ..
                }) => {
                    RPC_RETRY_COUNTER_VEC
                        .with_label_values(&[method, region_error_tag(&region_err)])
                        .inc();
                    match region_err {
                        RegionError::NotLeader {
                            leader: Some(hint), ..
                        } => {
                            warn!(
                                "{} to region {} rejected, leader moved to store {}",
                                method, region.id, hint.store_id
                            );
                            match region.replicas.iter().position(|ep| *ep == hint) {
                                // Follow the hint right away, no pause.
                                Some(idx) => leader_idx = idx,
                                None => {
                                    // The hinted store is outside the cached
                                    // replica set, so the whole view is stale.
                                    region = self.refresh(req, &region, &mut backoff)?;
                                    leader_idx = pick_leader(&region)?;
                                }
                            }
                            last_err = Error::LeaderChanged(region.id, Some(hint));
                        }
                        RegionError::NotLeader { leader: None, .. } => {
                            warn!(
                                "{} to region {} rejected by non-leader, probing replicas",
                                method, region.id
                            );
                            leader_idx = (leader_idx + 1) % region.replicas.len();
                            self.pause(&mut backoff, deadline);
                            last_err = Error::LeaderChanged(region.id, None);
                        }
                        RegionError::EpochMismatch { region_id, .. } => {
                            region = self.refresh(req, &region, &mut backoff)?;
                            leader_idx = pick_leader(&region)?;
                            last_err = Error::EpochMismatch(region_id);
                        }
                        RegionError::RegionNotFound { .. } => {
                            region = self.refresh(req, &region, &mut backoff)?;
                            leader_idx = pick_leader(&region)?;
                            last_err = Error::RegionNotFound(req.routing_key().to_vec());
                        }
                    }
                }
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(
                        "{} to region {} at {} failed: {}",
                        method, region.id, addr, e
                    );
                    RPC_RETRY_COUNTER_VEC
                        .with_label_values(&[method, e.tag()])
                        .inc();
                    if e.requires_refresh() {
                        region = self.refresh(req, &region, &mut backoff)?;
                        leader_idx = pick_leader(&region)?;
                    } else {
                        // A timed-out replica is probed around; other
                        // transient failures retry the same one.
                        if let Error::Timeout(_) = e {
                            leader_idx = (leader_idx + 1) % region.replicas.len();
                        }
                        self.pause(&mut backoff, deadline);
                    }
                    last_err = e;
                }
            }

            if self.max_retry > 0 && attempt >= self.max_retry {
                debug!(
                    "{} for key {} gave up after {} attempts",
                    method,
                    escape(req.routing_key()),
                    attempt
                );
                return Err(last_err);
            }
        }
    }

    /// Drop the stale routing entry and fetch a fresh one. A successful
    /// refresh resets the backoff: the next attempt runs against new state.
    fn refresh(
        &self,
        req: &KvRequest,
        stale: &Region,
        backoff: &mut Backoff,
    ) -> Result<Arc<Region>> {
        self.cache.invalidate_region(stale.id, stale.epoch);
        let region = self.cache.lookup_region_by_key(req.routing_key())?;
        backoff.reset();
        Ok(region)
    }

    fn pause(&self, backoff: &mut Backoff, deadline: Instant) {
        let pause = backoff.next_pause();
        if let Some(budget) = remaining(deadline) {
            thread::sleep(cmp::min(pause, budget));
        }
    }
}

fn pick_leader(region: &Region) -> Result<usize> {
    if region.replicas.is_empty() {
        return Err(Error::Internal(format!(
            "region {} has no replicas",
            region.id
        )));
    }
    Ok(cmp::min(region.leader_idx, region.replicas.len() - 1))
}

fn region_error_tag(err: &RegionError) -> &'static str {
    match *err {
        RegionError::NotLeader { .. } => "not_leader",
        RegionError::RegionNotFound { .. } => "region_not_found",
        RegionError::EpochMismatch { .. } => "epoch_mismatch",
    }
}
