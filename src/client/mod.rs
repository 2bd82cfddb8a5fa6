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

//! The public operations and the scatter/gather layer behind them.
//!
//! A batch is partitioned by region, one sub-batch per region runs
//! concurrently through the controller, and the per-region outcomes are
//! reduced into a single result. Batches are partial-success: every
//! sub-batch that completed contributes its output even when another one
//! failed, and the first failure (in region-map order) becomes the
//! reported status. Atomic write variants are atomic per region only;
//! callers needing a whole batch atomic must keep it inside one region.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cache::MetaCache;
use config::Config;
use coordinator::CoordinatorClient;
use errors::{Error, Result};
use region::{Key, KeyOpState, KvPair, Value};
use rpc::{KvChannel, KvRequest, RequestBody, ResponseBody, RpcController};
use util::time::duration_to_sec;

use self::batch::{dispatch, group_by_region, SubBatchState};
use self::metrics::*;
use self::range::plan_delete_range;

pub mod batch;
pub mod range;
mod metrics;

/// Outcome of a scattered operation: the output merged from completed
/// sub-batches plus the first failure, if any. Failures past the first are
/// only logged.
#[must_use]
#[derive(Debug)]
pub struct BatchResult<T> {
    pub value: T,
    pub first_error: Option<Error>,
}

impl<T> BatchResult<T> {
    fn ok(value: T) -> BatchResult<T> {
        BatchResult {
            value: value,
            first_error: None,
        }
    }

    fn fail(value: T, e: Error) -> BatchResult<T> {
        BatchResult {
            value: value,
            first_error: Some(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.first_error.is_none()
    }

    /// Collapse into a plain `Result`, dropping partial output on failure.
    pub fn into_result(self) -> Result<T> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.value),
        }
    }
}

/// Thread-safe client handle. Cloning shares the region cache and the
/// controller.
#[derive(Clone)]
pub struct Client {
    cache: Arc<MetaCache>,
    controller: Arc<RpcController>,
    request_deadline: Duration,
    max_parallel: usize,
}

impl Client {
    pub fn new(
        coordinator: Arc<dyn CoordinatorClient>,
        channel: Arc<dyn KvChannel>,
        cfg: &Config,
    ) -> Result<Client> {
        cfg.validate()?;
        let cache = Arc::new(MetaCache::new(coordinator, cfg.region_cache_ttl.0));
        let controller = Arc::new(RpcController::new(Arc::clone(&cache), channel, cfg));
        info!("rangekv client started");
        Ok(Client {
            cache: cache,
            controller: controller,
            request_deadline: cfg.request_deadline.0,
            max_parallel: cfg.max_parallel_sub_batches,
        })
    }

    pub fn cache(&self) -> &Arc<MetaCache> {
        &self.cache
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.request_deadline
    }

    pub fn get(&self, key: Key) -> Result<Value> {
        match self.call_single(KvRequest::new(RequestBody::Get { key }))? {
            ResponseBody::Get { value: Some(value) } => Ok(value),
            ResponseBody::Get { value: None } => Err(Error::NotFound),
            other => Err(mismatched_response("get", &other)),
        }
    }

    pub fn put(&self, key: Key, value: Value) -> Result<()> {
        match self.call_single(KvRequest::new(RequestBody::Put { key, value }))? {
            ResponseBody::Put => Ok(()),
            other => Err(mismatched_response("put", &other)),
        }
    }

    pub fn put_if_absent(&self, key: Key, value: Value) -> Result<bool> {
        match self.call_single(KvRequest::new(RequestBody::PutIfAbsent { key, value }))? {
            ResponseBody::PutIfAbsent { applied } => Ok(applied),
            other => Err(mismatched_response("put_if_absent", &other)),
        }
    }

    pub fn delete(&self, key: Key) -> Result<()> {
        self.delete_key(key).map(|_| ())
    }

    pub fn compare_and_set(&self, key: Key, value: Value, expect: Value) -> Result<bool> {
        let req = KvRequest::new(RequestBody::CompareAndSet { key, value, expect });
        match self.call_single(req)? {
            ResponseBody::CompareAndSet { applied } => Ok(applied),
            other => Err(mismatched_response("compare_and_set", &other)),
        }
    }

    /// Point delete reporting whether the key existed, shared by `delete`
    /// and the range walker's compensating delete.
    fn delete_key(&self, key: Key) -> Result<bool> {
        match self.call_single(KvRequest::new(RequestBody::Delete { key }))? {
            ResponseBody::Delete { existed } => Ok(existed),
            other => Err(mismatched_response("delete", &other)),
        }
    }

    fn call_single(&self, mut req: KvRequest) -> Result<ResponseBody> {
        let tag = req.method();
        KV_COMMAND_COUNTER_VEC.with_label_values(&[tag]).inc();
        let timer = Instant::now();
        let res = if req.routing_key().is_empty() {
            Err(Error::InvalidArgument("key is empty".to_owned()))
        } else {
            self.cache
                .lookup_region_by_key(req.routing_key())
                .and_then(|region| self.controller.call(&mut req, region, self.deadline()))
                .map(|resp| resp.body)
        };
        KV_COMMAND_DURATION_HISTOGRAM_VEC
            .with_label_values(&[tag])
            .observe(duration_to_sec(timer.elapsed()));
        if let Err(ref e) = res {
            KV_COMMAND_FAILED_COUNTER_VEC
                .with_label_values(&[tag, e.tag()])
                .inc();
        }
        res
    }

    pub fn batch_get(&self, keys: Vec<Key>) -> BatchResult<Vec<KvPair>> {
        self.run_batch(
            "batch_get",
            keys,
            key_of_key,
            |keys| RequestBody::BatchGet { keys },
            collect_pairs,
            Vec::new,
        )
    }

    pub fn batch_put(&self, pairs: Vec<KvPair>) -> BatchResult<()> {
        self.run_batch(
            "batch_put",
            pairs,
            key_of_pair,
            |pairs| RequestBody::BatchPut { pairs },
            drop_output,
            || (),
        )
    }

    pub fn batch_put_if_absent(&self, pairs: Vec<KvPair>) -> BatchResult<Vec<KeyOpState>> {
        self.run_batch(
            "batch_put_if_absent",
            pairs,
            key_of_pair,
            // Atomicity holds inside each region only.
            |pairs| RequestBody::BatchPutIfAbsent {
                pairs: pairs,
                atomic: true,
            },
            collect_key_states,
            Vec::new,
        )
    }

    pub fn batch_delete(&self, keys: Vec<Key>) -> BatchResult<()> {
        self.run_batch(
            "batch_delete",
            keys,
            key_of_key,
            |keys| RequestBody::BatchDelete { keys },
            drop_output,
            || (),
        )
    }

    pub fn batch_compare_and_set(
        &self,
        pairs: Vec<KvPair>,
        expects: Vec<Value>,
    ) -> BatchResult<Vec<KeyOpState>> {
        if pairs.len() != expects.len() {
            let e = Error::InvalidArgument(format!(
                "kvs size {} does not match expected size {}",
                pairs.len(),
                expects.len()
            ));
            KV_COMMAND_COUNTER_VEC
                .with_label_values(&["batch_compare_and_set"])
                .inc();
            KV_COMMAND_FAILED_COUNTER_VEC
                .with_label_values(&["batch_compare_and_set", e.tag()])
                .inc();
            return BatchResult::fail(Vec::new(), e);
        }
        let items: Vec<(KvPair, Value)> = pairs.into_iter().zip(expects).collect();
        self.run_batch(
            "batch_compare_and_set",
            items,
            key_of_cas,
            |items| {
                let (pairs, expects) = items.into_iter().unzip();
                RequestBody::BatchCompareAndSet {
                    pairs: pairs,
                    expects: expects,
                }
            },
            collect_key_states,
            Vec::new,
        )
    }

    /// Delete every key of `[start, end]`, the bounds included per
    /// `with_start`/`with_end`, across however many regions the range
    /// spans. Returns how many keys were deleted; on a partial failure the
    /// count covers the sub-ranges that did complete.
    pub fn delete_range(
        &self,
        start: Key,
        end: Key,
        with_start: bool,
        with_end: bool,
    ) -> BatchResult<u64> {
        let tag = "delete_range";
        KV_COMMAND_COUNTER_VEC.with_label_values(&[tag]).inc();
        let timer = Instant::now();
        let res = self.delete_range_inner(start, end, with_start, with_end);
        self.finish_batch(tag, timer, res)
    }

    fn delete_range_inner(
        &self,
        start: Key,
        end: Key,
        with_start: bool,
        with_end: bool,
    ) -> BatchResult<u64> {
        let tag = "delete_range";
        let (parts, delete_end_key) =
            match plan_delete_range(&self.cache, &start, &end, with_start, with_end) {
                Ok(plan) => plan,
                Err(e) => return BatchResult::fail(0, e),
            };
        let subs: Vec<SubBatchState> = parts
            .into_iter()
            .map(|part| {
                let body = RequestBody::DeleteRange {
                    start_key: part.start_key,
                    end_key: part.end_key,
                    with_start: part.with_start,
                    with_end: part.with_end,
                };
                SubBatchState::new(part.region, KvRequest::new(body))
            })
            .collect();
        SUB_BATCHES_HISTOGRAM_VEC
            .with_label_values(&[tag])
            .observe(subs.len() as f64);

        let mut subs = match dispatch(&self.controller, subs, self.deadline(), self.max_parallel) {
            Ok(subs) => subs,
            Err(e) => return BatchResult::fail(0, e),
        };
        let mut first_error = take_first_error(tag, &mut subs);
        let mut deleted: u64 = subs.iter().map(|sub| sub.delete_count).sum();

        if delete_end_key {
            // The inclusive end sits on a region boundary; it is owned by
            // the neighbouring region and needs its own point delete.
            match self.delete_key(end) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        warn!("{} compensating point delete failed: {}", tag, e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => BatchResult::fail(deleted, e),
            None => BatchResult::ok(deleted),
        }
    }

    fn run_batch<T, B, M, D, O>(
        &self,
        tag: &'static str,
        items: Vec<T>,
        key_of: fn(&T) -> &[u8],
        make_body: B,
        merge: M,
        empty: D,
    ) -> BatchResult<O>
    where
        B: Fn(Vec<T>) -> RequestBody,
        M: FnOnce(&mut [SubBatchState]) -> O,
        D: Fn() -> O,
    {
        KV_COMMAND_COUNTER_VEC.with_label_values(&[tag]).inc();
        let timer = Instant::now();
        if items.is_empty() {
            return BatchResult::ok(empty());
        }

        let res = self.run_batch_inner(tag, items, key_of, make_body, merge, empty);
        self.finish_batch(tag, timer, res)
    }

    fn run_batch_inner<T, B, M, D, O>(
        &self,
        tag: &'static str,
        items: Vec<T>,
        key_of: fn(&T) -> &[u8],
        make_body: B,
        merge: M,
        empty: D,
    ) -> BatchResult<O>
    where
        B: Fn(Vec<T>) -> RequestBody,
        M: FnOnce(&mut [SubBatchState]) -> O,
        D: Fn() -> O,
    {
        let groups = match group_by_region(&self.cache, items, key_of) {
            Ok(groups) => groups,
            Err(e) => return BatchResult::fail(empty(), e),
        };
        let subs: Vec<SubBatchState> = groups
            .into_iter()
            .map(|(region, items)| SubBatchState::new(region, KvRequest::new(make_body(items))))
            .collect();
        SUB_BATCHES_HISTOGRAM_VEC
            .with_label_values(&[tag])
            .observe(subs.len() as f64);

        let mut subs = match dispatch(&self.controller, subs, self.deadline(), self.max_parallel) {
            Ok(subs) => subs,
            Err(e) => return BatchResult::fail(empty(), e),
        };
        let first_error = take_first_error(tag, &mut subs);
        let value = merge(&mut subs);
        match first_error {
            Some(e) => BatchResult::fail(value, e),
            None => BatchResult::ok(value),
        }
    }

    fn finish_batch<O>(
        &self,
        tag: &'static str,
        timer: Instant,
        res: BatchResult<O>,
    ) -> BatchResult<O> {
        KV_COMMAND_DURATION_HISTOGRAM_VEC
            .with_label_values(&[tag])
            .observe(duration_to_sec(timer.elapsed()));
        if let Some(ref e) = res.first_error {
            KV_COMMAND_FAILED_COUNTER_VEC
                .with_label_values(&[tag, e.tag()])
                .inc();
        }
        res
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("request_deadline", &self.request_deadline)
            .field("max_parallel", &self.max_parallel)
            .finish()
    }
}

fn mismatched_response(method: &str, body: &ResponseBody) -> Error {
    Error::Internal(format!("{} got mismatched response {:?}", method, body))
}

/// First non-ok sub-batch status in region-map order; every later failure
/// is logged and dropped.
fn take_first_error(tag: &str, subs: &mut [SubBatchState]) -> Option<Error> {
    let mut first = None;
    for sub in subs.iter_mut() {
        if let Some(e) = sub.status.take() {
            if first.is_none() {
                first = Some(e);
            } else {
                warn!("{} sub-batch to region {} failed: {}", tag, sub.region.id, e);
            }
        }
    }
    first
}

fn collect_pairs(subs: &mut [SubBatchState]) -> Vec<KvPair> {
    let mut pairs = Vec::new();
    for sub in subs {
        pairs.append(&mut sub.result_pairs);
    }
    pairs
}

fn collect_key_states(subs: &mut [SubBatchState]) -> Vec<KeyOpState> {
    let mut states = Vec::new();
    for sub in subs {
        states.append(&mut sub.key_states);
    }
    states
}

fn drop_output(_: &mut [SubBatchState]) {}

fn key_of_key(key: &Key) -> &[u8] {
    key
}

fn key_of_pair(pair: &KvPair) -> &[u8] {
    &pair.0
}

fn key_of_cas(item: &(KvPair, Value)) -> &[u8] {
    &(item.0).0
}
