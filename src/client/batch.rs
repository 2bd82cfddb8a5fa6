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

use std::cmp;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use cache::MetaCache;
use errors::{Error, Result};
use region::{KeyOpState, KvPair, Region};
use rpc::{KvRequest, ResponseBody, RpcController};
use util::collections::HashMap;

/// The portion of a user-level batch routed to a single region, together
/// with the slots its response is unpacked into. Owned by one orchestrator
/// call; written by exactly one worker; read by the parent after join.
pub struct SubBatchState {
    pub region: Arc<Region>,
    pub rpc: KvRequest,
    /// `None` until the worker records a failure.
    pub status: Option<Error>,
    pub result_pairs: Vec<KvPair>,
    pub key_states: Vec<KeyOpState>,
    pub delete_count: u64,
}

impl SubBatchState {
    pub fn new(region: Arc<Region>, rpc: KvRequest) -> SubBatchState {
        SubBatchState {
            region: region,
            rpc: rpc,
            status: None,
            result_pairs: Vec::new(),
            key_states: Vec::new(),
            delete_count: 0,
        }
    }

    fn run(mut self, controller: &RpcController, deadline: Instant) -> SubBatchState {
        let region = Arc::clone(&self.region);
        match controller.call(&mut self.rpc, region, deadline) {
            Ok(resp) => self.absorb(resp.body),
            Err(e) => self.status = Some(e),
        }
        self
    }

    fn absorb(&mut self, body: ResponseBody) {
        match body {
            ResponseBody::BatchGet { pairs } => self.result_pairs = pairs,
            ResponseBody::BatchPutIfAbsent { states }
            | ResponseBody::BatchCompareAndSet { states } => self.key_states = states,
            ResponseBody::DeleteRange { deleted } => self.delete_count = deleted,
            ResponseBody::BatchPut | ResponseBody::BatchDelete => {}
            other => {
                self.status = Some(Error::Internal(format!(
                    "{} got mismatched response {:?}",
                    self.rpc.method(),
                    other
                )));
            }
        }
    }
}

/// Partition `items` by owning region, preserving first-seen region order.
/// Any lookup failure aborts the whole batch: without a region nothing can
/// be sent.
pub fn group_by_region<T>(
    cache: &MetaCache,
    items: Vec<T>,
    key_of: fn(&T) -> &[u8],
) -> Result<Vec<(Arc<Region>, Vec<T>)>> {
    let mut groups: Vec<(Arc<Region>, Vec<T>)> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::default();
    for item in items {
        let region = cache.lookup_region_by_key(key_of(&item))?;
        match index.get(&region.id) {
            Some(&at) => groups[at].1.push(item),
            None => {
                index.insert(region.id, groups.len());
                groups.push((region, vec![item]));
            }
        }
    }
    Ok(groups)
}

/// Run every sub-batch to completion with bounded fan-out. Within a wave
/// all but the first sub-batch get their own worker thread and the first
/// runs on the calling thread; the next wave starts only after the current
/// one is fully joined, so nothing outlives this call.
pub fn dispatch(
    controller: &Arc<RpcController>,
    subs: Vec<SubBatchState>,
    deadline: Instant,
    max_parallel: usize,
) -> Result<Vec<SubBatchState>> {
    let mut pending = subs;
    let mut done = Vec::with_capacity(pending.len());
    let mut worker_lost = false;

    while !pending.is_empty() {
        let rest = pending.split_off(cmp::min(max_parallel, pending.len()));
        let mut wave = pending.into_iter();
        pending = rest;

        let first = match wave.next() {
            Some(first) => first,
            None => break,
        };
        let handles: Vec<thread::JoinHandle<SubBatchState>> = wave
            .map(|sub| {
                let controller = Arc::clone(controller);
                thread::Builder::new()
                    .name(format!("sub-batch-{}", sub.region.id))
                    .spawn(move || sub.run(&controller, deadline))
                    .unwrap()
            })
            .collect();

        done.push(first.run(controller, deadline));
        for handle in handles {
            match handle.join() {
                Ok(sub) => done.push(sub),
                Err(e) => {
                    error!("sub-batch worker panicked: {:?}", e);
                    worker_lost = true;
                }
            }
        }
    }

    if worker_lost {
        return Err(Error::Internal("sub-batch worker panicked".to_owned()));
    }
    Ok(done)
}
