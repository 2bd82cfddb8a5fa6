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

//! Method-specific request/response pairs and the abstract store channel.
//!
//! The wire codec lives behind `KvChannel`; this module only fixes the
//! shape every method shares: a routing context `{region_id, epoch,
//! request_id}` plus one tagged body per method, so workers never downcast.

use std::time::Duration;

use uuid::Uuid;

use errors::Result;
use region::{Endpoint, Epoch, Key, KeyOpState, KvPair, Value};

pub mod controller;
mod metrics;

pub use self::controller::RpcController;

/// Routing context attached to every store RPC.
///
/// `request_id` identifies the logical call and stays fixed across every
/// retry of it, so the store can deduplicate re-sent writes.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcContext {
    pub region_id: u64,
    pub epoch: Epoch,
    pub request_id: Uuid,
}

impl RpcContext {
    fn new() -> RpcContext {
        RpcContext {
            region_id: 0,
            epoch: Epoch::default(),
            request_id: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Get {
        key: Key,
    },
    BatchGet {
        keys: Vec<Key>,
    },
    Put {
        key: Key,
        value: Value,
    },
    BatchPut {
        pairs: Vec<KvPair>,
    },
    PutIfAbsent {
        key: Key,
        value: Value,
    },
    BatchPutIfAbsent {
        pairs: Vec<KvPair>,
        atomic: bool,
    },
    Delete {
        key: Key,
    },
    BatchDelete {
        keys: Vec<Key>,
    },
    DeleteRange {
        start_key: Key,
        end_key: Key,
        with_start: bool,
        with_end: bool,
    },
    CompareAndSet {
        key: Key,
        value: Value,
        expect: Value,
    },
    BatchCompareAndSet {
        pairs: Vec<KvPair>,
        expects: Vec<Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Get { value: Option<Value> },
    BatchGet { pairs: Vec<KvPair> },
    Put,
    BatchPut,
    PutIfAbsent { applied: bool },
    BatchPutIfAbsent { states: Vec<KeyOpState> },
    Delete { existed: bool },
    BatchDelete,
    DeleteRange { deleted: u64 },
    CompareAndSet { applied: bool },
    BatchCompareAndSet { states: Vec<KeyOpState> },
}

/// Error a store reports about the routing of a request, as opposed to a
/// transport failure. These are what the controller recovers from.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionError {
    NotLeader {
        region_id: u64,
        leader: Option<Endpoint>,
    },
    RegionNotFound {
        region_id: u64,
    },
    EpochMismatch {
        region_id: u64,
        current: Epoch,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KvRequest {
    pub context: RpcContext,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KvResponse {
    pub region_error: Option<RegionError>,
    pub body: ResponseBody,
}

impl KvRequest {
    pub fn new(body: RequestBody) -> KvRequest {
        KvRequest {
            context: RpcContext::new(),
            body: body,
        }
    }

    pub fn method(&self) -> &'static str {
        match self.body {
            RequestBody::Get { .. } => "get",
            RequestBody::BatchGet { .. } => "batch_get",
            RequestBody::Put { .. } => "put",
            RequestBody::BatchPut { .. } => "batch_put",
            RequestBody::PutIfAbsent { .. } => "put_if_absent",
            RequestBody::BatchPutIfAbsent { .. } => "batch_put_if_absent",
            RequestBody::Delete { .. } => "delete",
            RequestBody::BatchDelete { .. } => "batch_delete",
            RequestBody::DeleteRange { .. } => "delete_range",
            RequestBody::CompareAndSet { .. } => "compare_and_set",
            RequestBody::BatchCompareAndSet { .. } => "batch_compare_and_set",
        }
    }

    /// The key the request is routed by. For multi-key bodies every key is
    /// in the same region, so the first one stands for all of them.
    pub fn routing_key(&self) -> &[u8] {
        const EMPTY: &[u8] = b"";
        match self.body {
            RequestBody::Get { ref key }
            | RequestBody::Put { ref key, .. }
            | RequestBody::PutIfAbsent { ref key, .. }
            | RequestBody::Delete { ref key }
            | RequestBody::CompareAndSet { ref key, .. } => key,
            RequestBody::BatchGet { ref keys } | RequestBody::BatchDelete { ref keys } => {
                keys.first().map_or(EMPTY, |k| k.as_slice())
            }
            RequestBody::BatchPut { ref pairs }
            | RequestBody::BatchPutIfAbsent { ref pairs, .. }
            | RequestBody::BatchCompareAndSet { ref pairs, .. } => {
                pairs.first().map_or(EMPTY, |kv| kv.0.as_slice())
            }
            RequestBody::DeleteRange { ref start_key, .. } => start_key,
        }
    }
}

impl KvResponse {
    pub fn ok(body: ResponseBody) -> KvResponse {
        KvResponse {
            region_error: None,
            body: body,
        }
    }

    pub fn region_error(err: RegionError, body: ResponseBody) -> KvResponse {
        KvResponse {
            region_error: Some(err),
            body: body,
        }
    }
}

/// An abstract channel to store nodes. The embedder supplies the transport;
/// a call either yields the store's response (which may still carry a
/// `RegionError`) or fails with `Error::Network`/`Error::Timeout`.
pub trait KvChannel: Send + Sync {
    fn call(&self, addr: &str, req: &KvRequest, timeout: Duration) -> Result<KvResponse>;
}
