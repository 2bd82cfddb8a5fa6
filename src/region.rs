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

use std::fmt;

use util::escape;

pub type Key = Vec<u8>;
pub type Value = Vec<u8>;
pub type KvPair = (Key, Value);

/// Per-key outcome of a conditional batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOpState {
    pub key: Key,
    pub applied: bool,
}

/// Topology generation of a region. Bumped on membership change
/// (`conf_ver`) and on split/merge (`version`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Epoch {
    pub conf_ver: u64,
    pub version: u64,
}

impl Epoch {
    pub fn new(conf_ver: u64, version: u64) -> Epoch {
        Epoch {
            conf_ver: conf_ver,
            version: version,
        }
    }

    /// Whether this epoch is superseded by `other`.
    pub fn is_stale(&self, other: &Epoch) -> bool {
        self.version < other.version || self.conf_ver < other.conf_ver
    }

    /// Whether this epoch strictly supersedes `other`. Both components must
    /// be at least as new and one of them strictly newer.
    pub fn is_newer_than(&self, other: &Epoch) -> bool {
        self.version >= other.version && self.conf_ver >= other.conf_ver && *self != *other
    }
}

/// One replica of a region, addressed by its store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub store_id: u64,
    pub addr: String,
}

impl Endpoint {
    pub fn new(store_id: u64, addr: &str) -> Endpoint {
        Endpoint {
            store_id: store_id,
            addr: addr.to_owned(),
        }
    }
}

/// A contiguous key-range shard of the keyspace.
///
/// Regions are immutable once published; routing updates install a new
/// `Region` value and swap it into the cache atomically.
#[derive(Clone, Default, PartialEq)]
pub struct Region {
    pub id: u64,
    /// Inclusive range start.
    pub start_key: Key,
    /// Exclusive range end; empty means unbounded.
    pub end_key: Key,
    pub epoch: Epoch,
    pub replicas: Vec<Endpoint>,
    /// Index into `replicas` of the believed leader. May be stale.
    pub leader_idx: usize,
}

impl Region {
    /// Check if key in region range [`start_key`, `end_key`).
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice() && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    /// The replica currently believed to be leader.
    pub fn leader(&self) -> Option<&Endpoint> {
        self.replicas.get(self.leader_idx)
    }

    /// Whether the range end is the end of the keyspace.
    pub fn is_last(&self) -> bool {
        self.end_key.is_empty()
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Region")
            .field("id", &self.id)
            .field("start_key", &escape(&self.start_key))
            .field("end_key", &escape(&self.end_key))
            .field("epoch", &self.epoch)
            .field("replicas", &self.replicas)
            .field("leader_idx", &self.leader_idx)
            .finish()
    }
}

/// The smallest key strictly greater than `key` (`key ⊕ 0x00`).
pub fn next_key(key: &[u8]) -> Key {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0);
    next
}
