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

//! Client SDK for a range-partitioned, replicated key-value store.
//!
//! The cluster shards the keyspace into regions, each a half-open key
//! range served by a replica group with a leader. This crate keeps a
//! client-side map of that topology, routes every operation to the region
//! owning its keys, scatters batches across regions concurrently and
//! gathers the per-region outcomes back into one result.
//!
//! Transport is abstract: embedders supply a [`coordinator::CoordinatorClient`]
//! for topology queries and a [`rpc::KvChannel`] for store RPCs.

#![crate_type = "lib"]

extern crate fnv;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate quick_error;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[cfg(test)]
extern crate toml;
extern crate uuid;

#[macro_use]
pub mod util;
pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod region;
pub mod rpc;

pub use client::{BatchResult, Client};
pub use config::Config;
pub use errors::{Error, Result};
pub use region::{Endpoint, Epoch, Key, KeyOpState, KvPair, Region, Value};
