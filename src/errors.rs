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

use std::error;
use std::result;
use std::time::Duration;

use region::Endpoint;
use util::escape;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        InvalidArgument(msg: String) {
            display("invalid argument: {}", msg)
        }
        IllegalState(msg: String) {
            display("illegal state: {}", msg)
        }
        NotFound {
            display("key not found")
        }
        RegionNotFound(key: Vec<u8>) {
            display("region not found for key {}", escape(key))
        }
        EpochMismatch(region_id: u64) {
            display("stale epoch for region {}", region_id)
        }
        LeaderChanged(region_id: u64, hint: Option<Endpoint>) {
            display("leader of region {} changed, hint {:?}", region_id, hint)
        }
        Timeout(elapsed: Duration) {
            display("timeout after {:?}", elapsed)
        }
        Network(msg: String) {
            display("network error: {}", msg)
        }
        Internal(msg: String) {
            display("internal error: {}", msg)
        }
        Other(err: Box<error::Error + Sync + Send>) {
            from()
            cause(err.as_ref())
            display("unknown error {:?}", err)
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn maybe_clone(&self) -> Option<Error> {
        match *self {
            Error::InvalidArgument(ref msg) => Some(Error::InvalidArgument(msg.clone())),
            Error::IllegalState(ref msg) => Some(Error::IllegalState(msg.clone())),
            Error::NotFound => Some(Error::NotFound),
            Error::RegionNotFound(ref key) => Some(Error::RegionNotFound(key.clone())),
            Error::EpochMismatch(id) => Some(Error::EpochMismatch(id)),
            Error::LeaderChanged(id, ref hint) => Some(Error::LeaderChanged(id, hint.clone())),
            Error::Timeout(elapsed) => Some(Error::Timeout(elapsed)),
            Error::Network(ref msg) => Some(Error::Network(msg.clone())),
            Error::Internal(ref msg) => Some(Error::Internal(msg.clone())),
            Error::Other(_) => None,
        }
    }

    /// Whether the controller may recover from this error by retrying the
    /// same call, possibly after a topology refresh.
    pub fn is_retryable(&self) -> bool {
        match *self {
            Error::RegionNotFound(_)
            | Error::EpochMismatch(_)
            | Error::LeaderChanged(..)
            | Error::Timeout(_)
            | Error::Network(_) => true,
            _ => false,
        }
    }

    /// Whether the error signals stale routing metadata that must be
    /// invalidated before the next attempt.
    pub fn requires_refresh(&self) -> bool {
        match *self {
            Error::RegionNotFound(_) | Error::EpochMismatch(_) => true,
            _ => false,
        }
    }

    pub fn tag(&self) -> &'static str {
        match *self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::IllegalState(_) => "illegal_state",
            Error::NotFound => "not_found",
            Error::RegionNotFound(_) => "region_not_found",
            Error::EpochMismatch(_) => "epoch_mismatch",
            Error::LeaderChanged(..) => "leader_changed",
            Error::Timeout(_) => "timeout",
            Error::Network(_) => "network",
            Error::Internal(_) => "internal",
            Error::Other(_) => "other",
        }
    }
}
