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

use errors::Result;
use util::config::ReadableDuration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;
const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 30;
const DEFAULT_BACKOFF_BASE_MILLIS: u64 = 50;
const DEFAULT_BACKOFF_CAP_MILLIS: u64 = 2000;
const DEFAULT_MAX_PARALLEL_SUB_BATCHES: usize = 16;
const DEFAULT_REGION_CACHE_TTL_SECS: u64 = 600;

/// Client configuration.
///
/// `request-max-retry = 0` means retry until the call deadline expires.
/// `region-cache-ttl = 0s` disables cache expiry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    // Coordinator addresses, used by the coordinator client the embedder
    // plugs in; kept here so one config file describes the whole client.
    pub coordinator_endpoints: Vec<String>,

    // Timeout of a single RPC attempt.
    pub request_timeout: ReadableDuration,
    // Total budget of one logical call, retries included.
    pub request_deadline: ReadableDuration,
    // Attempt limit per logical call; 0 leaves only the deadline.
    pub request_max_retry: usize,

    pub backoff_base: ReadableDuration,
    pub backoff_cap: ReadableDuration,

    pub max_parallel_sub_batches: usize,
    pub region_cache_ttl: ReadableDuration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            coordinator_endpoints: Vec::new(),
            request_timeout: ReadableDuration::secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            request_deadline: ReadableDuration::secs(DEFAULT_REQUEST_DEADLINE_SECS),
            request_max_retry: 0,
            backoff_base: ReadableDuration::millis(DEFAULT_BACKOFF_BASE_MILLIS),
            backoff_cap: ReadableDuration::millis(DEFAULT_BACKOFF_CAP_MILLIS),
            max_parallel_sub_batches: DEFAULT_MAX_PARALLEL_SUB_BATCHES,
            region_cache_ttl: ReadableDuration::secs(DEFAULT_REGION_CACHE_TTL_SECS),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(box_err!("request-timeout should not be 0."));
        }
        if self.request_deadline.is_zero() {
            return Err(box_err!("request-deadline should not be 0."));
        }
        if self.request_deadline < self.request_timeout {
            return Err(box_err!(
                "request-deadline {:?} is below request-timeout {:?}.",
                self.request_deadline,
                self.request_timeout
            ));
        }
        if self.backoff_base.is_zero() || self.backoff_cap < self.backoff_base {
            return Err(box_err!(
                "backoff range [{:?}, {:?}] is invalid.",
                self.backoff_base,
                self.backoff_cap
            ));
        }
        if self.max_parallel_sub_batches == 0 {
            return Err(box_err!("max-parallel-sub-batches should not be 0."));
        }
        Ok(())
    }
}
