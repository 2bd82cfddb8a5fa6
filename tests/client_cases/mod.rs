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

use std::sync::Arc;

use rangekv::coordinator::CoordinatorClient;
use rangekv::rpc::KvChannel;
use rangekv::util::config::ReadableDuration;
use rangekv::{Client, Config};

use mock_cluster::MockCluster;

mod test_batch;
mod test_failover;
mod test_simple;

pub fn new_client(cluster: &Arc<MockCluster>) -> Client {
    new_client_with_config(cluster, test_config())
}

pub fn new_client_with_config(cluster: &Arc<MockCluster>, cfg: Config) -> Client {
    Client::new(
        Arc::clone(cluster) as Arc<dyn CoordinatorClient>,
        Arc::clone(cluster) as Arc<dyn KvChannel>,
        &cfg,
    ).unwrap()
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.request_deadline = ReadableDuration::secs(5);
    cfg.backoff_base = ReadableDuration::millis(1);
    cfg.backoff_cap = ReadableDuration::millis(4);
    cfg
}

pub fn b(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}
