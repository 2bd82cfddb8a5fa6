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

use prometheus::*;

lazy_static! {
    pub static ref RPC_SEND_COUNTER_VEC: CounterVec =
        register_counter_vec!(
            "rangekv_client_rpc_send_total",
            "Total number of RPC attempts sent to stores.",
            &["type"]
        ).unwrap();

    pub static ref RPC_RETRY_COUNTER_VEC: CounterVec =
        register_counter_vec!(
            "rangekv_client_rpc_retry_total",
            "Total number of RPC retries, by trigger.",
            &["type", "reason"]
        ).unwrap();

    pub static ref RPC_DURATION_HISTOGRAM_VEC: HistogramVec =
        register_histogram_vec!(
            "rangekv_client_rpc_duration_seconds",
            "Bucketed histogram of complete RPC calls, retries included.",
            &["type"],
            exponential_buckets(0.0005, 2.0, 20).unwrap()
        ).unwrap();
}
