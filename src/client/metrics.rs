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
    pub static ref KV_COMMAND_COUNTER_VEC: CounterVec =
        register_counter_vec!(
            "rangekv_client_command_total",
            "Total number of commands received.",
            &["type"]
        ).unwrap();

    pub static ref KV_COMMAND_DURATION_HISTOGRAM_VEC: HistogramVec =
        register_histogram_vec!(
            "rangekv_client_command_duration_seconds",
            "Bucketed histogram of command execution.",
            &["type"],
            exponential_buckets(0.0005, 2.0, 20).unwrap()
        ).unwrap();

    pub static ref SUB_BATCHES_HISTOGRAM_VEC: HistogramVec =
        register_histogram_vec!(
            "rangekv_client_sub_batches_per_command",
            "Bucketed histogram of per-region sub-batches a command scattered into.",
            &["type"],
            vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0]
        ).unwrap();

    pub static ref KV_COMMAND_FAILED_COUNTER_VEC: CounterVec =
        register_counter_vec!(
            "rangekv_client_command_failed_total",
            "Total number of commands finished with a non-ok status.",
            &["type", "error"]
        ).unwrap();
}
