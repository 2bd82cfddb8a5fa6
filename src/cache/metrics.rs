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
    pub static ref CACHE_LOOKUP_COUNTER_VEC: CounterVec =
        register_counter_vec!(
            "rangekv_client_region_cache_lookup_total",
            "Total number of region cache lookups.",
            &["result"]
        ).unwrap();

    pub static ref CACHE_REFRESH_COUNTER_VEC: CounterVec =
        register_counter_vec!(
            "rangekv_client_region_cache_refresh_total",
            "Total number of coordinator refreshes issued by the region cache.",
            &["result"]
        ).unwrap();

    pub static ref CACHE_INVALIDATE_COUNTER: Counter =
        register_counter!(
            "rangekv_client_region_cache_invalidate_total",
            "Total number of regions dropped on staleness feedback."
        ).unwrap();
}
