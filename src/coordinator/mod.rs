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

//! The coordinator owns the authoritative region map. The client only ever
//! asks it which regions cover a key range; everything else (member
//! discovery, heartbeats, balancing) stays on the server side and behind
//! whatever transport the embedder wires in.

use errors::{Error, Result};
use region::{next_key, Region};

pub trait CoordinatorClient: Send + Sync {
    /// Scan regions whose ranges intersect `[start, end)`, in range order,
    /// at most `limit` of them.
    fn scan_regions(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<Region>>;

    /// The region owning `key`.
    fn get_region(&self, key: &[u8]) -> Result<Region> {
        let end = next_key(key);
        let mut regions = self.scan_regions(key, &end, 1)?;
        match regions.pop() {
            Some(ref r) if !r.contains(key) => Err(Error::RegionNotFound(key.to_vec())),
            Some(r) => Ok(r),
            None => Err(Error::RegionNotFound(key.to_vec())),
        }
    }
}
