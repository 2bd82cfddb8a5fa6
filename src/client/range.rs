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

//! Walks a user range across region boundaries, producing one in-region
//! sub-range per region touched.
//!
//! Interior boundaries become half-open: the boundary key belongs to the
//! next region and is covered by that region's sub-range starting
//! inclusively at it. When the user's inclusive `end` lands exactly on a
//! region boundary the walk cannot cover it with any sub-range, so the
//! caller owes a separate point delete of `end`.

use std::sync::Arc;

use cache::MetaCache;
use errors::{Error, Result};
use region::{Key, Region};
use util::collections::HashSet;
use util::escape;

/// A piece of the user range that lies entirely inside one region.
#[derive(Debug)]
pub struct RangePart {
    pub region: Arc<Region>,
    pub start_key: Key,
    pub end_key: Key,
    pub with_start: bool,
    pub with_end: bool,
}

/// Split `[start, end]` (inclusivity per `with_start`/`with_end`) into
/// per-region parts. The second return is whether a compensating point
/// delete of `end` must be issued.
pub fn plan_delete_range(
    cache: &MetaCache,
    start: &[u8],
    end: &[u8],
    with_start: bool,
    with_end: bool,
) -> Result<(Vec<RangePart>, bool)> {
    if start.is_empty() || end.is_empty() {
        return Err(Error::IllegalState(
            "delete range bounds must be non-empty".to_owned(),
        ));
    }
    if start >= end {
        return Err(Error::IllegalState(format!(
            "delete range start {} is not below end {}",
            escape(start),
            escape(end)
        )));
    }

    let mut parts = Vec::new();
    let mut delete_end_key = false;
    let mut visited: HashSet<u64> = HashSet::default();
    let mut cursor = start.to_vec();
    let mut cursor_inclusive = with_start;

    loop {
        let region = cache.lookup_region_by_key(&cursor)?;
        debug_assert!(
            visited.insert(region.id),
            "range walk revisited region {}",
            region.id
        );

        if region.is_last() || end < region.end_key.as_slice() {
            // The rest of the user range sits inside this region, so the
            // user's end inclusivity passes through unchanged.
            parts.push(RangePart {
                region: region,
                start_key: cursor,
                end_key: end.to_vec(),
                with_start: cursor_inclusive,
                with_end: with_end,
            });
            return Ok((parts, delete_end_key));
        }

        if end == region.end_key.as_slice() {
            // The range ends exactly on this region's boundary. `end`
            // itself is owned by the next region over, so an inclusive end
            // needs the point delete instead of a wider sub-range.
            parts.push(RangePart {
                region: region,
                start_key: cursor,
                end_key: end.to_vec(),
                with_start: cursor_inclusive,
                with_end: false,
            });
            if with_end {
                delete_end_key = true;
            }
            return Ok((parts, delete_end_key));
        }

        let next = region.end_key.clone();
        parts.push(RangePart {
            end_key: next.clone(),
            start_key: cursor,
            with_start: cursor_inclusive,
            with_end: false,
            region: region,
        });
        cursor = next;
        cursor_inclusive = true;
    }
}
