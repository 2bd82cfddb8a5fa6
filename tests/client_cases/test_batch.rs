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

use rangekv::{Error, KvPair};

use mock_cluster::{Fault, MockCluster};

use super::{b, new_client, new_client_with_config, test_config};

fn sorted(mut pairs: Vec<KvPair>) -> Vec<KvPair> {
    pairs.sort();
    pairs
}

#[test]
fn test_single_region_batch_get() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    client
        .batch_put(vec![
            (b("b"), b("vb")),
            (b("d"), b("vd")),
            (b("f"), b("vf")),
        ])
        .into_result()
        .unwrap();
    assert_eq!(cluster.rpc_count("batch_put"), 1);

    let pairs = client
        .batch_get(vec![b("b"), b("d"), b("f")])
        .into_result()
        .unwrap();
    // One region in play, so the whole batch is a single RPC.
    assert_eq!(cluster.rpc_count("batch_get"), 1);
    assert_eq!(
        sorted(pairs),
        vec![(b("b"), b("vb")), (b("d"), b("vd")), (b("f"), b("vf"))]
    );
}

#[test]
fn test_batch_get_across_regions_omits_missing() {
    let cluster = MockCluster::new(&[b"g", b"p"]);
    let client = new_client(&cluster);

    client
        .batch_put(vec![(b("a"), b("1")), (b("h"), b("2")), (b("q"), b("3"))])
        .into_result()
        .unwrap();
    assert_eq!(cluster.rpc_count("batch_put"), 3);

    let pairs = client
        .batch_get(vec![b("a"), b("h"), b("missing"), b("q"), b("zz")])
        .into_result()
        .unwrap();
    // Output order is concatenation over sub-batches; only the multiset is
    // promised, and missing keys are left out.
    assert_eq!(
        sorted(pairs),
        vec![(b("a"), b("1")), (b("h"), b("2")), (b("q"), b("3"))]
    );
}

#[test]
fn test_two_region_batch_put_recovers_from_stale_epoch() {
    let cluster = MockCluster::new(&[b"m"]);
    let client = new_client(&cluster);

    // Warm the cache for both regions, then age the right one.
    client.put(b("a"), b("seed")).unwrap();
    client.put(b("n"), b("seed")).unwrap();
    cluster.bump_epoch(b"n");

    client
        .batch_put(vec![(b("a"), b("1")), (b("m"), b("2")), (b("p"), b("3"))])
        .into_result()
        .unwrap();
    // One RPC for the left region, two for the right: the stale attempt
    // plus the retry after the cache refresh.
    assert_eq!(cluster.rpc_count("batch_put"), 3);

    assert_eq!(client.get(b("a")).unwrap(), b("1"));
    assert_eq!(client.get(b("m")).unwrap(), b("2"));
    assert_eq!(client.get(b("p")).unwrap(), b("3"));
}

#[test]
fn test_batch_partial_failure_keeps_partial_results() {
    let cluster = MockCluster::new(&[b"m"]);
    let client = {
        let mut cfg = test_config();
        cfg.request_max_retry = 2;
        new_client_with_config(&cluster, cfg)
    };

    client
        .batch_put(vec![(b("a"), b("1")), (b("n"), b("2"))])
        .into_result()
        .unwrap();

    // Make the right region unreachable for longer than the retry budget.
    let right = cluster.region_id_at(b"n");
    cluster.inject_faults(right, vec![Fault::Net, Fault::Net]);

    let res = client.batch_get(vec![b("a"), b("n")]);
    match res.first_error {
        Some(Error::Network(_)) => {}
        ref other => panic!("expect Network, got {:?}", other),
    }
    // The healthy sub-batch still contributed its rows.
    assert_eq!(res.value, vec![(b("a"), b("1"))]);
}

#[test]
fn test_batch_delete_across_regions() {
    let cluster = MockCluster::new(&[b"g"]);
    let client = new_client(&cluster);

    client
        .batch_put(vec![(b("a"), b("1")), (b("b"), b("2")), (b("h"), b("3"))])
        .into_result()
        .unwrap();
    client
        .batch_delete(vec![b("a"), b("h")])
        .into_result()
        .unwrap();
    assert_eq!(cluster.rpc_count("batch_delete"), 2);

    assert!(client.get(b("a")).is_err());
    assert_eq!(client.get(b("b")).unwrap(), b("2"));
    assert!(client.get(b("h")).is_err());
}

#[test]
fn test_batch_put_if_absent_is_atomic_per_region() {
    let cluster = MockCluster::new(&[b"m"]);
    let client = new_client(&cluster);

    // "b" already exists, so the whole left-region sub-batch must not
    // apply; the right region is untouched by that conflict.
    client.put(b("b"), b("old")).unwrap();
    let states = client
        .batch_put_if_absent(vec![(b("a"), b("1")), (b("b"), b("2")), (b("x"), b("3"))])
        .into_result()
        .unwrap();

    let mut applied: Vec<(Vec<u8>, bool)> =
        states.into_iter().map(|s| (s.key, s.applied)).collect();
    applied.sort();
    assert_eq!(
        applied,
        vec![(b("a"), false), (b("b"), false), (b("x"), true)]
    );
    assert!(client.get(b("a")).is_err());
    assert_eq!(client.get(b("b")).unwrap(), b("old"));
    assert_eq!(client.get(b("x")).unwrap(), b("3"));
}

#[test]
fn test_batch_compare_and_set() {
    let cluster = MockCluster::new(&[b"m"]);
    let client = new_client(&cluster);

    client
        .batch_put(vec![(b("a"), b("1")), (b("n"), b("2"))])
        .into_result()
        .unwrap();

    let states = client
        .batch_compare_and_set(
            vec![(b("a"), b("10")), (b("n"), b("20")), (b("q"), b("30"))],
            vec![b("1"), b("wrong"), b("")],
        )
        .into_result()
        .unwrap();
    let mut applied: Vec<(Vec<u8>, bool)> =
        states.into_iter().map(|s| (s.key, s.applied)).collect();
    applied.sort();
    assert_eq!(
        applied,
        vec![(b("a"), true), (b("n"), false), (b("q"), true)]
    );

    assert_eq!(client.get(b("a")).unwrap(), b("10"));
    assert_eq!(client.get(b("n")).unwrap(), b("2"));
    assert_eq!(client.get(b("q")).unwrap(), b("30"));
}

#[test]
fn test_batch_compare_and_set_size_mismatch() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    let res = client.batch_compare_and_set(vec![(b("k1"), b("v"))], vec![]);
    match res.first_error {
        Some(Error::InvalidArgument(_)) => {}
        ref other => panic!("expect InvalidArgument, got {:?}", other),
    }
    // Rejected before any region is contacted.
    assert_eq!(cluster.rpc_count("batch_compare_and_set"), 0);
    assert_eq!(cluster.scan_count(), 0);
}

#[test]
fn test_empty_batches_are_noops() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    assert!(client.batch_get(vec![]).into_result().unwrap().is_empty());
    client.batch_put(vec![]).into_result().unwrap();
    client.batch_delete(vec![]).into_result().unwrap();
    assert_eq!(cluster.scan_count(), 0);
}
