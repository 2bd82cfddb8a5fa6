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

use rangekv::Error;

use mock_cluster::MockCluster;

use super::{b, new_client};

#[test]
fn test_put_then_get() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    client.put(b("x"), b("100")).unwrap();
    assert_eq!(client.get(b("x")).unwrap(), b("100"));

    // Overwrite is unconditional.
    client.put(b("x"), b("101")).unwrap();
    assert_eq!(client.get(b("x")).unwrap(), b("101"));
}

#[test]
fn test_get_missing_is_an_error() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    match client.get(b("nope")) {
        Err(Error::NotFound) => {}
        other => panic!("expect NotFound, got {:?}", other),
    }
}

#[test]
fn test_delete_then_get() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    client.put(b("x"), b("100")).unwrap();
    client.delete(b("x")).unwrap();
    match client.get(b("x")) {
        Err(Error::NotFound) => {}
        other => panic!("expect NotFound, got {:?}", other),
    }
    // Deleting a missing key is not an error.
    client.delete(b("x")).unwrap();
}

#[test]
fn test_put_if_absent() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    assert!(client.put_if_absent(b("x"), b("1")).unwrap());
    assert!(!client.put_if_absent(b("x"), b("2")).unwrap());
    assert_eq!(client.get(b("x")).unwrap(), b("1"));
}

#[test]
fn test_compare_and_set() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    client.put(b("x"), b("1")).unwrap();
    let current = client.get(b("x")).unwrap();
    assert!(client.compare_and_set(b("x"), b("2"), current).unwrap());
    assert_eq!(client.get(b("x")).unwrap(), b("2"));

    assert!(!client.compare_and_set(b("x"), b("3"), b("1")).unwrap());
    assert_eq!(client.get(b("x")).unwrap(), b("2"));

    // An empty expectation matches an absent key.
    assert!(client.compare_and_set(b("y"), b("1"), b("")).unwrap());
    assert_eq!(client.get(b("y")).unwrap(), b("1"));
}

#[test]
fn test_empty_key_rejected() {
    let cluster = MockCluster::new(&[]);
    let client = new_client(&cluster);

    match client.get(Vec::new()) {
        Err(Error::InvalidArgument(_)) => {}
        other => panic!("expect InvalidArgument, got {:?}", other),
    }
    assert_eq!(cluster.rpc_count("get"), 0);
}
