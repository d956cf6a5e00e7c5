// MIT License
//
// Copyright (c) 2019 Gregory Meyer
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use exthash::{locked, lockfree, Builder, Error, ExtendibleMap};

use std::{
    hash::{BuildHasherDefault, Hasher},
    sync::{Arc, Barrier},
    thread,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct ZeroHasher;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _: &[u8]) {}
}

fn round_trip<M: ExtendibleMap<u64, String>>(map: &M) {
    for i in 0..1000 {
        assert_eq!(map.put(i, i.to_string()), Ok(None));
        assert_eq!(map.get(&i), Some(i.to_string()));
    }

    let stats = map.stats();
    assert_eq!(stats.len, 1000);
    assert_eq!(stats.num_slots, 1 << stats.global_depth);
    assert!(stats.num_buckets <= stats.num_slots);
    assert!(stats.num_buckets * stats.bucket_capacity >= stats.len);
}

fn idempotent_remove<M: ExtendibleMap<u64, String>>(map: &M) {
    assert!(map.remove(&7));
    let stats = map.stats();

    assert!(!map.remove(&7));
    assert_eq!(map.stats(), stats);
    assert_eq!(map.get(&7), None);

    assert_eq!(map.put(7, "seven".to_string()), Ok(None));
    assert_eq!(map.get(&7), Some("seven".to_string()));
}

#[test]
fn locked_round_trip_and_remove() {
    init_logger();

    let map = locked::HashMap::new(4);
    round_trip(&map);
    idempotent_remove(&map);
}

#[test]
fn lockfree_round_trip_and_remove() {
    init_logger();

    let map = lockfree::HashMap::new(4);
    round_trip(&map);
    idempotent_remove(&map);
}

#[test]
fn builder_configures_both_variants() {
    init_logger();

    let locked = Builder::new()
        .bucket_capacity(2)
        .initial_depth(4)
        .build_locked::<u64, u64>();
    let lockfree = Builder::new()
        .bucket_capacity(2)
        .initial_depth(4)
        .build_lockfree::<u64, u64>();

    for stats in [locked.stats(), lockfree.stats()] {
        assert_eq!(stats.global_depth, 4);
        assert_eq!(stats.num_slots, 16);
        assert_eq!(stats.num_buckets, 16);
        assert_eq!(stats.bucket_capacity, 2);
        assert_eq!(stats.len, 0);
    }
}

#[test]
fn depth_exhaustion_is_reported() {
    init_logger();

    let hasher = BuildHasherDefault::<ZeroHasher>::default();
    let map = Builder::new()
        .bucket_capacity(1)
        .hasher(hasher)
        .build_lockfree();

    assert_eq!(map.put(1, ()), Ok(None));

    let err = map.put(2, ()).unwrap_err();
    assert_eq!(
        err,
        Error::DepthExhausted {
            local_depth: 1,
            max_depth: 32
        }
    );
    assert_eq!(
        err.to_string(),
        "cannot split a full bucket at local depth 1: \
        its keys are indistinguishable within the maximum depth of 32 hash bits"
    );
}

fn disjoint_writers<M: ExtendibleMap<usize, usize> + Send + Sync + 'static>(map: M) {
    const NUM_THREADS: usize = 8;
    const KEYS_PER_THREAD: usize = 2048;

    let map = Arc::new(map);
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let map = map.clone();
            let barrier = barrier.clone();

            thread::spawn(move || {
                barrier.wait();

                for k in (0..KEYS_PER_THREAD).map(|k| k * NUM_THREADS + i) {
                    assert_eq!(map.put(k, k * 3), Ok(None));
                }
            })
        })
        .collect();

    for result in threads.into_iter().map(|t| t.join()) {
        assert!(result.is_ok());
    }

    assert_eq!(map.len(), NUM_THREADS * KEYS_PER_THREAD);

    for k in 0..NUM_THREADS * KEYS_PER_THREAD {
        assert_eq!(map.get(&k), Some(k * 3));
    }
}

#[test]
fn locked_disjoint_writers() {
    init_logger();
    disjoint_writers(locked::HashMap::new(8));
}

#[test]
fn lockfree_disjoint_writers() {
    init_logger();
    disjoint_writers(lockfree::HashMap::new(8));
}
