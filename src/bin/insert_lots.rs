use exthash::lockfree::HashMap;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

fn main() {
    const NUM_THREADS: usize = 64;
    const KEYS_PER_THREAD: usize = 1 << 12;

    let keep_running = Arc::new(AtomicBool::new(true));
    let map = Arc::new(HashMap::new(8));
    let threads: Vec<_> = (0..NUM_THREADS)
        .map(|i| {
            let keep_running = keep_running.clone();
            let map = map.clone();

            thread::spawn(move || {
                let mut j = 0;

                while keep_running.load(Ordering::Relaxed) {
                    let key = i * KEYS_PER_THREAD + j % KEYS_PER_THREAD;

                    if map.put(key, j).is_err() {
                        eprintln!("failed to insert key {}", key);
                    }

                    if j % 3 == 0 {
                        map.remove(&key);
                    }

                    j += 1;
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_secs(5));
    keep_running.store(false, Ordering::Relaxed);

    let results = threads.into_iter().map(|t| t.join());

    for result in results.into_iter() {
        assert!(result.is_ok());
    }

    let stats = map.stats();
    println!(
        "{} entries in {} buckets behind {} slots (global depth {})",
        stats.len,
        stats.num_buckets,
        stats.num_slots,
        stats.global_depth
    );
}
