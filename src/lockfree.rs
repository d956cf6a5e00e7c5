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

//! A lockfree extendible hash map built on compare-and-swap.


use crate::{
    common::{
        self,
        bucket::{Bucket, Entry, PutOutcome},
        directory::Directory,
        Builder, DefaultHashBuilder, Stats,
    },
    Error,
};

use std::{
    borrow::Borrow,
    collections::HashSet,
    hash::{BuildHasher, Hash},
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};

use crossbeam_epoch::{self, Atomic, Guard, Owned, Shared};
use crossbeam_utils::Backoff;

/// Set on a cell's bucket pointer once the bucket has been claimed for
/// splitting. A frozen bucket is never modified again.
const FROZEN_TAG: usize = 0b1;

/// A lockfree concurrent extendible hash map.
///
/// The directory is an immutable array of atomic bucket references that is
/// replaced wholesale, by a single compare-and-swap, whenever a bucket is
/// split. Each referenced cell in turn holds an atomic pointer to the current
/// immutable version of its bucket; insertions and removals copy that
/// version, modify the copy and swap it in. Readers therefore never block and
/// never observe a directory in the middle of a split.
///
/// A writer that wants to split a full bucket first freezes it. Other writers
/// that reach a frozen bucket back off until the new directory is published;
/// readers keep reading the frozen version, whose contents are still current.
///
/// Memory is reclaimed with [`crossbeam-epoch`]. Keys must implement [`Hash`],
/// [`Eq`] and [`Clone`]; values must implement [`Clone`], since each update
/// copies the entries of a bucket and lookups may race with removals.
///
/// [`crossbeam-epoch`]: https://docs.rs/crossbeam-epoch
/// [`Hash`]: std::hash::Hash
/// [`Eq`]: std::cmp::Eq
/// [`Clone`]: std::clone::Clone
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    directory: Atomic<Directory<Atomic<BucketCell<K, V>>>>,
    build_hasher: S,
    len: AtomicUsize,
    bucket_capacity: usize,
    max_depth: u32,
}

struct BucketCell<K, V> {
    bucket: Atomic<Bucket<K, V>>,
}

impl<K, V> BucketCell<K, V> {
    fn new(bucket: Bucket<K, V>) -> Self {
        Self {
            bucket: Atomic::new(bucket),
        }
    }
}

impl<K, V> Drop for BucketCell<K, V> {
    fn drop(&mut self) {
        let guard = unsafe { crossbeam_epoch::unprotected() };
        let bucket_ptr = self.bucket.load(Ordering::Relaxed, guard);

        if !bucket_ptr.is_null() {
            mem::drop(unsafe { bucket_ptr.with_tag(0).into_owned() });
        }
    }
}

fn is_frozen<K, V>(bucket_ptr: Shared<'_, Bucket<K, V>>) -> bool {
    bucket_ptr.tag() & FROZEN_TAG != 0
}

impl<K, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates an empty `HashMap` with two buckets that hold up to
    /// `bucket_capacity` entries each.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_capacity` is 0.
    pub fn new(bucket_capacity: usize) -> Self {
        Builder::new()
            .bucket_capacity(bucket_capacity)
            .build_lockfree()
    }
}

impl<K, V, S: BuildHasher> HashMap<K, V, S> {
    /// Creates an empty `HashMap` that will use `build_hasher` to hash keys.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_capacity` is 0.
    pub fn with_hasher(bucket_capacity: usize, build_hasher: S) -> Self {
        Builder::new()
            .bucket_capacity(bucket_capacity)
            .hasher(build_hasher)
            .build_lockfree()
    }
}

impl<K, V, S> HashMap<K, V, S> {
    pub(crate) fn from_builder(builder: Builder<S>) -> Self {
        let Builder {
            bucket_capacity,
            initial_depth,
            max_depth,
            build_hasher,
        } = builder;

        let directory = Directory::with_depth(initial_depth, || {
            Atomic::new(BucketCell::new(Bucket::new(
                bucket_capacity,
                initial_depth,
            )))
        });

        Self {
            directory: Atomic::new(directory),
            build_hasher,
            len: AtomicUsize::new(0),
            bucket_capacity,
            max_depth,
        }
    }

    /// Returns the number of entries that are confirmed to have been inserted
    /// into this map.
    ///
    /// In-progress insertions and removals are not reflected.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns true if this map contains no confirmed inserted entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the directory's shape.
    pub fn stats(&self) -> Stats {
        let guard = &crossbeam_epoch::pin();
        let directory = self.load_directory(guard);
        let num_buckets = directory
            .slots()
            .iter()
            .map(|slot| slot.load(Ordering::Acquire, guard).as_raw())
            .collect::<HashSet<_>>()
            .len();

        Stats {
            global_depth: directory.global_depth(),
            num_slots: directory.slots().len(),
            num_buckets,
            len: self.len(),
            bucket_capacity: self.bucket_capacity,
        }
    }

    fn load_directory<'g>(&self, guard: &'g Guard) -> &'g Directory<Atomic<BucketCell<K, V>>> {
        let directory_ptr = self.directory.load(Ordering::Acquire, guard);
        assert!(!directory_ptr.is_null());

        unsafe { directory_ptr.deref() }
    }

    fn load_cell<'g>(&self, guard: &'g Guard, hash: u64) -> Shared<'g, BucketCell<K, V>> {
        let cell_ptr = self
            .load_directory(guard)
            .slot(hash)
            .load(Ordering::Acquire, guard);
        assert!(!cell_ptr.is_null());

        cell_ptr
    }

    #[cfg(test)]
    pub(crate) fn check_layout(&self) {
        let guard = &crossbeam_epoch::pin();
        let directory = self.load_directory(guard);
        let slots: Vec<_> = directory
            .slots()
            .iter()
            .map(|slot| {
                let cell_ptr = slot.load(Ordering::Acquire, guard);
                let bucket_ptr = unsafe { cell_ptr.deref() }
                    .bucket
                    .load(Ordering::Acquire, guard);
                let bucket = unsafe { bucket_ptr.deref() };

                common::testing::SlotView {
                    bucket_id: cell_ptr.as_raw() as usize,
                    local_depth: bucket.local_depth(),
                    hashes: bucket.entries().iter().map(|e| e.hash).collect(),
                }
            })
            .collect();

        common::testing::check_layout(directory.global_depth(), &slots, self.bucket_capacity);
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashMap<K, V, S> {
    /// Returns a copy of the value corresponding to `key`.
    ///
    /// `Q` can be any borrowed form of `K`, but [`Hash`] and [`Eq`] on `Q`
    /// *must* match that of `K`.
    ///
    /// [`Hash`]: std::hash::Hash
    /// [`Eq`]: std::cmp::Eq
    pub fn get<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
    {
        self.get_and(key, V::clone)
    }

    /// Invokes `with_value` with a reference to the value corresponding to
    /// `key`.
    ///
    /// `with_value` may be handed a version of the entry that a concurrent
    /// writer is in the middle of replacing.
    pub fn get_and<Q: ?Sized + Hash + Eq, F: FnOnce(&V) -> T, T>(
        &self,
        key: &Q,
        with_value: F,
    ) -> Option<T>
    where
        K: Borrow<Q>,
    {
        let hash = common::hash(&self.build_hasher, key);
        let guard = &crossbeam_epoch::pin();
        let cell = unsafe { self.load_cell(guard, hash).deref() };
        let bucket_ptr = cell.bucket.load(Ordering::Acquire, guard);

        unsafe { bucket_ptr.deref() }
            .get(hash, key)
            .map(with_value)
    }

    /// Returns true if this map contains a value for `key`.
    pub fn contains_key<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.get_and(key, |_| ()).is_some()
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> HashMap<K, V, S> {
    /// Associates `value` with `key`, returning the previously associated
    /// value if there was one.
    ///
    /// If the key's bucket is full it is split, growing the directory as
    /// needed, until the entry fits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DepthExhausted`] if the bucket is full and no split
    /// within the map's maximum depth could separate its keys. The map is left
    /// unchanged.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>, Error> {
        let hash = common::hash(&self.build_hasher, &key);
        let guard = &crossbeam_epoch::pin();
        let backoff = Backoff::new();
        let mut key = key;
        let mut value = value;

        loop {
            let cell_ptr = self.load_cell(guard, hash);
            let cell = unsafe { cell_ptr.deref() };
            let bucket_ptr = cell.bucket.load(Ordering::Acquire, guard);

            if is_frozen(bucket_ptr) {
                backoff.snooze();

                continue;
            }

            let bucket = unsafe { bucket_ptr.deref() };
            let position = bucket.position(hash, &key);

            if position.is_none() && bucket.is_full() {
                self.split(guard, hash, cell_ptr, bucket_ptr)?;

                continue;
            }

            // an update replaces the entry in place, an insertion appends
            let index = position.unwrap_or_else(|| bucket.len());
            let mut next = bucket.clone();

            let previous = match next.put(hash, key, value) {
                PutOutcome::Inserted => None,
                PutOutcome::Updated(previous) => Some(previous),
                PutOutcome::Full(..) => unreachable!(),
            };

            match cell.bucket.compare_exchange_weak(
                bucket_ptr,
                Owned::new(next),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    unsafe { guard.defer_destroy(bucket_ptr) };

                    if previous.is_none() {
                        self.len.fetch_add(1, Ordering::Relaxed);
                    }

                    return Ok(previous);
                }
                Err(e) => {
                    let Entry {
                        key: k, value: v, ..
                    } = e.new.into_box().take(index);
                    key = k;
                    value = v;

                    backoff.spin();
                }
            }
        }
    }

    /// Removes the entry for `key`, returning true if it was present.
    pub fn remove<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        let hash = common::hash(&self.build_hasher, key);
        let guard = &crossbeam_epoch::pin();
        let backoff = Backoff::new();

        loop {
            let cell = unsafe { self.load_cell(guard, hash).deref() };
            let bucket_ptr = cell.bucket.load(Ordering::Acquire, guard);
            let bucket = unsafe { bucket_ptr.deref() };

            if bucket.get(hash, key).is_none() {
                return false;
            }

            if is_frozen(bucket_ptr) {
                backoff.snooze();

                continue;
            }

            let mut next = bucket.clone();
            next.remove(hash, key);

            match cell.bucket.compare_exchange_weak(
                bucket_ptr,
                Owned::new(next),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    unsafe { guard.defer_destroy(bucket_ptr) };
                    self.len.fetch_sub(1, Ordering::Relaxed);

                    return true;
                }
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Freezes the full bucket behind `cell_ptr`, then publishes a directory in
    /// which its two halves replace it.
    ///
    /// Returns `Ok` without splitting if another writer changed the bucket
    /// first; the caller is expected to look it up again.
    fn split<'g>(
        &self,
        guard: &'g Guard,
        hash: u64,
        cell_ptr: Shared<'g, BucketCell<K, V>>,
        bucket_ptr: Shared<'g, Bucket<K, V>>,
    ) -> Result<(), Error> {
        let cell = unsafe { cell_ptr.deref() };
        let bucket = unsafe { bucket_ptr.deref() };
        let local_depth = bucket.local_depth();

        if !bucket.is_splittable(hash, self.max_depth) {
            log::warn!(
                "refusing to split bucket at local depth {}: keys collide up to depth {}",
                local_depth,
                self.max_depth
            );

            return Err(Error::DepthExhausted {
                local_depth,
                max_depth: self.max_depth,
            });
        }

        if cell
            .bucket
            .compare_exchange(
                bucket_ptr,
                bucket_ptr.with_tag(FROZEN_TAG),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .is_err()
        {
            return Ok(());
        }

        let mut low = bucket.clone();
        let high = low.split();

        log::trace!(
            "split bucket to local depth {}: {} entries stay, {} move",
            low.local_depth(),
            low.len(),
            high.len()
        );

        let low = Owned::new(BucketCell::new(low)).into_shared(guard);
        let high = Owned::new(BucketCell::new(high)).into_shared(guard);
        let backoff = Backoff::new();

        // Nobody else can replace a frozen cell, so every failed exchange was
        // caused by a split elsewhere. Rebuild from the newer directory.
        loop {
            let current_ptr = self.directory.load(Ordering::Acquire, guard);
            let current = unsafe { current_ptr.deref() };

            let mut next = current.map(|slot| slot.load(Ordering::Acquire, guard));
            let index = next.index(hash);
            debug_assert_eq!(next.slots()[index], cell_ptr);

            if local_depth == next.global_depth() {
                log::debug!(
                    "growing directory from depth {} to {}",
                    local_depth,
                    local_depth + 1
                );
            }

            next.install_split(index, local_depth, low, high);

            let next = Owned::new(next.map(|&slot| Atomic::from(slot)));

            match self.directory.compare_exchange_weak(
                current_ptr,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    unsafe {
                        guard.defer_destroy(current_ptr);
                        guard.defer_destroy(cell_ptr);
                    }

                    return Ok(());
                }
                Err(_) => backoff.spin(),
            }
        }
    }
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        let guard = unsafe { crossbeam_epoch::unprotected() };
        let directory_ptr = self.directory.swap(Shared::null(), Ordering::Relaxed, guard);

        if directory_ptr.is_null() {
            return;
        }

        let directory = unsafe { directory_ptr.into_owned() };
        let mut dropped = HashSet::new();

        // a cell is shared by every slot that references it
        for slot in directory.slots() {
            let cell_ptr = slot.load(Ordering::Relaxed, guard);

            if dropped.insert(cell_ptr.as_raw()) {
                mem::drop(unsafe { cell_ptr.into_owned() });
            }
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> crate::ExtendibleMap<K, V>
    for HashMap<K, V, S>
{
    fn get<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        HashMap::get(self, key)
    }

    fn put(&self, key: K, value: V) -> Result<Option<V>, Error> {
        HashMap::put(self, key, value)
    }

    fn remove<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        HashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn stats(&self) -> Stats {
        HashMap::stats(self)
    }
}
