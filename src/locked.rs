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

//! An extendible hash map guarded by a directory lock and per-bucket locks.


use crate::{
    common::{
        self,
        bucket::{Bucket, PutOutcome},
        directory::Directory,
        Builder, DefaultHashBuilder, Stats,
    },
    Error,
};

use std::{
    borrow::Borrow,
    collections::HashSet,
    hash::{BuildHasher, Hash},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

type BucketRef<K, V> = Arc<Mutex<Bucket<K, V>>>;

/// An extendible hash map whose directory is protected by a read-write lock.
///
/// Lookups, insertions into buckets with room, and removals hold the
/// directory's read lock and the target bucket's mutex, so operations on keys
/// in different buckets proceed in parallel. When an insertion finds its
/// bucket full, it drops both locks, takes the directory's write lock and
/// splits the bucket (doubling the directory first if needed). Nothing can
/// observe a half-grown directory or a half-split bucket.
///
/// Keys must implement [`Hash`] and [`Eq`]. [`get`] returns a clone of the
/// value, so it requires `V: Clone`.
///
/// [`Hash`]: std::hash::Hash
/// [`Eq`]: std::cmp::Eq
/// [`get`]: #method.get
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    directory: RwLock<Directory<BucketRef<K, V>>>,
    build_hasher: S,
    len: AtomicUsize,
    bucket_capacity: usize,
    max_depth: u32,
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
            .build_locked()
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
            .build_locked()
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
            Arc::new(Mutex::new(Bucket::new(bucket_capacity, initial_depth)))
        });

        Self {
            directory: RwLock::new(directory),
            build_hasher,
            len: AtomicUsize::new(0),
            bucket_capacity,
            max_depth,
        }
    }

    /// Returns the number of entries in this map.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns true if this map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the directory's shape.
    pub fn stats(&self) -> Stats {
        let directory = self.directory.read();
        let num_buckets = directory
            .slots()
            .iter()
            .map(Arc::as_ptr)
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

    #[cfg(test)]
    pub(crate) fn check_layout(&self) {
        let directory = self.directory.read();
        let slots: Vec<_> = directory
            .slots()
            .iter()
            .map(|slot| {
                let bucket = slot.lock();

                common::testing::SlotView {
                    bucket_id: Arc::as_ptr(slot) as usize,
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
    /// `key` while the bucket holding it is locked.
    pub fn get_and<Q: ?Sized + Hash + Eq, F: FnOnce(&V) -> T, T>(
        &self,
        key: &Q,
        with_value: F,
    ) -> Option<T>
    where
        K: Borrow<Q>,
    {
        let hash = common::hash(&self.build_hasher, key);
        let directory = self.directory.read();
        let bucket = directory.slot(hash).lock();

        bucket.get(hash, key).map(with_value)
    }

    /// Returns true if this map contains a value for `key`.
    pub fn contains_key<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.get_and(key, |_| ()).is_some()
    }

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
        let mut key = key;
        let mut value = value;

        loop {
            {
                let directory = self.directory.read();
                let mut bucket = directory.slot(hash).lock();

                match bucket.put(hash, key, value) {
                    PutOutcome::Inserted => {
                        self.len.fetch_add(1, Ordering::Relaxed);

                        return Ok(None);
                    }
                    PutOutcome::Updated(previous) => return Ok(Some(previous)),
                    PutOutcome::Full(k, v) => {
                        key = k;
                        value = v;
                    }
                }
            }

            self.split(self.directory.write(), hash)?;
        }
    }

    /// Removes the entry for `key`, returning true if it was present.
    pub fn remove<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        let hash = common::hash(&self.build_hasher, key);
        let directory = self.directory.read();
        let mut bucket = directory.slot(hash).lock();

        if bucket.remove(hash, key).is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);

            true
        } else {
            false
        }
    }

    /// Splits the bucket that `hash` indexes, unless another writer already
    /// made room in it since our read lock was released.
    fn split(
        &self,
        mut directory: RwLockWriteGuard<'_, Directory<BucketRef<K, V>>>,
        hash: u64,
    ) -> Result<(), Error> {
        let index = directory.index(hash);
        let old = Arc::clone(&directory.slots()[index]);
        let mut bucket = old.lock();

        if !bucket.is_full() {
            return Ok(());
        }

        let local_depth = bucket.local_depth();

        if !bucket.is_splittable(hash, self.max_depth) {
            log::warn!(
                "refusing to split bucket {} at local depth {}: keys collide up to depth {}",
                index,
                local_depth,
                self.max_depth
            );

            return Err(Error::DepthExhausted {
                local_depth,
                max_depth: self.max_depth,
            });
        }

        if local_depth == directory.global_depth() {
            log::debug!(
                "growing directory from depth {} to {}",
                local_depth,
                local_depth + 1
            );
        }

        let twin = bucket.split();

        log::trace!(
            "split bucket {} to local depth {}: {} entries stay, {} move",
            index,
            bucket.local_depth(),
            bucket.len(),
            twin.len()
        );

        drop(bucket);

        directory.install_split(index, local_depth, old, Arc::new(Mutex::new(twin)));

        Ok(())
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> crate::ExtendibleMap<K, V> for HashMap<K, V, S> {
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
