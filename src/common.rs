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

//! Hashing policy, configuration and diagnostics shared by both map variants.

pub(crate) mod bucket;
pub(crate) mod directory;

use std::hash::{BuildHasher, Hash, Hasher};

use crate::{locked, lockfree};

/// Default hasher for both map variants.
///
/// This is currently [aHash], a fast, DoS-resistant hashing algorithm that is
/// not cryptographically secure. Directory indices are taken from the low
/// bits of the hash, so the hasher must mix well into its low bits.
///
/// [aHash]: https://docs.rs/ahash
pub type DefaultHashBuilder = ahash::RandomState;

pub(crate) const DEFAULT_BUCKET_CAPACITY: usize = 8;
pub(crate) const DEFAULT_INITIAL_DEPTH: u32 = 1;
pub(crate) const DEFAULT_MAX_DEPTH: u32 = 32;

/// The largest depth a directory of `usize`-indexed slots can reach.
pub(crate) const DEPTH_LIMIT: u32 = usize::BITS - 1;

pub(crate) fn hash<K: ?Sized + Hash, H: BuildHasher>(build_hasher: &H, key: &K) -> u64 {
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);

    hasher.finish()
}

/// Returns the low `depth` bits of `hash`.
pub(crate) fn hash_index(hash: u64, depth: u32) -> usize {
    (hash & ((1u64 << depth) - 1)) as usize
}

/// A snapshot of a map's shape, for diagnostics and testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Number of low hash bits used to index the directory.
    pub global_depth: u32,
    /// Number of directory slots; always `2^global_depth`.
    pub num_slots: usize,
    /// Number of distinct buckets referenced by the directory.
    pub num_buckets: usize,
    /// Number of entries in the map.
    pub len: usize,
    /// Maximum number of entries a single bucket holds.
    pub bucket_capacity: usize,
}

/// Builds extendible hash maps with custom configuration.
///
/// ```
/// use exthash::Builder;
///
/// let map = Builder::new()
///     .bucket_capacity(4)
///     .initial_depth(2)
///     .build_lockfree();
///
/// map.put("foo", 5).unwrap();
/// assert_eq!(map.get("foo"), Some(5));
/// assert_eq!(map.stats().global_depth, 2);
/// ```
#[derive(Clone, Debug)]
pub struct Builder<S = DefaultHashBuilder> {
    pub(crate) bucket_capacity: usize,
    pub(crate) initial_depth: u32,
    pub(crate) max_depth: u32,
    pub(crate) build_hasher: S,
}

impl Builder<DefaultHashBuilder> {
    pub fn new() -> Self {
        Self {
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            initial_depth: DEFAULT_INITIAL_DEPTH,
            max_depth: DEFAULT_MAX_DEPTH,
            build_hasher: DefaultHashBuilder::default(),
        }
    }
}

impl Default for Builder<DefaultHashBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Builder<S> {
    /// Sets how many entries a bucket holds before it must be split.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_capacity` is 0.
    pub fn bucket_capacity(self, bucket_capacity: usize) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity must be non-zero");

        Self {
            bucket_capacity,
            ..self
        }
    }

    /// Sets the global depth the directory starts at. Every initial bucket is
    /// created with this local depth.
    ///
    /// # Panics
    ///
    /// Panics if `initial_depth` exceeds the configured maximum depth.
    pub fn initial_depth(self, initial_depth: u32) -> Self {
        assert!(
            initial_depth <= self.max_depth,
            "initial depth {} exceeds maximum depth {}",
            initial_depth,
            self.max_depth
        );

        Self {
            initial_depth,
            ..self
        }
    }

    /// Sets the maximum local depth a bucket may be split to. Values above
    /// `usize::BITS - 1` are clamped.
    ///
    /// # Panics
    ///
    /// Panics if `max_depth` is less than the configured initial depth.
    pub fn max_depth(self, max_depth: u32) -> Self {
        let max_depth = max_depth.min(DEPTH_LIMIT);

        assert!(
            max_depth >= self.initial_depth,
            "maximum depth {} is less than initial depth {}",
            max_depth,
            self.initial_depth
        );

        Self { max_depth, ..self }
    }

    /// Sets the hash builder used to hash keys.
    pub fn hasher<T: BuildHasher>(self, build_hasher: T) -> Builder<T> {
        Builder {
            bucket_capacity: self.bucket_capacity,
            initial_depth: self.initial_depth,
            max_depth: self.max_depth,
            build_hasher,
        }
    }

    /// Builds a map whose directory is guarded by a read-write lock and whose
    /// buckets are guarded by their own mutexes.
    pub fn build_locked<K, V>(self) -> locked::HashMap<K, V, S> {
        locked::HashMap::from_builder(self)
    }

    /// Builds a map whose directory and buckets are updated by
    /// compare-and-swap.
    pub fn build_lockfree<K, V>(self) -> lockfree::HashMap<K, V, S> {
        lockfree::HashMap::from_builder(self)
    }
}
