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

//! Concurrent extendible hash maps.
//!
//! An extendible hash map keeps its entries in fixed-capacity buckets and
//! finds them through a directory of `2^global_depth` bucket references,
//! indexed by the low `global_depth` bits of a key's hash. When a bucket
//! overflows, only that bucket is split in two along one more hash bit. The
//! directory doubles, by duplicating its references rather than rehashing any
//! entries, only when the overflowing bucket is already distinguished by every
//! bit the directory indexes on.
//!
//! Two implementations of the same algorithm are provided:
//!
//! * [`locked::HashMap`] guards the directory with a read-write lock and each
//!   bucket with a mutex. Splits and growth take the directory's write lock.
//! * [`lockfree::HashMap`] publishes immutable bucket versions and directories
//!   with compare-and-swap and reclaims them with epoch-based garbage
//!   collection.
//!
//! Both implement [`ExtendibleMap`], so code can be written once over either.
//!
//! ```
//! use exthash::{lockfree, ExtendibleMap};
//!
//! fn fill<M: ExtendibleMap<u32, u32>>(map: &M) {
//!     for i in 0..100 {
//!         map.put(i, i * 2).unwrap();
//!     }
//! }
//!
//! let map = lockfree::HashMap::new(4);
//! fill(&map);
//!
//! assert_eq!(map.len(), 100);
//! assert_eq!(map.get(&21), Some(42));
//! assert!(map.remove(&21));
//! assert!(!map.remove(&21));
//! ```

mod common;
mod error;
pub mod locked;
pub mod lockfree;

pub use common::{Builder, DefaultHashBuilder, Stats};
pub use error::Error;

use std::{borrow::Borrow, hash::Hash};

/// The operations shared by both extendible hash map implementations.
///
/// `get` and `remove` are generic over the borrowed key type, so this trait
/// is used as a bound (`M: ExtendibleMap<K, V>`) rather than as a trait
/// object.
pub trait ExtendibleMap<K, V> {
    /// Returns a copy of the value corresponding to `key`.
    fn get<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>;

    /// Associates `value` with `key`, returning the previously associated
    /// value if there was one.
    fn put(&self, key: K, value: V) -> Result<Option<V>, Error>;

    /// Removes the entry for `key`, returning true if it was present.
    fn remove<Q: ?Sized + Hash + Eq>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>;

    /// Returns the number of entries in the map.
    fn len(&self) -> usize;

    /// Returns true if the map contains no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the directory's shape.
    fn stats(&self) -> Stats;
}
