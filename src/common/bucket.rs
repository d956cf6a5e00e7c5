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

use std::{borrow::Borrow, mem};

use super::hash_index;

/// A key-value pair and the cached hash of its key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
}

/// Result of [`Bucket::put`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PutOutcome<K, V> {
    Inserted,
    Updated(V),
    /// The bucket is at capacity and does not contain the key. The key and
    /// value are handed back so the caller can split and retry.
    Full(K, V),
}

/// A bounded set of entries that all agree on the low `local_depth` bits of
/// their hashes.
#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    capacity: usize,
    local_depth: u32,
    entries: Vec<Entry<K, V>>,
}

impl<K, V> Bucket<K, V> {
    pub(crate) fn new(capacity: usize, local_depth: u32) -> Self {
        assert!(capacity > 0);

        Self {
            capacity,
            local_depth,
            entries: Vec::new(),
        }
    }

    pub(crate) fn local_depth(&self) -> u32 {
        self.local_depth
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[Entry<K, V>] {
        &self.entries
    }

    pub(crate) fn get<Q: ?Sized + Eq>(&self, hash: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.position(hash, key).map(|i| &self.entries[i].value)
    }

    pub(crate) fn put(&mut self, hash: u64, key: K, value: V) -> PutOutcome<K, V>
    where
        K: Eq,
    {
        if let Some(i) = self.position(hash, &key) {
            let previous = mem::replace(&mut self.entries[i], Entry { hash, key, value });

            return PutOutcome::Updated(previous.value);
        }

        if self.is_full() {
            return PutOutcome::Full(key, value);
        }

        self.entries.push(Entry { hash, key, value });

        PutOutcome::Inserted
    }

    pub(crate) fn remove<Q: ?Sized + Eq>(&mut self, hash: u64, key: &Q) -> Option<Entry<K, V>>
    where
        K: Borrow<Q>,
    {
        self.position(hash, key)
            .map(|i| self.entries.swap_remove(i))
    }

    /// Removes the entry at `index`, as returned by [`position`].
    ///
    /// [`position`]: Bucket::position
    pub(crate) fn take(&mut self, index: usize) -> Entry<K, V> {
        self.entries.swap_remove(index)
    }

    /// Returns a copy of every entry in this bucket.
    pub(crate) fn entries_snapshot(&self) -> Vec<Entry<K, V>>
    where
        K: Clone,
        V: Clone,
    {
        self.entries.clone()
    }

    /// Increments the local depth and moves every entry whose newly
    /// significant hash bit is set into a returned twin bucket.
    pub(crate) fn split(&mut self) -> Bucket<K, V> {
        let bit = self.local_depth;
        self.local_depth += 1;

        let mut twin = Bucket::new(self.capacity, self.local_depth);
        let (stay, moved): (Vec<_>, Vec<_>) = mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| (e.hash >> bit) & 1 == 0);

        self.entries = stay;
        twin.entries = moved;

        twin
    }

    /// Returns true if splitting this bucket, repeatedly if necessary, could
    /// ever separate its entries and an incoming key with hash `hash` before
    /// the local depth reaches `max_depth`.
    pub(crate) fn is_splittable(&self, hash: u64, max_depth: u32) -> bool {
        if self.local_depth >= max_depth {
            return false;
        }

        let differing = self
            .entries
            .iter()
            .fold(0, |acc, e| acc | (e.hash ^ hash));

        // Bits below the local depth already agree; only bits the directory
        // could still index on can tell the entries apart.
        let usable = hash_index(differing, max_depth) as u64;

        usable >> self.local_depth != 0
    }

    pub(crate) fn position<Q: ?Sized + Eq>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
    {
        self.entries
            .iter()
            .position(|e| e.hash == hash && e.key.borrow() == key)
    }
}

impl<K: Clone, V: Clone> Clone for Bucket<K, V> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            local_depth: self.local_depth,
            entries: self.entries_snapshot(),
        }
    }
}
