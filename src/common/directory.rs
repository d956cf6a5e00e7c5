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

use super::hash_index;

/// An array of `2^global_depth` bucket references indexed by the low
/// `global_depth` bits of a key's hash.
///
/// `R` is whatever handle the concurrency variant uses to share a bucket
/// between slots. A bucket with local depth `d` is referenced by exactly
/// `2^(global_depth - d)` slots: every slot whose low `d` bits match.
#[derive(Debug)]
pub(crate) struct Directory<R> {
    global_depth: u32,
    slots: Vec<R>,
}

impl<R> Directory<R> {
    /// Creates a directory of `2^global_depth` slots, each filled by a call to
    /// `make_slot`.
    pub(crate) fn with_depth<F: FnMut() -> R>(global_depth: u32, make_slot: F) -> Self {
        let slots = std::iter::repeat_with(make_slot)
            .take(1 << global_depth)
            .collect();

        Self {
            global_depth,
            slots,
        }
    }

    pub(crate) fn global_depth(&self) -> u32 {
        self.global_depth
    }

    pub(crate) fn slots(&self) -> &[R] {
        &self.slots
    }

    pub(crate) fn index(&self, hash: u64) -> usize {
        hash_index(hash, self.global_depth)
    }

    pub(crate) fn slot(&self, hash: u64) -> &R {
        &self.slots[self.index(hash)]
    }

    /// Converts every slot with `f`, keeping the layout.
    pub(crate) fn map<T, F: FnMut(&R) -> T>(&self, f: F) -> Directory<T> {
        Directory {
            global_depth: self.global_depth,
            slots: self.slots.iter().map(f).collect(),
        }
    }
}

impl<R: Clone> Directory<R> {
    /// Doubles the directory. Slot `i + old_len` references the same bucket as
    /// slot `i`, so no bucket's local depth changes.
    pub(crate) fn grow(&mut self) {
        self.slots.extend_from_within(..);
        self.global_depth += 1;
    }

    /// Replaces the bucket at `index`, which had local depth `local_depth`
    /// before it was split, with its two halves.
    ///
    /// `low` takes over every slot that shared the old bucket and has bit
    /// `local_depth` clear; `high` takes every one with it set. Grows the
    /// directory first if the old bucket was referenced by a single slot.
    pub(crate) fn install_split(&mut self, index: usize, local_depth: u32, low: R, high: R) {
        if local_depth == self.global_depth {
            self.grow();
        }

        debug_assert!(local_depth < self.global_depth);

        let stride = 1 << local_depth;
        let start = hash_index(index as u64, local_depth);

        for i in (start..self.slots.len()).step_by(stride) {
            self.slots[i] = if (i >> local_depth) & 1 == 0 {
                low.clone()
            } else {
                high.clone()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_mirrors_slots() {
        let mut next = 0;
        let mut directory = Directory::with_depth(1, || {
            next += 1;
            next
        });

        assert_eq!(directory.slots(), [1, 2]);

        directory.grow();

        assert_eq!(directory.global_depth(), 2);
        assert_eq!(directory.slots(), [1, 2, 1, 2]);
    }

    #[test]
    fn split_at_global_depth_grows() {
        let mut directory = Directory::with_depth(1, || 'a');
        directory.install_split(0, 1, 'b', 'c');

        assert_eq!(directory.global_depth(), 2);
        assert_eq!(directory.slots(), ['b', 'a', 'c', 'a']);
    }

    #[test]
    fn split_below_global_depth_rewrites_every_sharing_slot() {
        let mut directory = Directory::with_depth(3, || 'a');

        // one bucket of local depth 1 behind every odd slot
        directory.install_split(5, 1, 'b', 'c');

        assert_eq!(directory.global_depth(), 3);
        assert_eq!(
            directory.slots(),
            ['a', 'b', 'a', 'c', 'a', 'b', 'a', 'c']
        );
        assert_eq!(directory.slot(0b111), &'c');
        assert_eq!(directory.slot(0b1001), &'b');
    }
}
