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

use std::{
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crossbeam_epoch::Owned;

/// A value that counts how many copies of it are alive.
#[derive(Debug)]
pub(crate) struct Tracked {
    live: Arc<AtomicUsize>,
    pub(crate) elem: i32,
}

impl Tracked {
    pub(crate) fn new(live: &Arc<AtomicUsize>, elem: i32) -> Self {
        live.fetch_add(1, Ordering::Relaxed);

        Self {
            live: live.clone(),
            elem,
        }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        Self::new(&self.live, self.elem)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        assert!(self.live.fetch_sub(1, Ordering::Relaxed) > 0);
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.elem == other.elem
    }
}

/// Compares and hashes by `id`, counting every call to `clone`.
#[derive(Debug)]
pub(crate) struct CloneCounter {
    clones: Arc<AtomicUsize>,
    pub(crate) id: i32,
}

impl CloneCounter {
    pub(crate) fn new(clones: &Arc<AtomicUsize>, id: i32) -> Self {
        Self {
            clones: clones.clone(),
            id,
        }
    }
}

impl Clone for CloneCounter {
    fn clone(&self) -> Self {
        self.clones.fetch_add(1, Ordering::Relaxed);

        Self::new(&self.clones, self.id)
    }
}

impl PartialEq for CloneCounter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CloneCounter {}

impl Hash for CloneCounter {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.id.hash(hasher);
    }
}

pub(crate) fn run_deferred() {
    for _ in 0..65536 {
        let guard = crossbeam_epoch::pin();

        unsafe { guard.defer_destroy(Owned::new(0).into_shared(&guard)) };

        guard.flush();
    }
}

/// Runs deferred destructors until `live` drops to zero, giving up after a
/// bounded number of rounds.
pub(crate) fn wait_for_reclamation(live: &AtomicUsize) -> usize {
    for _ in 0..16 {
        if live.load(Ordering::Relaxed) == 0 {
            break;
        }

        run_deferred();
    }

    live.load(Ordering::Relaxed)
}
