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

//! Errors surfaced by extendible hash maps.

/// The error type returned by [`put`] on either map variant.
///
/// Bucket overflow and lost compare-and-swap races are resolved internally by
/// splitting and retrying, so the only condition a caller can observe is a
/// bucket that cannot be split any further.
///
/// [`put`]: crate::ExtendibleMap::put
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The bucket that a key hashes to is full and splitting it would not
    /// make room: either its local depth already equals the map's maximum
    /// depth, or every key in it (including the one being inserted) agrees on
    /// all hash bits up to the maximum depth.
    ///
    /// The maximum depth can be raised with [`Builder::max_depth`], but a
    /// well-distributed hash function makes this error practically
    /// unreachable at the default setting.
    ///
    /// [`Builder::max_depth`]: crate::Builder::max_depth
    #[error(
        "cannot split a full bucket at local depth {local_depth}: \
        its keys are indistinguishable within the maximum depth of {max_depth} hash bits"
    )]
    DepthExhausted { local_depth: u32, max_depth: u32 },
}
