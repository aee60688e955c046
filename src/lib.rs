//   medialibchecker
//   Copyright (C) 2017 The 8472
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Extent-aware directory scanner: computes a stable content hash for every
//! regular file under a root, visiting physical storage regions in an order
//! that minimizes disk-head seeks on rotational media.
//!
//! The interesting part isn't the hashing, it's the seek-minimizing
//! scheduler: [`traversal::Traversal`] walks directories in physical-nearest
//! -next order (discovered via the `filefrag` extent-query utility, parsed
//! by [`worker`]), then drives the hash scan by iterating a map keyed on
//! each file's physical extent offsets.

pub mod cli;
pub mod config;
pub mod driver;
pub mod entry;
pub mod error;
pub mod extent;
pub mod logging;
pub mod maps;
pub mod traversal;
pub mod worker;

pub use entry::Entry;
pub use extent::Extent;
pub use traversal::{ScanStats, Traversal};
