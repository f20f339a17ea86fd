// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! QuickTime characterization and localization for Project Keepsake.
//!
//! [`parse`] walks the atom tree of a movie and reports its bitstreams, movie-wide properties,
//! and any structural anomalies. The [`localize`] module rewrites a movie so that it no longer
//! depends on external media files.

pub mod atoms;
pub mod catalog;
pub mod context;
mod encodings;
pub mod localize;
mod parser;

#[cfg(test)]
mod fixtures;

pub use parser::{is_type, parse, DESCRIPTOR, QUICKTIME_FORMAT_INFO};
