// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JPEG 2000 part 1 (JP2) characterization for Project Keepsake.

pub mod boxes;
pub mod catalog;
pub mod context;
mod parser;

#[cfg(test)]
mod fixtures;

pub use parser::{is_type, parse, DESCRIPTOR, JP2_FORMAT_INFO};
