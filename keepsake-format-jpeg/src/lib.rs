// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JPEG characterization for Project Keepsake.
//!
//! A JPEG stream is a sequence of marker segments. Each segment is checked against the rules of
//! ITU T.81, and the JFIF, Exif, SPIFF and Adobe variations are recognized from the application
//! segment that follows the start-of-image marker.

pub mod catalog;
mod markers;
mod parser;
mod segments;

pub use markers::{CodingProcess, Marker, Mode};
pub use parser::{is_type, parse, DESCRIPTOR, JPEG_FORMAT_INFO};
