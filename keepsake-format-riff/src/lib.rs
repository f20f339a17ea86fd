// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RIFF WAVE characterization for Project Keepsake.

pub mod catalog;
mod common;
mod wave;

pub use wave::{is_type, parse, DESCRIPTOR, WAVE_FORMAT_INFO};
