// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared cursors, unit walking, and the characterization model used by every Keepsake format
//! crate.

pub mod anomaly;
pub mod bitstream;
pub mod errors;
pub mod io;
pub mod probe;
pub mod unit;
