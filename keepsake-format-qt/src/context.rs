// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

use keepsake_core::anomaly::{Anomalies, SevereElement};
use keepsake_core::bitstream::Bitstream;
use keepsake_core::probe::ParseOptions;

bitflags! {
    /// Movie-wide properties discovered while walking the `moov` atom.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct MovieFlags: u8 {
        const HAS_REFERENCES        = 1 << 0;
        const HAS_USER_DATA         = 1 << 1;
        const HAS_CLIPPING_REGION   = 1 << 2;
        const HAS_COLOR_TABLE       = 1 << 3;
        const HAS_COMPRESSED_HEADER = 1 << 4;
    }
}

/// Mutable state shared by the atom handlers of one parse.
#[derive(Debug, Default)]
pub struct ParseContext {
    pub options: ParseOptions,
    pub anomalies: Anomalies,
    /// Completed bitstreams, in track order.
    pub bitstreams: Vec<Bitstream>,
    /// The bitstream of the track being walked. Created by the media's handler reference and
    /// completed by the enclosing `trak`.
    pub current: Option<Bitstream>,
    pub movie: MovieFlags,
    /// Set while walking the movie found inside a compressed movie resource.
    pub in_compressed_header: bool,
}

impl ParseContext {
    pub fn new(options: ParseOptions) -> Self {
        ParseContext { options, ..Default::default() }
    }

    /// Records an anomaly or limitation.
    pub fn add(&mut self, element: SevereElement) {
        self.anomalies.add(element);
    }
}
