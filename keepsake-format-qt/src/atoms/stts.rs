// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use crate::atoms::{AtomHeader, AtomType};
use crate::context::ParseContext;

/// Time-to-sample atom.
#[derive(Debug)]
pub struct SttsAtom {
    /// The total number of samples over all entries.
    pub sample_count: u64,
    /// The total duration of all samples in media timescale units.
    pub total_duration: u64,
}

impl Unit<AtomType, ParseContext> for SttsAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let (_, _) = header.read_extended_header(&mut reader)?;

        let entry_count = reader.read_be_u32()?;

        // Each entry is a sample count and a sample duration.
        if u64::from(entry_count) * 8 > reader.bytes_available() {
            return decode_error("qt (stts): entry count exceeds atom size");
        }

        let mut sample_count: u64 = 0;
        let mut total_duration: u64 = 0;

        for _ in 0..entry_count {
            let count = u64::from(reader.read_be_u32()?);
            let delta = u64::from(reader.read_be_u32()?);

            sample_count += count;
            total_duration = total_duration.saturating_add(count * delta);
        }

        Ok(SttsAtom { sample_count, total_duration })
    }
}
