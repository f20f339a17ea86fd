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

/// Movie header atom.
#[derive(Debug)]
pub struct MvhdAtom {
    /// The creation time.
    pub ctime: u64,
    /// The modification time.
    pub mtime: u64,
    /// Timescale for the movie expressed as the number of units per second.
    pub timescale: u32,
    /// The duration of the movie in `timescale` units.
    pub duration: u64,
    /// The preferred playback rate, 16.16 fixed point.
    pub rate: u32,
    /// The preferred volume, 8.8 fixed point.
    pub volume: u16,
}

impl MvhdAtom {
    /// The duration of the movie in seconds.
    pub fn duration_secs(&self) -> Option<f64> {
        if self.timescale == 0 {
            return None;
        }
        Some(self.duration as f64 / f64::from(self.timescale))
    }
}

impl Unit<AtomType, ParseContext> for MvhdAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let (version, _) = header.read_extended_header(&mut reader)?;

        // Version 0 uses 32-bit time values, version 1 uses 64-bit values.
        let (ctime, mtime, timescale, duration) = match version {
            0 => (
                u64::from(reader.read_be_u32()?),
                u64::from(reader.read_be_u32()?),
                reader.read_be_u32()?,
                u64::from(reader.read_be_u32()?),
            ),
            1 => (
                reader.read_be_u64()?,
                reader.read_be_u64()?,
                reader.read_be_u32()?,
                reader.read_be_u64()?,
            ),
            _ => return decode_error("qt (mvhd): invalid version"),
        };

        let rate = reader.read_be_u32()?;
        let volume = reader.read_be_u16()?;

        // Remaining fields are ignored.

        Ok(MvhdAtom { ctime, mtime, timescale, duration, rate, volume })
    }
}
