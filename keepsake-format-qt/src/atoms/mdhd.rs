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

fn parse_language(code: u16) -> String {
    // Values below 0x400 are Macintosh language codes, not packed ISO 639-2/T codes.
    if code < 0x400 || code > 0x7fff {
        String::new()
    }
    else {
        let chars = [
            ((code >> 10) & 0x1f) as u8 + 0x60,
            ((code >> 5) & 0x1f) as u8 + 0x60,
            (code & 0x1f) as u8 + 0x60,
        ];

        String::from_utf8_lossy(&chars).to_string()
    }
}

/// Media header atom.
#[derive(Debug)]
pub struct MdhdAtom {
    /// Timescale.
    pub timescale: u32,
    /// Duration of the media in timescale units.
    pub duration: u64,
    /// Language.
    pub language: String,
}

impl Unit<AtomType, ParseContext> for MdhdAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let (version, _) = header.read_extended_header(&mut reader)?;

        let (timescale, duration) = match version {
            0 => {
                // Creation and modification times.
                reader.ignore_bytes(8)?;
                (reader.read_be_u32()?, u64::from(reader.read_be_u32()?))
            }
            1 => {
                reader.ignore_bytes(16)?;
                (reader.read_be_u32()?, reader.read_be_u64()?)
            }
            _ => return decode_error("qt (mdhd): invalid version"),
        };

        let language = parse_language(reader.read_be_u16()?);

        Ok(MdhdAtom { timescale, duration, language })
    }
}
