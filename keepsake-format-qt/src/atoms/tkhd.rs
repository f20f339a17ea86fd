// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

use keepsake_core::bitstream::{Bitstream, Role};
use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use crate::atoms::{AtomHeader, AtomType};
use crate::context::ParseContext;

bitflags! {
    /// Track header flags.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct TrackFlags: u32 {
        const ENABLED    = 0x1;
        const IN_MOVIE   = 0x2;
        const IN_PREVIEW = 0x4;
        const IN_POSTER  = 0x8;
    }
}

impl TrackFlags {
    /// The role of the track's bitstream. A track used in the movie takes precedence over a
    /// track used in the preview, which takes precedence over the poster.
    pub fn role(&self) -> Role {
        if self.contains(TrackFlags::IN_MOVIE) {
            Role::Movie
        }
        else if self.contains(TrackFlags::IN_PREVIEW) {
            Role::Preview
        }
        else if self.contains(TrackFlags::IN_POSTER) {
            Role::Poster
        }
        else {
            Role::Main
        }
    }
}

/// Track header atom.
#[derive(Debug)]
pub struct TkhdAtom {
    /// Track header flags.
    pub flags: TrackFlags,
    /// Track identifier.
    pub id: u32,
    /// Track duration in the timescale units specified in the movie header.
    pub duration: u64,
    /// Visual width, 16.16 fixed point.
    pub width: u32,
    /// Visual height, 16.16 fixed point.
    pub height: u32,
}

impl TkhdAtom {
    /// Propagates the track's flags to its bitstream.
    pub fn apply(&self, bitstream: &mut Bitstream) {
        bitstream.enabled = self.flags.contains(TrackFlags::ENABLED);
        bitstream.role = self.flags.role();
    }
}

impl Unit<AtomType, ParseContext> for TkhdAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let (version, flags) = header.read_extended_header(&mut reader)?;

        // Version 0 uses 32-bit time values, version 1 uses 64-bit values.
        let (id, duration) = match version {
            0 => {
                reader.ignore_bytes(8)?;
                let id = reader.read_be_u32()?;
                let _ = reader.read_be_u32()?; // Reserved
                (id, u64::from(reader.read_be_u32()?))
            }
            1 => {
                reader.ignore_bytes(16)?;
                let id = reader.read_be_u32()?;
                let _ = reader.read_be_u32()?; // Reserved
                (id, reader.read_be_u64()?)
            }
            _ => return decode_error("qt (tkhd): invalid version"),
        };

        // Reserved, layer, alternate group, volume, reserved, and the 3x3 matrix.
        reader.ignore_bytes(8 + 2 + 2 + 2 + 2 + 36)?;

        let width = reader.read_be_u32()?;
        let height = reader.read_be_u32()?;

        Ok(TkhdAtom { flags: TrackFlags::from_bits_truncate(flags), id, duration, width, height })
    }
}
