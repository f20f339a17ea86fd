// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::bitstream::{Bitstream, BitstreamKind, Location};
use keepsake_core::errors::Result;
use keepsake_core::io::Cursor;
use keepsake_core::unit::Unit;

use log::warn;

use crate::atoms::{check_malformation, read_leaf, AtomHeader, AtomIterator, AtomType};
use crate::atoms::{HdlrAtom, MdhdAtom, MinfAtom};
use crate::catalog;
use crate::context::ParseContext;

/// Media atom.
#[derive(Debug)]
pub struct MdiaAtom {
    pub mdhd: Option<MdhdAtom>,
    pub hdlr: Option<HdlrAtom>,
    pub minf: Option<MinfAtom>,
}

impl Unit<AtomType, ParseContext> for MdiaAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, &header);

        let mut mdhd = None;
        let mut hdlr = None;
        let mut minf = None;

        ctx.current = None;

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                AtomType::MediaHeader => {
                    mdhd = read_leaf::<MdhdAtom, _>(&mut iter, ctx)?;
                }
                AtomType::Handler => {
                    hdlr = read_leaf::<HdlrAtom, _>(&mut iter, ctx)?;

                    // The media handler determines the kind of bitstream the track carries.
                    if let Some(kind) = hdlr.as_ref().and_then(HdlrAtom::bitstream_kind) {
                        ctx.current = Some(Bitstream::new(kind));
                    }
                }
                AtomType::MediaInfo => {
                    minf = Some(iter.read_unit::<MinfAtom, _>(ctx)?);
                }
                _ => (),
            }
        }

        check_malformation(&iter, ctx);

        if mdhd.is_none() {
            warn!("qt (mdia): missing mdhd atom");
            ctx.add(catalog::BAD_MDIA);
        }

        if let Some(bitstream) = ctx.current.as_mut() {
            // The offset is into the uncompressed movie resource when the header is compressed.
            bitstream.location = Some(Location::UncompressedHeaderByteOffset(header.unit_pos()));

            if let Some(mdhd) = &mdhd {
                bitstream.set_duration(mdhd.duration, mdhd.timescale);
            }

            match bitstream.kind {
                BitstreamKind::Audio => bitstream.derive_audio_rates(),
                _ => bitstream.derive_video_rates(),
            }
        }

        Ok(MdiaAtom { mdhd, hdlr, minf })
    }
}
