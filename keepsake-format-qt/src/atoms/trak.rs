// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::Result;
use keepsake_core::io::Cursor;
use keepsake_core::unit::Unit;

use log::{debug, warn};

use crate::atoms::{check_malformation, read_leaf, AtomHeader, AtomIterator, AtomType};
use crate::atoms::{MdiaAtom, TkhdAtom};
use crate::catalog;
use crate::context::{MovieFlags, ParseContext};

/// Track atom.
#[derive(Debug)]
pub struct TrakAtom {
    pub tkhd: Option<TkhdAtom>,
    pub mdia: Option<MdiaAtom>,
}

impl Unit<AtomType, ParseContext> for TrakAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, &header);

        let mut tkhd = None;
        let mut mdia = None;

        ctx.current = None;

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                AtomType::TrackHeader => {
                    tkhd = read_leaf::<TkhdAtom, _>(&mut iter, ctx)?;
                }
                AtomType::Media => {
                    mdia = Some(iter.read_unit::<MdiaAtom, _>(ctx)?);
                }
                AtomType::UserData => {
                    ctx.movie |= MovieFlags::HAS_USER_DATA;
                }
                _ => (),
            }
        }

        check_malformation(&iter, ctx);

        let bitstream = ctx.current.take();

        match (&tkhd, &mdia) {
            (Some(tkhd), Some(_)) => {
                if let Some(mut bitstream) = bitstream {
                    tkhd.apply(&mut bitstream);
                    debug!("qt (trak): track {} is {}", tkhd.id, bitstream);
                    ctx.bitstreams.push(bitstream);
                }
            }
            (None, _) => {
                warn!("qt (trak): missing tkhd atom");
                ctx.add(catalog::BAD_TRAK);

                // The media is still characterized, with the default flags and role.
                if let Some(bitstream) = bitstream {
                    debug!("qt (trak): track without header is {}", bitstream);
                    ctx.bitstreams.push(bitstream);
                }
            }
            (_, None) => {
                warn!("qt (trak): missing mdia atom");
                ctx.add(catalog::BAD_TRAK);
            }
        }

        Ok(TrakAtom { tkhd, mdia })
    }
}
