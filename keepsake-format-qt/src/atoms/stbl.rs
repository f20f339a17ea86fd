// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::Result;
use keepsake_core::io::Cursor;
use keepsake_core::unit::Unit;

use log::debug;

use crate::atoms::{check_malformation, read_leaf, AtomHeader, AtomIterator, AtomType};
use crate::atoms::{StsdAtom, SttsAtom};
use crate::context::ParseContext;

/// Sample table atom.
#[derive(Debug)]
pub struct StblAtom {
    pub stsd: Option<StsdAtom>,
    pub stts: Option<SttsAtom>,
}

impl Unit<AtomType, ParseContext> for StblAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, &header);

        let mut stsd = None;
        let mut stts = None;

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                AtomType::SampleDescription => {
                    // Sample descriptions are only meaningful for a video or sound track.
                    if ctx.current.is_some() {
                        stsd = read_leaf::<StsdAtom, _>(&mut iter, ctx)?;
                    }
                    else {
                        debug!("qt (stbl): ignoring stsd of a track with no bitstream");
                    }
                }
                AtomType::TimeToSample => {
                    stts = read_leaf::<SttsAtom, _>(&mut iter, ctx)?;
                }
                _ => (),
            }
        }

        check_malformation(&iter, ctx);

        let limitation = match ctx.current.as_mut() {
            Some(bitstream) => {
                if let Some(stts) = &stts {
                    bitstream.sample_count = Some(stts.sample_count);
                }
                stsd.as_ref().and_then(|stsd| stsd.apply(bitstream))
            }
            None => None,
        };

        if let Some(limitation) = limitation {
            ctx.add(limitation);
        }

        Ok(StblAtom { stsd, stts })
    }
}
