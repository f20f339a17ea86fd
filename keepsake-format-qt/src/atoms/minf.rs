// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::Result;
use keepsake_core::io::Cursor;
use keepsake_core::unit::Unit;

use log::warn;

use crate::atoms::{check_malformation, read_leaf, AtomHeader, AtomIterator, AtomType};
use crate::atoms::{HdlrAtom, StblAtom};
use crate::catalog;
use crate::context::ParseContext;

/// Media information atom.
#[derive(Debug)]
pub struct MinfAtom {
    /// The data handler, if present.
    pub hdlr: Option<HdlrAtom>,
    pub stbl: Option<StblAtom>,
    /// `true` if a data information atom is present.
    pub has_dinf: bool,
}

impl Unit<AtomType, ParseContext> for MinfAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, &header);

        let mut hdlr = None;
        let mut stbl = None;
        let mut has_dinf = false;

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                AtomType::Handler => {
                    hdlr = read_leaf::<HdlrAtom, _>(&mut iter, ctx)?;
                }
                AtomType::DataInfo => has_dinf = true,
                AtomType::SampleTable => {
                    stbl = Some(iter.read_unit::<StblAtom, _>(ctx)?);
                }
                // The video and sound media headers carry nothing needed to characterize the
                // bitstream.
                _ => (),
            }
        }

        check_malformation(&iter, ctx);

        if stbl.is_none() {
            warn!("qt (minf): missing stbl atom");
            ctx.add(catalog::BAD_MINF);
        }

        Ok(MinfAtom { hdlr, stbl, has_dinf })
    }
}
