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

use crate::boxes::{check_malformation, read_leaf, BoxHeader, BoxIterator, BoxType};
use crate::boxes::{BpccBox, CdefBox, CmapBox, ColrBox, ComponentDepth, IhdrBox, PclrBox, ResBox};
use crate::catalog;
use crate::context::ParseContext;

/// JP2 header superbox.
#[derive(Debug, Default)]
pub struct Jp2hBox {
    pub ihdr: Option<IhdrBox>,
    /// The first colour specification box. Readers use the first, and ignore the rest.
    pub colr: Option<ColrBox>,
    pub n_colr: usize,
    pub bpcc: Option<BpccBox>,
    pub pclr: Option<PclrBox>,
    pub cmap: Option<CmapBox>,
    pub cdef: Option<CdefBox>,
    pub res: Option<ResBox>,
}

impl Jp2hBox {
    /// The sum of the bit depths of all components, if known.
    pub fn total_bits(&self) -> Option<u32> {
        let ihdr = self.ihdr.as_ref()?;

        match ihdr.depth {
            ComponentDepth::Uniform { bits, .. } => {
                Some(u32::from(bits) * u32::from(ihdr.n_components))
            }
            ComponentDepth::Varies => self.bpcc.as_ref()?.total_bits(),
            ComponentDepth::Invalid(_) => None,
        }
    }
}

impl Unit<BoxType, ParseContext> for Jp2hBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = BoxIterator::new(reader, &header);
        let mut jp2h = Jp2hBox::default();

        let mut first = true;
        let mut last_was_colr = false;

        while let Some(header) = iter.next()? {
            let box_type = header.unit_type();

            // The image header must be the first box of the superbox.
            if first && box_type != BoxType::ImageHeader {
                warn!("jp2 (jp2h): first box is {}, not ihdr", header);
                ctx.add(catalog::BAD_LOC_BOX);
            }
            first = false;

            match box_type {
                BoxType::ImageHeader => {
                    if jp2h.ihdr.is_none() {
                        jp2h.ihdr = read_leaf(&mut iter, ctx, catalog::BAD_IHDRBOX)?;
                    }
                    else {
                        warn!("jp2 (jp2h): ignoring additional ihdr box");
                    }
                }
                BoxType::ColourSpecification => {
                    if jp2h.n_colr > 0 && !last_was_colr {
                        ctx.add(catalog::NONCONTIG_COLRBOX);
                    }

                    jp2h.n_colr += 1;

                    if jp2h.colr.is_none() {
                        jp2h.colr = read_leaf(&mut iter, ctx, catalog::BAD_JP2HBOX)?;
                    }
                }
                BoxType::BitsPerComponent => {
                    jp2h.bpcc = read_leaf(&mut iter, ctx, catalog::BAD_JP2HBOX)?;
                }
                BoxType::Palette => {
                    jp2h.pclr = read_leaf(&mut iter, ctx, catalog::BAD_PCLRBOX)?;
                }
                BoxType::ComponentMapping => {
                    jp2h.cmap = read_leaf(&mut iter, ctx, catalog::BAD_JP2HBOX)?;
                }
                BoxType::ChannelDefinition => {
                    jp2h.cdef = read_leaf(&mut iter, ctx, catalog::BAD_JP2HBOX)?;
                }
                BoxType::Resolution => {
                    jp2h.res = Some(iter.read_unit::<ResBox, _>(ctx)?);
                }
                _ => {
                    warn!("jp2 (jp2h): unknown box {}", header);
                    ctx.add(catalog::UNK_BOXTYPE);
                }
            }

            last_was_colr = box_type == BoxType::ColourSpecification;
        }

        check_malformation(&iter, ctx, catalog::BAD_JP2HBOX);

        if first {
            warn!("jp2 (jp2h): empty header box");
            ctx.add(catalog::BAD_JP2HBOX);
        }

        if jp2h.n_colr == 0 {
            ctx.add(catalog::NO_COLRBOX);
        }

        let varies = jp2h.ihdr.as_ref().is_some_and(|ihdr| ihdr.depth == ComponentDepth::Varies);

        if varies && jp2h.bpcc.is_none() {
            ctx.add(catalog::NO_BPCBOX);
        }

        if jp2h.pclr.is_some() && jp2h.cmap.is_none() {
            ctx.add(catalog::NO_CMAPBOX);
        }

        debug!(
            "jp2 (jp2h): ihdr={}, colr={}, bpcc={}, pclr={}, cmap={}, cdef={}, res={}",
            jp2h.ihdr.is_some(),
            jp2h.n_colr,
            jp2h.bpcc.is_some(),
            jp2h.pclr.is_some(),
            jp2h.cmap.is_some(),
            jp2h.cdef.is_some(),
            jp2h.res.is_some()
        );

        Ok(jp2h)
    }
}
