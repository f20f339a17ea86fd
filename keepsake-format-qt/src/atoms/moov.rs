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
use crate::atoms::{CmovAtom, MvhdAtom, TrakAtom};
use crate::catalog;
use crate::context::{MovieFlags, ParseContext};

/// Movie atom.
#[derive(Debug)]
pub struct MoovAtom {
    /// Movie header atom.
    pub mvhd: Option<MvhdAtom>,
    /// Compressed movie atom, if the movie's header is compressed.
    pub cmov: Option<CmovAtom>,
    /// Track atoms.
    pub traks: Vec<TrakAtom>,
}

impl MoovAtom {
    /// The movie header, looking into the compressed movie resource if necessary.
    pub fn movie_header(&self) -> Option<&MvhdAtom> {
        match &self.mvhd {
            Some(mvhd) => Some(mvhd),
            None => self.cmov.as_ref()?.movie.as_ref()?.movie_header(),
        }
    }
}

impl Unit<AtomType, ParseContext> for MoovAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, &header);

        let mut mvhd = None;
        let mut cmov = None;
        let mut traks = Vec::new();
        let mut seen_rmra = false;
        let mut is_first = true;

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                AtomType::CompressedMovie => {
                    // A compressed movie resource replaces the rest of the movie, and is only
                    // recognized as the first child.
                    if is_first && !ctx.in_compressed_header {
                        cmov = Some(iter.read_unit::<CmovAtom, _>(ctx)?);
                    }
                    else {
                        warn!("qt (moov): ignoring misplaced cmov atom");
                    }
                }
                AtomType::MovieHeader => {
                    mvhd = read_leaf::<MvhdAtom, _>(&mut iter, ctx)?;
                }
                AtomType::ReferenceMovie => {
                    seen_rmra = true;
                    ctx.movie |= MovieFlags::HAS_REFERENCES;
                }
                AtomType::Track => {
                    traks.push(iter.read_unit::<TrakAtom, _>(ctx)?);
                }
                AtomType::UserData => ctx.movie |= MovieFlags::HAS_USER_DATA,
                AtomType::ClippingRegion => ctx.movie |= MovieFlags::HAS_CLIPPING_REGION,
                AtomType::ColorTable => ctx.movie |= MovieFlags::HAS_COLOR_TABLE,
                _ => (),
            }

            is_first = false;
        }

        check_malformation(&iter, ctx);

        // At least one of a movie header, a compressed movie, or a reference movie is required.
        if mvhd.is_none() && cmov.is_none() && !seen_rmra {
            warn!("qt (moov): missing mvhd, cmov, and rmra atoms");
            ctx.add(catalog::BAD_MOOV);
        }

        Ok(MoovAtom { mvhd, cmov, traks })
    }
}
