// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::Result;
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use log::warn;

use crate::boxes::{BoxHeader, BoxType, ComponentDepth};
use crate::catalog;
use crate::context::{ImageFlags, ParseContext};

/// The size of the image header box content.
const IHDR_CONTENT_LEN: u64 = 14;

/// The only compression type of a JP2 file.
const COMPRESSION_JPEG2000: u8 = 7;

const MAX_COMPONENTS: u16 = 16384;

/// Image header box.
#[derive(Debug)]
pub struct IhdrBox {
    pub height: u32,
    pub width: u32,
    pub n_components: u16,
    pub depth: ComponentDepth,
    pub compression: u8,
}

impl Unit<BoxType, ParseContext> for IhdrBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        if header.data_len() != IHDR_CONTENT_LEN {
            warn!("jp2 (ihdr): content length is {}", header.data_len());
            ctx.add(catalog::BAD_IHDRBOX);
        }

        let mut reader = ScopedStream::new(reader, header.data_len());

        let height = reader.read_be_u32()?;
        let width = reader.read_be_u32()?;
        let n_components = reader.read_be_u16()?;
        let depth = ComponentDepth::from_raw(reader.read_u8()?);
        let compression = reader.read_u8()?;
        let color_unknown = reader.read_u8()?;
        let ipr = reader.read_u8()?;

        if height == 0 || width == 0 {
            warn!("jp2 (ihdr): invalid dimensions {}x{}", width, height);
            ctx.add(catalog::BAD_IHDRBOX);
        }

        if n_components == 0 || n_components > MAX_COMPONENTS {
            warn!("jp2 (ihdr): invalid number of components {}", n_components);
            ctx.add(catalog::BAD_IHDRBOX);
        }

        match depth {
            ComponentDepth::Uniform { signed: true, .. } => {
                ctx.flags |= ImageFlags::SIGNED_COMPONENTS;
            }
            ComponentDepth::Invalid(val) => {
                warn!("jp2 (ihdr): invalid bits per component {:#04x}", val);
                ctx.add(catalog::BAD_IHDRBOX);
            }
            _ => (),
        }

        if compression != COMPRESSION_JPEG2000 {
            warn!("jp2 (ihdr): unknown compression type {}", compression);
            ctx.add(catalog::BAD_IHDRBOX);
        }

        match color_unknown {
            0 => (),
            1 => ctx.flags |= ImageFlags::COLOR_UNKNOWN,
            _ => ctx.add(catalog::UNK_UNKC),
        }

        match ipr {
            0 => (),
            1 => ctx.flags |= ImageFlags::HAS_IPR,
            _ => {
                warn!("jp2 (ihdr): invalid intellectual property flag {}", ipr);
                ctx.add(catalog::BAD_IHDRBOX);
            }
        }

        Ok(IhdrBox { height, width, n_components, depth, compression })
    }
}
