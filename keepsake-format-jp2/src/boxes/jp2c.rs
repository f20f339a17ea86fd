// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::Result;
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use log::{debug, warn};

use crate::boxes::{BoxHeader, BoxType, ComponentDepth};
use crate::catalog;
use crate::context::ParseContext;

/// Start of codestream marker.
const SOC_MARKER: u16 = 0xff4f;

/// Image and tile size marker.
const SIZ_MARKER: u16 = 0xff51;

/// The image and tile size segment of a codestream's main header.
#[derive(Debug)]
pub struct SizSegment {
    pub capabilities: u16,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub components: Vec<ComponentDepth>,
}

impl SizSegment {
    fn read<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        let _len = reader.read_be_u16()?;
        let capabilities = reader.read_be_u16()?;
        let x_size = reader.read_be_u32()?;
        let y_size = reader.read_be_u32()?;
        let x_offset = reader.read_be_u32()?;
        let y_offset = reader.read_be_u32()?;
        let tile_width = reader.read_be_u32()?;
        let tile_height = reader.read_be_u32()?;
        let _tile_x_offset = reader.read_be_u32()?;
        let _tile_y_offset = reader.read_be_u32()?;
        let n_components = reader.read_be_u16()?;

        let mut components = Vec::with_capacity(usize::from(n_components).min(256));

        for _ in 0..n_components {
            components.push(ComponentDepth::from_raw(reader.read_u8()?));
            // Horizontal and vertical separation.
            reader.ignore_bytes(2)?;
        }

        Ok(SizSegment {
            capabilities,
            width: x_size.saturating_sub(x_offset),
            height: y_size.saturating_sub(y_offset),
            tile_width,
            tile_height,
            components,
        })
    }

    /// The sum of the component depths, or `None` if any depth is invalid.
    pub fn total_bits(&self) -> Option<u32> {
        self.components.iter().map(|depth| depth.bits().map(u32::from)).sum()
    }
}

/// Reads the start of a codestream's main header: the start of codestream marker, immediately
/// followed by the image and tile size segment.
fn read_main_header<B: ReadBytes>(reader: &mut B) -> Result<Option<SizSegment>> {
    if reader.read_be_u16()? != SOC_MARKER || reader.read_be_u16()? != SIZ_MARKER {
        return Ok(None);
    }

    Ok(Some(SizSegment::read(reader)?))
}

/// Contiguous codestream box.
#[derive(Debug)]
pub struct Jp2cBox {
    /// The position of the codestream.
    pub offset: u64,
    pub len: u64,
    /// `None` if the codestream does not begin with a valid main header.
    pub siz: Option<SizSegment>,
}

impl Unit<BoxType, ParseContext> for Jp2cBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        let offset = header.data_pos();
        let len = header.data_len();

        let mut reader = ScopedStream::new(reader, len);

        let siz = match read_main_header(&mut reader) {
            Ok(siz) => siz,
            Err(err) if err.is_end_of_stream() => None,
            Err(err) => return Err(err),
        };

        match &siz {
            Some(siz) => debug!(
                "jp2 (jp2c): {}x{}, {} component(s), tiles {}x{}",
                siz.width,
                siz.height,
                siz.components.len(),
                siz.tile_width,
                siz.tile_height
            ),
            None => {
                warn!("jp2 (jp2c): codestream at {} has no valid main header", offset);
                ctx.add(catalog::BAD_JP2CBOX);
            }
        }

        Ok(Jp2cBox { offset, len, siz })
    }
}
