// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use log::warn;

use crate::boxes::{BoxHeader, BoxType, ComponentDepth};
use crate::catalog;
use crate::context::{ImageFlags, ParseContext};

/// Bits per component box.
#[derive(Debug)]
pub struct BpccBox {
    pub depths: Vec<ComponentDepth>,
}

impl BpccBox {
    /// The sum of the component depths, or `None` if any depth is invalid.
    pub fn total_bits(&self) -> Option<u32> {
        self.depths.iter().map(|depth| depth.bits().map(u32::from)).sum()
    }
}

impl Unit<BoxType, ParseContext> for BpccBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let mut depths = Vec::with_capacity(header.data_len().min(256) as usize);

        while reader.bytes_available() > 0 {
            let depth = ComponentDepth::from_raw(reader.read_u8()?);

            if let ComponentDepth::Uniform { signed: true, .. } = depth {
                ctx.flags |= ImageFlags::SIGNED_COMPONENTS;
            }

            depths.push(depth);
        }

        Ok(BpccBox { depths })
    }
}

const MAX_PALETTE_ENTRIES: u16 = 1024;

/// Palette box.
#[derive(Debug)]
pub struct PclrBox {
    pub n_entries: u16,
    pub columns: Vec<ComponentDepth>,
}

impl Unit<BoxType, ParseContext> for PclrBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        ctx.flags |= ImageFlags::HAS_PALETTE;

        let mut reader = ScopedStream::new(reader, header.data_len());

        let n_entries = reader.read_be_u16()?;
        let n_columns = reader.read_u8()?;

        if n_entries == 0 || n_entries > MAX_PALETTE_ENTRIES || n_columns == 0 {
            warn!("jp2 (pclr): {} entries of {} columns", n_entries, n_columns);
            ctx.add(catalog::BAD_PCLRBOX);
            return decode_error("jp2 (pclr): invalid palette dimensions");
        }

        let mut columns = Vec::with_capacity(usize::from(n_columns));

        for _ in 0..n_columns {
            let depth = ComponentDepth::from_raw(reader.read_u8()?);

            if let ComponentDepth::Invalid(_) | ComponentDepth::Varies = depth {
                ctx.add(catalog::BAD_PCLRBOX);
            }

            columns.push(depth);
        }

        // Each entry stores one value per column, in as many bytes as the column's depth needs.
        let entry_len: u64 = columns
            .iter()
            .filter_map(ComponentDepth::bits)
            .map(|bits| u64::from(bits).div_ceil(8))
            .sum();

        if reader.bytes_available() < u64::from(n_entries) * entry_len {
            warn!("jp2 (pclr): palette entries exceed the box");
            ctx.add(catalog::BAD_PCLRBOX);
        }

        Ok(PclrBox { n_entries, columns })
    }
}

/// A component mapping entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ComponentMap {
    pub component: u16,
    /// 0 for direct use, 1 for a palette mapping.
    pub map_type: u8,
    pub palette_column: u8,
}

/// Component mapping box.
#[derive(Debug)]
pub struct CmapBox {
    pub entries: Vec<ComponentMap>,
}

impl Unit<BoxType, ParseContext> for CmapBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        ctx.flags |= ImageFlags::HAS_COMPONENT_MAPPING;

        let mut reader = ScopedStream::new(reader, header.data_len());

        let count = reader.bytes_available() / 4;
        let mut entries = Vec::with_capacity(count as usize);

        for _ in 0..count {
            entries.push(ComponentMap {
                component: reader.read_be_u16()?,
                map_type: reader.read_u8()?,
                palette_column: reader.read_u8()?,
            });
        }

        Ok(CmapBox { entries })
    }
}

/// A channel definition entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub index: u16,
    /// 0 for colour, 1 for opacity, 2 for premultiplied opacity.
    pub channel_type: u16,
    pub association: u16,
}

/// Channel definition box.
#[derive(Debug)]
pub struct CdefBox {
    pub channels: Vec<Channel>,
}

impl CdefBox {
    /// Returns `true` if any channel carries opacity.
    pub fn has_opacity(&self) -> bool {
        self.channels.iter().any(|ch| ch.channel_type == 1 || ch.channel_type == 2)
    }
}

impl Unit<BoxType, ParseContext> for CdefBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        ctx.flags |= ImageFlags::HAS_CHANNEL_DEFINITION;

        let mut reader = ScopedStream::new(reader, header.data_len());

        let count = reader.read_be_u16()?;
        let mut channels = Vec::with_capacity(usize::from(count));

        for _ in 0..count {
            channels.push(Channel {
                index: reader.read_be_u16()?,
                channel_type: reader.read_be_u16()?,
                association: reader.read_be_u16()?,
            });
        }

        Ok(CdefBox { channels })
    }
}
