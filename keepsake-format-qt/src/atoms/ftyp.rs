// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::Result;
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use crate::atoms::{AtomHeader, AtomType};
use crate::context::ParseContext;

/// File type atom.
#[derive(Debug)]
pub struct FtypAtom {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
}

impl Unit<AtomType, ParseContext> for FtypAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let major_brand = reader.read_quad_bytes()?;
        let minor_version = reader.read_be_u32()?;

        // The remainder of the atom is a list of 4 byte brands. Any partial brand is ignored.
        let count = reader.bytes_available() / 4;
        let mut compatible_brands = Vec::with_capacity(count as usize);

        for _ in 0..count {
            compatible_brands.push(reader.read_quad_bytes()?);
        }

        Ok(FtypAtom { major_brand, minor_version, compatible_brands })
    }
}
