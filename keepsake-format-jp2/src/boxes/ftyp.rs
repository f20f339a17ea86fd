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

use crate::boxes::{BoxHeader, BoxType};
use crate::catalog;
use crate::context::ParseContext;

/// The brand, and compatibility entry, of a JP2 file.
pub const JP2_BRAND: [u8; 4] = *b"jp2 ";

/// File type box.
#[derive(Debug)]
pub struct FtypBox {
    pub brand: [u8; 4],
    /// `None` if the box ends after the brand.
    pub minor_version: Option<u32>,
    pub compatibility: Vec<[u8; 4]>,
}

impl FtypBox {
    pub fn is_jp2_compatible(&self) -> bool {
        self.compatibility.contains(&JP2_BRAND)
    }

    /// The version of the JP2 format the file claims.
    pub fn version(&self) -> Option<String> {
        self.minor_version.map(|minor| format!("1.{}", minor))
    }
}

impl Unit<BoxType, ParseContext> for FtypBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let brand = reader.read_quad_bytes()?;

        // The minor version is followed by a list of 4 byte compatibility entries.
        let content_len = header.data_len();

        if content_len < 8 || content_len % 4 != 0 {
            warn!("jp2: file type box content of {} bytes is malformed", content_len);
            ctx.add(catalog::BAD_FTYPBOX);
            return Ok(FtypBox { brand, minor_version: None, compatibility: Vec::new() });
        }

        let minor_version = reader.read_be_u32()?;

        if minor_version != 0 {
            ctx.add(catalog::UNK_MIN_VERSION);
        }

        let count = reader.bytes_available() / 4;
        let mut compatibility = Vec::with_capacity(count as usize);

        for _ in 0..count {
            compatibility.push(reader.read_quad_bytes()?);
        }

        let ftyp = FtypBox { brand, minor_version: Some(minor_version), compatibility };

        if !ftyp.is_jp2_compatible() {
            ctx.add(catalog::NONCOMPAT_JP2);
        }

        Ok(ftyp)
    }
}
