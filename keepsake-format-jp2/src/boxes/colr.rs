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

use crate::boxes::{BoxHeader, BoxType};
use crate::catalog;
use crate::context::{ImageFlags, ParseContext};

/// How a colour specification box specifies the colourspace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorMethod {
    Enumerated,
    RestrictedIcc,
}

impl ColorMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ColorMethod::Enumerated => "enumerated",
            ColorMethod::RestrictedIcc => "restricted_icc",
        }
    }
}

/// Colour specification box.
#[derive(Debug)]
pub struct ColrBox {
    /// `None` if the method is not defined for JP2.
    pub method: Option<ColorMethod>,
    pub precedence: i8,
    pub approximation: u8,
    pub enumerated_colorspace: Option<u32>,
}

impl ColrBox {
    /// The name of the enumerated colourspace, if known.
    pub fn colorspace_name(&self) -> Option<&'static str> {
        match self.enumerated_colorspace? {
            16 => Some("sRGB"),
            17 => Some("greyscale"),
            18 => Some("sYCC"),
            _ => None,
        }
    }
}

impl Unit<BoxType, ParseContext> for ColrBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let meth = reader.read_u8()?;
        let precedence = reader.read_u8()? as i8;
        let approximation = reader.read_u8()?;

        let method = match meth {
            1 => Some(ColorMethod::Enumerated),
            2 => Some(ColorMethod::RestrictedIcc),
            _ => {
                warn!("jp2 (colr): unknown specification method {}", meth);
                ctx.add(catalog::UNK_CS_METH);
                None
            }
        };

        let enumerated_colorspace = match method {
            Some(ColorMethod::Enumerated) => Some(reader.read_be_u32()?),
            Some(ColorMethod::RestrictedIcc) => {
                ctx.flags |= ImageFlags::HAS_ICC_PROFILE;
                debug!("jp2 (colr): icc profile of {} bytes", reader.bytes_available());
                None
            }
            None => None,
        };

        let colr = ColrBox { method, precedence, approximation, enumerated_colorspace };

        if let (Some(cs), None) = (colr.enumerated_colorspace, colr.colorspace_name()) {
            warn!("jp2 (colr): unknown enumerated colourspace {}", cs);
        }

        Ok(colr)
    }
}
