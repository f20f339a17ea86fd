// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::bitstream::BitstreamKind;
use keepsake_core::errors::Result;
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::{fourcc_to_string, Unit};

use log::debug;

use crate::atoms::{AtomHeader, AtomType};
use crate::context::ParseContext;

/// Handler reference atom.
#[derive(Debug)]
pub struct HdlrAtom {
    /// Component type, `mhlr` for a media handler or `dhlr` for a data handler.
    pub component_type: [u8; 4],
    /// Component subtype, the kind of media or data reference being handled.
    pub component_subtype: [u8; 4],
}

impl HdlrAtom {
    /// The kind of bitstream the media handler describes, if any.
    pub fn bitstream_kind(&self) -> Option<BitstreamKind> {
        match &self.component_subtype {
            b"vide" => Some(BitstreamKind::Video),
            b"soun" => Some(BitstreamKind::Audio),
            _ => None,
        }
    }
}

impl Unit<AtomType, ParseContext> for HdlrAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let (_, _) = header.read_extended_header(&mut reader)?;

        let component_type = reader.read_quad_bytes()?;
        let component_subtype = reader.read_quad_bytes()?;

        // The component manufacturer, flags, flags mask, and name are not used.

        debug!(
            "qt (hdlr): type={} subtype={}",
            fourcc_to_string(&component_type),
            fourcc_to_string(&component_subtype)
        );

        Ok(HdlrAtom { component_type, component_subtype })
    }
}
