// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::anomaly::SevereElement;
use keepsake_core::errors::{Error, Result};
use keepsake_core::io::Cursor;
use keepsake_core::unit::{Malformation, Unit, UnitHeader, UnitIterator};

use log::warn;

use crate::context::ParseContext;

pub(crate) mod colr;
pub(crate) mod components;
pub(crate) mod ftyp;
pub(crate) mod ihdr;
pub(crate) mod jp2c;
pub(crate) mod jp2h;
pub(crate) mod res;

pub use colr::{ColorMethod, ColrBox};
pub use components::{BpccBox, CdefBox, CmapBox, PclrBox};
pub use ftyp::FtypBox;
pub use ihdr::IhdrBox;
pub use jp2c::{Jp2cBox, SizSegment};
pub use jp2h::Jp2hBox;
pub use res::{ResBox, Resolution};

/// Box types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoxType {
    BitsPerComponent,
    CaptureResolution,
    ChannelDefinition,
    ColourSpecification,
    ComponentMapping,
    ContiguousCodestream,
    DisplayResolution,
    FileType,
    ImageHeader,
    IntellectualProperty,
    Jp2Header,
    Palette,
    Resolution,
    Signature,
    Uuid,
    UuidInfo,
    Xml,
    Other([u8; 4]),
}

impl From<[u8; 4]> for BoxType {
    fn from(val: [u8; 4]) -> Self {
        // Unlike QuickTime, JPEG 2000 box types are case sensitive.
        match &val {
            b"bpcc" => BoxType::BitsPerComponent,
            b"cdef" => BoxType::ChannelDefinition,
            b"cmap" => BoxType::ComponentMapping,
            b"colr" => BoxType::ColourSpecification,
            b"ftyp" => BoxType::FileType,
            b"ihdr" => BoxType::ImageHeader,
            b"jP  " => BoxType::Signature,
            b"jp2c" => BoxType::ContiguousCodestream,
            b"jp2h" => BoxType::Jp2Header,
            b"jp2i" => BoxType::IntellectualProperty,
            b"pclr" => BoxType::Palette,
            b"res " => BoxType::Resolution,
            b"resc" => BoxType::CaptureResolution,
            b"resd" => BoxType::DisplayResolution,
            b"uinf" => BoxType::UuidInfo,
            b"uuid" => BoxType::Uuid,
            b"xml " => BoxType::Xml,
            _ => BoxType::Other(val),
        }
    }
}

/// A JPEG 2000 box header.
pub type BoxHeader = UnitHeader<BoxType>;

/// Iterates over the sibling boxes of a scope.
pub type BoxIterator<B> = UnitIterator<B, BoxType>;

/// The bit depth of image components, as coded in the image header, bits per component and
/// palette boxes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentDepth {
    Uniform { bits: u8, signed: bool },
    /// The depth differs between components, see the bits per component box.
    Varies,
    Invalid(u8),
}

impl ComponentDepth {
    pub fn from_raw(val: u8) -> Self {
        // The low 7 bits are the depth minus one, and the high bit is set for signed values.
        // Depths range from 1 to 38 bits.
        match val {
            0xff => ComponentDepth::Varies,
            _ if val & 0x7f < 38 => {
                ComponentDepth::Uniform { bits: (val & 0x7f) + 1, signed: val & 0x80 != 0 }
            }
            _ => ComponentDepth::Invalid(val),
        }
    }

    pub fn bits(&self) -> Option<u8> {
        match self {
            ComponentDepth::Uniform { bits, .. } => Some(*bits),
            _ => None,
        }
    }
}

/// Reads the current box with a leaf handler.
///
/// A leaf that is too small for its fields is recorded as `short`. A leaf whose fields are
/// invalid is logged. Both are returned as `None` so the parent can treat the box as missing.
pub fn read_leaf<U: Unit<BoxType, ParseContext>, B: Cursor>(
    iter: &mut BoxIterator<B>,
    ctx: &mut ParseContext,
    short: SevereElement,
) -> Result<Option<U>> {
    match iter.read_unit::<U, ParseContext>(ctx) {
        Ok(unit) => Ok(Some(unit)),
        Err(err) if err.is_end_of_stream() => {
            ctx.add(short);
            Ok(None)
        }
        Err(Error::DecodeError(msg)) => {
            warn!("{}", msg);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Records `anomaly` for a scope whose walk ended on a box with an impossible size.
pub fn check_malformation<B: Cursor>(
    iter: &BoxIterator<B>,
    ctx: &mut ParseContext,
    anomaly: SevereElement,
) {
    match iter.malformation() {
        Some(Malformation::Undersized { pos }) => {
            warn!("jp2: box at {} is smaller than its header", pos);
            ctx.add(anomaly);
        }
        Some(Malformation::Overflow { pos }) => {
            warn!("jp2: box at {} extends past its parent", pos);
            ctx.add(anomaly);
        }
        None => (),
    }
}
