// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::{Error, Result};
use keepsake_core::io::Cursor;
use keepsake_core::unit::{Malformation, Unit, UnitHeader, UnitIterator};

use log::warn;

use crate::catalog;
use crate::context::ParseContext;

pub(crate) mod cmov;
pub(crate) mod ftyp;
pub(crate) mod hdlr;
pub(crate) mod mdhd;
pub(crate) mod mdia;
pub(crate) mod minf;
pub(crate) mod moov;
pub(crate) mod mvhd;
pub(crate) mod stbl;
pub(crate) mod stsd;
pub(crate) mod stts;
pub(crate) mod tkhd;
pub(crate) mod trak;

pub use cmov::CmovAtom;
pub use ftyp::FtypAtom;
pub use hdlr::HdlrAtom;
pub use mdhd::MdhdAtom;
pub use mdia::MdiaAtom;
pub use minf::MinfAtom;
pub use moov::MoovAtom;
pub use mvhd::MvhdAtom;
pub use stbl::StblAtom;
pub use stsd::{SampleDescription, StsdAtom};
pub use stts::SttsAtom;
pub use tkhd::{TkhdAtom, TrackFlags};
pub use trak::TrakAtom;

/// Atom types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomType {
    Alias,
    ClippingRegion,
    ColorTable,
    CompressedMovie,
    CompressedMovieData,
    DataCompression,
    DataInfo,
    DataReference,
    FileType,
    Free,
    Handler,
    Media,
    MediaData,
    MediaHeader,
    MediaInfo,
    Movie,
    MovieHeader,
    ReferenceMovie,
    Resource,
    SampleDescription,
    SampleTable,
    Skip,
    SoundMediaHeader,
    TimeToSample,
    Track,
    TrackHeader,
    Url,
    UserData,
    VideoMediaHeader,
    Wide,
    Other([u8; 4]),
}

impl From<[u8; 4]> for AtomType {
    fn from(val: [u8; 4]) -> Self {
        // QuickTime readers match atom types without regard to case.
        match &val.map(|b| b.to_ascii_lowercase()) {
            b"alis" => AtomType::Alias,
            b"clip" => AtomType::ClippingRegion,
            b"cmov" => AtomType::CompressedMovie,
            b"cmvd" => AtomType::CompressedMovieData,
            b"ctab" => AtomType::ColorTable,
            b"dcom" => AtomType::DataCompression,
            b"dinf" => AtomType::DataInfo,
            b"dref" => AtomType::DataReference,
            b"free" => AtomType::Free,
            b"ftyp" => AtomType::FileType,
            b"hdlr" => AtomType::Handler,
            b"mdat" => AtomType::MediaData,
            b"mdhd" => AtomType::MediaHeader,
            b"mdia" => AtomType::Media,
            b"minf" => AtomType::MediaInfo,
            b"moov" => AtomType::Movie,
            b"mvhd" => AtomType::MovieHeader,
            b"rmra" => AtomType::ReferenceMovie,
            b"rsrc" => AtomType::Resource,
            b"skip" => AtomType::Skip,
            b"smhd" => AtomType::SoundMediaHeader,
            b"stbl" => AtomType::SampleTable,
            b"stsd" => AtomType::SampleDescription,
            b"stts" => AtomType::TimeToSample,
            b"tkhd" => AtomType::TrackHeader,
            b"trak" => AtomType::Track,
            b"udta" => AtomType::UserData,
            b"url " => AtomType::Url,
            b"vmhd" => AtomType::VideoMediaHeader,
            b"wide" => AtomType::Wide,
            _ => AtomType::Other(val),
        }
    }
}

/// A QuickTime atom header.
pub type AtomHeader = UnitHeader<AtomType>;

/// Iterates over the sibling atoms of a scope.
pub type AtomIterator<B> = UnitIterator<B, AtomType>;

/// A handler for one kind of QuickTime atom.
pub trait Atom: Unit<AtomType, ParseContext> {}

impl<A: Unit<AtomType, ParseContext>> Atom for A {}

/// Reads the current atom with a leaf handler.
///
/// A leaf that is too small for its fields is recorded as `A_QUICKTIME_ATOM_TOO_SMALL`. A leaf
/// whose fields are invalid is logged. Both are returned as `None` so the parent can treat the
/// atom as missing.
pub fn read_leaf<A: Atom, B: Cursor>(
    iter: &mut AtomIterator<B>,
    ctx: &mut ParseContext,
) -> Result<Option<A>> {
    match iter.read_unit::<A, ParseContext>(ctx) {
        Ok(atom) => Ok(Some(atom)),
        Err(err) if err.is_end_of_stream() => {
            ctx.add(catalog::ATOM_TOO_SMALL);
            Ok(None)
        }
        Err(Error::DecodeError(msg)) => {
            warn!("{}", msg);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Records an anomaly for a scope whose walk ended on an atom with an impossible size.
pub fn check_malformation<B: Cursor>(iter: &AtomIterator<B>, ctx: &mut ParseContext) {
    match iter.malformation() {
        Some(Malformation::Undersized { pos }) => {
            warn!("qt: atom at {} is smaller than its header", pos);
            ctx.add(catalog::ATOM_TOO_SMALL);
        }
        Some(Malformation::Overflow { pos }) => {
            warn!("qt: atom at {} extends past its parent", pos);
            ctx.add(catalog::ATOM_TRUNCATED);
        }
        None => (),
    }
}

#[cfg(test)]
mod tests {
    use super::AtomType;

    #[test]
    fn verify_atom_type_ignores_case() {
        assert_eq!(AtomType::from(*b"moov"), AtomType::Movie);
        assert_eq!(AtomType::from(*b"MOOV"), AtomType::Movie);
        assert_eq!(AtomType::from(*b"Url "), AtomType::Url);
        assert_eq!(AtomType::from(*b"abcd"), AtomType::Other(*b"abcd"));
    }
}
