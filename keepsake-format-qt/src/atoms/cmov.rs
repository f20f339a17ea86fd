// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Read;

use flate2::read::ZlibDecoder;

use keepsake_core::errors::{decode_error, limit_error, Result};
use keepsake_core::io::{BufReader, Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::{fourcc_to_string, Unit};

use log::{debug, warn};

use crate::atoms::{check_malformation, read_leaf, AtomHeader, AtomIterator, AtomType, MoovAtom};
use crate::catalog;
use crate::context::{MovieFlags, ParseContext};

/// Data compression atom.
#[derive(Debug)]
struct DcomAtom {
    algorithm: [u8; 4],
}

impl Unit<AtomType, ParseContext> for DcomAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());
        Ok(DcomAtom { algorithm: reader.read_quad_bytes()? })
    }
}

/// Compressed movie data atom.
#[derive(Debug)]
struct CmvdAtom {
    uncompressed_len: u32,
    data: Box<[u8]>,
}

impl Unit<AtomType, ParseContext> for CmvdAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let uncompressed_len = reader.read_be_u32()?;

        let data_len = reader.bytes_available();

        if data_len > ctx.options.max_decompressed_len {
            return decode_error("qt (cmvd): compressed movie resource is too large");
        }

        let data = reader.read_boxed_slice_exact(data_len as usize)?;

        Ok(CmvdAtom { uncompressed_len, data })
    }
}

/// Inflates a zlib compressed movie resource.
fn inflate(cmvd: &CmvdAtom, max_len: u64) -> Result<Vec<u8>> {
    let expected = u64::from(cmvd.uncompressed_len);

    if expected > max_len {
        return limit_error("qt (cmov): uncompressed movie resource exceeds the limit");
    }

    let mut buf = Vec::with_capacity(expected as usize);

    // Read at most one byte beyond the declared size to detect a size mismatch.
    ZlibDecoder::new(&cmvd.data[..]).take(expected + 1).read_to_end(&mut buf)?;

    if buf.len() as u64 != expected {
        return decode_error("qt (cmov): uncompressed movie resource size mismatch");
    }

    Ok(buf)
}

/// Walks the movie atom found inside an uncompressed movie resource.
fn read_inner_movie(buf: &[u8], ctx: &mut ParseContext) -> Result<Option<MoovAtom>> {
    let mut iter = AtomIterator::new_root(BufReader::new(buf));

    let movie = match iter.next()? {
        Some(header) if header.unit_type() == AtomType::Movie => {
            ctx.in_compressed_header = true;
            let movie = iter.read_unit::<MoovAtom, _>(ctx);
            ctx.in_compressed_header = false;
            Some(movie?)
        }
        _ => {
            warn!("qt (cmov): movie resource does not start with a moov atom");
            None
        }
    };

    Ok(movie)
}

/// Compressed movie atom.
#[derive(Debug)]
pub struct CmovAtom {
    /// The compression algorithm, `zlib` being the only one supported.
    pub algorithm: Option<[u8; 4]>,
    /// The movie atom found in the uncompressed movie resource.
    pub movie: Option<Box<MoovAtom>>,
}

impl Unit<AtomType, ParseContext> for CmovAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, &header);

        let mut dcom = None;
        let mut cmvd = None;

        ctx.movie |= MovieFlags::HAS_COMPRESSED_HEADER;

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                AtomType::DataCompression => {
                    dcom = read_leaf::<DcomAtom, _>(&mut iter, ctx)?;
                }
                AtomType::CompressedMovieData => {
                    cmvd = read_leaf::<CmvdAtom, _>(&mut iter, ctx)?;
                }
                _ => (),
            }
        }

        check_malformation(&iter, ctx);

        let algorithm = dcom.map(|dcom| dcom.algorithm);

        let movie = match (algorithm, &cmvd) {
            (Some(algorithm), Some(cmvd)) if &algorithm == b"zlib" => {
                let max_len = ctx.options.max_decompressed_len;

                match inflate(cmvd, max_len).and_then(|buf| {
                    debug!("qt (cmov): inflated movie resource to {} bytes", buf.len());
                    read_inner_movie(&buf, ctx)
                }) {
                    Ok(movie) => movie,
                    Err(err) => {
                        warn!("qt (cmov): {}", err);
                        None
                    }
                }
            }
            (Some(algorithm), _) if &algorithm != b"zlib" => {
                warn!("qt (cmov): unsupported compression '{}'", fourcc_to_string(&algorithm));
                None
            }
            _ => {
                warn!("qt (cmov): missing dcom or cmvd atom");
                None
            }
        };

        if movie.is_none() {
            ctx.add(catalog::UNSUPPORTED_COMPRESSED_HEADER);
        }

        Ok(CmovAtom { algorithm, movie: movie.map(Box::new) })
    }
}
