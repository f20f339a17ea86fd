// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::marker::PhantomData;

use keepsake_core::errors::Result;
use keepsake_core::io::{ReadBytes, ScopedStream};

use log::{debug, warn};

/// The size of a chunk header: a 4-byte tag followed by a 32-bit little-endian length.
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// `ParseChunkTag` implements `parse_tag` to map between the 4-byte chunk identifier and the
/// enumeration
pub trait ParseChunkTag: Sized {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self>;
}

/// `ChunksReader` reads chunks from a `ReadBytes` stream. It is generic across a type, usually an
/// enum, implementing the `ParseChunkTag` trait. When a new chunk is encountered in the stream,
/// `parse_tag` on T is called to return an object capable of parsing that chunk or `None`. A
/// returned chunk must be consumed with its `ChunkParser` before `next` is called again.
pub struct ChunksReader<T: ParseChunkTag> {
    len: u64,
    consumed: u64,
    truncated: bool,
    phantom: PhantomData<T>,
}

impl<T: ParseChunkTag> ChunksReader<T> {
    pub fn new(len: u64) -> Self {
        ChunksReader { len, consumed: 0, truncated: false, phantom: PhantomData }
    }

    /// Returns `true` if a chunk claimed more bytes than remained in the parent. Reading stops at
    /// such a chunk.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn next<B: ReadBytes + ?Sized>(&mut self, reader: &mut B) -> Result<Option<T>> {
        // Loop until a chunk is recognized and returned, or the end of the parent is reached.
        loop {
            if self.truncated || self.consumed >= self.len {
                return Ok(None);
            }

            // Chunks are aligned to 2-byte boundaries.
            if self.consumed & 0x1 == 1 {
                reader.ignore_bytes(1)?;
                self.consumed += 1;
            }

            // Fewer than 8 bytes cannot hold another chunk header.
            if self.consumed + CHUNK_HEADER_SIZE > self.len {
                return Ok(None);
            }

            let tag = reader.read_quad_bytes()?;
            let chunk_len = reader.read_u32()?;

            self.consumed += CHUNK_HEADER_SIZE;

            // Chunk length is untrusted, it may overflow if added to anything.
            if self.len - self.consumed < u64::from(chunk_len) {
                warn!(
                    "wav: chunk {} length of {} exceeds parent chunk",
                    String::from_utf8_lossy(&tag),
                    chunk_len
                );
                self.truncated = true;
                return Ok(None);
            }

            self.consumed += u64::from(chunk_len);

            match T::parse_tag(tag, chunk_len) {
                Some(chunk) => return Ok(Some(chunk)),
                None => {
                    debug!(
                        "wav: ignoring chunk: tag={}, len={}",
                        String::from_utf8_lossy(&tag),
                        chunk_len
                    );

                    reader.ignore_bytes(u64::from(chunk_len))?
                }
            }
        }
    }

    /// Skips whatever remains of the parent.
    pub fn finish<B: ReadBytes + ?Sized>(&mut self, reader: &mut B) -> Result<()> {
        if self.consumed < self.len {
            reader.ignore_bytes(self.len - self.consumed)?;
            self.consumed = self.len;
        }
        Ok(())
    }
}

/// Common trait implemented for all chunks that are parsed by a `ChunkParser`.
///
/// The reader given to `parse` is limited to the chunk's content.
pub trait ParseChunk: Sized {
    fn parse<B: ReadBytes>(reader: &mut B, tag: [u8; 4], len: u32) -> Result<Self>;
}

/// `ChunkParser` is a utility struct for unifying the parsing of chunks.
pub struct ChunkParser<P: ParseChunk> {
    tag: [u8; 4],
    pub len: u32,
    phantom: PhantomData<P>,
}

impl<P: ParseChunk> ChunkParser<P> {
    pub fn new(tag: [u8; 4], len: u32) -> Self {
        ChunkParser { tag, len, phantom: PhantomData }
    }

    /// Parses the chunk. Whether or not parsing succeeds, the reader is left at the end of the
    /// chunk's content.
    pub fn parse<B: ReadBytes + ?Sized>(&self, reader: &mut B) -> Result<P> {
        let mut scoped = ScopedStream::new(reader, u64::from(self.len));
        let result = P::parse(&mut scoped, self.tag, self.len);
        scoped.ignore()?;
        result
    }

    pub fn skip<B: ReadBytes + ?Sized>(&self, reader: &mut B) -> Result<()> {
        reader.ignore_bytes(u64::from(self.len))?;
        Ok(())
    }
}

/// A list whose members are all parsed the same way accepts every tag.
impl<P: ParseChunk> ParseChunkTag for ChunkParser<P> {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
        Some(ChunkParser::new(tag, len))
    }
}

/// Reads every sub-chunk of a list of `len` bytes. Returns the parsed chunks, and whether the
/// list ended at a truncated chunk.
pub fn read_list<P: ParseChunk, B: ReadBytes + ?Sized>(
    reader: &mut B,
    len: u64,
) -> Result<(Vec<P>, bool)> {
    let mut chunks = ChunksReader::<ChunkParser<P>>::new(len);
    let mut entries = Vec::new();

    while let Some(parser) = chunks.next(reader)? {
        entries.push(parser.parse(reader)?);
    }

    chunks.finish(reader)?;

    Ok((entries, chunks.is_truncated()))
}

#[cfg(test)]
mod tests {
    use keepsake_core::io::{BufReader, ReadBytes};

    use super::*;

    fn chunk(tag: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut buf = tag.to_vec();
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        if data.len() % 2 == 1 {
            buf.push(0);
        }
        buf
    }

    struct Tagged {
        tag: [u8; 4],
        len: u32,
    }

    impl ParseChunkTag for Tagged {
        fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
            if &tag == b"skip" {
                None
            }
            else {
                Some(Tagged { tag, len })
            }
        }
    }

    #[test]
    fn verify_odd_chunks_are_padded() {
        let data = [chunk(b"odd ", &[1, 2, 3]), chunk(b"skip", &[4]), chunk(b"even", &[5, 6])]
            .concat();

        let mut reader = BufReader::new(&data);
        let mut chunks = ChunksReader::<Tagged>::new(data.len() as u64);

        let first = chunks.next(&mut reader).unwrap().unwrap();
        assert_eq!((&first.tag, first.len), (b"odd ", 3));
        reader.ignore_bytes(3).unwrap();

        let second = chunks.next(&mut reader).unwrap().unwrap();
        assert_eq!((&second.tag, second.len), (b"even", 2));
        assert_eq!(reader.read_u16().unwrap(), 0x0605);

        assert!(chunks.next(&mut reader).unwrap().is_none());
        assert!(!chunks.is_truncated());
    }

    #[test]
    fn verify_overlong_chunk_is_truncated() {
        let mut data = chunk(b"good", &[0; 4]);
        data.extend_from_slice(b"long");
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0; 6]);

        let mut reader = BufReader::new(&data);
        let mut chunks = ChunksReader::<Tagged>::new(data.len() as u64);

        let good = chunks.next(&mut reader).unwrap().unwrap();
        reader.ignore_bytes(u64::from(good.len)).unwrap();

        assert!(chunks.next(&mut reader).unwrap().is_none());
        assert!(chunks.is_truncated());

        chunks.finish(&mut reader).unwrap();
        assert_eq!(reader.pos(), data.len() as u64);
    }

    struct Pair(u32, u32);

    impl ParseChunk for Pair {
        fn parse<B: ReadBytes>(reader: &mut B, _: [u8; 4], _: u32) -> Result<Self> {
            Ok(Pair(reader.read_u32()?, reader.read_u32()?))
        }
    }

    #[test]
    fn verify_parser_resyncs_after_short_chunk() {
        let data = [chunk(b"pair", &[1, 0, 0, 0, 2, 0]), chunk(b"next", &[])].concat();
        let mut reader = BufReader::new(&data);

        let parser = ChunkParser::<Pair>::new(*b"pair", 6);
        reader.ignore_bytes(8).unwrap();

        let err = parser.parse(&mut reader).err().unwrap();
        assert!(err.is_end_of_stream());
        assert_eq!(reader.pos(), 14);
    }
}
