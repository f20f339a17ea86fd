// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements the byte-level cursors every parser reads through.
//!
//! The following nomenclature is used to denote where the data being read is sourced from:
//!  * A `Stream` consumes any source implementing [`MediaSource`] (aka. [`std::io::Read`] plus
//!    [`std::io::Seek`]).
//!  * A `Reader` consumes a `&[u8]`.
//!
//! Both implement [`ReadBytes`] and [`Cursor`], so a handler never knows whether it is reading a
//! file on disk or a buffer that was decompressed in memory.

use std::io;
use std::mem;

mod buf_reader;
mod scoped_stream;
mod source_stream;

pub use buf_reader::BufReader;
pub use scoped_stream::ScopedStream;
pub use source_stream::SourceStream;

/// The byte order used to interpret a multi-byte integer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// `MediaSource` is a composite trait of [`std::io::Read`] and [`std::io::Seek`]. A source *must*
/// implement this trait to be used by [`SourceStream`].
pub trait MediaSource: io::Read + io::Seek {
    /// Returns the length in bytes, if available. This may be an expensive operation.
    fn byte_len(&self) -> Option<u64>;
}

impl MediaSource for std::fs::File {
    /// Returns the length in bytes of the `std::io::File` backing the `MediaSource`.
    ///
    /// Note: This operation involves querying the underlying file descriptor for information and
    /// may be moderately expensive.
    fn byte_len(&self) -> Option<u64> {
        match self.metadata() {
            Ok(metadata) => Some(metadata.len()),
            _ => None,
        }
    }
}

impl<T: std::convert::AsRef<[u8]>> MediaSource for io::Cursor<T> {
    /// Returns the length in bytes of the `io::Cursor<u8>` backing the `MediaSource`.
    fn byte_len(&self) -> Option<u64> {
        // Get the underlying container, usually &Vec<T>.
        let inner = self.get_ref();
        Some(inner.as_ref().len() as u64)
    }
}

/// `ReadBytes` provides methods to read bytes and interpret them as little- or big-endian
/// unsigned integers of standard widths.
pub trait ReadBytes {
    /// Reads a single byte from the stream and returns it or an error.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Reads two bytes from the stream and returns them in read-order or an error.
    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]>;

    /// Reads four bytes from the stream and returns them in read-order or an error.
    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]>;

    /// Reads exactly the number of bytes required to fill be provided buffer or returns an error.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Ignores the specified number of bytes from the stream or returns an error.
    fn ignore_bytes(&mut self, count: u64) -> io::Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;

    /// Reads `n` bytes, where `1 <= n <= 8`, and interprets them as an unsigned integer in the
    /// given byte order.
    fn read_bytes(&mut self, n: usize, order: ByteOrder) -> io::Result<u64> {
        if n == 0 || n > mem::size_of::<u64>() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid integer width"));
        }

        let mut buf = [0u8; mem::size_of::<u64>()];
        self.read_buf_exact(&mut buf[..n])?;

        let value = match order {
            ByteOrder::BigEndian => buf[..n].iter().fold(0, |acc, &b| (acc << 8) | u64::from(b)),
            ByteOrder::LittleEndian => {
                buf[..n].iter().rev().fold(0, |acc, &b| (acc << 8) | u64::from(b))
            }
        };

        Ok(value)
    }

    /// Reads a single unsigned byte from the stream and returns it or an error.
    #[inline(always)]
    fn read_u8(&mut self) -> io::Result<u8> {
        self.read_byte()
    }

    /// Reads two bytes from the stream and interprets them as an unsigned 16-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_u16(&mut self) -> io::Result<u16> {
        Ok(u16::from_le_bytes(self.read_double_bytes()?))
    }

    /// Reads two bytes from the stream and interprets them as an unsigned 16-bit big-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_be_u16(&mut self) -> io::Result<u16> {
        Ok(u16::from_be_bytes(self.read_double_bytes()?))
    }

    /// Reads two bytes from the stream and interprets them as an signed 16-bit big-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_be_i16(&mut self) -> io::Result<i16> {
        Ok(i16::from_be_bytes(self.read_double_bytes()?))
    }

    /// Reads four bytes from the stream and interprets them as an unsigned 32-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.read_quad_bytes()?))
    }

    /// Reads four bytes from the stream and interprets them as an unsigned 32-bit big-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_be_u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_be_bytes(self.read_quad_bytes()?))
    }

    /// Reads four bytes from the stream and interprets them as a signed 32-bit big-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_be_i32(&mut self) -> io::Result<i32> {
        Ok(i32::from_be_bytes(self.read_quad_bytes()?))
    }

    /// Reads eight bytes from the stream and interprets them as an unsigned 64-bit big-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_be_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; mem::size_of::<u64>()];
        self.read_buf_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads exactly the number of bytes requested, and returns a boxed slice of the data or an
    /// error.
    fn read_boxed_slice_exact(&mut self, len: usize) -> io::Result<Box<[u8]>> {
        let mut buf = vec![0u8; len];
        self.read_buf_exact(&mut buf)?;
        Ok(buf.into_boxed_slice())
    }
}

impl<R: ReadBytes + ?Sized> ReadBytes for &mut R {
    #[inline(always)]
    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        (**self).read_double_bytes()
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        (**self).read_quad_bytes()
    }

    #[inline(always)]
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_buf_exact(buf)
    }

    #[inline(always)]
    fn ignore_bytes(&mut self, count: u64) -> io::Result<()> {
        (**self).ignore_bytes(count)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

/// A `Cursor` is a [`ReadBytes`] stream of known length that supports absolute seeking.
pub trait Cursor: ReadBytes {
    /// Returns the length of the the stream in bytes.
    fn byte_len(&self) -> u64;

    /// Seeks to an absolute position in the stream. Seeking beyond the end of the stream is an
    /// error.
    fn seek(&mut self, pos: u64) -> io::Result<u64>;

    /// Returns the number of bytes between the current position and the end of the stream.
    fn remaining(&self) -> u64 {
        self.byte_len().saturating_sub(self.pos())
    }
}

impl<C: Cursor + ?Sized> Cursor for &mut C {
    fn byte_len(&self) -> u64 {
        (**self).byte_len()
    }

    fn seek(&mut self, pos: u64) -> io::Result<u64> {
        (**self).seek(pos)
    }
}
