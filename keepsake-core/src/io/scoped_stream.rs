// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use super::ReadBytes;

#[inline(always)]
fn out_of_bounds_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "out of bounds"))
}

/// A `ScopedStream` restricts the number of bytes that may be read to an upper limit.
///
/// Handlers for fixed-layout units read through a `ScopedStream` over the unit's content, so a
/// unit that is too small for its fields fails with `UnexpectedEof` instead of reading into its
/// next sibling.
pub struct ScopedStream<B: ReadBytes> {
    inner: B,
    len: u64,
    read: u64,
}

impl<B: ReadBytes> ScopedStream<B> {
    /// Instantiates a new `ScopedStream` with an upper limit on the number of bytes that can be
    /// read from the inner source.
    pub fn new(inner: B, len: u64) -> Self {
        ScopedStream { inner, len, read: 0 }
    }

    /// Returns a mutable reference to the inner stream.
    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    /// Returns the number of bytes that may still be read.
    pub fn bytes_available(&self) -> u64 {
        self.len - self.read
    }

    /// Ignores the remainder of the `ScopedStream`.
    pub fn ignore(&mut self) -> io::Result<()> {
        let rest = self.len - self.read;
        self.inner.ignore_bytes(rest)?;
        self.read = self.len;
        Ok(())
    }

    /// Convert the `ScopedStream` to the inner stream.
    pub fn into_inner(self) -> B {
        self.inner
    }

    #[inline(always)]
    fn check(&self, count: u64) -> io::Result<()> {
        if self.len - self.read < count {
            return out_of_bounds_error();
        }
        Ok(())
    }
}

impl<B: ReadBytes> ReadBytes for ScopedStream<B> {
    #[inline(always)]
    fn read_byte(&mut self) -> io::Result<u8> {
        self.check(1)?;
        let byte = self.inner.read_byte()?;
        self.read += 1;
        Ok(byte)
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        self.check(2)?;
        let bytes = self.inner.read_double_bytes()?;
        self.read += 2;
        Ok(bytes)
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        self.check(4)?;
        let bytes = self.inner.read_quad_bytes()?;
        self.read += 4;
        Ok(bytes)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.check(buf.len() as u64)?;
        self.inner.read_buf_exact(buf)?;
        self.read += buf.len() as u64;
        Ok(())
    }

    #[inline(always)]
    fn ignore_bytes(&mut self, count: u64) -> io::Result<()> {
        self.check(count)?;
        self.inner.ignore_bytes(count)?;
        self.read += count;
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.inner.pos()
    }
}
