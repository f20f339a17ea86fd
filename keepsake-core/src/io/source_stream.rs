// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::{Cursor, MediaSource, ReadBytes};

#[inline(always)]
fn end_of_stream_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"))
}

/// `SourceStream` is the random-access cursor over a [`MediaSource`] such as a file.
///
/// Reads are buffered. The length of the source is captured when the stream is created and the
/// stream refuses to read or seek beyond it.
pub struct SourceStream<R: MediaSource> {
    inner: io::BufReader<R>,
    pos: u64,
    len: u64,
}

impl SourceStream<File> {
    /// Opens the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        SourceStream::new(File::open(path)?)
    }
}

impl<R: MediaSource> SourceStream<R> {
    /// Instantiates a new `SourceStream` positioned at the start of `source`.
    pub fn new(mut source: R) -> io::Result<Self> {
        let len = match source.byte_len() {
            Some(len) => len,
            None => source.seek(SeekFrom::End(0))?,
        };

        source.seek(SeekFrom::Start(0))?;

        Ok(SourceStream { inner: io::BufReader::new(source), pos: 0, len })
    }

    /// Unwraps this `SourceStream`, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    fn ensure_available(&self, count: u64) -> io::Result<()> {
        if self.len - self.pos < count {
            return end_of_stream_error();
        }
        Ok(())
    }
}

impl<R: MediaSource> ReadBytes for SourceStream<R> {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_buf_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        let mut bytes = [0u8; 2];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.ensure_available(buf.len() as u64)?;
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> io::Result<()> {
        self.ensure_available(count)?;

        // Relative seeks within the buffered region do not discard the buffer.
        match i64::try_from(count) {
            Ok(delta) => self.inner.seek_relative(delta)?,
            Err(_) => {
                self.inner.seek(SeekFrom::Start(self.pos + count))?;
            }
        }

        self.pos += count;
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.pos
    }
}

impl<R: MediaSource> Cursor for SourceStream<R> {
    #[inline(always)]
    fn byte_len(&self) -> u64 {
        self.len
    }

    fn seek(&mut self, pos: u64) -> io::Result<u64> {
        if pos > self.len {
            return end_of_stream_error();
        }

        self.pos = self.inner.seek(SeekFrom::Start(pos))?;
        Ok(self.pos)
    }
}
