// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type-tagged, length-prefixed units (atoms, boxes) and the walker that iterates over them.
//!
//! A unit header is a 32-bit big-endian size followed by a four character type. A size of 1
//! means a 64-bit size follows the type. A size of 0 means the unit extends to the end of its
//! enclosing scope. Both special forms are resolved when the header is read, so every
//! [`UnitHeader`] carries a concrete length.

use std::fmt;

use log::debug;

use crate::errors::{decode_error, end_of_stream_error, Result};
use crate::io::{Cursor, ReadBytes};

/// The smallest possible unit header: a 32-bit size and a four character type.
pub const MIN_HEADER_SIZE: u64 = 8;

/// The size of a unit header using the 64-bit extended size form.
pub const LARGE_HEADER_SIZE: u64 = MIN_HEADER_SIZE + 8;

/// Renders a four character code as text. Non-printable bytes are escaped.
pub fn fourcc_to_string(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { char::from(b) } else { '.' })
        .collect()
}

/// Compares a four character code with a textual type name, ignoring ASCII case.
pub fn fourcc_eq_ignore_case(tag: &[u8; 4], name: &str) -> bool {
    tag.eq_ignore_ascii_case(name.as_bytes())
}

/// Common unit header.
#[derive(Copy, Clone, Debug)]
pub struct UnitHeader<T> {
    /// The decoded unit type.
    unit_type: T,
    /// The raw four character code.
    tag: [u8; 4],
    /// The size of the header, either 8 or 16 bytes.
    header_len: u8,
    /// The position of the unit.
    unit_pos: u64,
    /// The total size of the unit including the header.
    unit_len: u64,
    /// True if the unit was declared with a size of 0.
    to_end: bool,
}

/// A header as read, before its size is validated against the enclosing scope.
struct RawHeader {
    tag: [u8; 4],
    header_len: u8,
    unit_pos: u64,
    unit_len: u64,
    to_end: bool,
}

impl RawHeader {
    fn read<B: ReadBytes>(reader: &mut B, scope_left: u64) -> Result<RawHeader> {
        let unit_pos = reader.pos();

        let size = u64::from(reader.read_be_u32()?);
        let tag = reader.read_quad_bytes()?;

        let header = match size {
            0 => {
                // The unit claims everything left in the enclosing scope.
                RawHeader { tag, header_len: 8, unit_pos, unit_len: scope_left, to_end: true }
            }
            1 => {
                let unit_len = reader.read_be_u64()?;
                RawHeader { tag, header_len: 16, unit_pos, unit_len, to_end: false }
            }
            _ => RawHeader { tag, header_len: 8, unit_pos, unit_len: size, to_end: false },
        };

        Ok(header)
    }

    fn is_undersized(&self) -> bool {
        self.unit_len < u64::from(self.header_len)
    }

    fn into_header<T: From<[u8; 4]>>(self) -> UnitHeader<T> {
        UnitHeader {
            unit_type: T::from(self.tag),
            tag: self.tag,
            header_len: self.header_len,
            unit_pos: self.unit_pos,
            unit_len: self.unit_len,
            to_end: self.to_end,
        }
    }
}

impl<T: From<[u8; 4]> + Copy> UnitHeader<T> {
    /// Reads a unit header. `scope_left` is the number of bytes between the start of the unit and
    /// the end of the enclosing scope, and is used to resolve a declared size of 0.
    ///
    /// A declared size smaller than the header itself is an error.
    pub fn read<B: ReadBytes>(reader: &mut B, scope_left: u64) -> Result<UnitHeader<T>> {
        let raw = RawHeader::read(reader, scope_left)?;

        if raw.is_undersized() {
            return decode_error("unit: size is invalid");
        }

        Ok(raw.into_header())
    }

    /// Instantiates a header for a unit that is about to be written.
    pub fn new(tag: [u8; 4], unit_len: u64) -> UnitHeader<T> {
        let header_len = if unit_len > u64::from(u32::MAX) { 16 } else { 8 };
        UnitHeader {
            unit_type: T::from(tag),
            tag,
            header_len,
            unit_pos: 0,
            unit_len,
            to_end: false,
        }
    }
}

impl<T: Copy> UnitHeader<T> {
    /// Get the unit type.
    pub fn unit_type(&self) -> T {
        self.unit_type
    }

    /// Get the raw four character code.
    pub fn tag(&self) -> [u8; 4] {
        self.tag
    }

    /// Get the unit position.
    pub fn unit_pos(&self) -> u64 {
        self.unit_pos
    }

    /// Get the total unit size, including the header.
    pub fn unit_len(&self) -> u64 {
        self.unit_len
    }

    /// Get the unit's header size.
    pub fn header_len(&self) -> u64 {
        u64::from(self.header_len)
    }

    /// Get the position of the first byte of the unit's content.
    pub fn data_pos(&self) -> u64 {
        self.unit_pos + u64::from(self.header_len)
    }

    /// Get the size of the unit's content.
    pub fn data_len(&self) -> u64 {
        self.unit_len - u64::from(self.header_len)
    }

    /// Get the exclusive end position of the unit.
    pub fn unit_end(&self) -> u64 {
        self.unit_pos + self.unit_len
    }

    /// Returns `true` if the unit was declared to extend to the end of its scope.
    pub fn extends_to_end(&self) -> bool {
        self.to_end
    }

    /// Given a position, calculate the amount of unread content.
    pub fn data_unread_at(&self, pos: u64) -> u64 {
        self.unit_end().saturating_sub(pos.max(self.data_pos()))
    }

    /// Read the version and flags fields that prefix the content of a "full" unit.
    ///
    /// A unit too small to hold them is an end-of-stream error, as if its content ran out.
    pub fn read_extended_header<B: ReadBytes>(&self, reader: &mut B) -> Result<(u8, u32)> {
        if self.data_len() < 4 {
            return end_of_stream_error();
        }

        let version = reader.read_u8()?;
        let mut flags = [0u8; 4];
        reader.read_buf_exact(&mut flags[1..])?;

        Ok((version, u32::from_be_bytes(flags)))
    }

    /// Returns `true` if the unit's type matches `name`, ignoring ASCII case.
    pub fn is_tag(&self, name: &str) -> bool {
        fourcc_eq_ignore_case(&self.tag, name)
    }
}

impl<T> fmt::Display for UnitHeader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' @ {} (len={}, hdr={})",
            fourcc_to_string(&self.tag),
            self.unit_pos,
            self.unit_len,
            self.header_len
        )
    }
}

/// Why a [`UnitIterator`] stopped before the end of its scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Malformation {
    /// A unit declared a size smaller than its own header.
    Undersized {
        /// The position of the offending unit.
        pos: u64,
    },
    /// A unit declared a size that extends past the end of its enclosing scope.
    Overflow {
        /// The position of the offending unit.
        pos: u64,
    },
}

/// Iterates over sibling units within a scope.
///
/// Before each header is read the underlying cursor is forced to the end of the previous unit, so
/// a handler that reads less than a unit's content never desynchronizes the walk. A handler that
/// reads beyond the end of its unit is a fatal error.
///
/// Within a parent unit, iteration continues only while more than [`MIN_HEADER_SIZE`] bytes
/// remain, so an empty unit closing its parent is skipped as trailing slack. At the top level of
/// a stream a unit needs only [`MIN_HEADER_SIZE`] bytes. Trailing bytes are skipped.
///
/// A unit whose declared size cannot be honoured ends the walk early: the cursor is moved to the
/// end of the scope and [`UnitIterator::malformation`] reports what went wrong.
pub struct UnitIterator<B: Cursor, T> {
    reader: B,
    /// Exclusive end of the scope. `None` means the end of the stream.
    end: Option<u64>,
    cur_unit: Option<UnitHeader<T>>,
    next_unit_pos: u64,
    malformation: Option<Malformation>,
}

impl<B: Cursor, T: From<[u8; 4]> + Copy> UnitIterator<B, T> {
    /// Instantiates an iterator over the top-level units of the stream, starting from the current
    /// position.
    pub fn new_root(reader: B) -> Self {
        let pos = reader.pos();
        UnitIterator {
            reader,
            end: None,
            cur_unit: None,
            next_unit_pos: pos,
            malformation: None,
        }
    }

    /// Instantiates an iterator over the children of `parent`, starting from the current position
    /// which must be within the parent's content.
    pub fn new(reader: B, parent: &UnitHeader<T>) -> Self {
        let pos = reader.pos();
        UnitIterator {
            reader,
            end: Some(parent.unit_end()),
            cur_unit: None,
            next_unit_pos: pos,
            malformation: None,
        }
    }

    /// Instantiates an iterator over the next `len` bytes.
    pub fn with_len(reader: B, len: u64) -> Self {
        let pos = reader.pos();
        UnitIterator {
            reader,
            end: Some(pos + len),
            cur_unit: None,
            next_unit_pos: pos,
            malformation: None,
        }
    }

    pub fn into_inner(self) -> B {
        self.reader
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.reader
    }

    /// If the walk ended on a unit whose size could not be honoured, returns what went wrong.
    pub fn malformation(&self) -> Option<Malformation> {
        self.malformation
    }

    fn scope_end(&self) -> u64 {
        match self.end {
            Some(end) => end.min(self.reader.byte_len()),
            None => self.reader.byte_len(),
        }
    }

    /// Moves the cursor to the end of the scope and ends the iteration.
    fn abandon(&mut self, malformation: Malformation) -> Result<Option<UnitHeader<T>>> {
        let end = self.scope_end();
        self.reader.seek(end)?;
        self.next_unit_pos = end;
        self.malformation = Some(malformation);
        Ok(None)
    }

    pub fn next(&mut self) -> Result<Option<UnitHeader<T>>> {
        self.cur_unit = None;

        if self.malformation.is_some() {
            return Ok(None);
        }

        // Ignore any remaining data in the current unit that was not read.
        let cur_pos = self.reader.pos();

        if cur_pos < self.next_unit_pos {
            self.reader.ignore_bytes(self.next_unit_pos - cur_pos)?;
        }
        else if cur_pos > self.next_unit_pos {
            // Either the unit's length was incorrect or a handler overread the unit.
            return decode_error("unit: overread unit");
        }

        let scope_end = self.scope_end();
        let scope_left = scope_end.saturating_sub(self.next_unit_pos);

        let admits_unit = match self.end {
            Some(_) => scope_left > MIN_HEADER_SIZE,
            None => scope_left >= MIN_HEADER_SIZE,
        };

        if !admits_unit {
            if scope_left > 0 {
                debug!("unit: skipping {} trailing bytes at {}", scope_left, self.next_unit_pos);
                self.reader.ignore_bytes(scope_left)?;
                self.next_unit_pos = scope_end;
            }
            return Ok(None);
        }

        let raw = RawHeader::read(&mut self.reader, scope_left)?;

        if raw.is_undersized() {
            return self.abandon(Malformation::Undersized { pos: raw.unit_pos });
        }
        if raw.unit_len > scope_left {
            return self.abandon(Malformation::Overflow { pos: raw.unit_pos });
        }

        let unit = raw.into_header::<T>();

        // The start position for the next unit is the exclusive end of the current unit.
        self.next_unit_pos = unit.unit_end();
        self.cur_unit = Some(unit);

        Ok(self.cur_unit)
    }

    /// Reads the current unit with a handler that implements [`Unit`].
    ///
    /// May only be called once after each call to [`UnitIterator::next`] that returned a unit.
    pub fn read_unit<U: Unit<T, C>, C>(&mut self, ctx: &mut C) -> Result<U> {
        match self.cur_unit.take() {
            Some(header) => U::read(&mut self.reader, header, ctx),
            None => decode_error("unit: no current unit to read"),
        }
    }
}

/// A handler for one kind of unit.
///
/// The handler is given the unit's header and a reader positioned at the start of the unit's
/// content, along with a format specific parse context. It may read less than the unit's
/// content, but never more.
pub trait Unit<T, C>: Sized {
    fn read<B: Cursor>(reader: &mut B, header: UnitHeader<T>, ctx: &mut C) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufReader;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum TestType {
        Container,
        Leaf,
        Other([u8; 4]),
    }

    impl From<[u8; 4]> for TestType {
        fn from(val: [u8; 4]) -> Self {
            match &val {
                b"cont" => TestType::Container,
                b"leaf" => TestType::Leaf,
                _ => TestType::Other(val),
            }
        }
    }

    fn unit(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(content.len() as u32 + 8).to_be_bytes());
        buf.extend_from_slice(tag);
        buf.extend_from_slice(content);
        buf
    }

    /// Reads the first byte of its content and nothing more.
    struct LazyLeaf(u8);

    impl Unit<TestType, Vec<u64>> for LazyLeaf {
        fn read<B: Cursor>(
            reader: &mut B,
            header: UnitHeader<TestType>,
            ends: &mut Vec<u64>,
        ) -> Result<Self> {
            ends.push(header.unit_end());
            Ok(LazyLeaf(reader.read_u8()?))
        }
    }

    /// Walks its children recursively, recording the cursor position after each child.
    struct Walker;

    impl Unit<TestType, Vec<u64>> for Walker {
        fn read<B: Cursor>(
            reader: &mut B,
            header: UnitHeader<TestType>,
            ends: &mut Vec<u64>,
        ) -> Result<Self> {
            // Recursing through a trait object keeps the reader type from nesting at each level.
            walk(reader, header, ends)
        }
    }

    fn walk(
        reader: &mut dyn Cursor,
        header: UnitHeader<TestType>,
        ends: &mut Vec<u64>,
    ) -> Result<Walker> {
        let mut iter = UnitIterator::new(reader, &header);

        while let Some(child) = iter.next()? {
            match child.unit_type() {
                TestType::Container => {
                    let _: Walker = iter.read_unit(ends)?;
                }
                TestType::Leaf => {
                    let _: LazyLeaf = iter.read_unit(ends)?;
                }
                _ => (),
            }
        }

        assert_eq!(iter.inner_mut().pos(), header.unit_end());
        Ok(Walker)
    }

    #[test]
    fn verify_resync_after_under_reading_handlers() {
        let inner =
            [unit(b"leaf", &[1, 2, 3, 4]), unit(b"skip", &[0; 5]), unit(b"leaf", &[9])].concat();
        let nested = [unit(b"leaf", &[7; 12]), unit(b"cont", &inner)].concat();
        let data = [unit(b"cont", &nested), unit(b"leaf", &[5, 5])].concat();

        let mut reader = BufReader::new(&data);
        let mut ends = Vec::new();
        let mut iter = UnitIterator::<_, TestType>::new_root(&mut reader);

        let mut seen = 0;
        while let Some(header) = iter.next().unwrap() {
            match header.unit_type() {
                TestType::Container => {
                    let _: Walker = iter.read_unit(&mut ends).unwrap();
                }
                TestType::Leaf => {
                    let leaf: LazyLeaf = iter.read_unit(&mut ends).unwrap();
                    assert_eq!(leaf.0, 5);
                }
                _ => unreachable!(),
            }
            seen += 1;
        }

        assert_eq!(seen, 2);
        assert_eq!(ends.len(), 4);
        assert_eq!(reader.pos(), data.len() as u64);
    }

    #[test]
    fn verify_extended_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"leaf");
        data.extend_from_slice(&24u64.to_be_bytes());
        data.extend_from_slice(&[0xaa; 8]);

        let mut reader = BufReader::new(&data);
        let header = UnitHeader::<TestType>::read(&mut reader, data.len() as u64).unwrap();

        assert_eq!(header.unit_len(), 24);
        assert_eq!(header.header_len(), 16);
        assert_eq!(header.data_len(), 8);
        assert_eq!(reader.pos(), 16);
    }

    #[test]
    fn verify_size_zero_claims_rest_of_scope() {
        let mut data = unit(b"leaf", &[1, 2]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0x55; 37]);

        let mut reader = BufReader::new(&data);
        let mut iter = UnitIterator::<_, TestType>::new_root(&mut reader);

        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.unit_len(), 10);

        let last = iter.next().unwrap().unwrap();
        assert!(last.extends_to_end());
        assert_eq!(last.unit_len(), 45);
        assert_eq!(last.unit_end(), data.len() as u64);

        assert!(iter.next().unwrap().is_none());
        assert!(iter.malformation().is_none());
        assert_eq!(reader.pos(), data.len() as u64);
    }

    #[test]
    fn verify_trailing_slack_is_skipped() {
        let content = [unit(b"leaf", &[1]), vec![0xee; 7]].concat();
        let data = unit(b"cont", &content);

        let mut reader = BufReader::new(&data);
        let parent = UnitHeader::<TestType>::read(&mut reader, data.len() as u64).unwrap();
        let mut iter = UnitIterator::new(&mut reader, &parent);

        assert_eq!(iter.next().unwrap().unwrap().unit_type(), TestType::Leaf);
        assert!(iter.next().unwrap().is_none());
        assert_eq!(reader.pos(), data.len() as u64);
    }

    #[test]
    fn verify_empty_closing_unit_is_slack() {
        let content = [unit(b"leaf", &[1]), unit(b"leaf", &[])].concat();
        let data = unit(b"cont", &content);

        let mut reader = BufReader::new(&data);
        let parent = UnitHeader::<TestType>::read(&mut reader, data.len() as u64).unwrap();
        let mut iter = UnitIterator::new(&mut reader, &parent);

        assert_eq!(iter.next().unwrap().unwrap().unit_len(), 9);
        assert!(iter.next().unwrap().is_none());
        assert!(iter.malformation().is_none());
        assert_eq!(reader.pos(), data.len() as u64);

        // At the top level, the same empty unit is read.
        let data = [unit(b"leaf", &[1]), unit(b"leaf", &[])].concat();
        let mut reader = BufReader::new(&data);
        let mut iter = UnitIterator::<_, TestType>::new_root(&mut reader);

        assert_eq!(iter.next().unwrap().unwrap().unit_len(), 9);
        assert_eq!(iter.next().unwrap().unwrap().unit_len(), 8);
        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn verify_undersized_unit_abandons_scope() {
        let mut content = unit(b"leaf", &[1]);
        content.extend_from_slice(&4u32.to_be_bytes());
        content.extend_from_slice(b"junk");
        content.extend_from_slice(&[0; 6]);
        let data = unit(b"cont", &content);

        let mut reader = BufReader::new(&data);
        let parent = UnitHeader::<TestType>::read(&mut reader, data.len() as u64).unwrap();
        let mut iter = UnitIterator::new(&mut reader, &parent);

        assert!(iter.next().unwrap().is_some());
        assert!(iter.next().unwrap().is_none());
        assert_eq!(iter.malformation(), Some(Malformation::Undersized { pos: 17 }));
        assert_eq!(reader.pos(), data.len() as u64);
    }

    #[test]
    fn verify_overflowing_unit_abandons_scope() {
        let mut data = unit(b"leaf", &[1, 2, 3]);
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0; 10]);

        let mut reader = BufReader::new(&data);
        let mut iter = UnitIterator::<_, TestType>::new_root(&mut reader);

        assert!(iter.next().unwrap().is_some());
        assert!(iter.next().unwrap().is_none());
        assert_eq!(iter.malformation(), Some(Malformation::Overflow { pos: 11 }));
    }

    #[test]
    fn verify_overread_is_fatal() {
        struct Greedy;

        impl Unit<TestType, ()> for Greedy {
            fn read<B: Cursor>(
                reader: &mut B,
                _: UnitHeader<TestType>,
                _: &mut (),
            ) -> Result<Self> {
                reader.ignore_bytes(4)?;
                Ok(Greedy)
            }
        }

        let data = [unit(b"leaf", &[1, 2]), unit(b"leaf", &[3, 4])].concat();
        let mut reader = BufReader::new(&data);
        let mut iter = UnitIterator::<_, TestType>::new_root(&mut reader);

        iter.next().unwrap().unwrap();
        let _: Greedy = iter.read_unit(&mut ()).unwrap();
        assert!(matches!(iter.next(), Err(crate::errors::Error::DecodeError(_))));
    }

    #[test]
    fn verify_extended_header_and_case_insensitive_tag() {
        let data = unit(b"MdHd", &[1, 0x00, 0x01, 0x02, 0xff]);
        let mut reader = BufReader::new(&data);
        let header = UnitHeader::<TestType>::read(&mut reader, data.len() as u64).unwrap();

        assert!(header.is_tag("mdhd"));
        assert!(!header.is_tag("mdia"));
        assert_eq!(header.read_extended_header(&mut reader).unwrap(), (1, 0x0102));
        assert_eq!(header.to_string(), "'MdHd' @ 0 (len=13, hdr=8)");

        let data = unit(b"stts", &[0, 0]);
        let mut reader = BufReader::new(&data);
        let header = UnitHeader::<TestType>::read(&mut reader, data.len() as u64).unwrap();

        assert!(header.read_extended_header(&mut reader).unwrap_err().is_end_of_stream());
    }
}
