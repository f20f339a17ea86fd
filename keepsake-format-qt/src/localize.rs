// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rewrites a movie so that its data references no longer point outside the file.
//!
//! Localization is two passes over the original file. [`plan`] walks the atom tree and decides,
//! for every atom, whether it is copied verbatim, replaced, or rebuilt from its children. The
//! sizes of rebuilt atoms are recomputed from the bottom up. [`write`] then emits the planned
//! tree, copying untouched content from the original file.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::Cursor;
use keepsake_core::unit::{fourcc_to_string, LARGE_HEADER_SIZE, MIN_HEADER_SIZE};

use log::{debug, info, warn};

use crate::atoms::{AtomHeader, AtomIterator, AtomType};

/// The version, flags, and entry count that precede the entries of a data reference atom.
const DREF_PREFIX_LEN: u64 = 8;

/// Set in the flags of a data reference entry whose media is in the same file as the movie.
pub const SELF_REFERENCE: u32 = 0x1;

/// Data reference entries larger than this are never resolved.
const MAX_REFERENCE_LEN: u64 = 1024 * 1024;

const COPY_BUF_LEN: usize = 64 * 1024;

/// An entry of a data reference atom, as found in the original file.
#[derive(Debug)]
pub struct DataReference<'a> {
    /// The entry type, one of `alis`, `rsrc`, or `url `.
    pub entry_type: [u8; 4],
    pub version: u8,
    pub flags: u32,
    /// The reference data following the version and flags.
    pub data: &'a [u8],
}

impl DataReference<'_> {
    pub fn is_self_reference(&self) -> bool {
        self.flags & SELF_REFERENCE != 0
    }

    /// The URL of a `url ` entry.
    pub fn url(&self) -> Option<&str> {
        if &self.entry_type != b"url " {
            return None;
        }

        // The URL is a null-terminated string.
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        std::str::from_utf8(&self.data[..end]).ok()
    }
}

/// Decides what an external data reference is replaced with.
pub trait ReferenceResolver {
    /// Returns the new content of a data reference entry, starting with its version and flags, or
    /// `None` to leave the entry unchanged.
    fn resolve(&self, reference: &DataReference<'_>) -> Option<Vec<u8>>;
}

/// Marks every external reference as a self-reference, dropping the reference data.
#[derive(Copy, Clone, Debug, Default)]
pub struct SelfContained;

impl ReferenceResolver for SelfContained {
    fn resolve(&self, reference: &DataReference<'_>) -> Option<Vec<u8>> {
        let flags = (reference.flags | SELF_REFERENCE).to_be_bytes();
        Some(vec![reference.version, flags[1], flags[2], flags[3]])
    }
}

/// Points `url ` references at local copies of the referenced media.
#[derive(Clone, Debug, Default)]
pub struct LocalPaths {
    paths: HashMap<String, PathBuf>,
}

impl LocalPaths {
    pub fn new() -> Self {
        Default::default()
    }

    /// Maps a URL found in the movie to a local file.
    pub fn insert<P: AsRef<Path>>(&mut self, url: &str, path: P) {
        self.paths.insert(url.to_string(), path.as_ref().to_path_buf());
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl ReferenceResolver for LocalPaths {
    fn resolve(&self, reference: &DataReference<'_>) -> Option<Vec<u8>> {
        let path = self.paths.get(reference.url()?)?;

        let url = format!("file://{}", path.display());

        let flags = (reference.flags & !SELF_REFERENCE).to_be_bytes();

        let mut content = vec![reference.version, flags[1], flags[2], flags[3]];
        content.extend_from_slice(url.as_bytes());
        content.push(0);
        Some(content)
    }
}

#[derive(Debug)]
enum Body {
    /// Copy the original content.
    Copy,
    /// Replace the content.
    Replace(Vec<u8>),
    /// Copy the first `prefix_len` bytes of the original content, write the children, then copy
    /// the trailing bytes that follow the last child.
    Children { prefix_len: u64, children: Vec<AtomPlan>, trailing: Range<u64> },
}

/// The planned output of one atom.
#[derive(Debug)]
pub struct AtomPlan {
    tag: [u8; 4],
    header_len: u64,
    unit_len: u64,
    /// The original content.
    src: Range<u64>,
    body: Body,
}

impl AtomPlan {
    fn new(header: &AtomHeader, body: Body) -> Self {
        let content_len = match &body {
            Body::Copy => header.data_len(),
            Body::Replace(content) => content.len() as u64,
            Body::Children { prefix_len, children, trailing } => {
                prefix_len
                    + children.iter().map(|child| child.unit_len).sum::<u64>()
                    + (trailing.end - trailing.start)
            }
        };

        // An extended header is kept, and added when the atom no longer fits a 32-bit size.
        let header_len = if header.header_len() == LARGE_HEADER_SIZE
            || content_len + MIN_HEADER_SIZE > u64::from(u32::MAX)
        {
            LARGE_HEADER_SIZE
        }
        else {
            MIN_HEADER_SIZE
        };

        AtomPlan {
            tag: header.tag(),
            header_len,
            unit_len: header_len + content_len,
            src: header.data_pos()..header.unit_end(),
            body,
        }
    }

    pub fn tag(&self) -> [u8; 4] {
        self.tag
    }

    /// The size of the atom as it will be written, including the header.
    pub fn unit_len(&self) -> u64 {
        self.unit_len
    }

    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    /// The planned children, if the atom is rebuilt from its children.
    pub fn children(&self) -> &[AtomPlan] {
        match &self.body {
            Body::Children { children, .. } => children,
            _ => &[],
        }
    }

    fn collect_substitutions<'a>(&'a self, out: &mut Vec<Substitution<'a>>) {
        match &self.body {
            Body::Replace(content) => {
                out.push(Substitution { original: self.src.clone(), replacement: content })
            }
            Body::Children { children, .. } => {
                children.iter().for_each(|child| child.collect_substitutions(out))
            }
            Body::Copy => (),
        }
    }
}

/// Replaces a byte range of the original file.
#[derive(Debug, PartialEq, Eq)]
pub struct Substitution<'a> {
    /// The original content of the atom.
    pub original: Range<u64>,
    /// The new content of the atom.
    pub replacement: &'a [u8],
}

/// The planned output of a whole movie file.
#[derive(Debug)]
pub struct LocalizationPlan {
    atoms: Vec<AtomPlan>,
    /// Bytes after the last top-level atom, too few to hold another.
    trailing: Range<u64>,
}

impl LocalizationPlan {
    /// The planned top-level atoms.
    pub fn atoms(&self) -> &[AtomPlan] {
        &self.atoms
    }

    /// The size of the output file.
    pub fn output_len(&self) -> u64 {
        let atoms_len = self.atoms.iter().map(AtomPlan::unit_len).sum::<u64>();
        atoms_len + (self.trailing.end - self.trailing.start)
    }

    /// Lists every atom whose content will be replaced, in file order.
    pub fn substitutions(&self) -> Vec<Substitution<'_>> {
        let mut out = Vec::new();
        self.atoms.iter().for_each(|atom| atom.collect_substitutions(&mut out));
        out
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Scope {
    Atoms,
    DataReferences,
}

fn plan_reference<B: Cursor + ?Sized>(
    reader: &mut B,
    header: &AtomHeader,
    resolver: &dyn ReferenceResolver,
) -> Result<Body> {
    let data_len = header.data_len();

    if data_len < 4 || data_len > MAX_REFERENCE_LEN {
        warn!("qt (localize): ignoring data reference {}", header);
        return Ok(Body::Copy);
    }

    let content = reader.read_boxed_slice_exact(data_len as usize)?;

    let reference = DataReference {
        entry_type: header.tag(),
        version: content[0],
        flags: u32::from_be_bytes([0, content[1], content[2], content[3]]),
        data: &content[4..],
    };

    if reference.is_self_reference() {
        return Ok(Body::Copy);
    }

    match resolver.resolve(&reference) {
        Some(replacement) => {
            info!(
                "qt (localize): replacing '{}' reference at {}",
                fourcc_to_string(&reference.entry_type),
                header.unit_pos()
            );
            Ok(Body::Replace(replacement))
        }
        None => {
            warn!(
                "qt (localize): unresolved '{}' reference at {}",
                fourcc_to_string(&reference.entry_type),
                header.unit_pos()
            );
            Ok(Body::Copy)
        }
    }
}

fn plan_scope<B: Cursor + ?Sized>(
    reader: &mut B,
    parent: Option<&AtomHeader>,
    scope: Scope,
    resolver: &dyn ReferenceResolver,
) -> Result<(Vec<AtomPlan>, Range<u64>)> {
    let mut iter = match parent {
        Some(parent) => AtomIterator::new(&mut *reader, parent),
        None => AtomIterator::new_root(&mut *reader),
    };

    let mut atoms = Vec::new();
    let mut last_end = iter.inner_mut().pos();

    while let Some(header) = iter.next()? {
        last_end = header.unit_end();

        let body = match header.unit_type() {
            AtomType::Movie
            | AtomType::Track
            | AtomType::Media
            | AtomType::MediaInfo
            | AtomType::DataInfo => {
                let (children, trailing) =
                    plan_scope(&mut **iter.inner_mut(), Some(&header), Scope::Atoms, resolver)?;

                let is_compressed = children
                    .first()
                    .is_some_and(|child| AtomType::from(child.tag) == AtomType::CompressedMovie);

                if is_compressed {
                    warn!("qt (localize): copying compressed movie atom verbatim");
                    Body::Copy
                }
                else {
                    Body::Children { prefix_len: 0, children, trailing }
                }
            }
            AtomType::DataReference if header.data_len() >= DREF_PREFIX_LEN => {
                iter.inner_mut().ignore_bytes(DREF_PREFIX_LEN)?;

                let (children, trailing) = plan_scope(
                    &mut **iter.inner_mut(),
                    Some(&header),
                    Scope::DataReferences,
                    resolver,
                )?;

                Body::Children { prefix_len: DREF_PREFIX_LEN, children, trailing }
            }
            AtomType::Alias | AtomType::Resource | AtomType::Url
                if scope == Scope::DataReferences =>
            {
                plan_reference(&mut **iter.inner_mut(), &header, resolver)?
            }
            _ => Body::Copy,
        };

        atoms.push(AtomPlan::new(&header, body));
    }

    if iter.malformation().is_some() {
        return decode_error("qt (localize): cannot rewrite a malformed atom tree");
    }

    // The iterator skipped any bytes after the last child, which are kept as they are.
    let end = iter.inner_mut().pos();

    Ok((atoms, last_end..end))
}

/// Walks the movie from the start of the stream and plans its localized form.
pub fn plan<B: Cursor + ?Sized>(
    reader: &mut B,
    resolver: &dyn ReferenceResolver,
) -> Result<LocalizationPlan> {
    reader.seek(0)?;

    let (atoms, trailing) = plan_scope(reader, None, Scope::Atoms, resolver)?;

    let plan = LocalizationPlan { atoms, trailing };

    debug!(
        "qt (localize): planned {} bytes with {} substitution(s)",
        plan.output_len(),
        plan.substitutions().len()
    );

    Ok(plan)
}

fn write_header<W: Write>(writer: &mut W, atom: &AtomPlan) -> Result<()> {
    if atom.header_len == LARGE_HEADER_SIZE {
        writer.write_all(&1u32.to_be_bytes())?;
        writer.write_all(&atom.tag)?;
        writer.write_all(&atom.unit_len.to_be_bytes())?;
    }
    else {
        // The header length is only 8 bytes when the size fits.
        writer.write_all(&(atom.unit_len as u32).to_be_bytes())?;
        writer.write_all(&atom.tag)?;
    }
    Ok(())
}

fn copy_range<B: Cursor + ?Sized, W: Write>(
    reader: &mut B,
    writer: &mut W,
    pos: u64,
    len: u64,
    buf: &mut [u8],
) -> Result<()> {
    reader.seek(pos)?;

    let mut left = len;

    while left > 0 {
        let n = left.min(buf.len() as u64) as usize;
        reader.read_buf_exact(&mut buf[..n])?;
        writer.write_all(&buf[..n])?;
        left -= n as u64;
    }

    Ok(())
}

fn write_atom<B: Cursor + ?Sized, W: Write>(
    atom: &AtomPlan,
    reader: &mut B,
    writer: &mut W,
    buf: &mut [u8],
) -> Result<()> {
    write_header(writer, atom)?;

    match &atom.body {
        Body::Copy => {
            copy_range(reader, writer, atom.src.start, atom.src.end - atom.src.start, buf)?
        }
        Body::Replace(content) => writer.write_all(content)?,
        Body::Children { prefix_len, children, trailing } => {
            copy_range(reader, writer, atom.src.start, *prefix_len, buf)?;

            for child in children {
                write_atom(child, reader, writer, buf)?;
            }

            copy_range(reader, writer, trailing.start, trailing.end - trailing.start, buf)?;
        }
    }

    Ok(())
}

/// Writes the planned movie. Untouched content is copied from `reader`, which must be the stream
/// the plan was made from. Returns the number of bytes written.
pub fn write<B: Cursor + ?Sized, W: Write>(
    plan: &LocalizationPlan,
    reader: &mut B,
    writer: &mut W,
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUF_LEN];

    for atom in &plan.atoms {
        write_atom(atom, reader, writer, &mut buf)?;
    }

    let trailing = &plan.trailing;
    copy_range(reader, writer, trailing.start, trailing.end - trailing.start, &mut buf)?;

    writer.flush()?;

    Ok(plan.output_len())
}

/// Plans and writes the localized movie in one step.
pub fn localize<B: Cursor + ?Sized, W: Write>(
    reader: &mut B,
    writer: &mut W,
    resolver: &dyn ReferenceResolver,
) -> Result<u64> {
    let plan = plan(reader, resolver)?;
    write(&plan, reader, writer)
}
