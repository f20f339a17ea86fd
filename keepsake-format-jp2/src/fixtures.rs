// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders for synthetic JP2 files.

pub fn jp2_box(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(content.len() + 8);
    buf.extend_from_slice(&(content.len() as u32 + 8).to_be_bytes());
    buf.extend_from_slice(tag);
    buf.extend_from_slice(content);
    buf
}

pub fn superbox(tag: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    jp2_box(tag, &children.concat())
}

pub fn signature() -> Vec<u8> {
    jp2_box(b"jP  ", &[0x0d, 0x0a, 0x87, 0x0a])
}

pub fn ftyp(minor: u32, compatibility: &[&[u8; 4]]) -> Vec<u8> {
    let mut content = b"jp2 ".to_vec();
    content.extend_from_slice(&minor.to_be_bytes());
    for entry in compatibility {
        content.extend_from_slice(*entry);
    }
    jp2_box(b"ftyp", &content)
}

pub fn ihdr(width: u32, height: u32, nc: u16, bpc: u8) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&height.to_be_bytes());
    content.extend_from_slice(&width.to_be_bytes());
    content.extend_from_slice(&nc.to_be_bytes());
    content.extend_from_slice(&[bpc, 7, 0, 0]);
    jp2_box(b"ihdr", &content)
}

pub fn colr_enumerated(colorspace: u32) -> Vec<u8> {
    let mut content = vec![1, 0, 0];
    content.extend_from_slice(&colorspace.to_be_bytes());
    jp2_box(b"colr", &content)
}

pub fn colr_icc() -> Vec<u8> {
    let mut content = vec![2, 0, 0];
    content.extend_from_slice(&[0; 32]);
    jp2_box(b"colr", &content)
}

pub fn bpcc(depths: &[u8]) -> Vec<u8> {
    jp2_box(b"bpcc", depths)
}

/// A palette with `n_entries` entries of 8-bit columns.
pub fn pclr(n_entries: u16, n_columns: u8) -> Vec<u8> {
    let mut content = n_entries.to_be_bytes().to_vec();
    content.push(n_columns);
    content.extend(std::iter::repeat(7).take(usize::from(n_columns)));
    content.extend(std::iter::repeat(0x80).take(usize::from(n_entries) * usize::from(n_columns)));
    jp2_box(b"pclr", &content)
}

pub fn cmap(n_columns: u8) -> Vec<u8> {
    let mut content = Vec::new();
    for column in 0..n_columns {
        content.extend_from_slice(&[0, 0, 1, column]);
    }
    jp2_box(b"cmap", &content)
}

/// A capture resolution of 72 samples per inch, expressed per metre as 2835/1.
pub fn res() -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(&2835u16.to_be_bytes());
    content.extend_from_slice(&1u16.to_be_bytes());
    content.extend_from_slice(&2835u16.to_be_bytes());
    content.extend_from_slice(&1u16.to_be_bytes());
    content.extend_from_slice(&[0, 0]);
    superbox(b"res ", &[jp2_box(b"resc", &content)])
}

pub fn jp2h(children: &[Vec<u8>]) -> Vec<u8> {
    superbox(b"jp2h", children)
}

/// The standard header of a greyscale or RGB image.
pub fn simple_jp2h(width: u32, height: u32, nc: u16) -> Vec<u8> {
    let colorspace = if nc == 1 { 17 } else { 16 };
    jp2h(&[ihdr(width, height, nc, 7), colr_enumerated(colorspace)])
}

/// A codestream beginning with a main header of a single tile image.
pub fn jp2c(width: u32, height: u32, nc: u16) -> Vec<u8> {
    let mut content = vec![0xff, 0x4f, 0xff, 0x51];
    content.extend_from_slice(&(38 + 3 * nc).to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&width.to_be_bytes());
    content.extend_from_slice(&height.to_be_bytes());
    content.extend_from_slice(&[0; 8]);
    content.extend_from_slice(&width.to_be_bytes());
    content.extend_from_slice(&height.to_be_bytes());
    content.extend_from_slice(&[0; 8]);
    content.extend_from_slice(&nc.to_be_bytes());
    for _ in 0..nc {
        content.extend_from_slice(&[7, 1, 1]);
    }
    // End of codestream.
    content.extend_from_slice(&[0xff, 0xd9]);
    jp2_box(b"jp2c", &content)
}

pub fn file(boxes: &[Vec<u8>]) -> Vec<u8> {
    boxes.concat()
}

/// A well formed RGB image.
pub fn rgb_image() -> Vec<u8> {
    file(&[signature(), ftyp(0, &[b"jp2 "]), simple_jp2h(64, 48, 3), jp2c(64, 48, 3)])
}
