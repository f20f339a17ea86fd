// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders for synthetic movies.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub fn atom(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(content.len() + 8);
    buf.extend_from_slice(&(content.len() as u32 + 8).to_be_bytes());
    buf.extend_from_slice(tag);
    buf.extend_from_slice(content);
    buf
}

pub fn container(tag: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    atom(tag, &children.concat())
}

fn full(tag: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut content = flags.to_be_bytes().to_vec();
    content[0] = version;
    content.extend_from_slice(body);
    atom(tag, &content)
}

pub fn ftyp() -> Vec<u8> {
    atom(b"ftyp", b"qt  \x20\x05\x03\x00qt  ")
}

pub fn mdat(len: usize) -> Vec<u8> {
    atom(b"mdat", &vec![0xaa; len])
}

pub fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0; 8]);
    body.extend_from_slice(&timescale.to_be_bytes());
    body.extend_from_slice(&duration.to_be_bytes());
    body.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    body.extend_from_slice(&0x0100u16.to_be_bytes());
    body.extend_from_slice(&[0; 10 + 36 + 7 * 4]);
    full(b"mvhd", 0, 0, &body)
}

pub fn tkhd(flags: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0; 8]);
    body.extend_from_slice(&1u32.to_be_bytes());
    body.extend_from_slice(&[0; 4]);
    body.extend_from_slice(&600u32.to_be_bytes());
    body.extend_from_slice(&[0; 52]);
    body.extend_from_slice(&(640u32 << 16).to_be_bytes());
    body.extend_from_slice(&(480u32 << 16).to_be_bytes());
    full(b"tkhd", 0, flags, &body)
}

pub fn mdhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0; 8]);
    body.extend_from_slice(&timescale.to_be_bytes());
    body.extend_from_slice(&duration.to_be_bytes());
    body.extend_from_slice(&0x15c7u16.to_be_bytes());
    body.extend_from_slice(&[0; 2]);
    full(b"mdhd", 0, 0, &body)
}

pub fn hdlr(component_type: &[u8; 4], subtype: &[u8; 4]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(component_type);
    body.extend_from_slice(subtype);
    body.extend_from_slice(b"appl");
    body.extend_from_slice(&[0; 8]);
    body.push(0);
    full(b"hdlr", 0, 0, &body)
}

fn stsd(format: &[u8; 4], description: &[u8]) -> Vec<u8> {
    let mut body = 1u32.to_be_bytes().to_vec();
    body.extend_from_slice(&(16 + description.len() as u32).to_be_bytes());
    body.extend_from_slice(format);
    body.extend_from_slice(&[0; 6]);
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(description);
    full(b"stsd", 0, 0, &body)
}

pub fn stsd_video(format: &[u8; 4], width: u16, height: u16, depth: u16) -> Vec<u8> {
    let mut desc = vec![0; 16];
    desc.extend_from_slice(&width.to_be_bytes());
    desc.extend_from_slice(&height.to_be_bytes());
    desc.extend_from_slice(&[0; 4 + 4 + 4 + 2 + 32]);
    desc.extend_from_slice(&depth.to_be_bytes());
    desc.extend_from_slice(&0xffffu16.to_be_bytes());
    stsd(format, &desc)
}

pub fn stsd_audio(format: &[u8; 4], channels: u16, sample_size: u16, rate: u16) -> Vec<u8> {
    let mut desc = vec![0; 8];
    desc.extend_from_slice(&channels.to_be_bytes());
    desc.extend_from_slice(&sample_size.to_be_bytes());
    desc.extend_from_slice(&[0; 4]);
    desc.extend_from_slice(&(u32::from(rate) << 16).to_be_bytes());
    stsd(format, &desc)
}

pub fn stts(entries: &[(u32, u32)]) -> Vec<u8> {
    let mut body = (entries.len() as u32).to_be_bytes().to_vec();
    for (count, delta) in entries {
        body.extend_from_slice(&count.to_be_bytes());
        body.extend_from_slice(&delta.to_be_bytes());
    }
    full(b"stts", 0, 0, &body)
}

/// A data reference entry.
pub fn dref_entry(tag: &[u8; 4], flags: u32, data: &[u8]) -> Vec<u8> {
    full(tag, 0, flags, data)
}

pub fn dref(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut body = (entries.len() as u32).to_be_bytes().to_vec();
    body.extend_from_slice(&entries.concat());
    full(b"dref", 0, 0, &body)
}

/// A media atom for a track with the given handler subtype and sample table children.
pub fn mdia(subtype: &[u8; 4], stbl_children: &[Vec<u8>], dinf: Vec<u8>) -> Vec<u8> {
    container(
        b"mdia",
        &[
            mdhd(600, 6000),
            hdlr(b"mhlr", subtype),
            container(
                b"minf",
                &[
                    hdlr(b"dhlr", b"alis"),
                    dinf,
                    container(b"stbl", stbl_children),
                ],
            ),
        ],
    )
}

pub fn self_dinf() -> Vec<u8> {
    container(b"dinf", &[dref(&[dref_entry(b"alis", 1, &[])])])
}

/// A 10 second, 300 frame, 640x480 24-bit Cinepak track.
pub fn video_trak() -> Vec<u8> {
    container(
        b"trak",
        &[
            tkhd(0x3),
            mdia(
                b"vide",
                &[stsd_video(b"cvid", 640, 480, 24), stts(&[(300, 20)])],
                self_dinf(),
            ),
        ],
    )
}

/// A 44.1 kHz stereo 16-bit little-endian PCM track.
pub fn audio_trak() -> Vec<u8> {
    container(
        b"trak",
        &[
            tkhd(0x1),
            mdia(
                b"soun",
                &[stsd_audio(b"sowt", 2, 16, 44100), stts(&[(441000, 1)])],
                self_dinf(),
            ),
        ],
    )
}

pub fn movie(children: &[Vec<u8>]) -> Vec<u8> {
    [ftyp(), container(b"moov", children), mdat(64)].concat()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A compressed movie atom holding `moov`.
pub fn cmov(algorithm: &[u8; 4], moov: &[u8]) -> Vec<u8> {
    let mut cmvd = (moov.len() as u32).to_be_bytes().to_vec();
    cmvd.extend_from_slice(&zlib(moov));
    container(b"cmov", &[atom(b"dcom", algorithm), atom(b"cmvd", &cmvd)])
}
