// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sample description data formats and the encodings they name.

const VIDEO_ENCODINGS: &[(&[u8; 4], &str)] = &[
    (b"cvid", "CINEPAK VIDEO"),
    (b"iv32", "INDEO VIDEO 32"),
    (b"iv50", "INDEO VIDEO 50"),
    (b"jpeg", "MOTION JPEG"),
    (b"mjpa", "MOTION JPEG A"),
    (b"mjpb", "MOTION JPEG B"),
    (b"avc1", "Advance Video Coding"),
    (b"smc ", "GRAPHICS"),
    (b"raw ", "RAW RGB"),
    (b"2vuy", "YUV422"),
    (b"yuv2", "YUV422"),
];

const AUDIO_ENCODINGS: &[(&[u8; 4], &str)] = &[
    (b".mp3", "MPEG Layer 3"),
    (b"ms\x00U", "MPEG Layer 3"),
    (b"lpcm", "Linear"),
    (b"NONE", "Linear"),
    (b"raw ", "8-bit Offset"),
    (b"twos", "16-bit Big Endian"),
    (b"sowt", "16-bit Little Endian"),
    (b"QDMC", "QDesign music"),
    (b"QDM2", "QDesign music version 2"),
    (b"ms\x00\x02", "Microsoft ADPCM"),
];

fn lookup(table: &[(&[u8; 4], &'static str)], format: &[u8; 4]) -> Option<&'static str> {
    table.iter().find(|(tag, _)| *tag == format).map(|&(_, name)| name)
}

/// Resolves the data format of a video sample description.
pub fn video_encoding(format: &[u8; 4]) -> Option<&'static str> {
    lookup(VIDEO_ENCODINGS, format)
}

/// Resolves the data format of a sound sample description.
pub fn audio_encoding(format: &[u8; 4]) -> Option<&'static str> {
    lookup(AUDIO_ENCODINGS, format)
}
