// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::anomaly::SevereElement;
use keepsake_core::bitstream::{Bitstream, BitstreamKind};
use keepsake_core::errors::Result;
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::{fourcc_to_string, Unit};

use log::{debug, warn};

use crate::atoms::{AtomHeader, AtomType};
use crate::catalog;
use crate::context::ParseContext;
use crate::encodings::{audio_encoding, video_encoding};

/// The first sample description of a track.
#[derive(Debug, PartialEq)]
pub enum SampleDescription {
    Video {
        format: [u8; 4],
        width: u16,
        height: u16,
        /// Pixel depth. Depths 33 to 40 are grayscale with `depth - 32` bits per pixel.
        depth: u16,
    },
    Audio {
        format: [u8; 4],
        channels: u16,
        sample_size: u16,
        /// Samples per second.
        sample_rate: f64,
    },
}

fn read_video_entry<B: ReadBytes>(reader: &mut B, format: [u8; 4]) -> Result<SampleDescription> {
    // Version, revision level, vendor, temporal quality, and spatial quality.
    reader.ignore_bytes(2 + 2 + 4 + 4 + 4)?;

    let width = reader.read_be_u16()?;
    let height = reader.read_be_u16()?;

    // Horizontal and vertical resolution, data size, frame count, and the compressor name.
    reader.ignore_bytes(4 + 4 + 4 + 2 + 32)?;

    let depth = reader.read_be_u16()?;

    Ok(SampleDescription::Video { format, width, height, depth })
}

fn read_audio_entry<B: ReadBytes>(reader: &mut B, format: [u8; 4]) -> Result<SampleDescription> {
    // Version, revision level, and vendor.
    reader.ignore_bytes(2 + 2 + 4)?;

    let channels = reader.read_be_u16()?;
    let sample_size = reader.read_be_u16()?;

    // Compression ID and packet size.
    reader.ignore_bytes(2 + 2)?;

    // Unsigned 16.16 fixed point.
    let sample_rate = f64::from(reader.read_be_u32()?) / 65536.0;

    Ok(SampleDescription::Audio { format, channels, sample_size, sample_rate })
}

/// Sample description atom.
#[derive(Debug)]
pub struct StsdAtom {
    pub description: Option<SampleDescription>,
}

impl StsdAtom {
    /// Copies the description to the track's bitstream and resolves its encoding. Returns the
    /// limitation to record if the encoding is not supported.
    pub fn apply(&self, bitstream: &mut Bitstream) -> Option<SevereElement> {
        match self.description {
            Some(SampleDescription::Video { format, width, height, depth }) => {
                bitstream.width = Some(u32::from(width));
                bitstream.height = Some(u32::from(height));
                bitstream.bits_per_sample =
                    Some(u32::from(if depth > 32 && depth <= 40 { depth - 32 } else { depth }));

                resolve(bitstream, format, video_encoding(&format), catalog::UNSUPPORTED_VIDEO_ENCODING)
            }
            Some(SampleDescription::Audio { format, channels, sample_size, sample_rate }) => {
                bitstream.channels = Some(u32::from(channels));
                bitstream.bits_per_sample = Some(u32::from(sample_size));
                bitstream.sample_rate = Some(sample_rate);

                resolve(bitstream, format, audio_encoding(&format), catalog::UNSUPPORTED_AUDIO_ENCODING)
            }
            None => None,
        }
    }
}

fn resolve(
    bitstream: &mut Bitstream,
    format: [u8; 4],
    encoding: Option<&'static str>,
    limitation: SevereElement,
) -> Option<SevereElement> {
    let tag = fourcc_to_string(&format);

    bitstream.encoding = encoding.map(String::from);

    let unsupported = match encoding {
        Some(_) => None,
        None => {
            warn!("qt (stsd): unsupported data format '{}'", tag);
            Some(limitation)
        }
    };

    bitstream.encoding_tag = Some(tag);
    unsupported
}

impl Unit<AtomType, ParseContext> for StsdAtom {
    fn read<B: Cursor>(reader: &mut B, header: AtomHeader, ctx: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let (_, _) = header.read_extended_header(&mut reader)?;

        let n_entries = reader.read_be_u32()?;

        if n_entries == 0 {
            debug!("qt (stsd): no sample descriptions");
            return Ok(StsdAtom { description: None });
        }

        // Only the first entry describes the bitstream.
        let _ = reader.read_be_u32()?; // Entry size
        let format = reader.read_quad_bytes()?;

        // Reserved and data reference index.
        reader.ignore_bytes(6 + 2)?;

        let description = match ctx.current.as_ref().map(|bs| bs.kind) {
            Some(BitstreamKind::Video) => Some(read_video_entry(&mut reader, format)?),
            Some(BitstreamKind::Audio) => Some(read_audio_entry(&mut reader, format)?),
            _ => None,
        };

        Ok(StsdAtom { description })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_apply_video() {
        let stsd = StsdAtom {
            description: Some(SampleDescription::Video {
                format: *b"cvid",
                width: 320,
                height: 240,
                depth: 24,
            }),
        };

        let mut video = Bitstream::new(BitstreamKind::Video);
        assert_eq!(stsd.apply(&mut video), None);
        assert_eq!(video.encoding.as_deref(), Some("CINEPAK VIDEO"));
        assert_eq!(video.encoding_tag.as_deref(), Some("cvid"));
        assert_eq!(video.bits_per_sample, Some(24));
    }

    #[test]
    fn verify_apply_grayscale_depth() {
        let stsd = StsdAtom {
            description: Some(SampleDescription::Video {
                format: *b"raw ",
                width: 16,
                height: 16,
                depth: 40,
            }),
        };

        let mut video = Bitstream::new(BitstreamKind::Video);
        stsd.apply(&mut video);
        assert_eq!(video.bits_per_sample, Some(8));
    }

    #[test]
    fn verify_apply_unsupported_audio() {
        let stsd = StsdAtom {
            description: Some(SampleDescription::Audio {
                format: *b"alac",
                channels: 2,
                sample_size: 16,
                sample_rate: 44100.0,
            }),
        };

        let mut audio = Bitstream::new(BitstreamKind::Audio);
        assert_eq!(stsd.apply(&mut audio), Some(catalog::UNSUPPORTED_AUDIO_ENCODING));
        assert_eq!(audio.encoding, None);
        assert_eq!(audio.encoding_tag.as_deref(), Some("alac"));
        assert_eq!(audio.channels, Some(2));
    }
}
