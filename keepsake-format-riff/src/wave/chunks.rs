// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::ReadBytes;

use log::warn;

use crate::common::{read_list, ChunkParser, ParseChunk, ParseChunkTag};

/// The size of the WAVEFORMAT structure, the smallest valid format chunk.
pub const WAVEFORMAT_SIZE: u32 = 14;
/// The size of the PCMWAVEFORMAT structure, which adds the bits per sample.
const PCMWAVEFORMAT_SIZE: u32 = 16;
/// The size of the WAVEFORMATEX structure, which adds the extension size.
const WAVEFORMATEX_SIZE: u32 = 18;
/// The size of the WAVEFORMATEXTENSIBLE structure.
const WAVEFORMATEXTENSIBLE_SIZE: u32 = 40;

// The definition of these format identifiers can be found in mmreg.h of the Microsoft Windows
// Platform SDK.
const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_ADPCM: u16 = 0x0002;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_ALAW: u16 = 0x0006;
const WAVE_FORMAT_MULAW: u16 = 0x0007;
const WAVE_FORMAT_MPEGLAYER3: u16 = 0x0055;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// Upper bound on the bytes kept from a single INFO value.
const MAX_INFO_VALUE_LEN: u32 = 64 * 1024;

/// The audio encodings the archive supports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaveEncoding {
    Pcm,
    Adpcm,
    IeeeFloat,
    ALaw,
    MuLaw,
    Mp3,
}

impl WaveEncoding {
    fn from_format_tag(format: u16) -> Option<Self> {
        let encoding = match format {
            WAVE_FORMAT_PCM => WaveEncoding::Pcm,
            WAVE_FORMAT_ADPCM => WaveEncoding::Adpcm,
            WAVE_FORMAT_IEEE_FLOAT => WaveEncoding::IeeeFloat,
            WAVE_FORMAT_ALAW => WaveEncoding::ALaw,
            WAVE_FORMAT_MULAW => WaveEncoding::MuLaw,
            WAVE_FORMAT_MPEGLAYER3 => WaveEncoding::Mp3,
            _ => return None,
        };
        Some(encoding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WaveEncoding::Pcm => "PCM",
            WaveEncoding::Adpcm => "MS ADPCM",
            WaveEncoding::IeeeFloat => "IEEE FLOAT",
            WaveEncoding::ALaw => "A-LAW",
            WaveEncoding::MuLaw => "MU-LAW",
            WaveEncoding::Mp3 => "MPEG LAYER 3",
        }
    }

    /// Linear integer and floating point samples are stored as-is. Everything else requires a
    /// fact chunk to know the number of samples.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, WaveEncoding::Pcm | WaveEncoding::IeeeFloat)
    }
}

/// The extension of a WAVEFORMATEXTENSIBLE format chunk.
pub struct FormatExtension {
    /// The number of bits of precision in each sample.
    pub valid_bits_per_sample: u16,
    /// Speaker positions of the channels.
    pub channel_mask: u32,
    pub sub_format_guid: [u8; 16],
}

impl FormatExtension {
    /// The format tag carried by the sub-format GUID, if the GUID is one of the KSDATAFORMAT
    /// sub-types.
    pub fn sub_format_tag(&self) -> Option<u16> {
        // KSDATAFORMAT_SUBTYPE_* GUIDs differ only in their first two bytes. These definitions can
        // be found in ksmedia.h of the Microsoft Windows Platform SDK.
        #[rustfmt::skip]
        const KSDATAFORMAT_SUBTYPE_BASE: [u8; 14] = [
                        0x00, 0x00, 0x00, 0x00, 0x10, 0x00,
            0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
        ];

        if self.sub_format_guid[2..] == KSDATAFORMAT_SUBTYPE_BASE {
            Some(u16::from_le_bytes([self.sub_format_guid[0], self.sub_format_guid[1]]))
        }
        else {
            None
        }
    }
}

pub struct WaveFormatChunk {
    pub format_tag: u16,
    /// The number of channels.
    pub n_channels: u16,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The average data rate in bytes/second.
    pub avg_bytes_per_sec: u32,
    /// The byte alignment of one audio frame.
    pub block_align: u16,
    /// Present in PCMWAVEFORMAT and larger format chunks.
    pub bits_per_sample: Option<u16>,
    /// Present in WAVEFORMATEX and larger format chunks.
    pub extra_len: Option<u16>,
    pub extension: Option<FormatExtension>,
}

impl WaveFormatChunk {
    /// Resolves the encoding, looking through the sub-format of an extensible format.
    pub fn encoding(&self) -> Option<WaveEncoding> {
        match self.format_tag {
            WAVE_FORMAT_EXTENSIBLE => self
                .extension
                .as_ref()
                .and_then(FormatExtension::sub_format_tag)
                .and_then(WaveEncoding::from_format_tag),
            format => WaveEncoding::from_format_tag(format),
        }
    }

    fn read_ext_fmt<B: ReadBytes>(reader: &mut B) -> Result<FormatExtension> {
        let valid_bits_per_sample = reader.read_u16()?;
        let channel_mask = reader.read_u32()?;

        let mut sub_format_guid = [0u8; 16];
        reader.read_buf_exact(&mut sub_format_guid)?;

        Ok(FormatExtension { valid_bits_per_sample, channel_mask, sub_format_guid })
    }
}

impl ParseChunk for WaveFormatChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<WaveFormatChunk> {
        if len < WAVEFORMAT_SIZE {
            return decode_error("wav: malformed fmt chunk");
        }

        let format_tag = reader.read_u16()?;
        let n_channels = reader.read_u16()?;
        let sample_rate = reader.read_u32()?;
        let avg_bytes_per_sec = reader.read_u32()?;
        let block_align = reader.read_u16()?;

        let bits_per_sample =
            if len >= PCMWAVEFORMAT_SIZE { Some(reader.read_u16()?) } else { None };

        let extra_len = if len >= WAVEFORMATEX_SIZE { Some(reader.read_u16()?) } else { None };

        let extension = if format_tag == WAVE_FORMAT_EXTENSIBLE {
            if len >= WAVEFORMATEXTENSIBLE_SIZE {
                Some(Self::read_ext_fmt(reader)?)
            }
            else {
                warn!("wav: extensible fmt chunk is missing its extension");
                None
            }
        }
        else {
            None
        };

        Ok(WaveFormatChunk {
            format_tag,
            n_channels,
            sample_rate,
            avg_bytes_per_sec,
            block_align,
            bits_per_sample,
            extra_len,
            extension,
        })
    }
}

impl fmt::Display for WaveFormatChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "WaveFormatChunk {{")?;
        writeln!(f, "\tformat_tag: {:#06x},", self.format_tag)?;
        writeln!(f, "\tn_channels: {},", self.n_channels)?;
        writeln!(f, "\tsample_rate: {} Hz,", self.sample_rate)?;
        writeln!(f, "\tavg_bytes_per_sec: {},", self.avg_bytes_per_sec)?;
        writeln!(f, "\tblock_align: {},", self.block_align)?;
        writeln!(f, "\tbits_per_sample: {:?},", self.bits_per_sample)?;
        writeln!(f, "\textra_len: {:?},", self.extra_len)?;

        if let Some(ext) = &self.extension {
            writeln!(f, "\tvalid_bits_per_sample: {},", ext.valid_bits_per_sample)?;
            writeln!(f, "\tchannel_mask: {:#010x},", ext.channel_mask)?;
            writeln!(f, "\tsub_format_guid: {:?},", &ext.sub_format_guid)?;
        }

        writeln!(f, "}}")
    }
}

pub struct FactChunk {
    pub n_frames: u32,
}

impl ParseChunk for FactChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        // The fact chunk is at least 4 bytes long. Later revisions of the format may append
        // fields.
        if len < 4 {
            return decode_error("wav: malformed fact chunk");
        }

        Ok(FactChunk { n_frames: reader.read_u32()? })
    }
}

pub struct DataChunk {
    pub len: u32,
}

impl ParseChunk for DataChunk {
    fn parse<B: ReadBytes>(_: &mut B, _: [u8; 4], len: u32) -> Result<DataChunk> {
        Ok(DataChunk { len })
    }
}

/// The cue point chunk. Only the identifier of each cue point is kept.
pub struct CueChunk {
    pub cue_ids: Vec<u32>,
}

impl ParseChunk for CueChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _: [u8; 4], len: u32) -> Result<CueChunk> {
        // dwName, dwPosition, fccChunk, dwChunkStart, dwBlockStart, dwSampleOffset.
        const CUE_POINT_SIZE: u32 = 24;

        let cue_ids = read_counted(reader, len, CUE_POINT_SIZE, "cue")?;
        Ok(CueChunk { cue_ids })
    }
}

/// The playlist chunk. Only the cue point identifier of each segment is kept.
pub struct PlaylistChunk {
    pub cue_ids: Vec<u32>,
}

impl ParseChunk for PlaylistChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _: [u8; 4], len: u32) -> Result<PlaylistChunk> {
        // dwName, dwLength, dwLoops.
        const SEGMENT_SIZE: u32 = 12;

        let cue_ids = read_counted(reader, len, SEGMENT_SIZE, "plst")?;
        Ok(PlaylistChunk { cue_ids })
    }
}

/// Reads a 32-bit count followed by that many records of `record_len` bytes, each beginning
/// with a cue point identifier. The count is clamped to the records that fit in the chunk.
fn read_counted<B: ReadBytes>(
    reader: &mut B,
    len: u32,
    record_len: u32,
    name: &str,
) -> Result<Vec<u32>> {
    if len < 4 {
        return decode_error("wav: missing record count");
    }

    let declared = reader.read_u32()?;
    let fits = (len - 4) / record_len;

    if declared > fits {
        warn!("wav: {} chunk declares {} records but only {} fit", name, declared, fits);
    }

    let count = declared.min(fits);
    let mut ids = Vec::with_capacity(count as usize);

    for _ in 0..count {
        ids.push(reader.read_u32()?);
        reader.ignore_bytes(u64::from(record_len - 4))?;
    }

    Ok(ids)
}

/// The kind of a member of an associated data list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssociatedDataKind {
    Label,
    Note,
    LabeledText,
    File,
}

/// A member of an associated data (`adtl`) list.
pub struct AssociatedDataChunk {
    pub tag: [u8; 4],
    /// `None` for an unrecognized member.
    pub kind: Option<AssociatedDataKind>,
    /// The cue point this member annotates, if the member is long enough to name one.
    pub cue_id: Option<u32>,
}

impl ParseChunk for AssociatedDataChunk {
    fn parse<B: ReadBytes>(reader: &mut B, tag: [u8; 4], len: u32) -> Result<Self> {
        let kind = match &tag {
            b"labl" => Some(AssociatedDataKind::Label),
            b"note" => Some(AssociatedDataKind::Note),
            b"ltxt" => Some(AssociatedDataKind::LabeledText),
            b"file" => Some(AssociatedDataKind::File),
            _ => None,
        };

        let cue_id = if kind.is_some() && len >= 4 { Some(reader.read_u32()?) } else { None };

        Ok(AssociatedDataChunk { tag, kind, cue_id })
    }
}

/// A member of an INFO list.
pub struct InfoChunk {
    pub tag: [u8; 4],
    pub value: String,
}

impl ParseChunk for InfoChunk {
    fn parse<B: ReadBytes>(reader: &mut B, tag: [u8; 4], len: u32) -> Result<InfoChunk> {
        let mut value_buf = vec![0u8; len.min(MAX_INFO_VALUE_LEN) as usize];
        reader.read_buf_exact(&mut value_buf)?;

        // Values are null-terminated and sometimes null-padded.
        let end = value_buf.iter().position(|&b| b == 0).unwrap_or(value_buf.len());
        let value = String::from_utf8_lossy(&value_buf[..end]).trim().to_string();

        Ok(InfoChunk { tag, value })
    }
}

pub enum ListContents {
    AssociatedData(Vec<AssociatedDataChunk>),
    Info(Vec<InfoChunk>),
    Other,
}

pub struct ListChunk {
    pub form: [u8; 4],
    pub contents: ListContents,
    /// The list ended at a member whose length exceeded the list.
    pub truncated: bool,
}

impl ParseChunk for ListChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _tag: [u8; 4], len: u32) -> Result<Self> {
        // A List chunk must contain atleast the list/form identifier. However, an empty list
        // (len == 4) is permissible.
        if len < 4 {
            return decode_error("wav: malformed list chunk");
        }

        let form = reader.read_quad_bytes()?;
        let list_len = u64::from(len - 4);

        let (contents, truncated) = match &form {
            b"adtl" => {
                let (entries, truncated) = read_list(reader, list_len)?;
                (ListContents::AssociatedData(entries), truncated)
            }
            b"INFO" => {
                let (entries, truncated) = read_list(reader, list_len)?;
                (ListContents::Info(entries), truncated)
            }
            _ => (ListContents::Other, false),
        };

        Ok(ListChunk { form, contents, truncated })
    }
}

/// The sampler chunk.
pub struct SamplerChunk {
    /// The MIDI note at which the sample plays back at its original pitch.
    pub midi_unity_note: u32,
    pub n_sample_loops: u32,
}

impl ParseChunk for SamplerChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _: [u8; 4], _: u32) -> Result<Self> {
        // Manufacturer, product, and sample period.
        reader.ignore_bytes(12)?;
        let midi_unity_note = reader.read_u32()?;
        // Pitch fraction, SMPTE format, and SMPTE offset.
        reader.ignore_bytes(12)?;
        let n_sample_loops = reader.read_u32()?;

        Ok(SamplerChunk { midi_unity_note, n_sample_loops })
    }
}

/// The instrument chunk.
pub struct InstrumentChunk {
    pub unshifted_note: u8,
    /// The playable note range.
    pub note_range: (u8, u8),
}

impl ParseChunk for InstrumentChunk {
    fn parse<B: ReadBytes>(reader: &mut B, _: [u8; 4], _: u32) -> Result<Self> {
        let unshifted_note = reader.read_u8()?;
        // Fine tune and gain.
        reader.ignore_bytes(2)?;
        let low_note = reader.read_u8()?;
        let high_note = reader.read_u8()?;

        Ok(InstrumentChunk { unshifted_note, note_range: (low_note, high_note) })
    }
}

pub enum RiffWaveChunks {
    Format(ChunkParser<WaveFormatChunk>),
    Fact(ChunkParser<FactChunk>),
    Data(ChunkParser<DataChunk>),
    Cue(ChunkParser<CueChunk>),
    Playlist(ChunkParser<PlaylistChunk>),
    List(ChunkParser<ListChunk>),
    Sampler(ChunkParser<SamplerChunk>),
    Instrument(ChunkParser<InstrumentChunk>),
}

macro_rules! parser {
    ($class:expr, $result:ty, $tag:expr, $len:expr) => {
        Some($class(ChunkParser::<$result>::new($tag, $len)))
    };
}

impl ParseChunkTag for RiffWaveChunks {
    fn parse_tag(tag: [u8; 4], len: u32) -> Option<Self> {
        match &tag {
            b"fmt " => parser!(RiffWaveChunks::Format, WaveFormatChunk, tag, len),
            b"fact" => parser!(RiffWaveChunks::Fact, FactChunk, tag, len),
            b"data" => parser!(RiffWaveChunks::Data, DataChunk, tag, len),
            b"cue " => parser!(RiffWaveChunks::Cue, CueChunk, tag, len),
            b"plst" => parser!(RiffWaveChunks::Playlist, PlaylistChunk, tag, len),
            b"LIST" => parser!(RiffWaveChunks::List, ListChunk, tag, len),
            b"smpl" => parser!(RiffWaveChunks::Sampler, SamplerChunk, tag, len),
            b"inst" => parser!(RiffWaveChunks::Instrument, InstrumentChunk, tag, len),
            _ => None,
        }
    }
}
