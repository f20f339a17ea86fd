// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;
use hashbrown::HashSet;

use keepsake_core::anomaly::{Anomalies, SevereElement};
use keepsake_core::bitstream::{Bitstream, BitstreamKind, Location};
use keepsake_core::errors::{decode_error, unsupported_error, Error, Result};
use keepsake_core::io::Cursor;
use keepsake_core::probe::{Characterization, FormatInfo, ParseOptions, ProbeDescriptor};

use log::{debug, info, warn};

mod chunks;

use chunks::*;

use crate::catalog;
use crate::common::{ChunkParser, ChunksReader, ParseChunk};

/// WAVE is a RIFF stream, with a "RIFF" ASCII stream marker.
const RIFF_STREAM_MARKER: [u8; 4] = *b"RIFF";

/// The RIFF form of a WAVE stream.
const WAVE_RIFF_FORM: [u8; 4] = *b"WAVE";

pub const WAVE_FORMAT_INFO: FormatInfo = FormatInfo {
    short_name: "wave",
    long_name: "Waveform Audio File Format",
    mime_type: "audio/x-wave",
};

/// Registers WAVE with a [`Probe`](keepsake_core::probe::Probe).
pub const DESCRIPTOR: ProbeDescriptor = ProbeDescriptor { info: WAVE_FORMAT_INFO, is_type, parse };

bitflags! {
    /// Optional chunks seen in the stream.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    struct WaveFlags: u16 {
        const HAS_FACT = 1 << 0;
        const HAS_CUE_POINTS = 1 << 1;
        const HAS_PLAYLIST = 1 << 2;
        const HAS_LABEL = 1 << 3;
        const HAS_NOTE = 1 << 4;
        const HAS_LABELED_TEXT = 1 << 5;
        const HAS_FILE = 1 << 6;
        const HAS_SAMPLER = 1 << 7;
        const HAS_INSTRUMENT = 1 << 8;
    }
}

const WAVE_ATTRIBUTES: &[(&str, WaveFlags)] = &[
    ("has_fact_chunk", WaveFlags::HAS_FACT),
    ("has_cue_chunk", WaveFlags::HAS_CUE_POINTS),
    ("has_playlist_chunk", WaveFlags::HAS_PLAYLIST),
    ("has_label_chunk", WaveFlags::HAS_LABEL),
    ("has_note_chunk", WaveFlags::HAS_NOTE),
    ("has_labeled_text_chunk", WaveFlags::HAS_LABELED_TEXT),
    ("has_file_chunk", WaveFlags::HAS_FILE),
    ("has_sample_chunk", WaveFlags::HAS_SAMPLER),
    ("has_instrument_chunk", WaveFlags::HAS_INSTRUMENT),
];

/// Speaker positions of the WAVEFORMATEXTENSIBLE channel mask.
const SPEAKER_POSITIONS: &[(u32, &str)] = &[
    (0x1, "FRONT_LEFT"),
    (0x2, "FRONT_RIGHT"),
    (0x4, "FRONT_CENTER"),
    (0x8, "LOW_FREQUENCY"),
    (0x10, "BACK_LEFT"),
    (0x20, "BACK_RIGHT"),
    (0x40, "FRONT_LEFT_OF_CENTER"),
    (0x80, "FRONT_RIGHT_OF_CENTER"),
    (0x100, "BACK_CENTER"),
    (0x200, "SIDE_LEFT"),
    (0x400, "SIDE_RIGHT"),
    (0x800, "TOP_CENTER"),
    (0x1000, "TOP_FRONT_LEFT"),
    (0x2000, "TOP_FRONT_CENTER"),
    (0x4000, "TOP_FRONT_RIGHT"),
    (0x8000, "TOP_BACK_LEFT"),
    (0x10000, "TOP_BACK_CENTER"),
    (0x20000, "TOP_BACK_RIGHT"),
];

const KNOWN_SPEAKER_MASK: u32 = 0x3ffff;

/// INFO list members recorded as attributes.
const INFO_ATTRIBUTES: &[(&[u8; 4], &str)] =
    &[(b"ICOP", "copyright"), (b"ICRD", "creation_date"), (b"ISFT", "creating_application")];

/// Returns `true` if the stream begins with a RIFF header of the WAVE form.
pub fn is_type(reader: &mut dyn Cursor) -> Result<bool> {
    let marker = reader.read_quad_bytes()?;
    let _riff_len = reader.read_u32()?;
    let form = reader.read_quad_bytes()?;

    Ok(marker == RIFF_STREAM_MARKER && form == WAVE_RIFF_FORM)
}

/// Characterizes a WAVE stream, starting from the current position of the stream.
pub fn parse(reader: &mut dyn Cursor, _options: &ParseOptions) -> Result<Characterization> {
    if reader.read_quad_bytes()? != RIFF_STREAM_MARKER {
        return decode_error("wav: missing riff stream marker");
    }

    let riff_len = reader.read_u32()?;

    if reader.read_quad_bytes()? != WAVE_RIFF_FORM {
        return unsupported_error("wav: riff form is not wave");
    }

    // The form identifier is counted in the RIFF length.
    let mut len = u64::from(riff_len).saturating_sub(4);

    if len > reader.remaining() {
        warn!("wav: riff length {} exceeds the stream", riff_len);
        len = reader.remaining();
    }

    let mut state = WaveState::default();
    let mut riff_chunks = ChunksReader::<RiffWaveChunks>::new(len);

    while let Some(chunk) = riff_chunks.next(reader)? {
        match chunk {
            RiffWaveChunks::Format(parser) => state.read_format(&parser, reader)?,
            RiffWaveChunks::Data(parser) => state.read_data(&parser, reader)?,
            RiffWaveChunks::Fact(parser) => {
                state.flags |= WaveFlags::HAS_FACT;
                if let Some(fact) = read_chunk(&parser, reader)? {
                    state.fact.get_or_insert(fact);
                }
            }
            RiffWaveChunks::Cue(parser) => state.read_cue(&parser, reader)?,
            RiffWaveChunks::Playlist(parser) => state.read_playlist(&parser, reader)?,
            RiffWaveChunks::List(parser) => state.read_list(&parser, reader)?,
            RiffWaveChunks::Sampler(parser) => {
                state.flags |= WaveFlags::HAS_SAMPLER;
                state.sampler = read_chunk(&parser, reader)?;
            }
            RiffWaveChunks::Instrument(parser) => {
                state.flags |= WaveFlags::HAS_INSTRUMENT;
                state.instrument = read_chunk(&parser, reader)?;
            }
        }
    }

    if riff_chunks.is_truncated() {
        state.add(catalog::CHUNK_TRUNCATED);
    }

    riff_chunks.finish(reader)?;

    Ok(state.finish())
}

/// Parses a chunk, treating a chunk too short for its fields as absent.
fn read_chunk<P: ParseChunk>(
    parser: &ChunkParser<P>,
    reader: &mut dyn Cursor,
) -> Result<Option<P>> {
    match parser.parse(reader) {
        Ok(chunk) => Ok(Some(chunk)),
        Err(Error::DecodeError(desc)) => {
            warn!("{}", desc);
            Ok(None)
        }
        Err(err) if err.is_end_of_stream() => {
            warn!("wav: chunk of {} bytes is too short for its fields", parser.len);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[derive(Default)]
struct WaveState {
    anomalies: Anomalies,
    flags: WaveFlags,
    cue_ids: HashSet<u32>,
    /// The first format chunk, and the position of its content.
    format: Option<(u64, WaveFormatChunk)>,
    data_len: Option<u32>,
    fact: Option<FactChunk>,
    sampler: Option<SamplerChunk>,
    instrument: Option<InstrumentChunk>,
    info: Vec<(&'static str, String)>,
}

impl WaveState {
    fn add(&mut self, element: SevereElement) {
        if self.anomalies.add(element) {
            warn!("wav: {}", element);
        }
    }

    fn read_format(
        &mut self,
        parser: &ChunkParser<WaveFormatChunk>,
        reader: &mut dyn Cursor,
    ) -> Result<()> {
        if parser.len < WAVEFORMAT_SIZE {
            self.add(catalog::FMT_CHUNK_TOO_SMALL);
            return parser.skip(reader);
        }

        // Only the first format chunk describes the audio.
        if self.format.is_some() {
            debug!("wav: ignoring additional fmt chunk");
            return parser.skip(reader);
        }

        let pos = reader.pos();

        if let Some(format) = read_chunk(parser, reader)? {
            debug!("{}", format);
            self.format = Some((pos, format));
        }

        Ok(())
    }

    fn read_data(&mut self, parser: &ChunkParser<DataChunk>, reader: &mut dyn Cursor) -> Result<()> {
        let data = parser.parse(reader)?;

        if self.format.is_none() {
            self.add(catalog::NO_FMT_BEFORE_DATA);
        }
        else if self.data_len.is_none() {
            self.data_len = Some(data.len);
        }

        Ok(())
    }

    fn read_cue(&mut self, parser: &ChunkParser<CueChunk>, reader: &mut dyn Cursor) -> Result<()> {
        if self.flags.contains(WaveFlags::HAS_CUE_POINTS) {
            self.add(catalog::MULTIPLE_CUE_POINTS_CHUNK);
            return parser.skip(reader);
        }

        self.flags |= WaveFlags::HAS_CUE_POINTS;

        if let Some(cue) = read_chunk(parser, reader)? {
            for id in cue.cue_ids {
                if !self.cue_ids.insert(id) {
                    self.add(catalog::NON_UNIQUE_CUE_POINT_ID);
                }
            }
        }

        Ok(())
    }

    fn read_playlist(
        &mut self,
        parser: &ChunkParser<PlaylistChunk>,
        reader: &mut dyn Cursor,
    ) -> Result<()> {
        self.flags |= WaveFlags::HAS_PLAYLIST;

        if let Some(playlist) = read_chunk(parser, reader)? {
            if playlist.cue_ids.iter().any(|id| !self.cue_ids.contains(id)) {
                self.add(catalog::UNDEFINED_CUE_POINT_IN_PLAYLIST);
            }
        }

        Ok(())
    }

    fn read_list(&mut self, parser: &ChunkParser<ListChunk>, reader: &mut dyn Cursor) -> Result<()> {
        let list = match read_chunk(parser, reader)? {
            Some(list) => list,
            None => return Ok(()),
        };

        match list.contents {
            ListContents::AssociatedData(entries) => {
                for entry in entries {
                    let kind = match entry.kind {
                        Some(kind) => kind,
                        None => {
                            debug!(
                                "wav: unknown associated data chunk {}",
                                String::from_utf8_lossy(&entry.tag)
                            );
                            self.add(catalog::BAD_SUBCHUNK_IN_ASSOCIATED_DATA_LIST);
                            continue;
                        }
                    };

                    self.flags |= match kind {
                        AssociatedDataKind::Label => WaveFlags::HAS_LABEL,
                        AssociatedDataKind::Note => WaveFlags::HAS_NOTE,
                        AssociatedDataKind::LabeledText => WaveFlags::HAS_LABELED_TEXT,
                        AssociatedDataKind::File => WaveFlags::HAS_FILE,
                    };

                    let defined = entry.cue_id.is_some_and(|id| self.cue_ids.contains(&id));

                    if !defined {
                        self.add(catalog::UNDEFINED_CUE_POINT_IN_ASSOCIATED_DATA_LIST);
                    }
                }
            }
            ListContents::Info(entries) => {
                for entry in entries {
                    match INFO_ATTRIBUTES.iter().find(|(tag, _)| **tag == entry.tag) {
                        Some(&(_, name)) => self.info.push((name, entry.value)),
                        None => debug!(
                            "wav: ignoring info chunk {}",
                            String::from_utf8_lossy(&entry.tag)
                        ),
                    }
                }
            }
            ListContents::Other => {
                debug!("wav: unknown list form {}", String::from_utf8_lossy(&list.form));
                self.add(catalog::BAD_ASSOCIATED_DATA_CHUNK);
            }
        }

        if list.truncated {
            self.add(catalog::CHUNK_TRUNCATED);
        }

        Ok(())
    }

    fn finish(mut self) -> Characterization {
        let mut result = Characterization::new(WAVE_FORMAT_INFO);

        if let Some((pos, format)) = self.format.take() {
            let audio = self.build_audio(pos, &format);

            result.set_attribute("avg_bytes_per_sec", format.avg_bytes_per_sec);
            result.set_attribute("block_align", format.block_align);

            if let Some(ext) = &format.extension {
                self.check_channel_mask(ext.channel_mask, &mut result);
                result.set_attribute("valid_bits_per_sample", ext.valid_bits_per_sample);
            }

            result.bitstreams.push(audio);
        }

        for &(name, flag) in WAVE_ATTRIBUTES {
            result.set_attribute(name, self.flags.contains(flag));
        }

        if let Some(sampler) = &self.sampler {
            result.set_attribute("midi_unity_note", sampler.midi_unity_note);
            result.set_attribute("sample_loops", sampler.n_sample_loops);
        }

        if let Some(instrument) = &self.instrument {
            let (low, high) = instrument.note_range;
            result.set_attribute("unshifted_note", instrument.unshifted_note);
            result.set_attribute("note_range", format!("{}-{}", low, high));
        }

        for (name, value) in self.info.drain(..) {
            result.set_attribute(name, value);
        }

        result.anomalies = self.anomalies;

        info!(
            "wav: {} bitstream(s), {} anomalies, {} limitations",
            result.bitstreams.len(),
            result.anomalies.anomalies().len(),
            result.anomalies.limitations().len()
        );

        result
    }

    fn build_audio(&mut self, pos: u64, format: &WaveFormatChunk) -> Bitstream {
        let mut audio = Bitstream::new(BitstreamKind::Audio);

        audio.location = Some(Location::FileByteOffset(pos));
        audio.encoding_tag = Some(format!("{:#06x}", format.format_tag));
        audio.channels = Some(u32::from(format.n_channels));
        audio.sample_rate = Some(f64::from(format.sample_rate));
        audio.bits_per_sample = format.bits_per_sample.map(u32::from);

        let encoding = format.encoding();

        match encoding {
            Some(encoding) => {
                audio.encoding = Some(encoding.name().to_string());

                if encoding.is_compressed() && self.fact.is_none() {
                    self.add(catalog::NO_FACT_FOR_COMPRESSED_DATA);
                }
            }
            None => {
                warn!("wav: unsupported format tag {:#06x}", format.format_tag);
                self.add(catalog::UNSUPPORTED_ENCODING);
            }
        }

        // The fact chunk counts the frames of any encoding. Without it, only linear encodings
        // can be counted, from the size of the data.
        let frames = match (&self.fact, self.data_len) {
            (Some(fact), _) => Some(u64::from(fact.n_frames)),
            (None, Some(len)) if format.block_align > 0 => match encoding {
                Some(encoding) if !encoding.is_compressed() => {
                    Some(u64::from(len) / u64::from(format.block_align))
                }
                _ => None,
            },
            _ => None,
        };

        if let Some(frames) = frames {
            audio.sample_count = Some(frames);
            audio.set_duration(frames, format.sample_rate);
        }

        audio.derive_audio_rates();
        audio
    }

    fn check_channel_mask(&mut self, mask: u32, result: &mut Characterization) {
        if mask & !KNOWN_SPEAKER_MASK != 0 {
            self.add(catalog::UNRECOGNIZABLE_SPEAKER_POSITION);
        }

        let speakers: Vec<&str> = SPEAKER_POSITIONS
            .iter()
            .filter(|(bit, _)| mask & bit != 0)
            .map(|&(_, name)| name)
            .collect();

        result.set_attribute("channel_mask", format!("{:#010x}", mask));
        result.set_attribute("speakers", speakers.join(","));
    }
}
