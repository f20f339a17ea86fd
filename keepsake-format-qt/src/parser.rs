// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::Cursor;
use keepsake_core::probe::{Characterization, FormatInfo, ParseOptions, ProbeDescriptor};
use keepsake_core::unit::{fourcc_to_string, MIN_HEADER_SIZE};

use log::{debug, info, warn};

use crate::atoms::{check_malformation, read_leaf, AtomIterator, AtomType, FtypAtom, MoovAtom};
use crate::catalog;
use crate::context::{MovieFlags, ParseContext};

pub const QUICKTIME_FORMAT_INFO: FormatInfo = FormatInfo {
    short_name: "quicktime",
    long_name: "QuickTime Movie",
    mime_type: "video/quicktime",
};

/// Registers QuickTime with a [`Probe`](keepsake_core::probe::Probe).
pub const DESCRIPTOR: ProbeDescriptor =
    ProbeDescriptor { info: QUICKTIME_FORMAT_INFO, is_type, parse };

const MOVIE_ATTRIBUTES: &[(&str, MovieFlags)] = &[
    ("has_references", MovieFlags::HAS_REFERENCES),
    ("has_user_data", MovieFlags::HAS_USER_DATA),
    ("has_clipping_region", MovieFlags::HAS_CLIPPING_REGION),
    ("has_color_table", MovieFlags::HAS_COLOR_TABLE),
    ("has_compressed_header", MovieFlags::HAS_COMPRESSED_HEADER),
];

/// Returns `true` if the top level of the stream contains both a movie atom and a movie data
/// atom.
pub fn is_type(reader: &mut dyn Cursor) -> Result<bool> {
    let mut iter = AtomIterator::new_root(reader);

    let mut seen_moov = false;
    let mut seen_mdat = false;

    while let Some(header) = iter.next()? {
        match header.unit_type() {
            AtomType::Movie => seen_moov = true,
            AtomType::MediaData => seen_mdat = true,
            _ => (),
        }

        if seen_moov && seen_mdat {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Characterizes a QuickTime movie, starting from the current position of the stream.
pub fn parse(reader: &mut dyn Cursor, options: &ParseOptions) -> Result<Characterization> {
    if reader.remaining() < MIN_HEADER_SIZE {
        return decode_error("qt: file is smaller than an atom header");
    }

    let mut ctx = ParseContext::new(*options);
    let mut iter = AtomIterator::new_root(reader);

    let mut ftyp = None;
    let mut moov = None;
    let mut seen_mdat = false;

    while let Some(header) = iter.next()? {
        match header.unit_type() {
            AtomType::FileType => {
                ftyp = read_leaf::<FtypAtom, _>(&mut iter, &mut ctx)?;
            }
            AtomType::Movie => {
                if moov.is_none() {
                    moov = Some(iter.read_unit::<MoovAtom, _>(&mut ctx)?);
                }
                else {
                    warn!("qt: ignoring additional moov atom");
                }
            }
            AtomType::MediaData => seen_mdat = true,
            _ => debug!("qt: skipping atom {}", header),
        }
    }

    check_malformation(&iter, &mut ctx);

    if moov.is_none() {
        warn!("qt: missing moov atom");
        ctx.add(catalog::NO_MOOV);
    }

    if !seen_mdat {
        warn!("qt: missing mdat atom");
        ctx.add(catalog::NO_MDAT);
    }

    let mut result = Characterization::new(QUICKTIME_FORMAT_INFO);

    if let Some(ftyp) = &ftyp {
        result.set_attribute("brand", fourcc_to_string(&ftyp.major_brand));
        result.version = Some(ftyp.minor_version.to_string());
    }

    if let Some(mvhd) = moov.as_ref().and_then(MoovAtom::movie_header) {
        if let Some(duration) = mvhd.duration_secs() {
            result.set_attribute("duration", duration);
        }
    }

    for &(name, flag) in MOVIE_ATTRIBUTES {
        result.set_attribute(name, ctx.movie.contains(flag));
    }

    result.bitstreams = ctx.bitstreams;
    result.anomalies = ctx.anomalies;

    info!(
        "qt: {} bitstream(s), {} anomalies, {} limitations",
        result.bitstreams.len(),
        result.anomalies.anomalies().len(),
        result.anomalies.limitations().len()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use keepsake_core::anomaly::{CatalogSeverity, PreservationLevel};
    use keepsake_core::bitstream::{BitstreamKind, Location, Role};
    use keepsake_core::io::BufReader;

    use super::*;
    use crate::fixtures::*;

    fn characterize(data: &[u8]) -> Characterization {
        let mut reader = BufReader::new(data);
        parse(&mut reader, &ParseOptions::default()).unwrap()
    }

    fn codes(result: &Characterization) -> Vec<&'static str> {
        result.anomalies.iter().map(|el| el.code).collect()
    }

    #[test]
    fn verify_video_track() {
        let data = movie(&[mvhd(600, 6000), video_trak()]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert_eq!(result.bitstreams.len(), 1);
        assert_eq!(result.attributes.get("brand").map(String::as_str), Some("qt  "));
        assert_eq!(result.attributes.get("duration").map(String::as_str), Some("10"));
        assert!(!result.has_attribute("has_compressed_header"));

        let video = &result.bitstreams[0];
        assert_eq!(video.kind, BitstreamKind::Video);
        assert_eq!(video.role, Role::Movie);
        assert!(video.enabled);
        assert_eq!(video.encoding.as_deref(), Some("CINEPAK VIDEO"));
        assert_eq!(video.sample_count, Some(300));
        assert_eq!(video.duration, Some(10.0));
        assert_eq!(video.frame_rate, Some(30.0));
        assert_eq!(video.data_rate, Some(30.0 * 640.0 * 480.0 * 24.0));

        // ftyp, moov header, mvhd, trak header, and tkhd precede the mdia atom.
        let mdia_pos = ftyp().len() + 8 + mvhd(600, 6000).len() + 8 + tkhd(0x3).len();
        assert_eq!(video.location, Some(Location::UncompressedHeaderByteOffset(mdia_pos as u64)));

        assert_eq!(result.preservation_level(&CatalogSeverity), PreservationLevel::Full);
    }

    #[test]
    fn verify_audio_track() {
        let data = movie(&[mvhd(600, 6000), audio_trak()]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));

        let audio = &result.bitstreams[0];
        assert_eq!(audio.kind, BitstreamKind::Audio);
        assert_eq!(audio.role, Role::Main);
        assert_eq!(audio.encoding.as_deref(), Some("16-bit Little Endian"));
        assert_eq!(audio.channels, Some(2));
        assert_eq!(audio.sample_rate, Some(44100.0));
        assert_eq!(audio.frame_rate, Some(88200.0));
        assert_eq!(audio.data_rate, Some(88200.0 * 16.0));
    }

    #[test]
    fn verify_track_without_media() {
        let data = movie(&[mvhd(600, 6000), container(b"trak", &[tkhd(0x1)]), video_trak()]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_QUICKTIME_BAD_TRAK"]);
        // The well-formed track is still characterized.
        assert_eq!(result.bitstreams.len(), 1);
    }

    #[test]
    fn verify_missing_required_atoms() {
        let data = [ftyp(), atom(b"free", &[0; 4])].concat();
        let result = characterize(&data);
        assert_eq!(codes(&result), ["A_QUICKTIME_NO_MOOV", "A_QUICKTIME_NO_MDAT"]);

        let data = [container(b"moov", &[video_trak()]), mdat(8)].concat();
        let result = characterize(&data);
        assert_eq!(codes(&result), ["A_QUICKTIME_BAD_MOOV"]);
        assert_eq!(result.bitstreams.len(), 1);
    }

    #[test]
    fn verify_track_without_header() {
        let stbl = [stsd_video(b"cvid", 640, 480, 24), stts(&[(300, 20)])];
        let media = mdia(b"vide", &stbl, self_dinf());
        let trak = container(b"trak", &[media]);
        let result = characterize(&movie(&[mvhd(600, 6000), trak]));

        assert_eq!(codes(&result), ["A_QUICKTIME_BAD_TRAK"]);
        // The media is kept with the default flags and role.
        assert_eq!(result.bitstreams.len(), 1);
        assert_eq!(result.bitstreams[0].role, Role::Main);
        assert!(result.bitstreams[0].enabled);
        assert_eq!(result.bitstreams[0].frame_rate, Some(30.0));
    }

    #[test]
    fn verify_reference_movie_satisfies_moov() {
        let data = movie(&[container(b"rmra", &[]), atom(b"udta", &[0; 4])]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert!(result.has_attribute("has_references"));
        assert!(result.has_attribute("has_user_data"));
        assert!(!result.has_attribute("has_color_table"));
    }

    #[test]
    fn verify_empty_closing_atom_is_not_read() {
        // Only more than a header's worth of bytes admits another child, so an empty reference
        // movie atom closing the movie atom is skipped.
        let data = movie(&[container(b"rmra", &[])]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_QUICKTIME_BAD_MOOV"]);
        assert!(!result.has_attribute("has_references"));
    }

    #[test]
    fn verify_undersized_full_atom() {
        // A time-to-sample atom too small for its version and flags.
        let stbl = [stsd_video(b"cvid", 8, 8, 24), atom(b"stts", &[0, 0])];
        let media = mdia(b"vide", &stbl, self_dinf());
        let trak = container(b"trak", &[tkhd(0x1), media]);
        let result = characterize(&movie(&[mvhd(600, 6000), trak]));

        assert_eq!(codes(&result), ["A_QUICKTIME_ATOM_TOO_SMALL"]);
        assert_eq!(result.bitstreams.len(), 1);
        assert_eq!(result.bitstreams[0].frame_rate, None);
    }

    #[test]
    fn verify_short_file_is_fatal() {
        let result = parse(&mut BufReader::new(&[0, 0, 0, 8, b'm']), &ParseOptions::default());
        assert!(matches!(result, Err(keepsake_core::errors::Error::DecodeError(_))));
    }

    #[test]
    fn verify_undersized_atom_stops_scope() {
        let mut undersized = 4u32.to_be_bytes().to_vec();
        undersized.extend_from_slice(b"junk");

        let data = movie(&[mvhd(600, 6000), undersized, video_trak()]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_QUICKTIME_ATOM_TOO_SMALL"]);
        // The track after the undersized atom is not reached, but the mdat is.
        assert!(result.bitstreams.is_empty());
    }

    #[test]
    fn verify_truncated_leaf() {
        let media = mdia(b"vide", &[stsd_video(b"cvid", 8, 8, 24)], self_dinf());
        let trak = container(b"trak", &[atom(b"tkhd", &[0; 12]), media]);
        let data = movie(&[mvhd(600, 6000), trak]);
        let result = characterize(&data);

        assert!(result.anomalies.contains("A_QUICKTIME_ATOM_TOO_SMALL"));
        assert!(result.anomalies.contains("A_QUICKTIME_BAD_TRAK"));
    }

    #[test]
    fn verify_unsupported_encoding() {
        let trak = container(
            b"trak",
            &[
                tkhd(0x1),
                mdia(b"vide", &[stsd_video(b"xxxx", 8, 8, 24), stts(&[(1, 1)])], self_dinf()),
            ],
        );
        let result = characterize(&movie(&[mvhd(600, 6000), trak]));

        assert_eq!(codes(&result), ["L_QUICKTIME_UNSUPPORTED_VIDEO_ENCODING"]);
        assert_eq!(result.bitstreams[0].encoding_tag.as_deref(), Some("xxxx"));
        assert_eq!(result.preservation_level(&CatalogSeverity), PreservationLevel::Bit);
    }

    #[test]
    fn verify_compressed_header() {
        let inner = container(b"moov", &[mvhd(600, 6000), video_trak()]);
        let data = movie(&[cmov(b"zlib", &inner)]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert!(result.has_attribute("has_compressed_header"));
        assert_eq!(result.attributes.get("duration").map(String::as_str), Some("10"));
        assert_eq!(result.bitstreams.len(), 1);

        // The location is relative to the uncompressed movie resource.
        let mdia_pos = 8 + mvhd(600, 6000).len() + 8 + tkhd(0x3).len();
        assert_eq!(
            result.bitstreams[0].location,
            Some(Location::UncompressedHeaderByteOffset(mdia_pos as u64))
        );
    }

    #[test]
    fn verify_unsupported_compressed_header() {
        let inner = container(b"moov", &[mvhd(600, 6000), video_trak()]);
        let data = movie(&[cmov(b"lzw ", &inner)]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["L_QUICKTIME_UNSUPPORTED_COMPRESSED_HEADER"]);
        assert!(result.bitstreams.is_empty());
        assert_eq!(result.preservation_level(&CatalogSeverity), PreservationLevel::Bit);
    }

    #[test]
    fn verify_compressed_header_limit() {
        let inner = container(b"moov", &[mvhd(600, 6000), video_trak()]);
        let data = movie(&[cmov(b"zlib", &inner)]);

        let options = ParseOptions { max_decompressed_len: 16 };
        let result = parse(&mut BufReader::new(&data), &options).unwrap();

        assert!(result.anomalies.contains("L_QUICKTIME_UNSUPPORTED_COMPRESSED_HEADER"));
    }

    #[test]
    fn verify_is_type() {
        let data = movie(&[mvhd(600, 6000)]);
        assert!(is_type(&mut BufReader::new(&data)).unwrap());

        let data = container(b"moov", &[mvhd(600, 6000)]);
        assert!(!is_type(&mut BufReader::new(&data)).unwrap());

        let data = b"RIFF\x24\x00\x00\x00WAVEfmt ";
        assert!(!is_type(&mut BufReader::new(data)).unwrap());
    }
}
