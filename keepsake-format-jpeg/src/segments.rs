// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Readers for the content of marker segments. Every reader is handed a stream limited to the
//! segment's content, so a segment too short for its fields fails with an end-of-stream error.

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::{ReadBytes, ScopedStream};

use smallvec::SmallVec;

/// The application segment identifiers that determine the variation of a JPEG file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppIdentifier {
    Jfif,
    Jfxx,
    Exif,
    Spiff,
    Photoshop,
    Adobe,
    Other,
}

/// Identifiers, and the application segment they are found in. Identifiers of the same segment
/// are of equal length.
const APP_IDENTIFIERS: &[(u8, &[u8], AppIdentifier)] = &[
    (0, b"JFIF\0", AppIdentifier::Jfif),
    (0, b"JFXX\0", AppIdentifier::Jfxx),
    (1, b"Exif\0\0", AppIdentifier::Exif),
    (8, b"SPIFF\0", AppIdentifier::Spiff),
    (13, b"Photoshop 3.0\0", AppIdentifier::Photoshop),
    (14, b"Adobe", AppIdentifier::Adobe),
];

/// Reads the identifier at the start of application segment `n`. If the segment may carry a
/// known identifier, the identifier's bytes are consumed whether or not they match.
pub fn read_app_identifier<B: ReadBytes>(
    reader: &mut ScopedStream<B>,
    n: u8,
) -> Result<AppIdentifier> {
    let len = match APP_IDENTIFIERS.iter().find(|(app, _, _)| *app == n) {
        Some((_, ident, _)) => ident.len(),
        None => return Ok(AppIdentifier::Other),
    };

    if reader.bytes_available() < len as u64 {
        return Ok(AppIdentifier::Other);
    }

    let mut buf = [0u8; 14];
    reader.read_buf_exact(&mut buf[..len])?;

    let ident = APP_IDENTIFIERS
        .iter()
        .find(|(app, ident, _)| *app == n && *ident == &buf[..len])
        .map_or(AppIdentifier::Other, |(_, _, ident)| *ident);

    Ok(ident)
}

/// The JFIF APP0 segment, following the `JFIF\0` identifier.
#[derive(Debug)]
pub struct JfifHeader {
    pub version: (u8, u8),
    pub units: u8,
    pub x_density: u16,
    pub y_density: u16,
    pub thumbnail_width: u8,
    pub thumbnail_height: u8,
    /// The position of the thumbnail dimensions.
    pub thumbnail_pos: u64,
}

impl JfifHeader {
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let units = reader.read_u8()?;
        let x_density = reader.read_be_u16()?;
        let y_density = reader.read_be_u16()?;

        let thumbnail_pos = reader.pos();
        let thumbnail_width = reader.read_u8()?;
        let thumbnail_height = reader.read_u8()?;

        Ok(JfifHeader {
            version: (major, minor),
            units,
            x_density,
            y_density,
            thumbnail_width,
            thumbnail_height,
            thumbnail_pos,
        })
    }

    pub fn version_string(&self) -> String {
        format!("{}.{:02}", self.version.0, self.version.1)
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_width != 0 && self.thumbnail_height != 0
    }
}

/// The kind of thumbnail carried by a JFXX extension segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JfxxThumbnail {
    /// A thumbnail coded as a complete JPEG stream.
    Jpeg,
    /// One byte per pixel, indexing a 256 entry palette.
    Palette { width: u8, height: u8 },
    /// Three bytes per pixel.
    Rgb { width: u8, height: u8 },
}

/// The JFXX APP0 extension segment, following the `JFXX\0` identifier.
#[derive(Debug)]
pub struct JfxxExtension {
    pub code: u8,
    /// The thumbnail, or `None` if the extension code is unknown.
    pub thumbnail: Option<JfxxThumbnail>,
    /// The position of the thumbnail data.
    pub thumbnail_pos: u64,
}

impl JfxxExtension {
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        let code = reader.read_u8()?;

        let thumbnail = match code {
            0x10 => Some(JfxxThumbnail::Jpeg),
            0x11 => {
                let width = reader.read_u8()?;
                let height = reader.read_u8()?;
                Some(JfxxThumbnail::Palette { width, height })
            }
            0x13 => {
                let width = reader.read_u8()?;
                let height = reader.read_u8()?;
                Some(JfxxThumbnail::Rgb { width, height })
            }
            _ => None,
        };

        Ok(JfxxExtension { code, thumbnail, thumbnail_pos: reader.pos() })
    }
}

/// The SPIFF header, following the `SPIFF\0` identifier.
#[derive(Debug)]
pub struct SpiffHeader {
    pub version: (u8, u8),
    pub profile: u8,
    pub n_components: u8,
    pub height: u32,
    pub width: u32,
}

impl SpiffHeader {
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let profile = reader.read_u8()?;
        let n_components = reader.read_u8()?;
        let height = reader.read_be_u32()?;
        let width = reader.read_be_u32()?;

        Ok(SpiffHeader { version: (major, minor), profile, n_components, height, width })
    }
}

/// The Adobe APP14 segment, following the `Adobe` identifier. Only the colour transform is
/// kept.
pub fn read_adobe_transform<B: ReadBytes>(reader: &mut B) -> Result<u8> {
    // Version, then two flag words.
    reader.ignore_bytes(6)?;
    Ok(reader.read_u8()?)
}

/// Reads a DQT segment, returning the ids of the tables it defines.
pub fn read_dqt<B: ReadBytes>(reader: &mut ScopedStream<B>) -> Result<SmallVec<[u8; 4]>> {
    let mut ids = SmallVec::new();

    while reader.bytes_available() > 0 {
        let pq_tq = reader.read_u8()?;

        let table_len = match pq_tq >> 4 {
            0 => 64,
            1 => 128,
            _ => return decode_error("jpeg: invalid quantization table precision"),
        };

        let id = pq_tq & 0xf;

        if id > 3 {
            return decode_error("jpeg: invalid quantization table id");
        }

        reader.ignore_bytes(table_len)?;
        ids.push(id);
    }

    if ids.is_empty() {
        return decode_error("jpeg: empty quantization table segment");
    }

    Ok(ids)
}

/// The class of a Huffman table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableClass {
    Dc,
    Ac,
}

/// Reads a DHT segment, returning the class and id of each table it defines.
pub fn read_dht<B: ReadBytes>(
    reader: &mut ScopedStream<B>,
) -> Result<SmallVec<[(TableClass, u8); 4]>> {
    let mut tables = SmallVec::new();

    while reader.bytes_available() > 0 {
        let tc_th = reader.read_u8()?;

        let class = match tc_th >> 4 {
            0 => TableClass::Dc,
            1 => TableClass::Ac,
            _ => return decode_error("jpeg: invalid huffman table class"),
        };

        let id = tc_th & 0xf;

        if id > 3 {
            return decode_error("jpeg: invalid huffman table id");
        }

        // The number of codes of each length, from 1 to 16 bits, followed by the symbols.
        let mut counts = [0u8; 16];
        reader.read_buf_exact(&mut counts)?;

        let n_symbols: u64 = counts.iter().map(|&count| u64::from(count)).sum();

        reader.ignore_bytes(n_symbols)?;
        tables.push((class, id));
    }

    if tables.is_empty() {
        return decode_error("jpeg: empty huffman table segment");
    }

    Ok(tables)
}

/// Reads a DRI segment, returning the restart interval.
pub fn read_dri<B: ReadBytes>(reader: &mut ScopedStream<B>) -> Result<u16> {
    if reader.bytes_available() != 2 {
        return decode_error("jpeg: restart interval segment length is not 4");
    }

    Ok(reader.read_be_u16()?)
}

/// Reads a DNL segment, returning the number of lines.
pub fn read_dnl<B: ReadBytes>(reader: &mut B) -> Result<u16> {
    Ok(reader.read_be_u16()?)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    pub quant_table: u8,
}

/// A frame header, as found in a start-of-frame segment. The fields are read as found, see
/// [`FrameHeader::is_well_formed`].
#[derive(Clone, Debug)]
pub struct FrameHeader {
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: SmallVec<[FrameComponent; 4]>,
    /// Bytes left over after the last component.
    pub trailing: u64,
}

impl FrameHeader {
    pub fn read<B: ReadBytes>(reader: &mut ScopedStream<B>) -> Result<Self> {
        let precision = reader.read_u8()?;
        let height = reader.read_be_u16()?;
        let width = reader.read_be_u16()?;
        let n_components = reader.read_u8()?;

        let mut components = SmallVec::new();

        for _ in 0..n_components {
            let id = reader.read_u8()?;
            let sampling = reader.read_u8()?;
            let quant_table = reader.read_u8()?;

            components.push(FrameComponent {
                id,
                h_sampling: sampling >> 4,
                v_sampling: sampling & 0xf,
                quant_table,
            });
        }

        Ok(FrameHeader { precision, height, width, components, trailing: reader.bytes_available() })
    }

    /// Returns `true` if the frame has at least one component, every sampling factor is within
    /// 1 to 4, and the segment holds nothing after the components.
    pub fn is_well_formed(&self) -> bool {
        !self.components.is_empty()
            && self.trailing == 0
            && self.components.iter().all(|c| {
                (1..=4).contains(&c.h_sampling) && (1..=4).contains(&c.v_sampling)
            })
    }

    /// The sampling factors of each component, for example `2x2,1x1,1x1`.
    pub fn sampling(&self) -> String {
        self.components
            .iter()
            .map(|c| format!("{}x{}", c.h_sampling, c.v_sampling))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanComponent {
    pub id: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// A scan header, as found in a start-of-scan segment.
#[derive(Clone, Debug)]
pub struct ScanHeader {
    pub components: SmallVec<[ScanComponent; 4]>,
    /// Start of spectral selection, or the predictor of a lossless scan.
    pub ss: u8,
    /// End of spectral selection.
    pub se: u8,
    pub ah_al: u8,
}

impl ScanHeader {
    pub fn read<B: ReadBytes>(reader: &mut ScopedStream<B>) -> Result<Self> {
        let n_components = reader.read_u8()?;

        if n_components < 1 || n_components > 4 {
            return decode_error("jpeg: invalid number of scan components");
        }

        // The segment length must be exactly 6 + 2n, or 4 + 2n bytes of content.
        if reader.bytes_available() != 3 + 2 * u64::from(n_components) {
            return decode_error("jpeg: scan header length does not match its components");
        }

        let mut components = SmallVec::new();

        for _ in 0..n_components {
            let id = reader.read_u8()?;
            let tables = reader.read_u8()?;

            components.push(ScanComponent { id, dc_table: tables >> 4, ac_table: tables & 0xf });
        }

        let ss = reader.read_u8()?;
        let se = reader.read_u8()?;
        let ah_al = reader.read_u8()?;

        Ok(ScanHeader { components, ss, se, ah_al })
    }
}

#[cfg(test)]
mod tests {
    use keepsake_core::io::BufReader;

    use super::*;

    fn scoped(data: &[u8]) -> ScopedStream<BufReader<'_>> {
        ScopedStream::new(BufReader::new(data), data.len() as u64)
    }

    #[test]
    fn verify_app_identifiers() {
        let ident = |n, data: &[u8]| read_app_identifier(&mut scoped(data), n).unwrap();

        assert_eq!(ident(0, b"JFIF\0\x01\x02"), AppIdentifier::Jfif);
        assert_eq!(ident(0, b"JFXX\0\x10"), AppIdentifier::Jfxx);
        assert_eq!(ident(1, b"Exif\0\0II*\0"), AppIdentifier::Exif);
        assert_eq!(ident(8, b"SPIFF\0\x02\x00"), AppIdentifier::Spiff);
        assert_eq!(ident(14, b"Adobe\0\x64"), AppIdentifier::Adobe);
        assert_eq!(ident(0, b"JFI"), AppIdentifier::Other);
        assert_eq!(ident(1, b"http://ns.adobe.com/"), AppIdentifier::Other);
        assert_eq!(ident(2, b"ICC_PROFILE\0"), AppIdentifier::Other);
    }

    #[test]
    fn verify_dqt_tables() {
        let mut data = vec![0x00];
        data.extend_from_slice(&[1; 64]);
        data.push(0x11);
        data.extend_from_slice(&[1; 128]);

        let ids = read_dqt(&mut scoped(&data)).unwrap();
        assert_eq!(ids.as_slice(), &[0, 1]);

        // A 16-bit table cut short.
        assert!(read_dqt(&mut scoped(&data[..100])).is_err());

        // Precision 2 is undefined.
        let mut bad = vec![0x20];
        bad.extend_from_slice(&[1; 64]);
        assert!(read_dqt(&mut scoped(&bad)).is_err());
    }

    #[test]
    fn verify_dht_tables() {
        let mut data = vec![0x00];
        let mut counts = [0u8; 16];
        counts[0] = 1;
        counts[1] = 2;
        data.extend_from_slice(&counts);
        data.extend_from_slice(&[0, 1, 2]);
        data.push(0x11);
        data.extend_from_slice(&[0; 16]);

        let tables = read_dht(&mut scoped(&data)).unwrap();
        assert_eq!(tables.as_slice(), &[(TableClass::Dc, 0), (TableClass::Ac, 1)]);

        // The symbols run past the end of the segment.
        assert!(read_dht(&mut scoped(&data[..18])).is_err());

        // Class 2 is undefined.
        let mut bad = vec![0x20];
        bad.extend_from_slice(&[0; 16]);
        assert!(read_dht(&mut scoped(&bad)).is_err());
    }

    #[test]
    fn verify_frame_header() {
        let data = [8, 0, 16, 0, 32, 3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1];

        let frame = FrameHeader::read(&mut scoped(&data)).unwrap();
        assert_eq!((frame.width, frame.height, frame.precision), (32, 16, 8));
        assert_eq!(frame.sampling(), "2x2,1x1,1x1");
        assert!(frame.is_well_formed());

        let mut bad = data;
        bad[7] = 0x51;
        assert!(!FrameHeader::read(&mut scoped(&bad)).unwrap().is_well_formed());
    }

    #[test]
    fn verify_scan_header_length() {
        let good = [2, 1, 0x00, 2, 0x11, 0, 63, 0];
        let scan = ScanHeader::read(&mut scoped(&good)).unwrap();
        assert_eq!(scan.components.len(), 2);
        assert_eq!(scan.components[1], ScanComponent { id: 2, dc_table: 1, ac_table: 1 });
        assert_eq!(scan.se, 63);

        // One byte too many.
        assert!(ScanHeader::read(&mut scoped(&[1, 1, 0x00, 0, 63, 0, 0])).is_err());

        // No components.
        assert!(ScanHeader::read(&mut scoped(&[0, 0, 63, 0])).is_err());
    }

    #[test]
    fn verify_dri_length() {
        assert_eq!(read_dri(&mut scoped(&[0, 16])).unwrap(), 16);
        assert!(read_dri(&mut scoped(&[0, 16, 0])).is_err());
    }
}
