// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::anomaly::{Anomalies, SevereElement};
use keepsake_core::bitstream::{Bitstream, BitstreamKind, Location, Role};
use keepsake_core::errors::{decode_error, Error, Result};
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::probe::{Characterization, FormatInfo, ParseOptions, ProbeDescriptor};

use log::{debug, info, warn};
use smallvec::SmallVec;

use crate::catalog;
use crate::markers::{CodingProcess, Marker};
use crate::segments::*;

const SOI_MARKER: [u8; 2] = [0xff, 0xd8];

pub const JPEG_FORMAT_INFO: FormatInfo = FormatInfo {
    short_name: "jpeg",
    long_name: "JPEG File Interchange Format",
    mime_type: "image/jpeg",
};

/// Registers JPEG with a [`Probe`](keepsake_core::probe::Probe).
pub const DESCRIPTOR: ProbeDescriptor = ProbeDescriptor { info: JPEG_FORMAT_INFO, is_type, parse };

/// Returns `true` if the stream begins with a start-of-image marker followed by another marker.
/// A missing end-of-image marker is left for the parser to report.
pub fn is_type(reader: &mut dyn Cursor) -> Result<bool> {
    let soi = reader.read_double_bytes()?;
    let prefix = reader.read_u8()?;

    Ok(soi == SOI_MARKER && prefix == 0xff)
}

/// Characterizes a JPEG stream, starting from the current position of the stream.
pub fn parse(reader: &mut dyn Cursor, _options: &ParseOptions) -> Result<Characterization> {
    if reader.read_double_bytes()? != SOI_MARKER {
        return decode_error("jpeg: missing start of image marker");
    }

    let mut state = JpegState::default();
    let mut first = true;

    while let Some((prefix, code)) = read_marker(reader)? {
        if prefix != 0xff {
            warn!("jpeg: expected a marker at {}, found {:#04x}", reader.pos() - 2, prefix);
            state.add(catalog::UNKNOWN_MARKER);
            break;
        }

        let marker = Marker::from(code);

        debug!("jpeg: marker {} at {}", marker, reader.pos() - 2);

        // The segment following the start of image determines the variation.
        let is_first = first;
        first = false;

        if is_first && !matches!(marker, Marker::App(_)) {
            state.add(catalog::UNKNOWN_VARIATION);
        }

        match marker {
            Marker::Eoi => {
                state.seen_eoi = true;
                break;
            }
            _ if marker.is_standalone() => continue,
            Marker::Reserved(_) => {
                warn!("jpeg: unknown marker {}", marker);
                state.add(catalog::UNKNOWN_MARKER);
                break;
            }
            _ => (),
        }

        let len = match read_segment_len(reader)? {
            Some(len) => len,
            None => {
                warn!("jpeg: {} segment is malformed or runs past the end of the stream", marker);
                state.add_malformed(marker);
                break;
            }
        };

        match marker {
            Marker::App(n) => state.read_app(reader, n, len, is_first)?,
            Marker::Dqt => {
                if let Some(ids) = read_segment(reader, len, |s| read_dqt(s))? {
                    for id in ids {
                        push_unique(&mut state.quant_tables, id);
                    }
                }
                else {
                    state.add(catalog::BAD_DQT);
                }
            }
            Marker::Dht => {
                if let Some(tables) = read_segment(reader, len, |s| read_dht(s))? {
                    for (class, id) in tables {
                        match class {
                            TableClass::Dc => push_unique(&mut state.dc_tables, id),
                            TableClass::Ac => push_unique(&mut state.ac_tables, id),
                        }
                    }
                }
                else {
                    state.add(catalog::BAD_DHT);
                }
            }
            Marker::Dri => match read_segment(reader, len, |s| read_dri(s))? {
                Some(interval) => state.restart_interval = Some(interval),
                None => state.add(catalog::BAD_DRI),
            },
            Marker::Dnl => {
                state.lines = read_segment(reader, len, |s| read_dnl(s))?;
            }
            Marker::Sof(n) => state.read_frame(reader, n, len)?,
            Marker::Sos => {
                state.read_scan(reader, len)?;

                if !skip_entropy_coded_data(reader)? {
                    warn!("jpeg: entropy coded data runs to the end of the stream");
                    break;
                }
            }
            Marker::Dhp => {
                state.hierarchical = true;
                reader.ignore_bytes(len)?;
            }
            Marker::Com => {
                state.comments += 1;
                reader.ignore_bytes(len)?;
            }
            // DAC, EXP, and the reserved JPG extensions are skipped.
            _ => reader.ignore_bytes(len)?,
        }
    }

    if !state.seen_eoi {
        state.add(catalog::NO_EOI);
    }
    else if reader.remaining() > 0 {
        debug!("jpeg: {} bytes follow the end of image", reader.remaining());
    }

    Ok(state.finish())
}

/// Reads the next marker prefix and code, skipping fill bytes. Returns `None` at the end of the
/// stream.
fn read_marker(reader: &mut dyn Cursor) -> Result<Option<(u8, u8)>> {
    if reader.remaining() < 2 {
        return Ok(None);
    }

    let prefix = reader.read_u8()?;
    let mut code = reader.read_u8()?;

    // Any marker may be preceded by 0xff fill bytes.
    while prefix == 0xff && code == 0xff {
        if reader.remaining() == 0 {
            return Ok(None);
        }
        code = reader.read_u8()?;
    }

    Ok(Some((prefix, code)))
}

/// Reads a segment length, returning the length of the segment's content. Returns `None` if the
/// length is invalid, or the segment runs past the end of the stream.
fn read_segment_len(reader: &mut dyn Cursor) -> Result<Option<u64>> {
    if reader.remaining() < 2 {
        return Ok(None);
    }

    let len = reader.read_be_u16()?;

    // The length counts its own 2 bytes.
    if len < 2 || u64::from(len - 2) > reader.remaining() {
        return Ok(None);
    }

    Ok(Some(u64::from(len - 2)))
}

/// Reads a segment's content with `read`. A segment too short for its fields, or otherwise
/// malformed, is returned as `None`. The reader is always left at the end of the segment.
fn read_segment<'a, T, F>(reader: &'a mut dyn Cursor, len: u64, read: F) -> Result<Option<T>>
where
    F: FnOnce(&mut ScopedStream<&'a mut dyn Cursor>) -> Result<T>,
{
    let mut segment = ScopedStream::new(reader, len);

    let result = read(&mut segment);

    segment.ignore()?;

    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::DecodeError(desc)) => {
            warn!("{}", desc);
            Ok(None)
        }
        Err(err) if err.is_end_of_stream() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Skips entropy-coded data following a scan header, leaving the reader at the next marker.
/// Returns `false` if the stream ended first.
fn skip_entropy_coded_data(reader: &mut dyn Cursor) -> Result<bool> {
    let mut sync = 0u16;

    while reader.remaining() > 0 {
        sync = sync.wrapping_shl(8) | u16::from(reader.read_u8()?);

        if sync & 0xff00 != 0xff00 {
            continue;
        }

        match sync as u8 {
            // A stuffed zero, a fill byte, or a restart marker. None end the scan.
            0x00 | 0xff | 0xd0..=0xd7 => (),
            _ => {
                reader.seek(reader.pos() - 2)?;
                return Ok(true);
            }
        }
    }

    Ok(false)
}

fn push_unique(ids: &mut SmallVec<[u8; 4]>, id: u8) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Variation {
    #[default]
    Unknown,
    Jfif,
    Exif,
    Spiff,
    Adobe,
}

impl Variation {
    fn name(&self) -> &'static str {
        match self {
            Variation::Unknown => "UNKNOWN",
            Variation::Jfif => "JFIF",
            Variation::Exif => "EXIF",
            Variation::Spiff => "SPIFF",
            Variation::Adobe => "ADOBE",
        }
    }
}

/// The first frame of the image.
struct Frame {
    marker: u8,
    process: CodingProcess,
    header: FrameHeader,
}

#[derive(Default)]
struct JpegState {
    anomalies: Anomalies,
    variation: Variation,
    version: Option<String>,
    /// Density units, and the horizontal and vertical density.
    density: Option<(u8, u16, u16)>,
    jfxx: bool,
    adobe_transform: Option<u8>,
    photoshop: bool,
    quant_tables: SmallVec<[u8; 4]>,
    dc_tables: SmallVec<[u8; 4]>,
    ac_tables: SmallVec<[u8; 4]>,
    frame: Option<Frame>,
    frames: usize,
    hierarchical: bool,
    lines: Option<u16>,
    restart_interval: Option<u16>,
    scans: usize,
    comments: usize,
    thumbnails: Vec<Bitstream>,
    seen_eoi: bool,
}

impl JpegState {
    fn add(&mut self, element: SevereElement) {
        if self.anomalies.add(element) {
            warn!("jpeg: {}", element);
        }
    }

    /// Records the anomaly of a segment whose length is unusable.
    fn add_malformed(&mut self, marker: Marker) {
        match marker {
            Marker::Dqt => self.add(catalog::BAD_DQT),
            Marker::Dht => self.add(catalog::BAD_DHT),
            Marker::Dri => self.add(catalog::BAD_DRI),
            Marker::Sof(_) => self.add(catalog::BAD_SOF),
            Marker::Sos => self.add(catalog::BAD_SOS),
            _ => (),
        }
    }

    fn read_app(&mut self, reader: &mut dyn Cursor, n: u8, len: u64, is_first: bool) -> Result<()> {
        // A JFIF APP0 segment holds at least 14 bytes of content.
        if is_first && n == 0 && len < 14 {
            self.add(catalog::INCOMPLETE_APP0);
            reader.ignore_bytes(len)?;
            return Ok(());
        }

        let mut segment = ScopedStream::new(&mut *reader, len);

        let result = self.read_app_content(&mut segment, n, is_first);

        segment.ignore()?;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_end_of_stream() => {
                warn!("jpeg: APP{} segment is too short for its fields", n);
                if n == 0 && self.variation == Variation::Jfif && self.version.is_none() {
                    self.add(catalog::INCOMPLETE_APP0);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn read_app_content<B: ReadBytes>(
        &mut self,
        segment: &mut ScopedStream<B>,
        n: u8,
        is_first: bool,
    ) -> Result<()> {
        let ident = read_app_identifier(segment, n)?;

        debug!("jpeg: APP{} segment identified as {:?}", n, ident);

        match ident {
            AppIdentifier::Jfif if is_first => {
                self.variation = Variation::Jfif;

                let jfif = JfifHeader::read(segment)?;

                self.version = Some(jfif.version_string());
                self.density = Some((jfif.units, jfif.x_density, jfif.y_density));

                if jfif.has_thumbnail() {
                    let mut thumbnail = Bitstream::new(BitstreamKind::Image);
                    thumbnail.role = Role::Preview;
                    thumbnail.encoding = Some("UNCOMPRESSED RGB".to_string());
                    thumbnail.location = Some(Location::FileByteOffset(jfif.thumbnail_pos));
                    thumbnail.width = Some(u32::from(jfif.thumbnail_width));
                    thumbnail.height = Some(u32::from(jfif.thumbnail_height));
                    thumbnail.bits_per_sample = Some(24);
                    thumbnail.channels = Some(3);
                    self.thumbnails.push(thumbnail);
                }
            }
            AppIdentifier::Jfxx if self.variation == Variation::Jfif => {
                self.jfxx = true;

                let ext = JfxxExtension::read(segment)?;

                let (encoding, size, bits, channels) = match ext.thumbnail {
                    Some(JfxxThumbnail::Jpeg) => ("JPEG", None, None, None),
                    Some(JfxxThumbnail::Palette { width, height }) => {
                        ("PALETTE", Some((width, height)), Some(8), Some(1))
                    }
                    Some(JfxxThumbnail::Rgb { width, height }) => {
                        ("UNCOMPRESSED RGB", Some((width, height)), Some(24), Some(3))
                    }
                    None => {
                        warn!("jpeg: unknown jfif extension code {:#04x}", ext.code);
                        self.add(catalog::UNKNOWN_JFIFEXT);
                        return Ok(());
                    }
                };

                let mut thumbnail = Bitstream::new(BitstreamKind::Image);
                thumbnail.role = Role::Preview;
                thumbnail.encoding = Some(encoding.to_string());
                thumbnail.encoding_tag = Some(format!("{:#04x}", ext.code));
                thumbnail.location = Some(Location::FileByteOffset(ext.thumbnail_pos));
                thumbnail.width = size.map(|(w, _)| u32::from(w));
                thumbnail.height = size.map(|(_, h)| u32::from(h));
                thumbnail.bits_per_sample = bits;
                thumbnail.channels = channels;
                self.thumbnails.push(thumbnail);
            }
            AppIdentifier::Exif if is_first => self.variation = Variation::Exif,
            AppIdentifier::Spiff if is_first => {
                self.variation = Variation::Spiff;

                let spiff = SpiffHeader::read(segment)?;

                debug!(
                    "jpeg: spiff profile={}, components={}, {}x{}",
                    spiff.profile, spiff.n_components, spiff.width, spiff.height
                );

                self.version = Some(format!("{}.{:02}", spiff.version.0, spiff.version.1));
            }
            AppIdentifier::Photoshop => {
                self.photoshop = true;
                if is_first {
                    self.variation = Variation::Adobe;
                }
            }
            AppIdentifier::Adobe => {
                if is_first {
                    self.variation = Variation::Adobe;
                }
                self.adobe_transform = Some(read_adobe_transform(segment)?);
            }
            _ => {
                if is_first {
                    self.add(catalog::UNKNOWN_VARIATION);
                }
            }
        }

        Ok(())
    }

    fn read_frame(&mut self, reader: &mut dyn Cursor, n: u8, len: u64) -> Result<()> {
        self.frames += 1;

        // Every SOF code other than DHT, JPG and DAC declares a process.
        let process = match CodingProcess::from_frame_type(n) {
            Some(process) => process,
            None => {
                reader.ignore_bytes(len)?;
                self.add(catalog::BAD_SOF);
                return Ok(());
            }
        };

        if process.differential {
            self.hierarchical = true;
        }

        let header = match read_segment(reader, len, |s| FrameHeader::read(s))? {
            Some(header) => header,
            None => {
                self.add(catalog::BAD_SOF);
                return Ok(());
            }
        };

        if !header.is_well_formed() || !process.is_valid_precision(header.precision) {
            self.add(catalog::BAD_SOF);
        }

        // Lossless frames do not use quantization tables.
        if !process.is_lossless() {
            for component in &header.components {
                if !self.quant_tables.contains(&component.quant_table) {
                    warn!(
                        "jpeg: component {} uses undefined quantization table {}",
                        component.id, component.quant_table
                    );
                    self.add(catalog::MISSING_DQT);
                }
            }
        }

        debug!(
            "jpeg: frame process={}, {}x{}, precision={}, components={}",
            process.name(),
            header.width,
            header.height,
            header.precision,
            header.components.len()
        );

        if self.frame.is_none() {
            self.frame = Some(Frame { marker: n, process, header });
        }

        Ok(())
    }

    fn read_scan(&mut self, reader: &mut dyn Cursor, len: u64) -> Result<()> {
        self.scans += 1;

        let scan = match read_segment(reader, len, |s| ScanHeader::read(s))? {
            Some(scan) => scan,
            None => {
                self.add(catalog::BAD_SOS);
                return Ok(());
            }
        };

        let frame = match &self.frame {
            Some(frame) => frame,
            None => {
                warn!("jpeg: scan precedes the frame header");
                self.add(catalog::BAD_SOS);
                return Ok(());
            }
        };

        let process = frame.process;

        debug!(
            "jpeg: scan components={}, ss={}, se={}, ah_al={:#04x}",
            scan.components.len(),
            scan.ss,
            scan.se,
            scan.ah_al
        );

        // Which entropy tables a scan uses depends on the process. A lossless scan codes
        // differences with the DC tables only, and progressive scans code either the DC or the AC
        // coefficients.
        let uses_dc = process.is_lossless() || scan.ss == 0;
        let uses_ac = !process.is_lossless() && scan.se > 0;

        let mut well_formed = true;

        for component in &scan.components {
            if !frame.header.components.iter().any(|c| c.id == component.id) {
                warn!("jpeg: scan component {} is not in the frame", component.id);
                well_formed = false;
            }

            // Arithmetic coding conditioning tables have defaults, so need not be declared.
            if process.arithmetic {
                continue;
            }

            if uses_dc && !self.dc_tables.contains(&component.dc_table) {
                warn!("jpeg: scan uses undefined dc table {}", component.dc_table);
                well_formed = false;
            }

            if uses_ac && !self.ac_tables.contains(&component.ac_table) {
                warn!("jpeg: scan uses undefined ac table {}", component.ac_table);
                well_formed = false;
            }
        }

        if !well_formed {
            self.add(catalog::BAD_SOS);
        }

        Ok(())
    }

    fn finish(self) -> Characterization {
        let mut result = Characterization::new(JPEG_FORMAT_INFO);

        result.version = self.version;
        result.set_attribute("variation", self.variation.name());

        if let Some(frame) = &self.frame {
            let header = &frame.header;
            let n_components = header.components.len() as u32;

            let mut image = Bitstream::new(BitstreamKind::Image);
            image.encoding = Some(frame.process.name());
            image.encoding_tag = Some(format!("SOF{}", frame.marker));
            image.location = Some(Location::FileByteOffset(0));
            image.width = Some(u32::from(header.width));
            // A frame may defer its number of lines to a DNL segment after the first scan.
            image.height = match (header.height, self.lines) {
                (0, Some(lines)) => Some(u32::from(lines)),
                (height, _) => Some(u32::from(height)),
            };
            image.channels = Some(n_components);
            image.bits_per_sample = Some(u32::from(header.precision) * n_components);

            result.bitstreams.push(image);

            result.set_attribute("process", frame.process.name());
            result.set_attribute("precision", header.precision);
            result.set_attribute("sampling", header.sampling());

            if self.variation == Variation::Jfif {
                match n_components {
                    1 => result.set_attribute("color_space", "Y"),
                    3 => result.set_attribute("color_space", "YCbCr"),
                    _ => warn!("jpeg: jfif image with {} components", n_components),
                }
            }
        }

        result.bitstreams.extend(self.thumbnails);

        if let Some((units, x_density, y_density)) = self.density {
            let units = match units {
                0 => "aspect_ratio",
                1 => "dots_per_inch",
                2 => "dots_per_cm",
                _ => "unknown",
            };
            result.set_attribute("density_units", units);
            result.set_attribute("x_density", x_density);
            result.set_attribute("y_density", y_density);
        }

        if let Some(interval) = self.restart_interval {
            result.set_attribute("restart_interval", interval);
        }

        if let Some(transform) = self.adobe_transform {
            result.set_attribute("adobe_transform", transform);
        }

        result.set_attribute("has_jfxx_extension", self.jfxx);
        result.set_attribute("is_adobe_ps_3", self.photoshop);
        result.set_attribute("is_hierarchical", self.hierarchical);
        result.set_attribute("has_comment", self.comments > 0);
        result.set_attribute("frame_count", self.frames);
        result.set_attribute("scan_count", self.scans);

        info!(
            "jpeg: {} variation, {} frame(s), {} scan(s), {} thumbnail(s), {} anomalies",
            self.variation.name(),
            self.frames,
            self.scans,
            result.bitstreams.len().saturating_sub(usize::from(self.frame.is_some())),
            self.anomalies.anomalies().len()
        );

        result.anomalies = self.anomalies;
        result
    }
}

#[cfg(test)]
mod tests {
    use keepsake_core::io::BufReader;

    use super::*;

    fn segment(code: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = vec![0xff, code];
        buf.extend_from_slice(&((data.len() + 2) as u16).to_be_bytes());
        buf.extend_from_slice(data);
        buf
    }

    fn jfif_app0(thumbnail: (u8, u8)) -> Vec<u8> {
        let mut data = b"JFIF\0".to_vec();
        data.extend_from_slice(&[1, 2, 1, 0, 72, 0, 72, thumbnail.0, thumbnail.1]);
        data.extend(std::iter::repeat(0).take(3 * thumbnail.0 as usize * thumbnail.1 as usize));
        segment(0xe0, &data)
    }

    fn dqt() -> Vec<u8> {
        let mut data = vec![0x00];
        data.extend_from_slice(&[1; 64]);
        segment(0xdb, &data)
    }

    fn dht(class_id: u8) -> Vec<u8> {
        let mut data = vec![class_id, 1];
        data.extend_from_slice(&[0; 15]);
        data.push(0);
        segment(0xc4, &data)
    }

    /// A single component 8-bit baseline frame of 16x8 pixels.
    fn sof0(quant_table: u8) -> Vec<u8> {
        segment(0xc0, &[8, 0, 8, 0, 16, 1, 1, 0x11, quant_table])
    }

    fn sos(component: u8) -> Vec<u8> {
        segment(0xda, &[1, component, 0x00, 0, 63, 0])
    }

    /// A minimal JFIF baseline image, with `scan` as its entropy-coded data.
    fn baseline(scan: &[u8]) -> Vec<u8> {
        [
            vec![0xff, 0xd8],
            jfif_app0((0, 0)),
            dqt(),
            dht(0x00),
            dht(0x10),
            sof0(0),
            sos(1),
            scan.to_vec(),
            vec![0xff, 0xd9],
        ]
        .concat()
    }

    fn characterize(data: &[u8]) -> Characterization {
        let mut reader = BufReader::new(data);
        assert!(is_type(&mut reader).unwrap());
        reader.seek(0).unwrap();
        parse(&mut reader, &ParseOptions::default()).unwrap()
    }

    fn codes(result: &Characterization) -> Vec<&'static str> {
        result.anomalies.iter().map(|el| el.code).collect()
    }

    #[test]
    fn verify_is_type() {
        let mut reader = BufReader::new(&[0xff, 0xd8, 0xff, 0xe0]);
        assert!(is_type(&mut reader).unwrap());

        let mut reader = BufReader::new(&[0xff, 0xd9, 0xff, 0xe0]);
        assert!(!is_type(&mut reader).unwrap());

        let mut reader = BufReader::new(&[0xff, 0xd8]);
        assert!(is_type(&mut reader).is_err());
    }

    #[test]
    fn verify_jfif_baseline() {
        let result = characterize(&baseline(&[0x12, 0x34, 0x56]));

        assert!(codes(&result).is_empty());
        assert_eq!(result.version.as_deref(), Some("1.02"));
        assert_eq!(result.attributes["variation"], "JFIF");
        assert_eq!(result.attributes["process"], "BASELINE");
        assert_eq!(result.attributes["sampling"], "1x1");
        assert_eq!(result.attributes["color_space"], "Y");
        assert_eq!(result.attributes["density_units"], "dots_per_inch");
        assert_eq!(result.attributes["x_density"], "72");
        assert_eq!(result.attributes["scan_count"], "1");

        assert_eq!(result.bitstreams.len(), 1);
        let image = &result.bitstreams[0];
        assert_eq!(image.kind, BitstreamKind::Image);
        assert_eq!((image.width, image.height), (Some(16), Some(8)));
        assert_eq!(image.bits_per_sample, Some(8));
        assert_eq!(image.encoding_tag.as_deref(), Some("SOF0"));
    }

    #[test]
    fn verify_stuffing_and_restarts_are_not_boundaries() {
        // Stuffed zeros and restart markers inside the scan, then a fill byte before EOI.
        let scan = [0x01, 0xff, 0x00, 0x02, 0xff, 0xd0, 0x03, 0xff, 0xd7, 0x04, 0xff];
        let result = characterize(&baseline(&scan));

        assert!(codes(&result).is_empty());
        assert_eq!(result.attributes["scan_count"], "1");

        // The scan ends at the first true marker.
        let data = [0x01, 0xff, 0x00, 0xff, 0xd9, 0xaa];
        let mut reader = BufReader::new(&data);
        assert!(skip_entropy_coded_data(&mut reader).unwrap());
        assert_eq!(reader.pos(), 3);

        let mut reader = BufReader::new(&[0xff, 0x00, 0xff, 0xd1]);
        assert!(!skip_entropy_coded_data(&mut reader).unwrap());
    }

    #[test]
    fn verify_missing_eoi() {
        let mut data = baseline(&[0x12]);
        data.truncate(data.len() - 2);

        let result = characterize(&data);
        assert_eq!(codes(&result), vec!["A_JPEG_NO_EOI"]);
    }

    #[test]
    fn verify_jfif_thumbnail() {
        let mut data = vec![0xff, 0xd8];
        data.extend(jfif_app0((2, 1)));
        data.extend_from_slice(&[0xff, 0xd9]);

        let result = characterize(&data);

        assert_eq!(result.bitstreams.len(), 1);
        let thumbnail = &result.bitstreams[0];
        assert_eq!(thumbnail.role, Role::Preview);
        assert_eq!((thumbnail.width, thumbnail.height), (Some(2), Some(1)));
        // SOI, APP0 marker and length, identifier, then 7 bytes of header.
        assert_eq!(thumbnail.location, Some(Location::FileByteOffset(2 + 4 + 5 + 7)));
    }

    #[test]
    fn verify_jfif_extensions() {
        let mut data = vec![0xff, 0xd8];
        data.extend(jfif_app0((0, 0)));
        data.extend(segment(0xe0, b"JFXX\0\x13\x01\x01\x00\x00\x00"));
        data.extend(segment(0xe0, b"JFXX\0\x42"));
        data.extend_from_slice(&[0xff, 0xd9]);

        let result = characterize(&data);

        assert_eq!(codes(&result), vec!["A_JPEG_UNKNOWN_JFIFEXT"]);
        assert!(result.has_attribute("has_jfxx_extension"));
        assert_eq!(result.bitstreams.len(), 1);
        assert_eq!(result.bitstreams[0].encoding.as_deref(), Some("UNCOMPRESSED RGB"));
    }

    #[test]
    fn verify_variations() {
        let variation = |app: Vec<u8>| {
            let data = [vec![0xff, 0xd8], app, vec![0xff, 0xd9]].concat();
            let result = characterize(&data);
            (result.attributes["variation"].clone(), codes(&result))
        };

        assert_eq!(variation(segment(0xe1, b"Exif\0\0MM\0*")), ("EXIF".to_string(), vec![]));
        assert_eq!(
            variation(segment(0xe8, b"SPIFF\0\x02\x00\x00\x03\0\0\0\x08\0\0\0\x10")),
            ("SPIFF".to_string(), vec![])
        );
        assert_eq!(
            variation(segment(0xe2, b"ICC_PROFILE\0")),
            ("UNKNOWN".to_string(), vec!["A_JPEG_UNKNOWN_VARIATION"])
        );
        assert_eq!(
            variation(segment(0xe0, b"JFIF\0\x01")),
            ("UNKNOWN".to_string(), vec!["A_JPEG_INCOMPLETE_APP0"])
        );
        assert_eq!(
            variation(dqt()),
            ("UNKNOWN".to_string(), vec!["A_JPEG_UNKNOWN_VARIATION"])
        );
    }

    #[test]
    fn verify_undefined_tables() {
        // The frame refers to quantization table 1, and the scan to component 2.
        let data = [
            vec![0xff, 0xd8],
            jfif_app0((0, 0)),
            dqt(),
            dht(0x00),
            dht(0x10),
            sof0(1),
            sos(2),
            vec![0x00, 0xff, 0xd9],
        ]
        .concat();

        let result = characterize(&data);
        assert_eq!(codes(&result), vec!["A_JPEG_MISSING_DQT", "A_JPEG_BAD_SOS"]);
    }

    #[test]
    fn verify_malformed_segments() {
        let data = [
            vec![0xff, 0xd8],
            jfif_app0((0, 0)),
            segment(0xdb, &[0x20, 0, 0]),
            segment(0xc4, &[0x00, 1]),
            segment(0xdd, &[0, 1, 0]),
            segment(0xc1, &[16, 0, 8, 0, 8, 1, 1, 0x11]),
            vec![0xff, 0xd9],
        ]
        .concat();

        let result = characterize(&data);
        assert_eq!(
            codes(&result),
            vec!["A_JPEG_BAD_DQT", "A_JPEG_BAD_DHT", "A_JPEG_BAD_DRI", "A_JPEG_BAD_SOF"]
        );
    }

    #[test]
    fn verify_unknown_marker_stops_parse() {
        let data = [vec![0xff, 0xd8], jfif_app0((0, 0)), vec![0xff, 0x02, 0xff, 0xd9]].concat();

        let result = characterize(&data);
        assert_eq!(codes(&result), vec!["A_JPEG_UNKNOWN_MARKER", "A_JPEG_NO_EOI"]);
    }

    #[test]
    fn verify_progressive_scans() {
        // A DC-only scan needs no AC table, and an AC scan no DC table.
        let data = [
            vec![0xff, 0xd8],
            jfif_app0((0, 0)),
            dqt(),
            dht(0x00),
            segment(0xc2, &[8, 0, 8, 0, 8, 1, 1, 0x11, 0]),
            segment(0xda, &[1, 1, 0x05, 0, 0, 0]),
            vec![0x00],
            dht(0x10),
            segment(0xda, &[1, 1, 0x30, 1, 63, 0]),
            vec![0x00, 0xff, 0xd9],
        ]
        .concat();

        let result = characterize(&data);

        assert!(codes(&result).is_empty());
        assert_eq!(result.attributes["process"], "PROG");
        assert_eq!(result.attributes["scan_count"], "2");
    }
}
