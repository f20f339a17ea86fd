// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::bitstream::{Bitstream, BitstreamKind, Location};
use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::Cursor;
use keepsake_core::probe::{Characterization, FormatInfo, ParseOptions, ProbeDescriptor};
use keepsake_core::unit::fourcc_to_string;

use log::{debug, info, warn};

use crate::boxes::{check_malformation, read_leaf, BoxIterator, BoxType};
use crate::boxes::{FtypBox, Jp2cBox, Jp2hBox};
use crate::catalog;
use crate::context::{ImageFlags, ParseContext};

/// The length of the signature box.
const SIGNATURE_BOX_LEN: u32 = 12;

/// The content of the signature box.
const SIGNATURE: u32 = 0x0d0a_870a;

pub const JP2_FORMAT_INFO: FormatInfo = FormatInfo {
    short_name: "jp2",
    long_name: "JPEG 2000 Part 1 (JP2)",
    mime_type: "image/jp2",
};

/// Registers JP2 with a [`Probe`](keepsake_core::probe::Probe).
pub const DESCRIPTOR: ProbeDescriptor = ProbeDescriptor { info: JP2_FORMAT_INFO, is_type, parse };

const IMAGE_ATTRIBUTES: &[(&str, ImageFlags)] = &[
    ("has_ipr", ImageFlags::HAS_IPR),
    ("color_unknown", ImageFlags::COLOR_UNKNOWN),
    ("has_signed_components", ImageFlags::SIGNED_COMPONENTS),
    ("has_icc_profile", ImageFlags::HAS_ICC_PROFILE),
    ("has_palette", ImageFlags::HAS_PALETTE),
    ("has_component_mapping", ImageFlags::HAS_COMPONENT_MAPPING),
    ("has_channel_definition", ImageFlags::HAS_CHANNEL_DEFINITION),
    ("has_resolution", ImageFlags::HAS_RESOLUTION),
    ("has_xml", ImageFlags::HAS_XML),
    ("has_uuid", ImageFlags::HAS_UUID),
];

/// Returns `true` if the stream begins with a JP2 signature box immediately followed by a file
/// type box.
pub fn is_type(reader: &mut dyn Cursor) -> Result<bool> {
    if reader.read_be_u32()? != SIGNATURE_BOX_LEN
        || &reader.read_quad_bytes()? != b"jP  "
        || reader.read_be_u32()? != SIGNATURE
    {
        return Ok(false);
    }

    let _len = reader.read_be_u32()?;

    Ok(&reader.read_quad_bytes()? == b"ftyp")
}

/// Characterizes a JP2 image, starting from the current position of the stream.
pub fn parse(reader: &mut dyn Cursor, _options: &ParseOptions) -> Result<Characterization> {
    let mut ctx = ParseContext::default();
    let mut iter = BoxIterator::new_root(reader);

    match iter.next()? {
        Some(header) if header.unit_type() == BoxType::Signature && header.data_len() == 4 => {
            if iter.inner_mut().read_be_u32()? != SIGNATURE {
                return decode_error("jp2: invalid signature");
            }
        }
        _ => return decode_error("jp2: missing signature box"),
    }

    let mut ftyp = None;
    let mut jp2h = None;
    let mut jp2c = None;

    let mut index = 1;

    while let Some(header) = iter.next()? {
        let box_type = header.unit_type();

        // The file type box must immediately follow the signature box.
        if index == 1 && box_type != BoxType::FileType {
            warn!("jp2: second box is {}, not ftyp", header);
            ctx.add(catalog::BAD_LOC_BOX);
        }
        index += 1;

        match box_type {
            BoxType::FileType => {
                if ftyp.is_none() {
                    ftyp = read_leaf::<FtypBox, _>(&mut iter, &mut ctx, catalog::BAD_FTYPBOX)?;
                }
                else {
                    warn!("jp2: ignoring additional ftyp box");
                }
            }
            BoxType::Jp2Header => {
                if jp2c.is_some() {
                    warn!("jp2: header box follows the codestream");
                    ctx.add(catalog::BAD_LOC_BOX);
                }

                if jp2h.is_none() {
                    jp2h = Some(iter.read_unit::<Jp2hBox, _>(&mut ctx)?);
                }
                else {
                    warn!("jp2: ignoring additional jp2h box");
                }
            }
            BoxType::ContiguousCodestream => {
                // Readers only decode the first codestream.
                if jp2c.is_none() {
                    jp2c = Some(iter.read_unit::<Jp2cBox, _>(&mut ctx)?);
                }
                else {
                    debug!("jp2: skipping additional codestream {}", header);
                }
            }
            BoxType::Xml => ctx.flags |= ImageFlags::HAS_XML,
            BoxType::Uuid | BoxType::UuidInfo => ctx.flags |= ImageFlags::HAS_UUID,
            BoxType::IntellectualProperty => ctx.flags |= ImageFlags::HAS_IPR,
            _ => debug!("jp2: skipping box {}", header),
        }
    }

    check_malformation(&iter, &mut ctx, catalog::BAD_BOX_LENGTH);

    if jp2h.is_none() {
        ctx.add(catalog::NO_JP2HBOX);
    }

    if jp2c.is_none() {
        ctx.add(catalog::NO_JP2CBOX);
    }

    let mut result = Characterization::new(JP2_FORMAT_INFO);

    if let Some(ftyp) = &ftyp {
        result.version = ftyp.version();
        result.set_attribute("brand", fourcc_to_string(&ftyp.brand));

        let compatibility: Vec<String> = ftyp.compatibility.iter().map(fourcc_to_string).collect();
        result.set_attribute("compatibility", compatibility.join(","));
    }

    if let Some(jp2h) = &jp2h {
        if let Some(colr) = &jp2h.colr {
            if let Some(method) = colr.method {
                result.set_attribute("color_method", method.name());
            }
            if let Some(name) = colr.colorspace_name() {
                result.set_attribute("color_space", name);
            }
        }

        if let Some(res) = &jp2h.res {
            if let Some(capture) = res.capture {
                let value = format!("{:.2}x{:.2}", capture.horizontal, capture.vertical);
                result.set_attribute("capture_resolution", value);
            }
            if let Some(display) = res.display {
                let value = format!("{:.2}x{:.2}", display.horizontal, display.vertical);
                result.set_attribute("display_resolution", value);
            }
        }
    }

    if let Some(jp2c) = &jp2c {
        result.set_attribute("codestream_length", jp2c.len);

        if let Some(siz) = &jp2c.siz {
            result.set_attribute("tile_size", format!("{}x{}", siz.tile_width, siz.tile_height));
        }
    }

    for &(name, flag) in IMAGE_ATTRIBUTES {
        result.set_attribute(name, ctx.flags.contains(flag));
    }

    if let Some(jp2c) = &jp2c {
        result.bitstreams.push(image_bitstream(jp2h.as_ref(), jp2c));
    }

    result.anomalies = ctx.anomalies;

    info!(
        "jp2: {} bitstream(s), {} anomalies, {} limitations",
        result.bitstreams.len(),
        result.anomalies.anomalies().len(),
        result.anomalies.limitations().len()
    );

    Ok(result)
}

/// Describes the image coded by the codestream. The header box is authoritative, and the
/// codestream's main header fills in what the header box lacks.
fn image_bitstream(jp2h: Option<&Jp2hBox>, jp2c: &Jp2cBox) -> Bitstream {
    let mut image = Bitstream::new(BitstreamKind::Image);

    image.encoding = Some("JPEG 2000".to_string());
    image.encoding_tag = Some("jp2c".to_string());
    image.location = Some(Location::FileByteOffset(jp2c.offset));

    let ihdr = jp2h.and_then(|jp2h| jp2h.ihdr.as_ref());
    let siz = jp2c.siz.as_ref();

    image.width = ihdr.map(|ihdr| ihdr.width).or(siz.map(|siz| siz.width));
    image.height = ihdr.map(|ihdr| ihdr.height).or(siz.map(|siz| siz.height));
    image.channels = ihdr
        .map(|ihdr| u32::from(ihdr.n_components))
        .or(siz.map(|siz| siz.components.len() as u32));
    image.bits_per_sample =
        jp2h.and_then(Jp2hBox::total_bits).or(siz.and_then(|siz| siz.total_bits()));

    image
}

#[cfg(test)]
mod tests {
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
    fn verify_is_type() {
        let data = rgb_image();
        assert!(is_type(&mut BufReader::new(&data)).unwrap());

        // A signature box that is not followed by the file type box.
        let data = file(&[signature(), simple_jp2h(1, 1, 1)]);
        assert!(!is_type(&mut BufReader::new(&data)).unwrap());

        let data = b"\x00\x00\x00\x0cjP  \x0d\x0a\x87\x0b\x00\x00\x00\x14ftyp";
        assert!(!is_type(&mut BufReader::new(data)).unwrap());
    }

    #[test]
    fn verify_rgb_image() {
        let data = rgb_image();
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert_eq!(result.version.as_deref(), Some("1.0"));
        assert_eq!(result.attributes["brand"], "jp2 ");
        assert_eq!(result.attributes["color_method"], "enumerated");
        assert_eq!(result.attributes["color_space"], "sRGB");
        assert!(!result.has_attribute("has_palette"));

        assert_eq!(result.bitstreams.len(), 1);
        let image = &result.bitstreams[0];
        assert_eq!(image.kind, BitstreamKind::Image);
        assert_eq!(image.width, Some(64));
        assert_eq!(image.height, Some(48));
        assert_eq!(image.channels, Some(3));
        assert_eq!(image.bits_per_sample, Some(24));
        assert_eq!(image.encoding_tag.as_deref(), Some("jp2c"));

        // The codestream follows the signature, file type and header boxes, and its box header.
        let offset = (data.len() - jp2c(64, 48, 3).len() + 8) as u64;
        assert_eq!(image.location, Some(Location::FileByteOffset(offset)));
        assert_eq!(result.attributes["tile_size"], "64x48");
    }

    #[test]
    fn verify_missing_signature_is_fatal() {
        let data = file(&[ftyp(0, &[b"jp2 "]), simple_jp2h(1, 1, 1), jp2c(1, 1, 1)]);
        let mut reader = BufReader::new(&data);
        assert!(parse(&mut reader, &ParseOptions::default()).is_err());
    }

    #[test]
    fn verify_file_type_rules() {
        let data = file(&[signature(), ftyp(1, &[b"jpx "]), simple_jp2h(8, 8, 1), jp2c(8, 8, 1)]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_JPEG2K_UNK_MIN_VERSION", "A_JP2_NONCOMPAT_JP2"]);
        assert_eq!(result.version.as_deref(), Some("1.1"));
        assert_eq!(result.attributes["compatibility"], "jpx ");
        // Parsing continues after an incompatible file type.
        assert_eq!(result.bitstreams.len(), 1);
    }

    #[test]
    fn verify_box_order() {
        // The codestream precedes the header box, and the file type box is not second.
        let data = file(&[
            signature(),
            jp2_box(b"xml ", b"<a/>"),
            ftyp(0, &[b"jp2 "]),
            jp2c(8, 8, 1),
            simple_jp2h(8, 8, 1),
        ]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_JPEG2K_BAD_LOC_BOX"]);
        assert!(result.has_attribute("has_xml"));
        assert_eq!(result.bitstreams[0].width, Some(8));
    }

    #[test]
    fn verify_missing_boxes() {
        let data = file(&[signature(), ftyp(0, &[b"jp2 "])]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_JP2_NO_JP2HBOX", "A_JP2_NO_JP2CBOX"]);
        assert!(result.bitstreams.is_empty());
    }

    #[test]
    fn verify_header_rules() {
        // The colour specification boxes are split, and the header does not lead.
        let header = jp2h(&[
            colr_enumerated(16),
            ihdr(8, 8, 3, 7),
            colr_icc(),
            jp2_box(b"abcd", &[0; 4]),
        ]);
        let data = file(&[signature(), ftyp(0, &[b"jp2 "]), header, jp2c(8, 8, 3)]);
        let result = characterize(&data);

        assert_eq!(
            codes(&result),
            ["A_JPEG2K_BAD_LOC_BOX", "A_JP2_NONCONTIG_COLRBOX", "A_JPEG2K_UNK_BOXTYPE"]
        );
        // Only the first colour specification is read.
        assert_eq!(result.attributes["color_space"], "sRGB");
        assert!(!result.has_attribute("has_icc_profile"));
    }

    #[test]
    fn verify_missing_colour_and_depths() {
        // Component depths vary, without a bits per component box.
        let data = file(&[
            signature(),
            ftyp(0, &[b"jp2 "]),
            jp2h(&[ihdr(8, 8, 3, 0xff)]),
            jp2c(8, 8, 3),
        ]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_JPEG2K_NO_COLRBOX", "A_JPEG2K_NO_BPCBOX"]);
        // The codestream provides the depths instead.
        assert_eq!(result.bitstreams[0].bits_per_sample, Some(24));

        let data = file(&[
            signature(),
            ftyp(0, &[b"jp2 "]),
            jp2h(&[ihdr(8, 8, 3, 0xff), bpcc(&[7, 3, 3]), colr_enumerated(18)]),
            jp2c(8, 8, 3),
        ]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert_eq!(result.bitstreams[0].bits_per_sample, Some(16));
        assert_eq!(result.attributes["color_space"], "sYCC");
    }

    #[test]
    fn verify_palette() {
        let header = jp2h(&[ihdr(8, 8, 1, 7), colr_enumerated(16), pclr(16, 3), cmap(3)]);
        let data = file(&[signature(), ftyp(0, &[b"jp2 "]), header, jp2c(8, 8, 1)]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert!(result.has_attribute("has_palette"));
        assert!(result.has_attribute("has_component_mapping"));

        let header = jp2h(&[ihdr(8, 8, 1, 7), colr_enumerated(16), pclr(16, 3)]);
        let data = file(&[signature(), ftyp(0, &[b"jp2 "]), header, jp2c(8, 8, 1)]);
        assert_eq!(codes(&characterize(&data)), ["A_JPEG2K_NO_CMAPBOX"]);

        let header = jp2h(&[ihdr(8, 8, 1, 7), colr_enumerated(16), pclr(0, 3), cmap(3)]);
        let data = file(&[signature(), ftyp(0, &[b"jp2 "]), header, jp2c(8, 8, 1)]);
        assert_eq!(codes(&characterize(&data)), ["A_JPEG2K_BAD_PCLRBOX"]);
    }

    #[test]
    fn verify_resolution() {
        let header = jp2h(&[ihdr(8, 8, 1, 7), colr_enumerated(17), res()]);
        let data = file(&[signature(), ftyp(0, &[b"jp2 "]), header, jp2c(8, 8, 1)]);
        let result = characterize(&data);

        assert!(result.anomalies.is_empty(), "{:?}", codes(&result));
        assert!(result.has_attribute("has_resolution"));
        assert_eq!(result.attributes["capture_resolution"], "2835.00x2835.00");

        let header = jp2h(&[ihdr(8, 8, 1, 7), superbox(b"res ", &[]), colr_enumerated(17)]);
        let data = file(&[signature(), ftyp(0, &[b"jp2 "]), header, jp2c(8, 8, 1)]);
        assert_eq!(codes(&characterize(&data)), ["A_JPEG2K_BAD_RES0BOX"]);
    }

    #[test]
    fn verify_bad_image_header() {
        let mut header = ihdr(0, 8, 1, 7);
        // Compression type.
        header[8 + 11] = 1;

        let data = file(&[
            signature(),
            ftyp(0, &[b"jp2 "]),
            jp2h(&[header, colr_enumerated(17)]),
            jp2c(8, 8, 1),
        ]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_JPEG2K_BAD_IHDRBOX"]);
        // The header box still provides the declared width.
        assert_eq!(result.bitstreams[0].width, Some(0));
    }

    #[test]
    fn verify_bad_codestream() {
        let data = file(&[
            signature(),
            ftyp(0, &[b"jp2 "]),
            simple_jp2h(8, 8, 1),
            jp2_box(b"jp2c", &[0xff, 0x4f, 0xff, 0x90]),
        ]);
        let result = characterize(&data);

        assert_eq!(codes(&result), ["A_JPEG2K_BAD_JP2CBOX"]);
        assert_eq!(result.bitstreams[0].width, Some(8));
        assert!(!result.attributes.contains_key("tile_size"));
    }

    #[test]
    fn verify_bad_box_length() {
        let mut data = rgb_image();
        // Declare a trailing box larger than the file.
        data.extend_from_slice(&jp2_box(b"xml ", b"<a/>"));
        let len = data.len();
        data[len - 12..len - 8].copy_from_slice(&1000u32.to_be_bytes());

        let result = characterize(&data);
        assert_eq!(codes(&result), ["A_JPEG2K_BAD_BOX_LENGTH"]);
        assert!(!result.has_attribute("has_xml"));
    }
}
