// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Project Keepsake
//!
//! Keepsake characterizes container files for a digital preservation archive. It identifies a
//! file's format from its bytes, walks its structure, and reports the bitstreams it carries
//! together with every structural anomaly found along the way. The archive then decides, from the
//! severity of those anomalies, at what level the file can be preserved.
//!
//! QuickTime movies that reference external media can additionally be localized: rewritten so
//! that they no longer depend on files outside the archive.
//!
//! # Support
//!
//! | Format    | Feature Flag | Default |
//! |-----------|--------------|---------|
//! | JP2       | `jp2`        | Yes     |
//! | JPEG      | `jpeg`       | Yes     |
//! | QuickTime | `qt`         | Yes     |
//! | WAVE      | `wav`        | Yes     |
//!
//! # Usage
//!
//! The [`characterize_file`] function probes and parses a file in one step. For finer control,
//! get the [`default::get_probe`], find the format of a stream with
//! [`Probe::format`](core::probe::Probe::format), and call the format's parser directly.

#[cfg(feature = "qt")]
use std::fs::File;
#[cfg(feature = "qt")]
use std::io::BufWriter;
use std::path::Path;

use keepsake_core::errors::{unsupported_error, Result};
use keepsake_core::io::SourceStream;
use keepsake_core::probe::{Characterization, ParseOptions};

use log::debug;
#[cfg(feature = "qt")]
use log::info;

pub mod default {
    //! The `default` module provides a probe with every enabled format pre-registered.

    pub mod formats {
        //! The `formats` module re-exports the probe descriptors of all enabled formats.

        #[cfg(feature = "jp2")]
        pub use keepsake_format_jp2::DESCRIPTOR as JP2;
        #[cfg(feature = "jpeg")]
        pub use keepsake_format_jpeg::DESCRIPTOR as JPEG;
        #[cfg(feature = "qt")]
        pub use keepsake_format_qt::DESCRIPTOR as QUICKTIME;
        #[cfg(feature = "wav")]
        pub use keepsake_format_riff::DESCRIPTOR as WAVE;
    }

    use lazy_static::lazy_static;

    use keepsake_core::probe::Probe;

    lazy_static! {
        static ref PROBE: Probe = {
            let mut probe: Probe = Default::default();
            register_enabled_formats(&mut probe);
            probe
        };
    }

    /// Gets the default `Probe`. This probe pre-registers all the formats selected by the
    /// `feature` flags in the includer's `Cargo.toml`.
    ///
    /// This function is lazy and does not instantiate the `Probe` until the first call to this
    /// function.
    pub fn get_probe() -> &'static Probe {
        &PROBE
    }

    /// Registers all the formats selected by the `feature` flags in the includer's `Cargo.toml` on
    /// the provided `Probe`.
    ///
    /// Formats with a weak signature are registered last. A JPEG stream is identified by its
    /// first three bytes alone, so every other format gets the first look.
    pub fn register_enabled_formats(probe: &mut Probe) {
        #[cfg(feature = "qt")]
        probe.register(formats::QUICKTIME);

        #[cfg(feature = "wav")]
        probe.register(formats::WAVE);

        #[cfg(feature = "jp2")]
        probe.register(formats::JP2);

        #[cfg(feature = "jpeg")]
        probe.register(formats::JPEG);
    }
}

pub use keepsake_core as core;

#[cfg(feature = "qt")]
pub use keepsake_format_qt::localize;

/// Identifies the format of the file at `path` and characterizes it.
///
/// A file that no enabled format recognizes is an `Unsupported` error.
pub fn characterize_file<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> Result<Characterization> {
    let mut stream = SourceStream::open(path)?;

    let descriptor = match default::get_probe().format(&mut stream)? {
        Some(descriptor) => descriptor,
        None => return unsupported_error("keepsake: unrecognized format"),
    };

    debug!("keepsake: parsing as {}", descriptor.info.long_name);

    (descriptor.parse)(&mut stream, options)
}

/// Rewrites the QuickTime movie at `input` into `output`, replacing the external data references
/// that `resolver` resolves. Returns the number of bytes written.
///
/// The input must be a QuickTime movie. `output` is created, or truncated if it exists.
#[cfg(feature = "qt")]
pub fn localize_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    resolver: &dyn localize::ReferenceResolver,
) -> Result<u64> {
    let mut stream = SourceStream::open(input)?;

    if !keepsake_format_qt::is_type(&mut stream)? {
        return unsupported_error("keepsake: localization requires a quicktime movie");
    }

    let plan = localize::plan(&mut stream, resolver)?;

    let mut writer = BufWriter::new(File::create(output.as_ref())?);
    let written = localize::write(&plan, &mut stream, &mut writer)?;

    info!("keepsake: wrote {} bytes to {}", written, output.as_ref().display());

    Ok(written)
}

#[cfg(all(test, feature = "all"))]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use keepsake_core::errors::Error;
    use tempfile::TempDir;

    use super::*;

    const URL: &str = "http://example.com/media.mov";

    fn atom(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
        let mut buf = (content.len() as u32 + 8).to_be_bytes().to_vec();
        buf.extend_from_slice(tag);
        buf.extend_from_slice(content);
        buf
    }

    fn chunk(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
        let mut buf = tag.to_vec();
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(content);
        buf
    }

    /// A stereo 16-bit PCM WAVE file holding one second of silence.
    fn wave() -> Vec<u8> {
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&2u16.to_le_bytes());
        fmt.extend_from_slice(&44100u32.to_le_bytes());
        fmt.extend_from_slice(&(44100u32 * 4).to_le_bytes());
        fmt.extend_from_slice(&4u16.to_le_bytes());
        fmt.extend_from_slice(&16u16.to_le_bytes());

        let mut form = b"WAVE".to_vec();
        form.extend_from_slice(&chunk(b"fmt ", &fmt));
        form.extend_from_slice(&chunk(b"data", &vec![0; 44100 * 4]));

        chunk(b"RIFF", &form)
    }

    /// A movie whose only data reference points at an external URL.
    fn external_movie() -> Vec<u8> {
        let mut url = vec![0, 0, 0, 0];
        url.extend_from_slice(URL.as_bytes());
        url.push(0);

        let mut dref = vec![0, 0, 0, 0];
        dref.extend_from_slice(&1u32.to_be_bytes());
        dref.extend_from_slice(&atom(b"url ", &url));

        let dinf = atom(b"dinf", &atom(b"dref", &dref));
        let moov = atom(b"moov", &atom(b"trak", &atom(b"mdia", &atom(b"minf", &dinf))));

        [moov, atom(b"mdat", &[0xaa; 16])].concat()
    }

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn verify_probe_order() {
        let names: Vec<&str> =
            default::get_probe().descriptors().iter().map(|d| d.info.short_name).collect();
        assert_eq!(names, ["quicktime", "wave", "jp2", "jpeg"]);
    }

    #[test]
    fn verify_characterize_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "silence.wav", &wave());

        let result = characterize_file(&path, &ParseOptions::default()).unwrap();
        assert_eq!(result.format.short_name, "wave");
        assert_eq!(result.bitstreams.len(), 1);
        assert_eq!(result.bitstreams[0].channels, Some(2));
    }

    #[test]
    fn verify_jpeg_is_probed_last() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tiny.jpg", &[0xff, 0xd8, 0xff, 0xd9]);

        let result = characterize_file(&path, &ParseOptions::default()).unwrap();
        assert_eq!(result.format.short_name, "jpeg");
    }

    #[test]
    fn verify_unrecognized_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.txt", b"not a container at all");

        let err = characterize_file(&path, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let missing = dir.path().join("missing.mov");
        assert!(matches!(
            characterize_file(missing, &ParseOptions::default()),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn verify_localize_file() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "external.mov", &external_movie());
        let output = dir.path().join("local.mov");

        let mut paths = localize::LocalPaths::new();
        paths.insert(URL, "/archive/media.mov");

        let written = localize_file(&input, &output, &paths).unwrap();

        let data = fs::read(&output).unwrap();
        assert_eq!(written, data.len() as u64);

        let needle = b"file:///archive/media.mov\0";
        assert!(data.windows(needle.len()).any(|w| w == needle));

        let mut stream = SourceStream::open(&output).unwrap();
        let found = default::get_probe().format(&mut stream).unwrap().map(|d| d.info.short_name);
        assert_eq!(found, Some("quicktime"));
    }

    #[test]
    fn verify_localize_requires_quicktime() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "silence.wav", &wave());
        let output = dir.path().join("out.mov");

        let err = localize_file(&input, &output, &localize::SelfContained).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(!output.exists());
    }
}
