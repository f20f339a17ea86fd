// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `probe` module provides the common interface of format parsers and the auto-detection of
//! a file's format from its bytes alone.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::anomaly::{Anomalies, PreservationLevel, SeverityLookup};
use crate::bitstream::Bitstream;
use crate::errors::Result;
use crate::io::Cursor;

/// Basic information about a container format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    /// A short ASCII-only string identifying the format.
    pub short_name: &'static str,
    /// A longer, more descriptive, string identifying the format.
    pub long_name: &'static str,
    /// The MIME type of the format.
    pub mime_type: &'static str,
}

/// Options shared by all format parsers.
#[derive(Copy, Clone, Debug)]
pub struct ParseOptions {
    /// The maximum number of bytes a compressed resource may inflate to.
    pub max_decompressed_len: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { max_decompressed_len: 64 * 1024 * 1024 }
    }
}

/// Everything recovered from a file by a format parser.
#[derive(Clone, Debug, Serialize)]
pub struct Characterization {
    pub format: FormatInfo,
    /// The version of the format, if the format declares one.
    pub version: Option<String>,
    pub bitstreams: Vec<Bitstream>,
    /// Format specific properties, for example whether a movie has a compressed header.
    pub attributes: BTreeMap<&'static str, String>,
    pub anomalies: Anomalies,
}

impl Characterization {
    pub fn new(format: FormatInfo) -> Self {
        Characterization {
            format,
            version: None,
            bitstreams: Vec::new(),
            attributes: BTreeMap::new(),
            anomalies: Anomalies::new(),
        }
    }

    /// Records a format specific property.
    pub fn set_attribute<V: ToString>(&mut self, name: &'static str, value: V) {
        self.attributes.insert(name, value.to_string());
    }

    /// Returns `true` if the format specific flag `name` was set to `true`.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|value| value == "true")
    }

    /// Reduces the recorded anomalies to a preservation level using `lookup`.
    pub fn preservation_level(&self, lookup: &dyn SeverityLookup) -> PreservationLevel {
        PreservationLevel::evaluate(&self.anomalies, lookup)
    }
}

/// A probe descriptor ties a format's cheap structural sniff to its full parser.
#[derive(Copy, Clone)]
pub struct ProbeDescriptor {
    pub info: FormatInfo,
    /// Returns `true` if the stream, read from its start, looks like the format.
    pub is_type: fn(&mut dyn Cursor) -> Result<bool>,
    /// Parses the stream from its start.
    pub parse: fn(&mut dyn Cursor, &ParseOptions) -> Result<Characterization>,
}

/// `Probe` scans a stream with every registered descriptor to find the one that can parse it.
#[derive(Default)]
pub struct Probe {
    descriptors: Vec<ProbeDescriptor>,
}

impl Probe {
    /// Register a format. Formats are tried in the order they were registered.
    pub fn register(&mut self, descriptor: ProbeDescriptor) {
        self.descriptors.push(descriptor);
    }

    /// Returns the descriptors in probe order.
    pub fn descriptors(&self) -> &[ProbeDescriptor] {
        &self.descriptors
    }

    /// Searches for the first registered format that recognizes the stream. The stream is
    /// rewound before every attempt and after the search.
    pub fn format(&self, reader: &mut dyn Cursor) -> Result<Option<&ProbeDescriptor>> {
        for descriptor in &self.descriptors {
            reader.seek(0)?;

            let found = match (descriptor.is_type)(&mut *reader) {
                Ok(found) => found,
                // A file too short for the format's signature is simply not of that format.
                Err(err) if err.is_end_of_stream() => false,
                Err(err) => return Err(err),
            };

            if found {
                info!("probe: found {}", descriptor.info.short_name);
                reader.seek(0)?;
                return Ok(Some(descriptor));
            }

            debug!("probe: not {}", descriptor.info.short_name);
        }

        reader.seek(0)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::decode_error;
    use crate::io::{BufReader, ReadBytes};

    const NEVER: FormatInfo = FormatInfo { short_name: "never", long_name: "Never", mime_type: "" };
    const ABCD: FormatInfo = FormatInfo { short_name: "abcd", long_name: "ABCD", mime_type: "" };

    fn never(_: &mut dyn Cursor) -> Result<bool> {
        Ok(false)
    }

    fn is_abcd(reader: &mut dyn Cursor) -> Result<bool> {
        Ok(&reader.read_quad_bytes()? == b"abcd")
    }

    fn parse_nothing(_: &mut dyn Cursor, _: &ParseOptions) -> Result<Characterization> {
        decode_error("not implemented")
    }

    #[test]
    fn verify_probe_order_and_rewind() {
        let mut probe = Probe::default();
        probe.register(ProbeDescriptor { info: NEVER, is_type: never, parse: parse_nothing });
        probe.register(ProbeDescriptor { info: ABCD, is_type: is_abcd, parse: parse_nothing });

        let data = b"abcdefgh";
        let mut reader = BufReader::new(data);
        let found = probe.format(&mut reader).unwrap().map(|d| d.info);
        assert_eq!(found, Some(ABCD));
        assert_eq!(reader.pos(), 0);

        let short = b"ab";
        let mut reader = BufReader::new(short);
        assert!(probe.format(&mut reader).unwrap().is_none());
    }

    #[test]
    fn verify_attributes() {
        let mut result = Characterization::new(ABCD);
        result.set_attribute("has_user_data", true);
        result.set_attribute("brand", "qt  ");
        assert!(result.has_attribute("has_user_data"));
        assert!(!result.has_attribute("brand"));
        assert!(!result.has_attribute("missing"));
    }
}
