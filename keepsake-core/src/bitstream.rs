// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `bitstream` module describes the logical sub-streams found inside a container.

use std::fmt;

use serde::Serialize;

/// The kind of media a bitstream carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BitstreamKind {
    Video,
    Audio,
    Image,
}

/// How a bitstream is presented relative to the rest of the file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Main,
    Preview,
    Poster,
    Movie,
}

/// Where a bitstream's description was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "offset", rename_all = "snake_case")]
pub enum Location {
    /// A byte offset into the file.
    FileByteOffset(u64),
    /// A byte offset into the file's uncompressed header. For files without a compressed header
    /// this is also a byte offset into the file.
    UncompressedHeaderByteOffset(u64),
}

/// One logical media sub-stream.
///
/// Fields are filled in incrementally as the units describing the stream are visited. The
/// derived rates are only computed once both the duration and the sample counts are known, see
/// [`Bitstream::derive_video_rates`] and [`Bitstream::derive_audio_rates`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bitstream {
    pub kind: BitstreamKind,
    pub role: Role,
    /// The resolved encoding name, or `None` if the encoding tag was not recognized.
    pub encoding: Option<String>,
    /// The encoding tag as found in the file.
    pub encoding_tag: Option<String>,
    pub enabled: bool,
    pub location: Option<Location>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Bits per pixel for visual streams, bits per sample for audio.
    pub bits_per_sample: Option<u32>,
    pub channels: Option<u32>,
    /// Samples per second.
    pub sample_rate: Option<f64>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Total number of samples (frames for video).
    pub sample_count: Option<u64>,
    /// Derived. Frames per second for video, samples per second across all channels for audio.
    pub frame_rate: Option<f64>,
    /// Derived. Bits per second.
    pub data_rate: Option<f64>,
}

impl Bitstream {
    pub fn new(kind: BitstreamKind) -> Self {
        Bitstream {
            kind,
            role: Role::Main,
            encoding: None,
            encoding_tag: None,
            enabled: true,
            location: None,
            width: None,
            height: None,
            bits_per_sample: None,
            channels: None,
            sample_rate: None,
            duration: None,
            sample_count: None,
            frame_rate: None,
            data_rate: None,
        }
    }

    /// Sets the duration from a count of time units and the number of units per second.
    pub fn set_duration(&mut self, duration: u64, timescale: u32) {
        if timescale > 0 {
            self.duration = Some(duration as f64 / f64::from(timescale));
        }
    }

    /// Computes the frame rate from the sample count and duration, then the data rate from the
    /// frame rate and frame geometry. Fields that cannot be computed are left untouched.
    pub fn derive_video_rates(&mut self) {
        if let (Some(count), Some(duration)) = (self.sample_count, self.duration) {
            if duration > 0.0 {
                self.frame_rate = Some(count as f64 / duration);
            }
        }

        if let (Some(rate), Some(w), Some(h), Some(bpp)) =
            (self.frame_rate, self.width, self.height, self.bits_per_sample)
        {
            self.data_rate = Some(rate * f64::from(w) * f64::from(h) * f64::from(bpp));
        }
    }

    /// Computes the frame rate as the sample rate across all channels, then the data rate from
    /// the sample size.
    pub fn derive_audio_rates(&mut self) {
        if let (Some(rate), Some(channels)) = (self.sample_rate, self.channels) {
            let frame_rate = rate * f64::from(channels);
            self.frame_rate = Some(frame_rate);

            if let Some(bits) = self.bits_per_sample {
                self.data_rate = Some(frame_rate * f64::from(bits));
            }
        }
    }

    /// The role as the archive names it, for example `VIDEO_MAIN`.
    pub fn role_name(&self) -> String {
        let kind = match self.kind {
            BitstreamKind::Video => "VIDEO",
            BitstreamKind::Audio => "AUDIO",
            BitstreamKind::Image => "IMAGE",
        };
        let role = match self.role {
            Role::Main => "MAIN",
            Role::Preview => "PREVIEW",
            Role::Poster => "POSTER",
            Role::Movie => "MOVIE",
        };
        format!("{}_{}", kind, role)
    }
}

impl fmt::Display for Bitstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.role_name(), self.encoding.as_deref().unwrap_or("unknown"))?;
        if !self.enabled {
            f.write_str(" (disabled)")?;
        }
        Ok(())
    }
}
