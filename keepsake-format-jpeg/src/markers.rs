// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// JPEG markers, identified by the byte following the `0xff` prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    /// Start of frame. The value is the frame type, 0 to 15, excluding 4, 8 and 12.
    Sof(u8),
    /// Define Huffman tables.
    Dht,
    /// Reserved for JPEG extensions.
    Jpg,
    /// Define arithmetic coding conditioning.
    Dac,
    /// Restart with modulo 8 count.
    Rst(u8),
    /// Start of image.
    Soi,
    /// End of image.
    Eoi,
    /// Start of scan.
    Sos,
    /// Define quantization tables.
    Dqt,
    /// Define number of lines.
    Dnl,
    /// Define restart interval.
    Dri,
    /// Define hierarchical progression.
    Dhp,
    /// Expand reference components.
    Exp,
    /// Application segment 0 to 15.
    App(u8),
    /// Reserved JPEG extension 0 to 13.
    JpgN(u8),
    /// Comment.
    Com,
    /// Temporary private use in arithmetic coding.
    Tem,
    /// Reserved.
    Reserved(u8),
}

impl From<u8> for Marker {
    fn from(val: u8) -> Self {
        match val {
            0xc4 => Marker::Dht,
            0xc8 => Marker::Jpg,
            0xcc => Marker::Dac,
            0xc0..=0xcf => Marker::Sof(val - 0xc0),
            0xd0..=0xd7 => Marker::Rst(val - 0xd0),
            0xd8 => Marker::Soi,
            0xd9 => Marker::Eoi,
            0xda => Marker::Sos,
            0xdb => Marker::Dqt,
            0xdc => Marker::Dnl,
            0xdd => Marker::Dri,
            0xde => Marker::Dhp,
            0xdf => Marker::Exp,
            0xe0..=0xef => Marker::App(val - 0xe0),
            0xf0..=0xfd => Marker::JpgN(val - 0xf0),
            0xfe => Marker::Com,
            0x01 => Marker::Tem,
            _ => Marker::Reserved(val),
        }
    }
}

impl Marker {
    /// Returns `true` if the marker stands alone, without a length-prefixed segment.
    pub fn is_standalone(&self) -> bool {
        matches!(self, Marker::Soi | Marker::Eoi | Marker::Rst(_) | Marker::Tem)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Sof(n) => write!(f, "SOF{}", n),
            Marker::Dht => write!(f, "DHT"),
            Marker::Jpg => write!(f, "JPG"),
            Marker::Dac => write!(f, "DAC"),
            Marker::Rst(n) => write!(f, "RST{}", n),
            Marker::Soi => write!(f, "SOI"),
            Marker::Eoi => write!(f, "EOI"),
            Marker::Sos => write!(f, "SOS"),
            Marker::Dqt => write!(f, "DQT"),
            Marker::Dnl => write!(f, "DNL"),
            Marker::Dri => write!(f, "DRI"),
            Marker::Dhp => write!(f, "DHP"),
            Marker::Exp => write!(f, "EXP"),
            Marker::App(n) => write!(f, "APP{}", n),
            Marker::JpgN(n) => write!(f, "JPG{}", n),
            Marker::Com => write!(f, "COM"),
            Marker::Tem => write!(f, "TEM"),
            Marker::Reserved(val) => write!(f, "RES({:#04x})", val),
        }
    }
}

/// The mode of operation of a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Baseline,
    ExtendedSequential,
    Progressive,
    Lossless,
}

/// The coding process of a frame, as declared by its start-of-frame marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodingProcess {
    pub mode: Mode,
    /// Arithmetic entropy coding instead of Huffman coding.
    pub arithmetic: bool,
    /// A differential frame of a hierarchical image.
    pub differential: bool,
}

impl CodingProcess {
    /// Gets the coding process of the start-of-frame type `n`.
    pub fn from_frame_type(n: u8) -> Option<Self> {
        let (mode, arithmetic, differential) = match n {
            0 => (Mode::Baseline, false, false),
            1 => (Mode::ExtendedSequential, false, false),
            2 => (Mode::Progressive, false, false),
            3 => (Mode::Lossless, false, false),
            5 => (Mode::ExtendedSequential, false, true),
            6 => (Mode::Progressive, false, true),
            7 => (Mode::Lossless, false, true),
            9 => (Mode::ExtendedSequential, true, false),
            10 => (Mode::Progressive, true, false),
            11 => (Mode::Lossless, true, false),
            13 => (Mode::ExtendedSequential, true, true),
            14 => (Mode::Progressive, true, true),
            15 => (Mode::Lossless, true, true),
            _ => return None,
        };

        Some(CodingProcess { mode, arithmetic, differential })
    }

    /// The name the archive uses for the process, for example `DIFF_PROG_ARITH`.
    pub fn name(&self) -> String {
        let mode = match self.mode {
            Mode::Baseline => "BASELINE",
            Mode::ExtendedSequential => "EXT_SEQ",
            Mode::Progressive => "PROG",
            Mode::Lossless => "LOSSLESS",
        };

        // A differential frame is never baseline, so the differential sequential name drops the
        // "EXT" qualifier.
        let mode = match (self.differential, self.mode) {
            (true, Mode::ExtendedSequential) => "DIFF_SEQ".to_string(),
            (true, _) => format!("DIFF_{}", mode),
            (false, _) => mode.to_string(),
        };

        if self.arithmetic {
            format!("{}_ARITH", mode)
        }
        else {
            mode
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.mode == Mode::Lossless
    }

    /// Returns `true` if the sample precision `bits` is permitted by the process.
    pub fn is_valid_precision(&self, bits: u8) -> bool {
        match self.mode {
            Mode::Baseline => bits == 8,
            Mode::Lossless => (2..=16).contains(&bits),
            _ => bits == 8 || bits == 12,
        }
    }
}
