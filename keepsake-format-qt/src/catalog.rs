// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anomalies and limitations of the QuickTime format family.

use keepsake_core::anomaly::{SevereElement, Severity};

pub const NO_MOOV: SevereElement =
    SevereElement::anomaly("A_QUICKTIME_NO_MOOV", Severity::Note, "missing the required Movie atom");

pub const NO_MDAT: SevereElement = SevereElement::anomaly(
    "A_QUICKTIME_NO_MDAT",
    Severity::Note,
    "missing the required Movie Data atom",
);

pub const BAD_MOOV: SevereElement =
    SevereElement::anomaly("A_QUICKTIME_BAD_MOOV", Severity::Note, "malformed Movie atom");

pub const BAD_TRAK: SevereElement =
    SevereElement::anomaly("A_QUICKTIME_BAD_TRAK", Severity::Note, "malformed Track atom");

pub const BAD_MDIA: SevereElement =
    SevereElement::anomaly("A_QUICKTIME_BAD_MDIA", Severity::Note, "malformed Media atom");

pub const BAD_MINF: SevereElement = SevereElement::anomaly(
    "A_QUICKTIME_BAD_MINF",
    Severity::Note,
    "malformed Media Information atom",
);

pub const ATOM_TOO_SMALL: SevereElement =
    SevereElement::anomaly("A_QUICKTIME_ATOM_TOO_SMALL", Severity::Note, "insufficient atom size");

pub const ATOM_TRUNCATED: SevereElement = SevereElement::anomaly(
    "A_QUICKTIME_ATOM_TRUNCATED",
    Severity::Note,
    "atom size extends past the end of its parent",
);

pub const UNSUPPORTED_VIDEO_ENCODING: SevereElement = SevereElement::limitation(
    "L_QUICKTIME_UNSUPPORTED_VIDEO_ENCODING",
    Severity::Bit,
    "unsupported video encoding in the QuickTime file",
);

pub const UNSUPPORTED_AUDIO_ENCODING: SevereElement = SevereElement::limitation(
    "L_QUICKTIME_UNSUPPORTED_AUDIO_ENCODING",
    Severity::Bit,
    "unsupported audio encoding in the QuickTime file",
);

pub const UNSUPPORTED_COMPRESSED_HEADER: SevereElement = SevereElement::limitation(
    "L_QUICKTIME_UNSUPPORTED_COMPRESSED_HEADER",
    Severity::Bit,
    "unsupported compressed header in the QuickTime file",
);

/// Every anomaly and limitation this format may record.
pub const CATALOG: &[SevereElement] = &[
    NO_MOOV,
    NO_MDAT,
    BAD_MOOV,
    BAD_TRAK,
    BAD_MDIA,
    BAD_MINF,
    ATOM_TOO_SMALL,
    ATOM_TRUNCATED,
    UNSUPPORTED_VIDEO_ENCODING,
    UNSUPPORTED_AUDIO_ENCODING,
    UNSUPPORTED_COMPRESSED_HEADER,
];
