// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anomalies of the JPEG format family.

use keepsake_core::anomaly::{SevereElement, Severity};

pub const BAD_DHT: SevereElement =
    SevereElement::anomaly("A_JPEG_BAD_DHT", Severity::Note, "DHT marker segment is malformed");

pub const BAD_DQT: SevereElement =
    SevereElement::anomaly("A_JPEG_BAD_DQT", Severity::Note, "DQT marker segment is malformed");

pub const BAD_DRI: SevereElement =
    SevereElement::anomaly("A_JPEG_BAD_DRI", Severity::Note, "DRI marker segment is malformed");

pub const BAD_SOF: SevereElement =
    SevereElement::anomaly("A_JPEG_BAD_SOF", Severity::Note, "SOF marker segment is malformed");

pub const BAD_SOS: SevereElement =
    SevereElement::anomaly("A_JPEG_BAD_SOS", Severity::Note, "SOS marker segment is malformed");

pub const INCOMPLETE_APP0: SevereElement = SevereElement::anomaly(
    "A_JPEG_INCOMPLETE_APP0",
    Severity::Note,
    "the JFIF APP0 marker segment is incomplete",
);

pub const MISSING_DQT: SevereElement = SevereElement::anomaly(
    "A_JPEG_MISSING_DQT",
    Severity::Note,
    "SOF marker segment refers to an undefined quantization table",
);

pub const UNKNOWN_JFIFEXT: SevereElement =
    SevereElement::anomaly("A_JPEG_UNKNOWN_JFIFEXT", Severity::Note, "uses an unknown JFIF extension");

pub const UNKNOWN_MARKER: SevereElement = SevereElement::anomaly(
    "A_JPEG_UNKNOWN_MARKER",
    Severity::Note,
    "contains an unknown marker, the rest of the file can not be interpreted",
);

pub const UNKNOWN_VARIATION: SevereElement =
    SevereElement::anomaly("A_JPEG_UNKNOWN_VARIATION", Severity::Note, "unknown JPEG variation");

pub const NO_EOI: SevereElement =
    SevereElement::anomaly("A_JPEG_NO_EOI", Severity::Note, "missing end of image marker");

/// Every anomaly this format may record.
pub const CATALOG: &[SevereElement] = &[
    BAD_DHT,
    BAD_DQT,
    BAD_DRI,
    BAD_SOF,
    BAD_SOS,
    INCOMPLETE_APP0,
    MISSING_DQT,
    UNKNOWN_JFIFEXT,
    UNKNOWN_MARKER,
    UNKNOWN_VARIATION,
    NO_EOI,
];
