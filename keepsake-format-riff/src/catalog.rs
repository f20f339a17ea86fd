// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anomalies and limitations of the WAVE format family.

use keepsake_core::anomaly::{SevereElement, Severity};

pub const FMT_CHUNK_TOO_SMALL: SevereElement = SevereElement::anomaly(
    "A_WAVE_FMT_CHUNK_TOO_SMALL",
    Severity::Note,
    "insufficient format chunk size",
);

pub const NO_FMT_BEFORE_DATA: SevereElement = SevereElement::anomaly(
    "A_WAVE_NO_FMT_BEFORE_DATA",
    Severity::Note,
    "lack of format chunk before data chunk",
);

pub const NO_FACT_FOR_COMPRESSED_DATA: SevereElement = SevereElement::anomaly(
    "A_WAVE_NO_FACT_FOR_COMPRESSED_DATA",
    Severity::Note,
    "lack of fact chunk for compressed data",
);

pub const NON_UNIQUE_CUE_POINT_ID: SevereElement =
    SevereElement::anomaly("A_WAVE_NON_UNIQUE_CUE_POINT_ID", Severity::Note, "non-unique cue point id");

pub const MULTIPLE_CUE_POINTS_CHUNK: SevereElement = SevereElement::anomaly(
    "A_WAVE_MULTIPLE_CUE_POINTS_CHUNK",
    Severity::Note,
    "multiple cue points chunks",
);

pub const UNDEFINED_CUE_POINT_IN_PLAYLIST: SevereElement = SevereElement::anomaly(
    "A_WAVE_UNDEFINED_CUE_POINT_IN_PLAYLIST",
    Severity::Note,
    "undefined cue point used in the playlist chunk",
);

pub const UNRECOGNIZABLE_SPEAKER_POSITION: SevereElement = SevereElement::anomaly(
    "A_WAVE_UNRECOGNIZABLE_SPEAKER_POSITION",
    Severity::Note,
    "unrecognizable speaker position in the channel mask",
);

pub const BAD_ASSOCIATED_DATA_CHUNK: SevereElement = SevereElement::anomaly(
    "A_WAVE_BAD_ASSOCIATED_DATA_CHUNK",
    Severity::Note,
    "bad associated data list chunk",
);

pub const UNDEFINED_CUE_POINT_IN_ASSOCIATED_DATA_LIST: SevereElement = SevereElement::anomaly(
    "A_WAVE_UNDEFINED_CUE_POINT_IN_ASSOCIATED_DATA_LIST",
    Severity::Note,
    "undefined cue point used in the associated data list",
);

pub const BAD_SUBCHUNK_IN_ASSOCIATED_DATA_LIST: SevereElement = SevereElement::anomaly(
    "A_WAVE_BAD_SUBCHUNK_IN_ASSOCIATED_DATA_LIST",
    Severity::Note,
    "bad subchunk in the associated data list chunk",
);

pub const CHUNK_TRUNCATED: SevereElement = SevereElement::anomaly(
    "A_WAVE_CHUNK_TRUNCATED",
    Severity::Note,
    "chunk length extends past the end of its parent",
);

pub const UNSUPPORTED_ENCODING: SevereElement = SevereElement::limitation(
    "L_WAVE_UNSUPPORTED_ENCODING",
    Severity::Bit,
    "unsupported wave audio encoding",
);

/// Every anomaly and limitation this format may record.
pub const CATALOG: &[SevereElement] = &[
    FMT_CHUNK_TOO_SMALL,
    NO_FMT_BEFORE_DATA,
    NO_FACT_FOR_COMPRESSED_DATA,
    NON_UNIQUE_CUE_POINT_ID,
    MULTIPLE_CUE_POINTS_CHUNK,
    UNDEFINED_CUE_POINT_IN_PLAYLIST,
    UNRECOGNIZABLE_SPEAKER_POSITION,
    BAD_ASSOCIATED_DATA_CHUNK,
    UNDEFINED_CUE_POINT_IN_ASSOCIATED_DATA_LIST,
    BAD_SUBCHUNK_IN_ASSOCIATED_DATA_LIST,
    CHUNK_TRUNCATED,
    UNSUPPORTED_ENCODING,
];

#[cfg(test)]
mod tests {
    use keepsake_core::anomaly::{find_duplicate_code, ElementKind, Severity};

    use super::CATALOG;

    #[test]
    fn verify_catalog_codes_are_unique() {
        assert_eq!(find_duplicate_code(CATALOG), None);
    }

    #[test]
    fn verify_limitations_are_bit_level() {
        for el in CATALOG.iter().filter(|el| el.kind == ElementKind::Limitation) {
            assert!(el.code.starts_with("L_WAVE_"));
            assert_eq!(el.severity, Severity::Bit);
        }
    }
}
