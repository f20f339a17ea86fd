// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anomalies of the JP2 format family. Codes prefixed `A_JP2_` are specific to JP2 files, and
//! codes prefixed `A_JPEG2K_` apply to any file of the JPEG 2000 family.

use keepsake_core::anomaly::{SevereElement, Severity};

pub const NONCOMPAT_JP2: SevereElement = SevereElement::anomaly(
    "A_JP2_NONCOMPAT_JP2",
    Severity::Note,
    "file not compatible with the JP2 specification",
);

pub const NO_JP2HBOX: SevereElement =
    SevereElement::anomaly("A_JP2_NO_JP2HBOX", Severity::Note, "no image metadata (JP2 header box)");

pub const NO_JP2CBOX: SevereElement = SevereElement::anomaly(
    "A_JP2_NO_JP2CBOX",
    Severity::Note,
    "no image data (contiguous codestream box)",
);

pub const NONCONTIG_COLRBOX: SevereElement = SevereElement::anomaly(
    "A_JP2_NONCONTIG_COLRBOX",
    Severity::Note,
    "colour specification boxes are not contiguous in the JP2 header box",
);

pub const BAD_FTYPBOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_BAD_FTYPBOX", Severity::Note, "malformed file type box");

pub const UNK_MIN_VERSION: SevereElement =
    SevereElement::anomaly("A_JPEG2K_UNK_MIN_VERSION", Severity::Note, "unknown minor version");

pub const BAD_LOC_BOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_BAD_LOC_BOX", Severity::Note, "box is not in its required location");

pub const BAD_IHDRBOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_BAD_IHDRBOX", Severity::Note, "malformed image header box");

pub const UNK_UNKC: SevereElement = SevereElement::anomaly(
    "A_JPEG2K_UNK_UNKC",
    Severity::Note,
    "unknown value for the colourspace unknown field",
);

pub const UNK_BOXTYPE: SevereElement =
    SevereElement::anomaly("A_JPEG2K_UNK_BOXTYPE", Severity::Note, "unknown box type in a superbox");

pub const NO_COLRBOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_NO_COLRBOX", Severity::Note, "no colour specification box");

pub const UNK_CS_METH: SevereElement = SevereElement::anomaly(
    "A_JPEG2K_UNK_CS_METH",
    Severity::Note,
    "unknown colour specification method",
);

pub const NO_BPCBOX: SevereElement = SevereElement::anomaly(
    "A_JPEG2K_NO_BPCBOX",
    Severity::Note,
    "component bit depths vary, but there is no bits per component box",
);

pub const BAD_PCLRBOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_BAD_PCLRBOX", Severity::Note, "malformed palette box");

pub const NO_CMAPBOX: SevereElement = SevereElement::anomaly(
    "A_JPEG2K_NO_CMAPBOX",
    Severity::Note,
    "palette box without a component mapping box",
);

pub const BAD_RES0BOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_BAD_RES0BOX", Severity::Note, "malformed resolution box");

pub const BAD_JP2HBOX: SevereElement =
    SevereElement::anomaly("A_JPEG2K_BAD_JP2HBOX", Severity::Note, "malformed JP2 header box");

pub const BAD_JP2CBOX: SevereElement = SevereElement::anomaly(
    "A_JPEG2K_BAD_JP2CBOX",
    Severity::Note,
    "contiguous codestream box does not begin with a valid main header",
);

pub const BAD_BOX_LENGTH: SevereElement = SevereElement::anomaly(
    "A_JPEG2K_BAD_BOX_LENGTH",
    Severity::Note,
    "box length is smaller than its header or extends past the end of the file",
);

/// Every anomaly this format may record.
pub const CATALOG: &[SevereElement] = &[
    NONCOMPAT_JP2,
    NO_JP2HBOX,
    NO_JP2CBOX,
    NONCONTIG_COLRBOX,
    BAD_FTYPBOX,
    UNK_MIN_VERSION,
    BAD_LOC_BOX,
    BAD_IHDRBOX,
    UNK_UNKC,
    UNK_BOXTYPE,
    NO_COLRBOX,
    UNK_CS_METH,
    NO_BPCBOX,
    BAD_PCLRBOX,
    NO_CMAPBOX,
    BAD_RES0BOX,
    BAD_JP2HBOX,
    BAD_JP2CBOX,
    BAD_BOX_LENGTH,
];

#[cfg(test)]
mod tests {
    use keepsake_core::anomaly::find_duplicate_code;

    use super::CATALOG;

    #[test]
    fn verify_catalog_codes_are_unique() {
        assert_eq!(find_duplicate_code(CATALOG), None);
    }

    #[test]
    fn verify_catalog_prefixes() {
        assert!(CATALOG
            .iter()
            .all(|el| el.code.starts_with("A_JP2_") || el.code.starts_with("A_JPEG2K_")));
    }
}
