// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

use keepsake_core::anomaly::{Anomalies, SevereElement};

use log::warn;

bitflags! {
    /// Image-wide properties discovered while walking the boxes.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ImageFlags: u16 {
        const HAS_IPR                = 1 << 0;
        const COLOR_UNKNOWN          = 1 << 1;
        const SIGNED_COMPONENTS      = 1 << 2;
        const HAS_ICC_PROFILE        = 1 << 3;
        const HAS_PALETTE            = 1 << 4;
        const HAS_COMPONENT_MAPPING  = 1 << 5;
        const HAS_CHANNEL_DEFINITION = 1 << 6;
        const HAS_RESOLUTION         = 1 << 7;
        const HAS_XML                = 1 << 8;
        const HAS_UUID               = 1 << 9;
    }
}

/// Mutable state shared by the box handlers of one parse.
#[derive(Debug, Default)]
pub struct ParseContext {
    pub anomalies: Anomalies,
    pub flags: ImageFlags,
}

impl ParseContext {
    /// Records an anomaly.
    pub fn add(&mut self, element: SevereElement) {
        if self.anomalies.add(element) {
            warn!("jp2: {}", element);
        }
    }
}
