// Keepsake
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use keepsake_core::errors::{decode_error, Result};
use keepsake_core::io::{Cursor, ReadBytes, ScopedStream};
use keepsake_core::unit::Unit;

use log::debug;

use crate::boxes::{check_malformation, read_leaf, BoxHeader, BoxIterator, BoxType};
use crate::catalog;
use crate::context::{ImageFlags, ParseContext};

/// A grid resolution, in samples per metre.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Resolution {
    pub vertical: f64,
    pub horizontal: f64,
}

impl Unit<BoxType, ParseContext> for Resolution {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, _: &mut ParseContext) -> Result<Self> {
        let mut reader = ScopedStream::new(reader, header.data_len());

        let vr_num = reader.read_be_u16()?;
        let vr_den = reader.read_be_u16()?;
        let hr_num = reader.read_be_u16()?;
        let hr_den = reader.read_be_u16()?;
        let vr_exp = reader.read_u8()? as i8;
        let hr_exp = reader.read_u8()? as i8;

        if vr_den == 0 || hr_den == 0 {
            return decode_error("jp2 (res): resolution denominator is zero");
        }

        let resolution = |num: u16, den: u16, exp: i8| {
            f64::from(num) / f64::from(den) * 10f64.powi(i32::from(exp))
        };

        Ok(Resolution {
            vertical: resolution(vr_num, vr_den, vr_exp),
            horizontal: resolution(hr_num, hr_den, hr_exp),
        })
    }
}

/// Resolution superbox.
#[derive(Debug, Default)]
pub struct ResBox {
    pub capture: Option<Resolution>,
    pub display: Option<Resolution>,
}

impl Unit<BoxType, ParseContext> for ResBox {
    fn read<B: Cursor>(reader: &mut B, header: BoxHeader, ctx: &mut ParseContext) -> Result<Self> {
        ctx.flags |= ImageFlags::HAS_RESOLUTION;

        let mut iter = BoxIterator::new(reader, &header);
        let mut res = ResBox::default();

        while let Some(header) = iter.next()? {
            match header.unit_type() {
                BoxType::CaptureResolution => {
                    res.capture = read_leaf(&mut iter, ctx, catalog::BAD_RES0BOX)?;
                }
                BoxType::DisplayResolution => {
                    res.display = read_leaf(&mut iter, ctx, catalog::BAD_RES0BOX)?;
                }
                _ => debug!("jp2 (res): skipping box {}", header),
            }
        }

        check_malformation(&iter, ctx, catalog::BAD_RES0BOX);

        if res.capture.is_none() && res.display.is_none() {
            ctx.add(catalog::BAD_RES0BOX);
        }

        Ok(res)
    }
}
