// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::{decode_error, Result};
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, MAX_TABLE_PREALLOC};
use crate::table::SampleSizes;

/// Sample size atom.
#[derive(Debug)]
pub struct StszAtom {
    /// The total number of samples.
    pub sample_count: u32,
    /// A vector of `sample_count` sample sizes, or a constant size for all samples.
    pub sample_sizes: SampleSizes,
}

impl Atom for StszAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        // minimum data size is 8 bytes
        let len = match header.data_len() {
            Some(len) if len >= 8 => len,
            Some(_) => return decode_error("isomp4 (stsz): atom size is less than 20 bytes"),
            None => return decode_error("isomp4 (stsz): expected atom size to be known"),
        };

        let sample_size = reader.read_be_u32()?;
        let sample_count = reader.read_be_u32()?;

        let sample_sizes = if sample_size == 0 {
            if u64::from(sample_count) != (len - 8) / 4 {
                return decode_error("isomp4 (stsz): invalid sample count");
            }

            let mut entries = Vec::with_capacity((sample_count as usize).min(MAX_TABLE_PREALLOC));

            for _ in 0..sample_count {
                entries.push(reader.read_be_u32()?);
            }

            SampleSizes::Variable(entries)
        }
        else {
            SampleSizes::Constant(sample_size)
        };

        Ok(StszAtom { sample_count, sample_sizes })
    }
}
