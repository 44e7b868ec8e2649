// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::Result;
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, MAX_TABLE_PREALLOC};
use crate::table::TimeToSampleEntry;

/// Time-to-sample atom.
#[derive(Debug)]
pub struct SttsAtom {
    pub entries: Vec<TimeToSampleEntry>,
    pub total_duration: u64,
}

impl Atom for SttsAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let entry_count = header.read_entry_count(reader, 8, "isomp4 (stts): invalid entry count")?;

        let mut total_duration = 0u64;

        let mut entries = Vec::with_capacity((entry_count as usize).min(MAX_TABLE_PREALLOC));

        for _ in 0..entry_count {
            let count = reader.read_be_u32()?;
            let duration = reader.read_be_u32()?;

            total_duration = total_duration.saturating_add(u64::from(count) * u64::from(duration));

            entries.push(TimeToSampleEntry { count, duration });
        }

        Ok(SttsAtom { entries, total_duration })
    }
}
