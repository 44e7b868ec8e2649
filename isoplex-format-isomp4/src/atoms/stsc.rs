// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::Result;
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, MAX_TABLE_PREALLOC};
use crate::table::SampleToChunkEntry;

/// Sample to chunk atom.
#[derive(Debug)]
pub struct StscAtom {
    /// Entries, with 1-based first chunk numbers as stored.
    pub entries: Vec<SampleToChunkEntry>,
}

impl Atom for StscAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let entry_count =
            header.read_entry_count(reader, 12, "isomp4 (stsc): invalid entry count")?;

        let mut entries = Vec::with_capacity((entry_count as usize).min(MAX_TABLE_PREALLOC));

        for _ in 0..entry_count {
            let first_chunk = reader.read_be_u32()?;
            let samples_per_chunk = reader.read_be_u32()?;
            let _sample_desc_index = reader.read_be_u32()?;

            entries.push(SampleToChunkEntry { first_chunk, samples_per_chunk });
        }

        Ok(StscAtom { entries })
    }
}
