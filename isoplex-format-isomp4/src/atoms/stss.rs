// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::Result;
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, MAX_TABLE_PREALLOC};

/// Sync sample atom.
#[derive(Debug)]
pub struct StssAtom {
    /// 1-based sample numbers of the sync samples.
    pub sample_numbers: Vec<u32>,
}

impl Atom for StssAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let entry_count = header.read_entry_count(reader, 4, "isomp4 (stss): invalid entry count")?;

        let mut sample_numbers =
            Vec::with_capacity((entry_count as usize).min(MAX_TABLE_PREALLOC));

        for _ in 0..entry_count {
            sample_numbers.push(reader.read_be_u32()?);
        }

        Ok(StssAtom { sample_numbers })
    }
}
