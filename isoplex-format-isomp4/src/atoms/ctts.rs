// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::Result;
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, MAX_TABLE_PREALLOC};
use crate::table::CompositionOffsetEntry;

/// Composition time-to-sample atom.
#[derive(Debug)]
pub struct CttsAtom {
    pub entries: Vec<CompositionOffsetEntry>,
}

impl Atom for CttsAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (version, _) = header.read_extended_header(reader)?;

        let entry_count = header.read_entry_count(reader, 8, "isomp4 (ctts): invalid entry count")?;

        let mut entries = Vec::with_capacity((entry_count as usize).min(MAX_TABLE_PREALLOC));

        for _ in 0..entry_count {
            let count = reader.read_be_u32()?;

            // Version 0 offsets are unsigned, version 1 offsets are signed.
            let offset = match version {
                0 => i64::from(reader.read_be_u32()?),
                _ => i64::from(reader.read_be_i32()?),
            };

            entries.push(CompositionOffsetEntry { count, offset });
        }

        Ok(CttsAtom { entries })
    }
}

#[cfg(test)]
mod tests {
    use isoplex_core::io::BufReader;

    use crate::atoms::tests::{be_u32s, make_full_box};
    use crate::atoms::{Atom, AtomHeader, CttsAtom};

    fn read_ctts(version: u8) -> CttsAtom {
        let data = make_full_box(b"ctts", version, 0, &be_u32s(&[2, 1, 500, 3, 0xffff_fc18]));
        let mut reader = BufReader::new(&data);
        let header = AtomHeader::read(&mut reader).unwrap();
        CttsAtom::read(&mut reader, header).unwrap()
    }

    #[test]
    fn verify_ctts_signedness() {
        let v0 = read_ctts(0);
        assert_eq!(v0.entries[0].count, 1);
        assert_eq!(v0.entries[0].offset, 500);
        assert_eq!(v0.entries[1].offset, 0xffff_fc18);

        let v1 = read_ctts(1);
        assert_eq!(v1.entries[1].count, 3);
        assert_eq!(v1.entries[1].offset, -1000);
    }
}
