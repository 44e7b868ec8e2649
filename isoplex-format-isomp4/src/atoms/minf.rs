// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::{decode_error, Result};
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, AtomType, StblAtom};

/// Media information atom.
#[derive(Debug)]
pub struct MinfAtom {
    /// Sample table atom.
    pub stbl: StblAtom,
}

impl Atom for MinfAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut stbl = None;

        while let Some(header) = iter.next()? {
            if header.atom_type == AtomType::SampleTable {
                stbl = Some(iter.read_atom::<StblAtom>()?);
            }
        }

        let Some(stbl) = stbl
        else {
            return decode_error("isomp4 (minf): missing stbl atom");
        };

        Ok(MinfAtom { stbl })
    }
}
