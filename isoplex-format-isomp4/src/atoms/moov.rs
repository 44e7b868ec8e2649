// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::Result;
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, AtomType, TrakAtom};

/// Movie atom.
#[derive(Debug)]
pub struct MoovAtom {
    /// Trak atoms, in file order.
    pub traks: Vec<TrakAtom>,
    /// True if a movie extends atom is present, indicating the movie is fragmented.
    pub is_fragmented: bool,
}

impl Atom for MoovAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut traks = Vec::new();
        let mut is_fragmented = false;

        while let Some(header) = iter.next()? {
            match header.atom_type {
                AtomType::Track => {
                    let index = traks.len();
                    let trak = iter.read_atom::<TrakAtom>().map_err(|err| err.with_track(index))?;
                    traks.push(trak);
                }
                AtomType::MovieExtends => {
                    is_fragmented = true;
                }
                _ => (),
            }
        }

        Ok(MoovAtom { traks, is_fragmented })
    }
}
