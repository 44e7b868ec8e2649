// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::{decode_error, Result};
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, AtomType};
use crate::atoms::{Co64Atom, CttsAtom, StcoAtom, StscAtom, StsdAtom, StssAtom, StszAtom, SttsAtom};

use log::warn;

/// Sample table atom.
#[derive(Debug)]
pub struct StblAtom {
    pub stsd: StsdAtom,
    pub stts: SttsAtom,
    pub ctts: Option<CttsAtom>,
    pub stss: Option<StssAtom>,
    pub stsc: StscAtom,
    pub stsz: StszAtom,
    pub stco: Option<StcoAtom>,
    pub co64: Option<Co64Atom>,
}

impl StblAtom {
    /// Gets the absolute chunk offsets, widened to 64 bits.
    pub fn chunk_offsets(&self) -> Vec<u64> {
        if let Some(co64) = &self.co64 {
            co64.chunk_offsets.clone()
        }
        else if let Some(stco) = &self.stco {
            stco.chunk_offsets.iter().map(|&offset| u64::from(offset)).collect()
        }
        else {
            Vec::new()
        }
    }
}

impl Atom for StblAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut stsd = None;
        let mut stts = None;
        let mut ctts = None;
        let mut stss = None;
        let mut stsc = None;
        let mut stsz = None;
        let mut stco = None;
        let mut co64 = None;

        while let Some(header) = iter.next()? {
            match header.atom_type {
                AtomType::SampleDescription => {
                    stsd = Some(iter.read_atom::<StsdAtom>()?);
                }
                AtomType::TimeToSample => {
                    stts = Some(iter.read_atom::<SttsAtom>()?);
                }
                AtomType::CompositionTimeToSample => {
                    ctts = Some(iter.read_atom::<CttsAtom>()?);
                }
                // Sync sample box is only required for video.
                AtomType::SyncSample => {
                    stss = Some(iter.read_atom::<StssAtom>()?);
                }
                AtomType::SampleToChunk => {
                    stsc = Some(iter.read_atom::<StscAtom>()?);
                }
                AtomType::SampleSize => {
                    stsz = Some(iter.read_atom::<StszAtom>()?);
                }
                AtomType::ChunkOffset => {
                    stco = Some(iter.read_atom::<StcoAtom>()?);
                }
                AtomType::ChunkOffset64 => {
                    co64 = Some(iter.read_atom::<Co64Atom>()?);
                }
                _ => (),
            }
        }

        let Some(stsd) = stsd
        else {
            return decode_error("isomp4 (stbl): missing stsd atom");
        };

        let Some(stts) = stts
        else {
            return decode_error("isomp4 (stbl): missing stts atom");
        };

        let Some(stsc) = stsc
        else {
            return decode_error("isomp4 (stbl): missing stsc atom");
        };

        let Some(stsz) = stsz
        else {
            return decode_error("isomp4 (stbl): missing stsz atom");
        };

        if stco.is_none() && co64.is_none() {
            warn!("missing stco or co64 atom");
        }

        Ok(StblAtom { stsd, stts, ctts, stss, stsc, stsz, stco, co64 })
    }
}
