// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::{decode_error, Result};
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// Track header atom.
#[derive(Debug)]
pub struct TkhdAtom {
    /// Track header flags.
    pub flags: u32,
    /// Track identifier.
    pub id: u32,
    /// Track duration in the timescale units of the movie header.
    pub duration: u64,
}

impl Atom for TkhdAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (version, flags) = header.read_extended_header(reader)?;

        // Version 0 uses 32-bit time values, version 1 uses 64-bit values.
        let (id, duration) = match version {
            0 => {
                // Creation and modification time.
                reader.ignore_bytes(8)?;
                let id = reader.read_be_u32()?;
                let _ = reader.read_be_u32()?; // Reserved
                (id, u64::from(reader.read_be_u32()?))
            }
            1 => {
                reader.ignore_bytes(16)?;
                let id = reader.read_be_u32()?;
                let _ = reader.read_be_u32()?; // Reserved
                (id, reader.read_be_u64()?)
            }
            _ => return decode_error("isomp4: invalid tkhd version"),
        };

        // The layer, volume, matrix, and presentation size are skipped by the parent iterator.

        Ok(TkhdAtom { flags, id, duration })
    }
}
