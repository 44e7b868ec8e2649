// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::errors::{decode_error, Result};
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// Unpack a packed ISO-639-2/T language code. Returns `None` for codes outside of the valid range.
fn parse_language(code: u16) -> Option<String> {
    if code < 0x400 || code > 0x7fff {
        None
    }
    else {
        let chars = [
            ((code >> 10) & 0x1f) as u8 + 0x60,
            ((code >> 5) & 0x1f) as u8 + 0x60,
            (code & 0x1f) as u8 + 0x60,
        ];

        Some(String::from_utf8_lossy(&chars).to_string())
    }
}

/// Media header atom.
#[derive(Debug)]
pub struct MdhdAtom {
    /// Ticks per second of the media.
    pub timescale: u32,
    /// Duration of the media in timescale units. `None` if unknown.
    pub duration: Option<u64>,
    /// Language.
    pub language: Option<String>,
}

impl Atom for MdhdAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (version, _) = header.read_extended_header(reader)?;

        let (timescale, duration) = match version {
            0 => {
                // Creation and modification time.
                reader.ignore_bytes(8)?;
                let timescale = reader.read_be_u32()?;
                // All 1s is a special case.
                let duration = match reader.read_be_u32()? {
                    u32::MAX => None,
                    duration => Some(u64::from(duration)),
                };
                (timescale, duration)
            }
            1 => {
                reader.ignore_bytes(16)?;
                let timescale = reader.read_be_u32()?;
                let duration = match reader.read_be_u64()? {
                    u64::MAX => None,
                    duration => Some(duration),
                };
                (timescale, duration)
            }
            _ => return decode_error("isomp4: invalid mdhd version"),
        };

        let language = parse_language(reader.read_be_u16()?);

        // Quality
        let _ = reader.read_be_u16()?;

        Ok(MdhdAtom { timescale, duration, language })
    }
}
