// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::codecs::MediaKind;
use isoplex_core::common::FourCc;
use isoplex_core::errors::Result;
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

use log::debug;

/// Handler type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerType {
    /// Video handler.
    Video,
    /// Audio handler.
    Sound,
    /// Subtitle handler.
    Subtitle,
    /// Metadata handler.
    Metadata,
    /// Text handler.
    Text,
    /// Unknown handler type.
    Other([u8; 4]),
}

impl HandlerType {
    /// Gets the kind of media carried by tracks with this handler.
    pub fn media_kind(&self) -> MediaKind {
        match self {
            HandlerType::Video => MediaKind::Video,
            HandlerType::Sound => MediaKind::Audio,
            HandlerType::Subtitle | HandlerType::Text => MediaKind::Subtitle,
            _ => MediaKind::Other,
        }
    }
}

/// Handler atom.
#[derive(Debug)]
pub struct HdlrAtom {
    /// Handler type.
    pub handler_type: HandlerType,
}

impl Atom for HdlrAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        // Always 0 for MP4, but for QuickTime this contains the component type.
        let _ = reader.read_quad_bytes()?;

        let handler_type = match &reader.read_quad_bytes()? {
            b"vide" => HandlerType::Video,
            b"soun" => HandlerType::Sound,
            b"meta" => HandlerType::Metadata,
            b"subt" | b"sbtl" => HandlerType::Subtitle,
            b"text" => HandlerType::Text,
            &hdlr => {
                debug!("unknown handler type {}", FourCc::new(hdlr));
                HandlerType::Other(hdlr)
            }
        };

        // The reserved fields and the human-readable name are skipped by the parent iterator.

        Ok(HdlrAtom { handler_type })
    }
}
