// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::num::NonZeroU64;

use isoplex_core::common::FourCc;
use isoplex_core::errors::{decode_error, Result};
use isoplex_core::io::ReadBytes;

pub(crate) mod co64;
pub(crate) mod ctts;
pub(crate) mod hdlr;
pub(crate) mod mdhd;
pub(crate) mod mdia;
pub(crate) mod minf;
pub(crate) mod moov;
pub(crate) mod stbl;
pub(crate) mod stco;
pub(crate) mod stsc;
pub(crate) mod stsd;
pub(crate) mod stss;
pub(crate) mod stsz;
pub(crate) mod stts;
pub(crate) mod tkhd;
pub(crate) mod trak;

pub use co64::Co64Atom;
pub use ctts::CttsAtom;
pub use hdlr::{HandlerType, HdlrAtom};
pub use mdhd::MdhdAtom;
pub use mdia::MdiaAtom;
pub use minf::MinfAtom;
pub use moov::MoovAtom;
pub use stbl::StblAtom;
pub use stco::StcoAtom;
pub use stsc::StscAtom;
pub use stsd::{ConfigAtom, SampleEntry, StsdAtom};
pub use stss::StssAtom;
pub use stsz::StszAtom;
pub use stts::SttsAtom;
pub use tkhd::TkhdAtom;
pub use trak::TrakAtom;

/// The largest codec configuration box payload that will be read.
pub(crate) const MAX_CONFIG_ATOM_SIZE: u64 = 1024 * 1024;

/// Table atoms never pre-allocate more entries than this. Larger tables grow as they are read.
pub(crate) const MAX_TABLE_PREALLOC: usize = 64 * 1024;

/// Atom types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomType {
    ChunkOffset,
    ChunkOffset64,
    CompositionTimeToSample,
    FileType,
    Free,
    Handler,
    Media,
    MediaData,
    MediaHeader,
    MediaInfo,
    Movie,
    MovieExtends,
    MovieFragment,
    MovieHeader,
    SampleDescription,
    SampleSize,
    SampleTable,
    SampleToChunk,
    SegmentIndex,
    Skip,
    SyncSample,
    TimeToSample,
    Track,
    TrackHeader,
    Other([u8; 4]),
}

impl From<[u8; 4]> for AtomType {
    fn from(val: [u8; 4]) -> Self {
        match &val {
            b"co64" => AtomType::ChunkOffset64,
            b"ctts" => AtomType::CompositionTimeToSample,
            b"free" => AtomType::Free,
            b"ftyp" => AtomType::FileType,
            b"hdlr" => AtomType::Handler,
            b"mdat" => AtomType::MediaData,
            b"mdhd" => AtomType::MediaHeader,
            b"mdia" => AtomType::Media,
            b"minf" => AtomType::MediaInfo,
            b"moof" => AtomType::MovieFragment,
            b"moov" => AtomType::Movie,
            b"mvex" => AtomType::MovieExtends,
            b"mvhd" => AtomType::MovieHeader,
            b"sidx" => AtomType::SegmentIndex,
            b"skip" => AtomType::Skip,
            b"stbl" => AtomType::SampleTable,
            b"stco" => AtomType::ChunkOffset,
            b"stsc" => AtomType::SampleToChunk,
            b"stsd" => AtomType::SampleDescription,
            b"stss" => AtomType::SyncSample,
            b"stsz" => AtomType::SampleSize,
            b"stts" => AtomType::TimeToSample,
            b"tkhd" => AtomType::TrackHeader,
            b"trak" => AtomType::Track,
            _ => AtomType::Other(val),
        }
    }
}

/// Common atom header.
#[derive(Copy, Clone, Debug)]
pub struct AtomHeader {
    /// The atom type.
    pub atom_type: AtomType,
    /// The raw four character code of the atom.
    pub fourcc: FourCc,
    /// The size of all reader headers.
    header_len: u8,
    /// The position of the atom.
    atom_pos: u64,
    /// The total size of the atom including all headers.
    atom_len: Option<NonZeroU64>,
}

impl AtomHeader {
    /// Size of a standard atom header.
    const HEADER_SIZE: u8 = 8;
    /// Size of a standard atom header with a 64-bit size.
    const LARGE_HEADER_SIZE: u8 = AtomHeader::HEADER_SIZE + 8;

    /// Reads an atom header from the provided `ReadBytes`.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<AtomHeader> {
        let atom_pos = reader.pos();

        let atom_len = u64::from(reader.read_be_u32()?);
        let fourcc = reader.read_quad_bytes()?;

        let (header_len, atom_len) = match atom_len {
            0 => {
                // An atom size of 0 indicates the atom spans the remainder of the stream or file.
                (AtomHeader::HEADER_SIZE, None)
            }
            1 => {
                // An atom size of 1 indicates a 64-bit atom size should be read.
                let large_atom_len = reader.read_be_u64()?;

                // The atom size should be atleast the size of the header.
                if large_atom_len < u64::from(AtomHeader::LARGE_HEADER_SIZE) {
                    return decode_error("isomp4: atom size is invalid");
                }

                (AtomHeader::LARGE_HEADER_SIZE, NonZeroU64::new(large_atom_len))
            }
            _ => {
                // The atom size should be atleast the size of the header.
                if atom_len < u64::from(AtomHeader::HEADER_SIZE) {
                    return decode_error("isomp4: atom size is invalid");
                }

                (AtomHeader::HEADER_SIZE, NonZeroU64::new(atom_len))
            }
        };

        Ok(AtomHeader {
            atom_type: AtomType::from(fourcc),
            fourcc: FourCc::new(fourcc),
            atom_pos,
            atom_len,
            header_len,
        })
    }

    /// Get the atom position.
    pub fn atom_pos(&self) -> u64 {
        self.atom_pos
    }

    /// If known, get the total atom size.
    pub fn atom_len(&self) -> Option<u64> {
        self.atom_len.map(NonZeroU64::get)
    }

    /// If the atom size is known, get the total payload data size.
    pub fn data_len(&self) -> Option<u64> {
        self.atom_len.map(|atom_len| atom_len.get() - u64::from(self.header_len))
    }

    /// Given a position, and if the atom size is known, calculate the amount of unread payload
    /// data. A position before the payload is treated as the start of the payload.
    pub fn data_unread_at(&self, pos: u64) -> Option<u64> {
        self.atom_len.map(|atom_len| {
            let data_pos = self.atom_pos + u64::from(self.header_len);
            let data_end = self.atom_pos + atom_len.get();

            data_end - pos.clamp(data_pos, data_end)
        })
    }

    /// Read the version and flags extended atom header fields.
    ///
    /// On success, consumes 4 bytes from the payload size.
    pub fn read_extended_header<B: ReadBytes>(&mut self, reader: &mut B) -> Result<(u8, u32)> {
        // If the payload size is known, then check that 4 bytes of the payload is available to be
        // read as the extended header.
        if let Some(data_len) = self.data_len() {
            if data_len < 4 {
                return decode_error("isomp4: atom too small for extended header");
            }
        }

        let header = (reader.read_u8()?, reader.read_be_u24()?);
        self.header_len += 4;

        Ok(header)
    }

    /// Read the entry count of a table atom whose entries are each `entry_len` bytes, and check it
    /// against the payload size. Must be called after the extended header is read.
    pub fn read_entry_count<B: ReadBytes>(
        &self,
        reader: &mut B,
        entry_len: u64,
        desc: &'static str,
    ) -> Result<u32> {
        let len = match self.data_len() {
            Some(len) if len >= 4 => len,
            Some(_) => return decode_error(desc),
            None => return decode_error("isomp4: expected table atom size to be known"),
        };

        let entry_count = reader.read_be_u32()?;

        if u64::from(entry_count) != (len - 4) / entry_len {
            return decode_error(desc);
        }

        Ok(entry_count)
    }
}

pub trait Atom: Sized {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self>;
}

pub struct AtomIterator<B: ReadBytes> {
    reader: B,
    len: Option<u64>,
    cur_atom: Option<AtomHeader>,
    base_pos: u64,
    next_atom_pos: u64,
}

impl<B: ReadBytes> AtomIterator<B> {
    pub fn new_root(reader: B, len: Option<u64>) -> Self {
        let base_pos = reader.pos();

        AtomIterator { reader, len, cur_atom: None, base_pos, next_atom_pos: base_pos }
    }

    pub fn new(reader: B, parent: AtomHeader) -> Self {
        let base_pos = reader.pos();

        AtomIterator {
            reader,
            len: parent.data_unread_at(base_pos),
            cur_atom: None,
            base_pos,
            next_atom_pos: base_pos,
        }
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.reader
    }

    pub fn next(&mut self) -> Result<Option<AtomHeader>> {
        // Ignore any remaining data in the current atom that was not read.
        let cur_pos = self.reader.pos();

        if cur_pos < self.next_atom_pos {
            self.reader.ignore_bytes(self.next_atom_pos - cur_pos)?;
        }
        else if cur_pos > self.next_atom_pos {
            // Either the atom's length was incorrect or an atom was overread.
            return decode_error("isomp4: overread atom");
        }

        // If len is specified, then do not read more than len bytes.
        if let Some(len) = self.len {
            let consumed = self.next_atom_pos - self.base_pos;

            if consumed >= len {
                return Ok(None);
            }

            // A trailing fragment too small to be an atom header is padding.
            if len - consumed < u64::from(AtomHeader::HEADER_SIZE) {
                self.reader.ignore_bytes(len - consumed)?;
                self.next_atom_pos = self.base_pos + len;
                return Ok(None);
            }
        }

        let atom = AtomHeader::read(&mut self.reader)?;

        // Calculate the start position for the next atom (the exclusive end of the current atom).
        self.next_atom_pos = match atom.atom_len {
            None => {
                // An atom with a length of zero is defined to span to the end of the stream. If
                // len is available, use it for the next atom start position, otherwise, use u64 max
                // which will trip an end of stream error on the next iteration.
                self.len.map(|l| self.base_pos + l).unwrap_or(u64::MAX)
            }
            Some(atom_len) => self.next_atom_pos.saturating_add(atom_len.get()),
        };

        // A child atom may not extend beyond its parent.
        if let Some(len) = self.len {
            if self.next_atom_pos > self.base_pos + len {
                return decode_error("isomp4: atom extends beyond its parent");
            }
        }

        self.cur_atom = Some(atom);

        Ok(self.cur_atom)
    }

    pub fn read_atom<A: Atom>(&mut self) -> Result<A> {
        // The current atom can be read at most once between calls to next.
        match self.cur_atom.take() {
            Some(header) => A::read(&mut self.reader, header),
            None => panic!("isomp4: no current atom to read"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use isoplex_core::io::BufReader;

    use super::{AtomHeader, AtomIterator, AtomType};

    /// Write a box header followed by the payload.
    pub fn write_box(out: &mut Vec<u8>, code: &[u8; 4], payload: &[u8]) {
        out.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
        out.extend_from_slice(code);
        out.extend_from_slice(payload);
    }

    /// Build a box from a code and a list of child boxes.
    pub fn make_box(code: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let payload = children.concat();
        let mut out = Vec::new();
        write_box(&mut out, code, &payload);
        out
    }

    /// Build a full box (version and flags) from a code and a payload.
    pub fn make_full_box(code: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![version];
        payload.extend_from_slice(&flags.to_be_bytes()[1..]);
        payload.extend_from_slice(body);
        let mut out = Vec::new();
        write_box(&mut out, code, &payload);
        out
    }

    /// Concatenate a list of big-endian 32-bit words.
    pub fn be_u32s(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn verify_atom_header() {
        // Standard, large, and open-ended sizes.
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"free");
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&20u64.to_be_bytes());
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"skip");

        let mut iter = AtomIterator::new_root(BufReader::new(&data), Some(data.len() as u64));

        let free = iter.next().unwrap().unwrap();
        assert_eq!(free.atom_type, AtomType::Free);
        assert_eq!(free.data_len(), Some(8));

        let mdat = iter.next().unwrap().unwrap();
        assert_eq!(mdat.atom_type, AtomType::MediaData);
        assert_eq!(mdat.atom_pos(), 16);
        assert_eq!(mdat.data_len(), Some(4));

        let skip = iter.next().unwrap().unwrap();
        assert_eq!(skip.atom_type, AtomType::Skip);
        assert_eq!(skip.atom_len(), None);

        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn verify_invalid_atom_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(b"free");

        let mut reader = BufReader::new(&data);
        assert!(AtomHeader::read(&mut reader).is_err());
    }

    #[test]
    fn verify_child_overflows_parent() {
        // A parent with 12 bytes of payload holding a child claiming 16 bytes.
        let mut data = Vec::new();
        data.extend_from_slice(&20u32.to_be_bytes());
        data.extend_from_slice(b"moov");
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"trak");
        data.extend_from_slice(&[0; 4]);

        let mut reader = BufReader::new(&data);
        let parent = AtomHeader::read(&mut reader).unwrap();
        let mut iter = AtomIterator::new(&mut reader, parent);
        assert!(iter.next().is_err());
    }
}
