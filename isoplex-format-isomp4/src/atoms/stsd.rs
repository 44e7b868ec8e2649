// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::codecs::{AudioEntryInfo, CodecConfig, MediaKind, VideoEntryInfo};
use isoplex_core::common::FourCc;
use isoplex_core::errors::{decode_error, limit_error, unsupported_error, Result};
use isoplex_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, MAX_CONFIG_ATOM_SIZE};

use log::debug;

/// Sample entry codes of visual sample entries.
const VISUAL_SAMPLE_ENTRIES: &[[u8; 4]] = &[
    *b"avc1", *b"avc3", *b"hvc1", *b"hev1", *b"av01", *b"vp08", *b"vp09", *b"mp4v", *b"dvh1",
    *b"dvhe", *b"encv",
];

/// Sample entry codes of audio sample entries.
const AUDIO_SAMPLE_ENTRIES: &[[u8; 4]] = &[
    *b"mp4a", *b"Opus", *b"fLaC", *b"alac", *b"ac-3", *b"ec-3", *b".mp3", *b"lpcm", *b"sowt",
    *b"twos", *b"in24", *b"in32", *b"fl32", *b"fl64", *b"raw ", *b"ulaw", *b"alaw", *b"enca",
];

/// Codes of the codec configuration atoms nested within a sample entry.
const CONFIG_ATOMS: &[[u8; 4]] = &[
    *b"avcC", *b"hvcC", *b"av1C", *b"vpcC", *b"esds", *b"dOps", *b"dfLa", *b"alac", *b"dac3",
    *b"dec3",
];

/// A codec configuration atom, kept as its raw payload.
#[derive(Clone, Debug)]
pub struct ConfigAtom {
    /// The code of the configuration atom.
    pub fourcc: FourCc,
    /// The payload of the configuration atom, excluding the atom header.
    pub data: Box<[u8]>,
}

impl Atom for ConfigAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let len = match header.data_len() {
            Some(len) if len <= MAX_CONFIG_ATOM_SIZE => len,
            Some(_) => return limit_error("isomp4: codec configuration atom is too large"),
            None => return decode_error("isomp4: expected config atom size to be known"),
        };

        let data = reader.read_boxed_slice_exact(len as usize)?;

        Ok(ConfigAtom { fourcc: header.fourcc, data })
    }
}

/// QuickTime decompression parameters atom. May hold the `esds` atom of an audio sample entry.
#[derive(Debug)]
struct WaveAtom {
    config: Option<ConfigAtom>,
}

impl Atom for WaveAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut config = None;

        while let Some(header) = iter.next()? {
            if config.is_none() && header.fourcc.get() == *b"esds" {
                config = Some(iter.read_atom::<ConfigAtom>()?);
            }
        }

        Ok(WaveAtom { config })
    }
}

/// A sample entry: the codec identifier of a track, its generic audio or visual fields, and its
/// codec configuration.
#[derive(Clone, Debug)]
pub struct SampleEntry {
    /// The sample entry code.
    pub fourcc: FourCc,
    pub audio: Option<AudioEntryInfo>,
    pub video: Option<VideoEntryInfo>,
    /// The first codec configuration atom found, if any.
    pub config: Option<ConfigAtom>,
}

impl SampleEntry {
    /// Borrow the sample entry as a `CodecConfig` for a track carrying media of kind `kind`.
    pub fn codec_config(&self, kind: MediaKind) -> CodecConfig<'_> {
        CodecConfig {
            sample_entry: self.fourcc,
            kind,
            audio: self.audio,
            video: self.video,
            config: self.config.as_ref().map(|config| (config.fourcc, &config.data[..])),
        }
    }
}

impl Atom for SampleEntry {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let code = header.fourcc.get();

        if AUDIO_SAMPLE_ENTRIES.contains(&code) {
            read_audio_sample_entry(reader, header)
        }
        else if VISUAL_SAMPLE_ENTRIES.contains(&code) {
            read_visual_sample_entry(reader, header)
        }
        else {
            // The rest of the entry is skipped by the parent iterator.
            debug!("unknown sample entry type {}", header.fourcc);
            Ok(SampleEntry { fourcc: header.fourcc, audio: None, video: None, config: None })
        }
    }
}

/// Read the nested atoms of a sample entry, and keep the first codec configuration atom.
fn read_config_atoms<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Option<ConfigAtom>> {
    let mut iter = AtomIterator::new(reader, header);

    let mut config = None;

    while let Some(entry_header) = iter.next()? {
        if config.is_some() {
            continue;
        }

        let code = entry_header.fourcc.get();

        if CONFIG_ATOMS.contains(&code) {
            config = Some(iter.read_atom::<ConfigAtom>()?);
        }
        else if code == *b"wave" {
            config = iter.read_atom::<WaveAtom>()?.config;
        }
        else {
            debug!("unknown sample entry sub-atom {}", entry_header.fourcc);
        }
    }

    Ok(config)
}

fn read_audio_sample_entry<B: ReadBytes>(
    reader: &mut B,
    header: AtomHeader,
) -> Result<SampleEntry> {
    // SampleEntry portion

    // Reserved. All 0.
    reader.ignore_bytes(6)?;

    // Sample entry data reference.
    let _ = reader.read_be_u16()?;

    // AudioSampleEntry portion

    // The version of the audio sample entry.
    let version = reader.read_be_u16()?;

    // Skip revision and vendor.
    reader.ignore_bytes(6)?;

    let mut channels = reader.read_be_u16()?;
    let sample_size = reader.read_be_u16()?;

    // Skip compression ID and packet size.
    reader.ignore_bytes(4)?;

    // A 16.16 fixed point value. Only the integer part is used.
    let mut sample_rate = reader.read_be_u32()? >> 16;

    match version {
        0 => (),
        1 => {
            // Frames per packet, bytes per packet, bytes per frame, and bytes per sample. These
            // only describe PCM formats.
            reader.ignore_bytes(16)?;
        }
        2 => {
            reader.ignore_bytes(4)?;

            sample_rate = f64::from_bits(reader.read_be_u64()?) as u32;

            channels = match u16::try_from(reader.read_be_u32()?) {
                Ok(channels) => channels,
                Err(_) => return decode_error("isomp4: invalid number of channels"),
            };

            if reader.read_be_u32()? != 0x7f00_0000 {
                return decode_error("isomp4: audio sample entry v2 reserved must be 0x7f00_0000");
            }

            // Bits per channel, format flags, bytes per packet, and frames per packet.
            reader.ignore_bytes(16)?;
        }
        _ => {
            return unsupported_error("isomp4: unknown sample entry version");
        }
    }

    let config = read_config_atoms(reader, header)?;

    Ok(SampleEntry {
        fourcc: header.fourcc,
        audio: Some(AudioEntryInfo { channels, sample_size, sample_rate }),
        video: None,
        config,
    })
}

fn read_visual_sample_entry<B: ReadBytes>(
    reader: &mut B,
    header: AtomHeader,
) -> Result<SampleEntry> {
    // SampleEntry portion

    // Reserved. All 0.
    reader.ignore_bytes(6)?;

    // Sample entry data reference.
    let _ = reader.read_be_u16()?;

    // VisualSampleEntry portion

    // Reserved.
    reader.ignore_bytes(16)?;

    let width = reader.read_be_u16()?;
    let height = reader.read_be_u16()?;

    // Horizontal and vertical resolution, reserved, frame count, compressor name, depth, and
    // pre-defined.
    reader.ignore_bytes(4 + 4 + 4 + 2 + 32 + 2 + 2)?;

    let config = read_config_atoms(reader, header)?;

    Ok(SampleEntry {
        fourcc: header.fourcc,
        audio: None,
        video: Some(VideoEntryInfo { width, height }),
        config,
    })
}

/// Sample description atom.
#[derive(Debug)]
pub struct StsdAtom {
    /// The first sample entry, if any.
    pub sample_entry: Option<SampleEntry>,
}

impl Atom for StsdAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let num_entries = reader.read_be_u32()?;

        if num_entries > 1 {
            debug!("isomp4 (stsd): using the first of {} sample entries", num_entries);
        }

        let mut iter = AtomIterator::new(reader, header);

        let sample_entry = match iter.next()? {
            Some(_) if num_entries > 0 => Some(iter.read_atom::<SampleEntry>()?),
            _ => None,
        };

        // Drain the remaining entries.
        while iter.next()?.is_some() {}

        Ok(StsdAtom { sample_entry })
    }
}

#[cfg(test)]
mod tests {
    use isoplex_core::io::BufReader;

    use super::*;
    use crate::atoms::tests::{make_full_box, write_box};

    fn read_stsd(entry: &[u8]) -> StsdAtom {
        let mut body = 1u32.to_be_bytes().to_vec();
        body.extend_from_slice(entry);

        let data = make_full_box(b"stsd", 0, 0, &body);
        let mut reader = BufReader::new(&data);
        let header = AtomHeader::read(&mut reader).unwrap();
        StsdAtom::read(&mut reader, header).unwrap()
    }

    /// Version 0 audio sample entry fields.
    fn audio_entry_fields(channels: u16, sample_rate: u32) -> Vec<u8> {
        let mut body = vec![0; 6];
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&channels.to_be_bytes());
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&(sample_rate << 16).to_be_bytes());
        body
    }

    #[test]
    fn verify_audio_sample_entry() {
        let mut body = audio_entry_fields(2, 44_100);
        write_box(&mut body, b"btrt", &[0; 12]);
        write_box(&mut body, b"dOps", &[0, 2, 1, 56]);

        let mut entry = Vec::new();
        write_box(&mut entry, b"Opus", &body);

        let stsd = read_stsd(&entry);
        let entry = stsd.sample_entry.unwrap();

        assert_eq!(entry.fourcc, FourCc::new(*b"Opus"));
        assert_eq!(
            entry.audio,
            Some(AudioEntryInfo { channels: 2, sample_size: 16, sample_rate: 44_100 })
        );

        let config = entry.config.unwrap();
        assert_eq!(config.fourcc, FourCc::new(*b"dOps"));
        assert_eq!(&config.data[..], &[0, 2, 1, 56]);
    }

    #[test]
    fn verify_wave_nested_esds() {
        let mut wave = Vec::new();
        write_box(&mut wave, b"frma", b"mp4a");
        write_box(&mut wave, b"esds", &[0, 0, 0, 0, 3]);

        let mut body = audio_entry_fields(1, 8_000);
        write_box(&mut body, b"wave", &wave);

        let mut entry = Vec::new();
        write_box(&mut entry, b"mp4a", &body);

        let config = read_stsd(&entry).sample_entry.unwrap().config.unwrap();
        assert_eq!(config.fourcc, FourCc::new(*b"esds"));
        assert_eq!(&config.data[..], &[0, 0, 0, 0, 3]);
    }

    #[test]
    fn verify_visual_sample_entry() {
        let mut body = vec![0; 6 + 2 + 16];
        body.extend_from_slice(&1920u16.to_be_bytes());
        body.extend_from_slice(&1080u16.to_be_bytes());
        body.extend_from_slice(&[0; 50]);
        write_box(&mut body, b"avcC", &[1, 100, 0, 40]);

        let mut entry = Vec::new();
        write_box(&mut entry, b"avc1", &body);

        let entry = read_stsd(&entry).sample_entry.unwrap();
        assert_eq!(entry.video, Some(VideoEntryInfo { width: 1920, height: 1080 }));
        assert_eq!(entry.audio, None);

        let config = entry.codec_config(MediaKind::Video);
        assert_eq!(config.config, Some((FourCc::new(*b"avcC"), &[1u8, 100, 0, 40][..])));
    }

    #[test]
    fn verify_unknown_sample_entry() {
        let mut entry = Vec::new();
        write_box(&mut entry, b"tx3g", &[0; 16]);

        let entry = read_stsd(&entry).sample_entry.unwrap();
        assert_eq!(entry.fourcc, FourCc::new(*b"tx3g"));
        assert!(entry.config.is_none());
    }
}
