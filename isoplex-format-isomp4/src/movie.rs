// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::codecs::MediaKind;
use isoplex_core::errors::{decode_error, unsupported_error, Result};
use isoplex_core::io::ReadBytes;

use log::debug;

use crate::atoms::{AtomIterator, AtomType, HandlerType, MoovAtom, SampleEntry, TrakAtom};
use crate::table::SampleTable;

/// The description of one track of a movie.
#[derive(Debug)]
pub struct TrackDesc {
    /// The track identifier from the track header.
    pub track_id: u32,
    /// The handler of the track media.
    pub handler: HandlerType,
    /// Ticks per second of the track media.
    pub timescale: u32,
    /// The duration of the track in ticks.
    pub duration: u64,
    /// The ISO-639-2/T language of the track, if valid.
    pub language: Option<String>,
    /// The first sample entry of the track, if any.
    pub sample_entry: Option<SampleEntry>,
    /// The sample tables of the track. Not yet validated.
    pub table: SampleTable,
}

impl TrackDesc {
    fn from_trak(trak: TrakAtom) -> TrackDesc {
        let mdia = trak.mdia;
        let stbl = mdia.minf.stbl;

        let table = SampleTable {
            chunk_offsets: stbl.chunk_offsets(),
            sample_to_chunk: stbl.stsc.entries,
            sample_sizes: stbl.stsz.sample_sizes,
            time_to_sample: stbl.stts.entries,
            composition_offsets: stbl.ctts.map(|ctts| ctts.entries),
            sync_samples: stbl.stss.map(|stss| stss.sample_numbers),
            timescale: mdia.mdhd.timescale,
        };

        // Prefer the media header duration, unless it is unknown or zero.
        let duration = match mdia.mdhd.duration {
            Some(duration) if duration > 0 => duration,
            _ => stbl.stts.total_duration,
        };

        TrackDesc {
            track_id: trak.tkhd.id,
            handler: mdia.hdlr.handler_type,
            timescale: mdia.mdhd.timescale,
            duration,
            language: mdia.mdhd.language,
            sample_entry: stbl.stsd.sample_entry,
            table,
        }
    }

    /// Gets the kind of media carried by the track.
    pub fn kind(&self) -> MediaKind {
        self.handler.media_kind()
    }
}

/// The tracks of a movie, in file order.
#[derive(Debug)]
pub struct Movie {
    pub tracks: Vec<TrackDesc>,
}

/// Read the movie metadata from a stream of `len` bytes, if known. Top-level atoms other than the
/// movie atom are skipped.
pub fn read_movie<B: ReadBytes>(reader: &mut B, len: Option<u64>) -> Result<Movie> {
    let mut iter = AtomIterator::new_root(reader, len);

    let mut moov = None;

    while let Some(header) = iter.next()? {
        match header.atom_type {
            AtomType::Movie => {
                moov = Some(iter.read_atom::<MoovAtom>()?);
                break;
            }
            AtomType::MovieFragment | AtomType::SegmentIndex => {
                return unsupported_error("isomp4: fragmented movies");
            }
            _ => {
                debug!("skipping top-level atom: {:?}", header.atom_type);
            }
        }
    }

    let Some(moov) = moov
    else {
        return decode_error("isomp4: missing moov atom");
    };

    if moov.is_fragmented {
        return unsupported_error("isomp4: fragmented movies");
    }

    let tracks = moov.traks.into_iter().map(TrackDesc::from_trak).collect();

    Ok(Movie { tracks })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use isoplex_core::common::FourCc;
    use isoplex_core::errors::Error;
    use isoplex_core::io::{BufReader, MediaSourceStream};

    use super::*;
    use crate::atoms::tests::{be_u32s, make_box, make_full_box, write_box};
    use crate::table::SampleSizes;

    /// A track to write into a test movie. Every sample has the same duration. Chunks hold the
    /// same number of samples, and are written back-to-back in the media data.
    pub struct TestTrack {
        pub id: u32,
        pub handler: [u8; 4],
        pub timescale: u32,
        pub sample_duration: u32,
        pub samples_per_chunk: u32,
        pub sizes: Vec<u32>,
        pub sync: Option<Vec<u32>>,
        /// The complete sample entry atom.
        pub entry: Vec<u8>,
        /// Each byte of a sample is this value plus the sample number.
        pub fill: u8,
    }

    impl TestTrack {
        fn n_chunks(&self) -> usize {
            self.sizes.len().div_ceil(self.samples_per_chunk as usize)
        }

        fn make_trak(&self, chunk_offsets: &[u32]) -> Vec<u8> {
            let n = self.sizes.len() as u32;

            let mut tkhd = vec![0; 8];
            tkhd.extend_from_slice(&be_u32s(&[self.id, 0, n * self.sample_duration]));
            tkhd.extend_from_slice(&[0; 60]);

            let mut mdhd = vec![0; 8];
            mdhd.extend_from_slice(&be_u32s(&[self.timescale, n * self.sample_duration]));
            mdhd.extend_from_slice(&[0x55, 0xc4, 0, 0]);

            let mut hdlr = vec![0; 4];
            hdlr.extend_from_slice(&self.handler);
            hdlr.extend_from_slice(&[0; 13]);

            let mut stsd = be_u32s(&[1]);
            stsd.extend_from_slice(&self.entry);

            let mut stsz = be_u32s(&[0, n]);
            stsz.extend_from_slice(&be_u32s(&self.sizes));

            let mut stco = be_u32s(&[chunk_offsets.len() as u32]);
            stco.extend_from_slice(&be_u32s(chunk_offsets));

            let mut stbl = vec![
                make_full_box(b"stsd", 0, 0, &stsd),
                make_full_box(b"stts", 0, 0, &be_u32s(&[1, n, self.sample_duration])),
                make_full_box(b"stsc", 0, 0, &be_u32s(&[1, 1, self.samples_per_chunk, 1])),
                make_full_box(b"stsz", 0, 0, &stsz),
                make_full_box(b"stco", 0, 0, &stco),
            ];

            if let Some(sync) = &self.sync {
                let mut stss = be_u32s(&[sync.len() as u32]);
                stss.extend_from_slice(&be_u32s(sync));
                stbl.push(make_full_box(b"stss", 0, 0, &stss));
            }

            let minf = make_box(b"minf", &[make_box(b"stbl", &stbl)]);

            let mdia = make_box(
                b"mdia",
                &[make_full_box(b"mdhd", 0, 0, &mdhd), make_full_box(b"hdlr", 0, 0, &hdlr), minf],
            );

            make_box(b"trak", &[make_full_box(b"tkhd", 0, 3, &tkhd), mdia])
        }

        /// Gets the media data of each chunk.
        fn chunks(&self) -> Vec<Vec<u8>> {
            let mut chunks = vec![Vec::new(); self.n_chunks()];

            for (i, &size) in self.sizes.iter().enumerate() {
                let value = self.fill.wrapping_add(i as u8);
                chunks[i / self.samples_per_chunk as usize]
                    .extend(std::iter::repeat(value).take(size as usize));
            }

            chunks
        }
    }

    /// Write a complete movie file with the media data after the movie atom.
    pub fn make_movie(tracks: &[TestTrack]) -> Vec<u8> {
        let mut ftyp = Vec::new();
        write_box(&mut ftyp, b"ftyp", b"isom\0\0\0\0isom");

        let build_moov = |offsets: &[Vec<u32>]| {
            let traks: Vec<Vec<u8>> =
                tracks.iter().zip(offsets).map(|(track, offsets)| track.make_trak(offsets)).collect();
            make_box(b"moov", &traks)
        };

        // The size of the movie atom does not depend on the offset values.
        let placeholder: Vec<Vec<u32>> =
            tracks.iter().map(|track| vec![0; track.n_chunks()]).collect();
        let moov_len = build_moov(&placeholder).len();

        let mut pos = (ftyp.len() + moov_len + 8) as u32;
        let mut mdat = Vec::new();
        let mut offsets = Vec::new();

        for track in tracks {
            let mut track_offsets = Vec::new();

            for chunk in track.chunks() {
                track_offsets.push(pos);
                pos += chunk.len() as u32;
                mdat.extend_from_slice(&chunk);
            }

            offsets.push(track_offsets);
        }

        let mut file = ftyp;
        file.extend_from_slice(&build_moov(&offsets));
        write_box(&mut file, b"mdat", &mdat);
        file
    }

    /// A version 0 audio sample entry with a nested configuration atom.
    pub fn audio_entry(code: &[u8; 4], config_code: &[u8; 4], config: &[u8]) -> Vec<u8> {
        let mut body = vec![0; 6];
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&2u16.to_be_bytes());
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&(48_000u32 << 16).to_be_bytes());
        write_box(&mut body, config_code, config);

        let mut entry = Vec::new();
        write_box(&mut entry, code, &body);
        entry
    }

    /// A visual sample entry with a nested configuration atom.
    pub fn visual_entry(code: &[u8; 4], config_code: &[u8; 4], config: &[u8]) -> Vec<u8> {
        let mut body = vec![0; 6 + 2 + 16];
        body.extend_from_slice(&320u16.to_be_bytes());
        body.extend_from_slice(&240u16.to_be_bytes());
        body.extend_from_slice(&[0; 50]);
        write_box(&mut body, config_code, config);

        let mut entry = Vec::new();
        write_box(&mut entry, code, &body);
        entry
    }

    /// A video track of 3 samples at 0.5s each with sync samples 1 and 3, and an audio track of 4
    /// samples at 0.25s each.
    pub fn av_tracks() -> Vec<TestTrack> {
        vec![
            TestTrack {
                id: 1,
                handler: *b"vide",
                timescale: 1000,
                sample_duration: 500,
                samples_per_chunk: 3,
                sizes: vec![4, 5, 6],
                sync: Some(vec![1, 3]),
                entry: visual_entry(b"avc1", b"avcC", &[1, 66, 0, 30]),
                fill: 0xa0,
            },
            TestTrack {
                id: 2,
                handler: *b"soun",
                timescale: 8000,
                sample_duration: 2000,
                samples_per_chunk: 2,
                sizes: vec![2, 2, 2, 2],
                sync: None,
                entry: audio_entry(b"Opus", b"dOps", &[0, 2, 1, 56]),
                fill: 0xb0,
            },
        ]
    }

    #[test]
    fn verify_read_movie() {
        let file = make_movie(&av_tracks());

        let mut mss = MediaSourceStream::new(Box::new(Cursor::new(file.clone())), Default::default());
        let movie = read_movie(&mut mss, Some(file.len() as u64)).unwrap();

        assert_eq!(movie.tracks.len(), 2);

        let video = &movie.tracks[0];
        assert_eq!(video.track_id, 1);
        assert_eq!(video.kind(), MediaKind::Video);
        assert_eq!(video.timescale, 1000);
        assert_eq!(video.duration, 1500);
        assert_eq!(video.language.as_deref(), Some("und"));
        assert_eq!(video.table.sample_sizes, SampleSizes::Variable(vec![4, 5, 6]));
        assert_eq!(video.table.sync_samples, Some(vec![1, 3]));
        assert_eq!(video.sample_entry.as_ref().unwrap().fourcc, FourCc::new(*b"avc1"));
        video.table.validate(0).unwrap();

        let audio = &movie.tracks[1];
        assert_eq!(audio.kind(), MediaKind::Audio);
        assert_eq!(audio.table.chunk_offsets.len(), 2);
        assert_eq!(audio.table.chunk_offsets[1] - audio.table.chunk_offsets[0], 4);
        assert_eq!(audio.table.sync_samples, None);
        audio.table.validate(1).unwrap();

        // The first video sample follows the media data atom header.
        let mdat_pos = file.len() - 15 - 8 - 8;
        assert_eq!(video.table.chunk_offsets, vec![mdat_pos as u64 + 8]);
        assert_eq!(file[mdat_pos + 8], 0xa0);
    }

    #[test]
    fn verify_missing_moov() {
        let mut file = Vec::new();
        write_box(&mut file, b"ftyp", b"isom\0\0\0\0");
        write_box(&mut file, b"mdat", &[0; 32]);

        let mut reader = BufReader::new(&file);
        match read_movie(&mut reader, Some(file.len() as u64)) {
            Err(Error::StructuralError { track: None, .. }) => (),
            other => panic!("expected a structural error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn verify_malformed_track_scoped() {
        // The second track has a header but no media atom.
        let mut tkhd = vec![0; 8];
        tkhd.extend_from_slice(&be_u32s(&[2, 0, 0]));
        tkhd.extend_from_slice(&[0; 60]);

        let broken = make_box(b"trak", &[make_full_box(b"tkhd", 0, 3, &tkhd)]);
        let moov = make_box(b"moov", &[av_tracks()[0].make_trak(&[0]), broken]);

        let mut reader = BufReader::new(&moov);
        match read_movie(&mut reader, Some(moov.len() as u64)) {
            Err(Error::StructuralError { track: Some(1), .. }) => (),
            other => panic!("expected a structural error for track 1, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn verify_fragmented_unsupported() {
        let moov = make_box(b"moov", &[make_box(b"mvex", &[])]);

        let mut reader = BufReader::new(&moov);
        match read_movie(&mut reader, Some(moov.len() as u64)) {
            Err(Error::Unsupported(_)) => (),
            other => panic!("expected an unsupported error, got {:?}", other.map(|_| ())),
        }
    }
}
