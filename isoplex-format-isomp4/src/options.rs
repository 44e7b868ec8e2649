// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Options controlling how strictly a movie is demuxed.
#[derive(Copy, Clone, Debug)]
pub struct DemuxOptions {
    /// If true, a track whose codec configuration cannot be decoded fails the demuxer. Otherwise,
    /// the track is excluded.
    pub strict_codecs: bool,
    /// If true, a track with inconsistent or oversized sample tables fails the demuxer. Otherwise,
    /// the track is excluded.
    pub strict_tables: bool,
    /// The largest sample, in bytes, that will be read into a packet.
    pub max_packet_len: u32,
    /// The largest number of entries any one sample table of a track may have.
    pub max_table_entries: u32,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        DemuxOptions {
            strict_codecs: false,
            strict_tables: true,
            max_packet_len: 64 * 1024 * 1024,
            max_table_entries: 64 * 1024 * 1024,
        }
    }
}
