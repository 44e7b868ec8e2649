// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `packet` module defines the packet structure.

use crate::units::{Duration, TimeBase, TimeStamp};

/// A `Packet` contains the data of exactly one sample of a track, as stored in the container, along
/// with its timing.
///
/// # Timing
///
/// Timing is held in ticks of the originating track's `TimeBase` and is only converted into seconds
/// when requested.
///
/// * **Decode Timestamp (DTS):** The time relative to the start of the track that the packet
///   should be decoded.
///
/// * **Presentation Offset:** The presentation time minus the decode time. Non-zero when the track
///   reorders frames (e.g., video with B-frames). May be negative.
///
/// * **Duration:** The decode duration of the sample.
#[derive(Clone)]
pub struct Packet {
    /// The index of the stream within the demuxer's active stream list.
    stream_index: usize,
    /// The time base of the originating track.
    time_base: TimeBase,
    /// The decode timestamp (DTS) of the packet in `TimeBase` units.
    pub dts: TimeStamp,
    /// The presentation offset of the packet in `TimeBase` units.
    pub pts_offset: i64,
    /// The duration of the packet in `TimeBase` units.
    pub dur: Duration,
    /// Is the packet a sync sample.
    keyframe: bool,
    /// The packet data buffer.
    pub data: Box<[u8]>,
}

impl Packet {
    /// Create a new `Packet` from a slice.
    pub fn new_from_slice(
        stream_index: usize,
        time_base: TimeBase,
        dts: TimeStamp,
        dur: Duration,
        buf: &[u8],
    ) -> Self {
        Packet::new_from_boxed_slice(stream_index, time_base, dts, dur, Box::from(buf))
    }

    /// Create a new `Packet` from a boxed slice.
    pub fn new_from_boxed_slice(
        stream_index: usize,
        time_base: TimeBase,
        dts: TimeStamp,
        dur: Duration,
        data: Box<[u8]>,
    ) -> Self {
        Packet { stream_index, time_base, dts, pts_offset: 0, dur, keyframe: true, data }
    }

    /// Set the presentation offset in `TimeBase` units.
    pub fn with_pts_offset(mut self, pts_offset: i64) -> Self {
        self.pts_offset = pts_offset;
        self
    }

    /// Set if the packet is a sync sample.
    pub fn with_keyframe(mut self, keyframe: bool) -> Self {
        self.keyframe = keyframe;
        self
    }

    /// The index of the stream this packet belongs to.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// The time base of the stream this packet belongs to.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Get the decode timestamp (DTS) of the packet in `TimeBase` units.
    pub fn dts(&self) -> TimeStamp {
        self.dts
    }

    /// Get the presentation offset of the packet in `TimeBase` units.
    pub fn pts_offset(&self) -> i64 {
        self.pts_offset
    }

    /// Get the duration of the packet in `TimeBase` units.
    pub fn dur(&self) -> Duration {
        self.dur
    }

    /// Get the decode time of the packet in seconds.
    pub fn decode_time(&self) -> f64 {
        self.time_base.calc_time(self.dts).as_secs_f64()
    }

    /// Get the presentation offset of the packet in seconds.
    pub fn presentation_offset(&self) -> f64 {
        self.time_base.calc_secs_signed(self.pts_offset)
    }

    /// Get the presentation time of the packet in seconds.
    pub fn presentation_time(&self) -> f64 {
        self.decode_time() + self.presentation_offset()
    }

    /// Get the duration of the packet in seconds.
    pub fn duration(&self) -> f64 {
        self.time_base.calc_time(self.dur).as_secs_f64()
    }

    /// If true, the packet is a sync sample and decoding may start from it.
    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    /// Get an immutable slice to the packet buffer.
    pub fn buf(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::Packet;
    use crate::units::TimeBase;

    #[test]
    fn verify_packet_times() {
        let tb = TimeBase::from_timescale(1000).unwrap();

        let packet = Packet::new_from_slice(1, tb, 2000, 1000, &[1, 2, 3])
            .with_pts_offset(-500)
            .with_keyframe(false);

        assert_eq!(packet.stream_index(), 1);
        assert_eq!(packet.decode_time(), 2.0);
        assert_eq!(packet.presentation_offset(), -0.5);
        assert_eq!(packet.presentation_time(), 1.5);
        assert_eq!(packet.duration(), 1.0);
        assert!(!packet.is_keyframe());
        assert_eq!(packet.buf(), &[1, 2, 3]);
    }
}
