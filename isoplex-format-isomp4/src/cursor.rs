// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sample navigation within a single track.

use std::io::{Read, Seek, SeekFrom};

use isoplex_core::errors::{decode_error, lookup_error, sample_limit_error, Result, SampleTableKind};
use isoplex_core::packet::Packet;
use isoplex_core::units::{Time, TimeBase, TimeStamp};

use log::trace;

use crate::options::DemuxOptions;
use crate::table::{SampleSizes, SampleTable};

/// A position within a run-length table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunPos {
    /// Index of the run.
    pub idx: usize,
    /// Position of the sample within the run.
    pub pos: u32,
}

/// The position of a cursor within every sample table of a track.
///
/// A state is either valid, and all of its indices agree on the same sample, or it is past the
/// last sample.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CursorState {
    /// Zero-based sample number.
    pub sample: u32,
    /// Zero-based chunk number.
    pub chunk: usize,
    /// Index of the sample-to-chunk run containing `chunk`.
    pub stsc_idx: usize,
    /// Position of the sample within its chunk.
    pub sample_in_chunk: u32,
    /// Byte offset of the sample from the start of its chunk.
    pub offset_in_chunk: u64,
    /// Position within the time-to-sample runs.
    pub stts: RunPos,
    /// Decode timestamp of the sample.
    pub dts: TimeStamp,
    /// Position within the composition offset runs, if the track has them.
    pub ctts: Option<RunPos>,
    /// Index of the last sync sample at or before the sample, or 0 if there is none, if the track
    /// has a sync sample table.
    pub sync: Option<usize>,
}

/// Locate the run containing `sample` in a run-length table given as `(count, value)` pairs.
/// Returns the run position, and the sum of the values of all samples before the run.
fn locate_run<I>(runs: I, sample: u64) -> Option<(RunPos, u64)>
where
    I: Iterator<Item = (u32, u64)>,
{
    let mut first_sample = 0u64;
    let mut acc = 0u64;

    for (idx, (count, value)) in runs.enumerate() {
        let count = u64::from(count);

        if sample < first_sample + count {
            let pos = (sample - first_sample) as u32;
            return Some((RunPos { idx, pos }, acc));
        }

        first_sample += count;
        acc = acc.saturating_add(count.saturating_mul(value));
    }

    None
}

impl CursorState {
    /// Build the state of sample `sample` directly from the tables. Returns the table the sample
    /// could not be located in on failure.
    pub fn at_sample(table: &SampleTable, sample: u32) -> std::result::Result<Self, SampleTableKind> {
        let target = u64::from(sample);

        // Chunk position.
        let mut first_sample = 0u64;
        let mut chunk_pos = None;

        for (stsc_idx, entry) in table.sample_to_chunk.iter().enumerate() {
            let run_samples = table.run_sample_count(stsc_idx);

            if target < first_sample + run_samples {
                let spc = u64::from(entry.samples_per_chunk);
                let rel = target - first_sample;
                let first_chunk = u64::from(entry.first_chunk).saturating_sub(1);

                chunk_pos = Some((stsc_idx, (first_chunk + rel / spc) as usize, (rel % spc) as u32));
                break;
            }

            first_sample += run_samples;
        }

        let Some((stsc_idx, chunk, sample_in_chunk)) = chunk_pos
        else {
            return Err(SampleTableKind::SampleToChunk);
        };

        if chunk >= table.chunk_offsets.len() {
            return Err(SampleTableKind::ChunkOffset);
        }

        // Sum the sizes of the preceeding samples in the same chunk.
        let offset_in_chunk = match &table.sample_sizes {
            SampleSizes::Constant(size) => u64::from(sample_in_chunk) * u64::from(*size),
            SampleSizes::Variable(sizes) => {
                let first = (sample - sample_in_chunk) as usize;

                match sizes.get(first..sample as usize + 1) {
                    Some(sizes) => {
                        sizes[..sizes.len() - 1].iter().map(|&size| u64::from(size)).sum()
                    }
                    None => return Err(SampleTableKind::SampleSize),
                }
            }
        };

        // Decode time.
        let stts_runs =
            table.time_to_sample.iter().map(|entry| (entry.count, u64::from(entry.duration)));

        let Some((stts, ticks)) = locate_run(stts_runs, target)
        else {
            return Err(SampleTableKind::TimeToSample);
        };

        let duration = u64::from(table.time_to_sample[stts.idx].duration);
        let dts = ticks.saturating_add(u64::from(stts.pos) * duration);

        // Composition offset.
        let ctts = match &table.composition_offsets {
            Some(offsets) => {
                let runs = offsets.iter().map(|entry| (entry.count, 0));

                match locate_run(runs, target) {
                    Some((pos, _)) => Some(pos),
                    None => return Err(SampleTableKind::CompositionOffset),
                }
            }
            None => None,
        };

        // The last sync sample at or before the sample. Sync sample numbers are 1-based.
        let sync = table.sync_samples.as_ref().map(|sync| {
            sync.partition_point(|&number| u64::from(number) <= target + 1).saturating_sub(1)
        });

        Ok(CursorState {
            sample,
            chunk,
            stsc_idx,
            sample_in_chunk,
            offset_in_chunk,
            stts,
            dts,
            ctts,
            sync,
        })
    }

    /// Returns true if the state refers to an existing sample.
    ///
    /// For a validated table, the chunk index runs out exactly when the samples do.
    pub fn is_valid(&self, table: &SampleTable) -> bool {
        self.chunk < table.chunk_offsets.len()
            && self.stsc_idx < table.sample_to_chunk.len()
            && self.stts.idx < table.time_to_sample.len()
            && match (&self.ctts, &table.composition_offsets) {
                (Some(ctts), Some(offsets)) => ctts.idx < offsets.len(),
                (None, None) => true,
                _ => false,
            }
    }

    /// Gets the size of the sample.
    pub fn sample_size(&self, table: &SampleTable) -> Option<u32> {
        match &table.sample_sizes {
            SampleSizes::Constant(size) => Some(*size),
            SampleSizes::Variable(sizes) => sizes.get(self.sample as usize).copied(),
        }
    }

    /// Returns true if the sample is a sync sample.
    pub fn is_sync(&self, table: &SampleTable) -> bool {
        match (&table.sync_samples, self.sync) {
            (Some(sync), Some(k)) => sync.get(k) == Some(&(self.sample + 1)),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Gets the composition offset of the sample.
    pub fn composition_offset(&self, table: &SampleTable) -> i64 {
        match (&table.composition_offsets, &self.ctts) {
            (Some(offsets), Some(ctts)) => offsets.get(ctts.idx).map_or(0, |entry| entry.offset),
            _ => 0,
        }
    }

    /// Move to the next sample, and return the decode duration of the sample moved past. Does
    /// nothing if the state is not valid.
    pub fn advance(&mut self, table: &SampleTable) -> u64 {
        if !self.is_valid(table) {
            return 0;
        }

        let size = self.sample_size(table).unwrap_or(0);
        let duration = u64::from(table.time_to_sample[self.stts.idx].duration);

        self.sample += 1;

        // Chunk position.
        self.sample_in_chunk += 1;
        self.offset_in_chunk += u64::from(size);

        if self.sample_in_chunk >= table.sample_to_chunk[self.stsc_idx].samples_per_chunk {
            self.chunk += 1;
            self.sample_in_chunk = 0;
            self.offset_in_chunk = 0;

            if let Some(next) = table.sample_to_chunk.get(self.stsc_idx + 1) {
                if self.chunk as u64 + 1 >= u64::from(next.first_chunk) {
                    self.stsc_idx += 1;
                }
            }
        }

        // Decode time. Runs with no samples are skipped.
        self.dts = self.dts.saturating_add(duration);
        self.stts.pos += 1;

        while let Some(entry) = table.time_to_sample.get(self.stts.idx) {
            if self.stts.pos < entry.count {
                break;
            }
            self.stts = RunPos { idx: self.stts.idx + 1, pos: 0 };
        }

        // Composition offset.
        if let (Some(ctts), Some(offsets)) = (&mut self.ctts, &table.composition_offsets) {
            ctts.pos += 1;

            while let Some(entry) = offsets.get(ctts.idx) {
                if ctts.pos < entry.count {
                    break;
                }
                *ctts = RunPos { idx: ctts.idx + 1, pos: 0 };
            }
        }

        // Sync sample.
        if let (Some(k), Some(sync)) = (&mut self.sync, &table.sync_samples) {
            if let Some(&next) = sync.get(*k + 1) {
                if next <= self.sample + 1 {
                    *k += 1;
                }
            }
        }

        duration
    }
}

/// A `StreamCursor` navigates the samples of one track, and reads them as packets.
pub struct StreamCursor {
    /// Index of the track within the movie.
    track: usize,
    /// Index of the stream packets are attributed to.
    stream_index: usize,
    table: SampleTable,
    sample_count: u32,
    time_base: TimeBase,
    state: CursorState,
    max_packet_len: u32,
}

impl StreamCursor {
    /// Create a cursor over the sample tables of the track `track`, positioned at the first
    /// sample. The tables are validated first.
    pub fn new(track: usize, table: SampleTable, opts: &DemuxOptions) -> Result<Self> {
        table.validate(track)?;

        let Some(time_base) = TimeBase::from_timescale(table.timescale)
        else {
            return decode_error("isomp4: timescale is zero");
        };

        let mut cursor = StreamCursor {
            track,
            stream_index: track,
            sample_count: table.sample_count(),
            table,
            time_base,
            state: CursorState::default(),
            max_packet_len: opts.max_packet_len,
        };

        if cursor.sample_count() > 0 {
            cursor.set_sample_index(0)?;
        }

        Ok(cursor)
    }

    /// Set the stream index attributed to the packets read by the cursor.
    pub(crate) fn set_stream_index(&mut self, stream_index: usize) {
        self.stream_index = stream_index;
    }

    /// Gets the index of the track within the movie.
    pub fn track(&self) -> usize {
        self.track
    }

    /// Gets the sample tables.
    pub fn table(&self) -> &SampleTable {
        &self.table
    }

    /// Gets the time base of the track.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Gets the current state.
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Gets the number of samples in the track.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Gets the index of the current sample.
    pub fn sample_index(&self) -> u32 {
        self.state.sample
    }

    /// Gets the decode timestamp of the current sample.
    pub fn dts(&self) -> TimeStamp {
        self.state.dts
    }

    /// Gets the decode time of the current sample in seconds.
    pub fn decode_time(&self) -> f64 {
        self.time_base.calc_time(self.state.dts).as_secs_f64()
    }

    /// Returns true if the cursor refers to an existing sample.
    pub fn is_valid(&self) -> bool {
        self.state.is_valid(&self.table)
    }

    /// Position the cursor at the sample `sample`.
    pub fn set_sample_index(&mut self, sample: u32) -> Result<()> {
        match CursorState::at_sample(&self.table, sample) {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(kind) => lookup_error(self.track, sample, kind),
        }
    }

    /// Move to the next sample, and return the decode duration of the sample moved past.
    pub fn advance(&mut self) -> u64 {
        self.state.advance(&self.table)
    }

    /// Read the current sample from `source` as a packet, and advance the cursor. Returns `None`
    /// once every sample has been read. On error, the cursor is left on the current sample.
    pub fn read_packet<R: Read + Seek>(&mut self, source: &mut R) -> Result<Option<Packet>> {
        if !self.is_valid() {
            return Ok(None);
        }

        let sample = self.state.sample;

        let Some(size) = self.state.sample_size(&self.table)
        else {
            return lookup_error(self.track, sample, SampleTableKind::SampleSize);
        };

        if size > self.max_packet_len {
            return sample_limit_error(self.track, sample, size);
        }

        let Some(&chunk_offset) = self.table.chunk_offsets.get(self.state.chunk)
        else {
            return lookup_error(self.track, sample, SampleTableKind::ChunkOffset);
        };

        let Some(pos) = chunk_offset.checked_add(self.state.offset_in_chunk)
        else {
            return decode_error("isomp4: sample position overflows");
        };

        source.seek(SeekFrom::Start(pos))?;

        let mut data = vec![0; size as usize];
        source.read_exact(&mut data)?;

        let dts = self.state.dts;
        let keyframe = self.state.is_sync(&self.table);
        let pts_offset = self.state.composition_offset(&self.table);

        let dur = self.advance();

        trace!(
            "track {}: sample {} at {} (len={}, dts={}, keyframe={})",
            self.track,
            sample,
            pos,
            size,
            dts,
            keyframe
        );

        let packet = Packet::new_from_boxed_slice(
            self.stream_index,
            self.time_base,
            dts,
            dur,
            data.into_boxed_slice(),
        );

        Ok(Some(packet.with_pts_offset(pts_offset).with_keyframe(keyframe)))
    }

    /// Gets the index of the sample to seek to for the time `time` in seconds.
    ///
    /// This is the last sample whose decode time is at or before `time`, moved back to the nearest
    /// preceeding sync sample. If no sync sample preceeds it, the first sync sample is used. Times
    /// past the end of the track map to the last sample.
    pub fn time_to_sample_index(&self, time: f64) -> u32 {
        let ticks = if time.is_finite() {
            self.time_base.calc_timestamp(Time::from(time))
        }
        else if time > 0.0 {
            u64::MAX
        }
        else {
            0
        };

        self.ts_to_sample_index(ticks)
    }

    /// Gets the index of the sample to seek to for the decode timestamp `ticks`, in ticks of the track
    /// time base. Sync samples are handled as in `time_to_sample_index`.
    pub fn ts_to_sample_index(&self, ticks: TimeStamp) -> u32 {
        let count = self.sample_count();

        if count == 0 {
            return 0;
        }

        let mut first_sample = 0u64;
        let mut first_tick = 0u64;
        let mut index = None;

        for entry in &self.table.time_to_sample {
            let run_count = u64::from(entry.count);
            let run_ticks = run_count.saturating_mul(u64::from(entry.duration));

            if entry.duration > 0 && ticks < first_tick.saturating_add(run_ticks) {
                let pos = (ticks - first_tick) / u64::from(entry.duration);
                index = Some(first_sample + pos);
                break;
            }

            first_sample += run_count;
            first_tick = first_tick.saturating_add(run_ticks);
        }

        let index = index.unwrap_or(u64::MAX).min(u64::from(count - 1)) as u32;

        match &self.table.sync_samples {
            Some(sync) => {
                let k = sync.partition_point(|&number| number <= index + 1);

                match (k.checked_sub(1).and_then(|k| sync.get(k)), sync.first()) {
                    (Some(&number), _) => number - 1,
                    (None, Some(&first)) => first - 1,
                    (None, None) => 0,
                }
            }
            None => index,
        }
    }

    /// Position the cursor at the sample to seek to for the time `time` in seconds. A track with
    /// no samples is left as-is.
    pub fn seek_to_time(&mut self, time: f64) -> Result<()> {
        if self.sample_count() == 0 {
            return Ok(());
        }

        let sample = self.time_to_sample_index(time);

        trace!("track {}: seeking to sample {} for time {}", self.track, sample, time);

        self.set_sample_index(sample)
    }

    /// Position the cursor at the sample to seek to for the instant `ts` in ticks of `time_base`.
    /// The instant is converted to the track time base exactly. A track with no samples is left
    /// as-is.
    pub fn seek_to_instant(&mut self, ts: TimeStamp, time_base: TimeBase) -> Result<()> {
        if self.sample_count() == 0 {
            return Ok(());
        }

        let ticks = time_base.rescale(ts, self.time_base);
        let sample = self.ts_to_sample_index(ticks);

        trace!("track {}: seeking to sample {} for ts {} ({})", self.track, sample, ts, time_base);

        self.set_sample_index(sample)
    }
}
