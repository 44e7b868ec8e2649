// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-track sample tables.

use isoplex_core::errors::{limit_error, table_error, Result};

/// A run of chunks sharing the same number of samples per chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleToChunkEntry {
    /// The 1-based number of the first chunk of the run.
    pub first_chunk: u32,
    /// The number of samples in each chunk of the run.
    pub samples_per_chunk: u32,
}

/// A run of samples sharing the same decode duration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeToSampleEntry {
    pub count: u32,
    /// Duration in timescale ticks.
    pub duration: u32,
}

/// A run of samples sharing the same composition offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompositionOffsetEntry {
    pub count: u32,
    /// Presentation time minus decode time, in timescale ticks.
    pub offset: i64,
}

/// Sample sizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleSizes {
    /// Every sample has the same size.
    Constant(u32),
    /// One size per sample.
    Variable(Vec<u32>),
}

/// The sample tables of one track. Tables are never mutated once built.
#[derive(Clone, Debug)]
pub struct SampleTable {
    /// Absolute byte offset of each chunk.
    pub chunk_offsets: Vec<u64>,
    /// Runs of chunks, sorted by first chunk.
    pub sample_to_chunk: Vec<SampleToChunkEntry>,
    pub sample_sizes: SampleSizes,
    pub time_to_sample: Vec<TimeToSampleEntry>,
    pub composition_offsets: Option<Vec<CompositionOffsetEntry>>,
    /// Strictly ascending 1-based numbers of the sync samples. If `None`, every sample is a sync
    /// sample.
    pub sync_samples: Option<Vec<u32>>,
    /// Ticks per second.
    pub timescale: u32,
}

impl SampleTable {
    /// Gets the exclusive, 0-based, end chunk of the sample-to-chunk run at `run`.
    pub(crate) fn run_end_chunk(&self, run: usize) -> u64 {
        match self.sample_to_chunk.get(run + 1) {
            Some(next) => u64::from(next.first_chunk).saturating_sub(1),
            None => self.chunk_offsets.len() as u64,
        }
    }

    /// Gets the number of samples in the sample-to-chunk run at `run`.
    pub(crate) fn run_sample_count(&self, run: usize) -> u64 {
        match self.sample_to_chunk.get(run) {
            Some(entry) => {
                let first_chunk = u64::from(entry.first_chunk).saturating_sub(1);
                let n_chunks = self.run_end_chunk(run).saturating_sub(first_chunk);
                n_chunks * u64::from(entry.samples_per_chunk)
            }
            None => 0,
        }
    }

    /// Gets the number of samples described by the sample-to-chunk runs.
    pub fn chunk_sample_count(&self) -> u64 {
        (0..self.sample_to_chunk.len()).map(|run| self.run_sample_count(run)).sum()
    }

    /// Gets the number of samples described by the time-to-sample runs.
    pub fn timed_sample_count(&self) -> u64 {
        self.time_to_sample.iter().map(|entry| u64::from(entry.count)).sum()
    }

    /// Gets the total number of samples in the track.
    pub fn sample_count(&self) -> u32 {
        match &self.sample_sizes {
            SampleSizes::Variable(sizes) => sizes.len() as u32,
            SampleSizes::Constant(_) => {
                u32::try_from(self.chunk_sample_count()).unwrap_or(u32::MAX)
            }
        }
    }

    /// Gets the size of the sample `sample`, or `None` if there is no such sample.
    pub fn sample_size(&self, sample: u32) -> Option<u32> {
        match &self.sample_sizes {
            SampleSizes::Constant(size) if sample < self.sample_count() => Some(*size),
            SampleSizes::Constant(_) => None,
            SampleSizes::Variable(sizes) => sizes.get(sample as usize).copied(),
        }
    }

    /// Gets the total decode duration of the track in ticks.
    pub fn total_duration(&self) -> u64 {
        self.time_to_sample
            .iter()
            .map(|entry| u64::from(entry.count) * u64::from(entry.duration))
            .fold(0, u64::saturating_add)
    }

    /// Gets the number of entries of the largest table.
    pub fn max_entries(&self) -> usize {
        let sizes = match &self.sample_sizes {
            SampleSizes::Constant(_) => 0,
            SampleSizes::Variable(sizes) => sizes.len(),
        };

        [
            self.chunk_offsets.len(),
            self.sample_to_chunk.len(),
            sizes,
            self.time_to_sample.len(),
            self.composition_offsets.as_ref().map_or(0, Vec::len),
            self.sync_samples.as_ref().map_or(0, Vec::len),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Check that no table has more than `max_entries` entries.
    pub fn check_limits(&self, max_entries: u32) -> Result<()> {
        if self.max_entries() > max_entries as usize {
            return limit_error("isomp4: sample table exceeds the maximum number of entries");
        }
        Ok(())
    }

    /// Check that the tables of the track `track` are mutually consistent.
    pub fn validate(&self, track: usize) -> Result<()> {
        if self.timescale == 0 {
            return table_error(track, "isomp4: timescale is zero");
        }

        // Sample-to-chunk runs must start at chunk 1, be strictly ascending, and lie within the
        // chunk offset table.
        if let Some(first) = self.sample_to_chunk.first() {
            if first.first_chunk != 1 {
                return table_error(track, "isomp4 (stsc): first run does not start at chunk 1");
            }
        }
        else if !self.chunk_offsets.is_empty() {
            return table_error(track, "isomp4 (stsc): chunks are not described by any run");
        }

        for (i, entry) in self.sample_to_chunk.iter().enumerate() {
            if entry.samples_per_chunk == 0 {
                return table_error(track, "isomp4 (stsc): run has 0 samples per chunk");
            }

            if u64::from(entry.first_chunk) > self.chunk_offsets.len() as u64 {
                return table_error(track, "isomp4 (stsc): run starts beyond the last chunk");
            }

            if let Some(next) = self.sample_to_chunk.get(i + 1) {
                if next.first_chunk <= entry.first_chunk {
                    return table_error(track, "isomp4 (stsc): runs are not strictly ascending");
                }
            }
        }

        let chunk_count = self.chunk_sample_count();

        if chunk_count > u64::from(u32::MAX) {
            return table_error(track, "isomp4: too many samples");
        }

        if let SampleSizes::Variable(sizes) = &self.sample_sizes {
            if sizes.len() as u64 != chunk_count {
                return table_error(track, "isomp4 (stsz): sample count does not match chunks");
            }
        }

        let count = u64::from(self.sample_count());

        if self.timed_sample_count() != count {
            return table_error(track, "isomp4 (stts): sample count does not match chunks");
        }

        if let Some(offsets) = &self.composition_offsets {
            let total: u64 = offsets.iter().map(|entry| u64::from(entry.count)).sum();

            if total != count {
                return table_error(track, "isomp4 (ctts): sample count does not match chunks");
            }
        }

        if let Some(sync) = &self.sync_samples {
            let mut prev = 0;

            for &number in sync {
                if number <= prev || u64::from(number) > count {
                    return table_error(track, "isomp4 (stss): invalid sync sample number");
                }
                prev = number;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use isoplex_core::errors::Error;

    use super::*;

    /// Four samples in two chunks of two samples each, 1000 ticks per sample at 1000 ticks per
    /// second.
    pub fn two_chunk_table() -> SampleTable {
        SampleTable {
            chunk_offsets: vec![100, 500],
            sample_to_chunk: vec![SampleToChunkEntry { first_chunk: 1, samples_per_chunk: 2 }],
            sample_sizes: SampleSizes::Variable(vec![10, 20, 15, 25]),
            time_to_sample: vec![TimeToSampleEntry { count: 4, duration: 1000 }],
            composition_offsets: None,
            sync_samples: None,
            timescale: 1000,
        }
    }

    fn assert_table_error(table: &SampleTable) {
        match table.validate(2) {
            Err(Error::StructuralError { track: Some(2), .. }) => (),
            other => panic!("expected a structural error, got {:?}", other),
        }
    }

    #[test]
    fn verify_sample_counts() {
        let table = two_chunk_table();
        assert_eq!(table.chunk_sample_count(), 4);
        assert_eq!(table.timed_sample_count(), 4);
        assert_eq!(table.sample_count(), 4);
        assert_eq!(table.total_duration(), 4000);
        assert_eq!(table.sample_size(3), Some(25));
        assert_eq!(table.sample_size(4), None);
        table.validate(0).unwrap();

        // Constant sizes over runs of 3 and 1 samples per chunk.
        let table = SampleTable {
            chunk_offsets: vec![0, 30, 60, 70],
            sample_to_chunk: vec![
                SampleToChunkEntry { first_chunk: 1, samples_per_chunk: 3 },
                SampleToChunkEntry { first_chunk: 3, samples_per_chunk: 1 },
            ],
            sample_sizes: SampleSizes::Constant(10),
            time_to_sample: vec![TimeToSampleEntry { count: 8, duration: 1 }],
            composition_offsets: None,
            sync_samples: None,
            timescale: 1,
        };
        assert_eq!(table.run_end_chunk(0), 2);
        assert_eq!(table.sample_count(), 8);
        assert_eq!(table.sample_size(7), Some(10));
        assert_eq!(table.sample_size(8), None);
        table.validate(0).unwrap();
    }

    #[test]
    fn verify_empty_table() {
        let table = SampleTable {
            chunk_offsets: vec![],
            sample_to_chunk: vec![],
            sample_sizes: SampleSizes::Constant(0),
            time_to_sample: vec![],
            composition_offsets: None,
            sync_samples: None,
            timescale: 44_100,
        };
        assert_eq!(table.sample_count(), 0);
        table.validate(0).unwrap();
    }

    #[test]
    fn verify_inconsistent_tables() {
        let mut table = two_chunk_table();
        table.timescale = 0;
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.time_to_sample[0].count = 5;
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.sample_sizes = SampleSizes::Variable(vec![10, 20, 15]);
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.composition_offsets = Some(vec![CompositionOffsetEntry { count: 3, offset: 0 }]);
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.sample_to_chunk[0].first_chunk = 2;
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.sample_to_chunk[0].samples_per_chunk = 0;
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.sample_to_chunk.push(SampleToChunkEntry { first_chunk: 1, samples_per_chunk: 1 });
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.sync_samples = Some(vec![3, 1]);
        assert_table_error(&table);

        let mut table = two_chunk_table();
        table.sync_samples = Some(vec![1, 5]);
        assert_table_error(&table);
    }

    #[test]
    fn verify_limits() {
        let table = two_chunk_table();
        assert_eq!(table.max_entries(), 4);
        table.check_limits(4).unwrap();
        assert!(matches!(table.check_limits(3), Err(Error::LimitError(_))));
    }
}
