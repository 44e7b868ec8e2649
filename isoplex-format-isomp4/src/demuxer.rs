// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use isoplex_core::codecs::{CodecConfigDecoder, CodecParameters, MediaKind};
use isoplex_core::errors::{codec_config_error, seek_error, Error, Result, SeekErrorKind};
use isoplex_core::io::{MediaSource, MediaSourceStream};
use isoplex_core::packet::Packet;
use isoplex_core::units::TimeBase;

use log::{debug, info, warn};

use crate::cursor::StreamCursor;
use crate::default::get_codecs;
use crate::movie::{read_movie, Movie, TrackDesc};
use crate::options::DemuxOptions;
use crate::schedule::Scheduler;

/// A playable stream of the movie.
pub struct Stream {
    /// The index of the track within the movie.
    pub track_index: usize,
    /// The track identifier from the track header.
    pub track_id: u32,
    /// The kind of media according to the track handler.
    pub kind: MediaKind,
    /// The ISO-639-2/T language of the track, if valid.
    pub language: Option<String>,
    /// The duration of the track in ticks of its time base.
    pub duration: u64,
    pub codec_params: CodecParameters,
    cursor: StreamCursor,
}

impl Stream {
    /// Returns true if the stream carries video.
    pub fn is_video(&self) -> bool {
        self.codec_params.is_video()
    }

    /// Gets the time base of the stream.
    pub fn time_base(&self) -> TimeBase {
        self.cursor.time_base()
    }

    /// Gets the duration of the stream in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.time_base().calc_time(self.duration).as_secs_f64()
    }

    /// Gets the number of samples in the stream.
    pub fn sample_count(&self) -> u32 {
        self.cursor.sample_count()
    }

    /// Gets the cursor of the stream.
    pub fn cursor(&self) -> &StreamCursor {
        &self.cursor
    }
}

/// A track that was left out of the playable streams, and why.
#[derive(Debug)]
pub struct ExcludedTrack {
    /// The index of the track within the movie.
    pub track_index: usize,
    /// The track identifier from the track header.
    pub track_id: u32,
    pub reason: Error,
}

/// ISO Base Media File Format (MP4, M4A, MOV, etc.) demultiplexer.
///
/// `IsoMp4Demuxer` reads the samples of every playable track of a non-fragmented movie, interleaved
/// in decode time order.
pub struct IsoMp4Demuxer {
    source: MediaSourceStream,
    streams: Vec<Stream>,
    excluded: Vec<ExcludedTrack>,
    scheduler: Scheduler,
}

impl IsoMp4Demuxer {
    /// Read the movie metadata from a seekable source, and configure a stream for every playable
    /// track using the default codec registry.
    pub fn open(mut source: MediaSourceStream, opts: &DemuxOptions) -> Result<Self> {
        // Samples are located by absolute byte offset.
        if !source.is_seekable() {
            return seek_error(SeekErrorKind::Unseekable);
        }

        let total_len = source.byte_len();

        if let Some(len) = total_len {
            info!("stream is seekable with len={} bytes", len);
        }

        let movie = read_movie(&mut source, total_len)?;

        Self::from_movie(source, movie, get_codecs(), opts)
    }

    /// Configure a stream for every playable track of an already-read movie.
    ///
    /// A track fails to be playable if its sample tables are inconsistent or too large, or if its
    /// codec configuration cannot be decoded. Depending on `opts`, such a track either fails the
    /// demuxer or is excluded.
    pub fn from_movie<D>(
        source: MediaSourceStream,
        movie: Movie,
        codecs: &D,
        opts: &DemuxOptions,
    ) -> Result<Self>
    where
        D: CodecConfigDecoder + ?Sized,
    {
        let mut streams = Vec::new();
        let mut excluded = Vec::new();

        for (track_index, track) in movie.tracks.into_iter().enumerate() {
            let track_id = track.track_id;

            match make_stream(track_index, track, codecs, opts) {
                Ok(mut stream) => {
                    stream.cursor.set_stream_index(streams.len());
                    streams.push(stream);
                }
                Err(err) => {
                    let is_fatal = match err {
                        Error::CodecConfigError { .. } => opts.strict_codecs,
                        Error::StructuralError { .. }
                        | Error::IndexLookupError { .. }
                        | Error::LimitError(_) => opts.strict_tables,
                        _ => true,
                    };

                    if is_fatal {
                        return Err(err);
                    }

                    warn!("excluding track {} (id={}): {}", track_index, track_id, err);
                    excluded.push(ExcludedTrack { track_index, track_id, reason: err });
                }
            }
        }

        info!("opened movie with {} stream(s), {} excluded", streams.len(), excluded.len());

        let mut demuxer = IsoMp4Demuxer { source, streams, excluded, scheduler: Default::default() };
        demuxer.reschedule();

        Ok(demuxer)
    }

    /// Gets the codec parameters of every playable stream, in track order.
    pub fn streams(&self) -> Result<Vec<&CodecParameters>> {
        if self.streams.is_empty() {
            return Err(Error::NoStreams);
        }

        Ok(self.streams.iter().map(|stream| &stream.codec_params).collect())
    }

    /// Gets every playable stream, in track order.
    pub fn stream_info(&self) -> &[Stream] {
        &self.streams
    }

    /// Gets the tracks left out of the playable streams.
    pub fn excluded_tracks(&self) -> &[ExcludedTrack] {
        &self.excluded
    }

    /// Read the next packet in decode time order across all streams. Returns `None` once every
    /// stream is exhausted.
    ///
    /// If reading fails, the error is returned and the failed stream is handled according to the
    /// error. After an I/O error the stream stays on the failed sample, and the sample is retried by
    /// the next read. A sample exceeding the maximum packet length is skipped. After any other
    /// error the stream is left out of reading until the next seek.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        while let Some(index) = self.scheduler.pop() {
            let cursor = &mut self.streams[index].cursor;

            match cursor.read_packet(&mut self.source) {
                Ok(Some(packet)) => {
                    self.scheduler.push(index, cursor);
                    return Ok(Some(packet));
                }
                Ok(None) => (),
                Err(err @ Error::IoError(_)) => {
                    self.scheduler.push(index, cursor);
                    return Err(err);
                }
                Err(err @ Error::SampleLimitError { .. }) => {
                    warn!("stream {}: skipping sample {}", index, cursor.sample_index());
                    cursor.advance();
                    self.scheduler.push(index, cursor);
                    return Err(err);
                }
                Err(err) => {
                    warn!("stream {}: stopped reading: {}", index, err);
                    return Err(err);
                }
            }
        }

        Ok(None)
    }

    /// Returns true once every stream has been read to its end.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Seek every stream to the time `time` in seconds.
    ///
    /// The first video stream is seeked first, and lands on a sync sample at or before `time`. All
    /// other streams are then seeked to the exact instant the video stream landed on.
    pub fn seek_to_time(&mut self, time: f64) -> Result<()> {
        if !time.is_finite() {
            return seek_error(SeekErrorKind::InvalidTime);
        }

        if self.streams.is_empty() {
            return Err(Error::NoStreams);
        }

        let result = self.seek_streams(time);

        // Even on failure, some streams may have moved.
        self.reschedule();

        result
    }

    fn seek_streams(&mut self, time: f64) -> Result<()> {
        let video = self.streams.iter().position(Stream::is_video);

        // The instant the video stream landed on, if it has any samples.
        let mut landed = None;

        if let Some(index) = video {
            let cursor = &mut self.streams[index].cursor;
            cursor.seek_to_time(time)?;

            if cursor.is_valid() {
                landed = Some((cursor.dts(), cursor.time_base()));
                debug!("seeking to {}s, video landed on {}s", time, cursor.decode_time());
            }
        }

        for (index, stream) in self.streams.iter_mut().enumerate() {
            if Some(index) == video {
                continue;
            }

            match landed {
                Some((ts, time_base)) => stream.cursor.seek_to_instant(ts, time_base)?,
                None => stream.cursor.seek_to_time(time)?,
            }
        }

        Ok(())
    }

    /// Gets the decode time in seconds of the next sample of the first stream.
    pub fn current_time(&self) -> f64 {
        self.streams.first().map_or(0.0, |stream| stream.cursor.decode_time())
    }

    /// Consume the demuxer and return the underlying source.
    pub fn into_inner(self) -> MediaSourceStream {
        self.source
    }

    fn reschedule(&mut self) {
        let cursors: Vec<&StreamCursor> = self.streams.iter().map(|stream| &stream.cursor).collect();
        self.scheduler.rebuild(&cursors);
    }
}

/// Build the stream for the track `track_index`.
fn make_stream<D>(
    track_index: usize,
    track: TrackDesc,
    codecs: &D,
    opts: &DemuxOptions,
) -> Result<Stream>
where
    D: CodecConfigDecoder + ?Sized,
{
    let kind = track.kind();

    // The codec configuration borrows the sample entry, so decode it before the tables are moved.
    let mut codec_params = match &track.sample_entry {
        Some(entry) => codecs.configure(track_index, &entry.codec_config(kind))?,
        None => return codec_config_error(track_index, "isomp4: missing sample entry"),
    };

    track.table.check_limits(opts.max_table_entries)?;

    let cursor = StreamCursor::new(track_index, track.table, opts)?;

    codec_params.with_time_base(cursor.time_base()).with_n_ticks(track.duration);

    debug!(
        "track {} (id={}): {} {} with {} samples",
        track_index,
        track.track_id,
        kind,
        codec_params.codec,
        cursor.sample_count()
    );

    Ok(Stream {
        track_index,
        track_id: track.track_id,
        kind,
        language: track.language,
        duration: track.duration,
        codec_params,
        cursor,
    })
}
