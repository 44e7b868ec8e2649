// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `SeekErrorKind` is a list of generic reasons why a seek may fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeekErrorKind {
    /// The stream is not seekable at all.
    Unseekable,
    /// The time to seek to is not a finite number.
    InvalidTime,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "stream is not seekable",
            SeekErrorKind::InvalidTime => "requested seek time is not a finite number",
        }
    }
}

/// The sample table a cursor failed to locate a sample in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SampleTableKind {
    /// Chunk offsets (`stco` or `co64`).
    ChunkOffset,
    /// Sample-to-chunk runs (`stsc`).
    SampleToChunk,
    /// Sample sizes (`stsz`).
    SampleSize,
    /// Decode time runs (`stts`).
    TimeToSample,
    /// Composition offset runs (`ctts`).
    CompositionOffset,
}

impl SampleTableKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SampleTableKind::ChunkOffset => "chunk offset",
            SampleTableKind::SampleToChunk => "sample-to-chunk",
            SampleTableKind::SampleSize => "sample size",
            SampleTableKind::TimeToSample => "time-to-sample",
            SampleTableKind::CompositionOffset => "composition offset",
        }
    }
}

/// `Error` provides an enumeration of all possible errors reported by Isoplex.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading or seeking the source.
    IoError(io::Error),
    /// Required metadata is missing, malformed, or a sample table is inconsistent with the declared
    /// sample count. If the error is scoped to one track, the track index is provided.
    StructuralError {
        /// Index of the track, if the error is scoped to a single track.
        track: Option<usize>,
        /// Description of the problem.
        desc: &'static str,
    },
    /// A sample could not be located within one of a track's sample tables.
    IndexLookupError {
        /// Index of the track.
        track: usize,
        /// Zero-based sample number that was requested.
        sample: u32,
        /// The table the sample could not be located in.
        table: SampleTableKind,
    },
    /// The codec configuration of a track could not be identified or decoded.
    CodecConfigError {
        /// Index of the track.
        track: usize,
        /// Description of the problem.
        desc: &'static str,
    },
    /// There are no playable streams.
    NoStreams,
    /// The stream could not be seeked.
    SeekError(SeekErrorKind),
    /// An unsupported container feature was encounted.
    Unsupported(&'static str),
    /// A default or user-defined limit was reached while demuxing the stream. Limits are used to
    /// prevent denial-of-service attacks from malicious streams.
    LimitError(&'static str),
    /// A sample of a track is larger than the maximum packet length.
    SampleLimitError {
        /// Index of the track.
        track: usize,
        /// Zero-based sample number.
        sample: u32,
        /// Size of the sample in bytes.
        len: u32,
    },
}

impl Error {
    /// Gets the index of the track the error is scoped to, if any.
    pub fn track(&self) -> Option<usize> {
        match *self {
            Error::StructuralError { track, .. } => track,
            Error::IndexLookupError { track, .. } => Some(track),
            Error::CodecConfigError { track, .. } => Some(track),
            Error::SampleLimitError { track, .. } => Some(track),
            _ => None,
        }
    }

    /// Scope a track-less structural error to the given track. Other errors are returned as-is.
    pub fn with_track(self, track: usize) -> Self {
        match self {
            Error::StructuralError { track: None, desc } => {
                Error::StructuralError { track: Some(track), desc }
            }
            err => err,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::StructuralError { track: Some(track), desc } => {
                write!(f, "malformed stream: track {}: {}", track, desc)
            }
            Error::StructuralError { track: None, desc } => {
                write!(f, "malformed stream: {}", desc)
            }
            Error::IndexLookupError { track, sample, table } => {
                write!(
                    f,
                    "malformed stream: track {}: sample {} not found in {} table",
                    track,
                    sample,
                    table.as_str()
                )
            }
            Error::CodecConfigError { track, desc } => {
                write!(f, "codec configuration error: track {}: {}", track, desc)
            }
            Error::NoStreams => write!(f, "no streams"),
            Error::SeekError(ref kind) => {
                write!(f, "seek error: {}", kind.as_str())
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::LimitError(constraint) => {
                write!(f, "limit reached: {}", constraint)
            }
            Error::SampleLimitError { track, sample, len } => {
                write!(
                    f,
                    "limit reached: track {}: sample {} of {} bytes exceeds the maximum packet length",
                    track, sample, len
                )
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a structural error that is not scoped to a track.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::StructuralError { track: None, desc })
}

/// Convenience function to create a structural error for a track's sample table.
pub fn table_error<T>(track: usize, desc: &'static str) -> Result<T> {
    Err(Error::StructuralError { track: Some(track), desc })
}

/// Convenience function to create an index lookup error.
pub fn lookup_error<T>(track: usize, sample: u32, table: SampleTableKind) -> Result<T> {
    Err(Error::IndexLookupError { track, sample, table })
}

/// Convenience function to create a codec configuration error.
pub fn codec_config_error<T>(track: usize, desc: &'static str) -> Result<T> {
    Err(Error::CodecConfigError { track, desc })
}

/// Convenience function to create a seek error.
pub fn seek_error<T>(kind: SeekErrorKind) -> Result<T> {
    Err(Error::SeekError(kind))
}

/// Convenience function to create an unsupport feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}

/// Convenience function to create a limit error for an oversized sample.
pub fn sample_limit_error<T>(track: usize, sample: u32, len: u32) -> Result<T> {
    Err(Error::SampleLimitError { track, sample, len })
}

#[cfg(test)]
mod tests {
    use super::{Error, SampleTableKind};

    #[test]
    fn verify_error_track_scope() {
        let err = Error::StructuralError { track: None, desc: "bad" }.with_track(3);
        assert_eq!(err.track(), Some(3));
        assert_eq!(err.to_string(), "malformed stream: track 3: bad");

        let err = Error::IndexLookupError { track: 1, sample: 7, table: SampleTableKind::SampleSize };
        assert_eq!(err.track(), Some(1));
        assert_eq!(err.to_string(), "malformed stream: track 1: sample 7 not found in sample size table");

        let err = Error::SampleLimitError { track: 2, sample: 9, len: 100 };
        assert_eq!(err.track(), Some(2));
        assert_eq!(
            err.to_string(),
            "limit reached: track 2: sample 9 of 100 bytes exceeds the maximum packet length"
        );

        // Only track-less structural errors are scoped.
        let err = Error::StructuralError { track: Some(1), desc: "bad" }.with_track(3);
        assert_eq!(err.track(), Some(1));
        assert_eq!(Error::NoStreams.with_track(3).track(), None);

        assert_eq!(Error::NoStreams.track(), None);
    }
}
