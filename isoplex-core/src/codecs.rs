// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module provides the codec parameters of a stream, and the traits and registry used
//! to derive them from a container's raw codec configuration.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::common::FourCc;
use crate::errors::{codec_config_error, Result};
use crate::units::TimeBase;

/// A `CodecType` is a unique identifier used to identify a specific codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodecType(u32);

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Null codec
pub const CODEC_TYPE_NULL: CodecType = CodecType(0x0);

// Video codecs
//-------------

/// Advanced Video Coding (H.264)
pub const CODEC_TYPE_H264: CodecType = CodecType(0x1000);
/// High Efficiency Video Coding (H.265)
pub const CODEC_TYPE_HEVC: CodecType = CodecType(0x1001);
/// AOMedia Video 1
pub const CODEC_TYPE_AV1: CodecType = CodecType(0x1002);
/// VP9
pub const CODEC_TYPE_VP9: CodecType = CodecType(0x1003);

// Compressed audio codecs
//------------------------

/// Advanced Audio Coding (AAC)
pub const CODEC_TYPE_AAC: CodecType = CodecType(0x2000);
/// MPEG Layer 3 (MP3)
pub const CODEC_TYPE_MP3: CodecType = CodecType(0x2001);
/// Opus
pub const CODEC_TYPE_OPUS: CodecType = CodecType(0x2002);
/// Free Lossless Audio Codec (FLAC)
pub const CODEC_TYPE_FLAC: CodecType = CodecType(0x2003);
/// Apple Lossless Audio Codec (ALAC)
pub const CODEC_TYPE_ALAC: CodecType = CodecType(0x2004);
/// Dolby Digital (AC-3)
pub const CODEC_TYPE_AC3: CodecType = CodecType(0x2005);
/// Dolby Digital Plus (E-AC-3)
pub const CODEC_TYPE_EAC3: CodecType = CodecType(0x2006);

/// The kind of media a stream carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Subtitle,
    Other,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Audio fields common to all audio sample entries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioEntryInfo {
    pub channels: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
}

/// Visual fields common to all visual sample entries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoEntryInfo {
    pub width: u16,
    pub height: u16,
}

/// The raw codec configuration of a track, as stored by the container.
#[derive(Copy, Clone, Debug)]
pub struct CodecConfig<'a> {
    /// The sample entry code (e.g., `avc1`, `mp4a`).
    pub sample_entry: FourCc,
    /// The kind of media according to the track's handler.
    pub kind: MediaKind,
    /// Audio sample entry fields, if it is an audio sample entry.
    pub audio: Option<AudioEntryInfo>,
    /// Visual sample entry fields, if it is a visual sample entry.
    pub video: Option<VideoEntryInfo>,
    /// The code and payload of the codec configuration box (e.g., `avcC`, `esds`), if present.
    pub config: Option<(FourCc, &'a [u8])>,
}

/// Codec parameters of a stream.
///
/// All fields other than `codec` and `kind` are optional since not every codec or container
/// provides them.
#[derive(Clone, Debug)]
pub struct CodecParameters {
    /// The codec type.
    pub codec: CodecType,
    /// The kind of media.
    pub kind: MediaKind,
    /// The sample entry code the parameters were derived from.
    pub sample_entry: Option<FourCc>,
    /// The time base of the stream's timestamps.
    pub time_base: Option<TimeBase>,
    /// The length of the stream in `TimeBase` ticks.
    pub n_ticks: Option<u64>,
    /// The sample rate of audio.
    pub sample_rate: Option<u32>,
    /// The number of audio channels.
    pub channels: Option<u16>,
    /// The number of bits per one encoded audio sample.
    pub bits_per_coded_sample: Option<u32>,
    /// The width of video frames in pixels.
    pub width: Option<u16>,
    /// The height of video frames in pixels.
    pub height: Option<u16>,
    /// Codec-specific profile (e.g., the MPEG-4 audio object type).
    pub profile: Option<u32>,
    /// Extra data (defined by the codec).
    pub extra_data: Option<Box<[u8]>>,
}

impl CodecParameters {
    pub fn new(codec: CodecType, kind: MediaKind) -> CodecParameters {
        CodecParameters {
            codec,
            kind,
            sample_entry: None,
            time_base: None,
            n_ticks: None,
            sample_rate: None,
            channels: None,
            bits_per_coded_sample: None,
            width: None,
            height: None,
            profile: None,
            extra_data: None,
        }
    }

    /// Returns true if the stream carries video.
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Provide the sample entry code.
    pub fn with_sample_entry(&mut self, sample_entry: FourCc) -> &mut Self {
        self.sample_entry = Some(sample_entry);
        self
    }

    /// Provide the `TimeBase`.
    pub fn with_time_base(&mut self, time_base: TimeBase) -> &mut Self {
        self.time_base = Some(time_base);
        self
    }

    /// Provide the length of the stream in ticks.
    pub fn with_n_ticks(&mut self, n_ticks: u64) -> &mut Self {
        self.n_ticks = Some(n_ticks);
        self
    }

    /// Provide the sample rate in Hz.
    pub fn with_sample_rate(&mut self, sample_rate: u32) -> &mut Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Provide the channel count.
    pub fn with_channels(&mut self, channels: u16) -> &mut Self {
        self.channels = Some(channels);
        self
    }

    /// Provide the number of bits per encoded sample.
    pub fn with_bits_per_coded_sample(&mut self, bits_per_coded_sample: u32) -> &mut Self {
        self.bits_per_coded_sample = Some(bits_per_coded_sample);
        self
    }

    /// Provide the frame dimensions.
    pub fn with_dimensions(&mut self, width: u16, height: u16) -> &mut Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Provide the codec profile.
    pub fn with_profile(&mut self, profile: u32) -> &mut Self {
        self.profile = Some(profile);
        self
    }

    /// Provide codec extra data.
    pub fn with_extra_data(&mut self, data: Box<[u8]>) -> &mut Self {
        self.extra_data = Some(data);
        self
    }

    /// Copy the generic sample entry fields of `config` into the parameters.
    pub fn with_entry_info(&mut self, config: &CodecConfig<'_>) -> &mut Self {
        self.with_sample_entry(config.sample_entry);

        if let Some(audio) = config.audio {
            if audio.sample_rate > 0 {
                self.with_sample_rate(audio.sample_rate);
            }
            if audio.channels > 0 {
                self.with_channels(audio.channels);
            }
            if audio.sample_size > 0 {
                self.with_bits_per_coded_sample(u32::from(audio.sample_size));
            }
        }

        if let Some(video) = config.video {
            self.with_dimensions(video.width, video.height);
        }

        self
    }
}

/// A `CodecConfigDecoder` turns the raw codec configuration of a track into `CodecParameters`.
pub trait CodecConfigDecoder {
    /// Decode the codec configuration of the track with index `track`. Errors are scoped to the
    /// track.
    fn configure(&self, track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters>;
}

/// A `CodecDescriptor` stores a description of a single logical codec, the sample entries that
/// carry it, and the function that derives its parameters.
#[derive(Copy, Clone)]
pub struct CodecDescriptor {
    /// The `CodecType` identifier.
    pub codec: CodecType,
    /// A short ASCII-only string identifying the codec.
    pub short_name: &'static str,
    /// A longer, more descriptive, string identifying the codec.
    pub long_name: &'static str,
    /// Sample entry codes that carry the codec.
    pub sample_entries: &'static [[u8; 4]],
    /// Derives the codec parameters from the raw codec configuration.
    pub config_func: fn(usize, &CodecConfig<'_>) -> Result<CodecParameters>,
}

/// A `CodecRegistry` allows the registration of codecs, and derives `CodecParameters` for a track
/// from its sample entry code.
pub struct CodecRegistry {
    codecs: HashMap<FourCc, CodecDescriptor>,
}

impl CodecRegistry {
    /// Instantiate a new `CodecRegistry`.
    pub fn new() -> Self {
        CodecRegistry { codecs: HashMap::new() }
    }

    /// Gets the `CodecDescriptor` registered for a sample entry code.
    pub fn get_codec(&self, sample_entry: FourCc) -> Option<&CodecDescriptor> {
        self.codecs.get(&sample_entry)
    }

    /// Register a single codec for all of its sample entries. If a sample entry was previously
    /// registered it will be replaced within the registry.
    pub fn register(&mut self, descriptor: &CodecDescriptor) {
        for &code in descriptor.sample_entries {
            self.codecs.insert(FourCc::new(code), *descriptor);
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecConfigDecoder for CodecRegistry {
    fn configure(&self, track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
        match self.codecs.get(&config.sample_entry) {
            Some(descriptor) => {
                debug!(
                    "track {}: configuring {} for sample entry {}",
                    track, descriptor.short_name, config.sample_entry
                );
                (descriptor.config_func)(track, config)
            }
            None => codec_config_error(track, "unknown sample entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    fn configure_test(_track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
        let mut params = CodecParameters::new(CODEC_TYPE_OPUS, config.kind);
        params.with_entry_info(config);
        Ok(params)
    }

    const TEST_CODEC: CodecDescriptor = CodecDescriptor {
        codec: CODEC_TYPE_OPUS,
        short_name: "opus",
        long_name: "Opus",
        sample_entries: &[*b"Opus", *b"opus"],
        config_func: configure_test,
    };

    fn config(code: &[u8; 4]) -> CodecConfig<'static> {
        CodecConfig {
            sample_entry: FourCc::new(*code),
            kind: MediaKind::Audio,
            audio: Some(AudioEntryInfo { channels: 2, sample_size: 16, sample_rate: 48_000 }),
            video: None,
            config: None,
        }
    }

    #[test]
    fn verify_registry_lookup() {
        let mut registry = CodecRegistry::new();
        registry.register(&TEST_CODEC);

        let params = registry.configure(0, &config(b"opus")).unwrap();
        assert_eq!(params.codec, CODEC_TYPE_OPUS);
        assert_eq!(params.sample_rate, Some(48_000));
        assert_eq!(params.channels, Some(2));
        assert!(!params.is_video());

        match registry.configure(4, &config(b"xxxx")) {
            Err(Error::CodecConfigError { track: 4, .. }) => (),
            _ => panic!("expected a codec configuration error"),
        }
    }
}
