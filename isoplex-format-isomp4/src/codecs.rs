// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codec configuration decoders for the sample entries found in ISO/MP4 files.

use std::io;

use isoplex_core::codecs::{CodecConfig, CodecDescriptor, CodecParameters, CodecType, MediaKind};
use isoplex_core::codecs::{CODEC_TYPE_AAC, CODEC_TYPE_AC3, CODEC_TYPE_EAC3, CODEC_TYPE_MP3};
use isoplex_core::codecs::{CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_OPUS};
use isoplex_core::codecs::{CODEC_TYPE_AV1, CODEC_TYPE_H264, CODEC_TYPE_HEVC, CODEC_TYPE_VP9};
use isoplex_core::errors::{codec_config_error, Result};
use isoplex_core::io::{BufReader, ReadBytes};

use log::debug;

const ES_DESCRIPTOR: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR: u8 = 0x04;
const DECODER_SPECIFIC_DESCRIPTOR: u8 = 0x05;

// AAC
const OBJ_TYPE_AUDIO_MPEG4_3: u8 = 0x40; // Audio ISO/IEC 14496-3
const OBJ_TYPE_AUDIO_MPEG2_7_MAIN: u8 = 0x66; // Audio ISO/IEC 13818-7 Main Profile
const OBJ_TYPE_AUDIO_MPEG2_7_LC: u8 = 0x67; // Audio ISO/IEC 13818-7 Low Complexity

// MP3
const OBJ_TYPE_AUDIO_MPEG2_3: u8 = 0x69; // Audio ISO/IEC 13818-3 (MP3)
const OBJ_TYPE_AUDIO_MPEG1_3: u8 = 0x6b; // Audio ISO/IEC 11172-3 (MP3)

const OBJ_TYPE_AUDIO_AC3: u8 = 0xa5;
const OBJ_TYPE_AUDIO_EAC3: u8 = 0xa6;

/// The parts of an elementary stream descriptor used to configure a decoder.
#[derive(Debug, Default, PartialEq, Eq)]
struct EsDescriptor<'a> {
    object_type_indication: Option<u8>,
    dec_specific_info: Option<&'a [u8]>,
}

fn read_descriptor_header(reader: &mut BufReader<'_>) -> io::Result<(u8, u32)> {
    let tag = reader.read_u8()?;

    let mut size = 0;

    for _ in 0..4 {
        let val = reader.read_u8()?;
        size = (size << 7) | u32::from(val & 0x7f);
        if val & 0x80 == 0 {
            break;
        }
    }

    Ok((tag, size))
}

/// Read the decoder configuration descriptor.
fn read_decoder_config<'a>(data: &'a [u8], desc: &mut EsDescriptor<'a>) -> io::Result<()> {
    let mut reader = BufReader::new(data);

    desc.object_type_indication = Some(reader.read_u8()?);

    // Stream type, buffer size, maximum and average bitrate.
    reader.ignore_bytes(1 + 3 + 4 + 4)?;

    while reader.bytes_available() > 0 {
        let (tag, len) = read_descriptor_header(&mut reader)?;
        let body = reader.read_buf_bytes_ref(len as usize)?;

        if tag == DECODER_SPECIFIC_DESCRIPTOR {
            desc.dec_specific_info = Some(body);
        }
    }

    Ok(())
}

/// Read an elementary stream descriptor.
fn read_es_descriptor<'a>(data: &'a [u8], desc: &mut EsDescriptor<'a>) -> io::Result<()> {
    let mut reader = BufReader::new(data);

    let _es_id = reader.read_be_u16()?;
    let es_flags = reader.read_u8()?;

    // Stream dependence flag.
    if es_flags & 0x80 != 0 {
        let _depends_on_es_id = reader.read_be_u16()?;
    }

    // URL flag.
    if es_flags & 0x40 != 0 {
        let url_len = reader.read_u8()?;
        reader.ignore_bytes(u64::from(url_len))?;
    }

    // OCR stream flag.
    if es_flags & 0x20 != 0 {
        let _ocr_es_id = reader.read_be_u16()?;
    }

    // Multiple descriptors follow, but only the decoder configuration descriptor is useful.
    while reader.bytes_available() > 0 {
        let (tag, len) = read_descriptor_header(&mut reader)?;
        let body = reader.read_buf_bytes_ref(len as usize)?;

        if tag == DECODER_CONFIG_DESCRIPTOR {
            read_decoder_config(body, desc)?;
        }
        else {
            debug!("skipping {} object in es descriptor", tag);
        }
    }

    Ok(())
}

/// Read the payload of an `esds` atom.
fn read_esds(data: &[u8]) -> io::Result<EsDescriptor<'_>> {
    let mut reader = BufReader::new(data);

    // Version and flags.
    reader.ignore_bytes(4)?;

    let mut desc = EsDescriptor::default();

    while reader.bytes_available() > 0 {
        let (tag, len) = read_descriptor_header(&mut reader)?;
        let body = reader.read_buf_bytes_ref(len as usize)?;

        if tag == ES_DESCRIPTOR {
            read_es_descriptor(body, &mut desc)?;
        }
    }

    Ok(desc)
}

/// Gets the payload of the configuration atom `code`, which must be present.
fn required_config<'a>(
    track: usize,
    config: &CodecConfig<'a>,
    code: &[u8; 4],
    desc: &'static str,
) -> Result<&'a [u8]> {
    match config.config {
        Some((fourcc, data)) if fourcc.get() == *code => Ok(data),
        _ => codec_config_error(track, desc),
    }
}

/// Build the parameters common to every codec.
fn base_params(codec: CodecType, kind: MediaKind, config: &CodecConfig<'_>) -> CodecParameters {
    let mut params = CodecParameters::new(codec, kind);
    params.with_entry_info(config);
    params
}

fn make_h264_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    let avcc = required_config(track, config, b"avcC", "isomp4: missing avcC atom")?;

    // Configuration version, profile, compatibility, and level.
    if avcc.len() < 4 {
        return codec_config_error(track, "isomp4 (avcC): atom is too small");
    }

    let mut params = base_params(CODEC_TYPE_H264, MediaKind::Video, config);
    params.with_profile(u32::from(avcc[1])).with_extra_data(Box::from(avcc));
    Ok(params)
}

fn make_hevc_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    let hvcc = required_config(track, config, b"hvcC", "isomp4: missing hvcC atom")?;

    if hvcc.len() < 2 {
        return codec_config_error(track, "isomp4 (hvcC): atom is too small");
    }

    let mut params = base_params(CODEC_TYPE_HEVC, MediaKind::Video, config);
    params.with_profile(u32::from(hvcc[1] & 0x1f)).with_extra_data(Box::from(hvcc));
    Ok(params)
}

fn make_av1_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    let av1c = required_config(track, config, b"av1C", "isomp4: missing av1C atom")?;

    // The marker bit must be set.
    if av1c.len() < 2 || av1c[0] & 0x80 == 0 {
        return codec_config_error(track, "isomp4 (av1C): invalid configuration record");
    }

    let mut params = base_params(CODEC_TYPE_AV1, MediaKind::Video, config);
    params.with_profile(u32::from(av1c[1] >> 5)).with_extra_data(Box::from(av1c));
    Ok(params)
}

fn make_vp9_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    let vpcc = required_config(track, config, b"vpcC", "isomp4: missing vpcC atom")?;

    // Version and flags, then the profile.
    if vpcc.len() < 5 {
        return codec_config_error(track, "isomp4 (vpcC): atom is too small");
    }

    let mut params = base_params(CODEC_TYPE_VP9, MediaKind::Video, config);
    params.with_profile(u32::from(vpcc[4])).with_extra_data(Box::from(vpcc));
    Ok(params)
}

fn make_mp4a_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    let esds = required_config(track, config, b"esds", "isomp4: missing esds atom")?;

    let Ok(desc) = read_esds(esds)
    else {
        return codec_config_error(track, "isomp4 (esds): malformed descriptor");
    };

    let codec = match desc.object_type_indication {
        Some(OBJ_TYPE_AUDIO_MPEG4_3 | OBJ_TYPE_AUDIO_MPEG2_7_MAIN | OBJ_TYPE_AUDIO_MPEG2_7_LC) => {
            CODEC_TYPE_AAC
        }
        Some(OBJ_TYPE_AUDIO_MPEG2_3 | OBJ_TYPE_AUDIO_MPEG1_3) => CODEC_TYPE_MP3,
        Some(OBJ_TYPE_AUDIO_AC3) => CODEC_TYPE_AC3,
        Some(OBJ_TYPE_AUDIO_EAC3) => CODEC_TYPE_EAC3,
        Some(obj_type) => {
            debug!("unknown object type indication {:#x} for decoder config", obj_type);
            return codec_config_error(track, "isomp4 (esds): unsupported object type");
        }
        None => return codec_config_error(track, "isomp4 (esds): missing decoder config"),
    };

    let mut params = base_params(codec, MediaKind::Audio, config);

    if let Some(info) = desc.dec_specific_info {
        // The audio object type is the upper 5 bits of an AAC audio specific config.
        if codec == CODEC_TYPE_AAC {
            if let Some(&first) = info.first() {
                params.with_profile(u32::from(first >> 3));
            }
        }
        params.with_extra_data(Box::from(info));
    }
    else if codec == CODEC_TYPE_AAC {
        return codec_config_error(track, "isomp4 (esds): missing audio specific config");
    }

    Ok(params)
}

/// Build parameters for an audio codec whose configuration atom is passed along as extra data.
fn make_audio_params(
    track: usize,
    config: &CodecConfig<'_>,
    codec: CodecType,
    code: &[u8; 4],
    desc: &'static str,
) -> Result<CodecParameters> {
    let data = required_config(track, config, code, desc)?;

    let mut params = base_params(codec, MediaKind::Audio, config);
    params.with_extra_data(Box::from(data));
    Ok(params)
}

fn make_opus_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    make_audio_params(track, config, CODEC_TYPE_OPUS, b"dOps", "isomp4: missing dOps atom")
}

fn make_flac_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    make_audio_params(track, config, CODEC_TYPE_FLAC, b"dfLa", "isomp4: missing dfLa atom")
}

fn make_alac_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    make_audio_params(track, config, CODEC_TYPE_ALAC, b"alac", "isomp4: missing alac atom")
}

fn make_ac3_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    make_audio_params(track, config, CODEC_TYPE_AC3, b"dac3", "isomp4: missing dac3 atom")
}

fn make_eac3_params(track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    make_audio_params(track, config, CODEC_TYPE_EAC3, b"dec3", "isomp4: missing dec3 atom")
}

fn make_mp3_params(_track: usize, config: &CodecConfig<'_>) -> Result<CodecParameters> {
    // A MP3 sample entry has no codec-specific atom.
    Ok(base_params(CODEC_TYPE_MP3, MediaKind::Audio, config))
}

/// Codecs supported by default.
pub const DEFAULT_CODECS: &[CodecDescriptor] = &[
    CodecDescriptor {
        codec: CODEC_TYPE_H264,
        short_name: "h264",
        long_name: "Advanced Video Coding (H.264)",
        sample_entries: &[*b"avc1", *b"avc3"],
        config_func: make_h264_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_HEVC,
        short_name: "hevc",
        long_name: "High Efficiency Video Coding (H.265)",
        sample_entries: &[*b"hvc1", *b"hev1"],
        config_func: make_hevc_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_AV1,
        short_name: "av1",
        long_name: "AOMedia Video 1",
        sample_entries: &[*b"av01"],
        config_func: make_av1_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_VP9,
        short_name: "vp9",
        long_name: "VP9",
        sample_entries: &[*b"vp09"],
        config_func: make_vp9_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_AAC,
        short_name: "mp4a",
        long_name: "MPEG-4 Audio (AAC, MP3, AC-3)",
        sample_entries: &[*b"mp4a"],
        config_func: make_mp4a_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_MP3,
        short_name: "mp3",
        long_name: "MPEG Audio Layer 3 (MP3)",
        sample_entries: &[*b".mp3"],
        config_func: make_mp3_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_OPUS,
        short_name: "opus",
        long_name: "Opus Interactive Audio Codec",
        sample_entries: &[*b"Opus"],
        config_func: make_opus_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_FLAC,
        short_name: "flac",
        long_name: "Free Lossless Audio Codec",
        sample_entries: &[*b"fLaC"],
        config_func: make_flac_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_ALAC,
        short_name: "alac",
        long_name: "Apple Lossless Audio Codec",
        sample_entries: &[*b"alac"],
        config_func: make_alac_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_AC3,
        short_name: "ac3",
        long_name: "Dolby Digital (AC-3)",
        sample_entries: &[*b"ac-3"],
        config_func: make_ac3_params,
    },
    CodecDescriptor {
        codec: CODEC_TYPE_EAC3,
        short_name: "eac3",
        long_name: "Dolby Digital Plus (E-AC-3)",
        sample_entries: &[*b"ec-3"],
        config_func: make_eac3_params,
    },
];

#[cfg(test)]
pub(crate) mod tests {
    use isoplex_core::codecs::{AudioEntryInfo, CodecConfigDecoder, VideoEntryInfo};
    use isoplex_core::common::FourCc;
    use isoplex_core::errors::Error;

    use super::*;
    use crate::default::get_codecs;

    /// Build an `esds` payload for an object type and decoder specific info.
    pub fn make_esds(object_type: u8, dsi: &[u8]) -> Vec<u8> {
        let mut dec_config = vec![object_type, 0x15, 0, 0, 0];
        dec_config.extend_from_slice(&[0; 8]);
        dec_config.push(DECODER_SPECIFIC_DESCRIPTOR);
        dec_config.push(dsi.len() as u8);
        dec_config.extend_from_slice(dsi);

        // ES_ID, then flags with the OCR stream flag set.
        let mut es = vec![0, 1, 0x20, 0, 2];
        es.push(DECODER_CONFIG_DESCRIPTOR);
        // A multi-byte length encoding.
        es.extend_from_slice(&[0x80, dec_config.len() as u8]);
        es.extend_from_slice(&dec_config);
        // SL config.
        es.extend_from_slice(&[0x06, 1, 2]);

        let mut esds = vec![0; 4];
        esds.push(ES_DESCRIPTOR);
        esds.push(es.len() as u8);
        esds.extend_from_slice(&es);
        esds
    }

    fn audio_config<'a>(code: &[u8; 4], config: Option<(&[u8; 4], &'a [u8])>) -> CodecConfig<'a> {
        CodecConfig {
            sample_entry: FourCc::new(*code),
            kind: MediaKind::Audio,
            audio: Some(AudioEntryInfo { channels: 2, sample_size: 16, sample_rate: 44_100 }),
            video: None,
            config: config.map(|(code, data)| (FourCc::new(*code), data)),
        }
    }

    #[test]
    fn verify_esds() {
        let esds = make_esds(0x40, &[0x12, 0x10]);
        let desc = read_esds(&esds).unwrap();

        assert_eq!(desc.object_type_indication, Some(0x40));
        assert_eq!(desc.dec_specific_info, Some(&[0x12, 0x10][..]));

        // Truncated.
        assert!(read_esds(&esds[..esds.len() - 4]).is_err());
    }

    #[test]
    fn verify_mp4a_object_types() {
        let esds = make_esds(0x40, &[0x12, 0x10]);
        let config = audio_config(b"mp4a", Some((b"esds", &esds[..])));
        let params = get_codecs().configure(0, &config).unwrap();

        assert_eq!(params.codec, CODEC_TYPE_AAC);
        assert_eq!(params.profile, Some(2));
        assert_eq!(params.sample_rate, Some(44_100));
        assert_eq!(params.extra_data.as_deref(), Some(&[0x12, 0x10][..]));

        let esds = make_esds(0x6b, &[]);
        let config = audio_config(b"mp4a", Some((b"esds", &esds[..])));
        let params = get_codecs().configure(0, &config).unwrap();
        assert_eq!(params.codec, CODEC_TYPE_MP3);

        let esds = make_esds(0xdd, &[]);
        let config = audio_config(b"mp4a", Some((b"esds", &esds[..])));
        match get_codecs().configure(3, &config) {
            Err(Error::CodecConfigError { track: 3, .. }) => (),
            _ => panic!("expected a codec configuration error"),
        }
    }

    #[test]
    fn verify_missing_config() {
        match get_codecs().configure(1, &audio_config(b"Opus", None)) {
            Err(Error::CodecConfigError { track: 1, .. }) => (),
            _ => panic!("expected a codec configuration error"),
        }

        let params = get_codecs().configure(1, &audio_config(b".mp3", None)).unwrap();
        assert_eq!(params.codec, CODEC_TYPE_MP3);
    }

    #[test]
    fn verify_video_params() {
        let config = CodecConfig {
            sample_entry: FourCc::new(*b"avc1"),
            kind: MediaKind::Video,
            audio: None,
            video: Some(VideoEntryInfo { width: 640, height: 360 }),
            config: Some((FourCc::new(*b"avcC"), &[1u8, 100, 0, 40][..])),
        };

        let params = get_codecs().configure(0, &config).unwrap();
        assert_eq!(params.codec, CODEC_TYPE_H264);
        assert!(params.is_video());
        assert_eq!(params.profile, Some(100));
        assert_eq!(params.width, Some(640));
        assert_eq!(params.height, Some(360));
    }
}
