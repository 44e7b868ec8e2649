// Isoplex Check Tool
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Justification: Fields on DemuxOptions may change at any time, but isoplex-check doesn't want to
// be updated every time those fields change, therefore always fill in the remaining fields with
// default values.
#![allow(clippy::needless_update)]

use std::fs::File;
use std::path::PathBuf;

use isoplex_core::errors::Result;
use isoplex_core::io::MediaSourceStream;
use isoplex_core::packet::Packet;
use isoplex_format_isomp4::{DemuxOptions, IsoMp4Demuxer, Stream};

use clap::Parser;
use log::{info, warn};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "Isoplex Check", version, about = "Inspect the streams and packets of an MP4 file")]
struct Args {
    /// The input file path.
    #[arg(value_name = "INPUT")]
    path: PathBuf,

    /// Seek to this time, in seconds, before reading packets.
    #[arg(long, short = 's', value_name = "SECONDS")]
    seek: Option<f64>,

    /// Stop after reading this many packets.
    #[arg(long, short = 'n', value_name = "COUNT")]
    count: Option<u64>,

    /// Only print the streams, not the packets.
    #[arg(long)]
    streams_only: bool,

    /// Fail on tracks with an undecodable codec configuration instead of excluding them.
    #[arg(long)]
    strict_codecs: bool,

    /// Exclude tracks with inconsistent sample tables instead of failing.
    #[arg(long)]
    lenient_tables: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct StreamReport {
    index: usize,
    track_id: u32,
    kind: String,
    codec: String,
    sample_entry: Option<String>,
    language: Option<String>,
    time_base: Option<String>,
    duration: u64,
    samples: u32,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    width: Option<u16>,
    height: Option<u16>,
    profile: Option<u32>,
}

impl StreamReport {
    fn new(index: usize, stream: &Stream) -> Self {
        let params = &stream.codec_params;

        StreamReport {
            index,
            track_id: stream.track_id,
            kind: stream.kind.to_string(),
            codec: params.codec.to_string(),
            sample_entry: params.sample_entry.map(|code| code.to_string()),
            language: stream.language.clone(),
            time_base: params.time_base.map(|tb| tb.to_string()),
            duration: stream.duration,
            samples: stream.sample_count(),
            sample_rate: params.sample_rate,
            channels: params.channels,
            width: params.width,
            height: params.height,
            profile: params.profile,
        }
    }
}

#[derive(Serialize)]
struct ExcludedReport {
    track_index: usize,
    track_id: u32,
    reason: String,
}

#[derive(Serialize)]
struct PacketReport {
    stream: usize,
    dts: u64,
    decode_time: f64,
    presentation_time: f64,
    duration: f64,
    len: usize,
    keyframe: bool,
}

impl From<&Packet> for PacketReport {
    fn from(packet: &Packet) -> Self {
        PacketReport {
            stream: packet.stream_index(),
            dts: packet.dts(),
            decode_time: packet.decode_time(),
            presentation_time: packet.presentation_time(),
            duration: packet.duration(),
            len: packet.buf().len(),
            keyframe: packet.is_keyframe(),
        }
    }
}

#[derive(Serialize, Default)]
struct Report {
    streams: Vec<StreamReport>,
    excluded: Vec<ExcludedReport>,
    packets: Vec<PacketReport>,
    n_packets: u64,
    n_bytes: u64,
}

fn run(args: &Args, report: &mut Report) -> Result<()> {
    let source = Box::new(File::open(&args.path)?);
    let mss = MediaSourceStream::new(source, Default::default());

    let opts = DemuxOptions {
        strict_codecs: args.strict_codecs,
        strict_tables: !args.lenient_tables,
        ..Default::default()
    };

    let mut demuxer = IsoMp4Demuxer::open(mss, &opts)?;

    report.streams =
        demuxer.stream_info().iter().enumerate().map(|(i, s)| StreamReport::new(i, s)).collect();

    report.excluded = demuxer
        .excluded_tracks()
        .iter()
        .map(|track| ExcludedReport {
            track_index: track.track_index,
            track_id: track.track_id,
            reason: track.reason.to_string(),
        })
        .collect();

    // Surface the absence of playable streams as an error.
    demuxer.streams()?;

    if args.streams_only {
        return Ok(());
    }

    if let Some(time) = args.seek {
        demuxer.seek_to_time(time)?;
        info!("seeked to {}s, now at {}s", time, demuxer.current_time());
    }

    while args.count.map_or(true, |count| report.n_packets < count) {
        let Some(packet) = demuxer.read_packet()?
        else {
            break;
        };

        report.n_packets += 1;
        report.n_bytes += packet.buf().len() as u64;
        report.packets.push(PacketReport::from(&packet));
    }

    Ok(())
}

fn print_streams(report: &Report) {
    println!("Streams");
    println!("=================================================");

    for stream in &report.streams {
        println!();
        println!("  [{}] track id {} ({})", stream.index, stream.track_id, stream.kind);
        println!("      Codec:         {}", stream.codec);

        if let Some(entry) = &stream.sample_entry {
            println!("      Sample Entry:  {}", entry);
        }
        if let Some(language) = &stream.language {
            println!("      Language:      {}", language);
        }
        if let Some(tb) = &stream.time_base {
            println!("      Time Base:     {}", tb);
        }
        println!("      Duration:      {}", stream.duration);
        println!("      Samples:       {}", stream.samples);

        if let Some(rate) = stream.sample_rate {
            println!("      Sample Rate:   {}", rate);
        }
        if let Some(channels) = stream.channels {
            println!("      Channels:      {}", channels);
        }
        if let (Some(width), Some(height)) = (stream.width, stream.height) {
            println!("      Dimensions:    {}x{}", width, height);
        }
        if let Some(profile) = stream.profile {
            println!("      Profile:       {}", profile);
        }
    }

    for track in &report.excluded {
        println!();
        println!("  [-] track id {} excluded: {}", track.track_id, track.reason);
    }

    println!();
}

fn print_packet(packet: &PacketReport) {
    println!(
        "  stream={:<3} dts={:<10} time={:>12.6} pts={:>12.6} dur={:>10.6} len={:<8} {}",
        packet.stream,
        packet.dts,
        packet.decode_time,
        packet.presentation_time,
        packet.duration,
        packet.len,
        if packet.keyframe { "K" } else { "" },
    );
}

fn main() {
    pretty_env_logger::init();

    let args = Args::parse();

    let mut report: Report = Default::default();

    if !args.json {
        println!("Input Path: {}", args.path.display());
        println!();
    }

    let result = run(&args, &mut report);

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(err) => warn!("failed to serialize report: {}", err),
        }
    }
    else {
        print_streams(&report);

        if !report.packets.is_empty() {
            println!("Packets");
            println!("=================================================");
            println!();

            for packet in &report.packets {
                print_packet(packet);
            }

            println!();
        }

        println!("  Total Packets: {:>12}", report.n_packets);
        println!("  Total Bytes:   {:>12}", report.n_bytes);
        println!();
    }

    if let Err(err) = result {
        eprintln!("Check interrupted by error: {}", err);
        std::process::exit(2);
    }
}
