// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Isoplex crates. Please see the workspace Cargo.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

//! Sample table navigation and demultiplexing for the ISO Base Media File Format (MP4, M4A, MOV,
//! etc.).

mod atoms;
pub mod codecs;
pub mod cursor;
pub mod demuxer;
pub mod movie;
pub mod options;
mod schedule;
pub mod table;

pub use atoms::{ConfigAtom, HandlerType, SampleEntry};
pub use cursor::{CursorState, StreamCursor};
pub use demuxer::{ExcludedTrack, IsoMp4Demuxer, Stream};
pub use movie::{read_movie, Movie, TrackDesc};
pub use options::DemuxOptions;
pub use table::SampleTable;

pub mod default {
    //! The `default` module provides the codec registry pre-loaded with every codec this crate
    //! knows how to configure.

    use lazy_static::lazy_static;

    use isoplex_core::codecs::CodecRegistry;

    use crate::codecs::DEFAULT_CODECS;

    lazy_static! {
        static ref CODEC_REGISTRY: CodecRegistry = {
            let mut registry = CodecRegistry::new();
            register_enabled_codecs(&mut registry);
            registry
        };
    }

    /// Gets the default `CodecRegistry`.
    ///
    /// This function is lazy and does not instantiate the `CodecRegistry` until the first call to
    /// this function.
    pub fn get_codecs() -> &'static CodecRegistry {
        &CODEC_REGISTRY
    }

    /// Registers all the codecs known to this crate with the provided `CodecRegistry`.
    ///
    /// Use this function to easily populate a custom registry.
    pub fn register_enabled_codecs(registry: &mut CodecRegistry) {
        for descriptor in DEFAULT_CODECS {
            registry.register(descriptor);
        }
    }
}
