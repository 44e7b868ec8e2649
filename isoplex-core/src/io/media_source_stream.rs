// Isoplex
// Copyright (c) 2026 The Project Isoplex Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;
use std::io::{Read, Seek};

use super::{MediaSource, ReadBytes};

const END_OF_STREAM_ERROR_STR: &str = "end of stream";

/// `MediaSourceStreamOptions` specifies the buffering behaviour of a `MediaSourceStream`.
#[derive(Copy, Clone, Debug)]
pub struct MediaSourceStreamOptions {
    /// The maximum buffer size. Must be at least 1kB.
    pub buffer_len: usize,
}

impl Default for MediaSourceStreamOptions {
    fn default() -> Self {
        MediaSourceStreamOptions { buffer_len: 64 * 1024 }
    }
}

/// A `MediaSourceStream` is the common reader type for Isoplex. By using type erasure and dynamic
/// dispatch, `MediaSourceStream` wraps and hides the inner reader from the consumer, allowing any
/// typical `Read`er to be used in a generic way, selectable at runtime.
///
/// To minimize system call and dynamic dispatch overhead on the inner reader, `MediaSourceStream`
/// implements a read-ahead buffer. The read-ahead length starts at 1kB and doubles as more
/// sequential reads are performed, up-to the configured buffer length. Growing the read-ahead length
/// over time reduces the excess data buffered on consecutive seeks, which are frequent when
/// demuxing interleaved tracks.
///
/// A seek that lands within the buffered data does not touch the inner reader. Any other seek
/// invalidates the buffer. Reads at least as long as the buffer bypass it.
pub struct MediaSourceStream {
    /// The source reader.
    inner: Box<dyn MediaSource>,
    /// The read-ahead buffer.
    buf: Box<[u8]>,
    /// The read position within the buffer.
    read_pos: usize,
    /// The exclusive end of the valid data within the buffer.
    end_pos: usize,
    /// The current block size for a new read.
    read_block_len: usize,
    /// Absolute position of the inner stream. This is the position of `buf[end_pos]`.
    abs_pos: u64,
}

impl MediaSourceStream {
    const MIN_BLOCK_LEN: usize = 1024;

    pub fn new(source: Box<dyn MediaSource>, options: MediaSourceStreamOptions) -> Self {
        assert!(options.buffer_len >= Self::MIN_BLOCK_LEN);

        MediaSourceStream {
            inner: source,
            buf: vec![0; options.buffer_len].into_boxed_slice(),
            read_pos: 0,
            end_pos: 0,
            read_block_len: Self::MIN_BLOCK_LEN,
            abs_pos: 0,
        }
    }

    /// Get the number of bytes buffered but not yet read.
    pub fn unread_buffer_len(&self) -> usize {
        self.end_pos - self.read_pos
    }

    /// Unwraps this `MediaSourceStream`, returning the underlying reader.
    pub fn into_inner(self) -> Box<dyn MediaSource> {
        self.inner
    }

    #[inline(always)]
    fn is_buffer_exhausted(&self) -> bool {
        self.read_pos == self.end_pos
    }

    /// If the buffer has been exhausted, fetch a new block of data to replenish the buffer.
    fn fetch(&mut self) -> io::Result<()> {
        if self.is_buffer_exhausted() {
            let len = cmp::min(self.read_block_len, self.buf.len());

            let actual_read_len = loop {
                match self.inner.read(&mut self.buf[..len]) {
                    Ok(count) => break count,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            };

            self.read_pos = 0;
            self.end_pos = actual_read_len;
            self.abs_pos += actual_read_len as u64;

            // Grow the read block length exponentially to reduce the overhead of buffering on
            // consecutive seeks.
            self.read_block_len = cmp::min(self.read_block_len << 1, self.buf.len());
        }

        Ok(())
    }

    /// If the buffer has been exhausted, fetch a new block of data to replenish the buffer. If
    /// no more data could be fetched, return an end-of-stream error.
    fn fetch_or_eof(&mut self) -> io::Result<()> {
        self.fetch()?;

        if self.is_buffer_exhausted() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, END_OF_STREAM_ERROR_STR));
        }

        Ok(())
    }

    /// Resets the read-ahead buffer, and sets the absolute stream position to `pos`.
    fn reset(&mut self, pos: u64) {
        self.read_pos = 0;
        self.end_pos = 0;
        self.read_block_len = Self::MIN_BLOCK_LEN;
        self.abs_pos = pos;
    }

    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut bytes = [0; N];

        if self.unread_buffer_len() >= N {
            bytes.copy_from_slice(&self.buf[self.read_pos..self.read_pos + N]);
            self.read_pos += N;
        }
        else {
            self.read_buf_exact(&mut bytes)?;
        }

        Ok(bytes)
    }
}

impl MediaSource for MediaSourceStream {
    #[inline]
    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    #[inline]
    fn byte_len(&self) -> Option<u64> {
        self.inner.byte_len()
    }
}

impl io::Read for MediaSourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Large reads with nothing buffered go straight to the inner reader.
        if self.is_buffer_exhausted() && buf.len() >= self.buf.len() {
            let count = self.inner.read(buf)?;
            self.abs_pos += count as u64;
            return Ok(count);
        }

        self.fetch()?;

        let count = cmp::min(buf.len(), self.unread_buffer_len());
        buf[..count].copy_from_slice(&self.buf[self.read_pos..self.read_pos + count]);
        self.read_pos += count;

        Ok(count)
    }
}

impl io::Seek for MediaSourceStream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(pos) => Some(pos),
            io::SeekFrom::Current(delta) => self.pos().checked_add_signed(delta),
            io::SeekFrom::End(_) => None,
        };

        // The buffered data spans [buf_start, abs_pos). A seek into that range only moves the read
        // position.
        if let Some(target) = target {
            let buf_start = self.abs_pos - self.end_pos as u64;

            if target >= buf_start && target <= self.abs_pos {
                self.read_pos = (target - buf_start) as usize;
                return Ok(target);
            }
        }

        let new_pos = match target {
            Some(target) => self.inner.seek(io::SeekFrom::Start(target))?,
            None => self.inner.seek(pos)?,
        };

        self.reset(new_pos);

        Ok(new_pos)
    }
}

impl ReadBytes for MediaSourceStream {
    #[inline(always)]
    fn read_byte(&mut self) -> io::Result<u8> {
        if self.is_buffer_exhausted() {
            self.fetch_or_eof()?;
        }

        let value = self.buf[self.read_pos];
        self.read_pos += 1;

        Ok(value)
    }

    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        self.read_array()
    }

    fn read_triple_bytes(&mut self) -> io::Result<[u8; 3]> {
        self.read_array()
    }

    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        self.read_array()
    }

    fn read_buf_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read(buf) {
                Ok(0) => break,
                Ok(count) => {
                    buf = &mut buf[count..];
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        if !buf.is_empty() {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, END_OF_STREAM_ERROR_STR))
        }
        else {
            Ok(())
        }
    }

    fn ignore_bytes(&mut self, mut count: u64) -> io::Result<()> {
        // If the stream is seekable and the seek is large, seek instead of reading. The seek still
        // has to land before the end of the source for the ignore to succeed.
        if count > self.unread_buffer_len() as u64 && self.is_seekable() {
            let target = self.pos() + count;

            if let Some(len) = self.byte_len() {
                if target > len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        END_OF_STREAM_ERROR_STR,
                    ));
                }
            }

            self.seek(io::SeekFrom::Start(target))?;
            return Ok(());
        }

        while count > 0 {
            self.fetch_or_eof()?;
            let discard = cmp::min(count, self.unread_buffer_len() as u64);
            self.read_pos += discard as usize;
            count -= discard;
        }

        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.abs_pos - self.unread_buffer_len() as u64
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Seek, SeekFrom};

    use super::{MediaSourceStream, MediaSourceStreamOptions};
    use crate::io::{ReadBytes, ReadOnlySource};

    /// Generate a random vector of bytes of the specified length using a PRNG.
    fn generate_random_bytes(len: usize) -> Box<[u8]> {
        let mut lcg: u32 = 0xec57c4bf;

        let mut bytes = vec![0; len];

        for quad in bytes.chunks_mut(4) {
            lcg = lcg.wrapping_mul(1664525).wrapping_add(1013904223);
            for (src, dest) in quad.iter_mut().zip(&lcg.to_ne_bytes()) {
                *src = *dest;
            }
        }

        bytes.into_boxed_slice()
    }

    fn new_stream(data: &[u8]) -> MediaSourceStream {
        MediaSourceStream::new(
            Box::new(Cursor::new(data.to_vec())),
            MediaSourceStreamOptions { buffer_len: 4096 },
        )
    }

    #[test]
    fn verify_mss_read() {
        let data = generate_random_bytes(5 * 4096 + 17);

        let mut mss = new_stream(&data);

        // Bytes, then a partial buffer, then a read larger than the buffer.
        assert_eq!(mss.read_byte().unwrap(), data[0]);
        assert_eq!(mss.read_quad_bytes().unwrap(), data[1..5]);

        let mut buf = vec![0; 3000];
        mss.read_buf_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[5..3005]);

        let mut buf = vec![0; 9000];
        mss.read_buf_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[3005..12005]);
        assert_eq!(mss.pos(), 12005);

        let mut rest = Vec::new();
        mss.read_to_end(&mut rest).unwrap();
        assert_eq!(&rest[..], &data[12005..]);

        assert!(mss.read_byte().is_err());
    }

    #[test]
    fn verify_mss_seek() {
        let data = generate_random_bytes(5 * 4096);

        let mut mss = new_stream(&data);

        // Seek forward, out of the buffer.
        assert_eq!(mss.seek(SeekFrom::Start(10_000)).unwrap(), 10_000);
        assert_eq!(mss.read_be_u32().unwrap(), u32::from_be_bytes(data[10_000..10_004].try_into().unwrap()));

        // Seek backwards within the buffer.
        assert_eq!(mss.seek(SeekFrom::Current(-4)).unwrap(), 10_000);
        assert_eq!(mss.read_byte().unwrap(), data[10_000]);

        // Seek backwards, out of the buffer.
        assert_eq!(mss.seek(SeekFrom::Start(3)).unwrap(), 3);
        assert_eq!(mss.pos(), 3);
        assert_eq!(mss.read_byte().unwrap(), data[3]);

        // Seek from the end.
        assert_eq!(mss.seek(SeekFrom::End(-1)).unwrap(), data.len() as u64 - 1);
        assert_eq!(mss.read_byte().unwrap(), data[data.len() - 1]);
    }

    #[test]
    fn verify_mss_ignore_bytes() {
        let data = generate_random_bytes(3 * 4096);

        // Seekable.
        let mut mss = new_stream(&data);
        mss.ignore_bytes(5000).unwrap();
        assert_eq!(mss.pos(), 5000);
        assert_eq!(mss.read_byte().unwrap(), data[5000]);
        assert!(mss.ignore_bytes(data.len() as u64).is_err());

        // Unseekable.
        let mut mss = MediaSourceStream::new(
            Box::new(ReadOnlySource::new(Cursor::new(data.to_vec()))),
            MediaSourceStreamOptions { buffer_len: 4096 },
        );
        mss.ignore_bytes(5000).unwrap();
        assert_eq!(mss.pos(), 5000);
        assert_eq!(mss.read_byte().unwrap(), data[5000]);
    }
}
