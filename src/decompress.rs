//! Incremental bzip2 decompression over fixed-size chunks.
//!
//! [`StreamDecompressor`] is fed whatever the source hands out and buffers
//! across calls, so chunk boundaries never have to line up with bzip2 blocks.
//! [`ChunkedDecoder`] wraps it as a `Read` so the markup parser can pull from it.

use crate::config::DECOMPRESS_RESERVE;
use bzip2::{Decompress, Status};
use std::io::{self, Read};
use tracing::debug;

pub struct StreamDecompressor {
    raw: Decompress,
    stream_ended: bool,
    started: bool,
    streams: u32,
}

impl Default for StreamDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecompressor {
    pub fn new() -> Self {
        Self {
            raw: Decompress::new(false),
            stream_ended: false,
            started: false,
            streams: 0,
        }
    }

    /// Decompresses `input`, appending to `out`. Returns the number of bytes
    /// appended, which may be zero while a block is still incomplete.
    pub fn feed(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> io::Result<usize> {
        let start = out.len();

        while !input.is_empty() {
            if self.stream_ended {
                // Concatenated streams, as written by parallel compressors
                self.raw = Decompress::new(false);
                self.stream_ended = false;
            }
            self.started = true;

            out.reserve(DECOMPRESS_RESERVE);
            let in_before = self.raw.total_in();
            let out_before = out.len();

            let status = self.raw.decompress_vec(input, out).map_err(corrupt)?;

            let consumed = (self.raw.total_in() - in_before) as usize;
            input = &input[consumed..];

            if status == Status::StreamEnd {
                self.stream_ended = true;
                self.streams += 1;
                debug!(streams = self.streams, "bzip2 stream finished");
                continue;
            }
            if consumed == 0 && out.len() == out_before {
                return Err(corrupt("decompressor made no progress"));
            }
        }

        self.drain(out)?;
        Ok(out.len() - start)
    }

    /// Flushes buffered output once the source is exhausted. Fails when the
    /// source stopped in the middle of a stream.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        let start = out.len();
        self.drain(out)?;
        if self.started && !self.stream_ended {
            return Err(corrupt("unexpected end of compressed stream"));
        }
        Ok(out.len() - start)
    }

    pub fn streams(&self) -> u32 {
        self.streams
    }

    /// Pulls output the decoder is holding back for lack of room.
    fn drain(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        while self.started && !self.stream_ended {
            out.reserve(DECOMPRESS_RESERVE);
            let out_before = out.len();
            let status = self.raw.decompress_vec(&[], out).map_err(corrupt)?;
            if status == Status::StreamEnd {
                self.stream_ended = true;
                self.streams += 1;
            } else if out.len() == out_before {
                break;
            }
        }
        Ok(())
    }
}

fn corrupt<E: std::fmt::Display>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

/// Reads `chunk_size` bytes at a time from `source` and serves the
/// decompressed bytes through `Read`.
pub struct ChunkedDecoder<R: Read> {
    source: R,
    decompressor: StreamDecompressor,
    chunk: Vec<u8>,
    pending: Vec<u8>,
    pos: usize,
    exhausted: bool,
    bytes_read: u64,
    bytes_decompressed: u64,
}

impl<R: Read> ChunkedDecoder<R> {
    pub fn new(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            decompressor: StreamDecompressor::new(),
            chunk: vec![0; chunk_size.max(1)],
            pending: Vec::new(),
            pos: 0,
            exhausted: false,
            bytes_read: 0,
            bytes_decompressed: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_decompressed(&self) -> u64 {
        self.bytes_decompressed
    }

    /// Refills `pending`; an empty decompression result just means read again.
    fn fill(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.pos = 0;

        while self.pending.is_empty() && !self.exhausted {
            let n = match self.source.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let produced = if n == 0 {
                self.exhausted = true;
                self.decompressor.finish(&mut self.pending)?
            } else {
                self.bytes_read += n as u64;
                self.decompressor.feed(&self.chunk[..n], &mut self.pending)?
            };
            self.bytes_decompressed += produced as u64;
        }
        Ok(())
    }
}

impl<R: Read> Read for ChunkedDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            self.fill()?;
        }
        let available = &self.pending[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}
