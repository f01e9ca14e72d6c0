use crate::{Error, Result};
use std::fmt;

/// Inclusive byte range of the remote resource that makes up one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Position of the chunk in the reassembled file
    pub id: u64,
    /// First byte of the chunk
    pub start: u64,
    /// Last byte of the chunk
    pub end: u64,
}

impl ChunkRange {
    /// Number of bytes in the range
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
    /// Formatted [`RANGE`][reqwest::header::RANGE] header value
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}, {}]", self.id, self.start, self.end)
    }
}

/// Iterator over the chunks of a remote file of known size
///
/// Chunks are yielded in ascending offset order and numbered from 0, so the
/// identifier doubles as the reassembly position.
#[derive(Debug, Clone, Copy)]
pub struct Chunks {
    low: u64,
    size: u64,
    chunk_size: u64,
    current_pos: u64,
}

impl Chunks {
    /// Create the iterator
    /// # Arguments
    /// * `size` - total length of the file in bytes
    /// * `chunk_size` - the desired size of the chunks
    pub fn new(size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::BadChunkSize);
        }
        Ok(Chunks {
            low: 0,
            size,
            chunk_size,
            current_pos: 0,
        })
    }
    /// Number of chunks the file is split into, `ceil(size / chunk_size)`
    pub fn total(size: u64, chunk_size: u64) -> u64 {
        if chunk_size == 0 {
            0
        } else {
            size / chunk_size + u64::from(size % chunk_size != 0)
        }
    }
}

impl Iterator for Chunks {
    type Item = ChunkRange;
    fn next(&mut self) -> Option<Self::Item> {
        if self.low >= self.size {
            None
        } else {
            let prev_low = self.low;
            self.low += std::cmp::min(self.chunk_size, self.size - self.low);
            let res = ChunkRange {
                id: self.current_pos,
                start: prev_low,
                end: self.low - 1,
            };
            self.current_pos += 1;
            Some(res)
        }
    }
}
