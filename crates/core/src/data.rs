// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked byte buffer carried by [`Event::Data`](crate::Event).
//!
//! A `Data` is an ordered list of [`Bytes`] chunks with a cached total
//! length. Cloning shares chunk storage; `shift`/`pop` split at arbitrary
//! byte boundaries without copying.

use bytes::Bytes;
use std::collections::VecDeque;

/// Ordered sequence of byte chunks.
#[derive(Clone, Default)]
pub struct Data {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total byte length across all chunks.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently held.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Append one chunk. Empty chunks are dropped.
    pub fn push(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push_back(chunk);
        }
    }

    /// Append all chunks of another buffer, sharing their storage.
    pub fn push_data(&mut self, other: &Data) {
        for chunk in &other.chunks {
            self.len += chunk.len();
            self.chunks.push_back(chunk.clone());
        }
    }

    /// Split off and return the first `n` bytes (fewer if the buffer is
    /// shorter). Chunks are sliced in place, never copied.
    pub fn shift(&mut self, n: usize) -> Data {
        let mut out = Data::new();
        let mut remaining = n;
        while remaining > 0 {
            let Some(mut chunk) = self.chunks.pop_front() else {
                break;
            };
            if chunk.len() <= remaining {
                remaining -= chunk.len();
                self.len -= chunk.len();
                out.push(chunk);
            } else {
                let head = chunk.split_to(remaining);
                self.len -= head.len();
                out.push(head);
                self.chunks.push_front(chunk);
                remaining = 0;
            }
        }
        out
    }

    /// Drop the last `n` bytes.
    pub fn pop(&mut self, n: usize) {
        let mut remaining = n;
        while remaining > 0 {
            let Some(mut chunk) = self.chunks.pop_back() else {
                break;
            };
            if chunk.len() <= remaining {
                remaining -= chunk.len();
                self.len -= chunk.len();
            } else {
                let keep = chunk.len() - remaining;
                self.len -= remaining;
                chunk.truncate(keep);
                self.chunks.push_back(chunk);
                remaining = 0;
            }
        }
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }

    /// Iterate the chunks in order.
    pub fn chunks(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    /// Flatten into one contiguous chunk. O(len) copy unless already contiguous.
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks[0].clone(),
            _ => {
                let mut buf = Vec::with_capacity(self.len);
                for chunk in &self.chunks {
                    buf.extend_from_slice(chunk);
                }
                Bytes::from(buf)
            }
        }
    }

    /// Lossy UTF-8 rendering, used by logging and tests.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl From<Bytes> for Data {
    fn from(chunk: Bytes) -> Self {
        let mut data = Data::new();
        data.push(chunk);
        data
    }
}

impl From<Vec<u8>> for Data {
    fn from(buf: Vec<u8>) -> Self {
        Bytes::from(buf).into()
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Bytes::copy_from_slice(s.as_bytes()).into()
    }
}

impl From<&[u8]> for Data {
    fn from(buf: &[u8]) -> Self {
        Bytes::copy_from_slice(buf).into()
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        // Chunk boundaries are not identity; compare byte content.
        self.len == other.len && self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Data {}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Data({} bytes, {} chunks)", self.len, self.chunks.len())
    }
}

#[cfg(test)]
#[path = "data_tests.rs"]
mod tests;
