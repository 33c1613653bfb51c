use ev3explorer_protocol::constants::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use serde::{Deserialize, Serialize};

use crate::TransferError;

/// File name endings the brick explorer knows how to compile.
pub const SOURCE_EXTENSIONS: [&str; 2] = [".sb", ".lms"];

/// One entry of a brick directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    name: String,
    size_bytes: u32,
    is_directory: bool,
}

impl DirectoryEntry {
    pub fn file(name: impl Into<String>, size_bytes: u32) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes: 0,
            is_directory: true,
        }
    }

    /// Entry name, never containing a `/`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes; always 0 for directories.
    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// True when the name ends in a source extension (ASCII case-insensitive).
    pub fn is_compileable(&self) -> bool {
        !self.is_directory && has_source_extension(&self.name)
    }
}

fn has_source_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SOURCE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Tuning for file transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    chunk_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferOptions {
    /// Uses `chunk_size` bytes per round-trip, clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Progress of one handle-based transfer.
///
/// Owned by the state machine that opened the handle and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    handle: u8,
    total_length: Option<u32>,
    bytes_transferred: u32,
    chunk_size: usize,
}

impl TransferSession {
    pub fn new(handle: u8, total_length: Option<u32>, chunk_size: usize) -> Self {
        Self {
            handle,
            total_length,
            bytes_transferred: 0,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
        }
    }

    /// Handle assigned by the brick.
    pub fn handle(&self) -> u8 {
        self.handle
    }

    pub fn total_length(&self) -> Option<u32> {
        self.total_length
    }

    pub fn bytes_transferred(&self) -> u32 {
        self.bytes_transferred
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes left, when the total is known.
    pub fn remaining(&self) -> Option<u32> {
        self.total_length.map(|t| t - self.bytes_transferred)
    }

    /// Length of the next round-trip's chunk.
    pub fn next_chunk_len(&self) -> usize {
        match self.remaining() {
            Some(r) => (r as usize).min(self.chunk_size),
            None => self.chunk_size,
        }
    }

    /// Records `n` more bytes as moved.
    pub fn advance(&mut self, n: usize) -> Result<(), TransferError> {
        let next = u32::try_from(n)
            .ok()
            .and_then(|n| self.bytes_transferred.checked_add(n))
            .filter(|next| self.total_length.is_none_or(|total| *next <= total))
            .ok_or_else(|| {
                TransferError::InvalidArgument(format!(
                    "advancing by {n} bytes overruns transfer of {:?} bytes at {}",
                    self.total_length, self.bytes_transferred
                ))
            })?;
        self.bytes_transferred = next;
        Ok(())
    }

    /// True once every known byte has been moved.
    pub fn is_complete(&self) -> bool {
        self.remaining() == Some(0)
    }
}
