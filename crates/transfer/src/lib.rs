//! Multi-round-trip brick protocols: directory listing and file transfer.
//!
//! Every operation here is a small state machine implementing [`Exchange`],
//! driven request by request through a [`BrickConnection`] until it either
//! produces a complete result or fails. Nothing partial is ever returned.

mod chunked;
mod connection;
mod exchange;
mod listing;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use chunked::{
    ReadSession, WriteSession, checksum_bytes, read_file, verify_checksum, write_file,
};
pub use connection::{BrickConnection, StreamConnection};
pub use exchange::{Exchange, Request, check_reply, drive};
pub use listing::{ListingSession, ListingState, list_directory, parse_listing};
pub use types::{DirectoryEntry, SOURCE_EXTENSIONS, TransferOptions, TransferSession};

use ev3explorer_protocol::{FrameError, Status, SystemCommand};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    Closed,

    #[error("framing error: {0}")]
    Frame(FrameError),

    #[error("no response to {0}")]
    NoResponse(SystemCommand),

    #[error("response too short for {command}: {actual} bytes, need {expected}")]
    ResponseTooShort {
        command: SystemCommand,
        actual: usize,
        expected: usize,
    },

    #[error("unexpected status at {command}: {status}")]
    UnexpectedStatus {
        command: SystemCommand,
        status: Status,
    },

    #[error("payload of {0} bytes does not fit a 32-bit length")]
    PayloadTooLarge(usize),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<FrameError> for TransferError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(io) => Self::Io(io),
            other => Self::Frame(other),
        }
    }
}

impl TransferError {
    /// The link failed or delivered no reply; the brick may never have seen
    /// the request.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed | Self::NoResponse(_))
    }

    /// The brick answered, but not in a way the protocol allows.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Frame(_) | Self::ResponseTooShort { .. } | Self::UnexpectedStatus { .. }
        )
    }
}
