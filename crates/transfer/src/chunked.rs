//! Handle-based file transfer in both directions.
//!
//! Host to brick uses BEGIN_DOWNLOAD, which already carries the first bytes,
//! then CONTINUE_DOWNLOAD per chunk. Brick to host uses BEGIN_UPLOAD, which
//! only announces the size, then CONTINUE_UPLOAD per chunk.

use ev3explorer_protocol::{BinaryBuffer, SystemCommand};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::TransferError;
use crate::connection::BrickConnection;
use crate::exchange::{Exchange, Request, check_reply, drive};
use crate::types::{TransferOptions, TransferSession};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fails with [`TransferError::ChecksumMismatch`] unless `data` hashes to
/// `expected`.
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<(), TransferError> {
    let actual = checksum_bytes(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(TransferError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Most bytes reserved up front for an incoming file. Larger files grow as
/// chunks arrive.
const MAX_PREALLOCATION: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Host -> brick
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteState {
    Begin,
    Sending(TransferSession),
    Done,
    Failed,
}

/// Writes one file to the brick.
#[derive(Debug)]
pub struct WriteSession<'a> {
    path: String,
    data: &'a [u8],
    chunk_size: usize,
    initial: usize,
    state: WriteState,
}

impl<'a> WriteSession<'a> {
    /// Prepares a write of `data` to the absolute brick `path`.
    ///
    /// Payloads whose length does not fit in 32 bits are rejected here, before
    /// anything is sent.
    pub fn new(
        path: impl Into<String>,
        data: &'a [u8],
        options: &TransferOptions,
    ) -> Result<Self, TransferError> {
        if u32::try_from(data.len()).is_err() {
            return Err(TransferError::PayloadTooLarge(data.len()));
        }
        let path = path.into();
        let chunk_size = options.chunk_size();
        let initial = data.len().min(chunk_size.saturating_sub(path.len()));
        Ok(Self {
            path,
            data,
            chunk_size,
            initial,
            state: WriteState::Begin,
        })
    }

    /// Bytes carried by the BEGIN_DOWNLOAD request itself.
    pub fn initial_len(&self) -> usize {
        self.initial
    }

    pub fn is_done(&self) -> bool {
        self.state == WriteState::Done
    }

    fn total(&self) -> u32 {
        // Checked in `new`.
        self.data.len() as u32
    }

    fn fail(&mut self, err: TransferError) -> TransferError {
        self.state = WriteState::Failed;
        err
    }
}

impl Exchange for WriteSession<'_> {
    /// Number of bytes written.
    type Output = u32;

    fn next_request(&self) -> Option<Request> {
        let mut b = BinaryBuffer::new();
        let command = match &self.state {
            WriteState::Begin => {
                b.append_u32(self.total())
                    .append_zero_terminated(&self.path)
                    .append_bytes(&self.data[..self.initial]);
                SystemCommand::BeginDownload
            }
            WriteState::Sending(session) => {
                let offset = session.bytes_transferred() as usize;
                let end = offset + session.next_chunk_len();
                b.append_u8(session.handle())
                    .append_bytes(&self.data[offset..end]);
                SystemCommand::ContinueDownload
            }
            WriteState::Done | WriteState::Failed => return None,
        };
        Some(Request {
            command,
            payload: b.into_bytes(),
        })
    }

    fn accept(
        &mut self,
        command: SystemCommand,
        reply: Option<Vec<u8>>,
    ) -> Result<(), TransferError> {
        let (_, reply) = check_reply(command, reply, 2).map_err(|e| self.fail(e))?;
        let (mut session, sent) = match std::mem::replace(&mut self.state, WriteState::Failed) {
            WriteState::Begin => {
                let handle = reply[1];
                debug!(
                    path = %self.path,
                    handle,
                    total = self.total(),
                    initial = self.initial,
                    "download handle acquired"
                );
                let session = TransferSession::new(handle, Some(self.total()), self.chunk_size);
                (session, self.initial)
            }
            WriteState::Sending(session) => {
                let sent = session.next_chunk_len();
                (session, sent)
            }
            WriteState::Done | WriteState::Failed => {
                return Err(TransferError::InvalidArgument(
                    "download already finished".into(),
                ));
            }
        };
        session.advance(sent).map_err(|e| self.fail(e))?;
        self.state = if session.is_complete() {
            debug!(path = %self.path, bytes = session.bytes_transferred(), "download complete");
            WriteState::Done
        } else {
            WriteState::Sending(session)
        };
        Ok(())
    }

    fn finish(self) -> u32 {
        if self.is_done() { self.total() } else { 0 }
    }
}

/// Writes `data` to `path` on the brick.
pub fn write_file<C>(
    conn: &mut C,
    path: &str,
    data: &[u8],
    options: &TransferOptions,
) -> Result<u32, TransferError>
where
    C: BrickConnection + ?Sized,
{
    let session = WriteSession::new(path, data, options)?;
    drive(conn, session)
}

// ---------------------------------------------------------------------------
// Brick -> host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadState {
    Begin,
    Receiving(TransferSession),
    Done,
    Failed,
}

/// Reads one file from the brick.
#[derive(Debug)]
pub struct ReadSession {
    path: String,
    chunk_size: usize,
    data: Vec<u8>,
    state: ReadState,
}

impl ReadSession {
    pub fn new(path: impl Into<String>, options: &TransferOptions) -> Self {
        Self {
            path: path.into(),
            chunk_size: options.chunk_size(),
            data: Vec::new(),
            state: ReadState::Begin,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ReadState::Done
    }

    fn fail(&mut self, err: TransferError) -> TransferError {
        self.state = ReadState::Failed;
        self.data = Vec::new();
        err
    }

    fn accept_begin(&mut self, reply: &[u8]) -> ReadState {
        let total = u32::from_le_bytes([reply[1], reply[2], reply[3], reply[4]]);
        let handle = reply[5];
        debug!(path = %self.path, handle, total, "upload handle acquired");
        self.data = Vec::with_capacity((total as usize).min(MAX_PREALLOCATION));
        let session = TransferSession::new(handle, Some(total), self.chunk_size);
        if session.is_complete() {
            ReadState::Done
        } else {
            ReadState::Receiving(session)
        }
    }
}

impl Exchange for ReadSession {
    type Output = Vec<u8>;

    fn next_request(&self) -> Option<Request> {
        let mut b = BinaryBuffer::new();
        let command = match &self.state {
            ReadState::Begin => {
                b.append_u16(0).append_zero_terminated(&self.path);
                SystemCommand::BeginUpload
            }
            ReadState::Receiving(session) => {
                // Chunk sizes never exceed MAX_CHUNK_SIZE, well inside u16.
                b.append_u8(session.handle())
                    .append_u16(session.next_chunk_len() as u16);
                SystemCommand::ContinueUpload
            }
            ReadState::Done | ReadState::Failed => return None,
        };
        Some(Request {
            command,
            payload: b.into_bytes(),
        })
    }

    fn accept(
        &mut self,
        command: SystemCommand,
        reply: Option<Vec<u8>>,
    ) -> Result<(), TransferError> {
        let next = match std::mem::replace(&mut self.state, ReadState::Failed) {
            ReadState::Begin => {
                let (_, reply) = check_reply(command, reply, 6).map_err(|e| self.fail(e))?;
                self.accept_begin(&reply)
            }
            ReadState::Receiving(mut session) => {
                let n = session.next_chunk_len();
                let (_, reply) = check_reply(command, reply, 2 + n).map_err(|e| self.fail(e))?;
                self.data.extend_from_slice(&reply[2..2 + n]);
                session.advance(n).map_err(|e| self.fail(e))?;
                if session.is_complete() {
                    debug!(path = %self.path, bytes = session.bytes_transferred(), "upload complete");
                    ReadState::Done
                } else {
                    ReadState::Receiving(session)
                }
            }
            ReadState::Done | ReadState::Failed => {
                return Err(self.fail(TransferError::InvalidArgument(
                    "upload already finished".into(),
                )));
            }
        };
        self.state = next;
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        if self.is_done() { self.data } else { Vec::new() }
    }
}

/// Reads the whole file at `path` from the brick.
pub fn read_file<C>(
    conn: &mut C,
    path: &str,
    options: &TransferOptions,
) -> Result<Vec<u8>, TransferError>
where
    C: BrickConnection + ?Sized,
{
    drive(conn, ReadSession::new(path, options))
}
