//! Brick connection trait and a framed-stream implementation.
//!
//! `BrickConnection` is the only way protocol code talks to a brick. The
//! physical link (USB HID, Bluetooth, Wi-Fi) lives behind it, which keeps
//! every state machine testable against scripted fakes.

use std::io::{Read, Write};

use ev3explorer_protocol::wire;
use ev3explorer_protocol::SystemCommand;
use tracing::trace;

use crate::TransferError;

/// A request/reply link to one brick.
///
/// Methods take `&mut self`: a connection serves one request at a time and
/// must not be shared between concurrent operations.
pub trait BrickConnection {
    /// Sends a system command and waits for the reply.
    ///
    /// The returned bytes start at the reply's status byte. `Ok(None)` means
    /// the link delivered no reply at all.
    fn system_command(
        &mut self,
        command: SystemCommand,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, TransferError>;

    /// Sends VM bytecode for immediate execution, reserving `globals` and
    /// `locals` bytes of variable space. No reply is read.
    fn direct_command(
        &mut self,
        bytecode: &[u8],
        globals: u16,
        locals: u8,
    ) -> Result<(), TransferError>;

    /// Releases the link. Further commands fail.
    fn close(&mut self) -> Result<(), TransferError> {
        Ok(())
    }
}

impl<C: BrickConnection + ?Sized> BrickConnection for &mut C {
    fn system_command(
        &mut self,
        command: SystemCommand,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, TransferError> {
        (**self).system_command(command, payload)
    }

    fn direct_command(
        &mut self,
        bytecode: &[u8],
        globals: u16,
        locals: u8,
    ) -> Result<(), TransferError> {
        (**self).direct_command(bytecode, globals, locals)
    }

    fn close(&mut self) -> Result<(), TransferError> {
        (**self).close()
    }
}

impl<C: BrickConnection + ?Sized> BrickConnection for Box<C> {
    fn system_command(
        &mut self,
        command: SystemCommand,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, TransferError> {
        (**self).system_command(command, payload)
    }

    fn direct_command(
        &mut self,
        bytecode: &[u8],
        globals: u16,
        locals: u8,
    ) -> Result<(), TransferError> {
        (**self).direct_command(bytecode, globals, locals)
    }

    fn close(&mut self) -> Result<(), TransferError> {
        (**self).close()
    }
}

// ---------------------------------------------------------------------------
// StreamConnection
// ---------------------------------------------------------------------------

/// Speaks the framed EV3 protocol over any blocking byte stream.
///
/// Works with a Bluetooth RFCOMM device node, a serial port or a TCP socket
/// whose far end already forwards raw frames. Read timeouts are the
/// stream's business.
#[derive(Debug)]
pub struct StreamConnection<S> {
    stream: S,
    counter: u16,
    closed: bool,
}

impl<S: Read + Write> StreamConnection<S> {
    /// Wraps `stream`. The message counter starts at 1.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            counter: 0,
            closed: false,
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn next_counter(&mut self) -> u16 {
        self.counter = self.counter.wrapping_add(1);
        self.counter
    }

    fn ensure_open(&self) -> Result<(), TransferError> {
        if self.closed {
            Err(TransferError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<S: Read + Write> BrickConnection for StreamConnection<S> {
    fn system_command(
        &mut self,
        command: SystemCommand,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, TransferError> {
        self.ensure_open()?;
        let counter = self.next_counter();
        let frame = wire::encode_system_command(counter, command, payload)?;
        wire::write_frame(&mut self.stream, &frame)?;
        trace!(%command, counter, bytes = frame.len(), "sent system command");

        let Some(body) = wire::try_read_frame(&mut self.stream)? else {
            trace!(%command, counter, "link closed before reply");
            return Ok(None);
        };
        let reply = wire::decode_system_reply(&body, counter, command)?;
        trace!(%command, counter, bytes = reply.len(), "received system reply");
        Ok(Some(reply))
    }

    fn direct_command(
        &mut self,
        bytecode: &[u8],
        globals: u16,
        locals: u8,
    ) -> Result<(), TransferError> {
        self.ensure_open()?;
        let counter = self.next_counter();
        let frame = wire::encode_direct_command(counter, bytecode, globals, locals)?;
        wire::write_frame(&mut self.stream, &frame)?;
        trace!(counter, bytes = frame.len(), "sent direct command");
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        if !self.closed {
            self.closed = true;
            self.stream.flush()?;
        }
        Ok(())
    }
}
