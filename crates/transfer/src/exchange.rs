//! Request/reply loop shared by every multi-step operation.

use ev3explorer_protocol::{Status, SystemCommand};
use tracing::trace;

use crate::TransferError;
use crate::connection::BrickConnection;

/// One system command waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: SystemCommand,
    pub payload: Vec<u8>,
}

/// A protocol state machine advanced one reply at a time.
///
/// The machine never touches the connection itself; [`drive`] feeds it.
pub trait Exchange {
    /// Result handed back once the machine reaches its final state.
    type Output;

    /// The next request to send, or `None` once the exchange is finished.
    fn next_request(&self) -> Option<Request>;

    /// Consumes the reply to the request last returned by `next_request`.
    ///
    /// An error moves the machine to its failed state and discards
    /// everything accumulated so far.
    fn accept(
        &mut self,
        command: SystemCommand,
        reply: Option<Vec<u8>>,
    ) -> Result<(), TransferError>;

    /// Produces the final result.
    fn finish(self) -> Self::Output;
}

/// Runs `exchange` to completion over `conn`.
pub fn drive<C, E>(conn: &mut C, mut exchange: E) -> Result<E::Output, TransferError>
where
    C: BrickConnection + ?Sized,
    E: Exchange,
{
    let mut round_trips = 0usize;
    while let Some(req) = exchange.next_request() {
        round_trips += 1;
        trace!(command = %req.command, round_trips, payload = req.payload.len(), "exchange step");
        let reply = conn.system_command(req.command, &req.payload)?;
        exchange.accept(req.command, reply)?;
    }
    Ok(exchange.finish())
}

/// Applies the checks every system reply goes through.
///
/// The reply must be present, carry a status of `Success` or `EndOfFile`,
/// and be at least `min_len` bytes long (status byte included).
pub fn check_reply(
    command: SystemCommand,
    reply: Option<Vec<u8>>,
    min_len: usize,
) -> Result<(Status, Vec<u8>), TransferError> {
    let reply = reply.ok_or(TransferError::NoResponse(command))?;
    let Some(&first) = reply.first() else {
        return Err(TransferError::ResponseTooShort {
            command,
            actual: 0,
            expected: min_len.max(1),
        });
    };
    let status = Status::from_byte(first);
    if !status.is_ok() {
        return Err(TransferError::UnexpectedStatus { command, status });
    }
    if reply.len() < min_len {
        return Err(TransferError::ResponseTooShort {
            command,
            actual: reply.len(),
            expected: min_len,
        });
    }
    Ok((status, reply))
}
