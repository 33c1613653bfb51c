//! Scripted connection that replays canned replies.

use std::collections::VecDeque;

use ev3explorer_protocol::SystemCommand;

use crate::TransferError;
use crate::connection::BrickConnection;

/// Replays one scripted reply per system command and records every request.
pub(crate) struct ScriptedConnection {
    replies: VecDeque<Option<Vec<u8>>>,
    pub(crate) requests: Vec<(SystemCommand, Vec<u8>)>,
}

impl ScriptedConnection {
    pub(crate) fn new(replies: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            replies: replies.into(),
            requests: Vec::new(),
        }
    }

    /// Requests sent with the given command.
    pub(crate) fn sent(&self, command: SystemCommand) -> Vec<&[u8]> {
        self.requests
            .iter()
            .filter(|(c, _)| *c == command)
            .map(|(_, p)| p.as_slice())
            .collect()
    }
}

impl BrickConnection for ScriptedConnection {
    fn system_command(
        &mut self,
        command: SystemCommand,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, TransferError> {
        self.requests.push((command, payload.to_vec()));
        self.replies.pop_front().ok_or_else(|| {
            TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "reply script exhausted",
            ))
        })
    }

    fn direct_command(
        &mut self,
        _bytecode: &[u8],
        _globals: u16,
        _locals: u8,
    ) -> Result<(), TransferError> {
        Ok(())
    }
}

/// Builds a reply: status byte followed by `rest`.
pub(crate) fn reply(status: u8, rest: &[u8]) -> Option<Vec<u8>> {
    let mut r = vec![status];
    r.extend_from_slice(rest);
    Some(r)
}
