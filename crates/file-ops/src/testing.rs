//! Connection double that replays replies and records everything sent.

use std::collections::VecDeque;

use ev3explorer_protocol::SystemCommand;
use ev3explorer_transfer::{BrickConnection, TransferError};

use crate::Connector;

pub(crate) struct Recorder {
    replies: VecDeque<Option<Vec<u8>>>,
    pub(crate) system: Vec<(SystemCommand, Vec<u8>)>,
    pub(crate) direct: Vec<(Vec<u8>, u16, u8)>,
}

impl Recorder {
    pub(crate) fn replying(replies: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            replies: replies.into(),
            system: Vec::new(),
            direct: Vec::new(),
        }
    }
}

impl BrickConnection for Recorder {
    fn system_command(
        &mut self,
        command: SystemCommand,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, TransferError> {
        self.system.push((command, payload.to_vec()));
        self.replies.pop_front().ok_or(TransferError::Closed)
    }

    fn direct_command(
        &mut self,
        bytecode: &[u8],
        globals: u16,
        locals: u8,
    ) -> Result<(), TransferError> {
        self.direct.push((bytecode.to_vec(), globals, locals));
        Ok(())
    }
}

/// Hands out one [`Recorder`] per scripted connection, then refuses.
pub(crate) struct ScriptedConnector {
    scripts: VecDeque<Vec<Option<Vec<u8>>>>,
    opened: usize,
}

impl ScriptedConnector {
    pub(crate) fn new(scripts: Vec<Vec<Option<Vec<u8>>>>) -> Self {
        Self {
            scripts: scripts.into(),
            opened: 0,
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened
    }
}

impl Connector for ScriptedConnector {
    type Connection = Recorder;

    fn connect(&mut self) -> Result<Recorder, TransferError> {
        let script = self.scripts.pop_front().ok_or(TransferError::Closed)?;
        self.opened += 1;
        Ok(Recorder::replying(script))
    }
}
