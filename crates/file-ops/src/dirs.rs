//! Directory creation and entry deletion.

use ev3explorer_protocol::{BinaryBuffer, SystemCommand};
use ev3explorer_transfer::{BrickConnection, TransferError, check_reply};
use tracing::debug;

fn path_command<C>(conn: &mut C, command: SystemCommand, path: &str) -> Result<(), TransferError>
where
    C: BrickConnection + ?Sized,
{
    let mut b = BinaryBuffer::new();
    b.append_zero_terminated(path);
    let reply = conn.system_command(command, b.as_bytes())?;
    let (status, _) = check_reply(command, reply, 1)?;
    debug!(%command, path, %status, "path command done");
    Ok(())
}

/// Creates the directory at the absolute brick `path`.
pub fn create_directory<C>(conn: &mut C, path: &str) -> Result<(), TransferError>
where
    C: BrickConnection + ?Sized,
{
    path_command(conn, SystemCommand::CreateDir, path)
}

/// Deletes a file or an empty directory at the absolute brick `path`.
pub fn delete_entry<C>(conn: &mut C, path: &str) -> Result<(), TransferError>
where
    C: BrickConnection + ?Sized,
{
    path_command(conn, SystemCommand::DeleteFile, path)
}
