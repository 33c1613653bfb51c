//! Starting a program image that is already on the brick.

use ev3explorer_protocol::{LOAD_AND_START_GLOBALS, load_and_start};
use ev3explorer_transfer::{BrickConnection, TransferError};
use tracing::info;

/// Loads the `.rbf` image at the absolute brick `path` into the user slot and
/// starts it. The brick sends no reply.
pub fn run_program<C>(conn: &mut C, path: &str) -> Result<(), TransferError>
where
    C: BrickConnection + ?Sized,
{
    let code = load_and_start(path);
    conn.direct_command(code.as_bytes(), LOAD_AND_START_GLOBALS, 0)?;
    info!(path, "program started");
    Ok(())
}
