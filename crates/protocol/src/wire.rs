//! Packet framing shared by every EV3 link.
//!
//! # Wire format
//!
//! ```text
//! FRAME:           [2 bytes LE: body_len][body_len bytes: body]
//!
//! SYSTEM COMMAND:  [2 bytes LE: counter][0x01][opcode][payload...]
//! SYSTEM REPLY:    [2 bytes LE: counter][0x03 | 0x05][opcode][status][data...]
//! DIRECT COMMAND:  [2 bytes LE: counter][0x80]
//!                  [globals & 0xFF][(locals << 2) | (globals >> 8)][bytecode...]
//! ```
//!
//! USB HID, Bluetooth SPP and Wi-Fi all carry these frames unchanged; only
//! the byte pipe underneath differs.

use std::io::{self, Read, Write};

use crate::constants::{
    DIRECT_COMMAND_NO_REPLY, MAX_FRAME_BODY, MAX_GLOBAL_RESERVE, MAX_LOCAL_RESERVE,
    SYSTEM_COMMAND_REPLY, SYSTEM_REPLY, SYSTEM_REPLY_ERROR, Status, SystemCommand,
};

/// Errors produced while framing or unframing packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame body of {0} bytes exceeds {MAX_FRAME_BODY}")]
    TooLarge(usize),

    #[error("frame body of {0} bytes is too short")]
    TooShort(usize),

    #[error("reply counter {actual} does not match request {expected}")]
    CounterMismatch { expected: u16, actual: u16 },

    #[error("unexpected message type 0x{0:02X}")]
    UnexpectedType(u8),

    #[error("reply echoes opcode 0x{actual:02X}, expected 0x{expected:02X}")]
    OpcodeMismatch { expected: u8, actual: u8 },

    #[error("variable reserve out of range: {globals} globals, {locals} locals")]
    ReserveOutOfRange { globals: u16, locals: u8 },
}

/// A system command as decoded from a frame body (brick side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRequest {
    pub counter: u16,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Prepends the length prefix to `body`.
fn frame(body: Vec<u8>) -> Result<Vec<u8>, FrameError> {
    if body.len() > MAX_FRAME_BODY {
        return Err(FrameError::TooLarge(body.len()));
    }
    let mut out = Vec::with_capacity(body.len() + 2);
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend(body);
    Ok(out)
}

/// Builds a complete system-command frame that requests a reply.
pub fn encode_system_command(
    counter: u16,
    command: SystemCommand,
    payload: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let mut body = Vec::with_capacity(payload.len() + 4);
    body.extend_from_slice(&counter.to_le_bytes());
    body.push(SYSTEM_COMMAND_REPLY);
    body.push(command.opcode());
    body.extend_from_slice(payload);
    frame(body)
}

/// Builds a complete direct-command frame that asks for no reply.
pub fn encode_direct_command(
    counter: u16,
    bytecode: &[u8],
    globals: u16,
    locals: u8,
) -> Result<Vec<u8>, FrameError> {
    if globals > MAX_GLOBAL_RESERVE || locals > MAX_LOCAL_RESERVE {
        return Err(FrameError::ReserveOutOfRange { globals, locals });
    }
    let mut body = Vec::with_capacity(bytecode.len() + 5);
    body.extend_from_slice(&counter.to_le_bytes());
    body.push(DIRECT_COMMAND_NO_REPLY);
    body.push((globals & 0xFF) as u8);
    body.push((locals << 2) | (globals >> 8) as u8);
    body.extend_from_slice(bytecode);
    frame(body)
}

/// Builds a system-reply frame (used by brick simulators and tests).
pub fn encode_system_reply(
    counter: u16,
    opcode: u8,
    status: Status,
    data: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let mut body = Vec::with_capacity(data.len() + 5);
    body.extend_from_slice(&counter.to_le_bytes());
    body.push(if status.is_ok() {
        SYSTEM_REPLY
    } else {
        SYSTEM_REPLY_ERROR
    });
    body.push(opcode);
    body.push(status.to_byte());
    body.extend_from_slice(data);
    frame(body)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Writes an already framed packet and flushes.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame)?;
    writer.flush()
}

/// Reads one frame and returns its body (length prefix stripped).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    try_read_frame(reader)?.ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof).into())
}

/// Like [`read_frame`], but returns `Ok(None)` when the stream ends before
/// the first byte of a frame. End of stream anywhere inside a frame is still
/// an I/O error.
pub fn try_read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let mut len_buf = [0u8; 2];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let len = u16::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_BODY {
        return Err(FrameError::TooLarge(len));
    }
    if len < 3 {
        return Err(FrameError::TooShort(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Validates a system-reply body against its request.
///
/// Returns the reply starting at the status byte. Error replies are passed
/// through as well: the status byte tells the caller what went wrong.
pub fn decode_system_reply(
    body: &[u8],
    expected_counter: u16,
    command: SystemCommand,
) -> Result<Vec<u8>, FrameError> {
    if body.len() < 4 {
        return Err(FrameError::TooShort(body.len()));
    }
    let counter = u16::from_le_bytes([body[0], body[1]]);
    if counter != expected_counter {
        return Err(FrameError::CounterMismatch {
            expected: expected_counter,
            actual: counter,
        });
    }
    let msg_type = body[2];
    if msg_type != SYSTEM_REPLY && msg_type != SYSTEM_REPLY_ERROR {
        return Err(FrameError::UnexpectedType(msg_type));
    }
    if body[3] != command.opcode() {
        return Err(FrameError::OpcodeMismatch {
            expected: command.opcode(),
            actual: body[3],
        });
    }
    Ok(body[4..].to_vec())
}

/// Decodes a system-command body (brick side).
pub fn decode_system_command(body: &[u8]) -> Result<SystemRequest, FrameError> {
    if body.len() < 4 {
        return Err(FrameError::TooShort(body.len()));
    }
    if body[2] != SYSTEM_COMMAND_REPLY {
        return Err(FrameError::UnexpectedType(body[2]));
    }
    Ok(SystemRequest {
        counter: u16::from_le_bytes([body[0], body[1]]),
        opcode: body[3],
        payload: body[4..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_command_layout() {
        let f = encode_system_command(0x0102, SystemCommand::CreateDir, b"/x\0").unwrap();
        assert_eq!(f, vec![7, 0, 0x02, 0x01, 0x01, 0x9B, b'/', b'x', 0]);
    }

    #[test]
    fn direct_command_header_packs_reserves() {
        let f = encode_direct_command(1, &[0x01], 0x3FF, 63).unwrap();
        // body: counter(2) type(1) header(2) code(1)
        assert_eq!(f, vec![6, 0, 1, 0, 0x80, 0xFF, 0xFF, 0x01]);

        let f = encode_direct_command(1, &[], 10, 0).unwrap();
        assert_eq!(&f[5..7], &[10, 0]);
    }

    #[test]
    fn direct_command_rejects_oversized_reserve() {
        assert!(matches!(
            encode_direct_command(1, &[], 1024, 0),
            Err(FrameError::ReserveOutOfRange { .. })
        ));
        assert!(encode_direct_command(1, &[], 0, 64).is_err());
    }

    #[test]
    fn reply_roundtrip_through_stream() {
        let frame = encode_system_reply(9, 0x99, Status::EndOfFile, b"\x05\0\0\0\x01a/\n").unwrap();

        let mut cursor = io::Cursor::new(frame);
        let body = read_frame(&mut cursor).unwrap();
        let reply = decode_system_reply(&body, 9, SystemCommand::ListFiles).unwrap();
        assert_eq!(reply[0], 0x08);
        assert_eq!(&reply[1..], b"\x05\0\0\0\x01a/\n");
    }

    #[test]
    fn error_reply_is_passed_through() {
        let frame = encode_system_reply(3, 0x9C, Status::IllegalPath, &[]).unwrap();
        assert_eq!(frame[4], SYSTEM_REPLY_ERROR);
        let body = read_frame(&mut io::Cursor::new(frame)).unwrap();
        let reply = decode_system_reply(&body, 3, SystemCommand::DeleteFile).unwrap();
        assert_eq!(reply, vec![0x06]);
    }

    #[test]
    fn counter_mismatch_rejected() {
        let frame = encode_system_reply(4, 0x9B, Status::Success, &[]).unwrap();
        let body = read_frame(&mut io::Cursor::new(frame)).unwrap();
        let err = decode_system_reply(&body, 5, SystemCommand::CreateDir).unwrap_err();
        assert!(matches!(
            err,
            FrameError::CounterMismatch {
                expected: 5,
                actual: 4
            }
        ));
    }

    #[test]
    fn opcode_mismatch_rejected() {
        let frame = encode_system_reply(4, 0x9B, Status::Success, &[]).unwrap();
        let body = read_frame(&mut io::Cursor::new(frame)).unwrap();
        assert!(matches!(
            decode_system_reply(&body, 4, SystemCommand::DeleteFile),
            Err(FrameError::OpcodeMismatch { .. })
        ));
    }

    #[test]
    fn oversized_frame_rejected() {
        let header = 2000u16.to_le_bytes();
        let result = read_frame(&mut io::Cursor::new(&header[..]));
        assert!(matches!(result, Err(FrameError::TooLarge(2000))));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let bytes = [10u8, 0, 1, 2];
        let result = read_frame(&mut io::Cursor::new(&bytes[..]));
        assert!(matches!(result, Err(FrameError::Io(_))));
    }

    #[test]
    fn clean_end_of_stream_is_no_frame() {
        assert!(try_read_frame(&mut io::empty()).unwrap().is_none());
        assert!(matches!(read_frame(&mut io::empty()), Err(FrameError::Io(_))));
    }

    #[test]
    fn end_of_stream_inside_frame_is_io_error() {
        for bytes in [&[5u8][..], &[5, 0][..], &[5, 0, 1, 0][..]] {
            let result = try_read_frame(&mut io::Cursor::new(bytes));
            assert!(
                matches!(result, Err(FrameError::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof),
                "{bytes:?}"
            );
        }
    }

    #[test]
    fn encode_rejects_oversized_body() {
        let payload = vec![0u8; MAX_FRAME_BODY];
        assert!(matches!(
            encode_system_command(0, SystemCommand::ContinueDownload, &payload),
            Err(FrameError::TooLarge(_))
        ));
    }

    #[test]
    fn brick_side_decode() {
        let f = encode_system_command(77, SystemCommand::ListFiles, b"\xF4\x01/\0").unwrap();
        let body = read_frame(&mut io::Cursor::new(f)).unwrap();
        let req = decode_system_command(&body).unwrap();
        assert_eq!(req.counter, 77);
        assert_eq!(req.opcode, 0x99);
        assert_eq!(req.payload, b"\xF4\x01/\0".to_vec());
    }
}
