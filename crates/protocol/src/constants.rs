use std::fmt;

/// Maximum reply payload requested per listing round-trip.
pub const MAX_REPLY_SIZE: u16 = 500;

/// Default number of file bytes moved per transfer round-trip.
///
/// Chosen to stay well under the link's reply-size ceiling.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Largest chunk that still fits one 1024-byte USB HID report with headers.
pub const MAX_CHUNK_SIZE: usize = 1000;

/// Largest frame body (everything after the length prefix) the brick accepts.
pub const MAX_FRAME_BODY: usize = 1022;

/// Prefix placed in front of every brick-side path.
pub const DEFAULT_ROOT_PREFIX: &str = "/.";

/// Directory the brick's own menu shows as the project folder.
pub const DEFAULT_START_DIRECTORY: &str = "/home/root/lms2012/prjs/";

/// Most global variable bytes a direct command may reserve.
pub const MAX_GLOBAL_RESERVE: u16 = 1023;

/// Most local variable bytes a direct command may reserve.
pub const MAX_LOCAL_RESERVE: u8 = 63;

// ---------------------------------------------------------------------------
// Message types (third byte of every frame)
// ---------------------------------------------------------------------------

/// Frame type: system command, reply requested.
pub const SYSTEM_COMMAND_REPLY: u8 = 0x01;
/// Frame type: system command reply, success.
pub const SYSTEM_REPLY: u8 = 0x03;
/// Frame type: system command reply, error.
pub const SYSTEM_REPLY_ERROR: u8 = 0x05;
/// Frame type: direct command, no reply.
pub const DIRECT_COMMAND_NO_REPLY: u8 = 0x80;

// ---------------------------------------------------------------------------
// System commands
// ---------------------------------------------------------------------------

/// File-system opcodes carried on the system-command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SystemCommand {
    /// Start writing a file to the brick.
    BeginDownload = 0x92,
    /// Send the next chunk of a file being written to the brick.
    ContinueDownload = 0x93,
    /// Start reading a file from the brick.
    BeginUpload = 0x94,
    /// Fetch the next chunk of a file being read from the brick.
    ContinueUpload = 0x95,
    /// Start listing a directory.
    ListFiles = 0x99,
    /// Fetch the next chunk of a directory listing.
    ContinueListFiles = 0x9A,
    /// Create a directory.
    CreateDir = 0x9B,
    /// Delete a file or an empty directory.
    DeleteFile = 0x9C,
}

impl SystemCommand {
    /// Opcode byte sent on the wire.
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Looks up the command for an opcode byte.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        let cmd = match opcode {
            0x92 => Self::BeginDownload,
            0x93 => Self::ContinueDownload,
            0x94 => Self::BeginUpload,
            0x95 => Self::ContinueUpload,
            0x99 => Self::ListFiles,
            0x9A => Self::ContinueListFiles,
            0x9B => Self::CreateDir,
            0x9C => Self::DeleteFile,
            _ => return None,
        };
        Some(cmd)
    }

    /// Upper-case protocol name, used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::BeginDownload => "BEGIN_DOWNLOAD",
            Self::ContinueDownload => "CONTINUE_DOWNLOAD",
            Self::BeginUpload => "BEGIN_UPLOAD",
            Self::ContinueUpload => "CONTINUE_UPLOAD",
            Self::ListFiles => "LIST_FILES",
            Self::ContinueListFiles => "CONTINUE_LIST_FILES",
            Self::CreateDir => "CREATE_DIR",
            Self::DeleteFile => "DELETE_FILE",
        }
    }
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Reply status
// ---------------------------------------------------------------------------

/// First byte of every system reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    UnknownHandle,
    HandleNotReady,
    CorruptFile,
    NoHandlesAvailable,
    NoPermission,
    IllegalPath,
    FileExists,
    EndOfFile,
    SizeError,
    UnknownError,
    IllegalFilename,
    IllegalConnection,
    /// A code this client does not know about.
    Other(u8),
}

impl Status {
    /// Decodes a status byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Success,
            0x01 => Self::UnknownHandle,
            0x02 => Self::HandleNotReady,
            0x03 => Self::CorruptFile,
            0x04 => Self::NoHandlesAvailable,
            0x05 => Self::NoPermission,
            0x06 => Self::IllegalPath,
            0x07 => Self::FileExists,
            0x08 => Self::EndOfFile,
            0x09 => Self::SizeError,
            0x0A => Self::UnknownError,
            0x0B => Self::IllegalFilename,
            0x0C => Self::IllegalConnection,
            other => Self::Other(other),
        }
    }

    /// Encodes the status back into its wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::UnknownHandle => 0x01,
            Self::HandleNotReady => 0x02,
            Self::CorruptFile => 0x03,
            Self::NoHandlesAvailable => 0x04,
            Self::NoPermission => 0x05,
            Self::IllegalPath => 0x06,
            Self::FileExists => 0x07,
            Self::EndOfFile => 0x08,
            Self::SizeError => 0x09,
            Self::UnknownError => 0x0A,
            Self::IllegalFilename => 0x0B,
            Self::IllegalConnection => 0x0C,
            Self::Other(b) => b,
        }
    }

    /// Only `Success` and `EndOfFile` are non-error statuses.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Success | Self::EndOfFile)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(b) => write!(f, "0x{b:02X}"),
            known => write!(f, "{known:?} (0x{:02X})", known.to_byte()),
        }
    }
}

// ---------------------------------------------------------------------------
// VM opcodes used by this client
// ---------------------------------------------------------------------------

/// `opFILE`: file-handling instruction.
pub const OP_FILE: u8 = 0xC0;
/// `opPROGRAM_START`: start a loaded image in a program slot.
pub const OP_PROGRAM_START: u8 = 0x03;
/// `opFILE` sub-command that loads an image into a slot.
pub const FILE_LOAD_IMAGE: i32 = 0x08;
/// Program slot reserved for user programs.
pub const USER_SLOT: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_every_byte() {
        for b in 0..=u8::MAX {
            assert_eq!(Status::from_byte(b).to_byte(), b);
        }
    }

    #[test]
    fn only_success_and_eof_are_ok() {
        assert!(Status::Success.is_ok());
        assert!(Status::EndOfFile.is_ok());
        assert!(!Status::UnknownHandle.is_ok());
        assert!(!Status::Other(0x42).is_ok());
    }

    #[test]
    fn system_command_opcodes() {
        assert_eq!(SystemCommand::ListFiles.opcode(), 0x99);
        assert_eq!(SystemCommand::ContinueListFiles.opcode(), 0x9A);
        assert_eq!(SystemCommand::BeginDownload.opcode(), 0x92);
        assert_eq!(SystemCommand::DeleteFile.to_string(), "DELETE_FILE");
        assert_eq!(
            SystemCommand::from_opcode(0x95),
            Some(SystemCommand::ContinueUpload)
        );
        assert_eq!(SystemCommand::from_opcode(0x98), None);
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::EndOfFile.to_string(), "EndOfFile (0x08)");
        assert_eq!(Status::Other(0x42).to_string(), "0x42");
    }
}
