//! Explorer error types.

/// Errors produced by brick file operations and the explorer session.
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("transfer error: {0}")]
    Transfer(#[from] ev3explorer_transfer::TransferError),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("no entry named {0:?} in the current directory")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a compileable source file: {0}")]
    NotCompileable(String),

    #[error("compilation failed with {} error(s)", .0.len())]
    Compile(Vec<String>),

    #[error("the current directory has not been listed")]
    NotListed,

    #[error("directory is not empty")]
    DirectoryNotEmpty,

    #[error("already at the top directory")]
    AtTop,
}

impl ExplorerError {
    /// True when the error came from talking to the brick rather than from
    /// checks made before any request was sent.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer(_))
    }
}
