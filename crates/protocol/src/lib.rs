//! Wire encoding for EV3 brick communication.
//!
//! Covers the little-endian payload builder used by system commands, the
//! bytecode builder used by direct commands, and the packet framing that
//! every link (USB, Bluetooth, Wi-Fi) shares.

pub mod buffer;
pub mod bytecode;
pub mod constants;
pub mod wire;

// Re-export primary types for convenience.
pub use buffer::BinaryBuffer;
pub use bytecode::{ByteCodeBuffer, LOAD_AND_START_GLOBALS, load_and_start};
pub use constants::{Status, SystemCommand};
pub use wire::{FrameError, SystemRequest};
