//! Direct-command bytecode builder.
//!
//! # Parameter encoding
//!
//! ```text
//! LC0  value in -31..=31        [00vv_vvvv]           (6-bit two's complement)
//! LC1  value in -127..=127      [0x81][i8]
//! LC2  value in -32767..=32767  [0x82][i16 LE]
//! LC4  anything else            [0x83][i32 LE]
//! LCS  string literal           [0x84][bytes...][0x00]
//! GV0  global offset 0..=31     [011o_oooo]
//! GV1  global offset <= 255     [0xE1][u8]
//! GV2  global offset <= 65535   [0xE2][u16 LE]
//! GV4  any other offset         [0xE3][u32 LE]
//! ```
//!
//! The brick's interpreter reads the width from the first byte, so the
//! shortest form that holds the value must always be chosen.

use crate::constants::{FILE_LOAD_IMAGE, OP_FILE, OP_PROGRAM_START, USER_SLOT};

const LC1: u8 = 0x81;
const LC2: u8 = 0x82;
const LC4: u8 = 0x83;
const LCS: u8 = 0x84;
const GV0: u8 = 0x60;
const GV1: u8 = 0xE1;
const GV2: u8 = 0xE2;
const GV4: u8 = 0xE3;

/// Accumulates VM instructions for a direct command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteCodeBuffer {
    bytes: Vec<u8>,
}

impl ByteCodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an opcode byte.
    pub fn op(&mut self, opcode: u8) -> &mut Self {
        self.bytes.push(opcode);
        self
    }

    /// Appends a constant in the narrowest LC form.
    pub fn constant(&mut self, value: i32) -> &mut Self {
        if (-31..=31).contains(&value) {
            self.bytes.push((value & 0x3F) as u8);
        } else if (-127..=127).contains(&value) {
            self.bytes.push(LC1);
            self.bytes.push(value as i8 as u8);
        } else if (-32767..=32767).contains(&value) {
            self.bytes.push(LC2);
            self.bytes.extend_from_slice(&(value as i16).to_le_bytes());
        } else {
            self.bytes.push(LC4);
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self
    }

    /// Appends a zero-terminated string literal.
    pub fn string(&mut self, s: &str) -> &mut Self {
        self.bytes.push(LCS);
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self
    }

    /// Appends a reference to the global variable at byte `offset`.
    pub fn global_var(&mut self, offset: u32) -> &mut Self {
        if offset <= 31 {
            self.bytes.push(GV0 | offset as u8);
        } else if let Ok(b) = u8::try_from(offset) {
            self.bytes.push(GV1);
            self.bytes.push(b);
        } else if let Ok(w) = u16::try_from(offset) {
            self.bytes.push(GV2);
            self.bytes.extend_from_slice(&w.to_le_bytes());
        } else {
            self.bytes.push(GV4);
            self.bytes.extend_from_slice(&offset.to_le_bytes());
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Global variable bytes reserved by [`load_and_start`].
pub const LOAD_AND_START_GLOBALS: u16 = 10;

/// Builds the instructions that load the image at `path` into the user slot
/// and start it.
///
/// Globals 0 and 4 receive the loaded image's size and address from
/// `opFILE` and are passed straight to `opPROGRAM_START`.
pub fn load_and_start(path: &str) -> ByteCodeBuffer {
    let mut c = ByteCodeBuffer::new();
    c.op(OP_FILE)
        .constant(FILE_LOAD_IMAGE)
        .constant(USER_SLOT)
        .string(path)
        .global_var(0)
        .global_var(4);
    c.op(OP_PROGRAM_START)
        .constant(USER_SLOT)
        .global_var(0)
        .global_var(4)
        .constant(0);
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_const(v: i32) -> Vec<u8> {
        let mut c = ByteCodeBuffer::new();
        c.constant(v);
        c.into_bytes()
    }

    fn encode_gv(offset: u32) -> Vec<u8> {
        let mut c = ByteCodeBuffer::new();
        c.global_var(offset);
        c.into_bytes()
    }

    #[test]
    fn short_constants_are_one_byte() {
        assert_eq!(encode_const(0), vec![0x00]);
        assert_eq!(encode_const(1), vec![0x01]);
        assert_eq!(encode_const(8), vec![0x08]);
        assert_eq!(encode_const(31), vec![0x1F]);
        assert_eq!(encode_const(-1), vec![0x3F]);
        assert_eq!(encode_const(-31), vec![0x21]);
    }

    #[test]
    fn constant_width_boundaries() {
        assert_eq!(encode_const(32), vec![0x81, 0x20]);
        assert_eq!(encode_const(-32), vec![0x81, 0xE0]);
        assert_eq!(encode_const(127), vec![0x81, 0x7F]);
        assert_eq!(encode_const(-127), vec![0x81, 0x81]);
        assert_eq!(encode_const(128), vec![0x82, 0x80, 0x00]);
        assert_eq!(encode_const(-128), vec![0x82, 0x80, 0xFF]);
        assert_eq!(encode_const(32767), vec![0x82, 0xFF, 0x7F]);
        assert_eq!(encode_const(-32767), vec![0x82, 0x01, 0x80]);
        assert_eq!(encode_const(32768), vec![0x83, 0x00, 0x80, 0x00, 0x00]);
        assert_eq!(encode_const(-32768), vec![0x83, 0x00, 0x80, 0xFF, 0xFF]);
    }

    #[test]
    fn global_var_widths() {
        assert_eq!(encode_gv(0), vec![0x60]);
        assert_eq!(encode_gv(4), vec![0x64]);
        assert_eq!(encode_gv(31), vec![0x7F]);
        assert_eq!(encode_gv(32), vec![0xE1, 0x20]);
        assert_eq!(encode_gv(255), vec![0xE1, 0xFF]);
        assert_eq!(encode_gv(256), vec![0xE2, 0x00, 0x01]);
        assert_eq!(encode_gv(70_000), vec![0xE3, 0x70, 0x11, 0x01, 0x00]);
    }

    #[test]
    fn string_literal() {
        let mut c = ByteCodeBuffer::new();
        c.string("ab");
        assert_eq!(c.as_bytes(), &[0x84, b'a', b'b', 0x00]);
    }

    #[test]
    fn load_and_start_sequence() {
        let code = load_and_start("/./x.rbf").into_bytes();
        let mut expected = vec![0xC0, 0x08, 0x01, 0x84];
        expected.extend_from_slice(b"/./x.rbf");
        expected.extend_from_slice(&[0x00, 0x60, 0x64]);
        expected.extend_from_slice(&[0x03, 0x01, 0x60, 0x64, 0x00]);
        assert_eq!(code, expected);
    }
}
