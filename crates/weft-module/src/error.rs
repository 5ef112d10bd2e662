//! Error types for module loading and building.

use thiserror::Error;

/// Errors that can occur when loading a module from bytes.
///
/// A load either produces a fully validated [`Module`](crate::Module) or one
/// of these; no partial module is ever returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("bad magic 0x{found:08X} (expected 0x{expected:08X})")]
    BadMagic { found: u32, expected: u32 },

    #[error("unsupported format version {major}.{minor} (supported major: {supported})")]
    UnsupportedVersion { major: u8, minor: u8, supported: u8 },

    #[error("truncated {what}: needed {needed} bytes at offset {offset}, had {available}")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("section {kind:#04x} at offset {offset} with size {size} exceeds file length {file_len}")]
    SectionOutOfBounds {
        kind: u8,
        offset: u32,
        size: u32,
        file_len: usize,
    },

    #[error("string table entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: u32 },

    #[error("function {function}: name string index {index} out of range (string count {count})")]
    NameIndexOutOfRange {
        function: usize,
        index: u16,
        count: usize,
    },

    #[error(
        "function {function}: code range {offset}..{end} exceeds CODE section length {code_len}"
    )]
    CodeRangeOutOfBounds {
        function: usize,
        offset: u32,
        end: u64,
        code_len: usize,
    },

    #[error("event binding {binding}: function index {index} out of range (function count {count})")]
    EventFunctionOutOfRange {
        binding: usize,
        index: u16,
        count: usize,
    },
}

/// Errors that can occur when assembling a module or emitting code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("jump offset {distance} does not fit in a signed 16-bit field")]
    JumpOutOfRange { distance: i64 },
}
