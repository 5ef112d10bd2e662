//! Runtime error taxonomy.
//!
//! Every variant here aborts only the dispatch that raised it: the error is
//! captured in the VM's last-error slot rather than unwinding into the host,
//! and the VM is usable again after `reset()`.

use thiserror::Error;

/// Errors raised during bytecode execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("operand stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("call stack overflow (limit {limit})")]
    CallStackOverflow { limit: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("invalid function index {index}")]
    InvalidFunctionIndex { index: u32 },

    #[error("invalid local index {index}")]
    InvalidLocal { index: u8 },

    #[error("jump from offset {from} to out-of-range target {target}")]
    InvalidJump { from: usize, target: i64 },

    #[error("code ended unexpectedly at offset {offset}")]
    EndOfCode { offset: usize },

    #[error("native function error: {message}")]
    Native { message: String },
}

impl VmError {
    /// Error for a failing host-registered native function.
    pub fn native(message: impl Into<String>) -> Self {
        VmError::Native {
            message: message.into(),
        }
    }
}
