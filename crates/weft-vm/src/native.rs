//! Host-registered native functions, invocable via CALL_NATIVE.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::VmError;
use crate::value::Value;

/// Callback signature for a native function.
pub type NativeFn = Rc<dyn Fn(&mut NativeCtx<'_>) -> Result<(), VmError>>;

/// A registered native function.
#[derive(Clone)]
pub(crate) struct NativeEntry {
    pub(crate) name: String,
    pub(crate) func: NativeFn,
}

/// Execution context handed to a native function.
///
/// Natives follow the same stack discipline as opcodes: arguments are popped
/// off the operand stack and a result is pushed back, and the bounded-stack
/// and frame-floor rules apply.
pub struct NativeCtx<'a> {
    stack: &'a mut Vec<Value>,
    globals: &'a mut HashMap<u16, Value>,
    /// Stack height of the current frame's base; pops stop here.
    floor: usize,
    max_stack_size: usize,
}

impl<'a> NativeCtx<'a> {
    pub(crate) fn new(
        stack: &'a mut Vec<Value>,
        globals: &'a mut HashMap<u16, Value>,
        floor: usize,
        max_stack_size: usize,
    ) -> Self {
        Self {
            stack,
            globals,
            floor,
            max_stack_size,
        }
    }

    /// Push a value onto the operand stack.
    pub fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.stack.len() >= self.max_stack_size {
            return Err(VmError::StackOverflow {
                limit: self.max_stack_size,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value off the operand stack.
    pub fn pop(&mut self) -> Result<Value, VmError> {
        if self.stack.len() <= self.floor {
            return Err(VmError::StackUnderflow);
        }
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Top of the operand stack without removing it.
    pub fn peek(&self) -> Result<&Value, VmError> {
        if self.stack.len() <= self.floor {
            return Err(VmError::StackUnderflow);
        }
        self.stack.last().ok_or(VmError::StackUnderflow)
    }

    /// Read a global store slot.
    pub fn global(&self, index: u16) -> Option<&Value> {
        self.globals.get(&index)
    }

    /// Write a global store slot.
    pub fn set_global(&mut self, index: u16, value: Value) {
        self.globals.insert(index, value);
    }
}
