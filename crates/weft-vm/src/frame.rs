//! Per-invocation call frames.

use crate::value::Value;

/// Execution context of one function invocation.
///
/// Created by CALL (or by the dispatcher for the root function) and
/// destroyed by the matching RET/RET_VAL; frames never outlive a dispatch.
#[derive(Clone, Debug)]
pub struct CallFrame {
    /// Index of the executing function in the module's function table.
    pub function_index: u16,
    /// Instruction pointer to resume in the caller.
    pub return_address: usize,
    /// Operand-stack height where this frame's arguments began. The stack
    /// never drops below this during the frame's execution except via its
    /// own RET/RET_VAL.
    pub stack_base: usize,
    /// Local variable slots; parameters occupy the leading slots.
    pub locals: Vec<Value>,
}

impl CallFrame {
    /// Create a frame with all locals initialized to Null.
    pub fn new(function_index: u16, return_address: usize, local_count: usize) -> Self {
        Self {
            function_index,
            return_address,
            stack_base: 0,
            locals: vec![Value::Null; local_count],
        }
    }

    pub fn local(&self, index: u8) -> Option<&Value> {
        self.locals.get(index as usize)
    }

    pub fn set_local(&mut self, index: u8, value: Value) -> bool {
        match self.locals.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
