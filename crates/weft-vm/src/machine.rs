//! Virtual machine state and stack discipline.

use std::collections::HashMap;
use std::rc::Rc;

use weft_module::Module;

use crate::error::VmError;
use crate::frame::CallFrame;
use crate::native::{NativeCtx, NativeEntry, NativeFn};
use crate::renderer::Renderer;
use crate::value::Value;

/// Default operand stack bound.
pub const DEFAULT_MAX_STACK_SIZE: usize = 256;

/// Default call-frame stack bound.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// A virtual machine executing one loaded module.
///
/// The VM owns its module, operand stack, call frames, and global store;
/// multiple independent instances can coexist. Execution is single-threaded
/// and synchronous: one dispatch runs to completion (halt or error) before
/// the next can start. The operand stack and call frames never outlive a
/// dispatch; the global store persists for the VM's lifetime and is the
/// framework's reactive state.
pub struct Vm {
    module: Module,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) globals: HashMap<u16, Value>,
    /// Instruction pointer: index into the module's CODE payload.
    pub(crate) ip: usize,
    pub(crate) halted: bool,
    pub(crate) last_error: Option<VmError>,
    pub(crate) max_stack_size: usize,
    max_call_depth: usize,
    pub(crate) natives: HashMap<u16, NativeEntry>,
    pub(crate) renderer: Option<Box<dyn Renderer>>,
}

impl Vm {
    /// Create a VM with default stack bounds.
    pub fn new(module: Module) -> Self {
        Self::with_limits(module, DEFAULT_MAX_STACK_SIZE, DEFAULT_MAX_CALL_DEPTH)
    }

    /// Create a VM with explicit operand-stack and call-depth bounds.
    pub fn with_limits(module: Module, max_stack_size: usize, max_call_depth: usize) -> Self {
        Self {
            module,
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
            ip: 0,
            halted: false,
            last_error: None,
            max_stack_size,
            max_call_depth,
            natives: HashMap::new(),
            renderer: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Attach the renderer the UI opcodes drive. Without one they are no-ops.
    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    /// Register a native function under a CALL_NATIVE index. Re-registering
    /// an index replaces the previous function.
    pub fn register_native<F>(&mut self, index: u16, name: &str, func: F)
    where
        F: Fn(&mut NativeCtx<'_>) -> Result<(), VmError> + 'static,
    {
        self.natives.insert(
            index,
            NativeEntry {
                name: name.to_owned(),
                func: Rc::new(func),
            },
        );
    }

    /// Push a value, enforcing the configured stack bound.
    pub(crate) fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.stack.len() >= self.max_stack_size {
            return Err(VmError::StackOverflow {
                limit: self.max_stack_size,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value. The current frame's stack base is a floor: a frame
    /// cannot pop values that belong to its caller.
    pub(crate) fn pop(&mut self) -> Result<Value, VmError> {
        if self.stack.len() <= self.frame_floor() {
            return Err(VmError::StackUnderflow);
        }
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Top of the stack without removing it.
    pub(crate) fn peek(&self) -> Result<&Value, VmError> {
        if self.stack.len() <= self.frame_floor() {
            return Err(VmError::StackUnderflow);
        }
        self.stack.last().ok_or(VmError::StackUnderflow)
    }

    pub(crate) fn frame_floor(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.stack_base)
    }

    pub(crate) fn check_call_depth(&self) -> Result<(), VmError> {
        if self.frames.len() >= self.max_call_depth {
            return Err(VmError::CallStackOverflow {
                limit: self.max_call_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn native_fn(&self, index: u16) -> Option<(String, NativeFn)> {
        self.natives
            .get(&index)
            .map(|entry| (entry.name.clone(), Rc::clone(&entry.func)))
    }

    /// The operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    /// The error that aborted the last dispatch, if any. Cleared by reset.
    pub fn last_error(&self) -> Option<&VmError> {
        self.last_error.as_ref()
    }

    /// Read a global store slot. Unset slots read as None (bytecode sees
    /// them as Null).
    pub fn global(&self, index: u16) -> Option<&Value> {
        self.globals.get(&index)
    }

    /// Write a global store slot. Hosts use this to seed initial state.
    pub fn set_global(&mut self, index: u16, value: Value) {
        self.globals.insert(index, value);
    }

    /// Restore a frame-less, stack-empty, non-halted, error-free state.
    /// The global store is deliberately kept: it carries the application's
    /// reactive state across dispatches.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.ip = 0;
        self.halted = false;
        self.last_error = None;
    }
}
