//! Event dispatch and execution entry points.

use crate::error::VmError;
use crate::frame::CallFrame;
use crate::machine::Vm;
use crate::value::Value;

impl Vm {
    /// Run the handler bound to `(component_id, event_type)`.
    ///
    /// Bindings are scanned in file order and the first match wins;
    /// duplicates are legal, so the order the compiler wrote is significant.
    /// With no matching binding this is a no-op returning `Ok(false)` and
    /// the VM state is untouched. On a match the VM is reset (stack, frames,
    /// halted flag, last error; globals are kept), the bound function is
    /// entered through the call protocol, and execution runs synchronously
    /// to completion. The run's error, if any, is returned as well as being
    /// left in the last-error slot.
    pub fn dispatch_event(&mut self, component_id: u32, event_type: u16) -> Result<bool, VmError> {
        let binding = self
            .module()
            .event_bindings()
            .iter()
            .find(|b| b.component_id == component_id && b.event_type == event_type);
        let Some(binding) = binding else {
            log::debug!("no binding for component {component_id} event {event_type}");
            return Ok(false);
        };
        let function_index = binding.function_index;
        log::debug!(
            "dispatch component {component_id} event {event_type} -> function {function_index}"
        );
        self.execute_function(function_index)?;
        Ok(true)
    }

    /// Run the header's entry function, validating the index now rather
    /// than at load time (a UI-only module may carry none).
    pub fn run_entry(&mut self) -> Result<(), VmError> {
        let entry = self.module().entry_function();
        let index = u16::try_from(entry).map_err(|_| VmError::InvalidFunctionIndex { index: entry })?;
        self.execute_function(index)
    }

    /// Run an arbitrary function by table index, resetting first like a
    /// dispatch.
    pub fn call_function(&mut self, index: u16) -> Result<(), VmError> {
        self.execute_function(index)
    }

    fn execute_function(&mut self, index: u16) -> Result<(), VmError> {
        self.reset();
        if let Err(error) = self.enter_function(index) {
            self.last_error = Some(error.clone());
            self.halted = true;
            return Err(error);
        }
        self.run();
        match self.last_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The call protocol: validate the function index, check the call-depth
    /// bound, pop `param_count` arguments into the leading local slots in
    /// reverse push order (first-pushed argument becomes local 0), and jump
    /// to the function's code.
    pub(crate) fn enter_function(&mut self, index: u16) -> Result<(), VmError> {
        let func = self
            .module()
            .function(index)
            .cloned()
            .ok_or(VmError::InvalidFunctionIndex {
                index: index as u32,
            })?;
        self.check_call_depth()?;

        let param_count = func.param_count as usize;
        // Parameters occupy the leading local slots even when the table
        // understates local_count.
        let local_count = (func.local_count as usize).max(param_count);
        let mut frame = CallFrame::new(index, self.ip, local_count);
        for slot in (0..param_count).rev() {
            frame.locals[slot] = self.pop()?;
        }
        frame.stack_base = self.stack.len();
        self.frames.push(frame);
        self.ip = func.code_offset as usize;
        Ok(())
    }

    /// RET/RET_VAL: pop the frame, truncate the stack to its base, push the
    /// return value if any, resume the caller. Returning from the outermost
    /// frame ends the dispatch.
    pub(crate) fn leave_function(&mut self, value: Option<Value>) -> Result<(), VmError> {
        let Some(frame) = self.frames.pop() else {
            // RET outside any frame: nothing to unwind, just stop.
            self.halted = true;
            return Ok(());
        };
        self.stack.truncate(frame.stack_base);
        if let Some(value) = value {
            self.stack.push(value);
        }
        self.ip = frame.return_address;
        if self.frames.is_empty() {
            self.halted = true;
        }
        Ok(())
    }
}
