//! Weft Virtual Machine
//!
//! A stack machine that executes compiled Weft UI modules: it reacts to
//! host-delivered UI events by running the module's event-handler bytecode,
//! mutating reactive state in its global store and driving a pluggable
//! [`Renderer`] for UI-affecting instructions.
//!
//! # Architecture
//!
//! - [`Value`]: the tagged runtime value and its coercion/equality rules.
//! - [`Vm`]: operand stack, call frames, global store, and the
//!   decode/execute loop, bounded by construction-time limits.
//! - Event dispatch: [`Vm::dispatch_event`] resolves `(component id, event
//!   type)` against the module's binding table and runs the bound function
//!   synchronously to completion.
//! - [`Renderer`]: the capability contract for UI mutation, supplied by the
//!   host. Without one, UI opcodes are no-ops.
//! - Natives: host functions registered by index, invocable from bytecode
//!   via CALL_NATIVE.
//!
//! Errors never unwind through a dispatch into the host: a failing handler
//! leaves its error in [`Vm::last_error`] and the VM stays usable for the
//! next dispatch. Global-store writes that happened before the error are
//! kept; there is no transactional rollback across a handler.
//!
//! # Example
//!
//! ```
//! use weft_module::{format, CodeBuilder, Module, ModuleBuilder, Opcode};
//! use weft_vm::{Value, Vm};
//!
//! // A handler that increments global slot 0.
//! let mut code = CodeBuilder::new();
//! code.op(Opcode::LoadGlobal).u16(0);
//! code.push_int(1);
//! code.op(Opcode::Add);
//! code.op(Opcode::StoreGlobal).u16(0);
//! code.op(Opcode::Halt);
//!
//! let mut builder = ModuleBuilder::new();
//! let increment = builder.add_function("increment", 0, 0, &code.finish());
//! builder.bind_event(1, format::event::CLICK, increment);
//!
//! let module = Module::load(&builder.build()).unwrap();
//! let mut vm = Vm::new(module);
//! vm.set_global(0, Value::Int(0));
//! vm.dispatch_event(1, format::event::CLICK).unwrap();
//! assert_eq!(vm.global(0), Some(&Value::Float(1.0)));
//! ```

mod dispatch;
mod error;
mod execute;
mod frame;
mod machine;
mod native;
mod renderer;
mod value;

pub use error::VmError;
pub use frame::CallFrame;
pub use machine::{Vm, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_STACK_SIZE};
pub use native::{NativeCtx, NativeFn};
pub use renderer::{ComponentRef, NoopRenderer, RecordingRenderer, Renderer, UiCall};
pub use value::{ArrayRef, Value};
