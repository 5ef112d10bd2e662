//! Weft binary module format.
//!
//! A Weft module is a compact binary program produced by the UI compiler:
//! a fixed header, a section table, and typed section payloads (component
//! tree, bytecode, string/function/event tables). This crate provides:
//!
//! - the format constants and table record types ([`format`], [`Opcode`])
//! - the loader, [`Module::load`], which validates raw bytes into an
//!   immutable [`Module`]
//! - the writer side, [`ModuleBuilder`] and [`CodeBuilder`], used by
//!   compilers and tests to author modules programmatically
//! - a [`disassemble`]r for debugging emitted code
//!
//! Execution lives in the `weft-vm` crate; UI/DATA payloads are opaque here
//! and are consumed by renderer collaborators.
//!
//! # Example
//!
//! ```
//! use weft_module::{CodeBuilder, Module, ModuleBuilder, Opcode};
//!
//! let mut code = CodeBuilder::new();
//! code.push_int(1).op(Opcode::Halt);
//!
//! let mut builder = ModuleBuilder::new();
//! let func = builder.add_function("noop", 0, 0, &code.finish());
//! builder.bind_event(1, weft_module::format::event::CLICK, func);
//!
//! let module = Module::load(&builder.build()).unwrap();
//! assert_eq!(module.function_name(func), Some("noop"));
//! ```

mod builder;
mod checksum;
mod disasm;
mod error;
pub mod format;
mod module;
mod opcode;

pub use builder::{CodeBuilder, Fixup, Label, ModuleBuilder};
pub use checksum::crc32;
pub use disasm::{disassemble, disassemble_function};
pub use error::{BuildError, LoadError};
pub use format::{EventBinding, FunctionEntry, Header, PropertyId, SectionDescriptor, SectionKind};
pub use module::Module;
pub use opcode::Opcode;
