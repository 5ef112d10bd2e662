//! Programmatic module assembly and instruction emission.
//!
//! `ModuleBuilder` collects the string/function/event tables and section
//! payloads, then serializes the whole file with computed offsets and
//! checksum. `CodeBuilder` emits little-endian instruction bytes with
//! label/fixup support for relative jumps.

use std::collections::HashMap;

use crate::checksum::crc32;
use crate::error::BuildError;
use crate::format::{
    EventBinding, FunctionEntry, SectionKind, HEADER_SIZE, MAGIC, SECTION_DESCRIPTOR_SIZE,
    VERSION_MAJOR, VERSION_MINOR,
};
use crate::opcode::Opcode;

/// In-memory module under construction.
#[derive(Clone, Debug, Default)]
pub struct ModuleBuilder {
    version_minor: u8,
    flags: u16,
    entry_function: u32,
    strings: Vec<String>,
    string_map: HashMap<String, u16>,
    functions: Vec<FunctionEntry>,
    events: Vec<EventBinding>,
    code: Vec<u8>,
    ui: Vec<u8>,
    data: Vec<u8>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            version_minor: VERSION_MINOR,
            ..Self::default()
        }
    }

    /// Intern a string, returning its table index. Adding the same string
    /// twice returns the original index.
    pub fn add_string(&mut self, s: &str) -> u16 {
        if let Some(&index) = self.string_map.get(s) {
            return index;
        }
        assert!(self.strings.len() < u16::MAX as usize, "string table full");
        let index = self.strings.len() as u16;
        self.strings.push(s.to_owned());
        self.string_map.insert(s.to_owned(), index);
        index
    }

    /// Append a function, adding its body to the CODE payload. Returns the
    /// function table index.
    pub fn add_function(
        &mut self,
        name: &str,
        param_count: u8,
        local_count: u8,
        code: &[u8],
    ) -> u16 {
        assert!(
            self.functions.len() < u16::MAX as usize,
            "function table full"
        );
        let name_index = self.add_string(name);
        let code_offset = self.code.len() as u32;
        self.code.extend_from_slice(code);
        let index = self.functions.len() as u16;
        self.functions.push(FunctionEntry {
            name_index,
            code_offset,
            code_size: code.len() as u32,
            param_count,
            local_count,
            flags: 0,
        });
        index
    }

    /// Append an event binding. Binding order is preserved in the file and
    /// is significant for dispatch.
    pub fn bind_event(&mut self, component_id: u32, event_type: u16, function_index: u16) {
        self.events.push(EventBinding {
            component_id,
            event_type,
            function_index,
        });
    }

    pub fn set_entry(&mut self, function_index: u32) {
        self.entry_function = function_index;
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
    }

    pub fn set_version(&mut self, minor: u8) {
        self.version_minor = minor;
    }

    /// Attach an opaque UI payload.
    pub fn ui_payload(&mut self, bytes: &[u8]) {
        self.ui = bytes.to_vec();
    }

    /// Attach an opaque DATA payload.
    pub fn data_payload(&mut self, bytes: &[u8]) {
        self.data = bytes.to_vec();
    }

    /// Serialize the module: header, descriptor table, then the non-empty
    /// section payloads in type order. The header checksum is the CRC-32 of
    /// all payload bytes in descriptor order.
    pub fn build(&self) -> Vec<u8> {
        let mut payloads: Vec<(SectionKind, Vec<u8>)> = Vec::new();
        if !self.ui.is_empty() {
            payloads.push((SectionKind::UI, self.ui.clone()));
        }
        if !self.code.is_empty() {
            payloads.push((SectionKind::CODE, self.code.clone()));
        }
        if !self.data.is_empty() {
            payloads.push((SectionKind::DATA, self.data.clone()));
        }
        if !self.strings.is_empty() {
            payloads.push((SectionKind::STRINGS, self.encode_strings()));
        }
        if !self.functions.is_empty() {
            payloads.push((SectionKind::FUNCS, self.encode_functions()));
        }
        if !self.events.is_empty() {
            payloads.push((SectionKind::EVENTS, self.encode_events()));
        }

        let section_count = payloads.len();
        let payload_start = HEADER_SIZE + section_count * SECTION_DESCRIPTOR_SIZE;
        let total: usize = payload_start + payloads.iter().map(|(_, p)| p.len()).sum::<usize>();
        let mut out = Vec::with_capacity(total);

        // Header; checksum patched in below once the payloads are written.
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.push(VERSION_MAJOR);
        out.push(self.version_minor);
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&(section_count as u32).to_le_bytes());
        out.extend_from_slice(&self.entry_function.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);

        let mut offset = payload_start;
        for (kind, payload) in &payloads {
            out.push(kind.as_u8());
            out.push(0); // section flags
            out.extend_from_slice(&0u16.to_le_bytes()); // reserved
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            offset += payload.len();
        }
        for (_, payload) in &payloads {
            out.extend_from_slice(payload);
        }

        let checksum = crc32(&out[payload_start..]);
        out[16..20].copy_from_slice(&checksum.to_le_bytes());
        out
    }

    fn encode_strings(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for s in &self.strings {
            out.extend_from_slice(&(s.len() as u16).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        out
    }

    fn encode_functions(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.functions.len() as u32).to_le_bytes());
        for f in &self.functions {
            out.extend_from_slice(&f.name_index.to_le_bytes());
            out.extend_from_slice(&f.code_offset.to_le_bytes());
            out.extend_from_slice(&f.code_size.to_le_bytes());
            out.push(f.param_count);
            out.push(f.local_count);
            out.extend_from_slice(&f.flags.to_le_bytes());
        }
        out
    }

    fn encode_events(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.events.len() as u32).to_le_bytes());
        for e in &self.events {
            out.extend_from_slice(&e.component_id.to_le_bytes());
            out.extend_from_slice(&e.event_type.to_le_bytes());
            out.extend_from_slice(&e.function_index.to_le_bytes());
        }
        out
    }
}

/// A known code position that jumps can target.
#[derive(Copy, Clone, Debug)]
pub struct Label(usize);

/// A reserved jump-offset field awaiting its target.
#[derive(Debug)]
pub struct Fixup(usize);

/// Little-endian instruction emitter.
#[derive(Clone, Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a bare opcode byte.
    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.code.push(v as u8);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.code.push(v);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.code.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Push an integer constant using the narrowest encoding that fits.
    pub fn push_int(&mut self, v: i64) -> &mut Self {
        if let Ok(v) = i8::try_from(v) {
            self.op(Opcode::PushInt8).i8(v)
        } else if let Ok(v) = i16::try_from(v) {
            self.op(Opcode::PushInt16).i16(v)
        } else if let Ok(v) = i32::try_from(v) {
            self.op(Opcode::PushInt32).i32(v)
        } else {
            self.op(Opcode::PushInt64).i64(v)
        }
    }

    /// Push a float constant (PUSH_DOUBLE).
    pub fn push_float(&mut self, v: f64) -> &mut Self {
        self.op(Opcode::PushDouble).f64(v)
    }

    /// Push a string table reference.
    pub fn push_str(&mut self, index: u16) -> &mut Self {
        self.op(Opcode::PushStr).u16(index)
    }

    /// Current position, usable as a backward-jump target.
    pub fn label(&self) -> Label {
        Label(self.code.len())
    }

    /// Jump to a known label.
    pub fn jmp(&mut self, target: Label) -> Result<(), BuildError> {
        self.jump_to(Opcode::Jmp, target)
    }

    /// Conditional jump (pops one value, jumps when truthy) to a known label.
    pub fn jmp_if(&mut self, target: Label) -> Result<(), BuildError> {
        self.jump_to(Opcode::JmpIf, target)
    }

    /// Conditional jump (pops one value, jumps when falsy) to a known label.
    pub fn jmp_if_not(&mut self, target: Label) -> Result<(), BuildError> {
        self.jump_to(Opcode::JmpIfNot, target)
    }

    /// Emit a forward jump with a reserved offset; patch it with [`patch`]
    /// once the target position is reached.
    ///
    /// [`patch`]: CodeBuilder::patch
    pub fn jmp_forward(&mut self) -> Fixup {
        self.forward(Opcode::Jmp)
    }

    pub fn jmp_if_forward(&mut self) -> Fixup {
        self.forward(Opcode::JmpIf)
    }

    pub fn jmp_if_not_forward(&mut self) -> Fixup {
        self.forward(Opcode::JmpIfNot)
    }

    /// Resolve a forward jump to the current position.
    pub fn patch(&mut self, fixup: Fixup) -> Result<(), BuildError> {
        let distance = self.code.len() as i64 - (fixup.0 as i64 + 2);
        let offset = i16::try_from(distance).map_err(|_| BuildError::JumpOutOfRange { distance })?;
        self.code[fixup.0..fixup.0 + 2].copy_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Consume the builder and return the instruction bytes.
    pub fn finish(self) -> Vec<u8> {
        self.code
    }

    fn jump_to(&mut self, op: Opcode, target: Label) -> Result<(), BuildError> {
        self.op(op);
        // Offsets are measured from the byte after the 2-byte field.
        let distance = target.0 as i64 - (self.code.len() as i64 + 2);
        let offset = i16::try_from(distance).map_err(|_| BuildError::JumpOutOfRange { distance })?;
        self.i16(offset);
        Ok(())
    }

    fn forward(&mut self, op: Opcode) -> Fixup {
        self.op(op);
        let position = self.code.len();
        self.i16(0);
        Fixup(position)
    }
}
