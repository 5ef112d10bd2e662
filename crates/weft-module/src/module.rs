//! Module loading: raw bytes to validated tables.

use std::fmt::Write as _;

use crate::error::LoadError;
use crate::format::{
    EventBinding, FunctionEntry, Header, SectionDescriptor, SectionKind, MAGIC, VERSION_MAJOR,
};

/// A fully parsed, validated Weft module.
///
/// Immutable after load: the VM reads its tables and CODE payload but never
/// writes back. UI, DATA, and META payloads are opaque to this crate and are
/// handed to collaborators verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    header: Header,
    sections: Vec<SectionDescriptor>,
    strings: Vec<String>,
    functions: Vec<FunctionEntry>,
    events: Vec<EventBinding>,
    code: Vec<u8>,
    ui: Vec<u8>,
    data: Vec<u8>,
    meta: Vec<u8>,
    /// Sections with unrecognized type codes, kept for forward compatibility.
    extra: Vec<(u8, Vec<u8>)>,
}

/// Offset-tracked little-endian reader over the raw file bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], LoadError> {
        if self.bytes.len() - self.pos < len {
            return Err(LoadError::Truncated {
                what,
                offset: self.pos,
                needed: len,
                available: self.bytes.len() - self.pos,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, LoadError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, LoadError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, LoadError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl Module {
    /// Parse and validate a module from raw bytes.
    ///
    /// Validation is atomic: any truncation, out-of-range table reference, or
    /// unsupported major version fails the whole load. The header checksum is
    /// advisory and is not verified. Sections may appear in any order;
    /// cross-table references are checked after all sections are read. A
    /// duplicate section of one type replaces the earlier one (last wins).
    pub fn load(bytes: &[u8]) -> Result<Module, LoadError> {
        let mut r = Reader::new(bytes);

        let magic = r.u32("header")?;
        if magic != MAGIC {
            return Err(LoadError::BadMagic {
                found: magic,
                expected: MAGIC,
            });
        }
        let version_major = r.u8("header")?;
        let version_minor = r.u8("header")?;
        if version_major > VERSION_MAJOR {
            return Err(LoadError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
                supported: VERSION_MAJOR,
            });
        }
        let flags = r.u16("header")?;
        let section_count = r.u32("header")?;
        let entry_function = r.u32("header")?;
        let checksum = r.u32("header")?;
        r.take(12, "header")?; // reserved

        let header = Header {
            magic,
            version_major,
            version_minor,
            flags,
            section_count,
            entry_function,
            checksum,
        };

        let mut sections = Vec::with_capacity(section_count as usize);
        for _ in 0..section_count {
            let kind = r.u8("section descriptor")?;
            let sflags = r.u8("section descriptor")?;
            r.u16("section descriptor")?; // reserved
            let offset = r.u32("section descriptor")?;
            let size = r.u32("section descriptor")?;
            let uncompressed_size = r.u32("section descriptor")?;
            sections.push(SectionDescriptor {
                kind: SectionKind::new(kind),
                flags: sflags,
                offset,
                size,
                uncompressed_size,
            });
        }

        let mut strings = Vec::new();
        let mut functions = Vec::new();
        let mut events = Vec::new();
        let mut code = Vec::new();
        let mut ui = Vec::new();
        let mut data = Vec::new();
        let mut meta = Vec::new();
        let mut extra = Vec::new();

        for desc in &sections {
            if desc.offset as u64 + desc.size as u64 > bytes.len() as u64 {
                return Err(LoadError::SectionOutOfBounds {
                    kind: desc.kind.as_u8(),
                    offset: desc.offset,
                    size: desc.size,
                    file_len: bytes.len(),
                });
            }
            let start = desc.offset as usize;
            let payload = &bytes[start..start + desc.size as usize];
            log::debug!(
                "section {} ({} bytes at {})",
                desc.kind.name().unwrap_or("?"),
                desc.size,
                desc.offset
            );
            match desc.kind {
                SectionKind::STRINGS => strings = parse_strings(payload)?,
                SectionKind::FUNCS => functions = parse_functions(payload)?,
                SectionKind::EVENTS => events = parse_events(payload)?,
                SectionKind::CODE => code = payload.to_vec(),
                SectionKind::UI => ui = payload.to_vec(),
                SectionKind::DATA => data = payload.to_vec(),
                SectionKind::META => meta = payload.to_vec(),
                other => extra.push((other.as_u8(), payload.to_vec())),
            }
        }

        let module = Module {
            header,
            sections,
            strings,
            functions,
            events,
            code,
            ui,
            data,
            meta,
            extra,
        };
        module.validate()?;
        log::debug!(
            "loaded module v{}.{}: {} strings, {} functions, {} event bindings, {} code bytes",
            module.header.version_major,
            module.header.version_minor,
            module.strings.len(),
            module.functions.len(),
            module.events.len(),
            module.code.len()
        );
        Ok(module)
    }

    /// Cross-table validation, run after every section has been decoded so
    /// that section order in the file does not matter.
    fn validate(&self) -> Result<(), LoadError> {
        for (i, func) in self.functions.iter().enumerate() {
            if func.name_index as usize >= self.strings.len() {
                return Err(LoadError::NameIndexOutOfRange {
                    function: i,
                    index: func.name_index,
                    count: self.strings.len(),
                });
            }
            let end = func.code_offset as u64 + func.code_size as u64;
            if end > self.code.len() as u64 {
                return Err(LoadError::CodeRangeOutOfBounds {
                    function: i,
                    offset: func.code_offset,
                    end,
                    code_len: self.code.len(),
                });
            }
        }
        for (i, binding) in self.events.iter().enumerate() {
            if binding.function_index as usize >= self.functions.len() {
                return Err(LoadError::EventFunctionOutOfRange {
                    binding: i,
                    index: binding.function_index,
                    count: self.functions.len(),
                });
            }
        }
        Ok(())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn sections(&self) -> &[SectionDescriptor] {
        &self.sections
    }

    /// Look up a string table entry.
    pub fn string(&self, index: u16) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Look up a function table entry.
    pub fn function(&self, index: u16) -> Option<&FunctionEntry> {
        self.functions.get(index as usize)
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    /// Resolved name of a function, if the index is valid.
    pub fn function_name(&self, index: u16) -> Option<&str> {
        self.function(index).and_then(|f| self.string(f.name_index))
    }

    /// Event bindings in file order (dispatch order is significant).
    pub fn event_bindings(&self) -> &[EventBinding] {
        &self.events
    }

    /// The raw CODE payload.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The opaque UI payload.
    pub fn ui(&self) -> &[u8] {
        &self.ui
    }

    /// The opaque DATA payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The opaque META payload.
    pub fn meta(&self) -> &[u8] {
        &self.meta
    }

    /// Sections with unrecognized type codes, in file order.
    pub fn extra_sections(&self) -> &[(u8, Vec<u8>)] {
        &self.extra
    }

    /// Entry function index from the header (validated at run time).
    pub fn entry_function(&self) -> u32 {
        self.header.entry_function
    }

    /// Human-readable summary of the module for host tooling and debug logs.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let h = &self.header;
        let _ = writeln!(
            out,
            "module v{}.{} flags=0x{:04X} entry={} checksum=0x{:08X}",
            h.version_major, h.version_minor, h.flags, h.entry_function, h.checksum
        );
        for desc in &self.sections {
            let _ = writeln!(
                out,
                "  section {:<8} {:>6} bytes at {}",
                desc.kind.name().unwrap_or("?"),
                desc.size,
                desc.offset
            );
        }
        let _ = writeln!(
            out,
            "  {} strings, {} functions, {} event bindings",
            self.strings.len(),
            self.functions.len(),
            self.events.len()
        );
        for (i, func) in self.functions.iter().enumerate() {
            let name = self.string(func.name_index).unwrap_or("?");
            let _ = writeln!(
                out,
                "  fn {} {} params={} locals={} code={}..{}",
                i,
                name,
                func.param_count,
                func.local_count,
                func.code_offset,
                func.code_offset + func.code_size
            );
        }
        out
    }
}

fn parse_strings(payload: &[u8]) -> Result<Vec<String>, LoadError> {
    let mut r = Reader::new(payload);
    let count = r.u32("string table")?;
    let mut strings = Vec::with_capacity(count as usize);
    for i in 0..count {
        let len = r.u16("string entry")? as usize;
        let bytes = r.take(len, "string entry")?;
        let s = std::str::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8 { index: i })?;
        strings.push(s.to_owned());
    }
    Ok(strings)
}

fn parse_functions(payload: &[u8]) -> Result<Vec<FunctionEntry>, LoadError> {
    let mut r = Reader::new(payload);
    let count = r.u32("function table")?;
    let mut functions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        functions.push(FunctionEntry {
            name_index: r.u16("function entry")?,
            code_offset: r.u32("function entry")?,
            code_size: r.u32("function entry")?,
            param_count: r.u8("function entry")?,
            local_count: r.u8("function entry")?,
            flags: r.u16("function entry")?,
        });
    }
    Ok(functions)
}

fn parse_events(payload: &[u8]) -> Result<Vec<EventBinding>, LoadError> {
    let mut r = Reader::new(payload);
    let count = r.u32("event table")?;
    let mut events = Vec::with_capacity(count as usize);
    for _ in 0..count {
        events.push(EventBinding {
            component_id: r.u32("event binding")?,
            event_type: r.u16("event binding")?,
            function_index: r.u16("event binding")?,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::opcode::Opcode;

    fn sample_bytes() -> Vec<u8> {
        let mut b = ModuleBuilder::new();
        let idx = b.add_function("main", 0, 0, &[Opcode::Halt as u8]);
        b.bind_event(7, 0, idx);
        b.set_entry(idx as u32);
        b.build()
    }

    #[test]
    fn load_minimal_module() {
        let module = Module::load(&sample_bytes()).unwrap();
        assert_eq!(module.header().magic, MAGIC);
        assert_eq!(module.functions().len(), 1);
        assert_eq!(module.function_name(0), Some("main"));
        assert_eq!(module.event_bindings().len(), 1);
        assert_eq!(module.code(), &[Opcode::Halt as u8]);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = sample_bytes();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            Module::load(&bytes),
            Err(LoadError::BadMagic { .. })
        ));
    }

    #[test]
    fn future_major_version_rejected() {
        let mut bytes = sample_bytes();
        bytes[4] = VERSION_MAJOR + 1;
        assert!(matches!(
            Module::load(&bytes),
            Err(LoadError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn future_minor_version_accepted() {
        let mut bytes = sample_bytes();
        bytes[5] = 42;
        let module = Module::load(&bytes).unwrap();
        assert_eq!(module.header().version_minor, 42);
    }

    #[test]
    fn truncated_header_rejected() {
        let bytes = sample_bytes();
        assert!(matches!(
            Module::load(&bytes[..16]),
            Err(LoadError::Truncated { .. })
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = sample_bytes();
        let err = Module::load(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            LoadError::SectionOutOfBounds { .. } | LoadError::Truncated { .. }
        ));
    }

    #[test]
    fn corrupt_checksum_still_loads() {
        let mut bytes = sample_bytes();
        // checksum field lives at offset 16
        bytes[16] ^= 0xFF;
        assert!(Module::load(&bytes).is_ok());
    }

    #[test]
    fn describe_lists_functions() {
        let module = Module::load(&sample_bytes()).unwrap();
        let info = module.describe();
        assert!(info.contains("main"));
        assert!(info.contains("CODE"));
    }
}
