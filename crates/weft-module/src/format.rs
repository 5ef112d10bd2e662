//! Binary layout constants and table record types.
//!
//! All multi-byte fields in the file format are little-endian.

/// Magic number at the start of every module file ("KRBY" read as bytes).
pub const MAGIC: u32 = 0x5942_524B;

/// Highest major format version this crate understands.
pub const VERSION_MAJOR: u8 = 1;

/// Minor format version written by the builder.
pub const VERSION_MINOR: u8 = 0;

/// Size of the fixed file header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Size of one section descriptor in bytes.
pub const SECTION_DESCRIPTOR_SIZE: usize = 16;

/// Module header flags.
pub mod flags {
    /// Module contains debug symbols.
    pub const DEBUG: u16 = 0x0001;
    /// Section payloads are compressed.
    pub const COMPRESSED: u16 = 0x0002;
    /// Module carries a digital signature.
    pub const SIGNED: u16 = 0x0004;
}

/// Section type identifier.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SectionKind(u8);

impl SectionKind {
    /// Component tree (opaque to the VM).
    pub const UI: SectionKind = SectionKind(0x01);
    /// Event-handler bytecode.
    pub const CODE: SectionKind = SectionKind(0x02);
    /// Constants and initial values (opaque to the VM).
    pub const DATA: SectionKind = SectionKind(0x03);
    /// Manifest and debug info (opaque to the VM).
    pub const META: SectionKind = SectionKind(0x04);
    /// Interned string table.
    pub const STRINGS: SectionKind = SectionKind(0x05);
    /// Function table.
    pub const FUNCS: SectionKind = SectionKind(0x06);
    /// Event bindings.
    pub const EVENTS: SectionKind = SectionKind(0x07);

    pub fn new(kind: u8) -> Self {
        Self(kind)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Name of a well-known section type, or None for unrecognized types.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::UI => Some("UI"),
            Self::CODE => Some("CODE"),
            Self::DATA => Some("DATA"),
            Self::META => Some("META"),
            Self::STRINGS => Some("STRINGS"),
            Self::FUNCS => Some("FUNCS"),
            Self::EVENTS => Some("EVENTS"),
            _ => None,
        }
    }
}

/// Well-known event type codes for event bindings.
pub mod event {
    pub const CLICK: u16 = 0;
    pub const CHANGE: u16 = 1;
    pub const SUBMIT: u16 = 2;
    pub const FOCUS: u16 = 3;
    pub const BLUR: u16 = 4;
}

/// Property identifier for SET_PROP/GET_PROP.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PropertyId(u16);

impl PropertyId {
    pub const TEXT: PropertyId = PropertyId(0x0001);
    pub const VISIBLE: PropertyId = PropertyId(0x0002);
    pub const ENABLED: PropertyId = PropertyId(0x0003);
    pub const WIDTH: PropertyId = PropertyId(0x0010);
    pub const HEIGHT: PropertyId = PropertyId(0x0011);
    pub const X: PropertyId = PropertyId(0x0012);
    pub const Y: PropertyId = PropertyId(0x0013);
    pub const BG_COLOR: PropertyId = PropertyId(0x0020);
    pub const FG_COLOR: PropertyId = PropertyId(0x0021);
    pub const BORDER_COLOR: PropertyId = PropertyId(0x0022);
    pub const BORDER_WIDTH: PropertyId = PropertyId(0x0023);
    pub const BORDER_RADIUS: PropertyId = PropertyId(0x0024);
    pub const FONT_SIZE: PropertyId = PropertyId(0x0030);
    pub const FONT_WEIGHT: PropertyId = PropertyId(0x0031);
    pub const OPACITY: PropertyId = PropertyId(0x0040);
    pub const PADDING: PropertyId = PropertyId(0x0050);
    pub const MARGIN: PropertyId = PropertyId(0x0051);
    pub const GAP: PropertyId = PropertyId(0x0052);

    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// Fixed 32-byte file header.
///
/// The 12 reserved trailing bytes are not represented; the loader requires
/// them to be present but ignores their content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: u16,
    pub section_count: u32,
    /// Index of the entry function (validated when run, not at load).
    pub entry_function: u32,
    /// CRC-32 of all section payloads in descriptor order. Advisory; the
    /// loader does not verify it.
    pub checksum: u32,
}

/// One 16-byte section descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionDescriptor {
    pub kind: SectionKind,
    pub flags: u8,
    /// Payload offset from the start of the file.
    pub offset: u32,
    /// Payload size in bytes.
    pub size: u32,
    /// Original payload size when compressed; equal to `size` otherwise.
    pub uncompressed_size: u32,
}

/// One function table entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Index of the function name in the string table.
    pub name_index: u16,
    /// Offset of the function body within the CODE payload.
    pub code_offset: u32,
    /// Size of the function body in bytes.
    pub code_size: u32,
    pub param_count: u8,
    pub local_count: u8,
    pub flags: u16,
}

/// One event binding: (component, event type) -> function.
///
/// Bindings are kept in file order; dispatch takes the first match, so
/// duplicates are legal and order is significant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBinding {
    pub component_id: u32,
    pub event_type: u16,
    pub function_index: u16,
}
