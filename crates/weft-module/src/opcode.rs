//! Bytecode opcodes and their operand encodings.
//!
//! Every instruction is one opcode byte followed by a fixed-width operand
//! sequence. The operand width table here is the single source of truth
//! shared by the VM decoder and the disassembler.

/// A bytecode opcode.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum Opcode {
    // Stack operations
    Nop = 0x00,
    PushNull = 0x01,
    PushTrue = 0x02,
    PushFalse = 0x03,
    /// Push 8-bit signed int (i8 operand).
    PushInt8 = 0x04,
    /// Push 16-bit signed int (i16 operand).
    PushInt16 = 0x05,
    /// Push 32-bit signed int (i32 operand).
    PushInt32 = 0x06,
    /// Push 64-bit signed int (i64 operand).
    PushInt64 = 0x07,
    /// Push 32-bit float (f32 operand).
    PushFloat = 0x08,
    /// Push 64-bit float (f64 operand).
    PushDouble = 0x09,
    /// Push string from the string table (u16 index operand).
    PushStr = 0x0A,
    Pop = 0x0B,
    Dup = 0x0C,
    Swap = 0x0D,

    // Variables
    /// Load local variable (u8 index operand).
    LoadLocal = 0x10,
    /// Store to local variable (u8 index operand).
    StoreLocal = 0x11,
    /// Load global/state variable (u16 index operand).
    LoadGlobal = 0x12,
    /// Store to global/state variable (u16 index operand).
    StoreGlobal = 0x13,

    // Arithmetic
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Mod = 0x24,
    Neg = 0x25,
    Inc = 0x26,
    Dec = 0x27,

    // Comparison
    Eq = 0x30,
    Ne = 0x31,
    Lt = 0x32,
    Le = 0x33,
    Gt = 0x34,
    Ge = 0x35,

    // Logic (no short-circuit: both operands are already on the stack)
    And = 0x40,
    Or = 0x41,
    Not = 0x42,

    // Bitwise
    BitAnd = 0x48,
    BitOr = 0x49,
    BitXor = 0x4A,
    BitNot = 0x4B,
    Shl = 0x4C,
    Shr = 0x4D,

    // Control flow (i16 relative offset, measured from the byte after the
    // offset field)
    Jmp = 0x50,
    JmpIf = 0x51,
    JmpIfNot = 0x52,
    /// Call a function (u16 function index operand).
    Call = 0x53,
    /// Call a host-registered native function (u16 index operand).
    CallNative = 0x54,
    Ret = 0x55,
    RetVal = 0x56,

    // UI operations
    /// Resolve a component by id (u32 operand); pushes a handle or null.
    GetComponent = 0x60,
    /// Set a component property (u16 property id operand).
    SetProperty = 0x61,
    /// Get a component property (u16 property id operand).
    GetProperty = 0x62,
    SetText = 0x63,
    SetVisible = 0x64,
    AddChild = 0x65,
    RemoveChild = 0x66,
    Redraw = 0x67,

    // String operations
    StrConcat = 0x70,
    StrLen = 0x71,
    StrSubstr = 0x72,
    StrFormat = 0x73,

    // Array operations
    /// Create a new array of nulls (u8 size operand).
    ArrNew = 0x80,
    ArrGet = 0x81,
    ArrSet = 0x82,
    ArrPush = 0x83,
    ArrPop = 0x84,
    ArrLen = 0x85,

    // Debug
    DebugPrint = 0xF0,
    DebugBreak = 0xF1,

    Halt = 0xFF,
}

impl Opcode {
    /// Decode an opcode byte, or None for an undefined value.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match byte {
            0x00 => Nop,
            0x01 => PushNull,
            0x02 => PushTrue,
            0x03 => PushFalse,
            0x04 => PushInt8,
            0x05 => PushInt16,
            0x06 => PushInt32,
            0x07 => PushInt64,
            0x08 => PushFloat,
            0x09 => PushDouble,
            0x0A => PushStr,
            0x0B => Pop,
            0x0C => Dup,
            0x0D => Swap,
            0x10 => LoadLocal,
            0x11 => StoreLocal,
            0x12 => LoadGlobal,
            0x13 => StoreGlobal,
            0x20 => Add,
            0x21 => Sub,
            0x22 => Mul,
            0x23 => Div,
            0x24 => Mod,
            0x25 => Neg,
            0x26 => Inc,
            0x27 => Dec,
            0x30 => Eq,
            0x31 => Ne,
            0x32 => Lt,
            0x33 => Le,
            0x34 => Gt,
            0x35 => Ge,
            0x40 => And,
            0x41 => Or,
            0x42 => Not,
            0x48 => BitAnd,
            0x49 => BitOr,
            0x4A => BitXor,
            0x4B => BitNot,
            0x4C => Shl,
            0x4D => Shr,
            0x50 => Jmp,
            0x51 => JmpIf,
            0x52 => JmpIfNot,
            0x53 => Call,
            0x54 => CallNative,
            0x55 => Ret,
            0x56 => RetVal,
            0x60 => GetComponent,
            0x61 => SetProperty,
            0x62 => GetProperty,
            0x63 => SetText,
            0x64 => SetVisible,
            0x65 => AddChild,
            0x66 => RemoveChild,
            0x67 => Redraw,
            0x70 => StrConcat,
            0x71 => StrLen,
            0x72 => StrSubstr,
            0x73 => StrFormat,
            0x80 => ArrNew,
            0x81 => ArrGet,
            0x82 => ArrSet,
            0x83 => ArrPush,
            0x84 => ArrPop,
            0x85 => ArrLen,
            0xF0 => DebugPrint,
            0xF1 => DebugBreak,
            0xFF => Halt,
            _ => return None,
        })
    }

    /// Number of operand bytes following this opcode.
    pub fn operand_width(self) -> usize {
        use Opcode::*;
        match self {
            PushInt8 | LoadLocal | StoreLocal | ArrNew => 1,
            PushInt16 | PushStr | LoadGlobal | StoreGlobal | Jmp | JmpIf | JmpIfNot | Call
            | CallNative | SetProperty | GetProperty => 2,
            PushInt32 | PushFloat | GetComponent => 4,
            PushInt64 | PushDouble => 8,
            _ => 0,
        }
    }

    /// Mnemonic used by the disassembler and in log messages.
    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "NOP",
            PushNull => "PUSH_NULL",
            PushTrue => "PUSH_TRUE",
            PushFalse => "PUSH_FALSE",
            PushInt8 => "PUSH_INT8",
            PushInt16 => "PUSH_INT16",
            PushInt32 => "PUSH_INT32",
            PushInt64 => "PUSH_INT64",
            PushFloat => "PUSH_FLOAT",
            PushDouble => "PUSH_DOUBLE",
            PushStr => "PUSH_STR",
            Pop => "POP",
            Dup => "DUP",
            Swap => "SWAP",
            LoadLocal => "LOAD_LOCAL",
            StoreLocal => "STORE_LOCAL",
            LoadGlobal => "LOAD_GLOBAL",
            StoreGlobal => "STORE_GLOBAL",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            Inc => "INC",
            Dec => "DEC",
            Eq => "EQ",
            Ne => "NE",
            Lt => "LT",
            Le => "LE",
            Gt => "GT",
            Ge => "GE",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            BitAnd => "BAND",
            BitOr => "BOR",
            BitXor => "BXOR",
            BitNot => "BNOT",
            Shl => "SHL",
            Shr => "SHR",
            Jmp => "JMP",
            JmpIf => "JMP_IF",
            JmpIfNot => "JMP_IF_NOT",
            Call => "CALL",
            CallNative => "CALL_NATIVE",
            Ret => "RET",
            RetVal => "RET_VAL",
            GetComponent => "GET_COMP",
            SetProperty => "SET_PROP",
            GetProperty => "GET_PROP",
            SetText => "SET_TEXT",
            SetVisible => "SET_VISIBLE",
            AddChild => "ADD_CHILD",
            RemoveChild => "REMOVE_CHILD",
            Redraw => "REDRAW",
            StrConcat => "STR_CONCAT",
            StrLen => "STR_LEN",
            StrSubstr => "STR_SUBSTR",
            StrFormat => "STR_FORMAT",
            ArrNew => "ARR_NEW",
            ArrGet => "ARR_GET",
            ArrSet => "ARR_SET",
            ArrPush => "ARR_PUSH",
            ArrPop => "ARR_POP",
            ArrLen => "ARR_LEN",
            DebugPrint => "DEBUG_PRINT",
            DebugBreak => "DEBUG_BREAK",
            Halt => "HALT",
        }
    }
}
