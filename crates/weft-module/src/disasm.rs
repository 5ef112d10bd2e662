//! Bytecode disassembler.

use std::fmt::Write as _;

use crate::module::Module;
use crate::opcode::Opcode;

/// Render a CODE payload as one mnemonic line per instruction.
///
/// Undefined opcode bytes render as `DB 0xNN` and decoding continues at the
/// next byte; a trailing operand cut off by the end of the buffer renders as
/// `<truncated>` and stops.
pub fn disassemble(code: &[u8]) -> String {
    disassemble_with(code, None)
}

/// Disassemble one function's body, resolving string operands against the
/// module's string table. Returns None for an invalid function index.
pub fn disassemble_function(module: &Module, index: u16) -> Option<String> {
    let func = module.function(index)?;
    let start = func.code_offset as usize;
    let end = start + func.code_size as usize;
    Some(disassemble_with(&module.code()[start..end], Some(module)))
}

fn disassemble_with(code: &[u8], module: Option<&Module>) -> String {
    let mut out = String::new();
    let mut pos = 0;
    while pos < code.len() {
        let at = pos;
        let byte = code[pos];
        pos += 1;
        let Some(op) = Opcode::from_byte(byte) else {
            let _ = writeln!(out, "{at:04X}: DB 0x{byte:02X}");
            continue;
        };
        let width = op.operand_width();
        if pos + width > code.len() {
            let _ = writeln!(out, "{at:04X}: {} <truncated>", op.name());
            break;
        }
        let operand = &code[pos..pos + width];
        pos += width;
        let _ = write!(out, "{at:04X}: {}", op.name());
        render_operand(&mut out, op, operand, module);
        out.push('\n');
    }
    out
}

fn render_operand(out: &mut String, op: Opcode, operand: &[u8], module: Option<&Module>) {
    use Opcode::*;
    match op {
        PushInt8 => {
            let _ = write!(out, " {}", operand[0] as i8);
        }
        PushInt16 => {
            let _ = write!(out, " {}", i16::from_le_bytes([operand[0], operand[1]]));
        }
        PushInt32 => {
            let v = i32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
            let _ = write!(out, " {v}");
        }
        PushInt64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(operand);
            let _ = write!(out, " {}", i64::from_le_bytes(b));
        }
        PushFloat => {
            let v = f32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
            let _ = write!(out, " {v}");
        }
        PushDouble => {
            let mut b = [0u8; 8];
            b.copy_from_slice(operand);
            let _ = write!(out, " {}", f64::from_le_bytes(b));
        }
        PushStr => {
            let index = u16::from_le_bytes([operand[0], operand[1]]);
            let _ = write!(out, " {index}");
            if let Some(s) = module.and_then(|m| m.string(index)) {
                let _ = write!(out, " ; {s:?}");
            }
        }
        Jmp | JmpIf | JmpIfNot => {
            let _ = write!(out, " {:+}", i16::from_le_bytes([operand[0], operand[1]]));
        }
        LoadLocal | StoreLocal | ArrNew => {
            let _ = write!(out, " {}", operand[0]);
        }
        GetComponent => {
            let v = u32::from_le_bytes([operand[0], operand[1], operand[2], operand[3]]);
            let _ = write!(out, " {v}");
        }
        Call => {
            let index = u16::from_le_bytes([operand[0], operand[1]]);
            let _ = write!(out, " {index}");
            if let Some(name) = module.and_then(|m| m.function_name(index)) {
                let _ = write!(out, " ; {name}");
            }
        }
        _ if !operand.is_empty() => {
            let _ = write!(out, " {}", u16::from_le_bytes([operand[0], operand[1]]));
        }
        _ => {}
    }
}
