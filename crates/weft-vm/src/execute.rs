//! The decode/execute loop.
//!
//! One instruction per `step()`: read the opcode byte at `ip`, decode its
//! fixed-width little-endian operands, execute, advance. Any error is
//! captured into the VM's last-error slot and halts the current dispatch
//! without unwinding into the host.

use weft_module::{Opcode, PropertyId};

use crate::error::VmError;
use crate::machine::Vm;
use crate::native::NativeCtx;
use crate::renderer::ComponentRef;
use crate::value::Value;

impl Vm {
    /// Execute one instruction. Returns false when the VM has halted or an
    /// error was raised; `run()` stops on the first false.
    pub fn step(&mut self) -> bool {
        if self.halted {
            return false;
        }
        match self.exec() {
            Ok(()) => !self.halted,
            Err(error) => {
                log::debug!("execution error at ip {}: {}", self.ip, error);
                self.last_error = Some(error);
                self.halted = true;
                false
            }
        }
    }

    /// Step until halt or error.
    pub fn run(&mut self) {
        while self.step() {}
    }

    fn exec(&mut self) -> Result<(), VmError> {
        let offset = self.ip;
        let byte = *self
            .module()
            .code()
            .get(offset)
            .ok_or(VmError::EndOfCode { offset })?;
        self.ip += 1;
        let op = Opcode::from_byte(byte).ok_or(VmError::UnknownOpcode {
            opcode: byte,
            offset,
        })?;
        log::trace!("{offset:04X}: {}", op.name());

        match op {
            Opcode::Nop => {}
            Opcode::PushNull => self.push(Value::Null)?,
            Opcode::PushTrue => self.push(Value::Bool(true))?,
            Opcode::PushFalse => self.push(Value::Bool(false))?,
            Opcode::PushInt8 => {
                let v = self.read_i8()?;
                self.push(Value::Int(v as i64))?;
            }
            Opcode::PushInt16 => {
                let v = self.read_i16()?;
                self.push(Value::Int(v as i64))?;
            }
            Opcode::PushInt32 => {
                let v = i32::from_le_bytes(self.read_bytes::<4>()?);
                self.push(Value::Int(v as i64))?;
            }
            Opcode::PushInt64 => {
                let v = i64::from_le_bytes(self.read_bytes::<8>()?);
                self.push(Value::Int(v))?;
            }
            Opcode::PushFloat => {
                let v = f32::from_le_bytes(self.read_bytes::<4>()?);
                self.push(Value::Float(v as f64))?;
            }
            Opcode::PushDouble => {
                let v = f64::from_le_bytes(self.read_bytes::<8>()?);
                self.push(Value::Float(v))?;
            }
            Opcode::PushStr => {
                let index = self.read_u16()?;
                let s = match self.module().string(index) {
                    Some(s) => s.to_owned(),
                    None => {
                        log::warn!("PUSH_STR {index}: no such string table entry");
                        String::new()
                    }
                };
                self.push(Value::String(s))?;
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let top = self.peek()?.clone();
                self.push(top)?;
            }
            Opcode::Swap => {
                let a = self.pop()?;
                let b = self.pop()?;
                self.push(a)?;
                self.push(b)?;
            }

            Opcode::LoadLocal => {
                let index = self.read_u8()?;
                let value = self
                    .frames
                    .last()
                    .and_then(|frame| frame.local(index))
                    .cloned()
                    .ok_or(VmError::InvalidLocal { index })?;
                self.push(value)?;
            }
            Opcode::StoreLocal => {
                let index = self.read_u8()?;
                let value = self.pop()?;
                let stored = self
                    .frames
                    .last_mut()
                    .map_or(false, |frame| frame.set_local(index, value));
                if !stored {
                    return Err(VmError::InvalidLocal { index });
                }
            }
            Opcode::LoadGlobal => {
                let index = self.read_u16()?;
                let value = self.globals.get(&index).cloned().unwrap_or(Value::Null);
                self.push(value)?;
            }
            Opcode::StoreGlobal => {
                let index = self.read_u16()?;
                let value = self.pop()?;
                self.globals.insert(index, value);
            }

            Opcode::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                // Overloaded: string concatenation when either side is a
                // string, Float-tagged numeric addition otherwise.
                let result = if a.is_string() || b.is_string() {
                    Value::String(format!("{a}{b}"))
                } else {
                    Value::Float(a.as_number() + b.as_number())
                };
                self.push(result)?;
            }
            Opcode::Sub => self.binary_numeric(|a, b| a - b)?,
            Opcode::Mul => self.binary_numeric(|a, b| a * b)?,
            Opcode::Div => {
                let b = self.pop()?.as_number();
                let a = self.pop()?.as_number();
                if b == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                self.push(Value::Float(a / b))?;
            }
            Opcode::Mod => {
                let b = self.pop()?.as_number();
                let a = self.pop()?.as_number();
                if b == 0.0 {
                    return Err(VmError::DivisionByZero);
                }
                self.push(Value::Float(a % b))?;
            }
            Opcode::Neg => {
                let a = self.pop()?.as_number();
                self.push(Value::Float(-a))?;
            }
            Opcode::Inc => {
                let a = self.pop()?.as_number();
                self.push(Value::Float(a + 1.0))?;
            }
            Opcode::Dec => {
                let a = self.pop()?.as_number();
                self.push(Value::Float(a - 1.0))?;
            }

            Opcode::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b))?;
            }
            Opcode::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a != b))?;
            }
            Opcode::Lt => self.binary_compare(|a, b| a < b)?,
            Opcode::Le => self.binary_compare(|a, b| a <= b)?,
            Opcode::Gt => self.binary_compare(|a, b| a > b)?,
            Opcode::Ge => self.binary_compare(|a, b| a >= b)?,

            // Logical ops never short-circuit: both operand values are
            // already on the stack, so both are always popped.
            Opcode::And => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a.truthy() && b.truthy()))?;
            }
            Opcode::Or => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a.truthy() || b.truthy()))?;
            }
            Opcode::Not => {
                let a = self.pop()?;
                self.push(Value::Bool(!a.truthy()))?;
            }

            Opcode::BitAnd => self.binary_bitwise(|a, b| a & b)?,
            Opcode::BitOr => self.binary_bitwise(|a, b| a | b)?,
            Opcode::BitXor => self.binary_bitwise(|a, b| a ^ b)?,
            Opcode::BitNot => {
                let a = self.pop()?.as_number() as i64;
                self.push(Value::Int(!a))?;
            }
            Opcode::Shl => self.binary_bitwise(|a, b| a << (b as u32 & 63))?,
            Opcode::Shr => self.binary_bitwise(|a, b| a >> (b as u32 & 63))?,

            Opcode::Jmp => {
                let rel = self.read_i16()?;
                self.jump(offset, rel)?;
            }
            Opcode::JmpIf => {
                let rel = self.read_i16()?;
                if self.pop()?.truthy() {
                    self.jump(offset, rel)?;
                }
            }
            Opcode::JmpIfNot => {
                let rel = self.read_i16()?;
                if !self.pop()?.truthy() {
                    self.jump(offset, rel)?;
                }
            }

            Opcode::Call => {
                let index = self.read_u16()?;
                self.enter_function(index)?;
            }
            Opcode::CallNative => {
                let index = self.read_u16()?;
                match self.native_fn(index) {
                    Some((name, func)) => {
                        log::trace!("native {index} ({name})");
                        let floor = self.frame_floor();
                        let mut ctx = NativeCtx::new(
                            &mut self.stack,
                            &mut self.globals,
                            floor,
                            self.max_stack_size,
                        );
                        func(&mut ctx)?;
                    }
                    // Missing natives degrade gracefully, like renderer ops.
                    None => log::warn!("CALL_NATIVE {index}: no native registered"),
                }
            }
            Opcode::Ret => self.leave_function(None)?,
            Opcode::RetVal => {
                let value = self.pop()?;
                self.leave_function(Some(value))?;
            }

            Opcode::GetComponent => {
                let id = u32::from_le_bytes(self.read_bytes::<4>()?);
                let resolved = self
                    .renderer
                    .as_mut()
                    .and_then(|renderer| renderer.get_component(id));
                self.push(resolved.map_or(Value::Null, |c| Value::Int(c.id() as i64)))?;
            }
            Opcode::SetProperty => {
                let property = PropertyId::new(self.read_u16()?);
                let value = self.pop()?;
                let component = self.pop()?;
                if let Some(component) = self.resolve_component(&component) {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.set_property(component, property, &value);
                    }
                }
            }
            Opcode::GetProperty => {
                let property = PropertyId::new(self.read_u16()?);
                let component = self.pop()?;
                let value = match self.resolve_component(&component) {
                    Some(component) => match self.renderer.as_mut() {
                        Some(renderer) => renderer.get_property(component, property),
                        None => Value::Null,
                    },
                    None => Value::Null,
                };
                self.push(value)?;
            }
            Opcode::SetText => {
                let text = self.pop()?;
                let component = self.pop()?;
                if let Some(component) = self.resolve_component(&component) {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.set_text(component, &text.to_string());
                    }
                }
            }
            Opcode::SetVisible => {
                let visible = self.pop()?.truthy();
                let component = self.pop()?;
                if let Some(component) = self.resolve_component(&component) {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.set_visible(component, visible);
                    }
                }
            }
            Opcode::AddChild => {
                let child = self.pop()?;
                let parent = self.pop()?;
                let child = self.resolve_component(&child);
                let parent = self.resolve_component(&parent);
                if let (Some(parent), Some(child)) = (parent, child) {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.add_child(parent, child);
                    }
                }
            }
            Opcode::RemoveChild => {
                let child = self.pop()?;
                let parent = self.pop()?;
                let child = self.resolve_component(&child);
                let parent = self.resolve_component(&parent);
                if let (Some(parent), Some(child)) = (parent, child) {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.remove_child(parent, child);
                    }
                }
            }
            Opcode::Redraw => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.redraw();
                }
            }

            Opcode::StrConcat => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::String(format!("{a}{b}")))?;
            }
            Opcode::StrLen => {
                let a = self.pop()?;
                self.push(Value::Int(a.to_string().chars().count() as i64))?;
            }
            Opcode::StrSubstr => {
                let len = self.pop()?.as_number() as i64;
                let start = self.pop()?.as_number() as i64;
                let s = self.pop()?.to_string();
                // Character-indexed; start and length clamp to the valid
                // range instead of erroring.
                let start = start.max(0) as usize;
                let len = len.max(0) as usize;
                let sub: String = s.chars().skip(start).take(len).collect();
                self.push(Value::String(sub))?;
            }
            Opcode::StrFormat => {
                let count = (self.pop()?.as_number() as i64).max(0) as usize;
                let mut args = Vec::with_capacity(count);
                for _ in 0..count {
                    args.push(self.pop()?);
                }
                args.reverse();
                let template = self.pop()?.to_string();
                self.push(Value::String(format_template(&template, &args)))?;
            }

            Opcode::ArrNew => {
                let size = self.read_u8()? as usize;
                self.push(Value::array(vec![Value::Null; size]))?;
            }
            Opcode::ArrGet => {
                let index = self.pop()?.as_number() as i64;
                let array = self.pop()?;
                let value = match array.as_array() {
                    Some(items) => {
                        let items = items.borrow();
                        usize::try_from(index)
                            .ok()
                            .and_then(|i| items.get(i).cloned())
                            .unwrap_or(Value::Null)
                    }
                    None => Value::Null,
                };
                self.push(value)?;
            }
            Opcode::ArrSet => {
                let value = self.pop()?;
                let index = self.pop()?.as_number() as i64;
                let array = self.pop()?;
                // Out-of-range, non-array, and self-containing writes are
                // no-ops; array mutation is best effort like UI mutation.
                if let Some(items) = array.as_array() {
                    if !value.contains_array(items) {
                        if let Ok(i) = usize::try_from(index) {
                            let mut items = items.borrow_mut();
                            if let Some(slot) = items.get_mut(i) {
                                *slot = value;
                            }
                        }
                    }
                }
            }
            Opcode::ArrPush => {
                let value = self.pop()?;
                let array = self.pop()?;
                if let Some(items) = array.as_array() {
                    if value.contains_array(items) {
                        log::warn!("ARR_PUSH: refusing self-containing insertion");
                    } else {
                        items.borrow_mut().push(value);
                    }
                }
            }
            Opcode::ArrPop => {
                let array = self.pop()?;
                let value = array
                    .as_array()
                    .and_then(|items| items.borrow_mut().pop())
                    .unwrap_or(Value::Null);
                self.push(value)?;
            }
            Opcode::ArrLen => {
                let array = self.pop()?;
                let value = array
                    .as_array()
                    .map(|items| Value::Int(items.borrow().len() as i64))
                    .unwrap_or(Value::Null);
                self.push(value)?;
            }

            Opcode::DebugPrint => {
                let value = self.pop()?;
                log::info!("debug print: {value}");
            }
            Opcode::DebugBreak | Opcode::Halt => {
                self.halted = true;
            }
        }
        Ok(())
    }

    fn binary_numeric(&mut self, f: impl FnOnce(f64, f64) -> f64) -> Result<(), VmError> {
        let b = self.pop()?.as_number();
        let a = self.pop()?.as_number();
        self.push(Value::Float(f(a, b)))
    }

    fn binary_compare(&mut self, f: impl FnOnce(f64, f64) -> bool) -> Result<(), VmError> {
        let b = self.pop()?.as_number();
        let a = self.pop()?.as_number();
        self.push(Value::Bool(f(a, b)))
    }

    fn binary_bitwise(&mut self, f: impl FnOnce(i64, i64) -> i64) -> Result<(), VmError> {
        let b = self.pop()?.as_number() as i64;
        let a = self.pop()?.as_number() as i64;
        self.push(Value::Int(f(a, b)))
    }

    /// Apply a signed relative jump, measured from the position immediately
    /// after the offset field (which is where `ip` already points).
    fn jump(&mut self, from: usize, rel: i16) -> Result<(), VmError> {
        let target = self.ip as i64 + rel as i64;
        if target < 0 || target > self.module().code().len() as i64 {
            return Err(VmError::InvalidJump { from, target });
        }
        self.ip = target as usize;
        Ok(())
    }

    /// Resolve a component operand. Null, non-integer, and unknown ids all
    /// yield None, which the UI opcodes treat as a silent no-op.
    fn resolve_component(&mut self, value: &Value) -> Option<ComponentRef> {
        let id = match value {
            Value::Int(id) => u32::try_from(*id).ok()?,
            _ => return None,
        };
        self.renderer.as_mut()?.get_component(id)
    }

    fn read_u8(&mut self) -> Result<u8, VmError> {
        Ok(self.read_bytes::<1>()?[0])
    }

    fn read_i8(&mut self) -> Result<i8, VmError> {
        Ok(self.read_bytes::<1>()?[0] as i8)
    }

    fn read_u16(&mut self) -> Result<u16, VmError> {
        Ok(u16::from_le_bytes(self.read_bytes::<2>()?))
    }

    fn read_i16(&mut self) -> Result<i16, VmError> {
        Ok(i16::from_le_bytes(self.read_bytes::<2>()?))
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], VmError> {
        let code = self.module().code();
        if self.ip + N > code.len() {
            return Err(VmError::EndOfCode { offset: self.ip });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&code[self.ip..self.ip + N]);
        self.ip += N;
        Ok(buf)
    }
}

/// Replace each `{}` placeholder with the next argument's display form,
/// left to right. Placeholders beyond the argument list stay verbatim.
fn format_template(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_template_substitutes_in_order() {
        let args = [Value::Int(1), Value::from("two")];
        assert_eq!(format_template("a={} b={}", &args), "a=1 b=two");
    }

    #[test]
    fn format_template_extra_placeholders_verbatim() {
        assert_eq!(format_template("{} {}", &[Value::Int(5)]), "5 {}");
        assert_eq!(format_template("{}", &[]), "{}");
    }

    #[test]
    fn format_template_extra_args_ignored() {
        let args = [Value::Int(1), Value::Int(2)];
        assert_eq!(format_template("only {}", &args), "only 1");
    }
}
