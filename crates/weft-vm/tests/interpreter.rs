//! Instruction-level semantics: stack effects, arithmetic, strings,
//! control flow, and the call protocol.

use weft_module::{CodeBuilder, Module, ModuleBuilder, Opcode};
use weft_vm::{Value, Vm, VmError};

fn module_with(code: CodeBuilder) -> Module {
    let mut b = ModuleBuilder::new();
    b.add_function("test", 0, 0, &code.finish());
    Module::load(&b.build()).unwrap()
}

/// Run a single-function module to completion and hand back the VM.
fn run(code: CodeBuilder) -> Vm {
    let mut vm = Vm::new(module_with(code));
    vm.call_function(0).unwrap();
    vm
}

#[test]
fn arithmetic_results_are_float_tagged() {
    let mut code = CodeBuilder::new();
    code.push_int(2);
    code.push_int(3);
    code.op(Opcode::Mul);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(vm.global(0), Some(&Value::Float(6.0)));
}

#[test]
fn string_add_concatenates() {
    let mut b = ModuleBuilder::new();
    let prefix = b.add_string("count=");
    let mut code = CodeBuilder::new();
    code.push_str(prefix);
    code.push_int(1);
    code.op(Opcode::Add);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::Halt);
    b.add_function("concat", 0, 0, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(0).unwrap();
    assert_eq!(vm.global(0), Some(&Value::from("count=1")));
}

#[test]
fn division_yields_float_quotient() {
    let mut code = CodeBuilder::new();
    code.push_int(7);
    code.push_int(2);
    code.op(Opcode::Div);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(vm.global(0), Some(&Value::Float(3.5)));
}

#[test]
fn division_by_zero_raises() {
    let mut code = CodeBuilder::new();
    code.push_int(1);
    code.push_int(0);
    code.op(Opcode::Div);
    code.op(Opcode::Halt);
    let mut vm = Vm::new(module_with(code));
    assert_eq!(vm.call_function(0), Err(VmError::DivisionByZero));
    assert_eq!(vm.last_error(), Some(&VmError::DivisionByZero));
    assert!(vm.halted());
}

#[test]
fn modulo_by_zero_raises() {
    let mut code = CodeBuilder::new();
    code.push_int(5);
    code.push_int(0);
    code.op(Opcode::Mod);
    code.op(Opcode::Halt);
    let mut vm = Vm::new(module_with(code));
    assert_eq!(vm.call_function(0), Err(VmError::DivisionByZero));
}

#[test]
fn logical_ops_always_pop_two() {
    // A truthy left operand must not keep AND from popping the right one:
    // the marker value underneath must be the only thing left besides the
    // result.
    for (left, op) in [
        (Opcode::PushTrue, Opcode::And),
        (Opcode::PushFalse, Opcode::And),
        (Opcode::PushTrue, Opcode::Or),
        (Opcode::PushFalse, Opcode::Or),
    ] {
        let mut code = CodeBuilder::new();
        code.push_int(99); // marker
        code.op(left);
        code.op(Opcode::PushTrue);
        code.op(op);
        code.op(Opcode::Halt);
        let vm = run(code);
        assert_eq!(vm.stack().len(), 2, "{op:?} must pop exactly two");
        assert_eq!(vm.stack()[0], Value::Int(99));
        assert!(matches!(vm.stack()[1], Value::Bool(_)));
    }
}

#[test]
fn comparisons_order_numerically() {
    let mut code = CodeBuilder::new();
    code.push_int(2);
    code.push_float(2.5);
    code.op(Opcode::Lt);
    code.op(Opcode::StoreGlobal).u16(0);
    code.push_int(9);
    code.push_int(10);
    code.op(Opcode::Ge);
    code.op(Opcode::StoreGlobal).u16(1);
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(vm.global(0), Some(&Value::Bool(true)));
    assert_eq!(vm.global(1), Some(&Value::Bool(false)));
}

#[test]
fn bitwise_ops_truncate_to_int() {
    let mut code = CodeBuilder::new();
    code.push_int(0b1100);
    code.push_int(0b1010);
    code.op(Opcode::BitAnd);
    code.op(Opcode::StoreGlobal).u16(0);
    code.push_int(1);
    code.push_int(70); // shift amounts mask to 0..=63
    code.op(Opcode::Shl);
    code.op(Opcode::StoreGlobal).u16(1);
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(vm.global(0), Some(&Value::Int(0b1000)));
    assert_eq!(vm.global(1), Some(&Value::Int(1 << 6)));
}

#[test]
fn backward_jump_loops() {
    // Sum 1..=5 into global 0 with a JMP_IF_NOT exit and a backward JMP.
    let mut code = CodeBuilder::new();
    code.push_int(0);
    code.op(Opcode::StoreGlobal).u16(0); // sum
    code.push_int(5);
    code.op(Opcode::StoreGlobal).u16(1); // n
    let top = code.label();
    code.op(Opcode::LoadGlobal).u16(1);
    let done = code.jmp_if_not_forward();
    code.op(Opcode::LoadGlobal).u16(0);
    code.op(Opcode::LoadGlobal).u16(1);
    code.op(Opcode::Add);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::LoadGlobal).u16(1);
    code.op(Opcode::Dec);
    code.op(Opcode::StoreGlobal).u16(1);
    code.jmp(top).unwrap();
    code.patch(done).unwrap();
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(vm.global(0), Some(&Value::Float(15.0)));
}

#[test]
fn out_of_range_jump_rejected() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::Jmp).i16(-100);
    let mut vm = Vm::new(module_with(code));
    assert!(matches!(
        vm.call_function(0),
        Err(VmError::InvalidJump { .. })
    ));
}

#[test]
fn unknown_opcode_rejected() {
    let mut b = ModuleBuilder::new();
    b.add_function("bad", 0, 0, &[0x9A]);
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    assert_eq!(
        vm.call_function(0),
        Err(VmError::UnknownOpcode {
            opcode: 0x9A,
            offset: 0
        })
    );
}

#[test]
fn running_past_code_end_rejected() {
    // NOP with no HALT/RET after it.
    let mut b = ModuleBuilder::new();
    b.add_function("fallthrough", 0, 0, &[Opcode::Nop as u8]);
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    assert_eq!(
        vm.call_function(0),
        Err(VmError::EndOfCode { offset: 1 })
    );
}

#[test]
fn truncated_operand_rejected() {
    // PUSH_INT32 with only one operand byte in the whole CODE section.
    let mut b = ModuleBuilder::new();
    b.add_function("short", 0, 0, &[Opcode::PushInt32 as u8, 0x01]);
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    assert!(matches!(
        vm.call_function(0),
        Err(VmError::EndOfCode { .. })
    ));
}

#[test]
fn call_and_ret_val_restore_stack_height() {
    let mut b = ModuleBuilder::new();

    // add(a, b) -> a + b
    let mut add = CodeBuilder::new();
    add.op(Opcode::LoadLocal).u8(0);
    add.op(Opcode::LoadLocal).u8(1);
    add.op(Opcode::Add);
    add.op(Opcode::RetVal);
    let add = b.add_function("add", 2, 2, &add.finish());

    let mut main = CodeBuilder::new();
    main.push_int(7); // marker under the call
    main.push_int(3);
    main.push_int(4);
    main.op(Opcode::Call).u16(add);
    main.op(Opcode::Halt);
    b.add_function("main", 0, 0, &main.finish());

    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(1).unwrap();
    // Pre-call height (1, the marker) plus one for the returned value.
    assert_eq!(vm.stack(), &[Value::Int(7), Value::Float(7.0)]);
}

#[test]
fn plain_ret_restores_pre_call_height() {
    let mut b = ModuleBuilder::new();

    let mut noop = CodeBuilder::new();
    noop.push_int(1); // scratch the callee leaves behind
    noop.push_int(2);
    noop.op(Opcode::Ret);
    let noop = b.add_function("noop", 0, 0, &noop.finish());

    let mut main = CodeBuilder::new();
    main.push_int(7);
    main.op(Opcode::Call).u16(noop);
    main.op(Opcode::Halt);
    b.add_function("main", 0, 0, &main.finish());

    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(1).unwrap();
    assert_eq!(vm.stack(), &[Value::Int(7)]);
}

#[test]
fn params_bind_in_push_order() {
    let mut b = ModuleBuilder::new();

    // first(a, b) -> a
    let mut first = CodeBuilder::new();
    first.op(Opcode::LoadLocal).u8(0);
    first.op(Opcode::RetVal);
    let first = b.add_function("first", 2, 2, &first.finish());

    let mut main = CodeBuilder::new();
    main.push_int(10);
    main.push_int(20);
    main.op(Opcode::Call).u16(first);
    main.op(Opcode::StoreGlobal).u16(0);
    main.op(Opcode::Halt);
    b.add_function("main", 0, 0, &main.finish());

    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(1).unwrap();
    // The first-pushed argument became local 0.
    assert_eq!(vm.global(0), Some(&Value::Int(10)));
}

#[test]
fn locals_start_null_and_store() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::LoadLocal).u8(1);
    code.op(Opcode::StoreGlobal).u16(0); // null before any store
    code.push_int(5);
    code.op(Opcode::StoreLocal).u8(1);
    code.op(Opcode::LoadLocal).u8(1);
    code.op(Opcode::StoreGlobal).u16(1);
    code.op(Opcode::Halt);
    let mut b = ModuleBuilder::new();
    b.add_function("locals", 0, 2, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(0).unwrap();
    assert_eq!(vm.global(0), Some(&Value::Null));
    assert_eq!(vm.global(1), Some(&Value::Int(5)));
}

#[test]
fn out_of_range_local_rejected() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::LoadLocal).u8(3);
    code.op(Opcode::Halt);
    let mut b = ModuleBuilder::new();
    b.add_function("locals", 0, 1, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    assert_eq!(
        vm.call_function(0),
        Err(VmError::InvalidLocal { index: 3 })
    );
}

#[test]
fn stack_limit_hits_on_fifth_push() {
    let mut code = CodeBuilder::new();
    for i in 1..=5 {
        code.push_int(i);
    }
    code.op(Opcode::Halt);
    let mut vm = Vm::with_limits(module_with(code), 4, 8);
    assert_eq!(
        vm.call_function(0),
        Err(VmError::StackOverflow { limit: 4 })
    );
    // The first four values remain intact.
    assert_eq!(
        vm.stack(),
        &[
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4)
        ]
    );
}

#[test]
fn swap_and_dup() {
    let mut code = CodeBuilder::new();
    code.push_int(1);
    code.push_int(2);
    code.op(Opcode::Swap);
    code.op(Opcode::Dup);
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(
        vm.stack(),
        &[Value::Int(2), Value::Int(1), Value::Int(1)]
    );
}

#[test]
fn str_len_counts_chars() {
    let mut b = ModuleBuilder::new();
    let s = b.add_string("héllo");
    let mut code = CodeBuilder::new();
    code.push_str(s);
    code.op(Opcode::StrLen);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::Halt);
    b.add_function("len", 0, 0, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(0).unwrap();
    assert_eq!(vm.global(0), Some(&Value::Int(5)));
}

#[test]
fn str_substr_clamps() {
    let mut b = ModuleBuilder::new();
    let s = b.add_string("weft");
    let mut code = CodeBuilder::new();
    // substr("weft", 1, 2) == "ef"
    code.push_str(s);
    code.push_int(1);
    code.push_int(2);
    code.op(Opcode::StrSubstr);
    code.op(Opcode::StoreGlobal).u16(0);
    // substr("weft", -3, 100) clamps to the whole string
    code.push_str(s);
    code.push_int(-3);
    code.push_int(100);
    code.op(Opcode::StrSubstr);
    code.op(Opcode::StoreGlobal).u16(1);
    code.op(Opcode::Halt);
    b.add_function("substr", 0, 0, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(0).unwrap();
    assert_eq!(vm.global(0), Some(&Value::from("ef")));
    assert_eq!(vm.global(1), Some(&Value::from("weft")));
}

#[test]
fn str_format_substitutes_placeholders() {
    let mut b = ModuleBuilder::new();
    let template = b.add_string("{} of {}");
    let mut code = CodeBuilder::new();
    code.push_str(template);
    code.push_int(3);
    code.push_int(10);
    code.push_int(2); // argument count
    code.op(Opcode::StrFormat);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::Halt);
    b.add_function("format", 0, 0, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(0).unwrap();
    assert_eq!(vm.global(0), Some(&Value::from("3 of 10")));
}

#[test]
fn str_concat_coerces_display_forms() {
    let mut b = ModuleBuilder::new();
    let s = b.add_string("count=");
    let mut code = CodeBuilder::new();
    code.push_str(s);
    code.push_int(1);
    code.op(Opcode::StrConcat);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::Halt);
    b.add_function("concat", 0, 0, &code.finish());
    let mut vm = Vm::new(Module::load(&b.build()).unwrap());
    vm.call_function(0).unwrap();
    assert_eq!(vm.global(0), Some(&Value::from("count=1")));
}

#[test]
fn equality_follows_value_model() {
    let mut code = CodeBuilder::new();
    code.push_int(1);
    code.push_float(1.0);
    code.op(Opcode::Eq);
    code.op(Opcode::StoreGlobal).u16(0);
    code.op(Opcode::PushNull);
    code.push_int(0);
    code.op(Opcode::Eq);
    code.op(Opcode::StoreGlobal).u16(1);
    code.op(Opcode::Halt);
    let vm = run(code);
    assert_eq!(vm.global(0), Some(&Value::Bool(true)));
    assert_eq!(vm.global(1), Some(&Value::Bool(false)));
}

#[test]
fn debug_break_halts_without_error() {
    let mut code = CodeBuilder::new();
    code.push_int(1);
    code.op(Opcode::DebugBreak);
    code.push_int(2); // never reached
    code.op(Opcode::Halt);
    let mut vm = Vm::new(module_with(code));
    vm.call_function(0).unwrap();
    assert!(vm.halted());
    assert_eq!(vm.last_error(), None);
    assert_eq!(vm.stack(), &[Value::Int(1)]);
}
