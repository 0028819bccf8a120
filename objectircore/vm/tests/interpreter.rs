use std::cell::RefCell;
use std::rc::Rc;

use objectir_common::ErrorKind;
use objectir_ir::{
    CallTarget, Instruction, Method, Module, OpCode, Operand, Param, TypeDef, TypeRef, Value,
};
use objectir_vm::Vm;

fn capture(vm: &mut Vm) -> Rc<RefCell<String>> {
    let buf = Rc::new(RefCell::new(String::new()));
    let sink = buf.clone();
    vm.set_output(Box::new(move |text| sink.borrow_mut().push_str(text)));
    buf
}

fn ldstr(s: &str) -> Instruction {
    Instruction::with(
        OpCode::LdStr,
        Operand::Const { value: s.to_string(), ty: "string".to_string(), is_null: false },
    )
}

fn ldc_i32(n: i32) -> Instruction {
    Instruction::with(
        OpCode::LdC,
        Operand::Const { value: n.to_string(), ty: "int32".to_string(), is_null: false },
    )
}

fn ldc_f64(x: f64) -> Instruction {
    Instruction::with(
        OpCode::LdC,
        Operand::Const { value: x.to_string(), ty: "float64".to_string(), is_null: false },
    )
}

fn call(declaring: &str, name: &str, ret: &str, params: &[&str]) -> Instruction {
    Instruction::with(OpCode::Call, Operand::Call(CallTarget::new(declaring, name, ret, params)))
}

fn write_line(param: &str) -> Instruction {
    call("System.Console", "WriteLine", "void", &[param])
}

fn ret() -> Instruction {
    Instruction::new(OpCode::Ret)
}

fn program_with_main(locals: Vec<(&str, TypeRef)>, instructions: Vec<Instruction>) -> Module {
    let mut main = Method::new("Main", TypeRef::VOID, true);
    main.locals = locals.into_iter().map(|(n, ty)| Param { name: n.to_string(), ty }).collect();
    main.instructions = instructions;

    let mut program = TypeDef::class("Program");
    program.methods.push(main);

    Module { name: "test".to_string(), version: "1.0".to_string(), types: vec![program] }
}

#[test]
fn s1_hello() {
    let module = program_with_main(
        vec![],
        vec![ldstr("Hello from Text IR!"), write_line("string"), ret()],
    );
    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "Hello from Text IR!\n");
}

#[test]
fn s2_arithmetic() {
    let module = program_with_main(
        vec![],
        vec![ldc_i32(2), ldc_i32(3), Instruction::new(OpCode::Add), write_line("int32"), ret()],
    );
    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "5\n");
}

#[test]
fn s3_locals_and_conditional() {
    use objectir_ir::{Condition, IfData};

    let condition = Condition::Block(vec![
        Instruction::with(OpCode::LdLoc, Operand::Name("n".to_string())),
        ldc_i32(5),
        Instruction::new(OpCode::Cgt),
    ]);
    let body = Instruction::with(
        OpCode::If,
        Operand::If(IfData {
            condition,
            then_block: vec![ldstr("big"), write_line("string")],
            else_block: vec![ldstr("small"), write_line("string")],
        }),
    );
    let module = program_with_main(
        vec![("n", TypeRef::INT32)],
        vec![ldc_i32(7), Instruction::with(OpCode::StLoc, Operand::Name("n".to_string())), body, ret()],
    );

    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "big\n");
}

#[test]
fn s4_while_loop() {
    use objectir_ir::{Condition, WhileData};

    let condition = Condition::Binary {
        op: OpCode::Clt,
        left: vec![Instruction::with(OpCode::LdLoc, Operand::Name("i".to_string()))],
        right: vec![ldc_i32(3)],
    };
    let body = vec![
        Instruction::with(OpCode::LdLoc, Operand::Name("i".to_string())),
        write_line("int32"),
        Instruction::with(OpCode::LdLoc, Operand::Name("i".to_string())),
        ldc_i32(1),
        Instruction::new(OpCode::Add),
        Instruction::with(OpCode::StLoc, Operand::Name("i".to_string())),
    ];
    let module = program_with_main(
        vec![("i", TypeRef::INT32)],
        vec![
            ldc_i32(0),
            Instruction::with(OpCode::StLoc, Operand::Name("i".to_string())),
            Instruction::with(OpCode::While, Operand::While(WhileData { condition, body })),
            ret(),
        ],
    );

    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "0\n1\n2\n");
}

#[test]
fn s5_static_call_with_overload() {
    let module = program_with_main(
        vec![],
        vec![
            ldc_f64(5.2),
            call("System.Math", "Sqrt", "float64", &["float64"]),
            write_line("float64"),
            ret(),
        ],
    );
    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();

    let printed = out.borrow().trim().to_string();
    assert!(!printed.is_empty());
    assert_ne!(printed, "null");
    let value: f64 = printed.parse().expect("numeric output");
    assert!((value - 5.2f64.sqrt()).abs() < 1e-9);
}

#[test]
fn s6_uncaught_division_by_zero() {
    let module = program_with_main(
        vec![],
        vec![ldc_i32(1), ldc_i32(0), Instruction::new(OpCode::Div), write_line("int32"), ret()],
    );
    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    let err = vm.run_main(&[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    assert_eq!(*out.borrow(), "");
}

#[test]
fn non_void_method_delivers_exactly_one_value() {
    let mut five = Method::new("Five", TypeRef::INT32, true);
    five.instructions = vec![ldc_i32(5), ret()];

    let mut main = Method::new("Main", TypeRef::VOID, true);
    main.instructions = vec![
        call("Program", "Five", "int32", &[]),
        write_line("int32"),
        ret(),
    ];

    let mut program = TypeDef::class("Program");
    program.methods.push(main);
    program.methods.push(five);
    let module = Module { name: "test".into(), version: String::new(), types: vec![program] };

    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "5\n");
}

#[test]
fn void_method_leaves_caller_stack_unchanged() {
    // The callee pushes a residual value; the void return must discard it
    // so the caller's follow-up print sees its own constant.
    let mut noise = Method::new("Noise", TypeRef::VOID, true);
    noise.instructions = vec![ldc_i32(99)];

    let mut main = Method::new("Main", TypeRef::VOID, true);
    main.instructions = vec![
        ldc_i32(1),
        call("Program", "Noise", "void", &[]),
        write_line("int32"),
        ret(),
    ];

    let mut program = TypeDef::class("Program");
    program.methods.push(main);
    program.methods.push(noise);
    let module = Module { name: "test".into(), version: String::new(), types: vec![program] };

    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "1\n");
}

#[test]
fn main_with_string_array_receives_cli_args() {
    let mut main = Method::new("Main", TypeRef::VOID, true)
        .param("args", TypeRef::Array(Box::new(TypeRef::STRING)));
    main.instructions = vec![
        Instruction::with(OpCode::LdArg, Operand::Name("args".to_string())),
        ldc_i32(1),
        Instruction::new(OpCode::LdElem),
        write_line("string"),
        ret(),
    ];
    let mut program = TypeDef::class("Program");
    program.methods.push(main);
    let module = Module { name: "test".into(), version: String::new(), types: vec![program] };

    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&["alpha".to_string(), "beta".to_string()]).unwrap();
    assert_eq!(*out.borrow(), "beta\n");
}

#[test]
fn normal_completion_returns_the_last_value() {
    let mut main = Method::new("Main", TypeRef::INT32, true);
    main.instructions = vec![ldc_i32(42), ret()];
    let mut program = TypeDef::class("Program");
    program.methods.push(main);
    let module = Module { name: "test".into(), version: String::new(), types: vec![program] };

    let mut vm = Vm::new();
    vm.load_module(module);
    let result = vm.run_main(&[]).unwrap();
    assert_eq!(result, Value::Int32(42));
}

#[test]
fn missing_entry_class_is_not_found() {
    let mut vm = Vm::new();
    vm.load_module(Module { name: "empty".into(), version: String::new(), types: vec![] });
    let err = vm.run_main(&[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn exception_hook_observes_uncaught_errors() {
    let module = program_with_main(
        vec![],
        vec![ldc_i32(1), ldc_i32(0), Instruction::new(OpCode::Div), ret()],
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut vm = Vm::new();
    vm.load_module(module);
    vm.set_exception_hook(Box::new(move |e| sink.borrow_mut().push(e.kind)));
    let _ = vm.run_main(&[]).unwrap_err();
    assert_eq!(seen.borrow().as_slice(), &[ErrorKind::DivisionByZero]);
}

#[test]
fn recursion_limit_trips() {
    let mut forever = Method::new("Forever", TypeRef::VOID, true);
    forever.instructions = vec![call("Program", "Forever", "void", &[]), ret()];
    let mut main = Method::new("Main", TypeRef::VOID, true);
    main.instructions = vec![call("Program", "Forever", "void", &[]), ret()];
    let mut program = TypeDef::class("Program");
    program.methods.push(main);
    program.methods.push(forever);
    let module = Module { name: "test".into(), version: String::new(), types: vec![program] };

    let mut vm = Vm::new();
    vm.set_recursion_limit(64);
    vm.load_module(module);
    let err = vm.run_main(&[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RecursionLimit);
}

#[test]
fn stack_underflow_is_reported() {
    let module = program_with_main(vec![], vec![Instruction::new(OpCode::Pop), ret()]);
    let mut vm = Vm::new();
    vm.load_module(module);
    let err = vm.run_main(&[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackUnderflow);
}

#[test]
fn conv_changes_the_value_tag() {
    let module = program_with_main(
        vec![],
        vec![
            ldstr("41"),
            Instruction::with(OpCode::Conv, Operand::TypeName("System.Int32".to_string())),
            ldc_i32(1),
            Instruction::new(OpCode::Add),
            write_line("int32"),
            ret(),
        ],
    );
    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "42\n");
}

#[test]
fn console_write_line_prints_null_as_empty() {
    let module = program_with_main(
        vec![],
        vec![Instruction::new(OpCode::LdNull), write_line("string"), ret()],
    );
    let mut vm = Vm::new();
    let out = capture(&mut vm);
    vm.load_module(module);
    vm.run_main(&[]).unwrap();
    assert_eq!(*out.borrow(), "\n");
}
