use std::cell::RefCell;
use std::rc::Rc;

use objectir_vm::Vm;

fn run_source(load: impl FnOnce() -> objectir_common::Result<objectir_ir::Module>) -> String {
    let module = load().expect("module loads");
    let mut vm = Vm::new();
    let out = Rc::new(RefCell::new(String::new()));
    let sink = out.clone();
    vm.set_output(Box::new(move |text| sink.borrow_mut().push_str(text)));
    vm.load_module(module);
    vm.run_main(&[]).expect("program runs");
    let text = out.borrow().clone();
    text
}

#[test]
fn hello_from_text_ir() {
    let src = r#"
        module Hello
        class Program {
            static method Main() -> void {
                ldstr "Hello from Text IR!"
                call System.Console.WriteLine ( string ) -> void
                ret
            }
        }
    "#;
    let out = run_source(|| objectir_parser::parse(src));
    assert_eq!(out, "Hello from Text IR!\n");
}

#[test]
fn counting_loop_from_text_ir() {
    let src = r#"
        module Count
        class Program {
            static method Main() -> void {
                local i: int32
                ldc 0
                stloc i
            loop:
                ldloc i
                ldc 3
                bge done
                ldloc i
                call System.Console.WriteLine ( int32 ) -> void
                ldloc i
                ldc 1
                add
                stloc i
                br loop
            done:
                ret
            }
        }
    "#;
    let out = run_source(|| objectir_parser::parse(src));
    assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn sqrt_from_json_module() {
    let json = r#"{
        "name": "MathDemo",
        "version": "1.0",
        "types": [{
            "kind": "class",
            "name": "Program",
            "methods": [{
                "name": "Main",
                "returnType": "void",
                "isStatic": true,
                "instructions": [
                    {"opCode": "ldc", "operand": {"value": "9", "type": "float64"}},
                    {"opCode": "call", "operand": {"method": {
                        "declaringType": "System.Math",
                        "name": "Sqrt",
                        "returnType": "float64",
                        "parameterTypes": ["float64"]
                    }}},
                    {"opCode": "call", "operand": {"method": {
                        "declaringType": "System.Console",
                        "name": "WriteLine",
                        "returnType": "void",
                        "parameterTypes": ["float64"]
                    }}},
                    {"opCode": "ret"}
                ]
            }]
        }]
    }"#;
    let out = run_source(|| objectir_loader::load_from_json(json));
    assert_eq!(out, "3\n");
}

#[test]
fn structured_while_from_json_module() {
    let json = r#"{
        "types": [{
            "kind": "class",
            "name": "Program",
            "methods": [{
                "name": "Main",
                "returnType": "void",
                "isStatic": true,
                "localVariables": [{"name": "i", "type": "int32"}],
                "instructions": [
                    {"opCode": "ldc", "operand": {"value": 0, "type": "int32"}},
                    {"opCode": "stloc", "operand": {"localName": "i"}},
                    {"opCode": "while", "operand": {
                        "condition": {
                            "kind": "binary",
                            "operation": "clt",
                            "left": [{"opCode": "ldloc", "operand": {"localName": "i"}}],
                            "right": [{"opCode": "ldc", "operand": {"value": 2, "type": "int32"}}]
                        },
                        "body": [
                            {"opCode": "ldloc", "operand": {"localName": "i"}},
                            {"opCode": "call", "operand": {"method": {
                                "declaringType": "System.Console",
                                "name": "WriteLine",
                                "returnType": "void",
                                "parameterTypes": ["int32"]
                            }}},
                            {"opCode": "ldloc", "operand": {"localName": "i"}},
                            {"opCode": "ldc", "operand": {"value": 1, "type": "int32"}},
                            {"opCode": "add"},
                            {"opCode": "stloc", "operand": {"localName": "i"}}
                        ]
                    }},
                    {"opCode": "ret"}
                ]
            }]
        }]
    }"#;
    let out = run_source(|| objectir_loader::load_from_json(json));
    assert_eq!(out, "0\n1\n");
}

#[test]
fn file_loader_detects_text_and_json() {
    let dir = std::env::temp_dir();
    let stamp = std::process::id();

    let ir_path = dir.join(format!("objectir_e2e_{}.ir", stamp));
    std::fs::write(
        &ir_path,
        "class Program {\n static method Main() -> void {\n ldstr \"from file\"\n call System.Console.WriteLine ( string ) -> void\n ret\n }\n}\n",
    )
    .unwrap();
    let out = run_source(|| objectir_loader::load_from_file(&ir_path));
    assert_eq!(out, "from file\n");
    let _ = std::fs::remove_file(&ir_path);

    let json_path = dir.join(format!("objectir_e2e_{}.json", stamp));
    std::fs::write(
        &json_path,
        r#"{"types": [{"kind": "class", "name": "Program", "methods": [{
            "name": "Main", "returnType": "void", "isStatic": true,
            "instructions": [
                {"opCode": "ldstr", "operand": {"value": "from json", "type": "string"}},
                {"opCode": "call", "operand": {"method": {"declaringType": "System.Console", "name": "WriteLine", "returnType": "void", "parameterTypes": ["string"]}}},
                {"opCode": "ret"}
            ]
        }]}]}"#,
    )
    .unwrap();
    let out = run_source(|| objectir_loader::load_from_file(&json_path));
    assert_eq!(out, "from json\n");
    let _ = std::fs::remove_file(&json_path);
}
