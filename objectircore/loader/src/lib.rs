//! Module loading: JSON shape → `Module`, plus the file front door with
//! text-first auto-detection.

use std::path::Path;

use serde_json::Value as JValue;

use objectir_common::{ErrorKind, IrError, Result};
use objectir_ir::{
    BranchTarget, CallTarget, CatchBlock, Condition, Field, FieldTarget, IfData, Instruction,
    Method, Module, OpCode, Operand, Param, TryData, TypeDef, TypeKind, TypeRef, WhileData,
};

/// Loads a module from disk. `.ir` is parsed as textual IR, `.json` as
/// JSON; any other extension tries text first and falls back to JSON.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Module> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| IrError::new(ErrorKind::NotFound, format!("Cannot open IR file {}: {}", path.display(), e)))?;
    let content = decode_text(&bytes);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => load_from_json(&content),
        "ir" => objectir_parser::parse(&content),
        _ => objectir_parser::parse(&content).or_else(|_| load_from_json(&content)),
    }
}

pub fn load_from_json(json: &str) -> Result<Module> {
    let root: JValue = serde_json::from_str(json)
        .map_err(|e| IrError::new(ErrorKind::MalformedOperand, format!("JSON parse error: {}", e)))?;
    module_from_json(&root)
}

/// Strips a UTF-8 BOM and decodes UTF-16 (either endianness) content so
/// modules saved by Windows tooling load unchanged.
fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn module_from_json(root: &JValue) -> Result<Module> {
    let mut module = Module {
        name: str_of(root, "name").unwrap_or_else(|| "ObjectIRModule".to_string()),
        version: str_of(root, "version").unwrap_or_default(),
        types: Vec::new(),
    };

    if let Some(types) = root.get("types").and_then(|t| t.as_array()) {
        for ty in types {
            module.types.push(type_from_json(ty)?);
        }
    }

    Ok(module)
}

fn type_from_json(node: &JValue) -> Result<TypeDef> {
    let name = str_of(node, "name")
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Type missing name"))?;
    let mut def = TypeDef::class(name);

    def.kind = match str_of(node, "kind").unwrap_or_else(|| "class".to_string()).to_ascii_lowercase().as_str() {
        "interface" => TypeKind::Interface,
        "struct" => TypeKind::Struct,
        "enum" => TypeKind::Enum,
        _ => TypeKind::Class,
    };
    def.namespace = str_of(node, "namespace").unwrap_or_default();
    def.base = str_of(node, "base");
    def.is_abstract = bool_of(node, "isAbstract");
    def.is_sealed = bool_of(node, "isSealed");

    if let Some(interfaces) = node.get("interfaces").and_then(|i| i.as_array()) {
        for iface in interfaces {
            if let Some(name) = iface.as_str() {
                def.interfaces.push(name.to_string());
            }
        }
    }

    if let Some(fields) = node.get("fields").and_then(|f| f.as_array()) {
        for field in fields {
            def.fields.push(field_from_json(field)?);
        }
    }

    if let Some(methods) = node.get("methods").and_then(|m| m.as_array()) {
        for method in methods {
            def.methods.push(method_from_json(method)?);
        }
    }

    Ok(def)
}

fn field_from_json(node: &JValue) -> Result<Field> {
    let name = str_of(node, "name")
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Field missing name"))?;
    let ty = str_of(node, "type").unwrap_or_else(|| "object".to_string());
    let mut field = Field::new(name, TypeRef::parse(&ty));
    field.is_static = bool_of(node, "isStatic");
    field.is_readonly = bool_of(node, "isReadOnly");
    Ok(field)
}

fn method_from_json(node: &JValue) -> Result<Method> {
    let name = str_of(node, "name")
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Method missing name"))?;
    let return_type = str_of(node, "returnType").unwrap_or_else(|| "void".to_string());

    let mut method = Method::new(name, TypeRef::parse(&return_type), bool_of(node, "isStatic"));
    method.is_virtual = bool_of(node, "isVirtual");
    method.is_override = bool_of(node, "isOverride");
    method.is_abstract = bool_of(node, "isAbstract");
    method.is_ctor = bool_of(node, "isConstructor");

    if let Some(params) = node.get("parameters").and_then(|p| p.as_array()) {
        for param in params {
            method.params.push(param_from_json(param)?);
        }
    }

    // Both spellings occur in the wild, depending on the emitter.
    let locals = node
        .get("localVariables")
        .or_else(|| node.get("LocalVariables"))
        .and_then(|l| l.as_array());
    if let Some(locals) = locals {
        for local in locals {
            method.locals.push(param_from_json(local)?);
        }
    }

    if let Some(labels) = node.get("labelMap").and_then(|l| l.as_object()) {
        for (label, index) in labels {
            if let Some(index) = index.as_u64() {
                method.label_map.insert(label.clone(), index as usize);
            }
        }
    }

    if let Some(instrs) = node.get("instructions").and_then(|i| i.as_array()) {
        for instr in instrs {
            method.instructions.push(instruction_from_json(instr)?);
        }
    }

    Ok(method)
}

fn param_from_json(node: &JValue) -> Result<Param> {
    let name = str_of(node, "name")
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Parameter missing name"))?;
    let ty = str_of(node, "type").unwrap_or_else(|| "object".to_string());
    Ok(Param { name, ty: TypeRef::parse(&ty) })
}

/// One instruction node: `{"opCode": "...", "operand": ...}`. Unknown
/// opcodes are rejected; operand shapes depend on the opcode.
pub fn instruction_from_json(node: &JValue) -> Result<Instruction> {
    let op_str = str_of(node, "opCode")
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Instruction missing opCode"))?;
    let op = OpCode::parse(&op_str)?;

    let operand = match node.get("operand") {
        None | Some(JValue::Null) => Operand::None,
        Some(operand) => operand_from_json(op, operand)?,
    };

    Ok(Instruction::with(op, operand))
}

fn operand_from_json(op: OpCode, operand: &JValue) -> Result<Operand> {
    use OpCode::*;

    match op {
        LdArg => {
            if let Some(name) = str_of(operand, "argumentName") {
                return Ok(Operand::Name(name));
            }
            if let Some(index) = operand.get("index").and_then(|i| i.as_u64()) {
                return Ok(Operand::Index(index as usize));
            }
            if let Some(index) = operand.as_u64() {
                return Ok(Operand::Index(index as usize));
            }
            Ok(Operand::None)
        }
        StArg => Ok(str_of(operand, "argumentName").map(Operand::Name).unwrap_or(Operand::None)),
        LdLoc | StLoc => Ok(str_of(operand, "localName").map(Operand::Name).unwrap_or(Operand::None)),

        LdFld | StFld => {
            let field = match operand.get("field") {
                // String form from the text parser: "Class.fieldName".
                Some(JValue::String(spelling)) => split_field_spelling(spelling),
                Some(obj) => FieldTarget {
                    declaring_type: str_of(obj, "declaringType").unwrap_or_default(),
                    name: str_of(obj, "name").unwrap_or_default(),
                    ty: str_of(obj, "type").unwrap_or_default(),
                },
                None => return Ok(Operand::None),
            };
            Ok(Operand::Field(field))
        }
        LdSFld | StSFld => Ok(Operand::StaticField {
            declaring_type: str_of(operand, "declaringType").unwrap_or_default(),
            name: str_of(operand, "name").unwrap_or_default(),
        }),

        LdC | LdStr => {
            let ty = str_of(operand, "type").unwrap_or_else(|| {
                if op == LdStr { "string".to_string() } else { String::new() }
            });
            match operand.get("value") {
                Some(JValue::String(s)) => Ok(Operand::Const { value: s.clone(), ty, is_null: false }),
                Some(JValue::Number(n)) => {
                    Ok(Operand::Const { value: n.to_string(), ty, is_null: false })
                }
                Some(JValue::Bool(b)) => Ok(Operand::Const {
                    value: b.to_string(),
                    ty: if ty.is_empty() { "bool".to_string() } else { ty },
                    is_null: false,
                }),
                Some(JValue::Null) | None => Ok(Operand::Const { value: String::new(), ty, is_null: true }),
                Some(other) => Err(IrError::new(
                    ErrorKind::MalformedOperand,
                    format!("Unsupported constant value: {}", other),
                )),
            }
        }
        LdI4 | LdI8 => {
            let n = operand
                .get("value")
                .and_then(|v| v.as_i64())
                .or_else(|| operand.as_i64())
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing value", op)))?;
            Ok(Operand::Int(n))
        }
        LdR4 | LdR8 => {
            let x = operand
                .get("value")
                .and_then(|v| v.as_f64())
                .or_else(|| operand.as_f64())
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing value", op)))?;
            Ok(Operand::Float(x))
        }

        Call | CallVirt => {
            let method = operand
                .get("method")
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Call missing method metadata"))?;
            let declaring = str_of(method, "declaringType").unwrap_or_default();
            let name = str_of(method, "name").unwrap_or_default();
            let return_type = str_of(method, "returnType").unwrap_or_else(|| "void".to_string());
            let params: Vec<String> = method
                .get("parameterTypes")
                .and_then(|p| p.as_array())
                .map(|p| p.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                .unwrap_or_default();
            let params: Vec<&str> = params.iter().map(|s| s.as_str()).collect();
            Ok(Operand::Call(CallTarget::new(declaring, name, &return_type, &params)))
        }

        NewObj | CastClass | IsInst | Conv => {
            let ty = str_of(operand, "type")
                .or_else(|| str_of(operand, "targetType"))
                .or_else(|| operand.as_str().map(String::from))
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, format!("{} missing type", op)))?;
            Ok(Operand::TypeName(ty))
        }
        NewArr => {
            let ty = str_of(operand, "elementType")
                .or_else(|| str_of(operand, "type"))
                .or_else(|| operand.as_str().map(String::from))
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "newarr missing elementType"))?;
            Ok(Operand::TypeName(ty))
        }

        Br | BrTrue | BrFalse | Beq | Bne | Bgt | Bge | Blt | Ble => {
            let target = operand
                .get("target")
                .or_else(|| operand.get("offset"))
                .unwrap_or(operand);
            match target {
                JValue::Number(n) => {
                    let index = n.as_u64().ok_or_else(|| {
                        IrError::new(ErrorKind::BranchOutOfRange, format!("Negative branch target: {}", n))
                    })?;
                    Ok(Operand::Branch(BranchTarget::Index(index as usize)))
                }
                JValue::String(label) => Ok(Operand::Branch(BranchTarget::Label(label.clone()))),
                other => Err(IrError::new(
                    ErrorKind::MalformedOperand,
                    format!("Unsupported branch target: {}", other),
                )),
            }
        }

        If => {
            let condition = match operand.get("condition") {
                Some(node) => condition_from_json(node)?,
                None => Condition::Stack,
            };
            Ok(Operand::If(IfData {
                condition,
                then_block: block_from_json(operand.get("thenBlock"))?,
                else_block: block_from_json(operand.get("elseBlock"))?,
            }))
        }
        While => {
            let condition = match operand.get("condition") {
                Some(node) => condition_from_json(node)?,
                None => Condition::Stack,
            };
            Ok(Operand::While(WhileData {
                condition,
                body: block_from_json(operand.get("body"))?,
            }))
        }
        Try => {
            let mut catches = Vec::new();
            if let Some(blocks) = operand.get("catchBlocks").and_then(|c| c.as_array()) {
                for block in blocks {
                    catches.push(CatchBlock {
                        exception_type: str_of(block, "exceptionType").unwrap_or_default(),
                        block: block_from_json(block.get("block"))?,
                    });
                }
            }
            Ok(Operand::Try(TryData {
                try_block: block_from_json(operand.get("tryBlock"))?,
                catches,
                finally_block: block_from_json(operand.get("finallyBlock"))?,
            }))
        }

        _ => Ok(Operand::None),
    }
}

fn condition_from_json(node: &JValue) -> Result<Condition> {
    let kind = str_of(node, "kind")
        .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Condition kind missing"))?;
    match kind.as_str() {
        "stack" => Ok(Condition::Stack),
        "binary" => {
            let operation = str_of(node, "operation")
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Binary condition missing operation"))?;
            Ok(Condition::Binary {
                op: OpCode::parse(&operation)?,
                left: block_from_json(node.get("left"))?,
                right: block_from_json(node.get("right"))?,
            })
        }
        "expression" => {
            let expr = node
                .get("expression")
                .ok_or_else(|| IrError::new(ErrorKind::MalformedOperand, "Expression condition missing expression"))?;
            Ok(Condition::Expression(Box::new(instruction_from_json(expr)?)))
        }
        "block" => Ok(Condition::Block(block_from_json(node.get("block"))?)),
        other => Err(IrError::new(
            ErrorKind::MalformedOperand,
            format!("Unsupported condition kind: {}", other),
        )),
    }
}

fn block_from_json(node: Option<&JValue>) -> Result<Vec<Instruction>> {
    let mut out = Vec::new();
    if let Some(array) = node.and_then(|n| n.as_array()) {
        out.reserve(array.len());
        for instr in array {
            out.push(instruction_from_json(instr)?);
        }
    }
    Ok(out)
}

fn split_field_spelling(spelling: &str) -> FieldTarget {
    match spelling.rfind('.') {
        Some(dot) => FieldTarget {
            declaring_type: spelling[..dot].to_string(),
            name: spelling[dot + 1..].to_string(),
            ty: String::new(),
        },
        None => FieldTarget { declaring_type: String::new(), name: spelling.to_string(), ty: String::new() },
    }
}

fn str_of(node: &JValue, key: &str) -> Option<String> {
    node.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn bool_of(node: &JValue, key: &str) -> bool {
    node.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_module_loads() {
        let json = r#"{
            "name": "Demo",
            "version": "1.0",
            "types": [{
                "kind": "class",
                "name": "Program",
                "methods": [{
                    "name": "Main",
                    "returnType": "void",
                    "isStatic": true,
                    "instructions": [
                        {"opCode": "ldstr", "operand": {"value": "hi", "type": "string"}},
                        {"opCode": "ret"}
                    ]
                }]
            }]
        }"#;
        let module = load_from_json(json).unwrap();
        assert_eq!(module.name, "Demo");
        let main = &module.types[0].methods[0];
        assert!(main.is_static);
        assert_eq!(main.instructions[0].op, OpCode::LdStr);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let json = r#"{"types": [{"kind": "class", "name": "P", "methods": [{
            "name": "M", "returnType": "void",
            "instructions": [{"opCode": "frobnicate"}]
        }]}]}"#;
        let err = load_from_json(json).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOpcode);
    }

    #[test]
    fn field_operand_accepts_both_shapes() {
        let obj = serde_json::json!({"opCode": "ldfld", "operand": {"field": {"declaringType": "P", "name": "x", "type": "int32"}}});
        let instr = instruction_from_json(&obj).unwrap();
        assert!(matches!(&instr.operand, Operand::Field(f) if f.name == "x" && f.declaring_type == "P"));

        let s = serde_json::json!({"opCode": "stfld", "operand": {"field": "P.x"}});
        let instr = instruction_from_json(&s).unwrap();
        assert!(matches!(&instr.operand, Operand::Field(f) if f.name == "x" && f.declaring_type == "P"));
    }

    #[test]
    fn branch_targets_accept_label_and_index() {
        let label = serde_json::json!({"opCode": "br", "operand": {"target": "loop"}});
        assert!(matches!(
            instruction_from_json(&label).unwrap().operand,
            Operand::Branch(BranchTarget::Label(l)) if l == "loop"
        ));

        let index = serde_json::json!({"opCode": "brtrue", "operand": {"target": 4}});
        assert!(matches!(
            instruction_from_json(&index).unwrap().operand,
            Operand::Branch(BranchTarget::Index(4))
        ));
    }

    #[test]
    fn while_with_binary_condition() {
        let node = serde_json::json!({
            "opCode": "while",
            "operand": {
                "condition": {
                    "kind": "binary",
                    "operation": "clt",
                    "left": [{"opCode": "ldloc", "operand": {"localName": "i"}}],
                    "right": [{"opCode": "ldc", "operand": {"value": 3, "type": "int32"}}]
                },
                "body": [{"opCode": "nop"}]
            }
        });
        let instr = instruction_from_json(&node).unwrap();
        match instr.operand {
            Operand::While(data) => {
                assert!(matches!(data.condition, Condition::Binary { op: OpCode::Clt, .. }));
                assert_eq!(data.body.len(), 1);
            }
            other => panic!("unexpected operand: {:?}", other),
        }
    }

    #[test]
    fn try_with_catch_and_finally() {
        let node = serde_json::json!({
            "opCode": "try",
            "operand": {
                "tryBlock": [{"opCode": "nop"}],
                "catchBlocks": [
                    {"exceptionType": "DivisionByZero", "block": [{"opCode": "pop"}]},
                    {"block": [{"opCode": "nop"}]}
                ],
                "finallyBlock": [{"opCode": "nop"}]
            }
        });
        let instr = instruction_from_json(&node).unwrap();
        match instr.operand {
            Operand::Try(data) => {
                assert_eq!(data.catches.len(), 2);
                assert_eq!(data.catches[0].exception_type, "DivisionByZero");
                assert!(data.catches[1].exception_type.is_empty());
                assert_eq!(data.finally_block.len(), 1);
            }
            other => panic!("unexpected operand: {:?}", other),
        }
    }

    #[test]
    fn local_variable_spellings() {
        let json = r#"{"types": [{"kind": "class", "name": "P", "methods": [
            {"name": "A", "returnType": "void", "localVariables": [{"name": "x", "type": "int32"}]},
            {"name": "B", "returnType": "void", "LocalVariables": [{"name": "y", "type": "string"}]}
        ]}]}"#;
        let module = load_from_json(json).unwrap();
        assert_eq!(module.types[0].methods[0].locals[0].name, "x");
        assert_eq!(module.types[0].methods[1].locals[0].name, "y");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"{\"types\": []}");
        let content = decode_text(&bytes);
        assert!(load_from_json(&content).is_ok());
    }
}
