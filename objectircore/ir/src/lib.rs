//! Module model + instruction set + runtime values for ObjectIR
mod names;
mod value;

pub use names::{normalize_type_name, normalize_type_names, qualified_type_name, simple_type_name};
pub use value::{ArrayObj, ArrayRef, ClassId, HostData, ObjInstance, ObjectRef, Value};

use std::collections::HashMap;

use once_cell::sync::Lazy;

use objectir_common::{ErrorKind, IrError, Result};

// ============================================================================
// Type references
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Void,
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Char,
    Str,
    Object,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Int8 => "int8",
            Primitive::UInt8 => "uint8",
            Primitive::Int16 => "int16",
            Primitive::UInt16 => "uint16",
            Primitive::Int32 => "int32",
            Primitive::UInt32 => "uint32",
            Primitive::Int64 => "int64",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Char => "char",
            Primitive::Str => "string",
            Primitive::Object => "object",
        }
    }
}

/// A type spelling after normalization: a primitive, a named class, or an
/// array of either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(Primitive),
    Named(String),
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub const VOID: TypeRef = TypeRef::Primitive(Primitive::Void);
    pub const BOOL: TypeRef = TypeRef::Primitive(Primitive::Bool);
    pub const INT32: TypeRef = TypeRef::Primitive(Primitive::Int32);
    pub const INT64: TypeRef = TypeRef::Primitive(Primitive::Int64);
    pub const FLOAT32: TypeRef = TypeRef::Primitive(Primitive::Float32);
    pub const FLOAT64: TypeRef = TypeRef::Primitive(Primitive::Float64);
    pub const STRING: TypeRef = TypeRef::Primitive(Primitive::Str);
    pub const OBJECT: TypeRef = TypeRef::Primitive(Primitive::Object);

    /// Parses a raw spelling (aliases allowed, optional `[]` suffix) into a
    /// type reference.
    pub fn parse(raw: &str) -> TypeRef {
        let trimmed = raw.trim();
        if let Some(elem) = trimmed.strip_suffix("[]") {
            return TypeRef::Array(Box::new(TypeRef::parse(elem)));
        }
        let norm = normalize_type_name(trimmed);
        match norm.as_str() {
            "void" => TypeRef::Primitive(Primitive::Void),
            "bool" => TypeRef::Primitive(Primitive::Bool),
            "int8" => TypeRef::Primitive(Primitive::Int8),
            "uint8" => TypeRef::Primitive(Primitive::UInt8),
            "int16" => TypeRef::Primitive(Primitive::Int16),
            "uint16" => TypeRef::Primitive(Primitive::UInt16),
            "int32" => TypeRef::Primitive(Primitive::Int32),
            "uint32" => TypeRef::Primitive(Primitive::UInt32),
            "int64" => TypeRef::Primitive(Primitive::Int64),
            "uint64" => TypeRef::Primitive(Primitive::UInt64),
            "float32" => TypeRef::Primitive(Primitive::Float32),
            "float64" => TypeRef::Primitive(Primitive::Float64),
            "char" => TypeRef::Primitive(Primitive::Char),
            "string" => TypeRef::Primitive(Primitive::Str),
            "object" => TypeRef::Primitive(Primitive::Object),
            _ => TypeRef::Named(norm),
        }
    }

    /// Canonical spelling used in signatures and diagnostics.
    pub fn canonical_name(&self) -> String {
        match self {
            TypeRef::Primitive(p) => p.name().to_string(),
            TypeRef::Named(n) => n.clone(),
            TypeRef::Array(elem) => format!("{}[]", elem.canonical_name()),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Primitive(Primitive::Void))
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

// ============================================================================
// Module model
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub version: String,
    pub types: Vec<TypeDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub kind: TypeKind,
    pub name: String,
    pub namespace: String,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
}

impl TypeDef {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Class,
            name: name.into(),
            namespace: String::new(),
            base: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_sealed: false,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Namespace-qualified name; `name` may already carry dots, in which
    /// case it wins.
    pub fn qualified_name(&self) -> String {
        qualified_type_name(&self.name, &self.namespace)
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub is_static: bool,
    pub is_readonly: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, is_static: false, is_readonly: false }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub return_type: TypeRef,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    pub is_ctor: bool,
    pub params: Vec<Param>,
    pub locals: Vec<Param>,
    pub instructions: Vec<Instruction>,
    pub label_map: HashMap<String, usize>,
}

impl Method {
    pub fn new(name: impl Into<String>, return_type: TypeRef, is_static: bool) -> Self {
        Self {
            name: name.into(),
            return_type,
            is_static,
            is_virtual: false,
            is_override: false,
            is_abstract: false,
            is_ctor: false,
            params: Vec::new(),
            locals: Vec::new(),
            instructions: Vec::new(),
            label_map: HashMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.push(Param { name: name.into(), ty });
        self
    }

    pub fn has_instructions(&self) -> bool {
        !self.instructions.is_empty()
    }

    /// `Name(t1, t2) -> ret` form used in overload diagnostics.
    pub fn signature_text(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.canonical_name()).collect();
        format!("{}({}) -> {}", self.name, params.join(", "), self.return_type.canonical_name())
    }
}

// ============================================================================
// Instructions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Nop,
    Dup,
    Pop,
    LdNull,
    LdStr,
    LdC,
    LdTrue,
    LdFalse,
    LdI4,
    LdI8,
    LdR4,
    LdR8,
    LdLoc,
    StLoc,
    LdArg,
    StArg,
    LdFld,
    StFld,
    LdSFld,
    StSFld,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    Ceq,
    Cne,
    Clt,
    Cle,
    Cgt,
    Cge,
    NewObj,
    NewArr,
    LdElem,
    StElem,
    LdLen,
    CastClass,
    IsInst,
    Conv,
    Call,
    CallVirt,
    Ret,
    If,
    While,
    Break,
    Continue,
    Try,
    Throw,
    Br,
    BrTrue,
    BrFalse,
    Beq,
    Bne,
    Bgt,
    Bge,
    Blt,
    Ble,
}

static OPCODE_ALIASES: Lazy<HashMap<&'static str, OpCode>> = Lazy::new(|| {
    use OpCode::*;
    let mut m = HashMap::new();
    m.insert("nop", Nop);
    m.insert("dup", Dup);
    m.insert("pop", Pop);
    m.insert("ldnull", LdNull);
    m.insert("ldstr", LdStr);
    m.insert("ldc", LdC);
    m.insert("ldcon", LdC);
    m.insert("ldtrue", LdTrue);
    m.insert("ldfalse", LdFalse);
    m.insert("ldi4", LdI4);
    m.insert("ldi32", LdI4);
    m.insert("ldc.i4", LdI4);
    m.insert("ldi8", LdI8);
    m.insert("ldi64", LdI8);
    m.insert("ldc.i8", LdI8);
    m.insert("ldr4", LdR4);
    m.insert("ldc.r4", LdR4);
    m.insert("ldr8", LdR8);
    m.insert("ldc.r8", LdR8);
    m.insert("ldloc", LdLoc);
    m.insert("stloc", StLoc);
    m.insert("ldarg", LdArg);
    m.insert("starg", StArg);
    m.insert("ldfld", LdFld);
    m.insert("stfld", StFld);
    m.insert("ldsfld", LdSFld);
    m.insert("stsfld", StSFld);
    m.insert("add", Add);
    m.insert("sub", Sub);
    m.insert("mul", Mul);
    m.insert("div", Div);
    m.insert("rem", Rem);
    m.insert("neg", Neg);
    m.insert("not", Not);
    m.insert("ceq", Ceq);
    m.insert("cne", Cne);
    m.insert("clt", Clt);
    m.insert("cle", Cle);
    m.insert("cgt", Cgt);
    m.insert("cge", Cge);
    m.insert("newobj", NewObj);
    m.insert("newarr", NewArr);
    m.insert("ldelem", LdElem);
    m.insert("stelem", StElem);
    m.insert("ldlen", LdLen);
    m.insert("castclass", CastClass);
    m.insert("isinst", IsInst);
    m.insert("conv", Conv);
    m.insert("call", Call);
    m.insert("callvirt", CallVirt);
    m.insert("ret", Ret);
    m.insert("if", If);
    m.insert("while", While);
    m.insert("break", Break);
    m.insert("continue", Continue);
    m.insert("try", Try);
    m.insert("throw", Throw);
    m.insert("br", Br);
    m.insert("br.s", Br);
    m.insert("brtrue", BrTrue);
    m.insert("brtrue.s", BrTrue);
    m.insert("brfalse", BrFalse);
    m.insert("brfalse.s", BrFalse);
    m.insert("beq", Beq);
    m.insert("beq.s", Beq);
    m.insert("bne", Bne);
    m.insert("bne.s", Bne);
    m.insert("bne.un", Bne);
    m.insert("bgt", Bgt);
    m.insert("bgt.s", Bgt);
    m.insert("bgt.un", Bgt);
    m.insert("bge", Bge);
    m.insert("bge.s", Bge);
    m.insert("bge.un", Bge);
    m.insert("blt", Blt);
    m.insert("blt.s", Blt);
    m.insert("blt.un", Blt);
    m.insert("ble", Ble);
    m.insert("ble.s", Ble);
    m.insert("ble.un", Ble);
    m
});

impl OpCode {
    /// Folds alias spellings (`ldc.i4`, `br.s`, `bne.un`, …) into the
    /// canonical opcode. Unknown spellings are rejected here so the
    /// interpreter never sees them.
    pub fn parse(raw: &str) -> Result<OpCode> {
        let lower = raw.trim().to_ascii_lowercase();
        OPCODE_ALIASES
            .get(lower.as_str())
            .copied()
            .ok_or_else(|| IrError::new(ErrorKind::UnknownOpcode, format!("Unknown opcode: {}", raw)))
    }

    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Nop => "nop",
            Dup => "dup",
            Pop => "pop",
            LdNull => "ldnull",
            LdStr => "ldstr",
            LdC => "ldc",
            LdTrue => "ldtrue",
            LdFalse => "ldfalse",
            LdI4 => "ldi4",
            LdI8 => "ldi8",
            LdR4 => "ldr4",
            LdR8 => "ldr8",
            LdLoc => "ldloc",
            StLoc => "stloc",
            LdArg => "ldarg",
            StArg => "starg",
            LdFld => "ldfld",
            StFld => "stfld",
            LdSFld => "ldsfld",
            StSFld => "stsfld",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Rem => "rem",
            Neg => "neg",
            Not => "not",
            Ceq => "ceq",
            Cne => "cne",
            Clt => "clt",
            Cle => "cle",
            Cgt => "cgt",
            Cge => "cge",
            NewObj => "newobj",
            NewArr => "newarr",
            LdElem => "ldelem",
            StElem => "stelem",
            LdLen => "ldlen",
            CastClass => "castclass",
            IsInst => "isinst",
            Conv => "conv",
            Call => "call",
            CallVirt => "callvirt",
            Ret => "ret",
            If => "if",
            While => "while",
            Break => "break",
            Continue => "continue",
            Try => "try",
            Throw => "throw",
            Br => "br",
            BrTrue => "brtrue",
            BrFalse => "brfalse",
            Beq => "beq",
            Bne => "bne",
            Bgt => "bgt",
            Bge => "bge",
            Blt => "blt",
            Ble => "ble",
        }
    }

    pub fn is_branch(&self) -> bool {
        use OpCode::*;
        matches!(self, Br | BrTrue | BrFalse | Beq | Bne | Bgt | Bge | Blt | Ble)
    }

    pub fn is_comparison(&self) -> bool {
        use OpCode::*;
        matches!(self, Ceq | Cne | Clt | Cle | Cgt | Cge)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Call-site metadata for `call`/`callvirt`. Type names are normalized at
/// construction so signature keys compare cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub declaring_type: String,
    pub name: String,
    pub return_type: String,
    pub parameter_types: Vec<String>,
}

impl CallTarget {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        return_type: &str,
        parameter_types: &[&str],
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            return_type: normalize_type_name(return_type),
            parameter_types: parameter_types.iter().map(|t| normalize_type_name(t)).collect(),
        }
    }

    pub fn is_void_return(&self) -> bool {
        self.return_type.is_empty() || self.return_type == "void"
    }

    /// Registry key form: `DeclaringType.Name(t1,t2)`.
    pub fn signature_key(&self) -> String {
        format!("{}.{}({})", self.declaring_type, self.name, self.parameter_types.join(","))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTarget {
    pub declaring_type: String,
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BranchTarget {
    Label(String),
    Index(usize),
}

/// The four condition shapes accepted by `if`/`while`: empty (pop the
/// stack), binary (comparison over two operand streams), expression
/// (one instruction pushing the bool), block (a sub-sequence leaving
/// the bool on the stack).
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Stack,
    Binary { op: OpCode, left: Vec<Instruction>, right: Vec<Instruction> },
    Expression(Box<Instruction>),
    Block(Vec<Instruction>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfData {
    /// Defaults to `Condition::Stack` (the producer already pushed the
    /// bool) when the module carries no condition node.
    pub condition: Condition,
    pub then_block: Vec<Instruction>,
    pub else_block: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileData {
    pub condition: Condition,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchBlock {
    /// Empty means "catch any".
    pub exception_type: String,
    pub block: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryData {
    pub try_block: Vec<Instruction>,
    pub catches: Vec<CatchBlock>,
    pub finally_block: Vec<Instruction>,
}

/// Per-instruction operand payload; the shape depends on the opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// Local/argument name (`ldloc`, `stloc`, `starg`, named `ldarg`).
    Name(String),
    /// Positional `ldarg`.
    Index(usize),
    /// Raw constant for `ldc`/`ldstr`: the unparsed text plus its
    /// normalized type name; `is_null` for `ldc` with a null value.
    Const { value: String, ty: String, is_null: bool },
    Int(i64),
    Float(f64),
    Field(FieldTarget),
    StaticField { declaring_type: String, name: String },
    /// `newobj`, `newarr`, `castclass`, `isinst`, `conv`.
    TypeName(String),
    Call(CallTarget),
    Branch(BranchTarget),
    If(IfData),
    While(WhileData),
    Try(TryData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: OpCode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(op: OpCode) -> Self {
        Self { op, operand: Operand::None }
    }

    pub fn with(op: OpCode, operand: Operand) -> Self {
        Self { op, operand }
    }
}
