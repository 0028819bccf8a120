//! System.Convert: conversions between string, the numeric types and bool.
//! Unparsable input falls back to zero/false rather than raising.

use objectir_common::Result;
use objectir_ir::{Method, ObjectRef, TypeDef, TypeRef, Value};

use crate::{arg, HostIo, HostRegistry};

pub(crate) fn class() -> TypeDef {
    let mut c = TypeDef::class("Convert");
    c.namespace = "System".to_string();
    c.is_abstract = true;

    for ty in [TypeRef::INT32, TypeRef::INT64, TypeRef::FLOAT64, TypeRef::FLOAT32, TypeRef::BOOL] {
        c.methods.push(Method::new("ToString", TypeRef::STRING, true).param("value", ty));
    }
    c.methods.push(Method::new("ToInt32", TypeRef::INT32, true).param("value", TypeRef::STRING));
    c.methods.push(Method::new("ToInt64", TypeRef::INT64, true).param("value", TypeRef::STRING));
    c.methods.push(Method::new("ToDouble", TypeRef::FLOAT64, true).param("value", TypeRef::STRING));
    c.methods.push(Method::new("ToSingle", TypeRef::FLOAT32, true).param("value", TypeRef::STRING));
    c.methods.push(Method::new("ToBoolean", TypeRef::BOOL, true).param("value", TypeRef::STRING));
    c
}

pub(crate) fn register(reg: &mut HostRegistry) {
    for sig in [
        "System.Convert.ToString(int32)",
        "System.Convert.ToString(int64)",
        "System.Convert.ToString(float64)",
        "System.Convert.ToString(float32)",
        "System.Convert.ToString(bool)",
    ] {
        reg.register(sig, to_string);
    }
    reg.register("System.Convert.ToInt32(string)", to_int32);
    reg.register("System.Convert.ToInt64(string)", to_int64);
    reg.register("System.Convert.ToDouble(string)", to_double);
    reg.register("System.Convert.ToSingle(string)", to_single);
    reg.register("System.Convert.ToBoolean(string)", to_boolean);
}

fn to_string(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    match args.first() {
        Some(Value::Null) | None => Ok(Value::Str(String::new())),
        Some(v) => Ok(Value::Str(v.to_string())),
    }
}

fn to_int32(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let v = match &arg(args, 0) {
        Value::Int32(i) => *i,
        Value::Int64(i) => *i as i32,
        Value::Float32(x) => x.trunc() as i32,
        Value::Float64(x) => x.trunc() as i32,
        Value::Bool(b) => *b as i32,
        Value::Str(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(Value::Int32(v))
}

fn to_int64(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    Ok(Value::Int64(crate::to_i64(&arg(args, 0))))
}

fn to_double(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    Ok(Value::Float64(crate::to_f64(&arg(args, 0))))
}

fn to_single(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    Ok(Value::Float32(crate::to_f64(&arg(args, 0)) as f32))
}

fn to_boolean(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let v = match &arg(args, 0) {
        Value::Bool(b) => *b,
        Value::Int32(i) => *i != 0,
        Value::Int64(i) => *i != 0,
        Value::Str(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    };
    Ok(Value::Bool(v))
}
