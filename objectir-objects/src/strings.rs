//! System.String helpers: Concat, IsNullOrEmpty, Length, Substring.

use objectir_common::Result;
use objectir_ir::{Method, ObjectRef, TypeDef, TypeRef, Value};

use crate::{arg, to_i32, HostIo, HostRegistry};

pub(crate) fn class() -> TypeDef {
    let mut c = TypeDef::class("String");
    c.namespace = "System".to_string();

    c.methods.push(
        Method::new("Concat", TypeRef::STRING, true)
            .param("str0", TypeRef::STRING)
            .param("str1", TypeRef::STRING),
    );
    c.methods.push(Method::new("IsNullOrEmpty", TypeRef::BOOL, true).param("value", TypeRef::STRING));
    c.methods.push(Method::new("Length", TypeRef::INT32, true).param("value", TypeRef::STRING));
    c.methods.push(
        Method::new("Substring", TypeRef::STRING, true)
            .param("value", TypeRef::STRING)
            .param("startIndex", TypeRef::INT32)
            .param("length", TypeRef::INT32),
    );
    c
}

pub(crate) fn register(reg: &mut HostRegistry) {
    reg.register("System.String.Concat(string,string)", concat);
    reg.register("System.String.IsNullOrEmpty(string)", is_null_or_empty);
    reg.register("System.String.Length(string)", length);
    reg.register("System.String.Substring(string,int32,int32)", substring);
}

fn as_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

fn concat(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    Ok(Value::Str(format!("{}{}", as_text(&arg(args, 0)), as_text(&arg(args, 1)))))
}

fn is_null_or_empty(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let empty = match args.first() {
        Some(Value::Str(s)) => s.is_empty(),
        Some(Value::Null) | None => true,
        Some(_) => true,
    };
    Ok(Value::Bool(empty))
}

fn length(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    match args.first() {
        Some(Value::Str(s)) => Ok(Value::Int32(s.chars().count() as i32)),
        _ => Ok(Value::Int32(0)),
    }
}

fn substring(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let s = as_text(&arg(args, 0));
    let start = to_i32(&arg(args, 1));
    let length = to_i32(&arg(args, 2));
    let total = s.chars().count() as i32;
    if start < 0 || start >= total || length <= 0 {
        return Ok(Value::Str(String::new()));
    }
    let out: String = s.chars().skip(start as usize).take(length as usize).collect();
    Ok(Value::Str(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_treats_null_as_empty() {
        let mut io = HostIo::new();
        let v = concat(None, &[Value::Null, Value::Str("b".to_string())], &mut io).unwrap();
        assert_eq!(v, Value::Str("b".to_string()));
    }

    #[test]
    fn substring_clamps_and_counts_chars() {
        let mut io = HostIo::new();
        let s = Value::Str("hello".to_string());
        let v = substring(None, &[s.clone(), Value::Int32(1), Value::Int32(3)], &mut io).unwrap();
        assert_eq!(v, Value::Str("ell".to_string()));
        let v = substring(None, &[s, Value::Int32(9), Value::Int32(3)], &mut io).unwrap();
        assert_eq!(v, Value::Str(String::new()));
    }

    #[test]
    fn is_null_or_empty_cases() {
        let mut io = HostIo::new();
        assert_eq!(is_null_or_empty(None, &[Value::Null], &mut io).unwrap(), Value::Bool(true));
        assert_eq!(
            is_null_or_empty(None, &[Value::Str(String::new())], &mut io).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            is_null_or_empty(None, &[Value::Str("x".to_string())], &mut io).unwrap(),
            Value::Bool(false)
        );
    }
}
