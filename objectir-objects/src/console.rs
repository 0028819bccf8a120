//! System.Console: line-oriented output through the replaceable sink,
//! blocking line input.

use objectir_common::Result;
use objectir_ir::{Method, ObjectRef, TypeDef, TypeRef, Value};

use crate::{arg, HostIo, HostRegistry};

pub(crate) fn class() -> TypeDef {
    let mut c = TypeDef::class("Console");
    c.namespace = "System".to_string();
    c.is_abstract = true;

    for ty in [TypeRef::STRING, TypeRef::INT32, TypeRef::INT64, TypeRef::FLOAT64, TypeRef::FLOAT32, TypeRef::BOOL] {
        c.methods.push(Method::new("WriteLine", TypeRef::VOID, true).param("value", ty));
    }
    c.methods.push(Method::new("WriteLine", TypeRef::VOID, true));

    for ty in [TypeRef::STRING, TypeRef::INT32, TypeRef::FLOAT64, TypeRef::FLOAT32] {
        c.methods.push(Method::new("Write", TypeRef::VOID, true).param("value", ty));
    }

    c.methods.push(Method::new("ReadLine", TypeRef::STRING, true));
    c
}

pub(crate) fn register(reg: &mut HostRegistry) {
    for sig in [
        "System.Console.WriteLine(string)",
        "System.Console.WriteLine(int32)",
        "System.Console.WriteLine(int64)",
        "System.Console.WriteLine(float64)",
        "System.Console.WriteLine(float32)",
        "System.Console.WriteLine(bool)",
    ] {
        reg.register(sig, write_line);
    }
    reg.register("System.Console.WriteLine()", write_empty_line);

    for sig in [
        "System.Console.Write(string)",
        "System.Console.Write(int32)",
        "System.Console.Write(float64)",
        "System.Console.Write(float32)",
    ] {
        reg.register(sig, write);
    }

    reg.register("System.Console.ReadLine()", read_line);
}

/// Null prints as an empty line rather than the literal "null".
fn display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn write_line(_this: Option<&ObjectRef>, args: &[Value], io: &mut HostIo) -> Result<Value> {
    let mut line = String::new();
    for (i, v) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&display(v));
    }
    line.push('\n');
    io.write(&line);
    Ok(Value::Null)
}

fn write_empty_line(_this: Option<&ObjectRef>, _args: &[Value], io: &mut HostIo) -> Result<Value> {
    io.write("\n");
    Ok(Value::Null)
}

fn write(_this: Option<&ObjectRef>, args: &[Value], io: &mut HostIo) -> Result<Value> {
    io.write(&display(&arg(args, 0)));
    Ok(Value::Null)
}

fn read_line(_this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let mut input = String::new();
    match std::io::stdin().read_line(&mut input) {
        Ok(0) => Ok(Value::Str(String::new())),
        Ok(_) => {
            while input.ends_with('\n') || input.ends_with('\r') {
                input.pop();
            }
            Ok(Value::Str(input))
        }
        Err(_) => Ok(Value::Str(String::new())),
    }
}
