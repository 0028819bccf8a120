//! Host standard library for ObjectIR: Console, String, Convert, Math and
//! the generic collections, exposed through a signature-keyed registry.

use std::collections::HashMap;
use std::io::Write;

use objectir_common::Result;
use objectir_ir::{ObjectRef, TypeDef, Value};

mod collections;
mod console;
mod convert;
mod math;
mod strings;

/// Replaceable sink for console output; tests redirect this.
pub type OutputFn = Box<dyn FnMut(&str)>;

/// Runtime surface handed to every native method.
pub struct HostIo {
    output: Option<OutputFn>,
}

impl HostIo {
    pub fn new() -> Self {
        Self { output: None }
    }

    pub fn set_output(&mut self, output: OutputFn) {
        self.output = Some(output);
    }

    pub fn write(&mut self, text: &str) {
        match &mut self.output {
            Some(f) => f(text),
            None => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
        }
    }
}

impl Default for HostIo {
    fn default() -> Self {
        Self::new()
    }
}

/// Native method implementation: (optional `this`, argument list, host I/O).
pub type NativeFn = fn(Option<&ObjectRef>, &[Value], &mut HostIo) -> Result<Value>;

/// Maps normalized signature keys (`System.Math.Sqrt(float64)`) to native
/// implementations. Consulted by `call`/`callvirt` once a method without a
/// body has been resolved.
#[derive(Default)]
pub struct HostRegistry {
    methods: HashMap<String, NativeFn>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self { methods: HashMap::new() }
    }

    pub fn register(&mut self, signature: &str, f: NativeFn) {
        self.methods.insert(signature.to_string(), f);
    }

    pub fn get(&self, signature: &str) -> Option<NativeFn> {
        self.methods.get(signature).copied()
    }

    pub fn has(&self, signature: &str) -> bool {
        self.methods.contains_key(signature)
    }
}

/// Class definitions for the standard library, loaded into the class
/// registry so overload resolution sees the native surface.
pub fn stdlib_types() -> Vec<TypeDef> {
    let mut types = Vec::new();
    types.push(console::class());
    types.push(strings::class());
    types.push(convert::class());
    types.push(math::class());
    types.extend(collections::classes());
    types
}

/// Registers every native implementation under its signature key.
pub fn register_objects(reg: &mut HostRegistry) {
    console::register(reg);
    strings::register(reg);
    convert::register(reg);
    math::register(reg);
    collections::register(reg);
}

// --- shared argument coercion helpers ---

pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

pub(crate) fn to_f64(v: &Value) -> f64 {
    match v {
        Value::Int32(i) => *i as f64,
        Value::Int64(i) => *i as f64,
        Value::Float32(x) => *x as f64,
        Value::Float64(x) => *x,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Str(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub(crate) fn to_i64(v: &Value) -> i64 {
    match v {
        Value::Int32(i) => *i as i64,
        Value::Int64(i) => *i,
        Value::Float32(x) => x.trunc() as i64,
        Value::Float64(x) => x.trunc() as i64,
        Value::Bool(b) => {
            if *b {
                1
            } else {
                0
            }
        }
        Value::Str(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn to_i32(v: &Value) -> i32 {
    to_i64(v) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_round_trip() {
        fn one(_this: Option<&ObjectRef>, _args: &[Value], _io: &mut HostIo) -> Result<Value> {
            Ok(Value::Int32(1))
        }
        let mut reg = HostRegistry::new();
        reg.register("Demo.One()", one);
        assert!(reg.has("Demo.One()"));
        assert!(reg.get("Demo.Missing()").is_none());
        let f = reg.get("Demo.One()").unwrap();
        let mut io = HostIo::new();
        assert_eq!(f(None, &[], &mut io).unwrap(), Value::Int32(1));
    }

    #[test]
    fn stdlib_has_the_expected_classes() {
        let names: Vec<String> = stdlib_types().iter().map(|t| t.qualified_name()).collect();
        for expected in [
            "System.Console",
            "System.String",
            "System.Convert",
            "System.Math",
            "System.Collections.Generic.List`1",
            "System.Collections.Generic.Dictionary`2",
            "System.Collections.Generic.Queue`1",
            "System.Collections.Generic.Stack`1",
            "System.Collections.Generic.HashSet`1",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }
}
