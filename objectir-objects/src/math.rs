//! System.Math: constants, trig, hyperbolic, exponential, rounding,
//! sign/abs, min/max.

use objectir_common::Result;
use objectir_ir::{Method, ObjectRef, TypeDef, TypeRef, Value};

use crate::{arg, to_f64, to_i32, HostIo, HostRegistry};

pub(crate) fn class() -> TypeDef {
    let mut c = TypeDef::class("Math");
    c.namespace = "System".to_string();
    c.is_abstract = true;

    for name in ["PI", "E", "Tau"] {
        c.methods.push(Method::new(name, TypeRef::FLOAT64, true));
    }

    for name in [
        "Sin", "Cos", "Tan", "Asin", "Acos", "Atan", "Sinh", "Cosh", "Tanh", "Exp", "Log",
        "Log10", "Sqrt", "Ceiling", "Floor", "Round", "Truncate", "Abs",
    ] {
        c.methods.push(Method::new(name, TypeRef::FLOAT64, true).param("value", TypeRef::FLOAT64));
    }

    c.methods.push(
        Method::new("Atan2", TypeRef::FLOAT64, true)
            .param("y", TypeRef::FLOAT64)
            .param("x", TypeRef::FLOAT64),
    );
    c.methods.push(
        Method::new("Log", TypeRef::FLOAT64, true)
            .param("value", TypeRef::FLOAT64)
            .param("newBase", TypeRef::FLOAT64),
    );
    c.methods.push(
        Method::new("Pow", TypeRef::FLOAT64, true)
            .param("x", TypeRef::FLOAT64)
            .param("y", TypeRef::FLOAT64),
    );
    c.methods.push(
        Method::new("Round", TypeRef::FLOAT64, true)
            .param("value", TypeRef::FLOAT64)
            .param("digits", TypeRef::INT32),
    );
    c.methods.push(Method::new("Sign", TypeRef::INT32, true).param("value", TypeRef::FLOAT64));
    c.methods.push(
        Method::new("Min", TypeRef::FLOAT64, true)
            .param("val1", TypeRef::FLOAT64)
            .param("val2", TypeRef::FLOAT64),
    );
    c.methods.push(
        Method::new("Max", TypeRef::FLOAT64, true)
            .param("val1", TypeRef::FLOAT64)
            .param("val2", TypeRef::FLOAT64),
    );
    c
}

pub(crate) fn register(reg: &mut HostRegistry) {
    reg.register("System.Math.PI()", |_, _, _| Ok(Value::Float64(std::f64::consts::PI)));
    reg.register("System.Math.E()", |_, _, _| Ok(Value::Float64(std::f64::consts::E)));
    reg.register("System.Math.Tau()", |_, _, _| Ok(Value::Float64(std::f64::consts::TAU)));

    reg.register("System.Math.Sin(float64)", |_, a, _| unary(a, f64::sin));
    reg.register("System.Math.Cos(float64)", |_, a, _| unary(a, f64::cos));
    reg.register("System.Math.Tan(float64)", |_, a, _| unary(a, f64::tan));
    reg.register("System.Math.Asin(float64)", |_, a, _| unary(a, f64::asin));
    reg.register("System.Math.Acos(float64)", |_, a, _| unary(a, f64::acos));
    reg.register("System.Math.Atan(float64)", |_, a, _| unary(a, f64::atan));
    reg.register("System.Math.Atan2(float64,float64)", |_, a, _| binary(a, f64::atan2));
    reg.register("System.Math.Sinh(float64)", |_, a, _| unary(a, f64::sinh));
    reg.register("System.Math.Cosh(float64)", |_, a, _| unary(a, f64::cosh));
    reg.register("System.Math.Tanh(float64)", |_, a, _| unary(a, f64::tanh));
    reg.register("System.Math.Exp(float64)", |_, a, _| unary(a, f64::exp));
    reg.register("System.Math.Log(float64)", |_, a, _| unary(a, f64::ln));
    reg.register("System.Math.Log(float64,float64)", |_, a, _| {
        binary(a, |v, base| v.ln() / base.ln())
    });
    reg.register("System.Math.Log10(float64)", |_, a, _| unary(a, f64::log10));
    reg.register("System.Math.Pow(float64,float64)", |_, a, _| binary(a, f64::powf));
    reg.register("System.Math.Sqrt(float64)", |_, a, _| unary(a, f64::sqrt));
    reg.register("System.Math.Ceiling(float64)", |_, a, _| unary(a, f64::ceil));
    reg.register("System.Math.Floor(float64)", |_, a, _| unary(a, f64::floor));
    reg.register("System.Math.Round(float64)", |_, a, _| unary(a, f64::round));
    reg.register("System.Math.Round(float64,int32)", math_round_digits);
    reg.register("System.Math.Truncate(float64)", |_, a, _| unary(a, f64::trunc));
    reg.register("System.Math.Abs(float64)", |_, a, _| unary(a, f64::abs));
    reg.register("System.Math.Sign(float64)", math_sign);
    reg.register("System.Math.Min(float64,float64)", |_, a, _| binary(a, f64::min));
    reg.register("System.Math.Max(float64,float64)", |_, a, _| binary(a, f64::max));
}

fn unary(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value> {
    Ok(Value::Float64(f(to_f64(&arg(args, 0)))))
}

fn binary(args: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    Ok(Value::Float64(f(to_f64(&arg(args, 0)), to_f64(&arg(args, 1)))))
}

fn math_round_digits(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let value = to_f64(&arg(args, 0));
    let digits = to_i32(&arg(args, 1));
    let factor = 10f64.powi(digits);
    Ok(Value::Float64((value * factor).round() / factor))
}

fn math_sign(_this: Option<&ObjectRef>, args: &[Value], _io: &mut HostIo) -> Result<Value> {
    let value = to_f64(&arg(args, 0));
    let sign = if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    };
    Ok(Value::Int32(sign))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_and_pow() {
        let mut reg = HostRegistry::new();
        register(&mut reg);
        let mut io = HostIo::new();

        let sqrt = reg.get("System.Math.Sqrt(float64)").unwrap();
        let v = sqrt(None, &[Value::Float64(9.0)], &mut io).unwrap();
        assert_eq!(v, Value::Float64(3.0));

        let pow = reg.get("System.Math.Pow(float64,float64)").unwrap();
        let v = pow(None, &[Value::Float64(2.0), Value::Float64(10.0)], &mut io).unwrap();
        assert_eq!(v, Value::Float64(1024.0));
    }

    #[test]
    fn round_with_digits() {
        let mut io = HostIo::new();
        let v = math_round_digits(None, &[Value::Float64(3.14159), Value::Int32(2)], &mut io).unwrap();
        assert_eq!(v, Value::Float64(3.14));
    }

    #[test]
    fn sign_of_each_region() {
        let mut io = HostIo::new();
        assert_eq!(math_sign(None, &[Value::Float64(5.0)], &mut io).unwrap(), Value::Int32(1));
        assert_eq!(math_sign(None, &[Value::Float64(-0.5)], &mut io).unwrap(), Value::Int32(-1));
        assert_eq!(math_sign(None, &[Value::Float64(0.0)], &mut io).unwrap(), Value::Int32(0));
    }
}
