//! Value coercions and mixed-operand arithmetic/comparison rules.

use objectir_common::{ErrorKind, IrError, Result};
use objectir_ir::{normalize_type_name, OpCode, Value};

/// Truthiness: null is false, numbers by non-zero (floats against their
/// precision's epsilon), strings by non-emptiness, objects always true.
pub fn to_bool(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int32(i) => *i != 0,
        Value::Int64(i) => *i != 0,
        Value::Float32(x) => x.abs() > f32::EPSILON,
        Value::Float64(x) => x.abs() > f64::EPSILON,
        Value::Str(s) => !s.is_empty(),
        Value::Object(_) | Value::Array(_) => true,
    }
}

pub fn to_i64(v: &Value) -> Result<i64> {
    match v {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(*b as i64),
        Value::Int32(i) => Ok(*i as i64),
        Value::Int64(i) => Ok(*i),
        Value::Float32(x) => Ok(x.trunc() as i64),
        Value::Float64(x) => Ok(x.trunc() as i64),
        Value::Str(s) => s.trim().parse().map_err(|_| {
            IrError::new(ErrorKind::TypeMismatch, format!("Cannot convert '{}' to int64", s))
        }),
        other => Err(IrError::new(
            ErrorKind::TypeMismatch,
            format!("Cannot convert {} to int64", other.type_name()),
        )),
    }
}

pub fn to_f64(v: &Value) -> Result<f64> {
    match v {
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Int32(i) => Ok(*i as f64),
        Value::Int64(i) => Ok(*i as f64),
        Value::Float32(x) => Ok(*x as f64),
        Value::Float64(x) => Ok(*x),
        Value::Str(s) => s.trim().parse().map_err(|_| {
            IrError::new(ErrorKind::TypeMismatch, format!("Cannot convert '{}' to float64", s))
        }),
        other => Err(IrError::new(
            ErrorKind::TypeMismatch,
            format!("Cannot convert {} to float64", other.type_name()),
        )),
    }
}

/// Explicit conversion (`conv`, Convert.*): dispatch on the normalized
/// target type name.
pub fn convert_to(v: &Value, target: &str) -> Result<Value> {
    let target = normalize_type_name(target);
    match target.as_str() {
        "bool" => Ok(Value::Bool(to_bool(v))),
        "int8" => Ok(Value::Int32(to_i64(v)? as i8 as i32)),
        "uint8" => Ok(Value::Int32(to_i64(v)? as u8 as i32)),
        "int16" => Ok(Value::Int32(to_i64(v)? as i16 as i32)),
        "uint16" => Ok(Value::Int32(to_i64(v)? as u16 as i32)),
        "int32" | "uint32" => Ok(Value::Int32(to_i64(v)? as i32)),
        "int64" | "uint64" => Ok(Value::Int64(to_i64(v)?)),
        "float32" => Ok(Value::Float32(to_f64(v)? as f32)),
        "float64" => Ok(Value::Float64(to_f64(v)?)),
        "string" => Ok(Value::Str(match v {
            Value::Null => String::new(),
            other => other.to_string(),
        })),
        "char" => Ok(Value::Str(v.to_string().chars().next().map(String::from).unwrap_or_default())),
        "object" => Ok(v.clone()),
        other => Err(IrError::new(
            ErrorKind::TypeMismatch,
            format!("Unsupported conversion target: {}", other),
        )),
    }
}

fn float_involved(a: &Value, b: &Value) -> bool {
    a.is_float() || b.is_float() || matches!(a, Value::Str(_)) || matches!(b, Value::Str(_))
}

/// Binary arithmetic. Mixed operands promote to float64 when either side
/// is a float or a string; otherwise the operation runs in int64.
pub fn arithmetic(op: OpCode, a: &Value, b: &Value) -> Result<Value> {
    if float_involved(a, b) {
        let x = to_f64(a)?;
        let y = to_f64(b)?;
        return match op {
            OpCode::Add => Ok(Value::Float64(x + y)),
            OpCode::Sub => Ok(Value::Float64(x - y)),
            OpCode::Mul => Ok(Value::Float64(x * y)),
            // IEEE 754: division by zero yields an infinity or NaN.
            OpCode::Div => Ok(Value::Float64(x / y)),
            OpCode::Rem => Err(IrError::new(
                ErrorKind::TypeMismatch,
                "Modulo operation not supported for floating point",
            )),
            _ => Err(IrError::new(ErrorKind::Host, format!("Not an arithmetic opcode: {}", op))),
        };
    }

    let x = to_i64(a)?;
    let y = to_i64(b)?;
    match op {
        OpCode::Add => Ok(Value::Int64(x.wrapping_add(y))),
        OpCode::Sub => Ok(Value::Int64(x.wrapping_sub(y))),
        OpCode::Mul => Ok(Value::Int64(x.wrapping_mul(y))),
        OpCode::Div => {
            if y == 0 {
                return Err(IrError::new(ErrorKind::DivisionByZero, "Division by zero"));
            }
            Ok(Value::Int64(x.wrapping_div(y)))
        }
        OpCode::Rem => {
            if y == 0 {
                return Err(IrError::new(ErrorKind::DivisionByZero, "Division by zero"));
            }
            Ok(Value::Int64(x.wrapping_rem(y)))
        }
        _ => Err(IrError::new(ErrorKind::Host, format!("Not an arithmetic opcode: {}", op))),
    }
}

pub fn negate(v: &Value) -> Result<Value> {
    match v {
        Value::Int32(i) => Ok(Value::Int32(i.wrapping_neg())),
        Value::Int64(i) => Ok(Value::Int64(i.wrapping_neg())),
        Value::Float32(x) => Ok(Value::Float32(-x)),
        Value::Float64(x) => Ok(Value::Float64(-x)),
        other => Err(IrError::new(
            ErrorKind::TypeMismatch,
            format!("Cannot negate {}", other.type_name()),
        )),
    }
}

/// Comparison semantics shared by `ceq`..`cge` and the conditional
/// branches: strings compare ordinally, bools support only
/// equality/inequality, two integers compare in int64, anything else
/// drops to float64.
pub fn compare(op: OpCode, a: &Value, b: &Value) -> Result<bool> {
    use std::cmp::Ordering;

    let equality = matches!(op, OpCode::Ceq | OpCode::Cne | OpCode::Beq | OpCode::Bne);
    let has_reference = matches!(a, Value::Object(_) | Value::Array(_))
        || matches!(b, Value::Object(_) | Value::Array(_));

    if equality {
        match (a, b) {
            (Value::Null, Value::Null) => return Ok(is_eq(op)),
            (Value::Null, Value::Str(_)) | (Value::Str(_), Value::Null) => return Ok(!is_eq(op)),
            _ if has_reference => return Ok(is_eq(op) == (a == b)),
            _ => {}
        }
    } else if has_reference {
        return Err(IrError::new(
            ErrorKind::TypeMismatch,
            "Objects support only equality comparisons",
        ));
    }

    match (a, b) {
        (Value::Str(x), Value::Str(y)) => {
            let ord = x.cmp(y);
            Ok(ordering_satisfies(op, ord))
        }
        (Value::Bool(x), Value::Bool(y)) => match op {
            OpCode::Ceq | OpCode::Beq => Ok(x == y),
            OpCode::Cne | OpCode::Bne => Ok(x != y),
            _ => Err(IrError::new(
                ErrorKind::TypeMismatch,
                "Bool comparisons support only equality",
            )),
        },
        _ if a.is_integer() && b.is_integer() => {
            let ord = to_i64(a)?.cmp(&to_i64(b)?);
            Ok(ordering_satisfies(op, ord))
        }
        _ => {
            let x = to_f64(a)?;
            let y = to_f64(b)?;
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            Ok(ordering_satisfies(op, ord))
        }
    }
}

fn is_eq(op: OpCode) -> bool {
    matches!(op, OpCode::Ceq | OpCode::Beq)
}

fn ordering_satisfies(op: OpCode, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        OpCode::Ceq | OpCode::Beq => ord == Equal,
        OpCode::Cne | OpCode::Bne => ord != Equal,
        OpCode::Clt | OpCode::Blt => ord == Less,
        OpCode::Cle | OpCode::Ble => ord != Greater,
        OpCode::Cgt | OpCode::Bgt => ord == Greater,
        OpCode::Cge | OpCode::Bge => ord != Less,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!to_bool(&Value::Null));
        assert!(!to_bool(&Value::Int32(0)));
        assert!(to_bool(&Value::Int64(-3)));
        assert!(!to_bool(&Value::Float64(0.0)));
        assert!(to_bool(&Value::Float64(0.5)));
        assert!(!to_bool(&Value::Str(String::new())));
        assert!(to_bool(&Value::Str("x".into())));
    }

    #[test]
    fn string_parse_failures_are_type_mismatch() {
        let err = to_i64(&Value::Str("twelve".into())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(to_i64(&Value::Str(" 12 ".into())).unwrap(), 12);
        assert_eq!(to_f64(&Value::Str("2.5".into())).unwrap(), 2.5);
    }

    #[test]
    fn integer_arithmetic_runs_in_int64() {
        let v = arithmetic(OpCode::Add, &Value::Int32(2), &Value::Int32(3)).unwrap();
        assert_eq!(v, Value::Int64(5));
        let v = arithmetic(OpCode::Mul, &Value::Int64(4), &Value::Int32(3)).unwrap();
        assert_eq!(v, Value::Int64(12));
    }

    #[test]
    fn float_or_string_operand_promotes_to_float64() {
        let v = arithmetic(OpCode::Add, &Value::Int32(1), &Value::Float64(0.5)).unwrap();
        assert_eq!(v, Value::Float64(1.5));
        let v = arithmetic(OpCode::Mul, &Value::Str("2".into()), &Value::Int32(3)).unwrap();
        assert_eq!(v, Value::Float64(6.0));
    }

    #[test]
    fn integer_division_by_zero_raises() {
        let err = arithmetic(OpCode::Div, &Value::Int32(1), &Value::Int32(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn float_division_by_zero_follows_ieee() {
        let v = arithmetic(OpCode::Div, &Value::Float64(1.0), &Value::Float64(0.0)).unwrap();
        assert_eq!(v, Value::Float64(f64::INFINITY));
    }

    #[test]
    fn float_remainder_is_unsupported() {
        let err = arithmetic(OpCode::Rem, &Value::Float64(5.0), &Value::Float64(2.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn string_comparison_is_ordinal() {
        assert!(compare(OpCode::Clt, &Value::Str("a".into()), &Value::Str("b".into())).unwrap());
        assert!(compare(OpCode::Ceq, &Value::Str("x".into()), &Value::Str("x".into())).unwrap());
        // Ordinal, not case-folded: 'B' < 'a'.
        assert!(compare(OpCode::Clt, &Value::Str("B".into()), &Value::Str("a".into())).unwrap());
    }

    #[test]
    fn bool_ordering_is_rejected() {
        let err = compare(OpCode::Clt, &Value::Bool(true), &Value::Bool(false)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert!(compare(OpCode::Cne, &Value::Bool(true), &Value::Bool(false)).unwrap());
    }

    #[test]
    fn mixed_numeric_comparison_drops_to_float() {
        assert!(compare(OpCode::Cgt, &Value::Float64(2.5), &Value::Int32(2)).unwrap());
        assert!(compare(OpCode::Ceq, &Value::Int32(2), &Value::Float64(2.0)).unwrap());
    }

    #[test]
    fn null_equality() {
        assert!(compare(OpCode::Ceq, &Value::Null, &Value::Null).unwrap());
        assert!(compare(OpCode::Cne, &Value::Null, &Value::Str("x".into())).unwrap());
    }

    #[test]
    fn conv_dispatches_on_normalized_target() {
        assert_eq!(convert_to(&Value::Str("7".into()), "System.Int32").unwrap(), Value::Int32(7));
        assert_eq!(convert_to(&Value::Int32(1), "bool").unwrap(), Value::Bool(true));
        assert_eq!(convert_to(&Value::Float64(2.9), "long").unwrap(), Value::Int64(2));
        assert_eq!(convert_to(&Value::Null, "string").unwrap(), Value::Str(String::new()));
        let err = convert_to(&Value::Int32(1), "widget").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
