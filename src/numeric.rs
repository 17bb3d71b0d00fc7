//! Numeric tower used by the arithmetic and comparison builtins.
//!
//! Numbers are 64-bit floats unless a big-integer literal participates, in
//! which case every operand has to be integral and the arithmetic is exact.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, ToPrimitive, Zero};

use crate::Error;
use crate::builtinops::Arity;
use crate::value::Value;

/// Render a float the way number literals are written in source
pub(crate) fn format_number(n: f64) -> String {
    if n == 0.0 {
        // covers -0.0
        "0".to_owned()
    } else {
        n.to_string()
    }
}

#[derive(Debug, Clone)]
enum Operand {
    Float(f64),
    Big(BigInt),
}

fn operands(op: &str, args: &[Value]) -> Result<Vec<Operand>, Error> {
    args.iter()
        .map(|arg| match arg {
            Value::Number(n) => Ok(Operand::Float(*n)),
            Value::BigNumber(b) => Ok(Operand::Big(b.clone())),
            other => Err(Error::TypeError(format!(
                "'{op}' requires numeric arguments, got {}",
                other.type_name()
            ))),
        })
        .collect()
}

fn to_big(op: &str, operand: Operand) -> Result<BigInt, Error> {
    match operand {
        Operand::Big(b) => Ok(b),
        Operand::Float(f) if f.is_finite() && f.fract() == 0.0 => BigInt::from_f64(f)
            .ok_or_else(|| Error::EvalError(format!("'{op}': cannot convert {f} to an integer"))),
        Operand::Float(f) => Err(Error::TypeError(format!(
            "'{op}' cannot mix big integers with non-integral number {}",
            format_number(f)
        ))),
    }
}

fn to_float(operand: &Operand) -> f64 {
    match operand {
        Operand::Float(f) => *f,
        Operand::Big(b) => b.to_f64().unwrap_or(f64::NAN),
    }
}

/// Either every operand as a float, or every operand as an exact integer
enum Promoted {
    Floats(Vec<f64>),
    Bigs(Vec<BigInt>),
}

fn promote(op: &str, args: &[Value]) -> Result<Promoted, Error> {
    let ops = operands(op, args)?;
    if ops.iter().any(|o| matches!(o, Operand::Big(_))) {
        let bigs = ops
            .into_iter()
            .map(|o| to_big(op, o))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Promoted::Bigs(bigs))
    } else {
        Ok(Promoted::Floats(ops.iter().map(to_float).collect()))
    }
}

pub(crate) fn add(args: &[Value]) -> Result<Value, Error> {
    Ok(match promote("+", args)? {
        Promoted::Floats(ns) => Value::Number(ns.iter().sum()),
        Promoted::Bigs(ns) => Value::BigNumber(ns.into_iter().sum()),
    })
}

pub(crate) fn sub(args: &[Value]) -> Result<Value, Error> {
    Ok(match promote("-", args)? {
        Promoted::Floats(ns) => match ns.split_first() {
            Some((first, [])) => Value::Number(-first),
            Some((first, rest)) => Value::Number(rest.iter().fold(*first, |acc, n| acc - n)),
            None => return Err(Error::arity_error_with_expr(Arity::AtLeast(1), 0, "-")),
        },
        Promoted::Bigs(ns) => {
            let mut iter = ns.into_iter();
            let Some(first) = iter.next() else {
                return Err(Error::arity_error_with_expr(Arity::AtLeast(1), 0, "-"));
            };
            let mut rest = iter.peekable();
            if rest.peek().is_none() {
                Value::BigNumber(-first)
            } else {
                Value::BigNumber(rest.fold(first, |acc, n| acc - n))
            }
        }
    })
}

pub(crate) fn mul(args: &[Value]) -> Result<Value, Error> {
    Ok(match promote("*", args)? {
        Promoted::Floats(ns) => Value::Number(ns.iter().product()),
        Promoted::Bigs(ns) => Value::BigNumber(ns.into_iter().product()),
    })
}

pub(crate) fn div(args: &[Value]) -> Result<Value, Error> {
    match promote("/", args)? {
        Promoted::Floats(ns) => {
            let (first, rest) = match ns.split_first() {
                Some((first, [])) => (1.0, std::slice::from_ref(first)),
                Some((first, rest)) => (*first, rest),
                None => return Err(Error::arity_error_with_expr(Arity::AtLeast(1), 0, "/")),
            };
            let mut result = first;
            for divisor in rest {
                if *divisor == 0.0 {
                    return Err(Error::EvalError("Division by zero".into()));
                }
                result /= divisor;
            }
            Ok(Value::Number(result))
        }
        Promoted::Bigs(ns) => {
            let (first, rest) = match ns.split_first() {
                Some((first, [])) => (BigInt::one(), std::slice::from_ref(first)),
                Some((first, rest)) => (first.clone(), rest),
                None => return Err(Error::arity_error_with_expr(Arity::AtLeast(1), 0, "/")),
            };
            let mut result = first;
            for divisor in rest {
                if divisor.is_zero() {
                    return Err(Error::EvalError("Division by zero".into()));
                }
                let quotient = &result / divisor;
                // Big-integer division must not leave a remainder
                if &quotient * divisor != result {
                    return Err(Error::EvalError(format!(
                        "'/': {result} is not divisible by {divisor}"
                    )));
                }
                result = quotient;
            }
            Ok(Value::BigNumber(result))
        }
    }
}

fn compare(a: &Operand, b: &Operand) -> Option<Ordering> {
    match (a, b) {
        (Operand::Float(x), Operand::Float(y)) => x.partial_cmp(y),
        (Operand::Big(x), Operand::Big(y)) => Some(x.cmp(y)),
        (Operand::Big(x), Operand::Float(y)) => compare_big_float(x, *y),
        (Operand::Float(x), Operand::Big(y)) => compare_big_float(y, *x).map(Ordering::reverse),
    }
}

fn compare_big_float(big: &BigInt, f: f64) -> Option<Ordering> {
    if f.is_finite() && f.fract() == 0.0 {
        BigInt::from_f64(f).map(|other| big.cmp(&other))
    } else {
        big.to_f64().and_then(|b| b.partial_cmp(&f))
    }
}

/// Chained comparison: every adjacent pair must satisfy `accept`
pub(crate) fn compare_chain(
    op: &str,
    args: &[Value],
    accept: fn(Ordering) -> bool,
) -> Result<Value, Error> {
    let ops = operands(op, args)?;
    let holds = ops
        .windows(2)
        .all(|pair| compare(&pair[0], &pair[1]).is_some_and(accept));
    Ok(Value::Bool(holds))
}
