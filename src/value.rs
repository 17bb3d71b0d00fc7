//! Runtime values produced by evaluation. The main enum, [`Value`], covers
//! numbers (floating and arbitrary-precision), strings, booleans, symbols and
//! keywords, immutable lists, builtin and user-defined functions, and the
//! namespace objects bound by `require ... :as`.
//!
//! Values are never mutated in place; every list operation allocates a fresh
//! sequence. Helper functions [`val`] and [`nil`] mirror the AST helpers for
//! convenient construction in code and tests.

use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::Error;
use crate::ast::{Expr, RequireModifier, write_string_literal};
use crate::builtinops::Arity;
use crate::environment::Environment;
use crate::modules::Module;
use crate::numeric::format_number;

/// Canonical erased builtin function type used by the evaluator.
pub type OperationFn = dyn Fn(&[Value]) -> Result<Value, Error>;

/// Core runtime value type
#[derive(Clone)]
pub enum Value {
    /// Floating point numbers
    Number(f64),
    /// Exact integers built from big-integer literals
    BigNumber(BigInt),
    /// Strings
    String(String),
    /// Booleans
    Bool(bool),
    /// Symbols (only produced by quoting)
    Symbol(String),
    /// Keywords, stored without the leading colon
    Keyword(String),
    /// Immutable lists
    List(Vec<Value>),
    /// Builtin functions, called through a symbol or passed around as values.
    /// Compared by id, never by function pointer.
    BuiltinFunction {
        id: String,
        arity: Arity,
        func: Rc<OperationFn>,
    },
    /// User-defined functions (params, body, closure env)
    Function {
        params: Vec<String>,
        body: Rc<[Expr]>,
        env: Environment,
    },
    /// Exports of a required module, reachable as `alias.name`
    Namespace(Rc<Module>),
    /// Unspecified values (e.g., return value of define)
    /// These values never equal themselves or any other value
    Unspecified,
}

impl Value {
    /// Short human-readable name of the value kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) | Value::BigNumber(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::List(_) => "list",
            Value::BuiltinFunction { .. } | Value::Function { .. } => "function",
            Value::Namespace(_) => "namespace",
            Value::Unspecified => "unspecified",
        }
    }

    /// Check if a value is the empty list
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    /// Borrow the elements of a list value, or fail with a type error naming `form`
    pub(crate) fn as_list(&self, form: &str) -> Result<&[Value], Error> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(Error::TypeError(format!(
                "{form} requires a list argument, got {}",
                other.type_name()
            ))),
        }
    }

    /// Convert quoted syntax into data
    ///
    /// Declaration nodes are turned back into the list form they were parsed from.
    pub(crate) fn from_quoted(expr: &Expr) -> Value {
        match expr {
            Expr::Number(n) => Value::Number(*n),
            // The parser only accepts texts that parse as integers.
            Expr::BigNumber(text) => text
                .parse::<BigInt>()
                .map_or_else(|_| Value::Symbol(text.clone()), Value::BigNumber),
            Expr::String(s) => Value::String(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Symbol(s) => Value::Symbol(s.clone()),
            Expr::Keyword(k) => Value::Keyword(k.clone()),
            Expr::List(items) | Expr::Bracket(items) => {
                Value::List(items.iter().map(Value::from_quoted).collect())
            }
            Expr::Module {
                name,
                exports,
                body,
            } => {
                let mut export_list = vec![Value::Symbol("export".into())];
                export_list.extend(exports.iter().cloned().map(Value::Symbol));
                let mut items = vec![
                    Value::Symbol("module".into()),
                    Value::Symbol(name.clone()),
                    Value::List(export_list),
                ];
                items.extend(body.iter().map(Value::from_quoted));
                Value::List(items)
            }
            Expr::Import { module } => Value::List(vec![
                Value::Symbol("import".into()),
                Value::Symbol(module.clone()),
            ]),
            Expr::Load { filename } => Value::List(vec![
                Value::Symbol("load".into()),
                Value::String(filename.clone()),
            ]),
            Expr::Require { filename, modifier } => {
                let mut items = vec![
                    Value::Symbol("require".into()),
                    Value::String(filename.clone()),
                ];
                match modifier {
                    None => {}
                    Some(RequireModifier::As(alias)) => {
                        items.push(Value::Keyword("as".into()));
                        items.push(Value::Symbol(alias.clone()));
                    }
                    Some(RequireModifier::Only(names)) => {
                        items.push(Value::Keyword("only".into()));
                        items.push(Value::List(
                            names.iter().cloned().map(Value::Symbol).collect(),
                        ));
                    }
                }
                Value::List(items)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::BigNumber(n) => write!(f, "BigNumber({n})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Keyword(k) => write!(f, "Keyword({k})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::BuiltinFunction { id, .. } => write!(f, "BuiltinFunction({id})"),
            Value::Function { params, body, .. } => {
                write!(f, "Function(params={params:?}, body={body:?})")
            }
            Value::Namespace(module) => write!(f, "Namespace({})", module.name()),
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::BigNumber(n) => write!(f, "{n}"),
            Value::String(s) => write_string_literal(f, s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Keyword(k) => write!(f, ":{k}"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::BuiltinFunction { id, .. } => write!(f, "#<builtin-function:{id}>"),
            Value::Function { .. } => write!(f, "#<function>"),
            Value::Namespace(module) => write!(f, "#<namespace:{}>", module.name()),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigNumber(a), Value::BigNumber(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::BuiltinFunction { id: id1, .. }, Value::BuiltinFunction { id: id2, .. }) => {
                id1 == id2
            }
            (
                Value::Function {
                    params: p1,
                    body: b1,
                    env: e1,
                },
                Value::Function {
                    params: p2,
                    body: b2,
                    env: e2,
                },
            ) => p1 == p2 && b1 == b2 && e1.ptr_eq(e2),
            (Value::Namespace(a), Value::Namespace(b)) => Rc::ptr_eq(a, b),
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigNumber(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(f64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<&Value> for bool {
    type Error = Error;

    fn try_from(value: &Value) -> Result<bool, Error> {
        if let Value::Bool(b) = value {
            Ok(*b)
        } else {
            Err(Error::TypeError(format!(
                "expected boolean, got {}",
                value.type_name()
            )))
        }
    }
}

/// Helper function for creating Values - works great in mixed lists!
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists
pub fn nil() -> Value {
    Value::List(vec![])
}
