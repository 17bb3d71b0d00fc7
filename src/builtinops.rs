//! Built-in operations registry.
//!
//! Every builtin is described once by a [`BuiltinOp`]: its identifier, its
//! implementation, and its [`Arity`]. The evaluator consults this registry
//! when the head of a list is a symbol naming a builtin, validates the arity
//! (reporting the form's name on failure), and then runs it.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g., `+`, `cons`, `first`)
//! - **Special Forms**: Control evaluation of arguments (e.g., `if`, `define`, `and`)
//!
//! Functions are also bound in the global environment as
//! [`Value::BuiltinFunction`]s, so they can be passed around and called
//! dynamically; a dynamic call validates the arity the same way.
//!
//! ## Error Handling
//!
//! - **Type Safety**: Operations reject incorrect types (e.g., `(first 42)` errors)
//! - **No Coercion**: no "truthiness", booleans are required where booleans are meant
//! - **Arity Checking**: Strict argument count validation for all operations
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** following the signature `fn(args: &[Value]) -> Result<Value, Error>`
//! 2. **Add it to BUILTIN_OPS** with its identifier and arity
//! 3. **Special forms** get `fn(&[Expr], &Environment, &mut Context, usize)` and live in the evaluator

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::Expr;
use crate::environment::Environment;
use crate::evaluator::{
    Context, eval_and, eval_begin, eval_define, eval_if, eval_lambda, eval_let, eval_or, eval_quote,
};
use crate::numeric;
use crate::value::Value;

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    /// Check if the given number of arguments is valid
    pub fn validate(self, got: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Signature of builtin functions, which receive evaluated arguments
pub type BuiltinFn = fn(&[Value]) -> Result<Value, Error>;

/// Signature of special forms, which receive unevaluated arguments, the
/// current environment, the evaluation context and the current depth
pub type SpecialFormFn = fn(&[Expr], &Environment, &mut Context, usize) -> Result<Value, Error>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone, Copy)]
pub enum OpKind {
    Function(BuiltinFn),
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The identifier this operation is called by
    pub id: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Operations are uniquely identified by their id
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Check if this operation is a special form
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check the argument count, naming this operation in the error
    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count).map_err(|_| {
            Error::arity_error_with_expr(self.arity, arg_count, self.id)
        })
    }
}

//
// Builtin Function Implementations
//

/// Destructure exactly `N` arguments, or fail with an arity error naming `form`
fn fixed_args<'a, const N: usize>(form: &str, args: &'a [Value]) -> Result<&'a [Value; N], Error> {
    args.try_into()
        .map_err(|_| Error::arity_error_with_expr(Arity::Exact(N), args.len(), form))
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

fn builtin_empty(args: &[Value]) -> Result<Value, Error> {
    let [list] = fixed_args("empty?", args)?;
    Ok(Value::Bool(list.as_list("empty?")?.is_empty()))
}

fn builtin_length(args: &[Value]) -> Result<Value, Error> {
    let [list] = fixed_args("length", args)?;
    let items = list.as_list("length")?;
    // exact below 2^53
    Ok(Value::Number(items.len() as f64))
}

fn builtin_first(args: &[Value]) -> Result<Value, Error> {
    let [list] = fixed_args("first", args)?;
    match list.as_list("first")? {
        [first, ..] => Ok(first.clone()),
        [] => Err(Error::EvalError("first of empty list".into())),
    }
}

fn builtin_rest(args: &[Value]) -> Result<Value, Error> {
    let [list] = fixed_args("rest", args)?;
    match list.as_list("rest")? {
        [_, rest @ ..] => Ok(Value::List(rest.to_vec())),
        [] => Err(Error::EvalError("rest of empty list".into())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    let [head, tail] = fixed_args("cons", args)?;
    let tail = match tail {
        Value::List(items) => items,
        other => {
            return Err(Error::TypeError(format!(
                "cons requires a list as second argument, got {}",
                other.type_name()
            )));
        }
    };
    let mut new_list = Vec::with_capacity(tail.len() + 1);
    new_list.push(head.clone());
    new_list.extend_from_slice(tail);
    Ok(Value::List(new_list))
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    let [arg] = fixed_args("not", args)?;
    let b = bool::try_from(arg)
        .map_err(|_| Error::TypeError("'not' requires a boolean argument (no truthiness)".into()))?;
    Ok(Value::Bool(!b))
}

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    let [first, second] = fixed_args("equal?", args)?;
    match (first, second) {
        (
            Value::Number(_) | Value::BigNumber(_),
            Value::Number(_) | Value::BigNumber(_),
        ) => numeric::compare_chain("equal?", args, Ordering::is_eq),
        (Value::Bool(_), Value::Bool(_))
        | (Value::String(_), Value::String(_))
        | (Value::Symbol(_), Value::Symbol(_))
        | (Value::Keyword(_), Value::Keyword(_))
        | (Value::List(_), Value::List(_)) => Ok(Value::Bool(first == second)),
        _ => Err(Error::TypeError(format!(
            "equal? requires arguments of the same comparable type, got {} and {}",
            first.type_name(),
            second.type_name()
        ))),
    }
}

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op_str:expr, $accept:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            numeric::compare_chain($op_str, args, $accept)
        }
    };
}

numeric_comparison!(builtin_num_eq, "=", Ordering::is_eq);
numeric_comparison!(builtin_lt, "<", Ordering::is_lt);
numeric_comparison!(builtin_gt, ">", Ordering::is_gt);
numeric_comparison!(builtin_le, "<=", Ordering::is_le);
numeric_comparison!(builtin_ge, ">=", Ordering::is_ge);

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    use OpKind::{Function, SpecialForm};

    let op = |id, op_kind, arity| BuiltinOp { id, op_kind, arity };

    vec![
        // List operations
        op("list", Function(builtin_list), Arity::Any),
        op("empty?", Function(builtin_empty), Arity::Exact(1)),
        op("length", Function(builtin_length), Arity::Exact(1)),
        op("first", Function(builtin_first), Arity::Exact(1)),
        op("rest", Function(builtin_rest), Arity::Exact(1)),
        op("cons", Function(builtin_cons), Arity::Exact(2)),
        // Arithmetic operations
        op("+", Function(numeric::add), Arity::AtLeast(0)),
        op("-", Function(numeric::sub), Arity::AtLeast(1)),
        op("*", Function(numeric::mul), Arity::AtLeast(1)),
        op("/", Function(numeric::div), Arity::AtLeast(1)),
        // Comparison operations
        op("=", Function(builtin_num_eq), Arity::AtLeast(2)),
        op("<", Function(builtin_lt), Arity::AtLeast(2)),
        op(">", Function(builtin_gt), Arity::AtLeast(2)),
        op("<=", Function(builtin_le), Arity::AtLeast(2)),
        op(">=", Function(builtin_ge), Arity::AtLeast(2)),
        op("equal?", Function(builtin_equal), Arity::Exact(2)),
        // Logical operations
        op("not", Function(builtin_not), Arity::Exact(1)),
        op("and", SpecialForm(eval_and), Arity::AtLeast(1)),
        op("or", SpecialForm(eval_or), Arity::AtLeast(1)),
        // Control flow
        op("if", SpecialForm(eval_if), Arity::Exact(3)),
        op("begin", SpecialForm(eval_begin), Arity::AtLeast(1)),
        // Special forms for language constructs
        op("quote", SpecialForm(eval_quote), Arity::Exact(1)),
        op("define", SpecialForm(eval_define), Arity::Exact(2)),
        op("lambda", SpecialForm(eval_lambda), Arity::AtLeast(2)),
        op("let", SpecialForm(eval_let), Arity::AtLeast(2)),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
