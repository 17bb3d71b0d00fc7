//! modlisp - a small Lisp with modules and namespaces
//!
//! This crate is the parsing-and-evaluation core of a Lisp-family scripting
//! language. It turns a stream of tokens into an [`ast::Expr`] tree and
//! evaluates that tree against a lexically scoped [`environment::Environment`]
//! into runtime [`value::Value`]s.
//!
//! ```lisp
//! (define xs (list 1 2 3))
//! (cons (first xs) (rest xs))   ; => (1 2 3)
//! (empty? (list))               ; => true
//! 'x                            ; same tree as (quote x)
//! ```
//!
//! ## Modules
//!
//! Source files can declare modules and pull each other in:
//!
//! ```lisp
//! (module math (export square cube)
//!   (define square (lambda (x) (* x x)))
//!   (define cube (lambda (x) (* x (square x)))))
//!
//! (require "math.lisp")                  ; square, cube unqualified
//! (require "math.lisp" :as m)            ; only m.square, m.cube
//! (require "math.lisp" :only (square))   ; only square
//! (load "prelude.lisp")                  ; evaluate into the current scope
//! ```
//!
//! The module registry lives in an explicit [`evaluator::Context`], so two
//! interpreters never share module state unless the host arranges it.
//!
//! ## Strictness
//!
//! - No truthiness: `if`, `and`, `or` and `not` require booleans
//! - Every builtin and special form checks its arity before running
//! - Every error is reported where it is detected and propagated to the caller
//!
//! ## Modules of this crate
//!
//! - `token` / `lexer`: the token model and a tokenizer (feature `lexer`)
//! - `parser`: recursive-descent parser producing [`ast::Expr`]
//! - `evaluator`: tree-walking evaluation and special-form dispatch
//! - `builtinops`: registry of builtin functions and special forms
//! - `modules` / `loader`: module registry and source loading for `require`/`load`
//! - `interpreter`: convenience facade bundling an environment and a context

use std::fmt;

use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the parser
pub const MAX_PARSE_DEPTH: usize = 128;

/// Default maximum evaluation depth, guarding against runaway recursion
/// Set higher than parse depth to allow for nested function applications
pub const MAX_EVAL_DEPTH: usize = 512;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// No tokens (or only the end-of-stream marker) were supplied
    EmptyInput,
    /// A number token whose text is not a valid number
    InvalidNumber,
    /// A boolean token whose text is neither `true` nor `false`
    InvalidBoolean,
    /// `)` or `]` found where an expression was expected
    UnexpectedClosingDelimiter,
    /// A token that cannot start an expression
    UnexpectedToken,
    /// End of input reached before a list or bracket was closed
    UnmatchedOpeningDelimiter,
    /// Extra tokens found after a complete expression
    TrailingToken,
    /// A `module`, `import`, `load` or `require` form with the wrong shape
    MalformedForm,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Text that could not be tokenized
    InvalidSyntax,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// The problematic token or text encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, found: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            found,
        }
    }

    /// Create a ParseError with a kind and message but no offending token
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError(String),
    UnboundVariable(String),
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>, // Name of the form being applied
    },
    ModuleNotFound(String),
    ExportNotFound {
        module: String,
        name: String,
    },
    LoadError {
        filename: String,
        message: String,
    },
}

impl Error {
    /// Create a parse error of the given kind
    pub(crate) fn parse(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Error::ParseError(ParseError::from_message(kind, message))
    }

    /// Create a parse error that records the offending token text
    pub(crate) fn parse_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Error::ParseError(ParseError::new(kind, message, Some(found.into())))
    }

    /// Create an ArityError without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError naming the form that was applied
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: impl Into<String>) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression.into()),
        }
    }

    /// The parse error kind, if this is a parse error
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Error::ParseError(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: function expected {expected} arguments but got {got}"
                ),
            },
            Error::ModuleNotFound(name) => write!(f, "Module not found: {name}"),
            Error::ExportNotFound { module, name } => {
                write!(f, "Module {module} does not export {name}")
            }
            Error::LoadError { filename, message } => {
                write!(f, "LoadError: cannot load {filename}: {message}")
            }
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod loader;
pub mod modules;
mod numeric;
pub mod parser;
pub mod token;
pub mod value;

#[cfg(feature = "lexer")]
pub mod lexer;

pub use interpreter::Interpreter;
