//! This module defines the Abstract Syntax Tree produced by the parser. The
//! main enum, [`Expr`], is a closed set of node kinds: literals, symbols,
//! keywords, generic lists, bracketed sequences, and the four module-related
//! declarations (`module`, `import`, `load`, `require`) that the parser
//! recognizes by inspecting the first symbol of a list.
//!
//! Trees are immutable once built and may be evaluated any number of times.
//! Ergonomic helper functions such as [`sym`], [`num`] and [`list`] are provided
//! for building trees by hand in code and tests. `Display` re-emits source
//! syntax; a big-integer literal re-emits its original digits exactly.

use std::fmt;

use crate::numeric::format_number;

/// Modifier of a `require` declaration. Alias and only-list are mutually
/// exclusive, so a single optional modifier represents both.
#[derive(Debug, Clone, PartialEq)]
pub enum RequireModifier {
    /// `:as alias`
    As(String),
    /// `:only (a b ...)`
    Only(Vec<String>),
}

/// Core AST type
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal that fits a 64-bit float without losing digits
    Number(f64),
    /// Integer literal too long for a float; holds the exact source text
    BigNumber(String),
    /// String literals
    String(String),
    /// Boolean literals
    Bool(bool),
    /// Symbol references
    Symbol(String),
    /// Keyword literals (`:name`, stored without the colon)
    Keyword(String),
    /// Parenthesized list: application, special form, or plain data under quote
    List(Vec<Expr>),
    /// Bracketed sequence, never reinterpreted as a special form
    Bracket(Vec<Expr>),
    /// `(module name (export sym...) body...)`
    Module {
        name: String,
        exports: Vec<String>,
        body: Vec<Expr>,
    },
    /// `(import name)`
    Import { module: String },
    /// `(load "file")`
    Load { filename: String },
    /// `(require "file")`, `(require "file" :as alias)`, `(require "file" :only (...))`
    Require {
        filename: String,
        modifier: Option<RequireModifier>,
    },
}

impl Expr {
    /// The symbol name, if this node is a bare symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Short human-readable name of the node kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Number(_) | Expr::BigNumber(_) => "number",
            Expr::String(_) => "string",
            Expr::Bool(_) => "boolean",
            Expr::Symbol(_) => "symbol",
            Expr::Keyword(_) => "keyword",
            Expr::List(_) => "list",
            Expr::Bracket(_) => "bracket",
            Expr::Module { .. } => "module declaration",
            Expr::Import { .. } => "import declaration",
            Expr::Load { .. } => "load declaration",
            Expr::Require { .. } => "require declaration",
        }
    }
}

// From trait implementations for Expr - enables .into() conversion
impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::String(s.to_owned())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::String(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Bool(b)
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Number(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Number(f64::from(n))
    }
}

/// Helper function for creating symbol references
pub fn sym<S: AsRef<str>>(name: S) -> Expr {
    Expr::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating number literals
pub fn num<N: Into<f64>>(n: N) -> Expr {
    Expr::Number(n.into())
}

/// Helper function for creating any literal that converts into an `Expr`
pub fn lit<T: Into<Expr>>(value: T) -> Expr {
    value.into()
}

/// Helper function for creating generic lists
pub fn list<I: IntoIterator<Item = Expr>>(items: I) -> Expr {
    Expr::List(items.into_iter().collect())
}

/// Helper function for creating bracketed sequences
pub fn bracket<I: IntoIterator<Item = Expr>>(items: I) -> Expr {
    Expr::Bracket(items.into_iter().collect())
}

/// Write a string literal with escapes, so the output can be tokenized again
pub(crate) fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", format_number(*n)),
            Expr::BigNumber(text) => write!(f, "{text}"),
            Expr::String(s) => write_string_literal(f, s),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Keyword(k) => write!(f, ":{k}"),
            Expr::List(items) => {
                write!(f, "(")?;
                write_seq(f, items)?;
                write!(f, ")")
            }
            Expr::Bracket(items) => {
                write!(f, "[")?;
                write_seq(f, items)?;
                write!(f, "]")
            }
            Expr::Module {
                name,
                exports,
                body,
            } => {
                write!(f, "(module {name} (export")?;
                for export in exports {
                    write!(f, " {export}")?;
                }
                write!(f, ")")?;
                for expr in body {
                    write!(f, " {expr}")?;
                }
                write!(f, ")")
            }
            Expr::Import { module } => write!(f, "(import {module})"),
            Expr::Load { filename } => {
                write!(f, "(load ")?;
                write_string_literal(f, filename)?;
                write!(f, ")")
            }
            Expr::Require { filename, modifier } => {
                write!(f, "(require ")?;
                write_string_literal(f, filename)?;
                match modifier {
                    None => {}
                    Some(RequireModifier::As(alias)) => write!(f, " :as {alias}")?,
                    Some(RequireModifier::Only(names)) => write!(f, " :only ({})", names.join(" "))?,
                }
                write!(f, ")")
            }
        }
    }
}
