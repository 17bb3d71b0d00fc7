//! Recursive-descent parser from a token stream to [`Expr`] trees.
//!
//! The parser reads a slice of [`Token`]s; the end of the slice and an `Eof`
//! token both mean end-of-stream. `'x` is rewritten to `(quote x)`, and lists
//! headed by `module`, `import`, `load` or `require` are turned into their
//! declaration nodes, with shape errors reported as
//! [`ParseErrorKind::MalformedForm`].

use num_bigint::BigInt;

use crate::ast::{Expr, RequireModifier};
use crate::token::{Token, TokenKind};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Parse exactly one expression; the whole stream must be consumed
pub fn parse(tokens: &[Token]) -> Result<Expr, Error> {
    let mut parser = Parser::new(tokens);
    if parser.current().is_none() {
        return Err(Error::parse(ParseErrorKind::EmptyInput, "empty input"));
    }

    let expr = parser.parse_expr()?;

    if let Some(token) = parser.current() {
        return Err(Error::parse_found(
            ParseErrorKind::TrailingToken,
            format!("unexpected token after expression: {token}"),
            token.to_string(),
        ));
    }
    Ok(expr)
}

/// Parse zero or more top-level expressions, e.g. the contents of a file
pub fn parse_program(tokens: &[Token]) -> Result<Vec<Expr>, Error> {
    let mut parser = Parser::new(tokens);
    let mut exprs = Vec::new();
    while parser.current().is_some() {
        exprs.push(parser.parse_expr()?);
    }
    Ok(exprs)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// The current token, or `None` at end-of-stream
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.position).filter(|token| !token.is_eof())
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(Error::parse(
                ParseErrorKind::TooDeeplyNested,
                format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let Some(token) = self.current() else {
            return Err(Error::parse(
                ParseErrorKind::UnexpectedToken,
                "unexpected token: end of input",
            ));
        };

        match token.kind {
            TokenKind::Number => {
                let expr = parse_number(&token.value)?;
                self.advance();
                Ok(expr)
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::String(token.value.clone()))
            }
            TokenKind::Boolean => {
                let value = match token.value.as_str() {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(Error::parse_found(
                            ParseErrorKind::InvalidBoolean,
                            format!("invalid boolean value: {other}"),
                            other,
                        ));
                    }
                };
                self.advance();
                Ok(Expr::Bool(value))
            }
            TokenKind::Symbol => {
                self.advance();
                Ok(Expr::Symbol(token.value.clone()))
            }
            TokenKind::Keyword => {
                self.advance();
                Ok(Expr::Keyword(token.value.clone()))
            }
            TokenKind::LParen => {
                let elements = self.parse_delimited(TokenKind::RParen)?;
                reinterpret_list(elements)
            }
            TokenKind::LBracket => self.parse_delimited(TokenKind::RBracket).map(Expr::Bracket),
            TokenKind::Quote => self.parse_quote(),
            TokenKind::RParen => Err(Error::parse_found(
                ParseErrorKind::UnexpectedClosingDelimiter,
                "unexpected closing parenthesis",
                ")",
            )),
            TokenKind::RBracket => Err(Error::parse_found(
                ParseErrorKind::UnexpectedClosingDelimiter,
                "unexpected closing bracket",
                "]",
            )),
            TokenKind::Eof => Err(Error::parse(
                ParseErrorKind::UnexpectedToken,
                format!("unexpected token: {token}"),
            )),
        }
    }

    /// Parse elements up to the `close` delimiter; the opener is the current token
    fn parse_delimited(&mut self, close: TokenKind) -> Result<Vec<Expr>, Error> {
        self.enter()?;
        self.advance();

        let mut elements = Vec::new();
        loop {
            match self.current() {
                None => {
                    let message = if close == TokenKind::RParen {
                        "unmatched opening parenthesis"
                    } else {
                        "unmatched opening bracket"
                    };
                    return Err(Error::parse(
                        ParseErrorKind::UnmatchedOpeningDelimiter,
                        message,
                    ));
                }
                Some(token) if token.kind == close => {
                    self.advance();
                    break;
                }
                Some(_) => elements.push(self.parse_expr()?),
            }
        }

        self.leave();
        Ok(elements)
    }

    /// `'x` becomes `(quote x)`
    fn parse_quote(&mut self) -> Result<Expr, Error> {
        self.enter()?;
        self.advance();
        let quoted = self.parse_expr().map_err(|err| match err {
            Error::ParseError(e) => Error::ParseError(ParseError::new(
                e.kind,
                format!("error parsing quoted expression: {}", e.message),
                e.found,
            )),
            other => other,
        })?;
        self.leave();
        Ok(Expr::List(vec![Expr::Symbol("quote".into()), quoted]))
    }
}

fn parse_number(text: &str) -> Result<Expr, Error> {
    let invalid = || {
        Error::parse_found(
            ParseErrorKind::InvalidNumber,
            format!("invalid number: {text}"),
            text,
        )
    };
    let value: f64 = text.parse().map_err(|_| invalid())?;

    // Long integer literals keep their text so no digits are lost
    let is_integer_text = !text.contains(['.', 'e', 'E']);
    let too_long = text.len() > 15
        || (text.len() == 16 && text.as_bytes().first().is_some_and(|first| *first > b'1'));
    if is_integer_text && too_long {
        text.parse::<BigInt>().map_err(|_| invalid())?;
        return Ok(Expr::BigNumber(text.to_owned()));
    }

    // Out-of-range literals overflow to infinity; only spelled-out inf/nan may be non-finite
    if !value.is_finite() && text.bytes().any(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(Expr::Number(value))
}

fn malformed(message: impl Into<String>) -> Error {
    Error::parse(ParseErrorKind::MalformedForm, message)
}

/// Turn a list headed by a declaration keyword into its declaration node
fn reinterpret_list(elements: Vec<Expr>) -> Result<Expr, Error> {
    match elements.first().and_then(Expr::as_symbol) {
        Some("module") => module_form(elements),
        Some("import") => import_form(&elements),
        Some("load") => load_form(&elements),
        Some("require") => require_form(&elements),
        _ => Ok(Expr::List(elements)),
    }
}

/// `(module name (export sym...) body...)`
fn module_form(elements: Vec<Expr>) -> Result<Expr, Error> {
    if elements.len() < 4 {
        return Err(malformed(
            "module requires at least name, export list, and body",
        ));
    }

    let mut parts = elements.into_iter().skip(1);
    let name = match parts.next() {
        Some(Expr::Symbol(name)) => name,
        _ => return Err(malformed("module name must be a symbol")),
    };
    let export_list = match parts.next() {
        Some(Expr::List(items)) => items,
        _ => return Err(malformed("module export list must be a list")),
    };

    let Some((head, names)) = export_list.split_first() else {
        return Err(malformed("export list cannot be empty"));
    };
    if head.as_symbol() != Some("export") {
        return Err(malformed("export list must start with 'export'"));
    }
    let exports = symbol_names(names, "exported names must be symbols")?;

    Ok(Expr::Module {
        name,
        exports,
        body: parts.collect(),
    })
}

/// `(import name)`
fn import_form(elements: &[Expr]) -> Result<Expr, Error> {
    match elements {
        [_, Expr::Symbol(module)] => Ok(Expr::Import {
            module: module.clone(),
        }),
        [_, _] => Err(malformed("import module name must be a symbol")),
        _ => Err(malformed("import requires exactly one module name")),
    }
}

/// `(load "file")`
fn load_form(elements: &[Expr]) -> Result<Expr, Error> {
    match elements {
        [_, Expr::String(filename)] => Ok(Expr::Load {
            filename: filename.clone(),
        }),
        [_, _] => Err(malformed("load filename must be a string")),
        _ => Err(malformed("load requires exactly one filename")),
    }
}

/// `(require "file")`, `(require "file" :as alias)`, `(require "file" :only (sym...))`
fn require_form(elements: &[Expr]) -> Result<Expr, Error> {
    let [_, filename, modifier @ ..] = elements else {
        return Err(malformed("require requires at least a filename"));
    };
    let Expr::String(filename) = filename else {
        return Err(malformed("require filename must be a string"));
    };

    let modifier = match modifier {
        [] => None,
        [_] => return Err(malformed("require modifier requires an argument")),
        [Expr::Keyword(keyword), payload @ ..] => match (keyword.as_str(), payload) {
            ("as", [Expr::Symbol(alias)]) => Some(RequireModifier::As(alias.clone())),
            ("as", [_]) => return Err(malformed("require :as alias must be a symbol")),
            ("as", _) => return Err(malformed("require :as expects exactly one alias symbol")),
            ("only", [Expr::List(names) | Expr::Bracket(names)]) => Some(RequireModifier::Only(
                symbol_names(names, "require :only list must contain only symbols")?,
            )),
            ("only", [_]) => return Err(malformed("require :only expects a list of symbols")),
            ("only", _) => return Err(malformed("require :only expects exactly one symbol list")),
            (other, _) => {
                return Err(malformed(format!(
                    "require modifier must be :as or :only, got {other}"
                )));
            }
        },
        [_, ..] => {
            return Err(malformed(
                "require modifier must be a keyword (:as or :only)",
            ));
        }
    };

    Ok(Expr::Require {
        filename: filename.clone(),
        modifier,
    })
}

fn symbol_names(items: &[Expr], message: &str) -> Result<Vec<String>, Error> {
    items
        .iter()
        .map(|item| {
            item.as_symbol()
                .map(str::to_owned)
                .ok_or_else(|| malformed(message))
        })
        .collect()
}
