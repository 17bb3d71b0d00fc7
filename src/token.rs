//! Token model shared by the lexer and the parser.
//!
//! The parser only reads a slice of [`Token`]s; it never looks at source text.
//! Any producer (the bundled [`crate::lexer`], or a host's own tokenizer) can
//! feed it as long as the categories below are respected.

use std::fmt;

/// Category of a lexical unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Boolean,
    Symbol,
    /// `:name`; the token text is the name without the colon
    Keyword,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Quote,
    /// End of the stream
    Eof,
}

/// A category tag plus the raw text of the lexical unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Token {
            kind,
            value: value.into(),
        }
    }

    pub fn eof() -> Self {
        Token::new(TokenKind::Eof, "")
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::String => write!(f, "{:?} ({:?})", self.kind, self.value),
            TokenKind::Keyword => write!(f, "{:?} (:{})", self.kind, self.value),
            _ => write!(f, "{:?} ({})", self.kind, self.value),
        }
    }
}

/// Shorthand constructors, mostly for building token streams by hand
pub mod tok {
    use super::{Token, TokenKind};

    pub fn num(text: &str) -> Token {
        Token::new(TokenKind::Number, text)
    }

    pub fn string(text: &str) -> Token {
        Token::new(TokenKind::String, text)
    }

    pub fn boolean(text: &str) -> Token {
        Token::new(TokenKind::Boolean, text)
    }

    pub fn sym(text: &str) -> Token {
        Token::new(TokenKind::Symbol, text)
    }

    pub fn keyword(text: &str) -> Token {
        Token::new(TokenKind::Keyword, text)
    }

    pub fn lparen() -> Token {
        Token::new(TokenKind::LParen, "(")
    }

    pub fn rparen() -> Token {
        Token::new(TokenKind::RParen, ")")
    }

    pub fn lbracket() -> Token {
        Token::new(TokenKind::LBracket, "[")
    }

    pub fn rbracket() -> Token {
        Token::new(TokenKind::RBracket, "]")
    }

    pub fn quote() -> Token {
        Token::new(TokenKind::Quote, "'")
    }

    pub fn eof() -> Token {
        Token::eof()
    }
}
