//! Tokenizer turning source text into the [`Token`] stream the parser reads.
//!
//! Built on `nom`. Whitespace separates tokens, `;` starts a line comment
//! (unless disabled in [`LexConfig`]), and the returned vector always ends with
//! an [`TokenKind::Eof`] token.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{opt, recognize},
    error::ErrorKind,
    sequence::preceded,
};

use crate::token::{Token, TokenKind, tok};
use crate::{Error, ParseErrorKind};

/// Characters allowed in symbols besides alphanumerics
const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$%&.";

/// Tokenizer options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexConfig {
    /// Treat `;` up to the end of the line as a comment
    pub handle_comments: bool,
}

impl Default for LexConfig {
    fn default() -> Self {
        LexConfig {
            handle_comments: true,
        }
    }
}

/// Tokenize with the default configuration
pub fn tokenize(input: &str) -> Result<Vec<Token>, Error> {
    tokenize_with_config(input, LexConfig::default())
}

/// Tokenize `input`; the result always ends with an `Eof` token
pub fn tokenize_with_config(input: &str, config: LexConfig) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut remaining = skip_trivia(input, config);

    while !remaining.is_empty() {
        let (rest, token) = lex_token(remaining).map_err(|e| lex_error(input, e))?;
        tokens.push(token);
        remaining = skip_trivia(rest, config);
    }

    tokens.push(Token::eof());
    Ok(tokens)
}

/// Convert nom errors to user-friendly messages
fn lex_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let near: String = e.input.chars().take(10).collect();
            let message = match e.code {
                ErrorKind::Char => format!("Invalid string literal at position {position}"),
                _ if near.is_empty() => "Unexpected end of input".to_owned(),
                _ => format!("Invalid syntax near '{near}' at position {position}"),
            };
            Error::parse_found(ParseErrorKind::InvalidSyntax, message, near)
        }
        nom::Err::Incomplete(_) => Error::parse(ParseErrorKind::InvalidSyntax, "Incomplete input"),
    }
}

/// Skip whitespace and, if enabled, comments
fn skip_trivia(mut input: &str, config: LexConfig) -> &str {
    loop {
        input = input.trim_start();
        if !config.handle_comments {
            return input;
        }
        match comment(input) {
            Ok((rest, _)) => input = rest,
            Err(_) => return input,
        }
    }
}

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char(';'), take_till(|c| c == '\n')).parse(input)
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "()[]\"';".contains(c)
}

/// Valid: non-empty and not shaped like a number (`1x`, `-1x`, `.5`, `+.5`)
fn is_valid_symbol(name: &str) -> bool {
    let unsigned = name.strip_prefix(['-', '+']).unwrap_or(name);
    let digits = unsigned.strip_prefix('.').unwrap_or(unsigned);
    !name.is_empty() && !digits.starts_with(|c: char| c.is_ascii_digit())
}

fn lex_token(input: &str) -> IResult<&str, Token> {
    alt((lex_punctuation, lex_string, lex_keyword, lex_number, lex_word)).parse(input)
}

fn lex_punctuation(input: &str) -> IResult<&str, Token> {
    alt((
        char('(').map(|_| tok::lparen()),
        char(')').map(|_| tok::rparen()),
        char('[').map(|_| tok::lbracket()),
        char(']').map(|_| tok::rbracket()),
        char('\'').map(|_| tok::quote()),
    ))
    .parse(input)
}

/// Parse a string literal
///
/// Once the opening quote is seen, errors are failures so no other token kind is tried.
fn lex_string(input: &str) -> IResult<&str, Token> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), Token::new(TokenKind::String, chars)));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    // Unknown or incomplete escape sequence
                    Some(_) | None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                // Reached end of input without finding closing quote
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// `:name`, stored without the colon
fn lex_keyword(input: &str) -> IResult<&str, Token> {
    preceded(char(':'), take_while1(is_symbol_char))
        .map(tok::keyword)
        .parse(input)
}

/// Optional sign, digits, optional fraction, optional exponent, then a delimiter
fn lex_number(input: &str) -> IResult<&str, Token> {
    let (rest, text) = recognize((
        opt(one_of("+-")),
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;

    if rest.chars().next().is_some_and(|c| !is_delimiter(c)) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        )));
    }
    Ok((rest, tok::num(text)))
}

/// Symbols, plus the `true`/`false` literals
fn lex_word(input: &str) -> IResult<&str, Token> {
    let (rest, word) = take_while1(is_symbol_char).parse(input)?;
    if !is_valid_symbol(word) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )));
    }
    let token = match word {
        "true" | "false" => tok::boolean(word),
        _ => tok::sym(word),
    };
    Ok((rest, token))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::token::tok::*;

    #[test]
    fn test_tokenize_comprehensive() {
        let test_cases = vec![
            ("", vec![eof()]),
            ("   \n\t", vec![eof()]),
            ("42", vec![num("42"), eof()]),
            ("-3.5 1e3 +7", vec![num("-3.5"), num("1e3"), num("+7"), eof()]),
            ("2.5E-3", vec![num("2.5E-3"), eof()]),
            ("9007199254740993", vec![num("9007199254740993"), eof()]),
            ("\"hello world\"", vec![string("hello world"), eof()]),
            (r#""a\"b\n\t\\""#, vec![string("a\"b\n\t\\"), eof()]),
            ("true false", vec![boolean("true"), boolean("false"), eof()]),
            ("truely", vec![sym("truely"), eof()]),
            (":as :only", vec![keyword("as"), keyword("only"), eof()]),
            (
                "empty? - + m.square <= set! . ... -.x",
                vec![
                    sym("empty?"),
                    sym("-"),
                    sym("+"),
                    sym("m.square"),
                    sym("<="),
                    sym("set!"),
                    sym("."),
                    sym("..."),
                    sym("-.x"),
                    eof(),
                ],
            ),
            (
                "(first '(1 2))",
                vec![
                    lparen(),
                    sym("first"),
                    quote(),
                    lparen(),
                    num("1"),
                    num("2"),
                    rparen(),
                    rparen(),
                    eof(),
                ],
            ),
            (
                "(require \"m.lisp\" :only [a b])",
                vec![
                    lparen(),
                    sym("require"),
                    string("m.lisp"),
                    keyword("only"),
                    lbracket(),
                    sym("a"),
                    sym("b"),
                    rbracket(),
                    rparen(),
                    eof(),
                ],
            ),
            (
                "; leading comment\n(list) ; trailing\n",
                vec![lparen(), sym("list"), rparen(), eof()],
            ),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let actual = tokenize(input)
                .unwrap_or_else(|e| panic!("#{}: tokenize({input:?}) failed: {e}", i + 1));
            assert_eq!(actual, expected, "#{}: tokens of {input:?}", i + 1);
        }
    }

    #[test]
    fn test_tokenize_errors() {
        let test_cases = vec![
            ("\"unterminated", "Invalid string literal"),
            ("\"bad \\q escape\"", "Invalid string literal"),
            ("12abc", "Invalid syntax near '12abc'"),
            ("-1x", "Invalid syntax"),
            (":", "Invalid syntax"),
            ("{", "Invalid syntax near '{'"),
            (".5", "Invalid syntax near '.5'"),
            ("+.5", "Invalid syntax near '+.5'"),
            ("(f -.25)", "Invalid syntax near '-.25)'"),
        ];

        for (input, expected) in test_cases {
            let err = tokenize(input).unwrap_err();
            assert_eq!(err.parse_kind(), Some(ParseErrorKind::InvalidSyntax), "{input:?}");
            let msg = err.to_string();
            assert!(msg.contains(expected), "{input:?}: '{msg}' should contain '{expected}'");
        }
    }

    #[test]
    fn test_comment_handling_can_be_disabled() {
        let config = LexConfig {
            handle_comments: false,
        };
        assert!(tokenize_with_config("; comment", config).is_err());
        assert_eq!(
            tokenize_with_config("(a)", config).unwrap(),
            vec![lparen(), sym("a"), rparen(), eof()]
        );
    }

    #[test]
    fn test_tokens_feed_the_parser() {
        use crate::ast::{self, list};
        use crate::parser::parse;

        let expr = parse(&tokenize("(cons 1 '(2))").unwrap()).unwrap();
        assert_eq!(
            expr,
            list([
                ast::sym("cons"),
                ast::num(1),
                list([ast::sym("quote"), list([ast::num(2)])]),
            ])
        );
    }
}
