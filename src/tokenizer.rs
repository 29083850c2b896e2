//! Streaming tokenizer for the Clausewitz text format (spec section 4.2).
//!
//! Peak memory is proportional to the current token, not the input: the
//! tokenizer holds only a byte slice cursor plus the line/column counters,
//! never a copy of the whole input beyond what was handed to it.

use crate::errors::ParserError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    QuotedString(String),
    Integer(i64),
    Number(f64),
    Date(String),
    OpenBrace,
    CloseBrace,
    Equals,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier `{s}`"),
            TokenKind::QuotedString(s) => write!(f, "string \"{s}\""),
            TokenKind::Integer(n) => write!(f, "integer {n}"),
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Date(s) => write!(f, "date {s}"),
            TokenKind::OpenBrace => write!(f, "'{{'"),
            TokenKind::CloseBrace => write!(f, "'}}'"),
            TokenKind::Equals => write!(f, "'='"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Tokenizes `input` byte-at-a-time, tracking byte offset and 1-based
/// line/column. Never panics on malformed input: unterminated strings or
/// blocks surface as a `ParseError` from the caller (the tree builder),
/// not from the tokenizer itself, since "unterminated" is a tree-level
/// concept (a `{` that never closes is still valid token-by-token).
pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
    col: usize,
}

const DATE_RE_MIN_DIGITS: usize = 3;

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            offset: 0,
            line: 1,
            col: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Pull the next token. Returns `Ok` with `TokenKind::Eof` exactly once
    /// at end of input, then keeps returning it forever — this guarantees
    /// tokenizer total-ness (spec section 8): a caller driving the tokenizer
    /// in a loop always terminates.
    pub fn next_token(&mut self) -> Result<Token, ParserError> {
        self.skip_whitespace_and_comments();
        let start = self.position();

        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: start,
            });
        };

        match b {
            b'{' => {
                self.advance();
                Ok(Token {
                    kind: TokenKind::OpenBrace,
                    pos: start,
                })
            }
            b'}' => {
                self.advance();
                Ok(Token {
                    kind: TokenKind::CloseBrace,
                    pos: start,
                })
            }
            b'=' => {
                self.advance();
                Ok(Token {
                    kind: TokenKind::Equals,
                    pos: start,
                })
            }
            b'"' => self.scan_quoted_string(start),
            b'-' | b'0'..=b'9' => self.scan_number_or_date(start),
            b if is_ident_start(b) => self.scan_identifier(start),
            other => Err(ParserError::parse(
                format!("unexpected byte 0x{:02x}", other),
                start.line,
                start.col,
            )),
        }
    }

    fn scan_quoted_string(&mut self, start: Position) -> Result<Token, ParserError> {
        self.advance(); // opening quote
        let mut raw: Vec<u8> = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => {
                    let text = String::from_utf8_lossy(&raw).into_owned();
                    return Ok(Token {
                        kind: TokenKind::QuotedString(text),
                        pos: start,
                    });
                }
                // Backslash is literal per spec section 4.2: no escaping.
                // Bytes are buffered raw (not cast per-byte to char) so
                // multi-byte UTF-8 sequences inside the string survive.
                Some(b) => raw.push(b),
                None => {
                    return Err(ParserError::parse(
                        "unterminated quoted string",
                        start.line,
                        start.col,
                    ))
                }
            }
        }
    }

    fn scan_identifier(&mut self, start: Position) -> Result<Token, ParserError> {
        let begin = self.offset;
        while let Some(b) = self.peek() {
            if is_ident_continue(b) {
                self.advance();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.bytes[begin..self.offset]).into_owned();
        Ok(Token {
            kind: TokenKind::Identifier(text),
            pos: start,
        })
    }

    fn scan_number_or_date(&mut self, start: Position) -> Result<Token, ParserError> {
        let begin = self.offset;
        if self.peek() == Some(b'-') {
            self.advance();
        }
        let mut groups = 1;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    self.advance();
                }
                b'.' => {
                    groups += 1;
                    self.advance();
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.bytes[begin..self.offset]).unwrap_or_default();

        if groups == 3 && looks_like_date(text) {
            return Ok(Token {
                kind: TokenKind::Date(text.to_string()),
                pos: start,
            });
        }

        if text.contains('.') {
            match text.parse::<f64>() {
                Ok(n) => Ok(Token {
                    kind: TokenKind::Number(n),
                    pos: start,
                }),
                Err(_) => Err(ParserError::parse(
                    format!("malformed number literal '{text}'"),
                    start.line,
                    start.col,
                )),
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => Ok(Token {
                    kind: TokenKind::Integer(n),
                    pos: start,
                }),
                Err(_) => Err(ParserError::parse(
                    format!("malformed integer literal '{text}'"),
                    start.line,
                    start.col,
                )),
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `\d{3,4}\.\d{1,2}\.\d{1,2}` per spec section 4.2 — checked on the already
/// scanned numeric-ish text rather than with a regex, since the tokenizer
/// has to decide this digit-by-digit anyway.
fn looks_like_date(text: &str) -> bool {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    let year_ok = matches!(parts[0].len(), DATE_RE_MIN_DIGITS..=4) && parts[0].chars().all(|c| c.is_ascii_digit());
    let month_ok = matches!(parts[1].len(), 1..=2) && parts[1].chars().all(|c| c.is_ascii_digit());
    let day_ok = matches!(parts[2].len(), 1..=2) && parts[2].chars().all(|c| c.is_ascii_digit());
    year_ok && month_ok && day_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut t = Tokenizer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = t.next_token().expect("tokenizer should not error");
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            out.push(tok.kind);
            if is_eof {
                break;
            }
        }
        out
    }

    #[test]
    fn tokenizes_assignment() {
        let toks = kinds("foo = 1");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("foo".into()),
                TokenKind::Equals,
                TokenKind::Integer(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn recognizes_dates_not_numbers() {
        let toks = kinds("2200.01.15");
        assert_eq!(toks, vec![TokenKind::Date("2200.01.15".into()), TokenKind::Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds("# a comment\nfoo=1");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("foo".into()),
                TokenKind::Equals,
                TokenKind::Integer(1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn quoted_string_keeps_backslash_literal() {
        let toks = kinds(r#""a\b""#);
        assert_eq!(toks, vec![TokenKind::QuotedString("a\\b".into()), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_is_parse_error_not_panic() {
        let mut t = Tokenizer::new("\"unterminated");
        assert!(t.next_token().is_err());
    }

    #[test]
    fn eof_is_stable() {
        let mut t = Tokenizer::new("");
        let first = t.next_token().unwrap();
        let second = t.next_token().unwrap();
        assert_eq!(first.kind, TokenKind::Eof);
        assert_eq!(second.kind, TokenKind::Eof);
    }
}
