//! Non-recursive tree builder (spec section 4.3).
//!
//! Builds the document tree with an explicit stack so nesting depth in the
//! low thousands never overflows the Rust call stack — there is exactly one
//! loop in this module and no function calls itself, directly or
//! indirectly, to handle a nested block. Ambiguity between a block being an
//! object or a list is resolved at close time: a frame that saw at least
//! one `identifier '='` pair is an object, otherwise a list. Mixed content
//! (assignments alongside bare scalars) becomes an object whose bare
//! scalars are gathered under an implicit numeric-index key.

use crate::errors::ParserError;
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use crate::value::{Entry, Scalar, Value};

enum FrameItem {
    Assignment { key: String, value: Value },
    Scalar(Value),
}

/// One open block on the explicit stack. `attach_key` is `None` for the
/// document root and for blocks that appear as bare list items; it is
/// `Some(key)` for a block that is the right-hand side of `key = { ... }`,
/// set when the frame is pushed so the close-brace handler knows where to
/// attach the finished value without looking anything up.
struct Frame {
    items: Vec<FrameItem>,
    saw_assignment: bool,
    attach_key: Option<String>,
}

impl Frame {
    fn new(attach_key: Option<String>) -> Self {
        Self {
            items: Vec::new(),
            saw_assignment: false,
            attach_key,
        }
    }

    fn into_value(self) -> Value {
        if self.saw_assignment {
            let mut entries = Vec::with_capacity(self.items.len());
            let mut implicit_index = 0usize;
            for item in self.items {
                match item {
                    FrameItem::Assignment { key, value } => entries.push(Entry { key, value }),
                    FrameItem::Scalar(value) => {
                        entries.push(Entry {
                            key: implicit_index.to_string(),
                            value,
                        });
                        implicit_index += 1;
                    }
                }
            }
            Value::Object(entries)
        } else {
            Value::List(
                self.items
                    .into_iter()
                    .map(|item| match item {
                        FrameItem::Scalar(value) => value,
                        FrameItem::Assignment { .. } => {
                            unreachable!("a frame with no '=' cannot contain an Assignment item")
                        }
                    })
                    .collect(),
            )
        }
    }
}

fn scalar_from_token(kind: &TokenKind) -> Option<Scalar> {
    match kind {
        TokenKind::Identifier(s) => Some(match s.as_str() {
            "yes" => Scalar::Bool(true),
            "no" => Scalar::Bool(false),
            _ => Scalar::Identifier(s.clone()),
        }),
        TokenKind::QuotedString(s) => Some(Scalar::String(s.clone())),
        TokenKind::Integer(n) => Some(Scalar::Integer(*n)),
        TokenKind::Number(n) => Some(Scalar::Number(*n)),
        TokenKind::Date(s) => Some(Scalar::Date(s.clone())),
        TokenKind::OpenBrace | TokenKind::CloseBrace | TokenKind::Equals | TokenKind::Eof => None,
    }
}

fn is_key_shaped(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier(_) | TokenKind::QuotedString(_) | TokenKind::Integer(_)
    )
}

fn token_as_key(tok: &Token) -> Result<String, ParserError> {
    match &tok.kind {
        TokenKind::Identifier(s) => Ok(s.clone()),
        TokenKind::QuotedString(s) => Ok(s.clone()),
        TokenKind::Integer(n) => Ok(n.to_string()),
        other => Err(ParserError::parse(
            format!("expected identifier key, got {other}"),
            tok.pos.line,
            tok.pos.col,
        )),
    }
}

fn push_scalar(stack: &mut [Frame], value: Value) {
    stack
        .last_mut()
        .expect("document frame always present")
        .items
        .push(FrameItem::Scalar(value));
}

fn attach_finished_block(stack: &mut Vec<Frame>, attach_key: Option<String>, value: Value) {
    let frame = stack.last_mut().expect("document frame always present");
    match attach_key {
        Some(key) => {
            frame.items.push(FrameItem::Assignment { key, value });
            frame.saw_assignment = true;
        }
        None => frame.items.push(FrameItem::Scalar(value)),
    }
}

/// Parses the whole document into a top-level object (mirroring spec
/// section 4.3's grammar: `document := (assignment)*`). Never panics: any
/// malformed input becomes a `ParserError::Parse` with the offending
/// position.
pub fn parse_document(input: &str) -> Result<Value, ParserError> {
    let mut tokenizer = Tokenizer::new(input);
    let mut lookahead: Option<Token> = None;
    let mut stack: Vec<Frame> = vec![Frame::new(None)];
    stack[0].saw_assignment = true; // the document itself is always an object

    loop {
        let tok = match lookahead.take() {
            Some(t) => t,
            None => tokenizer.next_token()?,
        };

        match tok.kind {
            TokenKind::Eof => {
                if stack.len() != 1 {
                    return Err(ParserError::parse(
                        "unterminated block: reached end of input with open '{'",
                        tok.pos.line,
                        tok.pos.col,
                    ));
                }
                return Ok(stack.pop().expect("document frame always present").into_value());
            }

            TokenKind::CloseBrace => {
                if stack.len() == 1 {
                    return Err(ParserError::parse(
                        "unexpected '}' with no matching '{'",
                        tok.pos.line,
                        tok.pos.col,
                    ));
                }
                let frame = stack.pop().expect("checked len above");
                let attach_key = frame.attach_key.clone();
                let value = frame.into_value();
                attach_finished_block(&mut stack, attach_key, value);
            }

            TokenKind::Equals => {
                return Err(ParserError::parse(
                    "unexpected '=' with no preceding key",
                    tok.pos.line,
                    tok.pos.col,
                ));
            }

            TokenKind::OpenBrace => {
                // A bare `{` reached directly by the main loop (not as the
                // value after `key =`) is a nested list item.
                stack.push(Frame::new(None));
            }

            _ if is_key_shaped(&tok.kind) || matches!(tok.kind, TokenKind::Number(_) | TokenKind::Date(_)) => {
                let next = match tokenizer.next_token() {
                    Ok(t) => t,
                    Err(e) => return Err(e),
                };

                if matches!(next.kind, TokenKind::Equals) && is_key_shaped(&tok.kind) {
                    let key = token_as_key(&tok)?;
                    let value_tok = tokenizer.next_token()?;
                    match value_tok.kind {
                        TokenKind::OpenBrace => {
                            stack.push(Frame::new(Some(key)));
                        }
                        TokenKind::Equals | TokenKind::CloseBrace | TokenKind::Eof => {
                            return Err(ParserError::parse(
                                format!("expected a value after '{key} =', got {}", value_tok.kind),
                                value_tok.pos.line,
                                value_tok.pos.col,
                            ));
                        }
                        other => {
                            let scalar = scalar_from_token(&other).ok_or_else(|| {
                                ParserError::parse(
                                    "expected a scalar value",
                                    value_tok.pos.line,
                                    value_tok.pos.col,
                                )
                            })?;
                            let frame = stack.last_mut().expect("document frame always present");
                            frame
                                .items
                                .push(FrameItem::Assignment { key, value: Value::Scalar(scalar) });
                            frame.saw_assignment = true;
                        }
                    }
                } else {
                    // `tok` was a bare scalar; `next` belongs to the
                    // following iteration.
                    let scalar = scalar_from_token(&tok.kind).ok_or_else(|| {
                        ParserError::parse("expected a scalar value", tok.pos.line, tok.pos.col)
                    })?;
                    push_scalar(&mut stack, Value::Scalar(scalar));
                    lookahead = Some(next);
                }
            }

            _ => unreachable!("tokenizer only emits the kinds matched above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Value {
        parse_document(input).expect("should parse")
    }

    #[test]
    fn simple_assignment() {
        let doc = parse("foo=1");
        assert_eq!(doc.get("foo"), Some(&Value::Scalar(Scalar::Integer(1))));
    }

    #[test]
    fn nested_object() {
        let doc = parse("a={ b=1 c=2 }");
        let a = doc.get("a").unwrap();
        assert_eq!(a.get("b"), Some(&Value::Scalar(Scalar::Integer(1))));
        assert_eq!(a.get("c"), Some(&Value::Scalar(Scalar::Integer(2))));
    }

    #[test]
    fn bare_scalar_block_is_a_list() {
        let doc = parse("a={ 1 2 3 }");
        let a = doc.get("a").unwrap();
        assert_eq!(
            a.as_list(),
            Some(
                &[
                    Value::Scalar(Scalar::Integer(1)),
                    Value::Scalar(Scalar::Integer(2)),
                    Value::Scalar(Scalar::Integer(3))
                ][..]
            )
        );
    }

    #[test]
    fn duplicate_keys_all_preserved() {
        let doc = parse(
            r#"leaders={ 1={ traits="trait_resilient" traits="trait_resilient" traits="trait_carefree" } }"#,
        );
        let leader = doc.get("leaders").unwrap().get("1").unwrap();
        let traits = leader.all_values_for_key("traits");
        assert_eq!(traits.len(), 3);
        assert_eq!(traits[2].as_scalar().unwrap().as_text(), "trait_carefree");
    }

    #[test]
    fn mixed_content_gathers_bare_scalars_under_implicit_index() {
        let doc = parse("a={ b=1 2 3 }");
        let a = doc.get("a").unwrap();
        let entries = a.as_object().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key, "b");
        assert_eq!(entries[1].key, "0");
        assert_eq!(entries[2].key, "1");
    }

    #[test]
    fn deeply_nested_blocks_do_not_overflow_stack() {
        let depth = 5000;
        let mut input = String::new();
        for _ in 0..depth {
            input.push_str("a={ ");
        }
        input.push('1');
        for _ in 0..depth {
            input.push_str(" }");
        }
        assert!(parse_document(&input).is_ok());
    }

    #[test]
    fn unterminated_block_is_parse_error() {
        assert!(parse_document("a={ b=1").is_err());
    }

    #[test]
    fn unexpected_close_brace_is_parse_error() {
        assert!(parse_document("a=1 }").is_err());
    }

    #[test]
    fn none_and_bool_identifiers() {
        let doc = parse("a=none b=yes c=no");
        assert!(doc.get("a").unwrap().is_none_identifier());
        assert_eq!(doc.get("b"), Some(&Value::Scalar(Scalar::Bool(true))));
        assert_eq!(doc.get("c"), Some(&Value::Scalar(Scalar::Bool(false))));
    }

    #[test]
    fn never_panics_on_garbage() {
        for input in ["{{{{{", "}}}}}", "= = =", "\"", "a=\"", "a={"] {
            let _ = parse_document(input);
        }
    }
}
