//! EDN reader: turns the token stream into a tree of forms
//!
//! The reader knows nothing about XTQL operators. It checks delimiters,
//! decodes literals, bounds nesting depth and attaches a byte span to every
//! form so later stages can report precise positions.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::CharIndices;

use super::error::{ParseError, ParseErrorKind, Position};
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

/// Byte range of a form in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A single EDN value with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Form<'a> {
    pub kind: FormKind<'a>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind<'a> {
    List(Vec<Form<'a>>),
    Vector(Vec<Form<'a>>),
    Map(Vec<(Form<'a>, Form<'a>)>),
    Set(Vec<Form<'a>>),
    /// `#:ns{...}` - keys are qualified with the namespace
    NamespacedMap(&'a str, Vec<(Form<'a>, Form<'a>)>),
    /// `#tag value`
    Tagged(&'a str, Box<Form<'a>>),
    Symbol(&'a str),
    Keyword(&'a str),
    Param(&'a str),
    Str(Cow<'a, str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
}

impl<'a> Form<'a> {
    /// Short description used in error messages
    pub fn describe(&self) -> &'static str {
        match self.kind {
            FormKind::List(_) => "list",
            FormKind::Vector(_) => "vector",
            FormKind::Map(_) | FormKind::NamespacedMap(..) => "map",
            FormKind::Set(_) => "set",
            FormKind::Tagged(..) => "tagged literal",
            FormKind::Symbol(_) => "symbol",
            FormKind::Keyword(_) => "keyword",
            FormKind::Param(_) => "parameter",
            FormKind::Str(_) => "string",
            FormKind::Int(_) => "integer",
            FormKind::Float(_) => "float",
            FormKind::Bool(_) => "boolean",
            FormKind::Nil => "nil",
        }
    }

    /// The symbol name, if this form is a symbol
    pub fn as_symbol(&self) -> Option<&'a str> {
        match self.kind {
            FormKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The keyword name (without colon), if this form is a keyword
    pub fn as_keyword(&self) -> Option<&'a str> {
        match self.kind {
            FormKind::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

/// Reads exactly one top-level form from a query string
pub struct Reader<'a> {
    input: &'a str,
    tokens: Peekable<Lexer<'a>>,
    max_depth: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str, max_depth: usize) -> Self {
        Self {
            input,
            tokens: Lexer::new(input).peekable(),
            max_depth,
        }
    }

    /// Read the whole input, which must hold exactly one form
    pub fn read(mut self) -> Result<Form<'a>, ParseError> {
        self.skip_discarded(0)?;
        if self.peek_kind() == TokenKind::Eof {
            return Err(self.error(ParseErrorKind::EmptyQuery, "empty query", 0));
        }

        let form = self.read_form(0)?;
        self.skip_discarded(0)?;

        let next = self.next_token();
        if next.kind != TokenKind::Eof {
            return Err(self.error(
                ParseErrorKind::TrailingInput,
                format!("unexpected {} after the query; expected a single top-level form", next.kind),
                next.offset,
            ));
        }

        Ok(form)
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.tokens.peek().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn next_token(&mut self) -> Token<'a> {
        let end = self.input.len();
        self.tokens
            .next()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, "", end, end))
    }

    fn error(&self, kind: ParseErrorKind, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::at(kind, message, self.input, offset)
    }

    fn position(&self, offset: usize) -> Position {
        Position::from_offset(self.input, offset)
    }

    /// Consume any `#_ form` pairs ahead of the next form
    ///
    /// Stacked markers (`#_ #_ a b`) are counted rather than recursed into,
    /// so long chains cannot exhaust the stack.
    fn skip_discarded(&mut self, depth: usize) -> Result<(), ParseError> {
        let mut pending = 0usize;
        let mut marker_offset = 0;
        loop {
            match self.peek_kind() {
                TokenKind::Discard => {
                    marker_offset = self.next_token().offset;
                    pending += 1;
                }
                _ if pending == 0 => return Ok(()),
                TokenKind::Eof => {
                    return Err(self.error(
                        ParseErrorKind::UnexpectedEof,
                        "#_ requires a form to discard",
                        self.input.len(),
                    ))
                }
                kind if kind.is_close() => {
                    return Err(self.error(
                        ParseErrorKind::InvalidExpression,
                        format!("#_ requires a form to discard, found {}", kind),
                        marker_offset,
                    ))
                }
                _ => {
                    self.read_form(depth)?;
                    pending -= 1;
                }
            }
        }
    }

    fn read_form(&mut self, depth: usize) -> Result<Form<'a>, ParseError> {
        self.skip_discarded(depth)?;
        let token = self.next_token();
        let span = Span {
            start: token.offset,
            end: token.end,
        };

        let kind = match token.kind {
            TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::SetOpen
            | TokenKind::NamespacedMapOpen => return self.read_collection(token, depth),

            TokenKind::Tag => {
                if depth >= self.max_depth {
                    return Err(self.too_deep(token.offset));
                }
                self.skip_discarded(depth + 1)?;
                if self.peek_kind() == TokenKind::Eof {
                    return Err(self.error(
                        ParseErrorKind::UnexpectedEof,
                        format!("tag #{} requires a value", token.text),
                        self.input.len(),
                    ));
                }
                let value = self.read_form(depth + 1)?;
                let span = Span {
                    start: token.offset,
                    end: value.span.end,
                };
                return Ok(Form {
                    kind: FormKind::Tagged(token.text, Box::new(value)),
                    span,
                });
            }

            TokenKind::Symbol => FormKind::Symbol(token.text),
            TokenKind::Keyword => FormKind::Keyword(token.text),
            TokenKind::Param => FormKind::Param(token.text),
            TokenKind::True => FormKind::Bool(true),
            TokenKind::False => FormKind::Bool(false),
            TokenKind::Nil => FormKind::Nil,
            TokenKind::String => FormKind::Str(unescape(token.text).map_err(|(rel, msg)| {
                // +1 skips the opening quote
                self.error(ParseErrorKind::Lexical, msg, token.offset + 1 + rel)
            })?),
            TokenKind::Integer => match token.text.parse::<i64>() {
                Ok(n) => FormKind::Int(n),
                Err(_) => {
                    return Err(self.error(
                        ParseErrorKind::Lexical,
                        format!("integer literal '{}' is out of range", token.text),
                        token.offset,
                    ))
                }
            },
            TokenKind::Float => match token.text.parse::<f64>() {
                Ok(n) if n.is_finite() => FormKind::Float(n),
                _ => {
                    return Err(self.error(
                        ParseErrorKind::Lexical,
                        format!("float literal '{}' is out of range", token.text),
                        token.offset,
                    ))
                }
            },

            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                return Err(self.error(
                    ParseErrorKind::UnbalancedDelimiter,
                    format!("unexpected {} with nothing to close", token.kind),
                    token.offset,
                ))
            }
            // skip_discarded leaves no marker at the head
            TokenKind::Discard => {
                return Err(self.error(ParseErrorKind::Lexical, "unexpected '#_'", token.offset))
            }
            TokenKind::UnterminatedString => {
                return Err(self.error(ParseErrorKind::Lexical, "unterminated string", token.offset))
            }
            TokenKind::Unknown => {
                let looks_numeric = token
                    .text
                    .trim_start_matches(['-', '+'])
                    .starts_with(|c: char| c.is_ascii_digit());
                let message = if looks_numeric {
                    format!("invalid number '{}'", token.text)
                } else {
                    format!("unexpected '{}'", token.text)
                };
                return Err(self.error(ParseErrorKind::Lexical, message, token.offset));
            }
            TokenKind::Eof => {
                return Err(self.error(
                    ParseErrorKind::UnexpectedEof,
                    "unexpected end of input",
                    token.offset,
                ))
            }
        };

        Ok(Form { kind, span })
    }

    fn too_deep(&self, offset: usize) -> ParseError {
        self.error(
            ParseErrorKind::NestingTooDeep,
            format!("forms nested deeper than {} levels", self.max_depth),
            offset,
        )
    }

    fn read_collection(&mut self, open: Token<'a>, depth: usize) -> Result<Form<'a>, ParseError> {
        if depth >= self.max_depth {
            return Err(self.too_deep(open.offset));
        }

        let closer = open.kind.closer().unwrap_or(TokenKind::RParen);
        let mut items = Vec::new();

        let end = loop {
            self.skip_discarded(depth + 1)?;
            match self.peek_kind() {
                kind if kind == closer => {
                    break self.next_token().end;
                }
                TokenKind::Eof => {
                    return Err(self.error(
                        ParseErrorKind::UnexpectedEof,
                        format!(
                            "unclosed {} opened at {}",
                            open.kind,
                            self.position(open.offset)
                        ),
                        self.input.len(),
                    ));
                }
                kind if kind.is_close() => {
                    let stray = self.next_token();
                    return Err(self.error(
                        ParseErrorKind::UnbalancedDelimiter,
                        format!(
                            "expected {} to close {} opened at {}, found {}",
                            closer,
                            open.kind,
                            self.position(open.offset),
                            stray.kind
                        ),
                        stray.offset,
                    ));
                }
                _ => items.push(self.read_form(depth + 1)?),
            }
        };

        let span = Span {
            start: open.offset,
            end,
        };

        let kind = match open.kind {
            TokenKind::LParen => FormKind::List(items),
            TokenKind::LBracket => FormKind::Vector(items),
            TokenKind::SetOpen => FormKind::Set(items),
            TokenKind::LBrace => FormKind::Map(self.pair_up(items, span)?),
            _ => FormKind::NamespacedMap(open.text, self.pair_up(items, span)?),
        };

        Ok(Form { kind, span })
    }

    fn pair_up(
        &self,
        items: Vec<Form<'a>>,
        span: Span,
    ) -> Result<Vec<(Form<'a>, Form<'a>)>, ParseError> {
        if items.len() % 2 != 0 {
            return Err(self.error(
                ParseErrorKind::InvalidExpression,
                "map literal requires an even number of forms",
                span.start,
            ));
        }

        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((key, value));
        }
        Ok(pairs)
    }
}

/// Decode string escapes. On failure returns the byte offset of the bad
/// escape relative to `raw`, and a message.
fn unescape(raw: &str) -> Result<Cow<'_, str>, (usize, String)> {
    if !raw.contains('\\') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices();

    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '"')) => out.push('"'),
            Some((_, '\\')) => out.push('\\'),
            Some((_, '/')) => out.push('/'),
            Some((_, 'n')) => out.push('\n'),
            Some((_, 't')) => out.push('\t'),
            Some((_, 'r')) => out.push('\r'),
            Some((_, 'b')) => out.push('\u{8}'),
            Some((_, 'f')) => out.push('\u{c}'),
            Some((_, 'u')) => {
                let high = hex4(&mut chars)
                    .map_err(|hex| (i, format!("invalid unicode escape '\\u{}'", hex)))?;
                let code = if (0xD800..=0xDBFF).contains(&high) {
                    // UTF-16 pair: the low half must follow as another \uXXXX
                    let mut ahead = chars.clone();
                    let low = match (ahead.next(), ahead.next()) {
                        (Some((_, '\\')), Some((_, 'u'))) => hex4(&mut ahead)
                            .ok()
                            .filter(|low| (0xDC00..=0xDFFF).contains(low)),
                        _ => None,
                    };
                    let Some(low) = low else {
                        return Err((i, format!("unpaired surrogate '\\u{:04X}'", high)));
                    };
                    chars = ahead;
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => return Err((i, format!("unpaired surrogate '\\u{:04X}'", code))),
                }
            }
            Some((_, other)) => return Err((i, format!("invalid escape '\\{}'", other))),
            None => return Err((i, "dangling escape at end of string".to_string())),
        }
    }

    Ok(Cow::Owned(out))
}

/// Read the four hex digits of a `\uXXXX` escape
fn hex4(chars: &mut CharIndices<'_>) -> Result<u32, String> {
    let hex: String = chars.by_ref().take(4).map(|(_, h)| h).collect();
    if hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()) {
        u32::from_str_radix(&hex, 16).map_err(|_| hex)
    } else {
        Err(hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str) -> Result<Form<'_>, ParseError> {
        Reader::new(input, 16).read()
    }

    fn read_err(input: &str) -> ParseError {
        read(input).unwrap_err()
    }

    #[test]
    fn test_read_list_with_span() {
        let form = read("  (from :users [name])").unwrap();
        assert_eq!(form.span, Span { start: 2, end: 22 });
        match form.kind {
            FormKind::List(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].as_symbol(), Some("from"));
                assert_eq!(items[1].as_keyword(), Some("users"));
                assert!(matches!(items[2].kind, FormKind::Vector(_)));
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_read_literals() {
        assert_eq!(read("42").unwrap().kind, FormKind::Int(42));
        assert_eq!(read("-1.5").unwrap().kind, FormKind::Float(-1.5));
        assert_eq!(read("true").unwrap().kind, FormKind::Bool(true));
        assert_eq!(read("nil").unwrap().kind, FormKind::Nil);
        assert_eq!(read("$p").unwrap().kind, FormKind::Param("p"));
    }

    #[test]
    fn test_read_string_escapes() {
        let form = read(r#""a\"b\né""#).unwrap();
        assert_eq!(form.kind, FormKind::Str(Cow::Owned("a\"b\né".to_string())));
    }

    #[test]
    fn test_plain_string_is_borrowed() {
        let form = read(r#""plain""#).unwrap();
        assert!(matches!(form.kind, FormKind::Str(Cow::Borrowed("plain"))));
    }

    #[test]
    fn test_invalid_escape_position() {
        let err = read_err(r#"  "ab\qc""#);
        assert_eq!(err.kind, ParseErrorKind::Lexical);
        assert_eq!(err.position.offset, 5);
    }

    #[test]
    fn test_map_and_namespaced_map() {
        let form = read("{:a 1 :b 2}").unwrap();
        assert!(matches!(form.kind, FormKind::Map(ref pairs) if pairs.len() == 2));

        let form = read("#:xt{:id id}").unwrap();
        match form.kind {
            FormKind::NamespacedMap(ns, pairs) => {
                assert_eq!(ns, "xt");
                assert_eq!(pairs.len(), 1);
            }
            other => panic!("expected namespaced map, got {:?}", other),
        }
    }

    #[test]
    fn test_odd_map() {
        let err = read_err("{:a}");
        assert_eq!(err.kind, ParseErrorKind::InvalidExpression);
    }

    #[test]
    fn test_tagged_literal() {
        let form = read("#inst \"2024-01-01T00:00:00Z\"").unwrap();
        match form.kind {
            FormKind::Tagged(tag, value) => {
                assert_eq!(tag, "inst");
                assert!(matches!(value.kind, FormKind::Str(_)));
            }
            other => panic!("expected tagged literal, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_comment_only() {
        assert_eq!(read_err("").kind, ParseErrorKind::EmptyQuery);
        assert_eq!(read_err("   \n\t ").kind, ParseErrorKind::EmptyQuery);
        assert_eq!(read_err("; nothing here").kind, ParseErrorKind::EmptyQuery);
    }

    #[test]
    fn test_trailing_input() {
        let err = read_err("(from :a [x]) (from :b [y])");
        assert_eq!(err.kind, ParseErrorKind::TrailingInput);
        assert_eq!(err.position.offset, 14);
    }

    #[test]
    fn test_unclosed() {
        let err = read_err("(from :a [x]");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
        assert!(err.message.contains("opened at 1:1"), "{}", err.message);
    }

    #[test]
    fn test_mismatched_closer() {
        let err = read_err("(from :a [x)");
        assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiter);
        assert_eq!(err.position.offset, 11);
    }

    #[test]
    fn test_stray_closer() {
        let err = read_err(")");
        assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiter);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "[".repeat(17), "]".repeat(17));
        assert_eq!(read_err(&deep).kind, ParseErrorKind::NestingTooDeep);

        let ok = format!("{}{}", "[".repeat(16), "]".repeat(16));
        assert!(read(&ok).is_ok());
    }

    #[test]
    fn test_surrogate_pair_escape() {
        let form = read(r#""smile \uD83D\uDE00!""#).unwrap();
        assert_eq!(form.kind, FormKind::Str(Cow::Owned("smile \u{1F600}!".to_string())));

        let form = read(r#""\u00e9""#).unwrap();
        assert_eq!(form.kind, FormKind::Str(Cow::Owned("é".to_string())));
    }

    #[test]
    fn test_lone_surrogate_rejected() {
        let err = read_err(r#""\uD83D""#);
        assert_eq!(err.kind, ParseErrorKind::Lexical);
        assert!(err.message.contains("unpaired surrogate"), "{}", err.message);
        assert_eq!(err.position.offset, 1);

        let err = read_err(r#""\uD83Dx\uDE00""#);
        assert!(err.message.contains("unpaired surrogate"), "{}", err.message);

        let err = read_err(r#""\uDE00""#);
        assert!(err.message.contains("unpaired surrogate"), "{}", err.message);

        let err = read_err(r#""\uZZZZ""#);
        assert!(err.message.contains("invalid unicode escape"), "{}", err.message);
    }

    #[test]
    fn test_discard_drops_next_form() {
        let form = read("[a #_ b c]").unwrap();
        match form.kind {
            FormKind::Vector(items) => {
                let names: Vec<_> = items.iter().filter_map(Form::as_symbol).collect();
                assert_eq!(names, vec!["a", "c"]);
            }
            other => panic!("expected vector, got {:?}", other),
        }

        let form = read("{:a 1 #_ :b #_ 2}").unwrap();
        assert!(matches!(form.kind, FormKind::Map(ref pairs) if pairs.len() == 1));

        let form = read("#_ (ignored) [x] #_ trailing").unwrap();
        assert!(matches!(form.kind, FormKind::Vector(ref items) if items.len() == 1));
    }

    #[test]
    fn test_stacked_discards() {
        let form = read("[#_ #_ a b c]").unwrap();
        match form.kind {
            FormKind::Vector(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].as_symbol(), Some("c"));
            }
            other => panic!("expected vector, got {:?}", other),
        }

        let chain = format!("[{} x]", "#_ 1 ".repeat(10_000));
        assert!(read(&chain).is_ok());
    }

    #[test]
    fn test_discard_is_not_a_tag() {
        // Dropping the value leaves `:a :b 2`, an odd map
        let err = read_err("{:a #_ 1 :b 2}");
        assert_eq!(err.kind, ParseErrorKind::InvalidExpression);

        let form = read("#inst #_ 0 \"2024-01-01T00:00:00Z\"").unwrap();
        assert!(matches!(form.kind, FormKind::Tagged("inst", _)));
    }

    #[test]
    fn test_discard_without_form() {
        assert_eq!(read_err("#_").kind, ParseErrorKind::UnexpectedEof);
        assert_eq!(read_err("[x #_]").kind, ParseErrorKind::InvalidExpression);
        assert_eq!(read_err("#_ (from :t [a])").kind, ParseErrorKind::EmptyQuery);
    }

    #[test]
    fn test_number_errors() {
        assert_eq!(read_err("99999999999999999999").kind, ParseErrorKind::Lexical);
        assert_eq!(read_err("1e999").kind, ParseErrorKind::Lexical);
        let err = read_err("12abc");
        assert!(err.message.contains("invalid number"), "{}", err.message);
    }
}
