//! Lexer for XTQL's EDN syntax
//!
//! Tokenizes XTQL query strings into a stream of tokens.
//!
//! # Features
//!
//! - Zero-copy tokenization (tokens reference the original input)
//! - Commas are whitespace, `;` starts a line comment
//! - Keywords (`:name`), parameters (`$name`), tags (`#inst`), sets (`#{`),
//!   namespaced maps (`#:xt{`) and the discard marker (`#_`)
//! - Never fails: malformed input becomes `Unknown` / `UnterminatedString`
//!   tokens which the reader reports with their position
//!
//! # Example
//!
//! ```rust
//! use xtql_parser::xtql::Lexer;
//!
//! let input = "(from :users [name])";
//! let tokens: Vec<_> = Lexer::new(input).collect();
//! assert_eq!(tokens.len(), 8); // ( from :users [ name ] ) EOF
//! ```

use super::keywords::lookup_literal;
use super::token::{Token, TokenKind};

/// A lexer for XTQL
///
/// Implements `Iterator` over `Token`s, allowing for lazy tokenization.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /// The input string being tokenized
    input: &'a str,
    /// Current byte position in the input
    position: usize,
    /// Whether we've emitted the EOF token
    eof_emitted: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            eof_emitted: false,
        }
    }

    /// Get the remaining input (for debugging)
    pub fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Get the current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Peek at the next character without consuming it
    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Peek at the character after the next one
    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    /// Advance the position by n bytes
    fn advance(&mut self, n: usize) {
        self.position = (self.position + n).min(self.input.len());
    }

    /// Advance by one character, returning its byte length
    fn advance_char(&mut self) -> usize {
        if let Some(c) = self.peek() {
            let len = c.len_utf8();
            self.advance(len);
            len
        } else {
            0
        }
    }

    /// Skip whitespace, commas and line comments
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.advance_char();
            } else if c == ';' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance_char();
                }
            } else {
                break;
            }
        }
    }

    /// Check if a character is valid inside a symbol, keyword or tag
    fn is_symbol_char(c: char) -> bool {
        c.is_alphanumeric() || "*+!-_'?<>=/.&%:".contains(c)
    }

    /// Check if a character can start a symbol
    fn is_symbol_start(c: char) -> bool {
        c.is_alphabetic() || "*+!-_'?<>=/.&%".contains(c)
    }

    /// Consume symbol characters, returning the byte range consumed
    fn consume_symbol_chars(&mut self) -> (usize, usize) {
        let start = self.position;
        while let Some(c) = self.peek() {
            if Self::is_symbol_char(c) {
                self.advance_char();
            } else {
                break;
            }
        }
        (start, self.position)
    }

    fn single(&mut self, kind: TokenKind) -> Token<'a> {
        let start = self.position;
        self.advance_char();
        Token::new(kind, &self.input[start..self.position], start, self.position)
    }

    /// Scan a double-quoted string. Escapes are kept raw and decoded by the reader.
    fn scan_string(&mut self) -> Token<'a> {
        let start = self.position;

        // Skip opening quote
        self.advance(1);
        let content_start = self.position;

        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    let content = &self.input[content_start..self.position];
                    self.advance(1);
                    return Token::new(TokenKind::String, content, start, self.position);
                }
                '\\' => {
                    self.advance(1);
                    self.advance_char();
                }
                _ => {
                    self.advance_char();
                }
            }
        }

        let content = &self.input[content_start..self.position];
        Token::new(TokenKind::UnterminatedString, content, start, self.position)
    }

    /// Scan a `#` dispatch: set, namespaced map or tag
    fn scan_dispatch(&mut self) -> Token<'a> {
        let start = self.position;
        self.advance(1);

        match self.peek() {
            Some('{') => {
                self.advance(1);
                Token::new(TokenKind::SetOpen, "#{", start, self.position)
            }
            Some(':') => {
                self.advance(1);
                let (ns_start, ns_end) = self.consume_symbol_chars();
                if ns_end > ns_start && self.peek() == Some('{') {
                    self.advance(1);
                    Token::new(
                        TokenKind::NamespacedMapOpen,
                        &self.input[ns_start..ns_end],
                        start,
                        self.position,
                    )
                } else {
                    let text = &self.input[start..self.position];
                    Token::new(TokenKind::Unknown, text, start, self.position)
                }
            }
            Some('_') => {
                self.advance(1);
                Token::new(TokenKind::Discard, "#_", start, self.position)
            }
            Some(c) if Self::is_symbol_start(c) => {
                let (tag_start, tag_end) = self.consume_symbol_chars();
                Token::new(TokenKind::Tag, &self.input[tag_start..tag_end], start, self.position)
            }
            _ => Token::new(TokenKind::Unknown, "#", start, self.position),
        }
    }

    /// Scan a sigil-prefixed name (`:keyword` or `$param`)
    fn scan_prefixed(&mut self, kind: TokenKind) -> Token<'a> {
        let start = self.position;
        self.advance(1);
        let (name_start, name_end) = self.consume_symbol_chars();
        if name_end == name_start {
            let text = &self.input[start..self.position];
            return Token::new(TokenKind::Unknown, text, start, self.position);
        }
        Token::new(kind, &self.input[name_start..name_end], start, self.position)
    }

    /// Scan a number; anything number-like that isn't a valid literal is `Unknown`
    fn scan_number(&mut self) -> Token<'a> {
        let (start, end) = self.consume_symbol_chars();
        let text = &self.input[start..end];
        let kind = classify_number(text);
        Token::new(kind, text, start, end)
    }

    /// Scan a symbol, recognizing true/false/nil
    fn scan_symbol(&mut self) -> Token<'a> {
        let (start, end) = self.consume_symbol_chars();
        let text = &self.input[start..end];
        let kind = lookup_literal(text).unwrap_or(TokenKind::Symbol);
        Token::new(kind, text, start, end)
    }

    /// Get the next token
    fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();

        if self.position >= self.input.len() {
            if self.eof_emitted {
                return None;
            }
            self.eof_emitted = true;
            return Some(Token::new(TokenKind::Eof, "", self.position, self.position));
        }

        let c = self.peek()?;

        let token = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '"' => self.scan_string(),
            '#' => self.scan_dispatch(),
            ':' => self.scan_prefixed(TokenKind::Keyword),
            '$' => self.scan_prefixed(TokenKind::Param),
            '0'..='9' => self.scan_number(),
            '-' | '+' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                self.scan_number()
            }
            _ if Self::is_symbol_start(c) => self.scan_symbol(),
            _ => self.single(TokenKind::Unknown),
        };

        Some(token)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Decide whether number-like text is an integer, a float, or garbage
fn classify_number(text: &str) -> TokenKind {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return TokenKind::Integer;
    }

    // digits [. [digits]] [(e|E) [+-] digits]
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    // `1.` reads as 1.0
    let frac_ok = frac_part.map_or(true, |f| f.is_empty() || all_digits(f));
    let mantissa_ok = all_digits(int_part) && frac_ok;
    let exponent_ok =
        exponent.map_or(true, |e| all_digits(e.strip_prefix(['-', '+']).unwrap_or(e)));
    let is_float = frac_part.is_some() || exponent.is_some();

    if mantissa_ok && exponent_ok && is_float {
        TokenKind::Float
    } else {
        TokenKind::Unknown
    }
}
