//! Token types for the XTQL lexer

use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's payload (slice into original input).
    ///
    /// Sigils and quotes are stripped: `:xt/id` yields `xt/id`, `$p` yields
    /// `p`, `"a\nb"` yields the raw (still escaped) `a\nb`.
    pub text: &'a str,
    /// Byte offset of the first character in the original input
    pub offset: usize,
    /// Byte offset one past the last character in the original input
    pub end: usize,
}

impl<'a> Token<'a> {
    /// Create a new token
    pub fn new(kind: TokenKind, text: &'a str, offset: usize, end: usize) -> Self {
        Self {
            kind,
            text,
            offset,
            end,
        }
    }

    /// Length of the token's source text in bytes
    pub fn len(&self) -> usize {
        self.end - self.offset
    }

    /// Check if token is empty
    pub fn is_empty(&self) -> bool {
        self.end == self.offset
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Keyword => write!(f, ":{}", self.text),
            TokenKind::Param => write!(f, "${}", self.text),
            TokenKind::Tag => write!(f, "#{}", self.text),
            TokenKind::NamespacedMapOpen => write!(f, "#:{}{{", self.text),
            TokenKind::String | TokenKind::UnterminatedString => write!(f, "\"{}\"", self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}

/// The kind of token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // === Delimiters ===
    /// "("
    LParen,
    /// ")"
    RParen,
    /// "["
    LBracket,
    /// "]"
    RBracket,
    /// "{"
    LBrace,
    /// "}"
    RBrace,
    /// "#{" - set literal
    SetOpen,
    /// "#:ns{" - namespaced map literal
    NamespacedMapOpen,

    // === Dispatch ===
    /// "#tag" - tagged literal prefix
    Tag,
    /// "#_" - drops the next form
    Discard,

    // === Atoms ===
    /// Symbol (logic variable, operator or function name)
    Symbol,
    /// ":name" keyword
    Keyword,
    /// "$name" query parameter
    Param,
    /// Double-quoted string
    String,
    /// Integer literal
    Integer,
    /// Floating-point literal
    Float,
    /// "true"
    True,
    /// "false"
    False,
    /// "nil"
    Nil,

    // === Special ===
    /// String missing its closing quote
    UnterminatedString,
    /// End of input
    Eof,
    /// Unknown/invalid token
    Unknown,
}

impl TokenKind {
    /// Check if this token opens a collection
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::SetOpen
                | TokenKind::NamespacedMapOpen
        )
    }

    /// Check if this token closes a collection
    pub fn is_close(&self) -> bool {
        matches!(
            self,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace
        )
    }

    /// Check if this is a self-contained value
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            TokenKind::Symbol
                | TokenKind::Keyword
                | TokenKind::Param
                | TokenKind::String
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
        )
    }

    /// The closing delimiter matching an opening one
    pub fn closer(&self) -> Option<TokenKind> {
        match self {
            TokenKind::LParen => Some(TokenKind::RParen),
            TokenKind::LBracket => Some(TokenKind::RBracket),
            TokenKind::LBrace | TokenKind::SetOpen | TokenKind::NamespacedMapOpen => {
                Some(TokenKind::RBrace)
            }
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::SetOpen => write!(f, "'#{{'"),
            TokenKind::NamespacedMapOpen => write!(f, "namespaced map"),
            TokenKind::Tag => write!(f, "tag"),
            TokenKind::Discard => write!(f, "'#_'"),
            TokenKind::Symbol => write!(f, "symbol"),
            TokenKind::Keyword => write!(f, "keyword"),
            TokenKind::Param => write!(f, "parameter"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Integer => write!(f, "integer"),
            TokenKind::Float => write!(f, "float"),
            TokenKind::True | TokenKind::False => write!(f, "boolean"),
            TokenKind::Nil => write!(f, "nil"),
            TokenKind::UnterminatedString => write!(f, "unterminated string"),
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Unknown => write!(f, "unknown token"),
        }
    }
}
