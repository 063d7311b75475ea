//! Token types for the Tessera lexer.

use crate::Location;

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Raw text outside `{{ }}`.
    Text,
    /// Directive or function name (`if`, `foreach`, `equals`, ...).
    Function,
    /// A model path or a function argument, as written.
    Parameter,
    /// Lexing stopped; the value holds the message.
    Error,
}

/// A token with its kind, raw text, and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            value: value.into(),
            location,
        }
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.kind == TokenKind::Function && self.value == name
    }

    pub fn is_parameter(&self) -> bool {
        self.kind == TokenKind::Parameter
    }
}
