//! Syntax layer for Tessera templates: lexer, parser, and render tree.
//!
//! ```rust
//! let template = tessera_ast::parse("Hello {{ .name }}!").unwrap();
//! assert_eq!(template.nodes().len(), 3);
//! ```

use std::fmt;

use thiserror::Error;

mod ast;
pub mod lexer;
pub mod parser;
mod path;
pub mod token;

pub use ast::{
    BlockNode, Condition, ForeachNode, FunctionNode, IfNode, IncludeNode, Node, Template,
    TextNode, ValueNode,
};
pub use path::{ModelPath, PathSegment};

// ============================================================================
// Location
// ============================================================================

/// Location in source code (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{message} (line {}, column {})", location.line, location.column)]
    Lex { message: String, location: Location },

    #[error("unbound '{keyword}' at {location}")]
    UnboundEnd { keyword: String, location: Location },

    #[error("'{directive}' opened at {location} is never closed with 'end'")]
    Unclosed { directive: String, location: Location },

    #[error("invalid {directive} at {location}: {message}")]
    Invalid {
        directive: String,
        message: String,
        location: Location,
    },

    #[error("unexpected parameter '{value}' at {location}")]
    UnexpectedParameter { value: String, location: Location },

    #[error("extends must appear at the beginning of the template ({location})")]
    ExtendsNotFirst { location: Location },

    #[error("a template that extends another can only contain blocks ({location})")]
    ContentOutsideBlock { location: Location },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match self {
            ParseError::Lex { location, .. }
            | ParseError::UnboundEnd { location, .. }
            | ParseError::Unclosed { location, .. }
            | ParseError::Invalid { location, .. }
            | ParseError::UnexpectedParameter { location, .. }
            | ParseError::ExtendsNotFirst { location }
            | ParseError::ContentOutsideBlock { location } => *location,
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Parser configuration.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Emit `tracing` debug events for every token and node.
    pub trace: bool,
    /// Source path recorded on the template for error annotation.
    pub path: Option<String>,
}

impl ParseOptions {
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Parse template source with default options.
pub fn parse(source: &str) -> Result<Template, ParseError> {
    parse_with(source, &ParseOptions::default())
}

/// Scan the whole source, then parse the token stream.
pub fn parse_with(source: &str, options: &ParseOptions) -> Result<Template, ParseError> {
    let tokens = lexer::Lexer::new(source).with_trace(options.trace).scan();
    let template = parser::Parser::new(tokens)
        .with_trace(options.trace)
        .parse()?;
    Ok(match &options.path {
        Some(path) => template.with_path(path.clone()),
        None => template,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_path() {
        let options = ParseOptions::default().with_path("views/home.tmpl");
        let template = parse_with("Hi", &options).unwrap();
        assert_eq!(template.path(), Some("views/home.tmpl"));
    }

    #[test]
    fn test_lex_error_surfaces_as_parse_error() {
        let err = parse("Hello {{ .name").unwrap_err();
        assert!(matches!(err, ParseError::Lex { .. }));
        assert_eq!(err.location().line, 1);
    }

    #[test]
    fn test_trace_does_not_change_result() {
        let options = ParseOptions::default().with_trace(true);
        let template = parse_with("{{ foreach(x in .xs) }}{{ .x }}{{ end }}", &options).unwrap();
        assert_eq!(template.nodes().len(), 1);
    }
}
