//! Hand-written lexer for Tessera templates.
//!
//! A small state machine over a byte window `start..pos`:
//! - Text: raw text until `{{`
//! - Keyword: directive/function name, or a `.` model key
//! - ModelKey: a single path followed by `}}`
//! - Parameter: one free-form parameter up to `}}` (used by `include`)
//! - Parameters: comma/space separated arguments up to `)` or `}}`
//! - Quoted: a `"..."` argument, `\"` does not close it
//! - Instruction: `end` / `else`, nothing but `}}` may follow
//!
//! Lex errors do not abort with `Err`; they are pushed as a final
//! [`TokenKind::Error`] token and the parser reports them.

use crate::token::{Token, TokenKind};
use crate::{Location, ParseError};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Scan a source string into tokens. The stream may end in an Error token.
pub fn scan(source: &str) -> Vec<Token> {
    Lexer::new(source).scan()
}

/// Scan a source string, turning a trailing Error token into a [`ParseError`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = scan(source);
    if let Some(index) = tokens.iter().position(|t| t.kind == TokenKind::Error) {
        let token = tokens.swap_remove(index);
        return Err(ParseError::Lex {
            message: token.value,
            location: token.location,
        });
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Keyword,
    ModelKey,
    Parameter,
    Parameters,
    Quoted,
    Instruction,
}

pub struct Lexer<'a> {
    input: &'a str,
    start: usize,
    pos: usize,
    width: usize,
    line_starts: Vec<usize>,
    tokens: Vec<Token>,
    trace: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(input.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            input,
            start: 0,
            pos: 0,
            width: 0,
            line_starts,
            tokens: Vec::new(),
            trace: false,
        }
    }

    /// Emit a `debug` event for every token.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Run the state machine to completion.
    pub fn scan(mut self) -> Vec<Token> {
        let mut state = Some(State::Text);
        while let Some(current) = state {
            state = self.step(current);
        }
        self.tokens
    }

    fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::Text => self.lex_text(),
            State::Keyword => self.lex_keyword(),
            State::ModelKey => self.lex_model_key(),
            State::Parameter => self.lex_parameter(),
            State::Parameters => self.lex_parameters(),
            State::Quoted => self.lex_quoted(),
            State::Instruction => self.lex_instruction(),
        }
    }

    fn lex_text(&mut self) -> Option<State> {
        match self.input[self.pos..].find(OPEN) {
            Some(offset) => {
                self.pos += offset;
                self.emit(TokenKind::Text);
                Some(State::Keyword)
            }
            None => {
                self.pos = self.input.len();
                self.emit(TokenKind::Text);
                None
            }
        }
    }

    fn lex_keyword(&mut self) -> Option<State> {
        self.accept_word(OPEN);
        self.accept_run(" ");
        self.ignore();

        if self.peek() == Some('.') {
            return Some(State::ModelKey);
        }

        while matches!(self.peek(), Some(c) if is_name_char(c)) {
            self.next();
        }
        let input = self.input;
        let name = &input[self.start..self.pos];
        self.emit(TokenKind::Function);
        self.accept_run(" (");
        self.ignore();

        match name {
            "if" if self.has_prefix(CLOSE) => self.fail("Condition not found"),
            "if" => Some(State::Keyword),
            "end" | "else" => Some(State::Instruction),
            "include" => Some(State::Parameter),
            _ => Some(State::Parameters),
        }
    }

    fn lex_model_key(&mut self) -> Option<State> {
        while matches!(self.peek(), Some(c) if is_key_char(c)) {
            self.next();
        }
        self.emit(TokenKind::Parameter);
        self.accept_run(" ");
        if !self.accept_word(CLOSE) {
            return self.fail("Error after model key");
        }
        self.ignore();
        Some(State::Text)
    }

    fn lex_parameter(&mut self) -> Option<State> {
        self.accept_run(" ");
        self.ignore();
        loop {
            if self.has_prefix(CLOSE) {
                self.emit(TokenKind::Parameter);
                self.accept_word(CLOSE);
                self.ignore();
                return Some(State::Text);
            }
            if self.next().is_none() {
                return self.fail("Unfinished parameter");
            }
        }
    }

    fn lex_parameters(&mut self) -> Option<State> {
        self.accept_run(" ,");
        self.ignore();
        loop {
            if self.has_prefix(")") {
                self.emit(TokenKind::Parameter);
                self.accept_run(") ");
                if !self.accept_word(CLOSE) {
                    return self.fail("Expected '}}' after ')'");
                }
                self.ignore();
                return Some(State::Text);
            }
            if self.has_prefix(CLOSE) {
                self.emit(TokenKind::Parameter);
                self.accept_word(CLOSE);
                self.ignore();
                return Some(State::Text);
            }
            match self.next() {
                Some('"') => return Some(State::Quoted),
                Some(' ') | Some(',') => {
                    self.backup();
                    self.emit(TokenKind::Parameter);
                    self.accept_run(" ,");
                    self.ignore();
                }
                Some(_) => {}
                None => return self.fail("Unfinished parameter"),
            }
        }
    }

    fn lex_quoted(&mut self) -> Option<State> {
        loop {
            match self.next() {
                Some('\\') => {
                    if self.peek() == Some('"') {
                        self.next();
                    }
                }
                Some('"') => {
                    self.emit(TokenKind::Parameter);
                    return Some(State::Parameters);
                }
                Some(_) => {}
                None => return self.fail("Unfinished quoted parameter"),
            }
        }
    }

    fn lex_instruction(&mut self) -> Option<State> {
        self.accept_run(" ");
        if !self.accept_word(CLOSE) {
            return self.fail("Expected '}}'");
        }
        self.ignore();
        Some(State::Text)
    }

    // ------------------------------------------------------------------
    // Window primitives
    // ------------------------------------------------------------------

    fn next(&mut self) -> Option<char> {
        match self.input[self.pos..].chars().next() {
            Some(c) => {
                self.width = c.len_utf8();
                self.pos += self.width;
                Some(c)
            }
            None => {
                self.width = 0;
                None
            }
        }
    }

    /// Step back over the last character returned by `next`. Only valid once per call.
    fn backup(&mut self) {
        self.pos -= self.width;
        self.width = 0;
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.input[self.pos..].starts_with(prefix)
    }

    fn accept_word(&mut self, word: &str) -> bool {
        if self.has_prefix(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn accept_run(&mut self, valid: &str) {
        while matches!(self.peek(), Some(c) if valid.contains(c)) {
            self.next();
        }
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn emit(&mut self, kind: TokenKind) {
        if self.pos == self.start {
            return;
        }
        let value = &self.input[self.start..self.pos];
        let location = self.location(self.start);
        if self.trace {
            tracing::debug!(index = self.tokens.len(), kind = ?kind, value, %location, "token");
        }
        self.tokens.push(Token::new(kind, value, location));
        self.start = self.pos;
    }

    fn fail(&mut self, message: &str) -> Option<State> {
        let location = self.location(self.pos);
        let message = format!("{message} at position {}", self.pos);
        if self.trace {
            tracing::debug!(%location, message = %message, "lex error");
        }
        self.tokens.push(Token::new(TokenKind::Error, message, location));
        None
    }

    fn location(&self, offset: usize) -> Location {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self.input[line_start..offset].chars().count() + 1;
        Location::new(line, column, offset)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_key_char(c: char) -> bool {
    is_name_char(c) || matches!(c, '.' | '[' | ']' | '"' | '\'')
}
