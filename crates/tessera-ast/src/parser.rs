//! Recursive descent parser for Tessera templates.
//!
//! Consumes the flat token stream from the lexer and builds the render tree.
//! A body ends at `end`/`else` (left for the caller to consume) or at the end
//! of input.

use std::sync::Arc;

use crate::token::{Token, TokenKind};
use crate::{
    BlockNode, Condition, ForeachNode, FunctionNode, IfNode, IncludeNode, ModelPath, Node,
    ParseError, Template, TextNode, ValueNode,
};

const DIRECTIVES: &[&str] = &["if", "else", "end", "foreach", "include", "block", "extends"];

/// Parse a token stream into a Template.
pub fn parse(tokens: Vec<Token>) -> Result<Template, ParseError> {
    Parser::new(tokens).parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    End,
    Else,
    Eof,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    base: Option<String>,
    references: Vec<String>,
    trace: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            base: None,
            references: Vec::new(),
            trace: false,
        }
    }

    /// Emit a `debug` event for every node built.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn parse(mut self) -> Result<Template, ParseError> {
        let (nodes, _) = self.parse_body(0)?;
        validate_extends(&nodes)?;
        Ok(Template::from_parts(nodes, self.base, None, self.references))
    }

    fn parse_body(&mut self, depth: usize) -> Result<(Vec<Node>, Terminator), ParseError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.current().cloned() {
            let node = match token.kind {
                TokenKind::Error => {
                    return Err(ParseError::Lex {
                        message: token.value,
                        location: token.location,
                    })
                }
                TokenKind::Text => {
                    self.advance();
                    Node::Text(TextNode {
                        content: token.value,
                        location: token.location,
                    })
                }
                TokenKind::Parameter if token.value.trim_start().starts_with('.') => {
                    self.advance();
                    Node::Value(ValueNode {
                        path: ModelPath::parse(&token.value),
                        location: token.location,
                    })
                }
                TokenKind::Parameter => {
                    return Err(ParseError::UnexpectedParameter {
                        value: token.value,
                        location: token.location,
                    })
                }
                TokenKind::Function => match token.value.as_str() {
                    "end" | "else" => {
                        if depth == 0 {
                            return Err(ParseError::UnboundEnd {
                                keyword: token.value,
                                location: token.location,
                            });
                        }
                        let terminator = if token.value == "end" {
                            Terminator::End
                        } else {
                            Terminator::Else
                        };
                        return Ok((nodes, terminator));
                    }
                    "include" => self.parse_include(&token)?,
                    "block" => self.parse_block(&token, depth)?,
                    "foreach" => self.parse_foreach(&token, depth)?,
                    "if" => self.parse_if(&token, depth)?,
                    _ => {
                        self.advance();
                        let function = self.parse_function(&token);
                        if function.name == "extends" {
                            self.record_extends(&function, depth)?;
                        }
                        Node::Function(function)
                    }
                },
            };

            if self.trace {
                tracing::debug!(depth, location = %node.location(), node = ?NodeKind(&node), "node");
            }
            nodes.push(node);
        }

        Ok((nodes, Terminator::Eof))
    }

    fn parse_include(&mut self, keyword: &Token) -> Result<Node, ParseError> {
        self.advance();
        let name = self.expect_name(keyword, "include")?;
        self.reference(&name);
        Ok(Node::Include(IncludeNode {
            name,
            location: keyword.location,
        }))
    }

    fn parse_block(&mut self, keyword: &Token, depth: usize) -> Result<Node, ParseError> {
        self.advance();
        let name = self.expect_name(keyword, "block")?;
        let body = self.parse_closed_body(keyword, depth)?;
        Ok(Node::Block(BlockNode {
            name,
            body: Arc::new(Template::new(body)),
            location: keyword.location,
        }))
    }

    fn parse_foreach(&mut self, keyword: &Token, depth: usize) -> Result<Node, ParseError> {
        self.advance();

        let item = match self.next_parameter() {
            Some(token) => clean_argument(&token.value),
            None => return Err(invalid(keyword, "foreach", "Iterate name not found")),
        };
        if item.is_empty() {
            return Err(invalid(keyword, "foreach", "Iterate name not found"));
        }

        if self.peek_parameter(",") {
            self.advance();
        }

        let index = match self.current() {
            Some(token) if token.is_parameter() && token.value.trim() != "in" => {
                let name = clean_argument(&token.value);
                self.advance();
                Some(name)
            }
            _ => None,
        };

        if !self.peek_parameter("in") {
            return Err(invalid(keyword, "foreach", "'in' not found"));
        }
        self.advance();

        let collection = match self.next_parameter() {
            Some(token) => ModelPath::parse(&token.value),
            None => return Err(invalid(keyword, "foreach", "Model not found")),
        };

        let body = self.parse_closed_body(keyword, depth)?;
        Ok(Node::Foreach(ForeachNode {
            item,
            index,
            collection,
            body,
            location: keyword.location,
        }))
    }

    fn parse_if(&mut self, keyword: &Token, depth: usize) -> Result<Node, ParseError> {
        self.advance();

        let condition = match self.current().cloned() {
            Some(token) if token.is_parameter() => {
                self.advance();
                Condition::Path(ModelPath::parse(&token.value))
            }
            Some(token)
                if token.kind == TokenKind::Function
                    && !DIRECTIVES.contains(&token.value.as_str()) =>
            {
                self.advance();
                Condition::Call(self.parse_function(&token))
            }
            Some(token) if token.kind == TokenKind::Error => {
                return Err(ParseError::Lex {
                    message: token.value,
                    location: token.location,
                })
            }
            _ => return Err(invalid(keyword, "if", "Condition not found")),
        };

        let (body, terminator) = self.parse_body(depth + 1)?;
        let else_body = match terminator {
            Terminator::End => {
                self.advance();
                None
            }
            Terminator::Else => {
                self.advance();
                Some(self.parse_closed_body(keyword, depth)?)
            }
            Terminator::Eof => return Err(unclosed(keyword)),
        };

        Ok(Node::If(IfNode {
            condition,
            body,
            else_body,
            location: keyword.location,
        }))
    }

    /// Arguments are the Parameter tokens that follow the name.
    fn parse_function(&mut self, name: &Token) -> FunctionNode {
        let mut args = Vec::new();
        while let Some(token) = self.next_parameter() {
            if token.value.trim() == "," {
                continue;
            }
            args.push(clean_argument(&token.value));
        }
        FunctionNode {
            name: name.value.clone(),
            args,
            value: None,
            location: name.location,
        }
    }

    fn record_extends(&mut self, function: &FunctionNode, depth: usize) -> Result<(), ParseError> {
        if depth > 0 || self.base.is_some() {
            return Err(ParseError::ExtendsNotFirst {
                location: function.location,
            });
        }
        let Some(base) = function.args.first().filter(|name| !name.is_empty()) else {
            return Err(ParseError::Invalid {
                directive: "extends".to_string(),
                message: "Base template name not specified".to_string(),
                location: function.location,
            });
        };
        self.reference(base);
        self.base = Some(base.clone());
        Ok(())
    }

    /// Parse a body that must be closed by `end`, and consume the `end`.
    fn parse_closed_body(&mut self, opener: &Token, depth: usize) -> Result<Vec<Node>, ParseError> {
        let (body, terminator) = self.parse_body(depth + 1)?;
        match terminator {
            Terminator::End => {
                self.advance();
                Ok(body)
            }
            Terminator::Else => Err(ParseError::UnboundEnd {
                keyword: "else".to_string(),
                location: self
                    .current()
                    .map(|t| t.location)
                    .unwrap_or(opener.location),
            }),
            Terminator::Eof => Err(unclosed(opener)),
        }
    }

    fn expect_name(&mut self, keyword: &Token, directive: &str) -> Result<String, ParseError> {
        let name = self
            .next_parameter()
            .map(|token| clean_argument(&token.value))
            .unwrap_or_default();
        if name.is_empty() {
            return Err(invalid(keyword, directive, "Name not specified"));
        }
        Ok(name)
    }

    fn reference(&mut self, name: &str) {
        if !self
            .references
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name))
        {
            self.references.push(name.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn next_parameter(&mut self) -> Option<Token> {
        let token = self.current().filter(|t| t.is_parameter()).cloned()?;
        self.advance();
        Some(token)
    }

    fn peek_parameter(&self, value: &str) -> bool {
        matches!(self.current(), Some(token) if token.is_parameter() && token.value.trim() == value)
    }
}

/// Trim separators and one layer of surrounding double quotes.
fn clean_argument(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c| c == ',' || c == ' ');
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.to_string(),
        None => trimmed.to_string(),
    }
}

fn invalid(keyword: &Token, directive: &str, message: &str) -> ParseError {
    ParseError::Invalid {
        directive: directive.to_string(),
        message: message.to_string(),
        location: keyword.location,
    }
}

fn unclosed(keyword: &Token) -> ParseError {
    ParseError::Unclosed {
        directive: keyword.value.clone(),
        location: keyword.location,
    }
}

/// `extends` must be the first non-blank top-level item, and then only blocks may follow.
fn validate_extends(nodes: &[Node]) -> Result<(), ParseError> {
    let mut extends = false;
    for (index, node) in nodes.iter().filter(|n| !n.is_blank_text()).enumerate() {
        let is_extends = matches!(node, Node::Function(f) if f.name == "extends");
        if is_extends && index > 0 {
            return Err(ParseError::ExtendsNotFirst {
                location: node.location(),
            });
        }
        if extends && !matches!(node, Node::Block(_)) {
            return Err(ParseError::ContentOutsideBlock {
                location: node.location(),
            });
        }
        extends |= is_extends;
    }
    Ok(())
}

struct NodeKind<'a>(&'a Node);

impl std::fmt::Debug for NodeKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.0 {
            Node::Text(_) => "text",
            Node::Value(_) => "value",
            Node::Function(_) => "function",
            Node::If(_) => "if",
            Node::Foreach(_) => "foreach",
            Node::Include(_) => "include",
            Node::Block(_) => "block",
        };
        f.write_str(kind)
    }
}
