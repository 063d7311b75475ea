//! Render tree produced by the parser.

use std::sync::Arc;

use crate::{Location, ModelPath};

/// A parsed template: an immutable node sequence plus its base template name,
/// source path, and the sub-template names it references.
#[derive(Debug, Clone, Default)]
pub struct Template {
    nodes: Vec<Node>,
    base: Option<String>,
    path: Option<String>,
    references: Vec<String>,
}

impl Template {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        base: Option<String>,
        path: Option<String>,
        references: Vec<String>,
    ) -> Self {
        Self {
            nodes,
            base,
            path,
            references,
        }
    }

    /// A fresh template holding a copy of `base`'s nodes, used for one extends render.
    pub fn composed_from(base: &Template) -> Self {
        Self {
            nodes: base.nodes.clone(),
            base: None,
            path: None,
            references: base.references.clone(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Name given to `extends`, if any.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Source path used to annotate render errors.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Names referenced by `include` and `extends`, in first-seen order.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Top-level blocks.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockNode> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Block(block) => Some(block),
            _ => None,
        })
    }

    /// Returns a copy whose function calls carry pre-computed output wherever
    /// `value_for` returns `Some`. Nested bodies are visited too.
    pub fn with_function_values<F>(&self, mut value_for: F) -> Template
    where
        F: FnMut(&FunctionNode) -> Option<String>,
    {
        self.map_nodes(|nodes| map_function_values(nodes, &mut value_for))
    }

    fn map_nodes(&self, f: impl FnOnce(&[Node]) -> Vec<Node>) -> Template {
        Template {
            nodes: f(&self.nodes),
            base: self.base.clone(),
            path: self.path.clone(),
            references: self.references.clone(),
        }
    }
}

fn map_function_values<F>(nodes: &[Node], value_for: &mut F) -> Vec<Node>
where
    F: FnMut(&FunctionNode) -> Option<String>,
{
    nodes
        .iter()
        .map(|node| match node {
            Node::Function(function) => Node::Function(function.attach(value_for)),
            Node::If(node) => Node::If(IfNode {
                condition: match &node.condition {
                    Condition::Call(call) => Condition::Call(call.attach(value_for)),
                    path => path.clone(),
                },
                body: map_function_values(&node.body, value_for),
                else_body: node
                    .else_body
                    .as_ref()
                    .map(|body| map_function_values(body, value_for)),
                location: node.location,
            }),
            Node::Foreach(node) => Node::Foreach(ForeachNode {
                item: node.item.clone(),
                index: node.index.clone(),
                collection: node.collection.clone(),
                body: map_function_values(&node.body, value_for),
                location: node.location,
            }),
            Node::Block(node) => Node::Block(BlockNode {
                name: node.name.clone(),
                body: Arc::new(
                    node.body
                        .map_nodes(|nodes| map_function_values(nodes, value_for)),
                ),
                location: node.location,
            }),
            other => other.clone(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum Node {
    Text(TextNode),
    Value(ValueNode),
    Function(FunctionNode),
    If(IfNode),
    Foreach(ForeachNode),
    Include(IncludeNode),
    Block(BlockNode),
}

impl Node {
    pub fn location(&self) -> Location {
        match self {
            Node::Text(n) => n.location,
            Node::Value(n) => n.location,
            Node::Function(n) => n.location,
            Node::If(n) => n.location,
            Node::Foreach(n) => n.location,
            Node::Include(n) => n.location,
            Node::Block(n) => n.location,
        }
    }

    pub(crate) fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.content.trim().is_empty())
    }
}

/// Literal text.
#[derive(Debug, Clone)]
pub struct TextNode {
    pub content: String,
    pub location: Location,
}

/// `{{ .path }}`
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub path: ModelPath,
    pub location: Location,
}

/// `{{ name(arg, ...) }}`
#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: String,
    pub args: Vec<String>,
    /// Output attached ahead of rendering; skips evaluation when set.
    pub value: Option<String>,
    pub location: Location,
}

impl FunctionNode {
    fn attach<F>(&self, value_for: &mut F) -> FunctionNode
    where
        F: FnMut(&FunctionNode) -> Option<String>,
    {
        FunctionNode {
            name: self.name.clone(),
            args: self.args.clone(),
            value: value_for(self).or_else(|| self.value.clone()),
            location: self.location,
        }
    }
}

/// Test of an `if` directive.
#[derive(Debug, Clone)]
pub enum Condition {
    Path(ModelPath),
    Call(FunctionNode),
}

/// `{{ if cond }} ... {{ else }} ... {{ end }}`
#[derive(Debug, Clone)]
pub struct IfNode {
    pub condition: Condition,
    pub body: Vec<Node>,
    pub else_body: Option<Vec<Node>>,
    pub location: Location,
}

/// `{{ foreach(item[, index] in .path) }} ... {{ end }}`
#[derive(Debug, Clone)]
pub struct ForeachNode {
    pub item: String,
    pub index: Option<String>,
    pub collection: ModelPath,
    pub body: Vec<Node>,
    pub location: Location,
}

/// `{{ include name }}`
#[derive(Debug, Clone)]
pub struct IncludeNode {
    pub name: String,
    pub location: Location,
}

/// `{{ block name }} ... {{ end }}`
///
/// The body is shared so that an extending template can register it
/// in a render context without copying.
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub name: String,
    pub body: Arc<Template>,
    pub location: Location,
}
