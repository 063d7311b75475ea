//! Tree-walking renderer, including extends/block composition.

use std::sync::Arc;

use tessera_ast::{
    Condition, ForeachNode, FunctionNode, IfNode, ModelPath, Node, Template, ValueNode,
};

use crate::context::RenderContext;
use crate::error::{Result, TesseraError};
use crate::evaluator;
use crate::function::{coerce, ArgType};
use crate::resolver::Resolver;
use crate::value::Value;

/// Renders templates into a context's output for one model.
pub struct Renderer<'a> {
    model: &'a Value,
    context: &'a mut RenderContext,
    /// Lowercased names of the includes and blocks being rendered, outermost first.
    active: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub fn new(model: &'a Value, context: &'a mut RenderContext) -> Self {
        Self {
            model,
            context,
            active: Vec::new(),
        }
    }

    /// Render `template`, composing it with its base when it extends one.
    /// Errors are annotated with the template's source path when known.
    pub fn render_template(&mut self, template: &Template) -> Result<()> {
        let result = match template.base() {
            Some(base) => self.render_extended(template, base),
            None => self.render_nodes(template.nodes()),
        };
        match (result, template.path()) {
            (Err(source), Some(path)) => Err(TesseraError::Render {
                path: path.to_string(),
                source: Box::new(source),
            }),
            (result, _) => result,
        }
    }

    fn render_extended(&mut self, template: &Template, base: &str) -> Result<()> {
        let base_template =
            self.context
                .template(base)
                .ok_or_else(|| TesseraError::BaseTemplateNotFound {
                    name: base.to_string(),
                })?;

        let composed = Template::composed_from(&base_template);
        for block in template.blocks() {
            self.context.add_template(&block.name, Arc::clone(&block.body));
        }
        self.render_template(&composed)
    }

    fn render_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(n) => self.context.write_str(&n.content),
                Node::Value(n) => self.render_value(n)?,
                Node::Function(n) => self.render_function(n)?,
                Node::If(n) => self.render_if(n)?,
                Node::Foreach(n) => self.render_foreach(n)?,
                Node::Include(n) => self.render_registered(&n.name, "include")?,
                Node::Block(n) => self.render_registered(&n.name, "block")?,
            }
        }
        Ok(())
    }

    fn render_value(&mut self, node: &ValueNode) -> Result<()> {
        let value = self.resolve(&node.path)?;

        if let Some(hook) = self.context.value_renderer() {
            if hook(node.path.as_str(), &value, &mut *self.context) {
                return Ok(());
            }
        }

        match value {
            Value::Null => {}
            Value::Template(template) => self.render_template(&template)?,
            other => self.context.write_str(&other.to_string()),
        }
        Ok(())
    }

    fn render_function(&mut self, node: &FunctionNode) -> Result<()> {
        let value = self.call(node)?;
        let text = evaluator::display(&value, self.context);
        self.context.write_str(&text);
        Ok(())
    }

    fn render_if(&mut self, node: &IfNode) -> Result<()> {
        let test = match &node.condition {
            Condition::Path(path) => self.resolve(path)?,
            Condition::Call(call) => self.call(call)?,
        };
        let test = match coerce(test, ArgType::Bool) {
            Ok(Value::Bool(b)) => b,
            Ok(_) => false,
            Err(cause) => {
                return Err(TesseraError::TypeError {
                    message: format!("if condition at {}: {cause}", node.location),
                })
            }
        };

        if test {
            self.render_nodes(&node.body)
        } else if let Some(else_body) = &node.else_body {
            self.render_nodes(else_body)
        } else {
            Ok(())
        }
    }

    /// Only arrays iterate. Maps, objects and scalars render nothing.
    fn render_foreach(&mut self, node: &ForeachNode) -> Result<()> {
        match self.resolve(&node.collection)? {
            Value::Array(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    self.context.bind(&node.item, item);
                    if let Some(index_name) = &node.index {
                        self.context.bind(index_name, Value::from(index));
                    }
                    self.render_nodes(&node.body)?;
                }
            }
            other => {
                tracing::trace!(
                    collection = %node.collection,
                    kind = other.type_name(),
                    "foreach over a non-list value renders nothing"
                );
            }
        }
        // The index binding keeps its last value.
        self.context.bind(&node.item, Value::Null);
        Ok(())
    }

    /// Render the registry entry for an include or block name.
    fn render_registered(&mut self, name: &str, kind: &str) -> Result<()> {
        let Some(template) = self.context.template(name) else {
            tracing::trace!(name, kind, "no template registered, rendering nothing");
            return Ok(());
        };

        let key = name.to_lowercase();
        if self.active.contains(&key) {
            return Err(TesseraError::CircularReference {
                name: name.to_string(),
            });
        }

        self.active.push(key);
        let result = self.render_template(&template);
        self.active.pop();
        result
    }

    fn resolve(&self, path: &ModelPath) -> Result<Value> {
        Resolver::new(self.model, self.context.scratch()).resolve(path)
    }

    /// Evaluate a call, or return its attached value.
    fn call(&self, node: &FunctionNode) -> Result<Value> {
        if let Some(value) = &node.value {
            return Ok(Value::String(value.clone()));
        }
        let context: &RenderContext = self.context;
        evaluator::evaluate(node, &Resolver::new(self.model, context.scratch()), context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(source: &str, model: serde_json::Value) -> Result<String> {
        let template = tessera_ast::parse(source)?;
        RenderContext::new().render(&template, &Value::from(model))
    }

    #[test]
    fn test_text_is_copied() {
        assert_eq!(render("plain text", json!(null)).unwrap(), "plain text");
    }

    #[test]
    fn test_null_value_renders_nothing() {
        assert_eq!(render("[{{ .missing }}]", json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_foreach_clears_item_but_keeps_index() {
        let out = render(
            "{{ foreach(x, i in .xs) }}{{ end }}[{{ .x }}][{{ .i }}]",
            json!({"xs": ["a", "b", "c"]}),
        )
        .unwrap();
        assert_eq!(out, "[][2]");
    }

    #[test]
    fn test_foreach_over_non_list_is_silent() {
        let out = render("{{ foreach(x in .name) }}{{ .x }}{{ end }}!", json!({"name": "abc"})).unwrap();
        assert_eq!(out, "!");

        let out = render("{{ foreach(x in .m) }}{{ .x }}{{ end }}!", json!({"m": {"a": 1}})).unwrap();
        assert_eq!(out, "!");
    }

    #[test]
    fn test_if_on_model_value() {
        let source = "{{ if .admin }}yes{{ else }}no{{ end }}";
        assert_eq!(render(source, json!({"admin": true})).unwrap(), "yes");
        assert_eq!(render(source, json!({"admin": "false"})).unwrap(), "no");
        assert_eq!(render(source, json!({})).unwrap(), "no");
    }

    #[test]
    fn test_if_on_unconvertible_value_fails() {
        let err = render("{{ if .xs }}x{{ end }}", json!({"xs": [1]})).unwrap_err();
        assert!(matches!(err, TesseraError::TypeError { .. }));
    }

    #[test]
    fn test_missing_include_is_silent() {
        assert_eq!(render("a{{ include nothing }}b", json!({})).unwrap(), "ab");
    }

    #[test]
    fn test_circular_include() {
        let mut ctx = RenderContext::new();
        ctx.parse_template("loop", "x{{ include loop }}").unwrap();
        let template = tessera_ast::parse("{{ include loop }}").unwrap();
        let err = ctx.render(&template, &Value::Null).unwrap_err();
        assert!(matches!(err.root_cause(), TesseraError::CircularReference { .. }));
        assert!(matches!(err, TesseraError::Render { ref path, .. } if path == "loop"));
    }

    #[test]
    fn test_missing_base() {
        let template = tessera_ast::parse("{{ extends main }}{{ block a }}{{ end }}").unwrap();
        let err = RenderContext::new().render(&template, &Value::Null).unwrap_err();
        assert!(matches!(err, TesseraError::BaseTemplateNotFound { ref name } if name == "main"));
    }

    #[test]
    fn test_template_values_render_in_place() {
        let nested = tessera_ast::parse("<{{ .name }}>").unwrap();
        let model: Value = vec![
            ("name", Value::from("Ann")),
            ("partial", Value::from(nested)),
        ]
        .into_iter()
        .collect();
        let template = tessera_ast::parse("{{ .partial }}").unwrap();
        let out = RenderContext::new().render(&template, &model).unwrap();
        assert_eq!(out, "<Ann>");
    }

    #[test]
    fn test_attached_function_value() {
        let template = tessera_ast::parse("{{ missing(1) }}")
            .unwrap()
            .with_function_values(|f| (f.name == "missing").then(|| "cached".to_string()));
        let out = RenderContext::new().render(&template, &Value::Null).unwrap();
        assert_eq!(out, "cached");
    }
}
