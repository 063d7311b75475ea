//! Per-render state: output sink, locale, function and template registries,
//! scratch bindings and the value-render hook.

use std::fmt;
use std::sync::Arc;

use tessera_ast::Template;

use crate::error::Result;
use crate::function::Function;
use crate::locale::Locale;
use crate::map::NameMap;
use crate::renderer::Renderer;
use crate::value::Value;

/// Hook offered every resolved value before default output. Receives the
/// path text, the value and the context; returning `true` marks the value
/// as handled and suppresses default writing.
pub type ValueRenderer = Arc<dyn Fn(&str, &Value, &mut RenderContext) -> bool + Send + Sync>;

/// Mutable state for one render, or for several sequential renders.
///
/// A context must not be shared between concurrent renders; parsed
/// templates can be, since they are never mutated.
#[derive(Clone, Default)]
pub struct RenderContext {
    output: String,
    locale: Locale,
    functions: NameMap<Function>,
    templates: NameMap<Option<Arc<Template>>>,
    scratch: NameMap<Value>,
    value_renderer: Option<ValueRenderer>,
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("locale", &self.locale)
            .field("functions", &self.functions.len())
            .field("templates", &self.templates.len())
            .field("scratch", &self.scratch)
            .field("value_renderer", &self.value_renderer.is_some())
            .finish()
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    /// Register a callable. A later registration under the same name
    /// (ignoring case) replaces the earlier one.
    pub fn register_function(&mut self, name: &str, function: Function) {
        self.functions.insert(name, function);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    // ------------------------------------------------------------------
    // Template registry
    // ------------------------------------------------------------------

    /// Register `template` under `name`, replacing any earlier entry, and
    /// declare the names it references.
    pub fn add_template(&mut self, name: &str, template: impl Into<Arc<Template>>) -> Arc<Template> {
        let template = template.into();
        self.declare_templates(template.references());
        self.templates.insert(name, Some(Arc::clone(&template)));
        template
    }

    /// Parse `source` and register it under `name`. The name doubles as the
    /// template's source path for error annotation.
    pub fn parse_template(&mut self, name: &str, source: &str) -> Result<Arc<Template>> {
        let template = tessera_ast::parse(source)?.with_path(name);
        Ok(self.add_template(name, template))
    }

    /// Record `name` as referenced without providing its template yet.
    pub fn declare_template(&mut self, name: &str) {
        self.templates.insert_if_absent(name, None);
    }

    pub fn declare_templates<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.declare_template(name.as_ref());
        }
    }

    /// Registered template, if `name` has one.
    pub fn template(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).and_then(Clone::clone)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.template(name).is_some()
    }

    /// Declared names that still have no template, in declaration order.
    pub fn pending_templates(&self) -> Vec<String> {
        self.templates
            .iter()
            .filter(|(_, template)| template.is_none())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    // ------------------------------------------------------------------
    // Value hook
    // ------------------------------------------------------------------

    pub fn set_value_renderer<F>(&mut self, hook: F)
    where
        F: Fn(&str, &Value, &mut RenderContext) -> bool + Send + Sync + 'static,
    {
        self.value_renderer = Some(Arc::new(hook));
    }

    pub fn clear_value_renderer(&mut self) {
        self.value_renderer = None;
    }

    pub fn value_renderer(&self) -> Option<ValueRenderer> {
        self.value_renderer.clone()
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    pub fn write_str(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Text written so far in the current render.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    // ------------------------------------------------------------------
    // Scratch
    // ------------------------------------------------------------------

    pub(crate) fn bind(&mut self, name: &str, value: Value) {
        self.scratch.insert(name, value);
    }

    pub(crate) fn scratch(&self) -> &NameMap<Value> {
        &self.scratch
    }

    /// Render `template` against `model`. Output and scratch bindings start
    /// empty; registries persist. On error, whatever was written stays
    /// available through [`RenderContext::output`].
    pub fn render(&mut self, template: &Template, model: &Value) -> Result<String> {
        self.output.clear();
        self.scratch = NameMap::new();
        Renderer::new(model, self).render_template(template)?;
        Ok(self.take_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_case_insensitive() {
        let mut ctx = RenderContext::new();
        ctx.parse_template("Header", "Hi").unwrap();
        assert!(ctx.has_template("HEADER"));
        assert_eq!(ctx.template("header").unwrap().path(), Some("Header"));
    }

    #[test]
    fn test_references_are_declared() {
        let mut ctx = RenderContext::new();
        ctx.parse_template("page", "{{ include header }}{{ include footer }}")
            .unwrap();
        assert_eq!(ctx.pending_templates(), vec!["header", "footer"]);

        ctx.parse_template("FOOTER", "bye").unwrap();
        assert_eq!(ctx.pending_templates(), vec!["header"]);
    }

    #[test]
    fn test_declare_does_not_replace() {
        let mut ctx = RenderContext::new();
        ctx.parse_template("a", "x").unwrap();
        ctx.declare_template("A");
        assert!(ctx.has_template("a"));
    }

    #[test]
    fn test_function_lookup() {
        let mut ctx = RenderContext::new();
        ctx.register_function("Pow", Function::from_fn(|n: i64| n * n));
        assert!(ctx.function("pow").is_some());
        assert!(ctx.function("sqrt").is_none());
    }

    #[test]
    fn test_render_resets_output() {
        let mut ctx = RenderContext::new();
        let template = tessera_ast::parse("Hello {{ . }}").unwrap();
        assert_eq!(ctx.render(&template, &Value::from("a")).unwrap(), "Hello a");
        assert_eq!(ctx.render(&template, &Value::from("b")).unwrap(), "Hello b");
        assert_eq!(ctx.output(), "");
    }

    #[test]
    fn test_parse_error_surfaces() {
        let mut ctx = RenderContext::new();
        assert!(ctx.parse_template("bad", "{{ end }}").is_err());
        assert!(!ctx.has_template("bad"));
    }
}
