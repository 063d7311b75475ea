//! Tessera - a small `{{ }}` text templating engine
//!
//! Templates mix literal text with directives:
//! - `{{ .customer.name }}`, `{{ .items[0] }}`, `{{ .map["key"] }}` model values
//! - `{{ func(arg, .path) }}` host or built-in function calls
//! - `{{ if cond }} ... {{ else }} ... {{ end }}` and `{{ foreach(item, i in .list) }} ... {{ end }}`
//! - `{{ include name }}`, `{{ extends name }}` and `{{ block name }} ... {{ end }}` composition
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let result = tessera::render(
//!     "Hello {{ .name }}!",
//!     json!({"name": "Patrick"}),
//! ).unwrap();
//!
//! assert_eq!(result, "Hello Patrick!");
//! ```

pub mod builtins;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod locale;
pub mod map;
pub mod renderer;
pub mod resolver;
pub mod template_loader;
pub mod value;

pub use context::{RenderContext, ValueRenderer};
pub use error::{Result, TesseraError};
pub use function::{Arg, ArgType, Call, Function, ParamKind, Rest};
pub use locale::Locale;
pub use map::NameMap;
pub use renderer::Renderer;
pub use template_loader::TemplateLoader;
pub use tessera_ast::{Location, ModelPath, ParseError, ParseOptions, Template};
pub use value::{Object, Value};

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

/// A parsed template bound to its own render context. Parse once, render
/// many times.
pub struct Tessera {
    template: Arc<Template>,
    context: RenderContext,
    loader: Option<TemplateLoader>,
}

impl Tessera {
    /// Parse a template source string
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::json;
    ///
    /// let mut tmpl = tessera::Tessera::parse("Hello {{ .name }}!").unwrap();
    /// assert_eq!(tmpl.render(json!({"name": "Alice"})).unwrap(), "Hello Alice!");
    /// assert_eq!(tmpl.render(json!({"name": "Bob"})).unwrap(), "Hello Bob!");
    /// ```
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with(source, &ParseOptions::default())
    }

    pub fn parse_with(source: &str, options: &ParseOptions) -> Result<Self> {
        let template = tessera_ast::parse_with(source, options)?;
        Ok(Self::from_template(template))
    }

    /// Read and parse a template file. Render errors are annotated with its path.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let options = ParseOptions::default().with_path(path.display().to_string());
        Self::parse_with(&source, &options)
    }

    /// Parse a template whose `include`/`extends` names are loaded from
    /// `root` on first render.
    ///
    /// ```rust,ignore
    /// let mut tmpl = tessera::Tessera::parse_with_includes(
    ///     "{{ include header }}",
    ///     "templates",
    /// ).unwrap();
    /// ```
    pub fn parse_with_includes(source: &str, root: impl AsRef<Path>) -> Result<Self> {
        let mut tessera = Self::parse(source)?;
        tessera.loader = Some(TemplateLoader::new(root)?);
        Ok(tessera)
    }

    /// Bind an already parsed template to a fresh context.
    pub fn from_template(template: impl Into<Arc<Template>>) -> Self {
        let template = template.into();
        let mut context = RenderContext::new();
        context.declare_templates(template.references());
        Self {
            template,
            context,
            loader: None,
        }
    }

    /// Parse `source` and register it for `include`, `extends` and `block`
    /// references to `name`.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<Arc<Template>> {
        self.context.parse_template(name, source)
    }

    pub fn register_function(&mut self, name: &str, function: Function) -> &mut Self {
        self.context.register_function(name, function);
        self
    }

    pub fn set_locale(&mut self, locale: Locale) -> &mut Self {
        self.context.set_locale(locale);
        self
    }

    /// Offer every resolved model value to `hook` before default output;
    /// returning `true` suppresses it.
    pub fn on_render_value<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&str, &Value, &mut RenderContext) -> bool + Send + Sync + 'static,
    {
        self.context.set_value_renderer(hook);
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Render against `model`. Templates still missing from the registry are
    /// loaded first when a loader is attached.
    pub fn render(&mut self, model: impl Into<Value>) -> Result<String> {
        if let Some(loader) = self.loader.as_mut() {
            loader.load_pending(&mut self.context)?;
        }
        let model = model.into();
        self.context.render(&self.template, &model)
    }

    /// Render against any serializable model.
    pub fn render_serialize<T: Serialize + ?Sized>(&mut self, model: &T) -> Result<String> {
        self.render(Value::from_serialize(model)?)
    }
}

/// Convenience function: parse and render in one call
pub fn render(source: &str, data: serde_json::Value) -> Result<String> {
    Tessera::parse(source)?.render(data)
}

/// Convenience function: parse and render, loading referenced templates from `root`
///
/// ```rust,ignore
/// use serde_json::json;
///
/// let result = tessera::render_with_includes(
///     "{{ include header }}",
///     json!({}),
///     "templates",
/// ).unwrap();
/// ```
pub fn render_with_includes(
    source: &str,
    data: serde_json::Value,
    root: impl AsRef<Path>,
) -> Result<String> {
    Tessera::parse_with_includes(source, root)?.render(data)
}
