//! File loader that fills a context's template registry from disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_ast::{ParseOptions, Template};

use crate::context::RenderContext;
use crate::error::{Result, TesseraError};

/// Extension appended to template names when none is configured.
pub const DEFAULT_EXTENSION: &str = "tmpl";

struct TemplatePathResolver {
    root: PathBuf,
    extension: String,
}

impl TemplatePathResolver {
    fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root
            .as_ref()
            .canonicalize()
            .map_err(|e| TesseraError::IncludeError {
                message: format!("Invalid template root: {e}"),
            })?;
        Ok(Self {
            root,
            extension: DEFAULT_EXTENSION.to_string(),
        })
    }

    fn resolve_template_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        if !self.extension.is_empty() {
            path.set_extension(&self.extension);
        }
        path
    }

    fn ensure_within_root(&self, path: &Path) -> Result<()> {
        let candidate = self.canonicalize_candidate(path)?;
        if candidate.starts_with(&self.root) {
            return Ok(());
        }

        Err(TesseraError::IncludeError {
            message: format!("Path traversal detected: {}", path.display()),
        })
    }

    fn canonicalize_candidate(&self, path: &Path) -> Result<PathBuf> {
        let resolve_error = |e: std::io::Error| TesseraError::IncludeError {
            message: format!("Failed to resolve template path: {e}"),
        };
        if path.exists() {
            return path.canonicalize().map_err(resolve_error);
        }

        let (existing_parent, missing_segments) = split_existing_parent(path);
        let mut resolved = existing_parent.canonicalize().map_err(resolve_error)?;
        resolved.extend(missing_segments);
        Ok(resolved)
    }
}

fn split_existing_parent(path: &Path) -> (PathBuf, Vec<String>) {
    let mut cursor = path.to_path_buf();
    let mut missing_segments = Vec::new();

    while !cursor.exists() {
        let Some(name) = cursor.file_name().and_then(|s| s.to_str()) else {
            break;
        };
        missing_segments.push(name.to_string());

        let Some(parent) = cursor.parent() else {
            break;
        };
        if parent == cursor {
            break;
        }
        cursor = parent.to_path_buf();
    }

    missing_segments.reverse();
    (cursor, missing_segments)
}

/// Loads templates by name from a root directory. `header` maps to
/// `<root>/header.tmpl`, `partials/nav` to `<root>/partials/nav.tmpl`.
pub struct TemplateLoader {
    path_resolver: TemplatePathResolver,
    cache: HashMap<String, Arc<Template>>,
    trace: bool,
}

impl TemplateLoader {
    /// Create a loader rooted at `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            path_resolver: TemplatePathResolver::new(root)?,
            cache: HashMap::new(),
            trace: false,
        })
    }

    /// Use `extension` instead of `tmpl`; an empty string means names are
    /// file names as-is.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.path_resolver.extension = extension.into();
        self
    }

    /// Parse loaded files with token/node tracing enabled.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn root(&self) -> &Path {
        &self.path_resolver.root
    }

    /// Load and parse the template called `name`. Results are cached.
    pub fn load(&mut self, name: &str) -> Result<Arc<Template>> {
        validate_template_name(name)?;

        if let Some(template) = self.cache.get(name) {
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(self.load_and_parse(name)?);
        self.cache.insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Load every template `context` references but does not have yet,
    /// including those referenced by the newly loaded ones. Returns how
    /// many were loaded.
    pub fn load_pending(&mut self, context: &mut RenderContext) -> Result<usize> {
        let mut loaded = 0;
        loop {
            let pending = context.pending_templates();
            if pending.is_empty() {
                return Ok(loaded);
            }
            for name in pending {
                let template = self.load(&name)?;
                tracing::debug!(name = %name, "loaded template");
                context.add_template(&name, template);
                loaded += 1;
            }
        }
    }

    fn load_and_parse(&self, name: &str) -> Result<Template> {
        let path = self.path_resolver.resolve_template_path(name);
        self.path_resolver.ensure_within_root(&path)?;

        if !path.is_file() {
            return Err(TesseraError::IncludeError {
                message: format!("Template file not found: {} ({})", name, path.display()),
            });
        }

        let source = fs::read_to_string(&path)?;
        let options = ParseOptions::default()
            .with_trace(self.trace)
            .with_path(path.display().to_string());
        Ok(tessera_ast::parse_with(&source, &options)?)
    }
}

/// Template names are `/`-separated segments of letters, digits, `_` and `-`.
fn validate_template_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| TesseraError::IncludeError {
        message: format!("Invalid template name '{name}': {reason}"),
    };

    if name.contains("..") || name.contains("//") || name.contains('\\') || name.contains(':') {
        return Err(invalid("path traversal"));
    }

    let mut segments = name.split('/').filter(|s| !s.is_empty()).peekable();
    if segments.peek().is_none() {
        return Err(invalid("empty name"));
    }
    for segment in segments {
        if !is_valid_segment(segment) {
            return Err(invalid(&format!("bad segment '{segment}'")));
        }
    }

    Ok(())
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
