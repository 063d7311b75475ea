//! Resolution of model paths against the model root and the scratch table.

use std::borrow::Cow;

use tessera_ast::{ModelPath, PathSegment};

use crate::error::{Result, TesseraError};
use crate::map::NameMap;
use crate::value::Value;

/// Walks model paths. The model is consulted first; scratch bindings
/// (loop and index variables) are a fallback when the model yields null.
pub struct Resolver<'a> {
    model: &'a Value,
    scratch: &'a NameMap<Value>,
}

impl<'a> Resolver<'a> {
    pub fn new(model: &'a Value, scratch: &'a NameMap<Value>) -> Self {
        Self { model, scratch }
    }

    /// Resolve `path`; a miss anywhere yields `Value::Null`.
    pub fn resolve(&self, path: &ModelPath) -> Result<Value> {
        if path.is_root() {
            return Ok(self.model.clone());
        }
        if let Some(value) = self.walk(Cow::Borrowed(self.model), path.segments())? {
            return Ok(value.into_owned());
        }

        let Some((first, rest)) = path.segments().split_first() else {
            return Ok(Value::Null);
        };
        let Some(bound) = self.scratch.get(&first.name) else {
            return Ok(Value::Null);
        };
        let value = match self.index_all(Cow::Borrowed(bound), first)? {
            Some(head) => self.walk(head, rest)?,
            None => None,
        };
        Ok(value.map(Cow::into_owned).unwrap_or(Value::Null))
    }

    /// Resolve a function argument: `.path` through the model, anything else literally.
    pub fn argument(&self, text: &str) -> Result<Value> {
        if text.starts_with('.') {
            self.resolve(&ModelPath::parse(text))
        } else {
            Ok(Value::String(text.to_string()))
        }
    }

    fn walk<'v>(
        &self,
        mut current: Cow<'v, Value>,
        segments: &[PathSegment],
    ) -> Result<Option<Cow<'v, Value>>> {
        for segment in segments {
            let Some(next) = field(current, &segment.name) else {
                return Ok(None);
            };
            current = match self.index_all(next, segment)? {
                Some(value) => value,
                None => return Ok(None),
            };
        }
        Ok(Some(current).filter(|value| !value.is_null()))
    }

    /// Apply the segment's indexes in order; a null along the way stops the walk.
    fn index_all<'v>(
        &self,
        mut current: Cow<'v, Value>,
        segment: &PathSegment,
    ) -> Result<Option<Cow<'v, Value>>> {
        for index in &segment.indexes {
            if current.is_null() {
                return Ok(None);
            }
            current = match self.index(current, &segment.name, index)? {
                Some(value) => value,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    fn index<'v>(
        &self,
        value: Cow<'v, Value>,
        name: &str,
        expr: &str,
    ) -> Result<Option<Cow<'v, Value>>> {
        let Some(index) = self.index_text(expr)? else {
            return Ok(None);
        };

        if index.starts_with(|c: char| c.is_ascii_digit()) {
            let position: usize = index.parse().map_err(|_| TesseraError::InvalidIndex {
                name: name.to_string(),
                index: index.clone(),
            })?;
            return match value {
                Cow::Borrowed(Value::Array(items)) => Ok(items.get(position).map(Cow::Borrowed)),
                Cow::Owned(Value::Array(mut items)) if position < items.len() => {
                    Ok(Some(Cow::Owned(items.swap_remove(position))))
                }
                Cow::Owned(Value::Array(_)) => Ok(None),
                _ => Err(TesseraError::NotAList {
                    name: name.to_string(),
                    index,
                }),
            };
        }

        match value {
            Cow::Borrowed(Value::Map(map)) => Ok(map.get(&index).map(Cow::Borrowed)),
            Cow::Owned(Value::Map(mut map)) => Ok(map.swap_remove(&index).map(Cow::Owned)),
            _ => Err(TesseraError::NotADictionary {
                name: name.to_string(),
                index,
            }),
        }
    }

    /// Evaluate an index expression to its text; `None` when it refers to a null value.
    fn index_text(&self, expr: &str) -> Result<Option<String>> {
        let expr = expr.trim();
        if let Some(inner) = strip_quotes(expr) {
            return Ok(Some(inner.to_string()));
        }
        if expr.starts_with('.') || expr.starts_with(char::is_alphabetic) {
            let value = self.resolve(&ModelPath::parse(expr))?;
            return Ok((!value.is_null()).then(|| value.to_string()));
        }
        Ok(Some(expr.to_string()))
    }
}

/// Named member lookup; an empty name refers to the value itself.
fn field<'v>(value: Cow<'v, Value>, name: &str) -> Option<Cow<'v, Value>> {
    if name.is_empty() {
        return Some(value);
    }
    match value {
        Cow::Borrowed(v) => v.field(name),
        Cow::Owned(v) => v.field(name).map(|c| Cow::Owned(c.into_owned())),
    }
    .filter(|v| !v.is_null())
}

fn strip_quotes(expr: &str) -> Option<&str> {
    ['"', '\''].iter().find_map(|&quote| {
        expr.strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(model: serde_json::Value, path: &str) -> Result<Value> {
        let model = Value::from(model);
        let scratch = NameMap::new();
        Resolver::new(&model, &scratch).resolve(&ModelPath::parse(path))
    }

    #[test]
    fn test_root() {
        assert_eq!(resolve(json!("Patrick"), ".").unwrap(), Value::from("Patrick"));
    }

    #[test]
    fn test_dotted_path() {
        let model = json!({"customer": {"name": "Bill"}});
        assert_eq!(resolve(model.clone(), ".customer.name").unwrap(), Value::from("Bill"));
        assert_eq!(resolve(model, "customer.name").unwrap(), Value::from("Bill"));
    }

    #[test]
    fn test_missing_is_null() {
        let model = json!({"customer": {"name": "Bill"}});
        assert_eq!(resolve(model.clone(), ".customer.age").unwrap(), Value::Null);
        assert_eq!(resolve(model.clone(), ".nobody.name").unwrap(), Value::Null);
        assert_eq!(resolve(model, ".customer.name.first").unwrap(), Value::Null);
    }

    #[test]
    fn test_key_index() {
        let model = json!({"customer": {"name": "Bill"}});
        assert_eq!(resolve(model.clone(), ".customer[\"name\"]").unwrap(), Value::from("Bill"));
        assert_eq!(resolve(model.clone(), ".customer['name']").unwrap(), Value::from("Bill"));
        assert_eq!(resolve(model, ".customer[\"missing\"]").unwrap(), Value::Null);
    }

    #[test]
    fn test_list_index() {
        let model = json!({"customer": ["juan", "pedro", "luis"]});
        assert_eq!(resolve(model.clone(), ".customer[2]").unwrap(), Value::from("luis"));
        assert_eq!(resolve(model, ".customer[7]").unwrap(), Value::Null);
    }

    #[test]
    fn test_chained_indexes() {
        let model = json!({"grid": [["a", "b"], ["c", "d"]], "cells": {"x": [null]}});
        assert_eq!(resolve(model.clone(), ".grid[1][0]").unwrap(), Value::from("c"));
        assert_eq!(resolve(model.clone(), ".grid[0][5]").unwrap(), Value::Null);
        assert_eq!(resolve(model.clone(), ".cells[\"x\"][0][1]").unwrap(), Value::Null);
        let err = resolve(model, ".grid[0][\"k\"]").unwrap_err();
        assert!(matches!(err, TesseraError::NotADictionary { ref index, .. } if index == "k"));
    }

    #[test]
    fn test_index_into_root() {
        assert_eq!(resolve(json!([10, 20]), ".[1]").unwrap(), Value::Integer(20));
    }

    #[test]
    fn test_index_from_model_value() {
        let model = json!({"rows": ["a", "b", "c"], "selected": 1, "key": "x", "names": {"x": "ex"}});
        assert_eq!(resolve(model.clone(), ".rows[.selected]").unwrap(), Value::from("b"));
        assert_eq!(resolve(model.clone(), ".names[key]").unwrap(), Value::from("ex"));
        assert_eq!(resolve(model, ".rows[.nothing]").unwrap(), Value::Null);
    }

    #[test]
    fn test_numeric_index_into_map_fails() {
        let err = resolve(json!({"customer": {"name": "Bill"}}), ".customer[0]").unwrap_err();
        assert!(matches!(err, TesseraError::NotAList { ref name, .. } if name == "customer"));
    }

    #[test]
    fn test_key_index_into_list_fails() {
        let err = resolve(json!({"customer": ["a"]}), ".customer[\"name\"]").unwrap_err();
        assert!(matches!(err, TesseraError::NotADictionary { .. }));
    }

    #[test]
    fn test_invalid_numeric_index() {
        let err = resolve(json!({"xs": [1]}), ".xs[1x]").unwrap_err();
        assert!(matches!(err, TesseraError::InvalidIndex { .. }));
    }

    #[test]
    fn test_scratch_fallback() {
        let model = Value::from(json!({"name": "model"}));
        let mut scratch = NameMap::new();
        scratch.insert("item", Value::from(json!({"name": "scratch", "tags": ["t0"]})));
        scratch.insert("name", Value::from("shadow"));
        let resolver = Resolver::new(&model, &scratch);

        assert_eq!(resolver.resolve(&ModelPath::parse(".item.name")).unwrap(), Value::from("scratch"));
        assert_eq!(resolver.resolve(&ModelPath::parse(".ITEM.tags[0]")).unwrap(), Value::from("t0"));
        // the model wins over scratch
        assert_eq!(resolver.resolve(&ModelPath::parse(".name")).unwrap(), Value::from("model"));
    }

    #[test]
    fn test_argument() {
        let model = Value::from(json!({"a": 1}));
        let scratch = NameMap::new();
        let resolver = Resolver::new(&model, &scratch);
        assert_eq!(resolver.argument(".a").unwrap(), Value::Integer(1));
        assert_eq!(resolver.argument("a").unwrap(), Value::from("a"));
    }
}
