//! Built-in functions, consulted after host registrations.

use std::sync::OnceLock;

use crate::error::TesseraError;
use crate::function::{ArgType, Function, ParamKind};
use crate::map::NameMap;
use crate::value::Value;

static BUILTINS: OnceLock<NameMap<Function>> = OnceLock::new();

/// Built-in function by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static Function> {
    BUILTINS.get_or_init(table).get(name)
}

fn table() -> NameMap<Function> {
    let mut table = NameMap::new();
    table.insert("equals", Function::from_fn(equals));
    table.insert("isnull", Function::from_fn(|v: Value| v.is_null()));
    table.insert("isnotnull", Function::from_fn(|v: Value| !v.is_null()));
    table.insert("istrue", Function::from_fn(|v: Option<bool>| v == Some(true)));
    table.insert("isfalse", Function::from_fn(|v: Option<bool>| v != Some(true)));
    table.insert(
        "isempty",
        Function::from_fn(|v: Value| v.is_null() || v.to_string().is_empty()),
    );
    table.insert(
        "format",
        Function::new(
            vec![
                ParamKind::Literal(ArgType::Any),
                ParamKind::Literal(ArgType::String),
                ParamKind::Context,
            ],
            |call| {
                let (Some(value), Some(pattern)) = (call.value(0), call.value(1)) else {
                    return Ok(Value::Null);
                };
                let Some(context) = call.context() else {
                    return Err(TesseraError::Function {
                        name: call.name().to_string(),
                        message: "render context not supplied".to_string(),
                    });
                };
                let pattern = pattern.as_str().unwrap_or_default();
                Ok(context.locale().format(value, pattern)?.into())
            },
        ),
    );
    table
}

/// String forms are compared; null equals only null.
fn equals(a: Value, b: Value) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => true,
        (false, false) => a.to_string() == b.to_string(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RenderContext;
    use crate::function::{Arg, Call};
    use crate::locale::Locale;

    fn invoke(name: &str, args: Vec<Value>) -> Value {
        let function = lookup(name).unwrap();
        let args = args.into_iter().map(Arg::Value).collect();
        function.call(Call::new(name, args, None)).unwrap()
    }

    #[test]
    fn test_lookup_ignores_case() {
        assert!(lookup("Equals").is_some());
        assert!(lookup("ISNULL").is_some());
        assert!(lookup("missing").is_none());
    }

    #[test]
    fn test_equals_compares_string_forms() {
        assert_eq!(invoke("equals", vec![Value::Bool(true), Value::from("true")]), Value::Bool(true));
        assert_eq!(invoke("equals", vec![Value::Integer(1), Value::from("1")]), Value::Bool(true));
        assert_eq!(invoke("equals", vec![Value::from("a"), Value::from("b")]), Value::Bool(false));
        assert_eq!(invoke("equals", vec![Value::Null, Value::from("")]), Value::Bool(false));
        assert_eq!(invoke("equals", vec![Value::Null, Value::Null]), Value::Bool(true));
    }

    #[test]
    fn test_null_predicates() {
        assert_eq!(invoke("isnull", vec![Value::Null]), Value::Bool(true));
        assert_eq!(invoke("isnotnull", vec![Value::Null]), Value::Bool(false));
        assert_eq!(invoke("isnotnull", vec![Value::from("")]), Value::Bool(true));
    }

    #[test]
    fn test_truth_predicates() {
        assert_eq!(invoke("istrue", vec![Value::Bool(true)]), Value::Bool(true));
        assert_eq!(invoke("isfalse", vec![Value::Bool(false)]), Value::Bool(true));
        assert_eq!(invoke("isfalse", vec![Value::Null]), Value::Bool(true));
        assert_eq!(invoke("istrue", vec![Value::Null]), Value::Bool(false));
    }

    #[test]
    fn test_isempty() {
        assert_eq!(invoke("isempty", vec![Value::Null]), Value::Bool(true));
        assert_eq!(invoke("isempty", vec![Value::from("")]), Value::Bool(true));
        assert_eq!(invoke("isempty", vec![Value::from("x")]), Value::Bool(false));
    }

    #[test]
    fn test_format_uses_context_locale() {
        let ctx = RenderContext::new().with_locale(Locale::new("es-ES"));
        let function = lookup("format").unwrap();
        let args = vec![Arg::Value(Value::Float(10.2)), Arg::Value(Value::from("f"))];
        let result = function.call(Call::new("format", args, Some(&ctx))).unwrap();
        assert_eq!(result, Value::from("10,20"));
    }

    #[test]
    fn test_format_non_formattable_is_null() {
        let ctx = RenderContext::new();
        let function = lookup("format").unwrap();
        let args = vec![Arg::Value(Value::from("text")), Arg::Value(Value::from("f"))];
        let result = function.call(Call::new("format", args, Some(&ctx))).unwrap();
        assert_eq!(result, Value::Null);
    }
}
