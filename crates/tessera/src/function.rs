//! Callable descriptors: a declared parameter list plus an invoker.
//!
//! Every registration reduces to [`Function::new`]. The typed helpers
//! [`Function::from_fn`] and [`Function::with_context`] derive the parameter
//! list from the closure's argument types at compile time.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::context::RenderContext;
use crate::error::{Result, TesseraError};
use crate::value::Value;

/// Semantic type a literal argument is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Passed through unchanged.
    Any,
    Bool,
    Integer,
    Float,
    String,
    Date,
}

/// Kind of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Literal(ArgType),
    /// Filled with the active render context; must be last.
    Context,
    /// Collects every remaining argument as a string; must be last.
    VariadicStrings,
}

/// An adapted argument handed to an invoker.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Strings(Vec<String>),
}

/// One invocation: adapted arguments in declaration order (the context
/// parameter excluded) and the context when it was declared.
pub struct Call<'a> {
    name: &'a str,
    args: Vec<Arg>,
    context: Option<&'a RenderContext>,
}

impl<'a> Call<'a> {
    pub fn new(name: &'a str, args: Vec<Arg>, context: Option<&'a RenderContext>) -> Self {
        Self {
            name,
            args,
            context,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.args.get(index) {
            Some(Arg::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&'a RenderContext> {
        self.context
    }

    pub fn into_args(self) -> Vec<Arg> {
        self.args
    }
}

type Invoker = dyn Fn(Call<'_>) -> Result<Value> + Send + Sync;

/// A registered callable.
#[derive(Clone)]
pub struct Function {
    params: Arc<[ParamKind]>,
    invoker: Arc<Invoker>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Function {
    /// Registration primitive.
    pub fn new<F>(params: Vec<ParamKind>, invoker: F) -> Self
    where
        F: Fn(Call<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            params: params.into(),
            invoker: Arc::new(invoker),
        }
    }

    /// Wrap a closure over typed parameters.
    ///
    /// ```rust
    /// use tessera::{Function, Rest};
    ///
    /// let pow = Function::from_fn(|n: i64| n * n);
    /// let count = Function::from_fn(|first: i64, rest: Rest| first + rest.len() as i64);
    /// ```
    pub fn from_fn<F, Args>(f: F) -> Self
    where
        F: HostFn<Args>,
    {
        Self::new(F::params(), move |call| f.invoke(call))
    }

    /// Wrap a closure whose last parameter is the active `&RenderContext`.
    pub fn with_context<F, Args>(f: F) -> Self
    where
        F: ContextFn<Args>,
    {
        Self::new(F::params(), move |call| f.invoke(call))
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn call(&self, call: Call<'_>) -> Result<Value> {
        (self.invoker)(call)
    }
}

// ============================================================================
// Coercion
// ============================================================================

/// Coerce `value` to `ty`. Null passes through for every type.
pub fn coerce(value: Value, ty: ArgType) -> std::result::Result<Value, String> {
    if value.is_null() || ty == ArgType::Any {
        return Ok(value);
    }
    let fail = |value: &Value| format!("cannot convert {} to {}", value.type_name(), type_label(ty));

    match (ty, value) {
        (ArgType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ArgType::Bool, Value::Integer(n)) => Ok(Value::Bool(n != 0)),
        (ArgType::Bool, Value::Float(n)) => Ok(Value::Bool(n != 0.0)),
        (ArgType::Bool, Value::String(s)) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            t if t.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(format!("'{s}' is not a valid boolean")),
        },

        (ArgType::Integer, Value::Integer(n)) => Ok(Value::Integer(n)),
        (ArgType::Integer, Value::Float(n))
            if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 =>
        {
            Ok(Value::Integer(n as i64))
        }
        (ArgType::Integer, Value::Bool(b)) => Ok(Value::Integer(i64::from(b))),
        (ArgType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("'{s}' is not a valid integer: {e}")),

        (ArgType::Float, Value::Float(n)) => Ok(Value::Float(n)),
        (ArgType::Float, Value::Integer(n)) => Ok(Value::Float(n as f64)),
        (ArgType::Float, Value::Bool(b)) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        (ArgType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("'{s}' is not a valid number: {e}")),

        (ArgType::String, Value::String(s)) => Ok(Value::String(s)),
        (
            ArgType::String,
            v @ (Value::Bool(_) | Value::Integer(_) | Value::Float(_) | Value::Date(_)),
        ) => Ok(Value::String(v.to_string())),

        (ArgType::Date, Value::Date(d)) => Ok(Value::Date(d)),
        (ArgType::Date, Value::String(s)) => parse_date(s.trim())
            .map(Value::Date)
            .ok_or_else(|| format!("'{s}' is not a valid date")),

        (_, other) => Err(fail(&other)),
    }
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

fn type_label(ty: ArgType) -> &'static str {
    match ty {
        ArgType::Any => "any",
        ArgType::Bool => "boolean",
        ArgType::Integer => "integer",
        ArgType::Float => "float",
        ArgType::String => "string",
        ArgType::Date => "date",
    }
}

// ============================================================================
// Typed parameters
// ============================================================================

/// Trailing variadic string arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rest(pub Vec<String>);

impl std::ops::Deref for Rest {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A Rust type usable as a parameter of [`Function::from_fn`].
pub trait Parameter: Sized {
    const KIND: ParamKind;

    fn from_arg(arg: Arg) -> std::result::Result<Self, String>;
}

fn expect_value(arg: Arg) -> std::result::Result<Value, String> {
    match arg {
        Arg::Value(value) => Ok(value),
        Arg::Strings(_) => Err("expected a single value".to_string()),
    }
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {expected}, got {}", value.type_name())
}

impl Parameter for Value {
    const KIND: ParamKind = ParamKind::Literal(ArgType::Any);

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        expect_value(arg)
    }
}

impl Parameter for bool {
    const KIND: ParamKind = ParamKind::Literal(ArgType::Bool);

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match expect_value(arg)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl Parameter for i64 {
    const KIND: ParamKind = ParamKind::Literal(ArgType::Integer);

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match expect_value(arg)? {
            Value::Integer(n) => Ok(n),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl Parameter for f64 {
    const KIND: ParamKind = ParamKind::Literal(ArgType::Float);

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match expect_value(arg)? {
            Value::Float(n) => Ok(n),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl Parameter for String {
    const KIND: ParamKind = ParamKind::Literal(ArgType::String);

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match expect_value(arg)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl Parameter for NaiveDateTime {
    const KIND: ParamKind = ParamKind::Literal(ArgType::Date);

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match expect_value(arg)? {
            Value::Date(d) => Ok(d),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl<T: Parameter> Parameter for Option<T> {
    const KIND: ParamKind = T::KIND;

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match arg {
            Arg::Value(Value::Null) => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

impl Parameter for Rest {
    const KIND: ParamKind = ParamKind::VariadicStrings;

    fn from_arg(arg: Arg) -> std::result::Result<Self, String> {
        match arg {
            Arg::Strings(strings) => Ok(Rest(strings)),
            Arg::Value(value) => Ok(Rest(vec![value.to_string()])),
        }
    }
}

/// Closures accepted by [`Function::from_fn`].
pub trait HostFn<Args>: Send + Sync + 'static {
    fn params() -> Vec<ParamKind>;

    fn invoke(&self, call: Call<'_>) -> Result<Value>;
}

/// Closures accepted by [`Function::with_context`].
pub trait ContextFn<Args>: Send + Sync + 'static {
    fn params() -> Vec<ParamKind>;

    fn invoke(&self, call: Call<'_>) -> Result<Value>;
}

macro_rules! impl_host_fn {
    ($($arg:ident),*) => {
        impl<Func, Ret, $($arg,)*> HostFn<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: Into<Value>,
            $($arg: Parameter,)*
        {
            fn params() -> Vec<ParamKind> {
                vec![$(<$arg as Parameter>::KIND),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, call: Call<'_>) -> Result<Value> {
                let name = call.name().to_string();
                let mut args = call.into_args().into_iter().enumerate();
                $(
                    let $arg = match args.next() {
                        Some((index, arg)) => <$arg as Parameter>::from_arg(arg).map_err(|cause| {
                            TesseraError::ParameterConversion { function: name.clone(), index, cause }
                        })?,
                        None => <$arg as Parameter>::from_arg(missing_arg::<$arg>()).map_err(|cause| {
                            TesseraError::ParameterConversion { function: name.clone(), index: 0, cause }
                        })?,
                    };
                )*
                Ok((self)($($arg),*).into())
            }
        }

        impl<Func, Ret, $($arg,)*> ContextFn<($($arg,)*)> for Func
        where
            Func: for<'c> Fn($($arg,)* &'c RenderContext) -> Ret + Send + Sync + 'static,
            Ret: Into<Value>,
            $($arg: Parameter,)*
        {
            fn params() -> Vec<ParamKind> {
                vec![$(<$arg as Parameter>::KIND,)* ParamKind::Context]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, call: Call<'_>) -> Result<Value> {
                let name = call.name().to_string();
                let context = call.context().ok_or_else(|| TesseraError::Function {
                    name: name.clone(),
                    message: "render context not supplied".to_string(),
                })?;
                let mut args = call.into_args().into_iter().enumerate();
                $(
                    let $arg = match args.next() {
                        Some((index, arg)) => <$arg as Parameter>::from_arg(arg).map_err(|cause| {
                            TesseraError::ParameterConversion { function: name.clone(), index, cause }
                        })?,
                        None => <$arg as Parameter>::from_arg(missing_arg::<$arg>()).map_err(|cause| {
                            TesseraError::ParameterConversion { function: name.clone(), index: 0, cause }
                        })?,
                    };
                )*
                Ok((self)($($arg,)* context).into())
            }
        }
    };
}

/// Placeholder for an argument the evaluator did not supply (only an empty
/// variadic tail can be missing).
fn missing_arg<T: Parameter>() -> Arg {
    match T::KIND {
        ParamKind::VariadicStrings => Arg::Strings(Vec::new()),
        _ => Arg::Value(Value::Null),
    }
}

impl_host_fn!();
impl_host_fn!(A);
impl_host_fn!(A, B);
impl_host_fn!(A, B, C);
impl_host_fn!(A, B, C, D);
impl_host_fn!(A, B, C, D, E);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_params() {
        let f = Function::from_fn(|a: i64, b: String, rest: Rest| format!("{a}{b}{}", rest.len()));
        assert_eq!(
            f.params(),
            &[
                ParamKind::Literal(ArgType::Integer),
                ParamKind::Literal(ArgType::String),
                ParamKind::VariadicStrings,
            ]
        );
    }

    #[test]
    fn test_with_context_params() {
        let f = Function::with_context(|a: Value, _ctx: &RenderContext| a);
        assert_eq!(
            f.params(),
            &[ParamKind::Literal(ArgType::Any), ParamKind::Context]
        );
    }

    #[test]
    fn test_invoke_typed() {
        let f = Function::from_fn(|a: i64, b: i64| a + b);
        let call = Call::new(
            "sum",
            vec![Arg::Value(Value::Integer(3)), Arg::Value(Value::Integer(8))],
            None,
        );
        assert_eq!(f.call(call).unwrap(), Value::Integer(11));
    }

    #[test]
    fn test_invoke_with_null_for_required() {
        let f = Function::from_fn(|a: i64| a);
        let call = Call::new("id", vec![Arg::Value(Value::Null)], None);
        let err = f.call(call).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::ParameterConversion { ref function, index: 0, .. } if function == "id"
        ));
    }

    #[test]
    fn test_optional_parameter() {
        let f = Function::from_fn(|a: Option<i64>| a.is_none());
        let call = Call::new("f", vec![Arg::Value(Value::Null)], None);
        assert_eq!(f.call(call).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(coerce(Value::from("True"), ArgType::Bool), Ok(Value::Bool(true)));
        assert_eq!(coerce(Value::from(" false "), ArgType::Bool), Ok(Value::Bool(false)));
        assert_eq!(coerce(Value::Integer(2), ArgType::Bool), Ok(Value::Bool(true)));
        assert!(coerce(Value::from("yes"), ArgType::Bool).is_err());
        assert!(coerce(Value::Array(vec![]), ArgType::Bool).is_err());
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce(Value::from("42"), ArgType::Integer), Ok(Value::Integer(42)));
        assert_eq!(coerce(Value::Float(4.0), ArgType::Integer), Ok(Value::Integer(4)));
        assert!(coerce(Value::Float(4.5), ArgType::Integer).is_err());
        assert!(coerce(Value::from("4,5"), ArgType::Float).is_err());
        assert_eq!(coerce(Value::from("4.5"), ArgType::Float), Ok(Value::Float(4.5)));
        assert_eq!(coerce(Value::Integer(2), ArgType::Float), Ok(Value::Float(2.0)));
    }

    #[test]
    fn test_coerce_string_and_date() {
        assert_eq!(coerce(Value::Bool(true), ArgType::String), Ok(Value::from("true")));
        assert_eq!(coerce(Value::Integer(7), ArgType::String), Ok(Value::from("7")));
        assert!(coerce(Value::Array(vec![]), ArgType::String).is_err());

        let date = coerce(Value::from("2024-05-06"), ArgType::Date).unwrap();
        assert_eq!(date.to_string(), "2024-05-06 00:00:00");
        assert!(coerce(Value::from("yesterday"), ArgType::Date).is_err());
    }

    #[test]
    fn test_coerce_null_passes_through() {
        assert_eq!(coerce(Value::Null, ArgType::Integer), Ok(Value::Null));
        assert_eq!(coerce(Value::Null, ArgType::Date), Ok(Value::Null));
    }
}
