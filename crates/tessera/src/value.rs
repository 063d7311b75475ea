//! Runtime value tree that templates are rendered against.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use tessera_ast::Template;

use crate::error::Result;

/// Display form used for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Host value with named-field access, for types that are not plain maps.
pub trait Object: fmt::Debug + Send + Sync {
    /// Member lookup by name; `None` means the member does not exist.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Default string form.
    fn render(&self) -> String {
        format!("{self:?}")
    }
}

/// Runtime value for Tessera templates
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDateTime),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(Arc<dyn Object>),
    /// A nested template, rendered in place when referenced.
    Template(Arc<Template>),
}

impl Value {
    /// Convert any serializable model into a Value.
    pub fn from_serialize<T: Serialize + ?Sized>(model: &T) -> Result<Self> {
        Ok(serde_json::to_value(model)?.into())
    }

    pub fn from_object(object: impl Object + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Template(_) => "template",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Named member: map key or object field. `None` for anything else.
    pub(crate) fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match self {
            Value::Map(map) => map.get(name).map(Cow::Borrowed),
            Value::Object(object) => object.get_field(name).map(Cow::Owned),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Template(a), Value::Template(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Template(_) => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Array(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
            Value::Object(object) => f.write_str(&object.render()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Template(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Object(object) => serializer.serialize_str(&object.render()),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Integer(i64::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or(Value::Float(n as f64))
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<Arc<Template>> for Value {
    fn from(t: Arc<Template>) -> Self {
        Value::Template(t)
    }
}

impl From<Template> for Value {
    fn from(t: Template) -> Self {
        Value::Template(Arc::new(t))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<IndexMap<String, V>> for Value {
    fn from(map: IndexMap<String, V>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(map: HashMap<String, V>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Customer {
        name: String,
    }

    impl Object for Customer {
        fn get_field(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(Value::from(self.name.as_str())),
                _ => None,
            }
        }
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"name": "Patrick", "age": 30, "ratio": 0.5, "tags": ["a"]}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["name"], Value::from("Patrick"));
        assert_eq!(map["age"], Value::Integer(30));
        assert_eq!(map["ratio"], Value::Float(0.5));
        assert_eq!(map["tags"], Value::Array(vec![Value::from("a")]));
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Model {
            name: &'static str,
            admin: bool,
        }
        let value = Value::from_serialize(&Model {
            name: "Bill",
            admin: true,
        })
        .unwrap();
        assert_eq!(value.field("name").as_deref(), Some(&Value::from("Bill")));
        assert_eq!(value.field("admin").as_deref(), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Integer(-4).to_string(), "-4");
        assert_eq!(Value::Float(10.5).to_string(), "10.5");
        assert_eq!(Value::from("text").to_string(), "text");
        assert_eq!(Value::from(json!([1, "a"])).to_string(), "[1,\"a\"]");
        assert_eq!(Value::from(json!({"k": null})).to_string(), "{\"k\":null}");
        let date = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(Value::from(date).to_string(), "2024-03-01 10:00:00");
    }

    #[test]
    fn test_object_field() {
        let value = Value::from_object(Customer {
            name: "Luis".to_string(),
        });
        assert_eq!(value.field("name").as_deref(), Some(&Value::from("Luis")));
        assert!(value.field("missing").is_none());
        assert_eq!(value.type_name(), "object");
    }

    #[test]
    fn test_field_on_scalar() {
        assert!(Value::from("text").field("len").is_none());
        assert!(Value::Null.field("x").is_none());
    }

    #[test]
    fn test_collect_into_map() {
        let value: Value = vec![("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(value.field("b").as_deref(), Some(&Value::Integer(2)));
    }
}
