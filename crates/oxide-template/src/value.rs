//! Runtime values bound into templates.
//!
//! A [`Value`] is whatever a template can see: the parameter object handed to
//! an expansion, the entries of the binding table, and the results of
//! evaluating expressions against them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Serialize, Serializer};

/// A dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent / NULL.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Arbitrary precision decimal.
    Decimal(BigDecimal),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Bytes(Vec<u8>),
    /// A growable sequence, iterated in place.
    List(Vec<Value>),
    /// A fixed-size array.
    Array(Vec<Value>),
    /// A map-like value with string keys.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for values that bind as a single SQL parameter.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Array(_) | Self::Map(_))
    }

    /// Returns true for `Int`, `Float` and `Decimal`.
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Decimal(_))
    }

    /// Returns the numeric value as an exact decimal.
    ///
    /// Floats go through their shortest decimal representation, so `0.1`
    /// becomes exactly `0.1`. Non-finite floats have no decimal form.
    #[must_use]
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Self::Int(n) => Some(BigDecimal::from(*n)),
            Self::Float(f) if f.is_finite() => BigDecimal::from_str(&f.to_string()).ok(),
            Self::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// Returns the text if this is a `Text` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a property of a map value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Returns a short name for the kind of value, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Renders the value as text for `${}` substitution.
    ///
    /// Strings are inserted raw; other values use their display form.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => {
                write!(f, "X'")?;
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                write!(f, "'")
            }
            Self::List(items) | Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Trait for types that can be converted to template values.
pub trait ToValue {
    /// Converts into a `Value`.
    fn to_value(self) -> Value;
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Bool(self)
    }
}

impl ToValue for i64 {
    fn to_value(self) -> Value {
        Value::Int(self)
    }
}

impl ToValue for i32 {
    fn to_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl ToValue for u32 {
    fn to_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl ToValue for usize {
    fn to_value(self) -> Value {
        i64::try_from(self).map_or_else(
            |_| Value::Decimal(BigDecimal::from_str(&self.to_string()).unwrap_or_default()),
            Value::Int,
        )
    }
}

impl ToValue for f64 {
    fn to_value(self) -> Value {
        Value::Float(self)
    }
}

impl ToValue for BigDecimal {
    fn to_value(self) -> Value {
        Value::Decimal(self)
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::Text(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::Text(String::from(self))
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(self) -> Value {
        Value::List(self.into_iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue, const N: usize> ToValue for [T; N] {
    fn to_value(self) -> Value {
        Value::Array(self.into_iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.to_value())).collect())
    }
}

macro_rules! impl_from_to_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    v.to_value()
                }
            }
        )*
    };
}

impl_from_to_value!(bool, i64, i32, u32, usize, f64, BigDecimal, String, &str, serde_json::Value);

impl<T: ToValue> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.to_value()
    }
}

impl<T: ToValue> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        v.to_value()
    }
}

impl ToValue for serde_json::Value {
    fn to_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Decimal(BigDecimal::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Self::String(s) => Value::Text(s),
            Self::Array(items) => Value::List(items.into_iter().map(ToValue::to_value).collect()),
            Self::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, v.to_value())).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(n) => Self::from(n),
            Value::Float(f) => Self::from(f),
            Value::Decimal(d) => Self::String(d.to_string()),
            Value::Text(s) => Self::String(s),
            Value::Bytes(b) => Self::Array(b.into_iter().map(Self::from).collect()),
            Value::List(items) | Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            Value::Map(m) => Self::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Decimal(d) => serializer.collect_str(d),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.collect_seq(b),
            Self::List(items) | Self::Array(items) => serializer.collect_seq(items),
            Self::Map(m) => serializer.collect_map(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Bytes(vec![0x48, 0x49]).to_string(), "X'4849'");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Text(String::from("a"))]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_value_is_scalar() {
        assert!(Value::Null.is_scalar());
        assert!(Value::Text(String::from("x")).is_scalar());
        assert!(!Value::List(vec![]).is_scalar());
        assert!(!Value::Map(BTreeMap::new()).is_scalar());
    }

    #[test]
    fn test_float_to_decimal_is_exact() {
        let d = Value::Float(0.1).to_decimal().unwrap();
        assert_eq!(d, BigDecimal::from_str("0.1").unwrap());
        assert!(Value::Float(f64::NAN).to_decimal().is_none());
    }

    #[test]
    fn test_to_value_conversions() {
        assert_eq!(true.to_value(), Value::Bool(true));
        assert_eq!(42_i32.to_value(), Value::Int(42));
        assert_eq!("hello".to_value(), Value::Text(String::from("hello")));
        assert_eq!(None::<i32>.to_value(), Value::Null);
        assert_eq!(
            vec![1_i64, 2].to_value(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!([1_i64].to_value(), Value::Array(vec![Value::Int(1)]));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"ids": [1, 2], "name": "x", "on": true});
        let value = json.to_value();
        assert_eq!(
            value.get("ids"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(value.get("name"), Some(&Value::Text(String::from("x"))));
        assert_eq!(value.get("on"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_into_json() {
        let value = Value::Map(BTreeMap::from([(String::from("a"), Value::Int(1))]));
        let json: serde_json::Value = value.into();
        assert_eq!(json, serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_serialize_matches_json_conversion() {
        let value = Value::List(vec![
            Value::Null,
            Value::Decimal(BigDecimal::from_str("1.50").unwrap()),
            Value::Text(String::from("x")),
        ]);
        let serialized = serde_json::to_value(&value).unwrap();
        assert_eq!(serialized, serde_json::json!([null, "1.50", "x"]));
        assert_eq!(serialized, serde_json::Value::from(value));
    }
}
