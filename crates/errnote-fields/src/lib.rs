//! Typed key/value diagnostic fields for error annotation.
//!
//! A [`Field`] is one named diagnostic entry attached to an error node.
//! Constructor functions cover the common scalar, slice, optional, and
//! time types; everything normalizes into a `serde_json::Value` so a field
//! set can be folded into a JSON object without knowing the original type.
//!
//! Values that cannot be serialized (see [`any`]) degrade to their debug
//! text rather than failing the whole encode.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// One typed key/value diagnostic entry.
///
/// Construct via the free functions in this crate ([`string`], [`int`],
/// [`duration`], ...). The value is already normalized to JSON form.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    key: String,
    value: Value,
}

impl Field {
    /// Builds a field from an already-normalized JSON value.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Field {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Inserts this entry into a string-keyed JSON map. A later insert
    /// under the same key overwrites the earlier one.
    pub fn add_to(&self, map: &mut Map<String, Value>) {
        map.insert(self.key.clone(), self.value.clone());
    }
}

// A field serializes as a single-entry object, `{"key": value}`.
impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}

/// String field.
pub fn string(key: impl Into<String>, val: impl Into<String>) -> Field {
    Field::new(key, Value::String(val.into()))
}

/// Boolean field.
pub fn boolean(key: impl Into<String>, val: bool) -> Field {
    Field::new(key, Value::Bool(val))
}

/// Signed integer field.
pub fn int(key: impl Into<String>, val: i64) -> Field {
    Field::new(key, Value::from(val))
}

/// Unsigned integer field.
pub fn uint(key: impl Into<String>, val: u64) -> Field {
    Field::new(key, Value::from(val))
}

/// Floating-point field. Non-finite values render as their text form,
/// since JSON has no representation for them.
pub fn float(key: impl Into<String>, val: f64) -> Field {
    match serde_json::Number::from_f64(val) {
        Some(n) => Field::new(key, Value::Number(n)),
        None => Field::new(key, Value::String(val.to_string())),
    }
}

/// Duration field, rendered as fractional seconds.
pub fn duration(key: impl Into<String>, val: Duration) -> Field {
    float(key, val.as_secs_f64())
}

/// Timestamp field, rendered as milliseconds since the Unix epoch.
/// A pre-epoch time renders as 0.
pub fn timestamp(key: impl Into<String>, val: SystemTime) -> Field {
    let millis = val
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    uint(key, millis)
}

/// String-slice field.
pub fn strings<S: Into<String>>(key: impl Into<String>, vals: impl IntoIterator<Item = S>) -> Field {
    Field::new(
        key,
        Value::Array(vals.into_iter().map(|s| Value::String(s.into())).collect()),
    )
}

/// Signed-integer-slice field.
pub fn ints(key: impl Into<String>, vals: impl IntoIterator<Item = i64>) -> Field {
    Field::new(key, Value::Array(vals.into_iter().map(Value::from).collect()))
}

/// Unsigned-integer-slice field.
pub fn uints(key: impl Into<String>, vals: impl IntoIterator<Item = u64>) -> Field {
    Field::new(key, Value::Array(vals.into_iter().map(Value::from).collect()))
}

/// Boolean-slice field.
pub fn booleans(key: impl Into<String>, vals: impl IntoIterator<Item = bool>) -> Field {
    Field::new(key, Value::Array(vals.into_iter().map(Value::Bool).collect()))
}

/// Float-slice field; non-finite members render as text.
pub fn floats(key: impl Into<String>, vals: impl IntoIterator<Item = f64>) -> Field {
    Field::new(
        key,
        Value::Array(
            vals.into_iter()
                .map(|v| match serde_json::Number::from_f64(v) {
                    Some(n) => Value::Number(n),
                    None => Value::String(v.to_string()),
                })
                .collect(),
        ),
    )
}

/// Optional string field; `None` renders as JSON null.
pub fn opt_string(key: impl Into<String>, val: Option<impl Into<String>>) -> Field {
    match val {
        Some(v) => string(key, v),
        None => Field::new(key, Value::Null),
    }
}

/// Optional signed integer field; `None` renders as JSON null.
pub fn opt_int(key: impl Into<String>, val: Option<i64>) -> Field {
    match val {
        Some(v) => int(key, v),
        None => Field::new(key, Value::Null),
    }
}

/// Optional boolean field; `None` renders as JSON null.
pub fn opt_boolean(key: impl Into<String>, val: Option<bool>) -> Field {
    match val {
        Some(v) => boolean(key, v),
        None => Field::new(key, Value::Null),
    }
}

/// Optional duration field; `None` renders as JSON null.
pub fn opt_duration(key: impl Into<String>, val: Option<Duration>) -> Field {
    match val {
        Some(v) => duration(key, v),
        None => Field::new(key, Value::Null),
    }
}

/// Field from any `Display` value.
pub fn display(key: impl Into<String>, val: &(impl fmt::Display + ?Sized)) -> Field {
    Field::new(key, Value::String(val.to_string()))
}

/// An error's text form under the conventional `"error"` key.
pub fn error(err: &(impl fmt::Display + ?Sized)) -> Field {
    display("error", err)
}

/// An error's text form under an explicit key.
pub fn named_error(key: impl Into<String>, err: &(impl fmt::Display + ?Sized)) -> Field {
    display(key, err)
}

/// Field from any serializable value. Serialization failure falls back to
/// the value's debug text instead of surfacing an error.
pub fn any(key: impl Into<String>, val: &(impl Serialize + fmt::Debug)) -> Field {
    match serde_json::to_value(val) {
        Ok(v) => Field::new(key, v),
        Err(_) => Field::new(key, Value::String(format!("{:?}", val))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_constructors() {
        assert_eq!(string("k", "v").value(), &json!("v"));
        assert_eq!(boolean("k", true).value(), &json!(true));
        assert_eq!(int("k", -3).value(), &json!(-3));
        assert_eq!(uint("k", 7).value(), &json!(7));
        assert_eq!(float("k", 1.5).value(), &json!(1.5));
    }

    #[test]
    fn non_finite_float_renders_as_text() {
        assert_eq!(float("k", f64::NAN).value(), &json!("NaN"));
        assert_eq!(float("k", f64::INFINITY).value(), &json!("inf"));
    }

    #[test]
    fn duration_is_fractional_seconds() {
        let f = duration("elapsed", Duration::from_millis(1500));
        assert_eq!(f.value(), &json!(1.5));
    }

    #[test]
    fn timestamp_is_epoch_millis() {
        let t = UNIX_EPOCH + Duration::from_millis(12_345);
        assert_eq!(timestamp("at", t).value(), &json!(12_345));
    }

    #[test]
    fn slice_constructors() {
        assert_eq!(strings("k", ["a", "b"]).value(), &json!(["a", "b"]));
        assert_eq!(ints("k", [1, 2]).value(), &json!([1, 2]));
        assert_eq!(booleans("k", [true, false]).value(), &json!([true, false]));
    }

    #[test]
    fn optional_none_is_null() {
        assert_eq!(opt_string("k", None::<String>).value(), &json!(null));
        assert_eq!(opt_int("k", Some(4)).value(), &json!(4));
    }

    #[test]
    fn error_field_uses_error_key() {
        let f = error("boom");
        assert_eq!(f.key(), "error");
        assert_eq!(f.value(), &json!("boom"));
    }

    #[test]
    fn any_serializes_structured_values() {
        #[derive(Debug, Serialize)]
        struct Peer {
            host: String,
            port: u16,
        }
        let f = any(
            "peer",
            &Peer {
                host: "db1".into(),
                port: 5432,
            },
        );
        assert_eq!(f.value(), &json!({"host": "db1", "port": 5432}));
    }

    #[test]
    fn field_serializes_as_single_entry_object() {
        let f = int("count", 3);
        assert_eq!(serde_json::to_value(&f).unwrap(), json!({"count": 3}));
    }

    #[test]
    fn add_to_overwrites_same_key() {
        let mut map = Map::new();
        int("k", 1).add_to(&mut map);
        int("k", 2).add_to(&mut map);
        assert_eq!(map.get("k"), Some(&json!(2)));
    }
}
