use crate::error::HydrateError;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer, ser::SerializeSeq};
use std::{cmp::Ordering, collections::BTreeMap};
use ulid::Ulid;

///
/// Float64
///
/// Total-order wrapper so `Value` can be `Eq + Ord` and key dedup caches
/// and grouping maps. NaN sorts after every finite value.
///

#[derive(Clone, Copy, Debug)]
pub struct Float64(pub f64);

impl PartialEq for Float64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Float64 {}

impl PartialOrd for Float64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

///
/// Value
///
/// Scalar values carried through filters, expressions, and rows.
///
/// Null → the field's value is absent (SQL NULL).
/// Non-native scalars (Date, DateTime, Decimal, Ulid) convert to their
/// canonical textual wire form at the serialization boundary; until then
/// they stay typed so build-time validation can inspect them.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(Float64),
    Text(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Ulid(Ulid),
    /// Ordered list of values. Order is preserved end to end.
    List(Vec<Self>),
}

impl Value {
    /// Build a `Value::List` from a slice literal.
    ///
    /// Intended for tests and inline construction.
    pub fn from_slice<T>(items: &[T]) -> Self
    where
        T: Into<Self> + Clone,
    {
        Self::List(items.iter().cloned().map(Into::into).collect())
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Extract an `i64` from integer-bearing variants.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(v.0),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Bytes(v) => v.serialize(serializer),
            Self::Decimal(v) => serializer.serialize_str(&v.to_string()),
            Self::Date(v) => serializer.serialize_str(&v.format("%Y-%m-%d").to_string()),
            Self::DateTime(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Self::Ulid(v) => serializer.serialize_str(&v.to_string()),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(Float64(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<Ulid> for Value {
    fn from(v: Ulid) -> Self {
        Self::Ulid(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

///
/// Row
///
/// One engine-returned row as a field→value mapping.
///

pub type Row = BTreeMap<String, Value>;

///
/// RowExt
///
/// Typed accessors over a raw row. Missing columns and wrong-typed values
/// surface as `HydrateError`; nullable accessors treat an absent column as
/// null rather than an error.
///

pub trait RowExt {
    fn value(&self, column: &str) -> Result<&Value, HydrateError>;

    fn int(&self, column: &str) -> Result<i64, HydrateError> {
        match self.value(column)? {
            Value::Int(v) => Ok(*v),
            _ => Err(HydrateError::ColumnType {
                column: column.to_string(),
                expected: "int",
            }),
        }
    }

    fn opt_int(&self, column: &str) -> Result<Option<i64>, HydrateError> {
        match self.value(column) {
            Ok(Value::Int(v)) => Ok(Some(*v)),
            Ok(Value::Null) | Err(HydrateError::MissingColumn { .. }) => Ok(None),
            Ok(_) => Err(HydrateError::ColumnType {
                column: column.to_string(),
                expected: "int",
            }),
            Err(err) => Err(err),
        }
    }

    fn text(&self, column: &str) -> Result<String, HydrateError> {
        match self.value(column)? {
            Value::Text(v) => Ok(v.clone()),
            _ => Err(HydrateError::ColumnType {
                column: column.to_string(),
                expected: "text",
            }),
        }
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>, HydrateError> {
        match self.value(column) {
            Ok(Value::Text(v)) => Ok(Some(v.clone())),
            Ok(Value::Null) | Err(HydrateError::MissingColumn { .. }) => Ok(None),
            Ok(_) => Err(HydrateError::ColumnType {
                column: column.to_string(),
                expected: "text",
            }),
            Err(err) => Err(err),
        }
    }

    fn boolean(&self, column: &str) -> Result<bool, HydrateError> {
        match self.value(column)? {
            Value::Bool(v) => Ok(*v),
            _ => Err(HydrateError::ColumnType {
                column: column.to_string(),
                expected: "bool",
            }),
        }
    }

    fn float(&self, column: &str) -> Result<f64, HydrateError> {
        match self.value(column)? {
            Value::Float(v) => Ok(v.0),
            Value::Int(v) => Ok(*v as f64),
            _ => Err(HydrateError::ColumnType {
                column: column.to_string(),
                expected: "float",
            }),
        }
    }
}

impl RowExt for Row {
    fn value(&self, column: &str) -> Result<&Value, HydrateError> {
        self.get(column).ok_or_else(|| HydrateError::MissingColumn {
            column: column.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_converts_non_native_scalars_to_text() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date");
        assert_eq!(
            serde_json::to_value(Value::Date(date)).expect("serialize"),
            serde_json::json!("2024-03-15")
        );

        let decimal: Decimal = "12.50".parse().expect("valid decimal");
        assert_eq!(
            serde_json::to_value(Value::Decimal(decimal)).expect("serialize"),
            serde_json::json!("12.50")
        );
    }

    #[test]
    fn list_wire_form_is_recursive() {
        let value = Value::from_slice(&[1i64, 2, 3]);
        assert_eq!(
            serde_json::to_value(value).expect("serialize"),
            serde_json::json!([1, 2, 3])
        );
    }

    #[test]
    fn null_option_maps_to_null() {
        let value: Value = Option::<i64>::None.into();
        assert!(value.is_null());
    }

    #[test]
    fn float_total_order_allows_map_keys() {
        let mut map: BTreeMap<Value, i32> = BTreeMap::new();
        map.insert(Value::from(1.5), 1);
        map.insert(Value::from(1.5), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn opt_accessors_treat_missing_column_as_null() {
        let row = Row::new();
        assert_eq!(row.opt_text("email").expect("null"), None);
        assert!(row.text("email").is_err());
    }
}
