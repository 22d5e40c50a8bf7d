use crate::Record;
use rust_decimal::Decimal;
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed value exchanged with runners.
///
/// Every variant but `Null` carries an `Option`, `None` being a typed null.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    Uuid(Option<Uuid>),
    Json(Option<serde_json::Value>),
    List(Option<Vec<Value>>),
    Record(Option<Box<Record>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::Json(l), Self::Json(r)) => l == r,
            (Self::List(l), Self::List(r)) => l == r,
            (Self::Record(l), Self::Record(r)) => l == r,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// See [`Value::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Boolean(bool),
    Integer(i64),
    Float(u64),
    Decimal(Decimal),
    Text(String),
    Blob(Box<[u8]>),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    Uuid(Uuid),
    Composite(String),
}

impl Value {
    /// True for `Null` and for every typed null.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Int64(v) => v.is_none(),
            Value::Float64(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Varchar(v) => v.is_none(),
            Value::Blob(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Time(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
            Value::Json(v) => v.is_none() || matches!(v, Some(serde_json::Value::Null)),
            Value::List(v) => v.is_none(),
            Value::Record(v) => v.is_none(),
        }
    }

    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    /// Equality used to correlate keys coming from different statements, integers
    /// compare by value regardless of their width.
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match (self.as_integer(), other.as_integer()) {
            (Some(l), Some(r)) => l == r,
            _ => !self.is_null() && self == other,
        }
    }

    /// Hashable form of a non null value, two values loosely equal share it.
    pub fn key(&self) -> Option<ValueKey> {
        if let Some(v) = self.as_integer() {
            return Some(ValueKey::Integer(v));
        }
        Some(match self {
            Value::Boolean(Some(v)) => ValueKey::Boolean(*v),
            Value::Float64(Some(v)) => ValueKey::Float((v + 0.0).to_bits()),
            Value::Decimal(Some(v)) => ValueKey::Decimal(*v),
            Value::Varchar(Some(v)) => ValueKey::Text(v.clone()),
            Value::Blob(Some(v)) => ValueKey::Blob(v.clone()),
            Value::Date(Some(v)) => ValueKey::Date(*v),
            Value::Time(Some(v)) => ValueKey::Time(*v),
            Value::Timestamp(Some(v)) => ValueKey::Timestamp(*v),
            Value::Uuid(Some(v)) => ValueKey::Uuid(*v),
            Value::Json(Some(v)) if !v.is_null() => ValueKey::Composite(v.to_string()),
            Value::List(Some(..)) | Value::Record(Some(..)) => {
                ValueKey::Composite(format!("{self:?}"))
            }
            _ => return None,
        })
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int32(Some(v)) => Some(*v as i64),
            Value::Int64(Some(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(..) => "Boolean",
            Value::Int32(..) => "Int32",
            Value::Int64(..) => "Int64",
            Value::Float64(..) => "Float64",
            Value::Decimal(..) => "Decimal",
            Value::Varchar(..) => "Varchar",
            Value::Blob(..) => "Blob",
            Value::Date(..) => "Date",
            Value::Time(..) => "Time",
            Value::Timestamp(..) => "Timestamp",
            Value::Uuid(..) => "Uuid",
            Value::Json(..) => "Json",
            Value::List(..) => "List",
            Value::Record(..) => "Record",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}
