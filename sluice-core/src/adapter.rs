use crate::{AsValue, DataType, QueryError, Result, Value};
use anyhow::Context;
use rust_decimal::Decimal;
use std::fmt::Debug;
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Conversion of the values crossing the driver boundary.
///
/// `to_db` is applied to every parameter before it is handed to the runner,
/// `from_db` to every value read back. Both are keyed by the semantic type
/// tag of the expression the value belongs to. A null must map to a null
/// unless the adapter explicitly decides otherwise.
pub trait TypeAdapter: Send + Sync + Debug {
    fn to_db(&self, value: Value, data_type: &DataType) -> Result<Value>;
    fn from_db(&self, value: Value, data_type: &DataType) -> Result<Value>;
}

/// Coerces values into the canonical variant of their semantic type.
///
/// `Custom` and `Unknown` types are passed through untouched.
#[derive(Default, Debug, Clone, Copy)]
pub struct DefaultTypeAdapter;

impl DefaultTypeAdapter {
    pub fn new() -> Self {
        Self
    }

    fn coerce(value: Value, data_type: &DataType) -> Result<Value> {
        let null = value.is_null();
        macro_rules! coerce {
            ($ty:ty) => {
                if null {
                    <$ty>::as_empty_value()
                } else {
                    <$ty>::try_from_value(value)?.as_value()
                }
            };
        }
        Ok(match data_type {
            DataType::Boolean => coerce!(bool),
            DataType::Int => coerce!(i32),
            DataType::BigInt => coerce!(i64),
            DataType::Double => coerce!(f64),
            DataType::Decimal => coerce!(Decimal),
            DataType::String => coerce!(String),
            DataType::Uuid => coerce!(Uuid),
            DataType::LocalDate => coerce!(Date),
            DataType::LocalTime => coerce!(Time),
            DataType::LocalDateTime => coerce!(PrimitiveDateTime),
            DataType::Blob => coerce!(Box<[u8]>),
            DataType::Json => coerce!(serde_json::Value),
            DataType::Custom(..) | DataType::Unknown => value,
        })
    }
}

impl TypeAdapter for DefaultTypeAdapter {
    fn to_db(&self, value: Value, data_type: &DataType) -> Result<Value> {
        Self::coerce(value, data_type)
            .with_context(|| QueryError::TypeAdapter(format!("Cannot send a value as {data_type:?}")))
    }

    fn from_db(&self, value: Value, data_type: &DataType) -> Result<Value> {
        Self::coerce(value, data_type)
            .with_context(|| QueryError::TypeAdapter(format!("Cannot read a value as {data_type:?}")))
    }
}
