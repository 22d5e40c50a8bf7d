use crate::{Error, Record, Result, Value, truncate_long};
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use std::{any, str::FromStr};
use time::{Date, PrimitiveDateTime, Time, format_description::BorrowedFormatItem, macros::format_description};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant for the type, other integer
/// widths (range checked) and, where a textual form exists, `Varchar` values
/// which are parsed. Runners frequently return strings for big integers,
/// decimals and temporal types, this keeps the decoding side forgiving.
pub trait AsValue {
    /// The typed null variant for this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} to {}",
        truncate_long!(format!("{value:?}")),
        any::type_name::<T>(),
    ))
}

fn parse_text<T: FromStr>(text: &str) -> Result<T>
where
    <T as FromStr>::Err: std::fmt::Display,
{
    text.trim().parse::<T>().map_err(|e| {
        Error::msg(format!(
            "Cannot parse `{}` as {}: {e}",
            truncate_long!(text),
            any::type_name::<T>(),
        ))
    })
}

macro_rules! impl_as_value {
    ($value:ident, $source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self.into()))
            }
            fn try_from_value($value: Value) -> Result<Self> {
                match $value {
                    $destination(Some(v)) => Ok(v),
                    $($pat_rest => $expr_rest,)*
                    _ => Err(mismatch::<Self>(&$value)),
                }
            }
        }
    };
}

impl_as_value!(
    value,
    bool,
    Value::Boolean,
    Value::Int32(Some(v)) => Ok(v != 0),
    Value::Int64(Some(v)) => Ok(v != 0),
    Value::Json(Some(serde_json::Value::Bool(v))) => Ok(v),
    Value::Varchar(Some(ref v)) => match v.as_str() {
        "1" | "t" | "true" | "TRUE" => Ok(true),
        "0" | "f" | "false" | "FALSE" => Ok(false),
        _ => Err(mismatch::<bool>(&value)),
    },
);
impl_as_value!(
    value,
    i32,
    Value::Int32,
    Value::Int64(Some(v)) => i32::try_from(v)
        .map_err(|_| Error::msg(format!("Value {v}: i64 is out of range for i32"))),
    Value::Decimal(Some(v)) => {
        let error = Error::msg(format!("Value {v}: Decimal does not fit into i32"));
        if !v.is_integer() {
            return Err(error.context("The value is not a integer"));
        }
        v.to_i32().ok_or(error)
    },
    Value::Json(Some(serde_json::Value::Number(ref v))) => v
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| mismatch::<i32>(&value)),
    Value::Varchar(Some(ref v)) => parse_text::<i32>(v),
);
impl_as_value!(
    value,
    i64,
    Value::Int64,
    Value::Int32(Some(v)) => Ok(v as _),
    Value::Decimal(Some(v)) => {
        let error = Error::msg(format!("Value {v}: Decimal does not fit into i64"));
        if !v.is_integer() {
            return Err(error.context("The value is not a integer"));
        }
        v.to_i64().ok_or(error)
    },
    Value::Json(Some(serde_json::Value::Number(ref v))) => {
        v.as_i64().ok_or_else(|| mismatch::<i64>(&value))
    },
    Value::Varchar(Some(ref v)) => parse_text::<i64>(v),
);
impl_as_value!(
    value,
    f64,
    Value::Float64,
    Value::Int32(Some(v)) => Ok(v as _),
    Value::Int64(Some(v)) => Ok(v as _),
    Value::Decimal(Some(v)) => v.to_f64().ok_or_else(|| mismatch::<f64>(&value)),
    Value::Json(Some(serde_json::Value::Number(ref v))) => {
        v.as_f64().ok_or_else(|| mismatch::<f64>(&value))
    },
    Value::Varchar(Some(ref v)) => parse_text::<f64>(v),
);
impl_as_value!(
    value,
    Decimal,
    Value::Decimal,
    Value::Int32(Some(v)) => Ok(v.into()),
    Value::Int64(Some(v)) => Ok(v.into()),
    Value::Float64(Some(v)) => Decimal::from_f64(v).ok_or_else(|| mismatch::<Decimal>(&value)),
    Value::Json(Some(serde_json::Value::Number(ref v))) => parse_text::<Decimal>(&v.to_string()),
    Value::Varchar(Some(ref v)) => parse_text::<Decimal>(v),
);
impl_as_value!(
    value,
    String,
    Value::Varchar,
    Value::Json(Some(serde_json::Value::String(v))) => Ok(v),
    Value::Uuid(Some(v)) => Ok(v.to_string()),
);
impl_as_value!(
    value,
    Uuid,
    Value::Uuid,
    Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(|e| mismatch::<Uuid>(&value).context(e)),
    Value::Json(Some(serde_json::Value::String(ref v))) => parse_text::<Uuid>(v),
    Value::Varchar(Some(ref v)) => parse_text::<Uuid>(v),
);
impl_as_value!(
    value,
    Box<[u8]>,
    Value::Blob,
    Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
);

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const TIME_SUBSECOND: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond]");
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const TIMESTAMP_SUBSECOND: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

fn parse_temporal<T>(
    text: &str,
    formats: &[&[BorrowedFormatItem<'static>]],
    parse: impl Fn(&str, &[BorrowedFormatItem<'static>]) -> std::result::Result<T, time::error::Parse>,
) -> Result<T> {
    let text = text.trim().replacen('T', " ", 1);
    for format in formats {
        if let Ok(v) = parse(&text, format) {
            return Ok(v);
        }
    }
    Err(Error::msg(format!(
        "Cannot parse `{}` as {}",
        truncate_long!(text),
        any::type_name::<T>(),
    )))
}

macro_rules! impl_as_value_temporal {
    ($source:ty, $destination:path, $($format:expr),+ $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    Value::Varchar(Some(ref v))
                    | Value::Json(Some(serde_json::Value::String(ref v))) => {
                        parse_temporal(v, &[$($format),+], |text, format| {
                            <$source>::parse(text, format)
                        })
                    }
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value_temporal!(Date, Value::Date, DATE);
impl_as_value_temporal!(Time, Value::Time, TIME_SUBSECOND, TIME);
impl_as_value_temporal!(
    PrimitiveDateTime,
    Value::Timestamp,
    TIMESTAMP_SUBSECOND,
    TIMESTAMP
);

impl AsValue for serde_json::Value {
    fn as_empty_value() -> Value {
        Value::Json(None)
    }
    fn as_value(self) -> Value {
        Value::Json(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => serde_json::from_str(v).map_err(|e| {
                Error::new(e).context(format!("Cannot parse `{}` as json", truncate_long!(v)))
            }),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
}

impl<T: AsValue> AsValue for Vec<T> {
    fn as_empty_value() -> Value {
        Value::List(None)
    }
    fn as_value(self) -> Value {
        Value::List(Some(self.into_iter().map(AsValue::as_value).collect()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(Some(v)) => v.into_iter().map(T::try_from_value).collect(),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Record {
    fn as_empty_value() -> Value {
        Value::Record(None)
    }
    fn as_value(self) -> Value {
        Value::Record(Some(Box::new(self)))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(Some(v)) => Ok(*v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}
