use crate::{
    ArrayItems, AsValue, ColumnDef, Composition, Error, Expr, ExprKind, Field, Meta, QueryError,
    QueryRunner, Record, Result, RowCount, RowLabeled, Session, SubSelectMode, TypeAdapter, Value,
    apply_compositions, writer::Compiled,
};
use std::{panic::Location, sync::Arc};

/// Rows of a page together with the count of all the rows matching the select.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: u64,
}

/// Convert a value read back through the adapter of `meta`, or `default` when it declares none.
pub fn convert_value(value: Value, meta: &Meta, default: &Arc<dyn TypeAdapter>) -> Result<Value> {
    meta.adapter
        .as_ref()
        .unwrap_or(default)
        .from_db(value, &meta.data_type)
}

/// Convert the value read back for `expr`, json arrays are decoded element by element.
pub fn decode_value(value: Value, expr: &Expr, default: &Arc<dyn TypeAdapter>) -> Result<Value> {
    match expr.kind() {
        ExprKind::AggregateArray {
            items,
            empty_for_no_value,
        } => decode_array(value, items, *empty_for_no_value, default),
        ExprKind::SubSelect {
            select,
            mode: SubSelectMode::AggregatedArray,
            empty_for_no_value,
        } => {
            let items = if select.one_column {
                let Some(field) = select.fields.first() else {
                    return Err(QueryError::configuration("The inline query has no field"));
                };
                ArrayItems::OneColumn(field.expr.clone())
            } else {
                ArrayItems::Fields(select.fields.clone())
            };
            decode_array(value, &items, *empty_for_no_value, default)
        }
        _ if value.is_null() && expr.meta().adapter.is_none() => Ok(Value::Null),
        _ => convert_value(value, expr.meta(), default),
    }
}

fn decode_array(
    value: Value,
    items: &ArrayItems,
    empty_for_no_value: bool,
    default: &Arc<dyn TypeAdapter>,
) -> Result<Value> {
    let empty = || {
        if empty_for_no_value {
            Value::List(Some(Vec::new()))
        } else {
            Value::Null
        }
    };
    if value.is_null() {
        return Ok(empty());
    }
    let json = serde_json::Value::try_from_value(value)
        .map_err(|e| e.context(QueryError::TypeAdapter("Cannot read an aggregated array".into())))?;
    let serde_json::Value::Array(elements) = json else {
        return Err(QueryError::type_adapter(format!(
            "An aggregated array was expected, found {json}"
        )));
    };
    let mut result = Vec::with_capacity(elements.len());
    for element in elements {
        match items {
            ArrayItems::Fields(fields) => {
                let serde_json::Value::Object(mut object) = element else {
                    return Err(QueryError::type_adapter(format!(
                        "An object was expected in the aggregated array, found {element}"
                    )));
                };
                if object.values().all(serde_json::Value::is_null) {
                    continue;
                }
                let mut record = Record::with_capacity(fields.len());
                for field in fields {
                    let value = object
                        .remove(field.property.as_ref())
                        .map(json_to_value)
                        .unwrap_or_default();
                    let value = decode_value(value, &field.expr, default)?;
                    if !value.is_null() {
                        record.insert(field.property.to_string(), value);
                    }
                }
                result.push(Value::Record(Some(Box::new(record))));
            }
            ArrayItems::OneColumn(expr) => {
                let element = match element {
                    serde_json::Value::Object(mut object)
                        if object.len() == 1 && object.contains_key("result") =>
                    {
                        object.remove("result").unwrap_or_default()
                    }
                    other => other,
                };
                let value = decode_value(json_to_value(element), expr, default)?;
                if !value.is_null() {
                    result.push(value);
                }
            }
        }
    }
    if result.is_empty() {
        return Ok(empty());
    }
    Ok(Value::List(Some(result)))
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Boolean(Some(v)),
        serde_json::Value::Number(v) => match v.as_i64() {
            Some(v) => Value::Int64(Some(v)),
            None => Value::Float64(v.as_f64()),
        },
        serde_json::Value::String(v) => Value::Varchar(Some(v)),
        other => Value::Json(Some(other)),
    }
}

/// Rows read back as records, positionally matched with `fields`.
///
/// A null read for an optional or aggregated property leaves it absent, for
/// any other property it is a type adapter error.
pub fn decode_records(
    rows: Vec<RowLabeled>,
    fields: &[Field],
    default: &Arc<dyn TypeAdapter>,
) -> Result<Vec<Record>> {
    rows.into_iter()
        .map(|row| {
            let mut values = row.values.into_vec().into_iter();
            let mut record = Record::with_capacity(fields.len());
            for field in fields {
                let value = decode_value(values.next().unwrap_or_default(), &field.expr, default)
                    .map_err(|e| e.context(format!("While reading the property `{}`", field.property)))?;
                if !value.is_null() {
                    record.insert(field.property.to_string(), value);
                } else if !field.expr.is_nullable() && !field.expr.is_aggregate() {
                    return Err(QueryError::type_adapter(format!(
                        "The property `{}` is not optional but the database returned null",
                        field.property
                    )));
                }
            }
            Ok(record)
        })
        .collect()
}

/// First value of every row, a null is kept only when `field` is optional.
pub fn decode_scalars(
    rows: Vec<RowLabeled>,
    field: &Field,
    default: &Arc<dyn TypeAdapter>,
) -> Result<Vec<Value>> {
    rows.into_iter()
        .map(|row| {
            let value = row.values.into_vec().into_iter().next().unwrap_or_default();
            let value = decode_value(value, &field.expr, default)?;
            if value.is_null() && !field.expr.is_nullable() && !field.expr.is_aggregate() {
                return Err(QueryError::type_adapter(
                    "The column is not optional but the database returned null",
                ));
            }
            Ok(value)
        })
        .collect()
}

/// Generated id of `column`, a missing one is an error.
pub(crate) fn decode_id(value: Value, column: &ColumnDef, default: &Arc<dyn TypeAdapter>) -> Result<Value> {
    if value.is_null() {
        return Err(QueryError::type_adapter(format!(
            "The insert returned no value for the primary key `{}`",
            column.name
        )));
    }
    column
        .adapter
        .as_ref()
        .unwrap_or(default)
        .from_db(value, &column.data_type)
}

pub(crate) fn count_from_rows(rows: Vec<RowLabeled>) -> Result<u64> {
    let value = rows
        .into_iter()
        .next()
        .and_then(|row| row.values.into_vec().into_iter().next())
        .unwrap_or_default();
    let count = i64::try_from_value(value)
        .map_err(|e| e.context(QueryError::TypeAdapter("Cannot read the count".into())))?;
    u64::try_from(count).map_err(|e| Error::new(e).context(QueryError::TypeAdapter("Negative count".into())))
}

/// Fail when `count` rows fall outside `expected`, the statement already took effect.
pub fn check_count(operation: &'static str, count: u64, expected: &RowCount) -> Result<()> {
    if expected.contains(count) {
        return Ok(());
    }
    let error = Error::new(QueryError::ResultCountViolation {
        operation,
        count,
        expected: expected.to_string(),
    });
    log::warn!("{:#}", error);
    Err(error)
}

pub(crate) fn exactly_one<T>(operation: &'static str, items: Vec<T>) -> Result<T> {
    if items.is_empty() {
        return Err(Error::new(QueryError::EmptyResult { operation }));
    }
    check_count(operation, items.len() as u64, &RowCount::exactly(1))?;
    items
        .into_iter()
        .next()
        .ok_or_else(|| Error::new(QueryError::EmptyResult { operation }))
}

pub(crate) fn none_or_one<T>(operation: &'static str, items: Vec<T>) -> Result<Option<T>> {
    check_count(operation, items.len() as u64, &RowCount::new(..=1))?;
    Ok(items.into_iter().next())
}

pub(crate) async fn run_mutation<R: QueryRunner>(
    session: &mut Session<R>,
    compiled: &Compiled,
    expected: &RowCount,
    operation: &'static str,
    location: &'static Location<'static>,
) -> Result<u64> {
    let count = session.mutation(compiled, location).await?;
    check_count(operation, count, expected)?;
    Ok(count)
}

pub(crate) async fn run_returning<R: QueryRunner>(
    session: &mut Session<R>,
    compiled: &Compiled,
    fields: &[Field],
    compositions: &[Arc<Composition>],
    expected: &RowCount,
    operation: &'static str,
    location: &'static Location<'static>,
) -> Result<Vec<Record>> {
    let rows = session.query_rows(compiled, location).await?;
    let mut records = decode_records(rows, fields, session.adapter())?;
    check_count(operation, records.len() as u64, expected)?;
    apply_compositions(compositions, &mut records, session, location).await?;
    Ok(records)
}

pub(crate) async fn run_returning_one<R: QueryRunner>(
    session: &mut Session<R>,
    compiled: &Compiled,
    field: &Field,
    expected: &RowCount,
    operation: &'static str,
    location: &'static Location<'static>,
) -> Result<Vec<Value>> {
    let rows = session.query_rows(compiled, location).await?;
    let values = decode_scalars(rows, field, session.adapter())?;
    check_count(operation, values.len() as u64, expected)?;
    Ok(values)
}
