use sluice::{
    ColumnDef, DataType, DefaultTypeAdapter, Result, Table, TableDef, TypeAdapter, Value,
};
use std::sync::Arc;

/// Companies form a tree through `parentId`.
pub fn company() -> Table {
    Table::new(
        TableDef::builder("company")
            .column(ColumnDef::new("id", "id", DataType::Int).autogenerated_primary_key())
            .column(ColumnDef::new("name", "name", DataType::String))
            .column(ColumnDef::new("parentId", "parent_id", DataType::Int).optional())
            .build(),
    )
}

pub fn employee() -> Table {
    Table::new(
        TableDef::builder("employee")
            .column(ColumnDef::new("id", "id", DataType::Int).autogenerated_primary_key())
            .column(ColumnDef::new("name", "name", DataType::String))
            .column(ColumnDef::new("companyId", "company_id", DataType::Int))
            .column(ColumnDef::new("salary", "salary", DataType::Decimal).optional())
            .build(),
    )
}

/// Table keyed by a sequence, with a column read under two types.
pub fn invoice() -> Table {
    Table::new(
        TableDef::builder("invoice")
            .schema("billing")
            .column(
                ColumnDef::new("id", "id", DataType::BigInt).autogenerated_by_sequence("invoice_seq"),
            )
            .column(ColumnDef::new("total", "total", DataType::Decimal))
            .column(ColumnDef::new("totalText", "total", DataType::String).computed())
            .build(),
    )
}

/// Ids shown to clients as opaque strings, stored as integers.
#[derive(Debug, Default)]
pub struct ObfuscatedIds;

const KEY: i64 = 0x5f3a;

impl ObfuscatedIds {
    pub fn data_type() -> DataType {
        DataType::custom("obfuscatedId")
    }

    pub fn encode(id: i64) -> String {
        format!("id_{:x}", id ^ KEY)
    }
}

impl TypeAdapter for ObfuscatedIds {
    fn to_db(&self, value: Value, data_type: &DataType) -> Result<Value> {
        if *data_type != Self::data_type() {
            return DefaultTypeAdapter.to_db(value, data_type);
        }
        let Value::Varchar(Some(text)) = value else {
            return Ok(Value::Int32(None));
        };
        let Some(hex) = text.strip_prefix("id_") else {
            return Err(sluice::QueryError::type_adapter(format!(
                "`{text}` is not an obfuscated id"
            )));
        };
        let id = i64::from_str_radix(hex, 16)
            .map_err(|e| sluice::Error::new(e).context(format!("`{text}` is not an obfuscated id")))?;
        Ok(Value::Int32(Some((id ^ KEY) as i32)))
    }

    fn from_db(&self, value: Value, data_type: &DataType) -> Result<Value> {
        if *data_type != Self::data_type() {
            return DefaultTypeAdapter.from_db(value, data_type);
        }
        Ok(match value {
            Value::Int32(Some(v)) => Value::Varchar(Some(Self::encode(v as i64))),
            Value::Int64(Some(v)) => Value::Varchar(Some(Self::encode(v))),
            _ => Value::Varchar(None),
        })
    }
}

/// Customers exposing their id through [`ObfuscatedIds`].
pub fn customer() -> Table {
    let adapter: Arc<dyn TypeAdapter> = Arc::new(ObfuscatedIds);
    Table::new(
        TableDef::builder("customer")
            .column(
                ColumnDef::new("id", "id", ObfuscatedIds::data_type())
                    .autogenerated_primary_key()
                    .adapter(adapter.clone()),
            )
            .column(ColumnDef::new("name", "name", DataType::String))
            .column(
                ColumnDef::new("referrerId", "referrer_id", ObfuscatedIds::data_type())
                    .optional()
                    .adapter(adapter),
            )
            .build(),
    )
}
