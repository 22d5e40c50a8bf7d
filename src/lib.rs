//! Typed SQL statements rendered per dialect and executed through pluggable runners.
//!
//! ```
//! use sluice::{ColumnDef, DataType, PostgresSqlWriter, Table, TableDef, fields, select_from};
//! let company = Table::new(
//!     TableDef::builder("company")
//!         .column(ColumnDef::new("id", "id", DataType::Int).autogenerated_primary_key())
//!         .column(ColumnDef::new("name", "name", DataType::String))
//!         .build(),
//! );
//! let query = select_from(&company)
//!     .select(fields! { "name" => company.col("name") })
//!     .filter(company.col("id").equals(1));
//! assert_eq!(
//!     query.sql(&PostgresSqlWriter::new()).unwrap(),
//!     "SELECT \"company\".\"name\" AS \"name\"\nFROM \"company\"\nWHERE \"company\".\"id\" = $1",
//! );
//! ```
pub use sluice_core::*;
