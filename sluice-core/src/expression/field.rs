use crate::Expr;
use std::borrow::Cow;

/// Projected expression and the property name it is read back as.
#[derive(Debug, Clone)]
pub struct Field {
    pub property: Cow<'static, str>,
    pub expr: Expr,
}

impl Field {
    pub fn new(property: impl Into<Cow<'static, str>>, expr: impl Into<Expr>) -> Self {
        Self {
            property: property.into(),
            expr: expr.into(),
        }
    }
}

/// Builds the ordered projection of a statement.
///
/// ```
/// use sluice_core::{ColumnDef, DataType, Table, TableDef, fields};
/// let company = Table::new(
///     TableDef::builder("company")
///         .column(ColumnDef::new("id", "id", DataType::Int).autogenerated_primary_key())
///         .column(ColumnDef::new("name", "name", DataType::String))
///         .build(),
/// );
/// let projection = fields! { "id" => company.col("id"), "name" => company.col("name") };
/// assert_eq!(projection[1].property, "name");
/// ```
#[macro_export]
macro_rules! fields {
    ($($property:expr => $expr:expr),* $(,)?) => {
        ::std::vec![$($crate::Field::new($property, $expr)),*]
    };
}
