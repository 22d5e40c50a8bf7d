use crate::{
    ColumnDef, ColumnRef, Cte, DataType, Expr, ExprKind, Meta, PrimaryKeyType, QueryError,
    Result, SequenceOp, Source, TypeAdapter, WithSet,
};
use indexmap::IndexMap;
use std::{borrow::Cow, sync::Arc};

/// Immutable description of a table or view.
///
/// Built once through [`TableDef::builder`] and shared by reference, every
/// [`Table`] handle points to the same definition.
#[derive(Debug)]
pub struct TableDef {
    pub schema: Cow<'static, str>,
    pub name: Cow<'static, str>,
    /// Columns keyed by property name, in declaration order.
    pub columns: IndexMap<String, Arc<ColumnDef>>,
    /// Named CTEs a reference to this table requires, used by views defined on top of a CTE.
    pub withs: WithSet,
}

impl TableDef {
    pub fn builder(name: impl Into<Cow<'static, str>>) -> TableDefBuilder {
        TableDefBuilder {
            def: TableDef {
                schema: Cow::Borrowed(""),
                name: name.into(),
                columns: IndexMap::new(),
                withs: WithSet::default(),
            },
        }
    }
    pub fn column(&self, property: &str) -> Option<&Arc<ColumnDef>> {
        self.columns.get(property)
    }
    pub fn primary_key(&self) -> impl Iterator<Item = &Arc<ColumnDef>> {
        self.columns.values().filter(|c| c.is_primary_key())
    }
    /// The single autogenerated primary key column.
    pub fn autogenerated_primary_key(&self) -> Result<&Arc<ColumnDef>> {
        let mut found = self
            .columns
            .values()
            .filter(|c| c.primary_key == PrimaryKeyType::Autogenerated);
        match (found.next(), found.next()) {
            (Some(column), None) => Ok(column),
            (None, _) => Err(QueryError::configuration(format!(
                "Table `{}` has no autogenerated primary key",
                self.name
            ))),
            (Some(..), Some(..)) => Err(QueryError::configuration(format!(
                "Table `{}` has more than one autogenerated primary key",
                self.name
            ))),
        }
    }
}

pub struct TableDefBuilder {
    def: TableDef,
}

impl TableDefBuilder {
    pub fn schema(mut self, schema: impl Into<Cow<'static, str>>) -> Self {
        self.def.schema = schema.into();
        self
    }
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.def
            .columns
            .insert(column.property.to_string(), Arc::new(column));
        self
    }
    /// Declares a CTE every statement referencing the table must include.
    pub fn with(mut self, cte: &Arc<Cte>) -> Self {
        self.def.withs.insert(cte.clone());
        self
    }
    pub fn build(self) -> Arc<TableDef> {
        Arc::new(self.def)
    }
}

/// How a handle participates in a statement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    #[default]
    Plain,
    /// Every column is nullable, an outer join miss becomes an absent property.
    LeftJoin,
    /// Values before the update, only valid in the returning clause of an update.
    OldValues,
}

/// Cheap handle over a shared [`TableDef`].
#[derive(Debug, Clone)]
pub struct Table {
    def: Arc<TableDef>,
    alias: Option<Cow<'static, str>>,
    role: TableRole,
}

impl Table {
    pub fn new(def: Arc<TableDef>) -> Self {
        Self {
            def,
            alias: None,
            role: TableRole::Plain,
        }
    }
    pub fn def(&self) -> &Arc<TableDef> {
        &self.def
    }
    pub fn name(&self) -> &str {
        &self.def.name
    }
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
    pub fn role(&self) -> TableRole {
        self.role
    }
    /// Name used to qualify the columns.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.def.name)
    }
    pub fn aliased(&self, alias: impl Into<Cow<'static, str>>) -> Table {
        Table {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }
    pub fn for_use_in_left_join(&self) -> Table {
        Table {
            role: TableRole::LeftJoin,
            ..self.clone()
        }
    }
    pub fn old_values(&self) -> Table {
        Table {
            role: TableRole::OldValues,
            ..self.clone()
        }
    }
    /// Same definition and alias, the role is ignored.
    pub fn same_table(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.def, &other.def) && self.alias == other.alias
    }
    /// Expression reading the column of `property`.
    ///
    /// An unknown property produces an expression failing when rendered.
    pub fn col(&self, property: &str) -> Expr {
        let Some(column) = self.def.column(property) else {
            return Expr::invalid(format!(
                "Table `{}` has no property `{}`",
                self.def.name, property
            ));
        };
        Expr::new(
            ExprKind::Column(ColumnRef {
                source: Source::Table(self.clone()),
                name: column.name.clone(),
                property: column.property.clone(),
            }),
            Meta {
                data_type: column.data_type.clone(),
                nullable: column.nullable || self.role == TableRole::LeftJoin,
                aggregate: false,
                adapter: column.adapter.clone(),
                withs: self.def.withs.clone(),
            },
        )
    }
}

impl From<Arc<TableDef>> for Table {
    fn from(value: Arc<TableDef>) -> Self {
        Table::new(value)
    }
}

/// Named database sequence.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: Cow<'static, str>,
    data_type: DataType,
    adapter: Option<Arc<dyn TypeAdapter>>,
}

impl Sequence {
    pub fn new(name: impl Into<Cow<'static, str>>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            adapter: None,
        }
    }
    pub fn adapter(mut self, adapter: Arc<dyn TypeAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn next_value(&self) -> Expr {
        self.expr(SequenceOp::NextValue)
    }
    pub fn current_value(&self) -> Expr {
        self.expr(SequenceOp::CurrentValue)
    }
    fn expr(&self, op: SequenceOp) -> Expr {
        Expr::new(
            ExprKind::Sequence {
                name: self.name.clone(),
                op,
            },
            Meta {
                data_type: self.data_type.clone(),
                adapter: self.adapter.clone(),
                ..Default::default()
            },
        )
    }
}
