use crate::{ColumnRef, Cte, Expr, ExprKind, Field, Meta, Table, WithSet};
use std::{
    borrow::Cow,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Anything a statement can read rows from.
#[derive(Debug, Clone)]
pub enum Source {
    Table(Table),
    Cte(CteSource),
    Recursive(RecursiveRef),
    /// Derived table introduced by the writer, referenced through its alias.
    Derived(String),
}

impl Source {
    /// Named CTEs required by referencing this source.
    pub fn withs(&self) -> WithSet {
        match self {
            Source::Table(table) => table.def().withs.clone(),
            Source::Cte(cte) => {
                let mut withs = WithSet::default();
                withs.insert(cte.cte.clone());
                withs
            }
            Source::Recursive(..) | Source::Derived(..) => WithSet::default(),
        }
    }
    pub(crate) fn recursive_scope(&self) -> Option<u64> {
        match self {
            Source::Recursive(r) => Some(r.scope.id),
            _ => None,
        }
    }
}

impl From<Table> for Source {
    fn from(value: Table) -> Self {
        Source::Table(value)
    }
}

impl From<&Table> for Source {
    fn from(value: &Table) -> Self {
        Source::Table(value.clone())
    }
}

impl From<CteSource> for Source {
    fn from(value: CteSource) -> Self {
        Source::Cte(value)
    }
}

impl From<&CteSource> for Source {
    fn from(value: &CteSource) -> Self {
        Source::Cte(value.clone())
    }
}

impl From<&RecursiveRef> for Source {
    fn from(value: &RecursiveRef) -> Self {
        Source::Recursive(value.clone())
    }
}

/// Table-like handle over a named CTE, its columns are the projected properties.
#[derive(Debug, Clone)]
pub struct CteSource {
    pub(crate) cte: Arc<Cte>,
    alias: Option<Cow<'static, str>>,
    left_join: bool,
}

impl CteSource {
    pub(crate) fn new(cte: Arc<Cte>) -> Self {
        Self {
            cte,
            alias: None,
            left_join: false,
        }
    }
    pub fn cte(&self) -> &Arc<Cte> {
        &self.cte
    }
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.cte.name)
    }
    pub fn aliased(&self, alias: impl Into<Cow<'static, str>>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }
    pub fn for_use_in_left_join(&self) -> Self {
        Self {
            left_join: true,
            ..self.clone()
        }
    }
    pub fn col(&self, property: &str) -> Expr {
        let Some(field) = self.cte.select.field(property) else {
            return Expr::invalid(format!(
                "The query `{}` has no property `{}`",
                self.cte.name, property
            ));
        };
        let mut withs = WithSet::default();
        withs.insert(self.cte.clone());
        column_of(
            Source::Cte(self.clone()),
            field,
            self.left_join,
            withs,
        )
    }
}

static RECURSIVE_SCOPES: AtomicU64 = AtomicU64::new(1);

/// Projection of a recursive select, shared by the base query and the recursive term.
#[derive(Debug)]
pub struct RecursiveScope {
    pub(crate) id: u64,
    pub(crate) fields: Vec<Field>,
}

impl RecursiveScope {
    pub(crate) fn new(fields: Vec<Field>) -> Arc<Self> {
        Arc::new(Self {
            id: RECURSIVE_SCOPES.fetch_add(1, Ordering::Relaxed),
            fields,
        })
    }
}

/// Self reference of a recursive select, handed to the recursive term builder.
#[derive(Debug, Clone)]
pub struct RecursiveRef {
    pub(crate) scope: Arc<RecursiveScope>,
}

impl RecursiveRef {
    pub fn col(&self, property: &str) -> Expr {
        let Some(field) = self.scope.fields.iter().find(|f| f.property == property) else {
            return Expr::invalid(format!(
                "The recursive query has no property `{property}`"
            ));
        };
        column_of(
            Source::Recursive(self.clone()),
            field,
            false,
            WithSet::default(),
        )
    }
}

fn column_of(source: Source, field: &Field, nullable: bool, withs: WithSet) -> Expr {
    let meta = field.expr.meta();
    Expr::new(
        ExprKind::Column(ColumnRef {
            source,
            name: field.property.clone(),
            property: field.property.clone(),
        }),
        Meta {
            data_type: meta.data_type.clone(),
            nullable: nullable || meta.nullable,
            aggregate: false,
            adapter: meta.adapter.clone(),
            withs,
        },
    )
}

/// Column of a derived table, typed like the projected field it reads.
pub(crate) fn derived_column(alias: &str, field: &Field) -> Expr {
    column_of(
        Source::Derived(alias.to_string()),
        field,
        false,
        WithSet::default(),
    )
}
