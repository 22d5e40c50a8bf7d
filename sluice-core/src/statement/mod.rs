mod cte;
mod delete;
mod insert;
mod select;
mod update;

pub use cte::*;
pub use delete::*;
pub use insert::*;
pub use select::*;
pub use update::*;

use crate::{ExprKind, Field, Source, TableRole};
use std::{
    fmt::{self, Display, Formatter},
    ops::{Bound, RangeBounds},
};

/// What a mutation sends back.
#[derive(Debug, Clone, Default)]
pub enum Returning {
    #[default]
    None,
    /// The value of the autogenerated primary key.
    LastInsertedId,
    Fields(Vec<Field>),
    /// A single value per row, read back under the property `result`.
    OneColumn(Field),
}

impl Returning {
    pub fn fields(&self) -> &[Field] {
        match self {
            Returning::Fields(fields) => fields,
            Returning::OneColumn(field) => std::slice::from_ref(field),
            Returning::None | Returning::LastInsertedId => &[],
        }
    }
    pub fn withs(&self) -> WithSet {
        let mut withs = WithSet::default();
        for field in self.fields() {
            withs.extend(&field.expr.meta().withs);
        }
        withs
    }
}

/// Whether any of `fields` reads the values a table had before the update.
pub(crate) fn references_old_values(fields: &[Field]) -> bool {
    let mut found = false;
    for field in fields {
        field.expr.walk(&mut |e| {
            if let ExprKind::Column(column) = e.kind()
                && let Source::Table(table) = &column.source
                && table.role() == TableRole::OldValues
            {
                found = true;
            }
        });
    }
    found
}

/// Number of rows a statement is allowed to produce or affect.
///
/// Checked after the statement took effect, a violation rolls nothing back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCount {
    pub min: Bound<u64>,
    pub max: Bound<u64>,
}

impl RowCount {
    pub const ANY: RowCount = RowCount {
        min: Bound::Unbounded,
        max: Bound::Unbounded,
    };
    pub fn new(range: impl RangeBounds<u64>) -> Self {
        Self {
            min: range.start_bound().cloned(),
            max: range.end_bound().cloned(),
        }
    }
    pub fn exactly(count: u64) -> Self {
        Self::new(count..=count)
    }
    pub fn contains(&self, count: u64) -> bool {
        (self.min, self.max).contains(&count)
    }
}

impl Default for RowCount {
    fn default() -> Self {
        Self::ANY
    }
}

impl Display for RowCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let min = match self.min {
            Bound::Included(v) => Some(v),
            Bound::Excluded(v) => Some(v.saturating_add(1)),
            Bound::Unbounded => None,
        };
        let max = match self.max {
            Bound::Included(v) => Some(v),
            Bound::Excluded(v) => Some(v.saturating_sub(1)),
            Bound::Unbounded => None,
        };
        match (min, max) {
            (Some(min), Some(max)) if min == max => write!(f, "exactly {min}"),
            (Some(min), Some(max)) => write!(f, "between {min} and {max}"),
            (Some(min), None) => write!(f, "at least {min}"),
            (None, Some(max)) => write!(f, "at most {max}"),
            (None, None) => f.write_str("any number"),
        }
    }
}

/// Type level stages of the statement builders.
///
/// A method is available only in the stages where the resulting statement
/// makes sense, a misplaced call does not compile.
pub mod phase {
    /// Select without a projection yet.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Unprojected;
    /// Select reading records.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Rows;
    /// Select reading one value per row.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OneColumn;
    /// Insert with no value yet.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Pending;
    /// Mutation ready to execute, returning the affected row count.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Ready;
    /// Insert returning the generated primary key.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LastInsertedId;
    /// Mutation returning records.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Returning;
    /// Mutation returning one value per row.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ReturningOne;

    /// Select stages with a projection.
    pub trait Projected: Send + Sync + 'static {}
    impl Projected for Rows {}
    impl Projected for OneColumn {}

    /// Insert stages accepting more values.
    pub trait Settable: Send + Sync + 'static {}
    impl Settable for Pending {}
    impl Settable for Ready {}
}
