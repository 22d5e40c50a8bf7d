use crate::{Expr, Field};
use std::borrow::Cow;

/// Scalar functions, the concrete SQL is chosen by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    Concat,
    Length,
    Lower,
    Upper,
    Trim,
    Abs,
    AsString,
    Coalesce,
    EqualsInsensitive,
    /// User or database defined function, rendered as `name(args)`.
    Call(Cow<'static, str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    CountAll,
    Sum,
    Min,
    Max,
    Average,
}

/// Which side of the text the pattern of a like predicate is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeMatch {
    Contains,
    StartsWith,
    EndsWith,
}

/// How a sub-select is embedded into the enclosing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubSelectMode {
    /// Single value of a one column select.
    Value,
    /// Every row folded into a json array.
    AggregatedArray,
    Exists,
    NotExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOp {
    NextValue,
    CurrentValue,
}

/// Elements of an aggregated json array.
#[derive(Debug, Clone)]
pub enum ArrayItems {
    /// One json object per row.
    Fields(Vec<Field>),
    /// One plain value per row.
    OneColumn(Expr),
}
