use crate::{
    Aggregate, ArrayItems, AsValue, BinaryOpType, DataType, Field, Function, LikeMatch,
    SelectData, SequenceOp, Source, SubSelectMode, TypeAdapter, UnaryOpType, Value, WithSet,
};
use rust_decimal::Decimal;
use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    ops::{Add, Div, Mul, Neg, Not, Rem, Sub},
    sync::Arc,
};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Immutable, cheaply clonable SQL expression.
///
/// Every node carries its [`Meta`]: the semantic type used to convert the
/// values, the nullability, whether it contains an aggregate and the named
/// CTEs it requires (transitively, sub-selects included).
#[derive(Clone)]
pub struct Expr(Arc<Node>);

pub struct Node {
    pub kind: ExprKind,
    pub meta: Meta,
}

#[derive(Clone, Default)]
pub struct Meta {
    pub data_type: DataType,
    pub nullable: bool,
    pub aggregate: bool,
    /// Adapter converting the values, the session default one applies when missing.
    pub adapter: Option<Arc<dyn TypeAdapter>>,
    pub withs: WithSet,
}

impl Meta {
    pub fn of_type(data_type: DataType) -> Self {
        Self {
            data_type,
            ..Default::default()
        }
    }
    /// Metadata of a node computed out of `operands`.
    pub(crate) fn derived<'a>(operands: impl IntoIterator<Item = &'a Expr>, data_type: DataType) -> Self {
        let mut meta = Meta::of_type(data_type);
        for operand in operands {
            let other = operand.meta();
            meta.nullable |= other.nullable;
            meta.aggregate |= other.aggregate;
            meta.withs.extend(&other.withs);
        }
        meta
    }
}

impl Debug for Meta {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .field("aggregate", &self.aggregate)
            .field("adapter", &self.adapter)
            .field("withs", &self.withs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub source: Source,
    /// Database facing name.
    pub name: Cow<'static, str>,
    pub property: Cow<'static, str>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Column(ColumnRef),
    /// Constant, always sent as a parameter.
    Value(Value),
    /// Misuse detected while building, reported as a configuration error when rendered.
    Invalid(String),
    Unary {
        op: UnaryOpType,
        arg: Expr,
    },
    Binary {
        op: BinaryOpType,
        lhs: Expr,
        rhs: Expr,
    },
    Function {
        function: Function,
        args: Vec<Expr>,
    },
    Like {
        lhs: Expr,
        pattern: Expr,
        matching: LikeMatch,
        insensitive: bool,
    },
    Aggregate {
        function: Aggregate,
        arg: Option<Expr>,
        distinct: bool,
    },
    AggregateArray {
        items: ArrayItems,
        empty_for_no_value: bool,
    },
    InList {
        lhs: Expr,
        values: Vec<Expr>,
        negated: bool,
    },
    IsNull {
        arg: Expr,
        negated: bool,
    },
    SubSelect {
        select: Arc<SelectData>,
        mode: SubSelectMode,
        empty_for_no_value: bool,
    },
    InSelect {
        lhs: Expr,
        select: Arc<SelectData>,
        negated: bool,
    },
    Sequence {
        name: Cow<'static, str>,
        op: SequenceOp,
    },
}

impl Debug for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0.kind, f)
    }
}

impl Expr {
    pub fn new(kind: ExprKind, meta: Meta) -> Self {
        Self(Arc::new(Node { kind, meta }))
    }
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ExprKind::Invalid(message.into()), Meta::default())
    }
    /// Untyped constant, it takes the type of the expression it is compared with.
    pub fn value(value: impl Into<Value>) -> Self {
        let value = value.into();
        let nullable = value.is_null();
        Self::new(
            ExprKind::Value(value),
            Meta {
                nullable,
                ..Default::default()
            },
        )
    }
    pub fn typed_value(value: impl Into<Value>, data_type: DataType) -> Self {
        let value = value.into();
        let nullable = value.is_null();
        Self::new(
            ExprKind::Value(value),
            Meta {
                data_type,
                nullable,
                ..Default::default()
            },
        )
    }
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }
    pub fn meta(&self) -> &Meta {
        &self.0.meta
    }
    pub fn data_type(&self) -> &DataType {
        &self.0.meta.data_type
    }
    pub fn is_nullable(&self) -> bool {
        self.0.meta.nullable
    }
    pub fn is_aggregate(&self) -> bool {
        self.0.meta.aggregate
    }
    pub fn is_null_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Value(v) if v.is_null())
    }
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// An untyped constant takes the type and the adapter described by `meta`.
    pub fn adopting(&self, meta: &Meta) -> Expr {
        match self.kind() {
            ExprKind::Value(value)
                if self.meta().data_type == DataType::Unknown
                    && meta.data_type != DataType::Unknown =>
            {
                Expr::new(
                    ExprKind::Value(value.clone()),
                    Meta {
                        data_type: meta.data_type.clone(),
                        nullable: value.is_null(),
                        adapter: meta.adapter.clone(),
                        ..Default::default()
                    },
                )
            }
            _ => self.clone(),
        }
    }

    /// Visits the node and its operands, sub-selects are not entered.
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self.kind() {
            ExprKind::Unary { arg, .. } | ExprKind::IsNull { arg, .. } => arg.walk(f),
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::Like {
                lhs, pattern: rhs, ..
            } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            ExprKind::Function { args, .. } => args.iter().for_each(|v| v.walk(f)),
            ExprKind::Aggregate { arg: Some(arg), .. } => arg.walk(f),
            ExprKind::AggregateArray { items, .. } => match items {
                ArrayItems::Fields(fields) => fields.iter().for_each(|v| v.expr.walk(f)),
                ArrayItems::OneColumn(expr) => expr.walk(f),
            },
            ExprKind::InList { lhs, values, .. } => {
                lhs.walk(f);
                values.iter().for_each(|v| v.walk(f));
            }
            ExprKind::InSelect { lhs, .. } => lhs.walk(f),
            _ => {}
        }
    }

    pub fn references_columns(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= matches!(e.kind(), ExprKind::Column(..)));
        found
    }

    /// First misuse recorded while building the expression.
    pub fn first_invalid(&self) -> Option<String> {
        let mut found = None;
        self.walk(&mut |e| {
            if found.is_none()
                && let ExprKind::Invalid(message) = e.kind()
            {
                found = Some(message.clone());
            }
        });
        found
    }

    /// Boolean valued by construction.
    pub fn is_predicate(&self) -> bool {
        match self.kind() {
            ExprKind::Binary { op, .. } => op.is_comparison() || op.is_logical(),
            ExprKind::Unary { op, .. } => *op == UnaryOpType::Not,
            ExprKind::Like { .. }
            | ExprKind::InList { .. }
            | ExprKind::IsNull { .. }
            | ExprKind::InSelect { .. } => true,
            ExprKind::SubSelect { mode, .. } => {
                matches!(mode, SubSelectMode::Exists | SubSelectMode::NotExists)
            }
            ExprKind::Function { function, .. } => *function == Function::EqualsInsensitive,
            _ => false,
        }
    }

    fn typed_pair(&self, other: Expr) -> (Expr, Expr) {
        let rhs = other.adopting(self.meta());
        let lhs = self.adopting(rhs.meta());
        (lhs, rhs)
    }

    fn binary(&self, op: BinaryOpType, other: Expr) -> Expr {
        let (lhs, rhs) = self.typed_pair(other);
        let data_type = if op.is_comparison() || op.is_logical() {
            DataType::Boolean
        } else if *lhs.data_type() != DataType::Unknown {
            lhs.data_type().clone()
        } else {
            rhs.data_type().clone()
        };
        let meta = Meta::derived([&lhs, &rhs], data_type);
        Expr::new(ExprKind::Binary { op, lhs, rhs }, meta)
    }

    fn function(function: Function, args: Vec<Expr>, data_type: DataType) -> Expr {
        let meta = Meta::derived(&args, data_type);
        Expr::new(ExprKind::Function { function, args }, meta)
    }

    pub fn equals(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::Equal, other.into())
    }
    pub fn not_equals(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::NotEqual, other.into())
    }
    pub fn less_than(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::Less, other.into())
    }
    pub fn greater_than(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::Greater, other.into())
    }
    pub fn less_or_equals(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::LessEqual, other.into())
    }
    pub fn greater_or_equals(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::GreaterEqual, other.into())
    }
    pub fn and(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::And, other.into())
    }
    pub fn or(&self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOpType::Or, other.into())
    }
    pub fn negate(&self) -> Expr {
        let data_type = if self.is_predicate() {
            DataType::Boolean
        } else {
            self.data_type().clone()
        };
        let meta = Meta::derived([self], data_type);
        Expr::new(
            ExprKind::Unary {
                op: UnaryOpType::Not,
                arg: self.clone(),
            },
            meta,
        )
    }

    pub fn is_null(&self) -> Expr {
        self.null_check(false)
    }
    pub fn is_not_null(&self) -> Expr {
        self.null_check(true)
    }
    fn null_check(&self, negated: bool) -> Expr {
        let mut meta = Meta::derived([self], DataType::Boolean);
        meta.nullable = false;
        Expr::new(
            ExprKind::IsNull {
                arg: self.clone(),
                negated,
            },
            meta,
        )
    }

    pub fn in_values<I, V>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        self.in_list(values, false)
    }
    pub fn not_in_values<I, V>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        self.in_list(values, true)
    }
    fn in_list<I, V>(&self, values: I, negated: bool) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        let values: Vec<Expr> = values
            .into_iter()
            .map(|v| v.into().adopting(self.meta()))
            .collect();
        let meta = Meta::derived(std::iter::once(self).chain(&values), DataType::Boolean);
        Expr::new(
            ExprKind::InList {
                lhs: self.clone(),
                values,
                negated,
            },
            meta,
        )
    }

    pub fn concat(&self, other: impl Into<Expr>) -> Expr {
        let text = Meta::of_type(DataType::String);
        Self::function(
            Function::Concat,
            vec![self.clone(), other.into().adopting(&text)],
            DataType::String,
        )
    }
    pub fn length(&self) -> Expr {
        Self::function(Function::Length, vec![self.clone()], DataType::Int)
    }
    pub fn lower(&self) -> Expr {
        Self::function(Function::Lower, vec![self.clone()], DataType::String)
    }
    pub fn upper(&self) -> Expr {
        Self::function(Function::Upper, vec![self.clone()], DataType::String)
    }
    pub fn trim(&self) -> Expr {
        Self::function(Function::Trim, vec![self.clone()], DataType::String)
    }
    pub fn abs(&self) -> Expr {
        let mut meta = Meta::derived([self], self.data_type().clone());
        meta.adapter = self.meta().adapter.clone();
        Expr::new(
            ExprKind::Function {
                function: Function::Abs,
                args: vec![self.clone()],
            },
            meta,
        )
    }
    pub fn as_string(&self) -> Expr {
        Self::function(Function::AsString, vec![self.clone()], DataType::String)
    }
    /// `COALESCE(self, other)`, nullable only when `other` is.
    pub fn value_when_null(&self, other: impl Into<Expr>) -> Expr {
        let (lhs, rhs) = self.typed_pair(other.into());
        let mut meta = Meta::derived([&lhs, &rhs], lhs.data_type().clone());
        meta.nullable = rhs.is_nullable();
        meta.adapter = lhs.meta().adapter.clone();
        Expr::new(
            ExprKind::Function {
                function: Function::Coalesce,
                args: vec![lhs, rhs],
            },
            meta,
        )
    }
    pub fn equals_insensitive(&self, other: impl Into<Expr>) -> Expr {
        let (lhs, rhs) = self.typed_pair(other.into());
        Self::function(Function::EqualsInsensitive, vec![lhs, rhs], DataType::Boolean)
    }

    fn like(&self, other: Expr, matching: LikeMatch, insensitive: bool) -> Expr {
        let pattern = other.adopting(&Meta::of_type(DataType::String));
        let meta = Meta::derived([self, &pattern], DataType::Boolean);
        Expr::new(
            ExprKind::Like {
                lhs: self.clone(),
                pattern,
                matching,
                insensitive,
            },
            meta,
        )
    }
    pub fn contains(&self, other: impl Into<Expr>) -> Expr {
        self.like(other.into(), LikeMatch::Contains, false)
    }
    pub fn contains_insensitive(&self, other: impl Into<Expr>) -> Expr {
        self.like(other.into(), LikeMatch::Contains, true)
    }
    pub fn starts_with(&self, other: impl Into<Expr>) -> Expr {
        self.like(other.into(), LikeMatch::StartsWith, false)
    }
    pub fn starts_with_insensitive(&self, other: impl Into<Expr>) -> Expr {
        self.like(other.into(), LikeMatch::StartsWith, true)
    }
    pub fn ends_with(&self, other: impl Into<Expr>) -> Expr {
        self.like(other.into(), LikeMatch::EndsWith, false)
    }
    pub fn ends_with_insensitive(&self, other: impl Into<Expr>) -> Expr {
        self.like(other.into(), LikeMatch::EndsWith, true)
    }

    /// An empty aggregated array is read back as `[]` instead of an absent property.
    pub fn use_empty_array_for_no_value(&self) -> Expr {
        let mut meta = self.meta().clone();
        meta.nullable = false;
        match self.kind() {
            ExprKind::AggregateArray { items, .. } => Expr::new(
                ExprKind::AggregateArray {
                    items: items.clone(),
                    empty_for_no_value: true,
                },
                meta,
            ),
            ExprKind::SubSelect {
                select,
                mode: SubSelectMode::AggregatedArray,
                ..
            } => Expr::new(
                ExprKind::SubSelect {
                    select: select.clone(),
                    mode: SubSelectMode::AggregatedArray,
                    empty_for_no_value: true,
                },
                meta,
            ),
            _ => self.clone(),
        }
    }
}

/// Untyped constant.
pub fn value(value: impl AsValue) -> Expr {
    Expr::value(value.as_value())
}

/// Call of a database function.
pub fn call<I, V>(name: impl Into<Cow<'static, str>>, args: I, data_type: DataType) -> Expr
where
    I: IntoIterator<Item = V>,
    V: Into<Expr>,
{
    let args: Vec<Expr> = args.into_iter().map(Into::into).collect();
    let mut meta = Meta::derived(&args, data_type);
    meta.nullable = true;
    Expr::new(
        ExprKind::Function {
            function: Function::Call(name.into()),
            args,
        },
        meta,
    )
}

fn aggregate(
    function: Aggregate,
    arg: Option<&Expr>,
    distinct: bool,
    data_type: DataType,
    nullable: bool,
) -> Expr {
    if arg.is_some_and(Expr::is_aggregate) {
        return Expr::invalid(format!(
            "Cannot apply the aggregate {function:?} to an expression already containing an aggregate"
        ));
    }
    let mut meta = Meta::derived(arg, data_type);
    meta.nullable = nullable;
    meta.aggregate = true;
    if matches!(function, Aggregate::Min | Aggregate::Max) {
        meta.adapter = arg.and_then(|v| v.meta().adapter.clone());
    }
    Expr::new(
        ExprKind::Aggregate {
            function,
            arg: arg.cloned(),
            distinct,
        },
        meta,
    )
}

pub fn count(expr: &Expr) -> Expr {
    aggregate(Aggregate::Count, Some(expr), false, DataType::BigInt, false)
}

pub fn count_distinct(expr: &Expr) -> Expr {
    aggregate(Aggregate::Count, Some(expr), true, DataType::BigInt, false)
}

pub fn count_all() -> Expr {
    aggregate(Aggregate::CountAll, None, false, DataType::BigInt, false)
}

pub fn sum(expr: &Expr) -> Expr {
    let data_type = match expr.data_type() {
        DataType::Int | DataType::BigInt => DataType::BigInt,
        other => other.clone(),
    };
    aggregate(Aggregate::Sum, Some(expr), false, data_type, true)
}

pub fn min(expr: &Expr) -> Expr {
    aggregate(Aggregate::Min, Some(expr), false, expr.data_type().clone(), true)
}

pub fn max(expr: &Expr) -> Expr {
    aggregate(Aggregate::Max, Some(expr), false, expr.data_type().clone(), true)
}

pub fn average(expr: &Expr) -> Expr {
    aggregate(Aggregate::Average, Some(expr), false, DataType::Double, true)
}

/// Folds the rows of each group into a json array of objects.
pub fn aggregate_as_array(fields: Vec<Field>) -> Expr {
    if let Some(field) = fields.iter().find(|f| f.expr.is_aggregate()) {
        return Expr::invalid(format!(
            "The property `{}` of an aggregated array cannot contain an aggregate",
            field.property
        ));
    }
    let mut meta = Meta::derived(fields.iter().map(|f| &f.expr), DataType::Json);
    meta.nullable = true;
    meta.aggregate = true;
    Expr::new(
        ExprKind::AggregateArray {
            items: ArrayItems::Fields(fields),
            empty_for_no_value: false,
        },
        meta,
    )
}

/// Folds the rows of each group into a json array of plain values.
pub fn aggregate_as_array_of_one_column(expr: &Expr) -> Expr {
    if expr.is_aggregate() {
        return Expr::invalid("An aggregated array cannot contain an aggregate");
    }
    let mut meta = Meta::derived([expr], DataType::Json);
    meta.nullable = true;
    meta.aggregate = true;
    Expr::new(
        ExprKind::AggregateArray {
            items: ArrayItems::OneColumn(expr.clone()),
            empty_for_no_value: false,
        },
        meta,
    )
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::value(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::value(value)
    }
}

impl<T: AsValue> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::value(value.as_value())
    }
}

macro_rules! impl_from_constant {
    ($($source:ty),+ $(,)?) => {
        $(impl From<$source> for Expr {
            fn from(value: $source) -> Self {
                Expr::value(value.as_value())
            }
        })+
    };
}
impl_from_constant!(
    bool,
    i32,
    i64,
    f64,
    Decimal,
    String,
    Uuid,
    Box<[u8]>,
    Date,
    Time,
    PrimitiveDateTime,
    serde_json::Value,
);

impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        self.negate()
    }
}

impl Not for &Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        self.negate()
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        let mut meta = Meta::derived([self], self.data_type().clone());
        meta.adapter = self.meta().adapter.clone();
        Expr::new(
            ExprKind::Unary {
                op: UnaryOpType::Negative,
                arg: self.clone(),
            },
            meta,
        )
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        -&self
    }
}

macro_rules! impl_arithmetic {
    ($trait:ident, $method:ident, $op:path) => {
        impl<T: Into<Expr>> $trait<T> for Expr {
            type Output = Expr;
            fn $method(self, rhs: T) -> Expr {
                self.binary($op, rhs.into())
            }
        }
        impl<T: Into<Expr>> $trait<T> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: T) -> Expr {
                self.binary($op, rhs.into())
            }
        }
    };
}
impl_arithmetic!(Add, add, BinaryOpType::Addition);
impl_arithmetic!(Sub, sub, BinaryOpType::Subtraction);
impl_arithmetic!(Mul, mul, BinaryOpType::Multiplication);
impl_arithmetic!(Div, div, BinaryOpType::Division);
impl_arithmetic!(Rem, rem, BinaryOpType::Remainder);
