use crate::{
    Composition, Cte, CteSource, DataType, Expr, ExprKind, Field, Join, JoinType, Meta, Order, Ordered,
    Page, QueryError, QueryRunner, Record, RecursiveRef, RecursiveScope, Result, Session, Source,
    SqlWriter, SubSelectMode, TypeAdapter, Value, WithSet, apply_compositions, compile_statement,
    count_from_rows, decode_records, decode_scalars, exactly_one, none_or_one,
    phase::{OneColumn, Projected, Rows, Unprojected},
    writer::{CompileCache, Compiled},
};
use std::{borrow::Cow, future::Future, marker::PhantomData, panic::Location, sync::Arc};

/// Recursive part of a select: `base UNION ALL term`.
#[derive(Debug, Clone)]
pub struct Recursive {
    pub scope: Arc<RecursiveScope>,
    /// Reads the recursive select itself exactly once.
    pub term: Arc<SelectData>,
}

/// Operator combining the rows of two selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl CompoundOperator {
    pub fn keyword(&self) -> &'static str {
        match self {
            CompoundOperator::Union => "UNION",
            CompoundOperator::UnionAll => "UNION ALL",
            CompoundOperator::Intersect => "INTERSECT",
            CompoundOperator::Except => "EXCEPT",
        }
    }
}

/// Select whose rows are combined with the ones of the select holding it.
#[derive(Debug, Clone)]
pub struct Compound {
    pub operator: CompoundOperator,
    pub select: Arc<SelectData>,
}

/// Descriptor of a select, rendered by [`SqlWriter::write_select`].
#[derive(Debug, Clone, Default)]
pub struct SelectData {
    /// `None` selects without a table.
    pub from: Option<Source>,
    pub joins: Vec<Join>,
    pub distinct: bool,
    pub fields: Vec<Field>,
    /// The rows are read back as plain values.
    pub one_column: bool,
    pub condition: Option<Expr>,
    /// Projected properties to group by.
    pub group_by: Vec<Cow<'static, str>>,
    pub having: Option<Expr>,
    pub order_by: Vec<Ordered>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub recursive: Option<Recursive>,
    /// Selects combined in order with this one, ordering and limits apply to the combined rows.
    pub compound: Vec<Compound>,
}

impl SelectData {
    pub fn field(&self, property: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.property == property)
    }

    /// Named CTEs the select requires, sub-selects included.
    pub fn withs(&self) -> WithSet {
        let mut withs = WithSet::default();
        if let Some(from) = &self.from {
            withs.extend(&from.withs());
        }
        for join in &self.joins {
            withs.extend(&join.source.withs());
            if let Some(on) = &join.on {
                withs.extend(&on.meta().withs);
            }
        }
        let exprs = self
            .fields
            .iter()
            .map(|v| &v.expr)
            .chain(&self.condition)
            .chain(&self.having);
        for expr in exprs {
            withs.extend(&expr.meta().withs);
        }
        if let Some(recursive) = &self.recursive {
            withs.extend(&recursive.term.withs());
        }
        for compound in &self.compound {
            withs.extend(&compound.select.withs());
        }
        withs
    }

    /// Checks the shape of the statement before it is rendered.
    pub fn validate(&self) -> Result<()> {
        let exprs = self
            .fields
            .iter()
            .map(|v| &v.expr)
            .chain(&self.condition)
            .chain(&self.having)
            .chain(self.joins.iter().filter_map(|v| v.on.as_ref()));
        for expr in exprs {
            if let Some(message) = expr.first_invalid() {
                return Err(QueryError::configuration(message));
            }
        }
        if self.condition.as_ref().is_some_and(Expr::is_aggregate) {
            return Err(QueryError::configuration(
                "The WHERE clause cannot contain an aggregate, use having",
            ));
        }
        if self.joins.iter().any(|v| v.on.as_ref().is_some_and(Expr::is_aggregate)) {
            return Err(QueryError::configuration(
                "A join condition cannot contain an aggregate",
            ));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|v| v.property == field.property) {
                return Err(QueryError::configuration(format!(
                    "The property `{}` is projected twice",
                    field.property
                )));
            }
        }
        for property in &self.group_by {
            match self.field(property) {
                None => {
                    return Err(QueryError::configuration(format!(
                        "Cannot group by `{property}`, it is not a projected property"
                    )));
                }
                Some(field) if field.expr.is_aggregate() => {
                    return Err(QueryError::configuration(format!(
                        "Cannot group by `{property}`, it is an aggregate"
                    )));
                }
                _ => {}
            }
        }
        if let Some(v) = self.order_by.iter().find(|v| self.field(&v.property).is_none()) {
            return Err(QueryError::configuration(format!(
                "Cannot order by `{}`, it is not a projected property",
                v.property
            )));
        }
        self.validate_compound()?;
        if self.group_by.is_empty() && self.fields.iter().any(|v| v.expr.is_aggregate()) {
            if let Some(plain) = self
                .fields
                .iter()
                .find(|v| !v.expr.is_aggregate() && v.expr.references_columns())
            {
                return Err(QueryError::configuration(format!(
                    "The property `{}` is neither an aggregate nor grouped, while other properties are aggregates",
                    plain.property
                )));
            }
        }
        Ok(())
    }

    fn validate_compound(&self) -> Result<()> {
        if self.compound.is_empty() {
            return Ok(());
        }
        if self.recursive.is_some() {
            return Err(QueryError::configuration(
                "A recursive select cannot be combined with other selects",
            ));
        }
        for Compound { operator, select } in &self.compound {
            let keyword = operator.keyword();
            let same_properties = select.fields.len() == self.fields.len()
                && select
                    .fields
                    .iter()
                    .zip(&self.fields)
                    .all(|(l, r)| l.property == r.property);
            if !same_properties {
                return Err(QueryError::configuration(format!(
                    "The selects combined with {keyword} must project the same properties in the same order"
                )));
            }
            if !select.order_by.is_empty() || select.limit.is_some() || select.offset.is_some() {
                return Err(QueryError::configuration(format!(
                    "A select combined with {keyword} cannot be ordered or limited, order or limit the combined select"
                )));
            }
            if select.recursive.is_some() || !select.compound.is_empty() {
                return Err(QueryError::configuration(format!(
                    "A select combined with {keyword} cannot be recursive or combined itself"
                )));
            }
            select.validate()?;
        }
        Ok(())
    }

    /// Number of times the recursive select `id` is read directly by this select.
    pub(crate) fn self_references(&self, id: u64) -> usize {
        self.from
            .iter()
            .chain(self.joins.iter().map(|v| &v.source))
            .filter(|v| v.recursive_scope() == Some(id))
            .count()
    }
}

/// Select statement builder, `P` is one of the [`phase`](crate::phase) markers.
#[derive(Debug)]
pub struct SelectQuery<P = Unprojected> {
    pub(crate) data: SelectData,
    pub(crate) cache: CompileCache,
    pub(crate) compositions: Vec<Arc<Composition>>,
    phase: PhantomData<P>,
}

impl<P> Clone for SelectQuery<P> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            cache: CompileCache::default(),
            compositions: self.compositions.clone(),
            phase: PhantomData,
        }
    }
}

/// Start a select reading from a table, a CTE or a recursive select.
pub fn select_from(source: impl Into<Source>) -> SelectQuery<Unprojected> {
    SelectQuery::new(SelectData {
        from: Some(source.into()),
        ..Default::default()
    })
}

/// Start a select computing values without reading any table.
pub fn select_from_no_table() -> SelectQuery<Unprojected> {
    SelectQuery::new(SelectData::default())
}

impl<P> SelectQuery<P> {
    fn new(data: SelectData) -> Self {
        Self {
            data,
            cache: CompileCache::default(),
            compositions: Vec::new(),
            phase: PhantomData,
        }
    }
    pub fn data(&self) -> &SelectData {
        &self.data
    }
    pub(crate) fn data_mut(&mut self) -> &mut SelectData {
        self.cache.invalidate();
        &mut self.data
    }
    fn into_phase<Q>(self) -> SelectQuery<Q> {
        SelectQuery {
            data: self.data,
            cache: self.cache,
            compositions: self.compositions,
            phase: PhantomData,
        }
    }

    /// Restrict the rows, ANDed with the conditions already present.
    pub fn filter(mut self, condition: impl Into<Expr>) -> Self {
        let condition = condition.into();
        let data = self.data_mut();
        data.condition = Some(match data.condition.take() {
            Some(current) => current.and(condition),
            None => condition,
        });
        self
    }

    /// ORed with the conditions already present.
    pub fn or_filter(mut self, condition: impl Into<Expr>) -> Self {
        let condition = condition.into();
        let data = self.data_mut();
        data.condition = Some(match data.condition.take() {
            Some(current) => current.or(condition),
            None => condition,
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.data_mut().distinct = true;
        self
    }

    /// Render with `writer`, parameters without an adapter of their own go through `adapter`.
    pub fn compile(&self, writer: &dyn SqlWriter, adapter: &Arc<dyn TypeAdapter>) -> Result<Compiled> {
        self.cache
            .get_or_compile(writer, adapter, |context, out| {
                writer.write_select(context, out, &self.data)
            })
    }

    /// SQL text rendered by `writer`.
    pub fn sql(&self, writer: &dyn SqlWriter) -> Result<String> {
        let adapter: Arc<dyn TypeAdapter> = Arc::new(crate::DefaultTypeAdapter);
        Ok(self.compile(writer, &adapter)?.sql)
    }

    /// Render the statement counting the rows this select would produce.
    pub fn compile_count(
        &self,
        writer: &dyn SqlWriter,
        adapter: &Arc<dyn TypeAdapter>,
    ) -> Result<Compiled> {
        compile_statement(adapter, |context, out| {
            writer.write_count(context, out, &self.data)
        })
    }
}

impl SelectQuery<Unprojected> {
    fn push_join(mut self, join: JoinType, source: Source, on: Option<Expr>) -> Self {
        self.data_mut().joins.push(Join { join, source, on });
        self
    }
    pub fn join(self, source: impl Into<Source>, on: impl Into<Expr>) -> Self {
        self.push_join(JoinType::Default, source.into(), Some(on.into()))
    }
    pub fn inner_join(self, source: impl Into<Source>, on: impl Into<Expr>) -> Self {
        self.push_join(JoinType::Inner, source.into(), Some(on.into()))
    }
    /// Use a handle from [`Table::for_use_in_left_join`](crate::Table::for_use_in_left_join)
    /// so its columns read back as absent when nothing matches.
    pub fn left_join(self, source: impl Into<Source>, on: impl Into<Expr>) -> Self {
        self.push_join(JoinType::Left, source.into(), Some(on.into()))
    }
    pub fn right_join(self, source: impl Into<Source>, on: impl Into<Expr>) -> Self {
        self.push_join(JoinType::Right, source.into(), Some(on.into()))
    }
    pub fn full_join(self, source: impl Into<Source>, on: impl Into<Expr>) -> Self {
        self.push_join(JoinType::Full, source.into(), Some(on.into()))
    }
    pub fn cross_join(self, source: impl Into<Source>) -> Self {
        self.push_join(JoinType::Cross, source.into(), None)
    }

    /// Project `fields`, every row is read back as a [`Record`].
    pub fn select(mut self, fields: impl IntoIterator<Item = Field>) -> SelectQuery<Rows> {
        let data = self.data_mut();
        data.fields = fields.into_iter().collect();
        data.one_column = false;
        self.into_phase()
    }

    /// Project a single expression, every row is read back as a plain value.
    pub fn select_one_column(mut self, expr: impl Into<Expr>) -> SelectQuery<OneColumn> {
        let data = self.data_mut();
        data.fields = vec![Field::new("result", expr)];
        data.one_column = true;
        self.into_phase()
    }
}

impl<P: Projected> SelectQuery<P> {
    /// Group by projected properties.
    pub fn group_by<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.data_mut()
            .group_by
            .extend(properties.into_iter().map(Into::into));
        self
    }
    pub fn having(mut self, condition: impl Into<Expr>) -> Self {
        let condition = condition.into();
        let data = self.data_mut();
        data.having = Some(match data.having.take() {
            Some(current) => current.and(condition),
            None => condition,
        });
        self
    }
    pub fn order_by(self, property: impl Into<Cow<'static, str>>) -> Self {
        self.ordered(property.into(), Order::ASC)
    }
    pub fn order_by_desc(self, property: impl Into<Cow<'static, str>>) -> Self {
        self.ordered(property.into(), Order::DESC)
    }
    fn ordered(mut self, property: Cow<'static, str>, order: Order) -> Self {
        self.data_mut().order_by.push(Ordered { property, order });
        self
    }
    pub fn limit(mut self, limit: u64) -> Self {
        self.data_mut().limit = Some(limit);
        self
    }
    pub fn offset(mut self, offset: u64) -> Self {
        self.data_mut().offset = Some(offset);
        self
    }

    /// Rows of this select or of `other`, without duplicates.
    ///
    /// Ordering and limits set on the result apply to the combined rows.
    pub fn union(self, other: SelectQuery<P>) -> Self {
        self.combined(CompoundOperator::Union, other)
    }
    /// Rows of this select followed by the ones of `other`, duplicates kept.
    pub fn union_all(self, other: SelectQuery<P>) -> Self {
        self.combined(CompoundOperator::UnionAll, other)
    }
    /// Rows present in both selects.
    pub fn intersect(self, other: SelectQuery<P>) -> Self {
        self.combined(CompoundOperator::Intersect, other)
    }
    /// Rows of this select missing from `other`.
    pub fn except(self, other: SelectQuery<P>) -> Self {
        self.combined(CompoundOperator::Except, other)
    }
    fn combined(mut self, operator: CompoundOperator, other: SelectQuery<P>) -> Self {
        self.data_mut().compound.push(Compound {
            operator,
            select: Arc::new(other.data),
        });
        self
    }

    /// Json array with one element per row, the inner ordering is kept.
    pub fn as_inline_aggregated_array(&self) -> Expr {
        let mut meta = Meta::of_type(DataType::Json);
        meta.nullable = true;
        meta.withs = self.data.withs();
        Expr::new(
            ExprKind::SubSelect {
                select: Arc::new(self.data.clone()),
                mode: SubSelectMode::AggregatedArray,
                empty_for_no_value: false,
            },
            meta,
        )
    }

    fn sub_select_predicate(&self, mode: SubSelectMode) -> Expr {
        let mut meta = Meta::of_type(DataType::Boolean);
        meta.withs = self.data.withs();
        Expr::new(
            ExprKind::SubSelect {
                select: Arc::new(self.data.clone()),
                mode,
                empty_for_no_value: false,
            },
            meta,
        )
    }
}

/// `EXISTS (select)`
pub fn exists<P: Projected>(select: &SelectQuery<P>) -> Expr {
    select.sub_select_predicate(SubSelectMode::Exists)
}

/// `NOT EXISTS (select)`
pub fn not_exists<P: Projected>(select: &SelectQuery<P>) -> Expr {
    select.sub_select_predicate(SubSelectMode::NotExists)
}

impl Expr {
    /// `expr IN (select)`
    pub fn in_select(&self, select: &SelectQuery<OneColumn>) -> Expr {
        in_select(self, select, false)
    }
    /// `expr NOT IN (select)`
    pub fn not_in_select(&self, select: &SelectQuery<OneColumn>) -> Expr {
        in_select(self, select, true)
    }
}

fn in_select(lhs: &Expr, select: &SelectQuery<OneColumn>, negated: bool) -> Expr {
    let mut meta = Meta::derived([lhs], DataType::Boolean);
    meta.withs.extend(&select.data.withs());
    let lhs = match select.data.fields.first() {
        Some(field) => lhs.adopting(field.expr.meta()),
        None => lhs.clone(),
    };
    Expr::new(
        ExprKind::InSelect {
            lhs,
            select: Arc::new(select.data.clone()),
            negated,
        },
        meta,
    )
}

impl SelectQuery<Rows> {
    /// Named CTE reading this select, its columns are the projected properties.
    pub fn as_cte(&self, name: impl Into<Cow<'static, str>>) -> CteSource {
        Cte::new(name.into(), self.data.clone()).source()
    }

    /// Extend the select with the rows joining the recursive select through `on`.
    ///
    /// The term reads the same tables as this select, joined with the rows
    /// found so far, projects the same fields and has no condition.
    pub fn recursive_union_all_on(mut self, on: impl FnOnce(&RecursiveRef) -> Expr) -> Self {
        let scope = RecursiveScope::new(self.data.fields.clone());
        let child = RecursiveRef {
            scope: scope.clone(),
        };
        let predicate = on(&child);
        let mut joins = self.data.joins.clone();
        joins.push(Join {
            join: JoinType::Inner,
            source: Source::Recursive(child),
            on: Some(predicate),
        });
        let term = SelectData {
            from: self.data.from.clone(),
            joins,
            fields: self.data.fields.clone(),
            ..Default::default()
        };
        self.data_mut().recursive = Some(Recursive {
            scope,
            term: Arc::new(term),
        });
        self
    }

    /// Extend the select with the rows of `term`, which reads the recursive select once.
    pub fn recursive_union_all(
        mut self,
        term: impl FnOnce(&RecursiveRef) -> SelectQuery<Rows>,
    ) -> Self {
        let scope = RecursiveScope::new(self.data.fields.clone());
        let child = RecursiveRef {
            scope: scope.clone(),
        };
        let term = term(&child);
        self.data_mut().recursive = Some(Recursive {
            scope,
            term: Arc::new(term.data),
        });
        self
    }

    pub(crate) async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Record>> {
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        let rows = session.query_rows(&compiled, location).await?;
        let mut records = decode_records(rows, &self.data.fields, session.adapter())?;
        apply_compositions(&self.compositions, &mut records, session, location).await?;
        Ok(records)
    }

    #[track_caller]
    pub fn execute_many<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send + 'a {
        let location = Location::caller();
        self.fetch(session, location)
    }

    /// Exactly one row, none is an empty result error.
    #[track_caller]
    pub fn execute_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Record>> + Send + 'a {
        let location = Location::caller();
        async move { exactly_one("select one", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Record>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("select none or one", self.fetch(session, location).await?) }
    }

    /// The rows within limit and offset, together with the count of all of them.
    #[track_caller]
    pub fn execute_page<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Page<Record>>> + Send + 'a {
        let location = Location::caller();
        async move {
            let count = count_rows(self, session, location).await?;
            let data = self.fetch(session, location).await?;
            Ok(Page { data, count })
        }
    }
}

impl SelectQuery<OneColumn> {
    /// The value of the first row, or null when there is none.
    pub fn as_inline_value(&self) -> Expr {
        let mut meta = match self.data.fields.first() {
            Some(field) => {
                let inner = field.expr.meta();
                Meta {
                    data_type: inner.data_type.clone(),
                    adapter: inner.adapter.clone(),
                    ..Default::default()
                }
            }
            None => Meta::default(),
        };
        meta.nullable = true;
        meta.withs = self.data.withs();
        Expr::new(
            ExprKind::SubSelect {
                select: Arc::new(self.data.clone()),
                mode: SubSelectMode::Value,
                empty_for_no_value: false,
            },
            meta,
        )
    }

    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Value>> {
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        let rows = session.query_rows(&compiled, location).await?;
        let Some(field) = self.data.fields.first() else {
            return Err(QueryError::configuration("The select has no field"));
        };
        decode_scalars(rows, field, session.adapter())
    }

    #[track_caller]
    pub fn execute_many<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send + 'a {
        let location = Location::caller();
        self.fetch(session, location)
    }

    #[track_caller]
    pub fn execute_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Value>> + Send + 'a {
        let location = Location::caller();
        async move { exactly_one("select one", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Value>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("select none or one", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_page<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Page<Value>>> + Send + 'a {
        let location = Location::caller();
        async move {
            let count = count_rows(self, session, location).await?;
            let data = self.fetch(session, location).await?;
            Ok(Page { data, count })
        }
    }
}

async fn count_rows<P, R: QueryRunner>(
    select: &SelectQuery<P>,
    session: &mut Session<R>,
    location: &'static Location<'static>,
) -> Result<u64> {
    let compiled = select.compile_count(session.sql_writer(), session.adapter())?;
    let rows = session.query_rows(&compiled, location).await?;
    count_from_rows(rows)
}
