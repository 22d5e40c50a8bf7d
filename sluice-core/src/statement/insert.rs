use crate::{
    Composition, Error, Expr, Field, QueryError, QueryRunner, Record, Result, Returning, RowCount,
    SelectData, SelectQuery, Session, SqlWriter, Table, TypeAdapter, Value, WithSet,
    check_count, decode_id, exactly_one, none_or_one, run_mutation, run_returning, run_returning_one,
    phase::{self, LastInsertedId, Pending, Ready, ReturningOne, Rows, Settable},
    writer::{CompileCache, Compiled, LastInsertedIdStyle},
};
use indexmap::IndexMap;
use std::{future::Future, marker::PhantomData, ops::RangeBounds, panic::Location, sync::Arc};

/// Values of an insert.
#[derive(Debug, Clone)]
pub enum InsertRows {
    Single(IndexMap<String, Expr>),
    /// Batch, the columns are the properties of the first row.
    Multiple(Vec<IndexMap<String, Expr>>),
    From(Arc<SelectData>),
    DefaultValues,
}

impl InsertRows {
    /// Number of rows, `None` when decided by a select.
    pub fn len(&self) -> Option<usize> {
        match self {
            InsertRows::Single(..) | InsertRows::DefaultValues => Some(1),
            InsertRows::Multiple(rows) => Some(rows.len()),
            InsertRows::From(..) => None,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct InsertData {
    pub table: Table,
    pub rows: InsertRows,
    pub returning: Returning,
}

impl InsertData {
    pub fn withs(&self) -> WithSet {
        let mut withs = self.table.def().withs.clone();
        let mut add_row = |row: &IndexMap<String, Expr>| {
            for expr in row.values() {
                withs.extend(&expr.meta().withs);
            }
        };
        match &self.rows {
            InsertRows::Single(row) => add_row(row),
            InsertRows::Multiple(rows) => rows.iter().for_each(add_row),
            InsertRows::From(select) => withs.extend(&select.withs()),
            InsertRows::DefaultValues => {}
        }
        withs.extend(&self.returning.withs());
        withs
    }
}

/// Insert statement builder.
#[derive(Debug)]
pub struct InsertQuery<P = Pending> {
    pub(crate) data: InsertData,
    pub(crate) cache: CompileCache,
    pub(crate) compositions: Vec<Arc<Composition>>,
    pub(crate) expected: RowCount,
    /// Misuse of the builder, reported when compiling.
    misuse: Option<String>,
    phase: PhantomData<P>,
}

impl<P> Clone for InsertQuery<P> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            cache: CompileCache::default(),
            compositions: self.compositions.clone(),
            expected: self.expected,
            misuse: self.misuse.clone(),
            phase: PhantomData,
        }
    }
}

pub fn insert_into(table: &Table) -> InsertQuery<Pending> {
    InsertQuery {
        data: InsertData {
            table: table.clone(),
            rows: InsertRows::Single(IndexMap::new()),
            returning: Returning::None,
        },
        cache: CompileCache::default(),
        compositions: Vec::new(),
        expected: RowCount::ANY,
        misuse: None,
        phase: PhantomData,
    }
}

/// Whether `row` sets `property` to something other than a null constant.
fn has_value(row: &IndexMap<String, Expr>, property: &str) -> bool {
    row.get(property).is_some_and(|v| !v.is_null_constant())
}

fn row_of(record: Record) -> IndexMap<String, Expr> {
    record
        .into_iter()
        .map(|(k, v)| (k, Expr::value(v)))
        .collect()
}

impl<P> InsertQuery<P> {
    pub fn data(&self) -> &InsertData {
        &self.data
    }
    pub(crate) fn data_mut(&mut self) -> &mut InsertData {
        self.cache.invalidate();
        &mut self.data
    }
    fn into_phase<Q>(self) -> InsertQuery<Q> {
        InsertQuery {
            data: self.data,
            cache: self.cache,
            compositions: self.compositions,
            expected: self.expected,
            misuse: self.misuse,
            phase: PhantomData,
        }
    }

    /// Every row being built, a default values insert becomes an empty row.
    fn rows_mut(&mut self) -> Vec<&mut IndexMap<String, Expr>> {
        if matches!(self.data.rows, InsertRows::DefaultValues) {
            self.data_mut().rows = InsertRows::Single(IndexMap::new());
        }
        if matches!(self.data.rows, InsertRows::From(..)) && self.misuse.is_none() {
            self.misuse = Some(format!(
                "Cannot set values in the insert from a select into `{}`",
                self.data.table.name()
            ));
        }
        match &mut self.data_mut().rows {
            InsertRows::Single(row) => vec![row],
            InsertRows::Multiple(rows) => rows.iter_mut().collect(),
            InsertRows::From(..) | InsertRows::DefaultValues => Vec::new(),
        }
    }

    /// Fail the execution unless the number of affected rows falls in `range`.
    pub fn expect_rows(mut self, range: impl RangeBounds<u64>) -> Self {
        self.expected = RowCount::new(range);
        self
    }

    pub fn compile(&self, writer: &dyn SqlWriter, adapter: &Arc<dyn TypeAdapter>) -> Result<Compiled> {
        if let Some(misuse) = &self.misuse {
            return Err(QueryError::configuration(misuse.clone()));
        }
        self.cache.get_or_compile(writer, adapter, |context, out| {
            writer.write_insert(context, out, &self.data)
        })
    }

    pub fn sql(&self, writer: &dyn SqlWriter) -> Result<String> {
        let adapter: Arc<dyn TypeAdapter> = Arc::new(crate::DefaultTypeAdapter);
        Ok(self.compile(writer, &adapter)?.sql)
    }
}

impl<P: Settable> InsertQuery<P> {
    /// Set the value of `property` in every row.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        let property = property.into();
        let value = value.into();
        for row in self.rows_mut() {
            row.insert(property.clone(), value.clone());
        }
        self.into_phase()
    }

    /// Like [`InsertQuery::set`] but a null constant is ignored.
    pub fn set_if_value(self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        let value = value.into();
        if value.is_null_constant() {
            return self.into_phase();
        }
        self.set(property, value)
    }

    /// Replace `property` in the rows already setting it.
    pub fn set_if_set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        let property = property.into();
        let value = value.into();
        for row in self.rows_mut() {
            if let Some(current) = row.get_mut(&property) {
                *current = value.clone();
            }
        }
        self.into_phase()
    }

    /// Set `property` in the rows not setting it yet.
    pub fn set_if_not_set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        let property = property.into();
        let value = value.into();
        for row in self.rows_mut() {
            if !row.contains_key(&property) {
                row.insert(property.clone(), value.clone());
            }
        }
        self.into_phase()
    }

    /// Like [`InsertQuery::set_if_set`] but a null constant is ignored.
    pub fn set_if_set_if_value(self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        let value = value.into();
        if value.is_null_constant() {
            return self.into_phase();
        }
        self.set_if_set(property, value)
    }

    /// Like [`InsertQuery::set_if_not_set`] but a null constant is ignored.
    pub fn set_if_not_set_if_value(
        self,
        property: impl Into<String>,
        value: impl Into<Expr>,
    ) -> InsertQuery<Ready> {
        let value = value.into();
        if value.is_null_constant() {
            return self.into_phase();
        }
        self.set_if_not_set(property, value)
    }

    /// Replace `property` in the rows setting it to something other than a null constant.
    pub fn set_if_has_value(self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        self.set_where(property.into(), value.into(), has_value)
    }

    pub fn set_if_has_value_if_value(
        self,
        property: impl Into<String>,
        value: impl Into<Expr>,
    ) -> InsertQuery<Ready> {
        let value = value.into();
        if value.is_null_constant() {
            return self.into_phase();
        }
        self.set_if_has_value(property, value)
    }

    /// Set `property` in the rows leaving it absent or set to a null constant.
    pub fn set_if_has_no_value(self, property: impl Into<String>, value: impl Into<Expr>) -> InsertQuery<Ready> {
        self.set_where(property.into(), value.into(), |row, property| !has_value(row, property))
    }

    pub fn set_if_has_no_value_if_value(
        self,
        property: impl Into<String>,
        value: impl Into<Expr>,
    ) -> InsertQuery<Ready> {
        let value = value.into();
        if value.is_null_constant() {
            return self.into_phase();
        }
        self.set_if_has_no_value(property, value)
    }

    fn set_where(
        mut self,
        property: String,
        value: Expr,
        applies: impl Fn(&IndexMap<String, Expr>, &str) -> bool,
    ) -> InsertQuery<Ready> {
        for row in self.rows_mut() {
            if applies(&*row, &property) {
                row.insert(property.clone(), value.clone());
            }
        }
        self.into_phase()
    }

    /// Drop `properties` from every row.
    pub fn ignore_if_set<I, S>(mut self, properties: I) -> InsertQuery<Ready>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let properties: Vec<S> = properties.into_iter().collect();
        for row in self.rows_mut() {
            for property in &properties {
                row.shift_remove(property.as_ref());
            }
        }
        self.into_phase()
    }

    /// Drop `properties` from the rows setting them to something other than a null constant.
    pub fn ignore_if_has_value<I, S>(self, properties: I) -> InsertQuery<Ready>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore_where(properties, has_value)
    }

    /// Drop `properties` from the rows setting them to a null constant.
    pub fn ignore_if_has_no_value<I, S>(self, properties: I) -> InsertQuery<Ready>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore_where(properties, |row, property| !has_value(row, property))
    }

    fn ignore_where<I, S>(
        mut self,
        properties: I,
        applies: impl Fn(&IndexMap<String, Expr>, &str) -> bool,
    ) -> InsertQuery<Ready>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let properties: Vec<S> = properties.into_iter().collect();
        for row in self.rows_mut() {
            for property in &properties {
                if applies(&*row, property.as_ref()) {
                    row.shift_remove(property.as_ref());
                }
            }
        }
        self.into_phase()
    }

    /// Drop the properties set to a null constant.
    pub fn ignore_any_set_with_no_value(mut self) -> InsertQuery<Ready> {
        for row in self.rows_mut() {
            row.retain(|_, v| !v.is_null_constant());
        }
        self.into_phase()
    }

    /// Set every property of `record`.
    pub fn values(mut self, record: Record) -> InsertQuery<Ready> {
        let values = row_of(record);
        for row in self.rows_mut() {
            row.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.into_phase()
    }

    /// Insert one row per record, an empty batch executes nothing.
    pub fn values_many(mut self, records: impl IntoIterator<Item = Record>) -> InsertQuery<Ready> {
        self.data_mut().rows = InsertRows::Multiple(records.into_iter().map(row_of).collect());
        self.into_phase()
    }
}

impl InsertQuery<Pending> {
    pub fn default_values(mut self) -> InsertQuery<Ready> {
        self.data_mut().rows = InsertRows::DefaultValues;
        self.into_phase()
    }

    /// Insert the rows of `select`, its properties name the columns.
    pub fn from_select(mut self, select: &SelectQuery<Rows>) -> InsertQuery<Ready> {
        self.data_mut().rows = InsertRows::From(Arc::new(select.data().clone()));
        self.into_phase()
    }
}

impl InsertQuery<Ready> {
    /// Read back the autogenerated primary key.
    pub fn returning_last_inserted_id(mut self) -> InsertQuery<LastInsertedId> {
        self.data_mut().returning = Returning::LastInsertedId;
        self.into_phase()
    }

    pub fn returning(mut self, fields: impl IntoIterator<Item = Field>) -> InsertQuery<phase::Returning> {
        self.data_mut().returning = Returning::Fields(fields.into_iter().collect());
        self.into_phase()
    }

    pub fn returning_one_column(mut self, expr: impl Into<Expr>) -> InsertQuery<ReturningOne> {
        self.data_mut().returning = Returning::OneColumn(Field::new("result", expr));
        self.into_phase()
    }

    /// Number of inserted rows.
    #[track_caller]
    pub fn execute<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<u64>> + Send + 'a {
        let location = Location::caller();
        async move {
            if self.data.rows.is_empty() {
                return Ok(0);
            }
            let compiled = self.compile(session.sql_writer(), session.adapter())?;
            run_mutation(session, &compiled, &self.expected, "insert", location).await
        }
    }
}

impl InsertQuery<LastInsertedId> {
    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Value>> {
        let Some(rows) = self.data.rows.len() else {
            return Err(QueryError::configuration(
                "The ids inserted from a select cannot be read back",
            ));
        };
        if rows == 0 {
            return Ok(Vec::new());
        }
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        let column = self.data.table.def().autogenerated_primary_key()?.clone();
        let emulated = session.sql_writer().dialect().last_inserted_id == LastInsertedIdStyle::Runner;
        let ids = if matches!(self.data.rows, InsertRows::Multiple(..)) && !emulated {
            session.insert_ids(&compiled, location).await?
        } else {
            let first = session.insert_id(&compiled, location).await?;
            if rows > 1 {
                consecutive_ids(first, rows)?
            } else {
                vec![first]
            }
        };
        let ids = ids
            .into_iter()
            .map(|id| decode_id(id, &column, session.adapter()))
            .collect::<Result<Vec<_>>>()?;
        check_count("insert", ids.len() as u64, &self.expected)?;
        Ok(ids)
    }

    /// The id of the only inserted row.
    #[track_caller]
    pub fn execute<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Value>> + Send + 'a {
        let location = Location::caller();
        async move {
            if matches!(self.data.rows, InsertRows::Multiple(..)) {
                return Err(QueryError::configuration(
                    "A batch insert returns many ids, use execute_many",
                ));
            }
            exactly_one("insert", self.fetch(session, location).await?)
        }
    }

    /// The ids of the inserted rows, in row order.
    #[track_caller]
    pub fn execute_many<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send + 'a {
        let location = Location::caller();
        self.fetch(session, location)
    }
}

/// Ids of a batch reported by its first one, the driver only knows the first.
fn consecutive_ids(first: Value, rows: usize) -> Result<Vec<Value>> {
    let start = match &first {
        Value::Int32(Some(v)) => *v as i64,
        Value::Int64(Some(v)) => *v,
        Value::Null | Value::Int32(None) | Value::Int64(None) => {
            return Err(QueryError::type_adapter("The insert returned no id"));
        }
        other => {
            return Err(QueryError::type_adapter(format!(
                "Cannot derive the ids of a batch from a {} id",
                other.type_name()
            )));
        }
    };
    (0..rows as i64)
        .map(|i| {
            let id = start.checked_add(i).ok_or_else(|| overflow(start, i))?;
            Ok(match first {
                Value::Int32(..) => {
                    Value::Int32(Some(i32::try_from(id).map_err(|_| overflow(start, i))?))
                }
                _ => Value::Int64(Some(id)),
            })
        })
        .collect()
}

fn overflow(start: i64, offset: i64) -> Error {
    QueryError::type_adapter(format!(
        "The id {start} + {offset} of the batch is out of range for the primary key"
    ))
}

impl InsertQuery<phase::Returning> {
    #[track_caller]
    pub fn execute_many<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send + 'a {
        let location = Location::caller();
        self.fetch(session, location)
    }

    #[track_caller]
    pub fn execute_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Record>> + Send + 'a {
        let location = Location::caller();
        async move { exactly_one("insert", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Record>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("insert", self.fetch(session, location).await?) }
    }

    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Record>> {
        if self.data.rows.is_empty() {
            return Ok(Vec::new());
        }
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        run_returning(
            session,
            &compiled,
            self.data.returning.fields(),
            &self.compositions,
            &self.expected,
            "insert",
            location,
        )
        .await
    }
}

impl InsertQuery<ReturningOne> {
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
        async move { exactly_one("insert", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Value>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("insert", self.fetch(session, location).await?) }
    }

    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Value>> {
        if self.data.rows.is_empty() {
            return Ok(Vec::new());
        }
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        let Returning::OneColumn(field) = &self.data.returning else {
            return Err(QueryError::configuration("The insert returns no column"));
        };
        run_returning_one(session, &compiled, field, &self.expected, "insert", location).await
    }
}
