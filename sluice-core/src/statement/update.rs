use crate::{
    Composition, Expr, Field, QueryError, QueryRunner, Record, Result, Returning, RowCount,
    Session, Source, SqlWriter, Table, TypeAdapter, Value, WithSet, exactly_one, none_or_one,
    phase::{self, Ready, ReturningOne},
    run_mutation, run_returning, run_returning_one,
    writer::{CompileCache, Compiled},
};
use indexmap::IndexMap;
use std::{future::Future, marker::PhantomData, ops::RangeBounds, panic::Location, sync::Arc};

#[derive(Debug, Clone)]
pub struct UpdateData {
    pub table: Table,
    /// Assignments keyed by property, in the order they were set.
    pub sets: IndexMap<String, Expr>,
    /// Other tables read by the assignments and the condition.
    pub from: Vec<Source>,
    pub condition: Option<Expr>,
    /// Updating every row must be requested explicitly.
    pub allow_no_where: bool,
    pub returning: Returning,
}

impl UpdateData {
    pub fn withs(&self) -> WithSet {
        let mut withs = self.table.def().withs.clone();
        for source in &self.from {
            withs.extend(&source.withs());
        }
        for expr in self.sets.values().chain(&self.condition) {
            withs.extend(&expr.meta().withs);
        }
        withs.extend(&self.returning.withs());
        withs
    }
}

/// Update statement builder.
#[derive(Debug)]
pub struct UpdateQuery<P = Ready> {
    pub(crate) data: UpdateData,
    pub(crate) cache: CompileCache,
    pub(crate) compositions: Vec<Arc<Composition>>,
    pub(crate) expected: RowCount,
    phase: PhantomData<P>,
}

impl<P> Clone for UpdateQuery<P> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            cache: CompileCache::default(),
            compositions: self.compositions.clone(),
            expected: self.expected,
            phase: PhantomData,
        }
    }
}

pub fn update(table: &Table) -> UpdateQuery<Ready> {
    UpdateQuery {
        data: UpdateData {
            table: table.clone(),
            sets: IndexMap::new(),
            from: Vec::new(),
            condition: None,
            allow_no_where: false,
            returning: Returning::None,
        },
        cache: CompileCache::default(),
        compositions: Vec::new(),
        expected: RowCount::ANY,
        phase: PhantomData,
    }
}

impl<P> UpdateQuery<P> {
    pub fn data(&self) -> &UpdateData {
        &self.data
    }
    pub(crate) fn data_mut(&mut self) -> &mut UpdateData {
        self.cache.invalidate();
        &mut self.data
    }
    fn into_phase<Q>(self) -> UpdateQuery<Q> {
        UpdateQuery {
            data: self.data,
            cache: self.cache,
            compositions: self.compositions,
            expected: self.expected,
            phase: PhantomData,
        }
    }

    pub fn filter(mut self, condition: impl Into<Expr>) -> Self {
        let condition = condition.into();
        let data = self.data_mut();
        data.condition = Some(match data.condition.take() {
            Some(current) => current.and(condition),
            None => condition,
        });
        self
    }

    pub fn or_filter(mut self, condition: impl Into<Expr>) -> Self {
        let condition = condition.into();
        let data = self.data_mut();
        data.condition = Some(match data.condition.take() {
            Some(current) => current.or(condition),
            None => condition,
        });
        self
    }

    /// Accept an update without condition.
    pub fn allow_no_where(mut self) -> Self {
        self.data_mut().allow_no_where = true;
        self
    }

    /// Fail the execution unless the number of updated rows falls in `range`.
    pub fn expect_rows(mut self, range: impl RangeBounds<u64>) -> Self {
        self.expected = RowCount::new(range);
        self
    }

    pub fn compile(&self, writer: &dyn SqlWriter, adapter: &Arc<dyn TypeAdapter>) -> Result<Compiled> {
        self.cache.get_or_compile(writer, adapter, |context, out| {
            writer.write_update(context, out, &self.data)
        })
    }

    pub fn sql(&self, writer: &dyn SqlWriter) -> Result<String> {
        let adapter: Arc<dyn TypeAdapter> = Arc::new(crate::DefaultTypeAdapter);
        Ok(self.compile(writer, &adapter)?.sql)
    }
}

impl UpdateQuery<Ready> {
    /// Assign `value` to `property`, an unknown property fails when compiling.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.data_mut().sets.insert(property.into(), value.into());
        self
    }

    pub fn set_if_value(self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let value = value.into();
        if value.is_null_constant() {
            return self;
        }
        self.set(property, value)
    }

    pub fn set_if_set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let property = property.into();
        if let Some(current) = self.data_mut().sets.get_mut(&property) {
            *current = value.into();
        }
        self
    }

    pub fn set_if_not_set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let property = property.into();
        if !self.data.sets.contains_key(&property) {
            self.data_mut().sets.insert(property, value.into());
        }
        self
    }

    pub fn set_if_set_if_value(self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let value = value.into();
        if value.is_null_constant() {
            return self;
        }
        self.set_if_set(property, value)
    }

    pub fn set_if_not_set_if_value(self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let value = value.into();
        if value.is_null_constant() {
            return self;
        }
        self.set_if_not_set(property, value)
    }

    /// Replace `property` when it is set to something other than a null constant.
    pub fn set_if_has_value(self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let property = property.into();
        if !self.has_value(&property) {
            return self;
        }
        self.set(property, value)
    }

    pub fn set_if_has_value_if_value(self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let value = value.into();
        if value.is_null_constant() {
            return self;
        }
        self.set_if_has_value(property, value)
    }

    /// Set `property` when it is absent or set to a null constant.
    pub fn set_if_has_no_value(self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let property = property.into();
        if self.has_value(&property) {
            return self;
        }
        self.set(property, value)
    }

    pub fn set_if_has_no_value_if_value(
        self,
        property: impl Into<String>,
        value: impl Into<Expr>,
    ) -> Self {
        let value = value.into();
        if value.is_null_constant() {
            return self;
        }
        self.set_if_has_no_value(property, value)
    }

    fn has_value(&self, property: &str) -> bool {
        self.data
            .sets
            .get(property)
            .is_some_and(|v| !v.is_null_constant())
    }

    pub fn ignore_if_set<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let data = self.data_mut();
        for property in properties {
            data.sets.shift_remove(property.as_ref());
        }
        self
    }

    pub fn ignore_if_has_value<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for property in properties {
            if self.has_value(property.as_ref()) {
                self.data_mut().sets.shift_remove(property.as_ref());
            }
        }
        self
    }

    /// Drop `properties` set to a null constant.
    pub fn ignore_if_has_no_value<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for property in properties {
            let property = property.as_ref();
            if self.data.sets.contains_key(property) && !self.has_value(property) {
                self.data_mut().sets.shift_remove(property);
            }
        }
        self
    }

    pub fn ignore_any_set_with_no_value(mut self) -> Self {
        self.data_mut().sets.retain(|_, v| !v.is_null_constant());
        self
    }

    /// Assign every property of `record`.
    pub fn values(mut self, record: Record) -> Self {
        let data = self.data_mut();
        for (property, value) in record {
            data.sets.insert(property, Expr::value(value));
        }
        self
    }

    /// Read `source` in the assignments and the condition.
    pub fn from(mut self, source: impl Into<Source>) -> Self {
        self.data_mut().from.push(source.into());
        self
    }

    /// Send back `fields`, [`Table::old_values`] reads the values before the update.
    pub fn returning(mut self, fields: impl IntoIterator<Item = Field>) -> UpdateQuery<phase::Returning> {
        self.data_mut().returning = Returning::Fields(fields.into_iter().collect());
        self.into_phase()
    }

    pub fn returning_one_column(mut self, expr: impl Into<Expr>) -> UpdateQuery<ReturningOne> {
        self.data_mut().returning = Returning::OneColumn(Field::new("result", expr));
        self.into_phase()
    }

    /// Number of updated rows.
    #[track_caller]
    pub fn execute<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<u64>> + Send + 'a {
        let location = Location::caller();
        async move {
            let compiled = self.compile(session.sql_writer(), session.adapter())?;
            run_mutation(session, &compiled, &self.expected, "update", location).await
        }
    }
}

impl UpdateQuery<phase::Returning> {
    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Record>> {
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        run_returning(
            session,
            &compiled,
            self.data.returning.fields(),
            &self.compositions,
            &self.expected,
            "update",
            location,
        )
        .await
    }

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
        async move { exactly_one("update", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Record>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("update", self.fetch(session, location).await?) }
    }
}

impl UpdateQuery<ReturningOne> {
    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Value>> {
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        let Returning::OneColumn(field) = &self.data.returning else {
            return Err(QueryError::configuration("The update returns no column"));
        };
        run_returning_one(session, &compiled, field, &self.expected, "update", location).await
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
        async move { exactly_one("update", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Value>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("update", self.fetch(session, location).await?) }
    }
}
