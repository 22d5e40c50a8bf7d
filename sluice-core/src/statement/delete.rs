use crate::{
    Composition, Expr, Field, QueryError, QueryRunner, Record, Result, Returning, RowCount,
    Session, Source, SqlWriter, Table, TypeAdapter, Value, WithSet, exactly_one, none_or_one,
    phase::{self, Ready, ReturningOne},
    run_mutation, run_returning, run_returning_one,
    writer::{CompileCache, Compiled},
};
use std::{future::Future, marker::PhantomData, ops::RangeBounds, panic::Location, sync::Arc};

#[derive(Debug, Clone)]
pub struct DeleteData {
    pub table: Table,
    /// Other tables read by the condition.
    pub using: Vec<Source>,
    pub condition: Option<Expr>,
    pub allow_no_where: bool,
    pub returning: Returning,
}

impl DeleteData {
    pub fn withs(&self) -> WithSet {
        let mut withs = self.table.def().withs.clone();
        for source in &self.using {
            withs.extend(&source.withs());
        }
        if let Some(condition) = &self.condition {
            withs.extend(&condition.meta().withs);
        }
        withs.extend(&self.returning.withs());
        withs
    }
}

/// Delete statement builder.
#[derive(Debug)]
pub struct DeleteQuery<P = Ready> {
    pub(crate) data: DeleteData,
    pub(crate) cache: CompileCache,
    pub(crate) compositions: Vec<Arc<Composition>>,
    pub(crate) expected: RowCount,
    phase: PhantomData<P>,
}

impl<P> Clone for DeleteQuery<P> {
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

pub fn delete_from(table: &Table) -> DeleteQuery<Ready> {
    DeleteQuery {
        data: DeleteData {
            table: table.clone(),
            using: Vec::new(),
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

impl<P> DeleteQuery<P> {
    pub fn data(&self) -> &DeleteData {
        &self.data
    }
    pub(crate) fn data_mut(&mut self) -> &mut DeleteData {
        self.cache.invalidate();
        &mut self.data
    }
    fn into_phase<Q>(self) -> DeleteQuery<Q> {
        DeleteQuery {
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

    /// Accept a delete without condition.
    pub fn allow_no_where(mut self) -> Self {
        self.data_mut().allow_no_where = true;
        self
    }

    pub fn expect_rows(mut self, range: impl RangeBounds<u64>) -> Self {
        self.expected = RowCount::new(range);
        self
    }

    pub fn compile(&self, writer: &dyn SqlWriter, adapter: &Arc<dyn TypeAdapter>) -> Result<Compiled> {
        self.cache.get_or_compile(writer, adapter, |context, out| {
            writer.write_delete(context, out, &self.data)
        })
    }

    pub fn sql(&self, writer: &dyn SqlWriter) -> Result<String> {
        let adapter: Arc<dyn TypeAdapter> = Arc::new(crate::DefaultTypeAdapter);
        Ok(self.compile(writer, &adapter)?.sql)
    }
}

impl DeleteQuery<Ready> {
    /// Read `source` in the condition.
    pub fn using(mut self, source: impl Into<Source>) -> Self {
        self.data_mut().using.push(source.into());
        self
    }

    pub fn returning(mut self, fields: impl IntoIterator<Item = Field>) -> DeleteQuery<phase::Returning> {
        self.data_mut().returning = Returning::Fields(fields.into_iter().collect());
        self.into_phase()
    }

    pub fn returning_one_column(mut self, expr: impl Into<Expr>) -> DeleteQuery<ReturningOne> {
        self.data_mut().returning = Returning::OneColumn(Field::new("result", expr));
        self.into_phase()
    }

    /// Number of deleted rows.
    #[track_caller]
    pub fn execute<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<u64>> + Send + 'a {
        let location = Location::caller();
        async move {
            let compiled = self.compile(session.sql_writer(), session.adapter())?;
            run_mutation(session, &compiled, &self.expected, "delete", location).await
        }
    }
}

impl DeleteQuery<phase::Returning> {
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
            "delete",
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
        async move { exactly_one("delete", self.fetch(session, location).await?) }
    }

    #[track_caller]
    pub fn execute_none_or_one<'a, R: QueryRunner>(
        &'a self,
        session: &'a mut Session<R>,
    ) -> impl Future<Output = Result<Option<Record>>> + Send + 'a {
        let location = Location::caller();
        async move { none_or_one("delete", self.fetch(session, location).await?) }
    }
}

impl DeleteQuery<ReturningOne> {
    async fn fetch<R: QueryRunner>(
        &self,
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<Vec<Value>> {
        let compiled = self.compile(session.sql_writer(), session.adapter())?;
        let Returning::OneColumn(field) = &self.data.returning else {
            return Err(QueryError::configuration("The delete returns no column"));
        };
        run_returning_one(session, &compiled, field, &self.expected, "delete", location).await
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
        async move { exactly_one("delete", self.fetch(session, location).await?) }
    }
}
