use crate::{
    DataType, DefaultTypeAdapter, Error, Expr, Meta, QueryError, QueryRunner, Result, RowLabeled,
    SqlWriter, TypeAdapter, Value, compile_statement, convert_value, truncate_long,
    writer::Compiled,
};
use std::{future::Future, panic::Location, sync::Arc};

/// Logical session owning a runner and the transaction nesting of its statements.
///
/// Only the outermost `begin` reaches the runner, `commit` and `rollback`
/// reach it only when closing the outermost level.
#[derive(Debug)]
pub struct Session<R: QueryRunner> {
    runner: R,
    depth: u32,
    adapter: Arc<dyn TypeAdapter>,
}

impl<R: QueryRunner> Session<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            depth: 0,
            adapter: Arc::new(DefaultTypeAdapter),
        }
    }

    /// Replace the adapter of the values whose expression declares none.
    pub fn with_default_adapter(mut self, adapter: Arc<dyn TypeAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }
    pub fn into_runner(self) -> R {
        self.runner
    }
    pub fn sql_writer(&self) -> &dyn SqlWriter {
        self.runner.sql_writer()
    }
    pub fn adapter(&self) -> &Arc<dyn TypeAdapter> {
        &self.adapter
    }

    pub fn is_transaction_active(&self) -> bool {
        self.depth > 0
    }
    pub fn transaction_depth(&self) -> u32 {
        self.depth
    }

    pub async fn begin(&mut self) -> Result<()> {
        if self.depth == 0 {
            self.runner.execute_begin_transaction().await.map_err(|e| {
                let e = e.context("While beginning a transaction");
                log::error!("{:#}", e);
                e
            })?;
        }
        self.depth += 1;
        Ok(())
    }

    /// Close the innermost level, a failing native commit leaves the transaction open.
    pub async fn commit(&mut self) -> Result<()> {
        match self.depth {
            0 => Err(unbalanced("commit")),
            1 => {
                self.runner.execute_commit().await.map_err(|e| {
                    let e = e.context("While committing the transaction");
                    log::error!("{:#}", e);
                    e
                })?;
                self.depth = 0;
                Ok(())
            }
            _ => {
                self.depth -= 1;
                Ok(())
            }
        }
    }

    /// Close the innermost level, the outermost one always ends even if the native rollback fails.
    pub async fn rollback(&mut self) -> Result<()> {
        match self.depth {
            0 => Err(unbalanced("rollback")),
            1 => {
                self.depth = 0;
                self.runner.execute_rollback().await.map_err(|e| {
                    let e = e.context("While rolling back the transaction");
                    log::error!("{:#}", e);
                    e
                })
            }
            _ => {
                self.depth -= 1;
                Ok(())
            }
        }
    }

    /// Run `SELECT name(args) AS "result"` and convert the value as `data_type`.
    #[track_caller]
    pub fn execute_function<'a, I, V>(
        &'a mut self,
        name: &'a str,
        args: I,
        data_type: DataType,
    ) -> impl Future<Output = Result<Value>> + Send + 'a
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        let location = Location::caller();
        let args: Vec<Expr> = args.into_iter().map(Into::into).collect();
        async move {
            let writer = self.sql_writer();
            let compiled = compile_statement(&self.adapter, |context, out| {
                writer.write_function_statement(context, out, name, &args)
            })?;
            let rows = self.query_rows(&compiled, location).await?;
            let value = rows
                .into_iter()
                .next()
                .and_then(|row| row.values.into_vec().into_iter().next())
                .unwrap_or_default();
            if value.is_null() {
                return Ok(Value::Null);
            }
            convert_value(value, &Meta::of_type(data_type), &self.adapter)
        }
    }

    /// Run a stored procedure.
    #[track_caller]
    pub fn execute_procedure<'a, I, V>(
        &'a mut self,
        name: &'a str,
        args: I,
    ) -> impl Future<Output = Result<()>> + Send + 'a
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        let location = Location::caller();
        let args: Vec<Expr> = args.into_iter().map(Into::into).collect();
        async move {
            let writer = self.sql_writer();
            let compiled = compile_statement(&self.adapter, |context, out| {
                writer.write_procedure_statement(context, out, name, &args)
            })?;
            self.mutation(&compiled, location).await.map(|_| ())
        }
    }

    pub(crate) async fn query_rows(
        &mut self,
        compiled: &Compiled,
        location: &'static Location<'static>,
    ) -> Result<Vec<RowLabeled>> {
        log_dispatch(compiled);
        self.runner
            .execute_query_returning(&compiled.sql, &compiled.params)
            .await
            .map_err(|e| execution_error(e, compiled, location))
    }

    pub(crate) async fn mutation(
        &mut self,
        compiled: &Compiled,
        location: &'static Location<'static>,
    ) -> Result<u64> {
        log_dispatch(compiled);
        self.runner
            .execute_mutation(&compiled.sql, &compiled.params)
            .await
            .map_err(|e| execution_error(e, compiled, location))
    }

    pub(crate) async fn insert_id(
        &mut self,
        compiled: &Compiled,
        location: &'static Location<'static>,
    ) -> Result<Value> {
        log_dispatch(compiled);
        self.runner
            .execute_insert_returning_last_inserted_id(&compiled.sql, &compiled.params)
            .await
            .map_err(|e| execution_error(e, compiled, location))
    }

    pub(crate) async fn insert_ids(
        &mut self,
        compiled: &Compiled,
        location: &'static Location<'static>,
    ) -> Result<Vec<Value>> {
        log_dispatch(compiled);
        self.runner
            .execute_insert_returning_multiple_last_inserted_id(&compiled.sql, &compiled.params)
            .await
            .map_err(|e| execution_error(e, compiled, location))
    }
}

fn unbalanced(operation: &str) -> Error {
    let error = QueryError::unbalanced(format!(
        "{operation} called without an open transaction"
    ));
    log::error!("{:#}", error);
    error
}

fn log_dispatch(compiled: &Compiled) {
    log::debug!(
        "Executing ({} params): {}",
        compiled.params.len(),
        truncate_long!(compiled.sql)
    );
}

fn execution_error(
    error: Error,
    compiled: &Compiled,
    location: &'static Location<'static>,
) -> Error {
    let error = error.context(QueryError::Execution {
        location: location.to_string(),
        sql: truncate_long!(compiled.sql).to_string(),
    });
    log::error!("{:#}", error);
    error
}
