use crate::{
    DefaultTypeAdapter, Result, Value,
    writer::{Context, Fragment, SqlWriter},
};
use std::{future::Future, sync::Arc};

/// Shared reference-counted column label list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
///
/// Values are read back by position: the engine projects every field under
/// its property name, in projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    pub labels: RowNames,
    /// Aligned by index with `labels`.
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values[i])
    }
}

impl From<RowLabeled> for Row {
    fn from(value: RowLabeled) -> Self {
        value.values
    }
}

/// Driver contract the engine executes statements through.
///
/// Implementations own the native connection (or the way to obtain one) and
/// expose the writer of their dialect. Every method receives the final SQL
/// text and the parameters already converted by the type adapters.
pub trait QueryRunner: Send {
    /// Writer producing the SQL this runner understands.
    fn sql_writer(&self) -> &dyn SqlWriter;

    /// Run a statement producing rows.
    fn execute_query_returning(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<RowLabeled>>> + Send;

    /// Run a statement and return the number of rows affected.
    fn execute_mutation(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Run an insert and return the id it generated.
    ///
    /// The default reads the first column of the first row, as produced by a
    /// `RETURNING` / `OUTPUT` clause. Runners of dialects without one report
    /// the id obtained from the native driver.
    fn execute_insert_returning_last_inserted_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Value>> + Send {
        async move {
            let rows = self.execute_query_returning(sql, params).await?;
            Ok(rows
                .into_iter()
                .next()
                .and_then(|row| row.values.into_vec().into_iter().next())
                .unwrap_or_default())
        }
    }

    /// Run a multi row insert and return the ids it generated, in row order.
    fn execute_insert_returning_multiple_last_inserted_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Value>>> + Send {
        async move {
            let rows = self.execute_query_returning(sql, params).await?;
            Ok(rows
                .into_iter()
                .map(|row| row.values.into_vec().into_iter().next().unwrap_or_default())
                .collect())
        }
    }

    fn execute_begin_transaction(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn execute_commit(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn execute_rollback(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Append `value` to `params` and return the placeholder referencing it.
    fn add_param(&self, params: &mut Vec<Value>, value: Value) -> String {
        let writer = self.sql_writer();
        let mut context = Context::new(Fragment::None, Arc::new(DefaultTypeAdapter));
        context.params = std::mem::take(params);
        let mut out = String::new();
        writer.write_bound(&mut context, &mut out, value);
        *params = context.params;
        out
    }

    /// Whether the runner currently holds a native transaction.
    fn is_transaction_active(&self) -> bool;
}
