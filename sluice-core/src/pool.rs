use crate::{QueryError, QueryRunner, Result, RowLabeled, SqlWriter, Value};
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    sync::Arc,
};

/// Source of connections, checked out for one statement or one transaction.
pub trait Pool: Send + Sync + 'static {
    type Connection: QueryRunner;

    fn sql_writer(&self) -> &dyn SqlWriter;

    /// Obtain a connection, it will be handed back through [`Pool::release`].
    fn checkout(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    fn release(&self, connection: Self::Connection);
}

/// Checked out connection, handed back to its pool when dropped.
pub struct Lease<P: Pool> {
    pool: Arc<P>,
    connection: Option<P::Connection>,
}

impl<P: Pool> Lease<P> {
    pub async fn checkout(pool: &Arc<P>) -> Result<Self> {
        let connection = pool.checkout().await?;
        log::trace!("Connection checked out");
        Ok(Self {
            pool: pool.clone(),
            connection: Some(connection),
        })
    }

    fn connection(&mut self) -> &mut P::Connection {
        match self.connection.as_mut() {
            Some(connection) => connection,
            None => unreachable!("the connection of a lease is taken only on drop"),
        }
    }
}

impl<P: Pool> Drop for Lease<P> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            log::trace!("Connection released");
            self.pool.release(connection);
        }
    }
}

impl<P: Pool> Debug for Lease<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("held", &self.connection.is_some())
            .finish()
    }
}

/// Run `$call` on the held connection, or on one leased for this call only.
macro_rules! on_connection {
    ($runner:expr, $connection:ident => $call:expr) => {
        match $runner.held.as_mut() {
            Some(lease) => {
                let $connection = lease.connection();
                $call.await
            }
            None => {
                let mut lease = Lease::checkout(&$runner.pool).await?;
                let $connection = lease.connection();
                $call.await
            }
        }
    };
}

/// Runner checking out a connection per statement, or one for a whole transaction.
pub struct PoolRunner<P: Pool> {
    pool: Arc<P>,
    held: Option<Lease<P>>,
}

impl<P: Pool> PoolRunner<P> {
    pub fn new(pool: Arc<P>) -> Self {
        Self { pool, held: None }
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }
}

impl<P: Pool> Debug for PoolRunner<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRunner")
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl<P: Pool> QueryRunner for PoolRunner<P> {
    fn sql_writer(&self) -> &dyn SqlWriter {
        self.pool.sql_writer()
    }

    async fn execute_query_returning(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RowLabeled>> {
        on_connection!(self, c => c.execute_query_returning(sql, params))
    }

    async fn execute_mutation(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        on_connection!(self, c => c.execute_mutation(sql, params))
    }

    async fn execute_insert_returning_last_inserted_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Value> {
        on_connection!(self, c => c.execute_insert_returning_last_inserted_id(sql, params))
    }

    async fn execute_insert_returning_multiple_last_inserted_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Value>> {
        on_connection!(self, c => c.execute_insert_returning_multiple_last_inserted_id(sql, params))
    }

    /// Check out the connection kept until the transaction ends.
    async fn execute_begin_transaction(&mut self) -> Result<()> {
        let mut lease = Lease::checkout(&self.pool).await?;
        lease.connection().execute_begin_transaction().await?;
        self.held = Some(lease);
        Ok(())
    }

    /// A failed commit keeps the connection, the transaction can still be rolled back.
    async fn execute_commit(&mut self) -> Result<()> {
        let Some(lease) = self.held.as_mut() else {
            return Err(QueryError::unbalanced("commit without a held connection"));
        };
        lease.connection().execute_commit().await?;
        self.held = None;
        Ok(())
    }

    async fn execute_rollback(&mut self) -> Result<()> {
        let Some(mut lease) = self.held.take() else {
            return Err(QueryError::unbalanced("rollback without a held connection"));
        };
        lease.connection().execute_rollback().await
    }

    fn is_transaction_active(&self) -> bool {
        self.held.is_some()
    }
}
