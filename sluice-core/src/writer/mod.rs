macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

mod context;
mod dialect;
mod mysql;
mod postgres;
mod sql_writer;
mod sqlite;
mod sqlserver;

pub use context::*;
pub use dialect::*;
pub use mysql::*;
pub use postgres::*;
pub use sql_writer::*;
pub use sqlite::*;
pub use sqlserver::*;

use crate::{Result, TypeAdapter, Value};
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Mutex},
};

/// SQL text and the parameters bound to its placeholders, in placeholder order.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Writes one statement into a fresh [`Context`].
pub fn compile_statement(
    adapter: &Arc<dyn TypeAdapter>,
    write: impl FnOnce(&mut Context, &mut String) -> Result<()>,
) -> Result<Compiled> {
    let mut context = Context::new(Fragment::None, adapter.clone());
    let mut sql = String::with_capacity(256);
    write(&mut context, &mut sql)?;
    Ok(Compiled {
        sql,
        params: context.params,
    })
}

/// Last compilation of a statement, keyed by dialect and default adapter.
///
/// Cloning a statement gives an empty cache, every builder method invalidates it.
#[derive(Default)]
pub struct CompileCache(Mutex<Option<(&'static str, Arc<dyn TypeAdapter>, Compiled)>>);

impl CompileCache {
    pub fn get_or_compile(
        &self,
        writer: &dyn SqlWriter,
        adapter: &Arc<dyn TypeAdapter>,
        write: impl FnOnce(&mut Context, &mut String) -> Result<()>,
    ) -> Result<Compiled> {
        let dialect = writer.dialect().name;
        if let Ok(guard) = self.0.lock()
            && let Some((name, cached, compiled)) = guard.as_ref()
            && *name == dialect
            && same_adapter(cached, adapter)
        {
            return Ok(compiled.clone());
        }
        let compiled = compile_statement(adapter, write)?;
        if let Ok(mut guard) = self.0.lock() {
            *guard = Some((dialect, adapter.clone(), compiled.clone()));
        }
        Ok(compiled)
    }
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
    pub fn is_empty(&self) -> bool {
        self.0.lock().map(|v| v.is_none()).unwrap_or(true)
    }
}

fn same_adapter(a: &Arc<dyn TypeAdapter>, b: &Arc<dyn TypeAdapter>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl Clone for CompileCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl Debug for CompileCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompileCache")
            .field(&!self.is_empty())
            .finish()
    }
}

/// Writer of the dialect selected by the scheme of a connection url.
pub fn writer_for_url(url: &str) -> Result<Box<dyn SqlWriter>> {
    let dialect = Dialect::from_url(url)?;
    Ok(match dialect.name {
        "postgres" => Box::new(PostgresSqlWriter::new()),
        "mariadb" => Box::new(MySqlSqlWriter::mariadb()),
        "mysql" => Box::new(MySqlSqlWriter::new()),
        "sqlite" => Box::new(SqliteSqlWriter::new()),
        _ => Box::new(SqlServerSqlWriter::new()),
    })
}
