use log::LevelFilter;
use sluice::{
    Error, Pool, PostgresSqlWriter, QueryRunner, Result, RowLabeled, SqlWriter, Value,
};
use std::{
    collections::VecDeque,
    env,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Query,
    Mutation,
    InsertId,
    InsertIds,
    Begin,
    Commit,
    Rollback,
}

/// Statement received by a [`MockRunner`].
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub call: Call,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Scripted answer, consumed in order by the statements.
#[derive(Debug, Clone)]
pub enum Response {
    Rows(Vec<RowLabeled>),
    Affected(u64),
    Id(Value),
    Ids(Vec<Value>),
    Fail(String),
}

pub fn rows(labels: &[&str], rows: Vec<Vec<Value>>) -> Response {
    let labels: Arc<[String]> = labels.iter().map(|v| v.to_string()).collect();
    Response::Rows(
        rows.into_iter()
            .map(|v| RowLabeled::new(labels.clone(), v.into()))
            .collect(),
    )
}

pub type Script = Arc<Mutex<VecDeque<Response>>>;
pub type Journal = Arc<Mutex<Vec<Executed>>>;

/// Runner answering from a script and recording every call.
pub struct MockRunner {
    writer: Box<dyn SqlWriter>,
    script: Script,
    journal: Journal,
    transaction: bool,
    pub fail_commit: bool,
}

impl MockRunner {
    pub fn new(writer: impl SqlWriter + 'static) -> Self {
        Self::sharing(Box::new(writer), Script::default(), Journal::default())
    }

    pub fn sharing(writer: Box<dyn SqlWriter>, script: Script, journal: Journal) -> Self {
        Self {
            writer,
            script,
            journal,
            transaction: false,
            fail_commit: false,
        }
    }

    pub fn respond(&self, response: Response) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.journal.lock().unwrap().clone()
    }

    fn note(&self, call: Call, sql: &str, params: &[Value]) {
        self.journal.lock().unwrap().push(Executed {
            call,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    /// Journals the statement and takes the next scripted answer.
    fn record(&self, call: Call, sql: &str, params: &[Value]) -> Option<Response> {
        self.note(call, sql, params);
        self.script.lock().unwrap().pop_front()
    }
}

fn unexpected(response: Option<Response>, call: Call) -> Error {
    match response {
        Some(Response::Fail(message)) => Error::msg(message),
        other => Error::msg(format!("No scripted answer for {call:?}, found {other:?}")),
    }
}

impl QueryRunner for MockRunner {
    fn sql_writer(&self) -> &dyn SqlWriter {
        self.writer.as_ref()
    }

    async fn execute_query_returning(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RowLabeled>> {
        match self.record(Call::Query, sql, params) {
            Some(Response::Rows(rows)) => Ok(rows),
            other => Err(unexpected(other, Call::Query)),
        }
    }

    async fn execute_mutation(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        match self.record(Call::Mutation, sql, params) {
            Some(Response::Affected(count)) => Ok(count),
            other => Err(unexpected(other, Call::Mutation)),
        }
    }

    async fn execute_insert_returning_last_inserted_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Value> {
        match self.record(Call::InsertId, sql, params) {
            Some(Response::Id(id)) => Ok(id),
            other => Err(unexpected(other, Call::InsertId)),
        }
    }

    async fn execute_insert_returning_multiple_last_inserted_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Value>> {
        match self.record(Call::InsertIds, sql, params) {
            Some(Response::Ids(ids)) => Ok(ids),
            other => Err(unexpected(other, Call::InsertIds)),
        }
    }

    async fn execute_begin_transaction(&mut self) -> Result<()> {
        self.note(Call::Begin, "BEGIN", &[]);
        self.transaction = true;
        Ok(())
    }

    async fn execute_commit(&mut self) -> Result<()> {
        self.note(Call::Commit, "COMMIT", &[]);
        if self.fail_commit {
            return Err(Error::msg("The commit was refused"));
        }
        self.transaction = false;
        Ok(())
    }

    async fn execute_rollback(&mut self) -> Result<()> {
        self.note(Call::Rollback, "ROLLBACK", &[]);
        self.transaction = false;
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction
    }
}

/// Pool handing out mock runners sharing one script and one journal.
#[derive(Default)]
pub struct MockPool {
    writer: PostgresSqlWriter,
    pub script: Script,
    pub journal: Journal,
    pub checkouts: AtomicUsize,
    pub releases: AtomicUsize,
}

impl MockPool {
    pub fn respond(&self, response: Response) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn checked_out(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst) - self.releases.load(Ordering::SeqCst)
    }
}

impl Pool for MockPool {
    type Connection = MockRunner;

    fn sql_writer(&self) -> &dyn SqlWriter {
        &self.writer
    }

    async fn checkout(&self) -> Result<MockRunner> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(MockRunner::sharing(
            Box::new(self.writer),
            self.script.clone(),
            self.journal.clone(),
        ))
    }

    fn release(&self, _connection: MockRunner) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
