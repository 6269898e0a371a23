//! services/api/src/adapters/store.rs
//!
//! The embedded SQLite store.
//!
//! Every statement submitted through [`Store::query`] or [`Store::batch`] is
//! funneled over a single channel to one owner task, which executes requests in
//! FIFO order and replies on a per-request oneshot. Rows are fully collected on
//! the owner before the reply is sent, so no cursor outlives the request.
//! [`Store::query_row`] is a direct read path on the pool that skips the funnel.

use futures::TryStreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Either, Executor, Row, Sqlite, TypeInfo, ValueRef};
use std::path::Path;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// How many requests may wait for the owner before senders are back-pressured.
const REQUEST_QUEUE_DEPTH: usize = 256;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        password_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        candidate_id TEXT,
        candidate_name TEXT,
        candidate_email TEXT,
        candidate_rating INTEGER,
        metadata_interview_time TEXT,
        metadata_duration INTEGER,
        metadata_interview_type TEXT,
        metadata_status TEXT,
        metadata_link TEXT,
        metadata_date TEXT,
        metadata_timezone TEXT,
        created_by TEXT REFERENCES users(id),
        feedback TEXT,
        notes TEXT,
        created_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS session_feedback (
        session_id TEXT NOT NULL REFERENCES sessions(id),
        interviewer_id TEXT NOT NULL,
        interviewer_name TEXT,
        interviewer_email TEXT,
        rating INTEGER NOT NULL,
        feedback TEXT,
        notes TEXT,
        PRIMARY KEY (session_id, interviewer_id)
    )",
];

//=========================================================================================
// Errors and Values
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("the store has been shut down")]
    Closed,
    #[error("column '{0}' is not in the result row")]
    MissingColumn(String),
    #[error("column '{column}' holds {found}, expected {expected}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// A dynamically typed SQLite value, used for both arguments and results.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Real(_) => "REAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Blob(_) => "BLOB",
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<u8> for SqlValue {
    fn from(value: u8) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row, detached from the connection it was read on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl StoreRow {
    fn from_sqlite(row: &SqliteRow) -> Result<Self, StoreError> {
        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());

        for (index, column) in row.columns().iter().enumerate() {
            let raw = row.try_get_raw(index)?;
            let value = if raw.is_null() {
                SqlValue::Null
            } else {
                match raw.type_info().name() {
                    "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get::<i64, _>(index)?),
                    "REAL" => SqlValue::Real(row.try_get::<f64, _>(index)?),
                    "BLOB" => SqlValue::Blob(row.try_get::<Vec<u8>, _>(index)?),
                    _ => SqlValue::Text(row.try_get::<String, _>(index)?),
                }
            };
            columns.push(column.name().to_string());
            values.push(value);
        }

        Ok(Self { columns, values })
    }

    pub fn get(&self, column: &str) -> Result<&SqlValue, StoreError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|index| &self.values[index])
            .ok_or_else(|| StoreError::MissingColumn(column.to_string()))
    }

    /// A text column; NULL reads as the empty string.
    pub fn text(&self, column: &str) -> Result<String, StoreError> {
        Ok(self.opt_text(column)?.unwrap_or_default())
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, StoreError> {
        match self.get(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            other => Err(StoreError::UnexpectedType {
                column: column.to_string(),
                expected: "TEXT",
                found: other.kind(),
            }),
        }
    }

    /// An integer column; NULL reads as zero.
    pub fn integer(&self, column: &str) -> Result<i64, StoreError> {
        match self.get(column)? {
            SqlValue::Null => Ok(0),
            SqlValue::Integer(v) => Ok(*v),
            other => Err(StoreError::UnexpectedType {
                column: column.to_string(),
                expected: "INTEGER",
                found: other.kind(),
            }),
        }
    }
}

/// A SQL statement together with its positional arguments.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Everything a statement produced.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub rows: Vec<StoreRow>,
    pub rows_affected: u64,
}

type Reply = oneshot::Sender<Result<QueryOutcome, StoreError>>;

enum StoreRequest {
    Query { statement: Statement, reply: Reply },
    Batch { statements: Vec<Statement>, reply: Reply },
    Shutdown,
}

//=========================================================================================
// The Store
//=========================================================================================

/// Handle to the store. Create one at startup with [`Store::open`] and share it.
pub struct Store {
    requests: mpsc::Sender<StoreRequest>,
    pool: SqlitePool,
    owner: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Opens (creating if missing) the database file, ensures the schema, and
    /// starts the owner task.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        for ddl in SCHEMA {
            pool.execute(ddl).await?;
        }

        let (requests, receiver) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let owner = tokio::spawn(serve(pool.clone(), receiver));
        info!(path = %path.as_ref().display(), "Store opened");

        Ok(Self {
            requests,
            pool,
            owner: Mutex::new(Some(owner)),
        })
    }

    /// Runs one statement on the owner task and returns its collected rows.
    pub async fn query(&self, sql: &str, args: Vec<SqlValue>) -> Result<QueryOutcome, StoreError> {
        let statement = Statement::new(sql, args);
        self.submit(|reply| StoreRequest::Query { statement, reply }).await
    }

    /// Runs all statements on the owner task inside a single transaction.
    /// Either every statement takes effect or none does.
    pub async fn batch(&self, statements: Vec<Statement>) -> Result<QueryOutcome, StoreError> {
        self.submit(|reply| StoreRequest::Batch { statements, reply }).await
    }

    /// Reads at most one row directly from the pool, bypassing the owner.
    pub async fn query_row(
        &self,
        sql: &str,
        args: Vec<SqlValue>,
    ) -> Result<Option<StoreRow>, StoreError> {
        let statement = Statement::new(sql, args);
        let row = build_query(&statement).fetch_optional(&self.pool).await?;
        row.as_ref().map(StoreRow::from_sqlite).transpose()
    }

    /// Serves every request queued so far, stops the owner, and closes the pool.
    /// Requests submitted afterwards fail with [`StoreError::Closed`].
    pub async fn shutdown(&self) {
        let _ = self.requests.send(StoreRequest::Shutdown).await;
        if let Some(owner) = self.owner.lock().await.take() {
            if let Err(e) = owner.await {
                error!(error = %e, "Store owner task failed");
            }
        }
        self.pool.close().await;
        info!("Store shut down");
    }

    async fn submit(
        &self,
        request: impl FnOnce(Reply) -> StoreRequest,
    ) -> Result<QueryOutcome, StoreError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)?
    }
}

/// The owner loop: the only place funneled statements execute.
async fn serve(pool: SqlitePool, mut requests: mpsc::Receiver<StoreRequest>) {
    while let Some(request) = requests.recv().await {
        match request {
            StoreRequest::Query { statement, reply } => {
                let result = run_statement(&pool, &statement).await;
                // The caller may have stopped waiting; nothing to do then.
                let _ = reply.send(result);
            }
            StoreRequest::Batch { statements, reply } => {
                let result = run_batch(&pool, &statements).await;
                let _ = reply.send(result);
            }
            StoreRequest::Shutdown => break,
        }
    }
    debug!("Store owner stopped");
}

async fn run_batch(pool: &SqlitePool, statements: &[Statement]) -> Result<QueryOutcome, StoreError> {
    let mut tx = pool.begin().await?;
    let mut outcome = QueryOutcome::default();
    for statement in statements {
        let step = run_statement(&mut *tx, statement).await?;
        outcome.rows.extend(step.rows);
        outcome.rows_affected += step.rows_affected;
    }
    tx.commit().await?;
    Ok(outcome)
}

async fn run_statement<'c, E>(executor: E, statement: &Statement) -> Result<QueryOutcome, StoreError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let mut outcome = QueryOutcome::default();
    let mut stream = build_query(statement).fetch_many(executor);
    while let Some(step) = stream.try_next().await? {
        match step {
            Either::Left(done) => outcome.rows_affected += done.rows_affected(),
            Either::Right(row) => outcome.rows.push(StoreRow::from_sqlite(&row)?),
        }
    }
    Ok(outcome)
}

fn build_query(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(&statement.sql);
    for arg in &statement.args {
        query = match arg {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Blob(v) => query.bind(v.as_slice()),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("test.db")).await.expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let (_dir, store) = open_store().await;
        let outcome = store
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                vec![],
            )
            .await
            .unwrap();
        let names: Vec<String> = outcome.rows.iter().map(|r| r.text("name").unwrap()).collect();
        assert!(names.contains(&"users".to_string()));
        assert!(names.contains(&"sessions".to_string()));
        assert!(names.contains(&"session_feedback".to_string()));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn query_collects_rows_and_affected_counts() {
        let (_dir, store) = open_store().await;
        let inserted = store
            .query(
                "INSERT INTO users (id, email, name, role, password_hash) VALUES (?, ?, ?, ?, ?)",
                vec!["u1".into(), "a@x".into(), "A".into(), "interviewer".into(), "h".into()],
            )
            .await
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);
        assert!(inserted.rows.is_empty());

        let selected = store
            .query("SELECT id, email, role FROM users WHERE id = ?", vec!["u1".into()])
            .await
            .unwrap();
        assert_eq!(selected.rows.len(), 1);
        assert_eq!(selected.rows[0].text("email").unwrap(), "a@x");
        assert_eq!(selected.rows[0].text("role").unwrap(), "interviewer");
        assert!(matches!(
            selected.rows[0].get("missing"),
            Err(StoreError::MissingColumn(_))
        ));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn nulls_and_integers_decode() {
        let (_dir, store) = open_store().await;
        store
            .query(
                "INSERT INTO sessions (id, candidate_rating, metadata_duration, created_by) VALUES (?, ?, ?, ?)",
                vec!["s1".into(), 200u8.into(), 30i64.into(), SqlValue::from(None::<String>)],
            )
            .await
            .unwrap();

        let row = store
            .query_row(
                "SELECT candidate_rating, metadata_duration, created_by, notes FROM sessions WHERE id = ?",
                vec!["s1".into()],
            )
            .await
            .unwrap()
            .expect("row");
        assert_eq!(row.integer("candidate_rating").unwrap(), 200);
        assert_eq!(row.integer("metadata_duration").unwrap(), 30);
        assert_eq!(row.opt_text("created_by").unwrap(), None);
        assert_eq!(row.text("notes").unwrap(), "");
        assert!(matches!(
            row.text("metadata_duration"),
            Err(StoreError::UnexpectedType { .. })
        ));

        let absent = store
            .query_row("SELECT id FROM sessions WHERE id = ?", vec!["nope".into()])
            .await
            .unwrap();
        assert!(absent.is_none());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_writes_are_all_applied() {
        let (_dir, store) = open_store().await;
        let store = Arc::new(store);
        store
            .query(
                "INSERT INTO sessions (id, candidate_rating) VALUES ('counter', 0)",
                vec![],
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .query(
                        "UPDATE sessions SET candidate_rating = candidate_rating + 1 WHERE id = 'counter'",
                        vec![],
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let row = store
            .query_row("SELECT candidate_rating FROM sessions WHERE id = 'counter'", vec![])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.integer("candidate_rating").unwrap(), 50);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn writes_apply_in_submission_order() {
        let (_dir, store) = open_store().await;
        store
            .query("INSERT INTO sessions (id, notes) VALUES ('s', '')", vec![])
            .await
            .unwrap();
        for i in 0..10 {
            store
                .query(
                    "UPDATE sessions SET notes = notes || ? WHERE id = 's'",
                    vec![i.to_string().into()],
                )
                .await
                .unwrap();
        }
        let row = store
            .query_row("SELECT notes FROM sessions WHERE id = 's'", vec![])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.text("notes").unwrap(), "0123456789");
        store.shutdown().await;
    }

    #[tokio::test]
    async fn failed_batch_rolls_back() {
        let (_dir, store) = open_store().await;
        let result = store
            .batch(vec![
                Statement::new("INSERT INTO sessions (id) VALUES (?)", vec!["dup".into()]),
                Statement::new("INSERT INTO sessions (id) VALUES (?)", vec!["dup".into()]),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::Sqlx(_))));

        let row = store
            .query_row("SELECT id FROM sessions WHERE id = 'dup'", vec![])
            .await
            .unwrap();
        assert!(row.is_none());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let (_dir, store) = open_store().await;
        let result = store
            .query(
                "INSERT INTO sessions (id, created_by) VALUES ('s', 'no-such-user')",
                vec![],
            )
            .await;
        assert!(result.is_err());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn requests_after_shutdown_fail_closed() {
        let (_dir, store) = open_store().await;
        store.shutdown().await;
        let result = store.query("SELECT 1", vec![]).await;
        assert!(matches!(result, Err(StoreError::Closed)));
    }
}
