use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ErrorInfo;
use crate::options::{ConnectionOptions, ParamType};
use crate::udbc::connection::{Connection, Statement};
use crate::udbc::sqlite::value_codec::{from_sqlite_value, to_sqlite_value};
use crate::udbc::value::{Params, Row};
use crate::udbc::{LastError, NativeError};

/// `None` once the connection has been closed.
type SharedConn = Arc<Mutex<Option<rusqlite::Connection>>>;

/// Runs `f` against the connection on the blocking thread pool.
async fn blocking<T, F>(conn: &SharedConn, f: F) -> Result<T, NativeError>
where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, NativeError> + Send + 'static,
{
    let conn = conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| NativeError::new("HY000", None, "connection is closed"))?;
        f(conn)
    })
    .await
    .unwrap_or_else(|e| Err(NativeError::message(e.to_string())))
}

/// Prepares, binds and steps `sql`, buffering the whole result set.
fn run_statement(
    conn: &mut rusqlite::Connection,
    sql: &str,
    params: &Params,
) -> Result<(VecDeque<Row>, u64), NativeError> {
    let mut stmt = conn.prepare(sql)?;
    bind(&mut stmt, params)?;

    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into();
    let column_count = columns.len();

    let mut out = VecDeque::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(from_sqlite_value(row.get_ref(i)?));
        }
        out.push_back(Row::new(columns.clone(), values));
    }
    drop(rows);
    drop(stmt);

    let changes = if column_count == 0 {
        conn.changes() as u64
    } else {
        0
    };
    Ok((out, changes))
}

fn bind(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> Result<(), NativeError> {
    match params {
        Params::None => {}
        Params::Positional(values) => {
            if values.len() != stmt.parameter_count() {
                return Err(NativeError::new(
                    "HY093",
                    None,
                    format!(
                        "Invalid parameter number: expected {}, got {}",
                        stmt.parameter_count(),
                        values.len()
                    ),
                ));
            }
            for (i, v) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, to_sqlite_value(v))?;
            }
        }
        Params::Named(values) => {
            for (name, v) in values {
                let index = parameter_index(stmt, name)?.ok_or_else(|| {
                    NativeError::new("HY093", None, format!("Invalid parameter name: {}", name))
                })?;
                stmt.raw_bind_parameter(index, to_sqlite_value(v))?;
            }
        }
    }
    Ok(())
}

fn parameter_index(
    stmt: &rusqlite::Statement<'_>,
    name: &str,
) -> Result<Option<usize>, NativeError> {
    if name.starts_with([':', '@', '$']) {
        return Ok(stmt.parameter_index(name)?);
    }
    Ok(stmt.parameter_index(&format!(":{}", name))?)
}

pub struct SqliteConnection {
    conn: SharedConn,
    last_error: LastError,
}

impl SqliteConnection {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            last_error: LastError::default(),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, NativeError>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, NativeError> + Send + 'static,
    {
        self.last_error.record(blocking(&self.conn, f).await)
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn exec(&self, sql: &str) -> Result<u64, NativeError> {
        let sql = sql.to_string();
        self.run(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(conn.changes() as u64)
        })
        .await
    }

    async fn query(&self, sql: &str) -> Result<Box<dyn Statement>, NativeError> {
        let mut stmt = SqliteStatement {
            conn: self.conn.clone(),
            sql: sql.to_string(),
            rows: VecDeque::new(),
            row_count: 0,
        };
        let result = stmt.execute(&Params::None).await;
        self.last_error.record(result)?;
        Ok(Box::new(stmt))
    }

    async fn prepare(
        &self,
        sql: &str,
        _options: &ConnectionOptions,
    ) -> Result<Box<dyn Statement>, NativeError> {
        // compile once to surface syntax errors at prepare time
        let check = sql.to_string();
        self.run(move |conn| {
            conn.prepare(&check)?;
            Ok(())
        })
        .await?;
        Ok(Box::new(SqliteStatement {
            conn: self.conn.clone(),
            sql: sql.to_string(),
            rows: VecDeque::new(),
            row_count: 0,
        }))
    }

    fn quote(&self, value: &str, _hint: ParamType) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.get()
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<String, NativeError> {
        self.run(|conn| Ok(conn.last_insert_rowid().to_string()))
            .await
    }

    async fn begin(&self) -> Result<(), NativeError> {
        self.run(|conn| Ok(conn.execute_batch("BEGIN")?)).await
    }

    async fn commit(&self) -> Result<(), NativeError> {
        self.run(|conn| Ok(conn.execute_batch("COMMIT")?)).await
    }

    async fn rollback(&self) -> Result<(), NativeError> {
        self.run(|conn| Ok(conn.execute_batch("ROLLBACK")?)).await
    }

    async fn in_transaction(&self) -> bool {
        self.run(|conn| Ok(!conn.is_autocommit()))
            .await
            .unwrap_or(false)
    }

    async fn close(&self) -> Result<(), NativeError> {
        let conn = self.conn.clone();
        let result = tokio::task::spawn_blocking(move || match conn.blocking_lock().take() {
            Some(c) => c.close().map_err(|(_, e)| NativeError::from(e)),
            None => Ok(()),
        })
        .await
        .unwrap_or_else(|e| Err(NativeError::message(e.to_string())));
        self.last_error.record(result)
    }
}

pub struct SqliteStatement {
    conn: SharedConn,
    sql: String,
    rows: VecDeque<Row>,
    row_count: u64,
}

#[async_trait]
impl Statement for SqliteStatement {
    async fn execute(&mut self, params: &Params) -> Result<(), NativeError> {
        let sql = self.sql.clone();
        let params = params.clone();
        let (rows, changes) =
            blocking(&self.conn, move |conn| run_statement(conn, &sql, &params)).await?;
        self.rows = rows;
        self.row_count = changes;
        Ok(())
    }

    async fn fetch(&mut self) -> Result<Option<Row>, NativeError> {
        Ok(self.rows.pop_front())
    }

    async fn fetch_all(&mut self) -> Result<Vec<Row>, NativeError> {
        Ok(self.rows.drain(..).collect())
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }
}
