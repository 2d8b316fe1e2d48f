use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Row as MyRow};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::ErrorInfo;
use crate::options::{ConnectionOptions, ParamType};
use crate::udbc::connection::{Connection, Statement};
use crate::udbc::mysql::value_codec::{from_mysql_value, to_mysql_value};
use crate::udbc::value::{Params, Row};
use crate::udbc::{LastError, NativeError};

/// `None` once the connection has been closed.
type SharedConn = Arc<Mutex<Option<Conn>>>;

fn closed() -> NativeError {
    NativeError::new("HY000", None, "connection is closed")
}

fn to_params(params: &Params) -> mysql_async::Params {
    match params {
        Params::None => mysql_async::Params::Empty,
        Params::Positional(values) => {
            mysql_async::Params::Positional(values.iter().map(to_mysql_value).collect())
        }
        Params::Named(values) => mysql_async::Params::Named(
            values
                .iter()
                .map(|(k, v)| {
                    (
                        k.trim_start_matches(':').as_bytes().to_vec(),
                        to_mysql_value(v),
                    )
                })
                .collect(),
        ),
    }
}

// Consume rows to avoid cloning values; column names are shared by all rows.
fn into_rows(rows: Vec<MyRow>) -> VecDeque<Row> {
    let Some(first) = rows.first() else {
        return VecDeque::new();
    };
    let columns: Arc<[String]> = first
        .columns_ref()
        .iter()
        .map(|c| c.name_str().to_string())
        .collect::<Vec<_>>()
        .into();

    rows.into_iter()
        .map(|row| {
            let values = row.unwrap().into_iter().map(from_mysql_value).collect();
            Row::new(columns.clone(), values)
        })
        .collect()
}

pub struct MysqlConnection {
    conn: SharedConn,
    in_transaction: AtomicBool,
    last_error: LastError,
}

impl MysqlConnection {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            in_transaction: AtomicBool::new(false),
            last_error: LastError::default(),
        }
    }

    async fn query_drop(&self, sql: &str) -> Result<(), NativeError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;
        let result = conn.query_drop(sql).await.map_err(NativeError::from);
        self.last_error.record(result)
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn exec(&self, sql: &str) -> Result<u64, NativeError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;
        let result = conn.query_drop(sql).await.map_err(NativeError::from);
        self.last_error.record(result)?;
        Ok(conn.affected_rows())
    }

    async fn query(&self, sql: &str) -> Result<Box<dyn Statement>, NativeError> {
        let mut stmt = MysqlStatement {
            conn: self.conn.clone(),
            sql: sql.to_string(),
            prepared: None,
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
        let prepared = {
            let mut guard = self.conn.lock().await;
            let conn = guard.as_mut().ok_or_else(closed)?;
            let result = conn.prep(sql).await.map_err(NativeError::from);
            self.last_error.record(result)?
        };
        Ok(Box::new(MysqlStatement {
            conn: self.conn.clone(),
            sql: sql.to_string(),
            prepared: Some(prepared),
            rows: VecDeque::new(),
            row_count: 0,
        }))
    }

    fn quote(&self, value: &str, _hint: ParamType) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.get()
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<String, NativeError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(closed)?;
        // no insert yet reads as 0
        Ok(conn.last_insert_id().unwrap_or(0).to_string())
    }

    async fn begin(&self) -> Result<(), NativeError> {
        if self.in_transaction.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                "HY000",
                None,
                "There is already an active transaction",
            ));
        }
        self.query_drop("START TRANSACTION").await?;
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), NativeError> {
        self.query_drop("COMMIT").await?;
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), NativeError> {
        self.query_drop("ROLLBACK").await?;
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), NativeError> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        let result = conn.disconnect().await.map_err(NativeError::from);
        self.last_error.record(result)
    }
}

pub struct MysqlStatement {
    conn: SharedConn,
    sql: String,
    /// Server-side statement; `None` for text-protocol queries.
    prepared: Option<mysql_async::Statement>,
    rows: VecDeque<Row>,
    row_count: u64,
}

#[async_trait]
impl Statement for MysqlStatement {
    async fn execute(&mut self, params: &Params) -> Result<(), NativeError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed)?;

        let rows: Vec<MyRow> = match &self.prepared {
            Some(stmt) => conn.exec(stmt, to_params(params)).await?,
            None if params.is_empty() => conn.query(self.sql.as_str()).await?,
            None => conn.exec(self.sql.as_str(), to_params(params)).await?,
        };
        self.row_count = conn.affected_rows();
        self.rows = into_rows(rows);
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
