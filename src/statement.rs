use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::Result;
use crate::error::DbError;
use crate::options::FetchMode;
use crate::udbc::NativeError;
use crate::udbc::connection::{Connection, Statement};
use crate::udbc::value::{Params, Row, Value};

pub(crate) const FOUND_ROWS_MODIFIER: &str = "SQL_CALC_FOUND_ROWS";
pub(crate) const FOUND_ROWS_QUERY: &str = "SELECT FOUND_ROWS()";

/// A fetched row in the requested [`FetchMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Assoc(HashMap<String, Value>),
    Num(Vec<Value>),
    Column(Value),
}

impl Record {
    fn shape(row: Row, mode: FetchMode, sql: &str) -> Result<Self> {
        Ok(match mode {
            FetchMode::Assoc => Record::Assoc(row.into_map()),
            FetchMode::Num => Record::Num(row.into_values()),
            FetchMode::Column(i) => Record::Column(take_column(row, i, sql)?),
        })
    }

    pub fn into_assoc(self) -> Option<HashMap<String, Value>> {
        match self {
            Record::Assoc(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_num(self) -> Option<Vec<Value>> {
        match self {
            Record::Num(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Record::Column(v) => Some(v),
            _ => None,
        }
    }
}

/// A prepared statement bound to the native connection it was prepared on.
///
/// The handle keeps only a shared reference to that connection: after the
/// owning [`ConnectionHandle`](crate::handle::ConnectionHandle) reconnects,
/// statements prepared before keep talking to the old connection.
pub struct StatementHandle {
    connection: Arc<dyn Connection>,
    statement: Box<dyn Statement>,
    sql: String,
    is_calc_found_rows: bool,
    executed: bool,
    found_rows: u64,
    fetch_mode: FetchMode,
}

impl std::fmt::Debug for StatementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementHandle")
            .field("sql", &self.sql)
            .field("executed", &self.executed)
            .field("found_rows", &self.found_rows)
            .finish_non_exhaustive()
    }
}

impl StatementHandle {
    pub(crate) fn new(
        connection: Arc<dyn Connection>,
        statement: Box<dyn Statement>,
        sql: &str,
        fetch_mode: FetchMode,
    ) -> Self {
        Self {
            connection,
            statement,
            sql: sql.to_string(),
            is_calc_found_rows: sql.to_ascii_uppercase().contains(FOUND_ROWS_MODIFIER),
            executed: false,
            found_rows: 0,
            fetch_mode,
        }
    }

    /// Wraps the cursor of a query that already ran.
    pub(crate) async fn executed(
        connection: Arc<dyn Connection>,
        statement: Box<dyn Statement>,
        sql: &str,
        fetch_mode: FetchMode,
    ) -> Self {
        let mut stmt = Self::new(connection, statement, sql, fetch_mode);
        stmt.after_execute().await;
        stmt
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Binds `params` and executes the statement.
    ///
    /// When the SQL carries `SQL_CALC_FOUND_ROWS`, the total row count is
    /// read right away and cached for [`found_rows`](Self::found_rows).
    ///
    /// # Errors
    /// `QueryError` carrying the SQL text if execution fails.
    pub async fn execute(&mut self, params: &Params) -> Result<&mut Self> {
        self.statement.execute(params).await.map_err(|e| {
            DbError::query("Failed to execute prepared statement", &self.sql, e)
        })?;
        self.after_execute().await;
        Ok(self)
    }

    async fn after_execute(&mut self) {
        self.executed = true;
        if self.is_calc_found_rows {
            self.found_rows = read_found_rows(self.connection.as_ref()).await;
        }
    }

    /// Next row, `None` once the result set is exhausted.
    pub async fn fetch_row(&mut self, mode: FetchMode) -> Result<Option<Record>> {
        self.next_row()
            .await?
            .map(|r| Record::shape(r, mode, &self.sql))
            .transpose()
    }

    /// Next row in the connection's default fetch mode.
    pub async fn fetch(&mut self) -> Result<Option<Record>> {
        self.fetch_row(self.fetch_mode).await
    }

    /// A single column of the next row, `None` once the result set is exhausted.
    ///
    /// # Errors
    /// `QueryError` if the row has no column `index`.
    pub async fn fetch_column(&mut self, index: usize) -> Result<Option<Value>> {
        self.next_row()
            .await?
            .map(|r| take_column(r, index, &self.sql))
            .transpose()
    }

    /// All remaining rows.
    pub async fn fetch_all_rows(&mut self, mode: FetchMode) -> Result<Vec<Record>> {
        let rows = self
            .statement
            .fetch_all()
            .await
            .map_err(|e| DbError::query("Failed to fetch rows", &self.sql, e))?;
        rows.into_iter()
            .map(|r| Record::shape(r, mode, &self.sql))
            .collect()
    }

    /// One column of all remaining rows.
    pub async fn fetch_all_rows_of_column(&mut self, index: usize) -> Result<Vec<Value>> {
        let records = self.fetch_all_rows(FetchMode::Column(index)).await?;
        Ok(records.into_iter().filter_map(Record::into_value).collect())
    }

    /// Calls `callback(row, index)` for each remaining row until it returns
    /// `ControlFlow::Break`.
    ///
    /// # Errors
    /// `StatementError` if the statement has not been executed.
    pub async fn for_each_row<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(HashMap<String, Value>, usize) -> ControlFlow<()>,
    {
        self.ensure_executed()?;
        let mut index = 0;
        while let Some(row) = self.next_row().await? {
            if callback(row.into_map(), index).is_break() {
                break;
            }
            index += 1;
        }
        Ok(())
    }

    /// Applies `callback(row, index)` to each remaining row, in result-set order.
    ///
    /// # Errors
    /// `StatementError` if the statement has not been executed.
    pub async fn map<T, F>(&mut self, mut callback: F) -> Result<Vec<T>>
    where
        F: FnMut(HashMap<String, Value>, usize) -> T,
    {
        self.ensure_executed()?;
        let mut out = Vec::new();
        let mut index = 0;
        while let Some(row) = self.next_row().await? {
            out.push(callback(row.into_map(), index));
            index += 1;
        }
        Ok(out)
    }

    /// Rows matched by the last execution ignoring `LIMIT`. 0 unless executed
    /// SQL used `SQL_CALC_FOUND_ROWS`.
    pub fn found_rows(&self) -> u64 {
        self.found_rows
    }

    /// Rows inserted/updated/deleted by the last execution, 0 before it.
    pub fn affected_row_count(&self) -> u64 {
        if self.executed {
            self.statement.row_count()
        } else {
            0
        }
    }

    /// The last inserted id on the statement's connection, `"0"` before execution.
    pub async fn last_insert_id(&self) -> Result<String> {
        if !self.executed {
            return Ok("0".to_string());
        }
        self.connection
            .last_insert_id(None)
            .await
            .map_err(|e| DbError::query("Failed to read last insert id", &self.sql, e))
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        self.statement
            .fetch()
            .await
            .map_err(|e| DbError::query("Failed to fetch row", &self.sql, e))
    }

    fn ensure_executed(&self) -> Result<()> {
        if self.executed {
            Ok(())
        } else {
            Err(DbError::StatementError(
                "Cannot iterate over rows if statement is not executed".to_string(),
            ))
        }
    }
}

fn take_column(row: Row, index: usize, sql: &str) -> Result<Value> {
    let width = row.len();
    row.into_column(index).ok_or_else(|| {
        DbError::query(
            "Failed to fetch column",
            sql,
            NativeError::new(
                "HY000",
                None,
                format!("Invalid column index {} (row has {} columns)", index, width),
            ),
        )
    })
}

/// Best effort `SELECT FOUND_ROWS()`; any failure reads as 0.
pub(crate) async fn read_found_rows(connection: &dyn Connection) -> u64 {
    let Ok(mut cursor) = connection.query(FOUND_ROWS_QUERY).await else {
        return 0;
    };
    match cursor.fetch().await {
        Ok(Some(row)) => row
            .get_index(0)
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        _ => 0,
    }
}
