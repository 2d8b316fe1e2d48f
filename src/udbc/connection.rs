use crate::error::ErrorInfo;
use crate::options::{ConnectionOptions, ParamType};
use crate::udbc::NativeError;
use crate::udbc::value::{Params, Row};
use async_trait::async_trait;

/// An open native database connection.
///
/// Implementations are shared between a handle and the statements prepared
/// on it, so every method takes `&self` and locks internally.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a statement and return the number of affected rows.
    async fn exec(&self, sql: &str) -> Result<u64, NativeError>;

    /// Execute a statement and return a cursor over its result set.
    async fn query(&self, sql: &str) -> Result<Box<dyn Statement>, NativeError>;

    /// Prepare a statement for later execution.
    ///
    /// # Arguments
    /// * `sql` - The SQL text, with `?` or `:name` placeholders
    /// * `options` - Driver specific statement attributes
    async fn prepare(
        &self,
        sql: &str,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn Statement>, NativeError>;

    /// Quote a string literal for inclusion in SQL text.
    fn quote(&self, value: &str, hint: ParamType) -> String;

    /// Details of the last failure on this connection (not its statements).
    fn error_info(&self) -> ErrorInfo;

    /// Get the ID of the last inserted row, or the current value of `sequence`.
    async fn last_insert_id(&self, sequence: Option<&str>) -> Result<String, NativeError>;

    // ---------- transaction ----------
    /// Begin a transaction
    async fn begin(&self) -> Result<(), NativeError>;
    /// Commit the current transaction
    async fn commit(&self) -> Result<(), NativeError>;
    /// Rollback the current transaction
    async fn rollback(&self) -> Result<(), NativeError>;
    /// Whether a transaction is currently open
    async fn in_transaction(&self) -> bool;

    /// Release the native connection. Later calls fail.
    async fn close(&self) -> Result<(), NativeError>;
}

/// A prepared statement, or the cursor of an already executed query.
#[async_trait]
pub trait Statement: Send {
    /// Bind `params` and execute. Any previous result set is discarded.
    async fn execute(&mut self, params: &Params) -> Result<(), NativeError>;

    /// Next row of the current result set, `None` once exhausted.
    async fn fetch(&mut self) -> Result<Option<Row>, NativeError>;

    /// All remaining rows of the current result set.
    async fn fetch_all(&mut self) -> Result<Vec<Row>, NativeError> {
        let mut out = Vec::new();
        while let Some(row) = self.fetch().await? {
            out.push(row);
        }
        Ok(out)
    }

    /// Rows inserted/updated/deleted by the last execution.
    fn row_count(&self) -> u64;
}
