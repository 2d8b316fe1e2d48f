use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::Result;
use crate::error::{DbError, ErrorInfo};
use crate::options::{ConnectionOptions, ParamType};
use crate::parameters::DriverParameters;
use crate::statement::{self, StatementHandle};
use crate::udbc::connection::Connection;
use crate::udbc::driver::{Driver, DriverTable};
use crate::udbc::value::Value;

const LIVENESS_QUERY: &str = "SELECT 1+1";

/// One named database connection.
///
/// The handle exclusively owns its native connection. A reconnect replaces
/// that connection wholesale; the old one is dropped, never reused.
pub struct ConnectionHandle {
    name: String,
    parameters: DriverParameters,
    options: ConnectionOptions,
    driver: Arc<dyn Driver>,
    native: RwLock<Arc<dyn Connection>>,
    /// Serializes liveness checks and reconnects of this handle.
    reconnect: Mutex<()>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    /// Validates the parameters, resolves the native driver and connects.
    ///
    /// The error-reporting mode and the default fetch shape in `options` are
    /// always overridden.
    ///
    /// # Errors
    /// - `ConfigurationError` for missing parameters or an unavailable driver
    /// - `ConnectionError` if the native connection cannot be opened
    pub async fn open(
        name: impl Into<String>,
        parameters: DriverParameters,
        options: ConnectionOptions,
        drivers: &DriverTable,
    ) -> Result<Self> {
        parameters.validate()?;
        let driver = drivers.resolve(parameters.driver())?;
        let options = options.pinned();
        let name = name.into();
        let native = Self::open_native(&name, driver.as_ref(), &parameters, &options).await?;
        Ok(Self {
            name,
            parameters,
            options,
            driver,
            native: RwLock::new(native),
            reconnect: Mutex::new(()),
        })
    }

    async fn open_native(
        name: &str,
        driver: &dyn Driver,
        parameters: &DriverParameters,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn Connection>> {
        log::debug!("[{}] connecting to '{}'", name, parameters.connection_string());
        driver
            .open(
                parameters.connection_string(),
                parameters.username(),
                parameters.password(),
                options,
            )
            .await
            .map_err(|e| {
                DbError::ConnectionError(format!(
                    "[{}] Failed to initialize database connection. Message: {}",
                    name, e
                ))
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &DriverParameters {
        &self.parameters
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn native(&self) -> Arc<dyn Connection> {
        self.native
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Opens a fresh native connection with the stored parameters and
    /// options and replaces the current one.
    ///
    /// # Errors
    /// `ConnectionError` if the native connection cannot be opened; the
    /// current connection is kept in that case.
    pub async fn connect(&self) -> Result<()> {
        let fresh = Self::open_native(
            &self.name,
            self.driver.as_ref(),
            &self.parameters,
            &self.options,
        )
        .await?;
        let old = {
            let mut slot = self.native.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, fresh)
        };
        drop(old);
        Ok(())
    }

    /// Runs `SELECT 1+1` and reports whether it answered 2.
    ///
    /// Drivers give no portable way to tell a timed out connection from
    /// other failures, so any error or unexpected value counts as dead.
    pub async fn check_liveness(&self) -> bool {
        let native = self.native();
        let sum = match native.query(LIVENESS_QUERY).await {
            Ok(mut cursor) => match cursor.fetch().await {
                Ok(Some(row)) => row.get_index(0).and_then(Value::as_i64),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("[{}] liveness check failed: {}", self.name, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("[{}] liveness check failed: {}", self.name, e);
                None
            }
        };
        sum == Some(2)
    }

    /// Checks liveness and reconnects in place when the connection is dead.
    pub(crate) async fn ensure_live(&self) -> Result<()> {
        let _guard = self.reconnect.lock().await;
        if self.check_liveness().await {
            return Ok(());
        }
        log::debug!("[{}] connection lost, reconnecting", self.name);
        self.connect().await
    }

    /// Executes `sql` and returns the number of affected rows.
    ///
    /// # Errors
    /// `QueryError` carrying `sql` and the native error info.
    pub async fn exec(&self, sql: &str) -> Result<u64> {
        self.native()
            .exec(sql)
            .await
            .map_err(|e| DbError::query("Failed to exec()", sql, e))
    }

    /// Executes `sql` and returns an executed statement over its result set.
    ///
    /// # Errors
    /// `QueryError` carrying `sql` and the native error info.
    pub async fn query(&self, sql: &str) -> Result<StatementHandle> {
        let native = self.native();
        let cursor = native
            .query(sql)
            .await
            .map_err(|e| DbError::query("Failed to query()", sql, e))?;
        Ok(StatementHandle::executed(native, cursor, sql, self.options.fetch_mode()).await)
    }

    /// Prepares `sql` on the current native connection.
    ///
    /// # Arguments
    /// * `sql` - The SQL text, with `?` or `:name` placeholders
    /// * `driver_options` - Statement attributes passed to the native driver
    pub async fn prepare(
        &self,
        sql: &str,
        driver_options: &ConnectionOptions,
    ) -> Result<StatementHandle> {
        let native = self.native();
        let stmt = native
            .prepare(sql, driver_options)
            .await
            .map_err(|e| DbError::query("Failed to prepare()", sql, e))?;
        Ok(StatementHandle::new(native, stmt, sql, self.options.fetch_mode()))
    }

    /// Switches to database `name` with `USE`.
    ///
    /// Only whitespace is rejected; identifier quoting is left to the backend.
    pub async fn use_database(&self, name: &str) -> Result<&Self> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DbError::ConfigurationError(format!(
                "Invalid database name specified, no whitespace allowed: {:?}",
                name
            )));
        }
        self.exec(&format!("USE {}", name)).await?;
        Ok(self)
    }

    /// Quotes a literal for SQL text. `None` becomes `NULL`.
    ///
    /// Prepared statements are the safe path; this is a fallback.
    pub fn quote(&self, value: Option<&str>, hint: ParamType) -> String {
        match value {
            None => "NULL".to_string(),
            Some(v) => self.native().quote(v, hint),
        }
    }

    /// Runs `SELECT FOUND_ROWS()`. Meaningful only right after a statement
    /// using `SQL_CALC_FOUND_ROWS`; any failure reads as 0.
    pub async fn found_rows(&self) -> u64 {
        statement::read_found_rows(self.native().as_ref()).await
    }

    /// The last inserted id, or the current value of `sequence`.
    pub async fn last_insert_id(&self, sequence: Option<&str>) -> Result<String> {
        self.native()
            .last_insert_id(sequence)
            .await
            .map_err(|e| DbError::query("Failed to read last insert id", "", e))
    }

    /// The last failure of this connection, not of its statements.
    pub fn error_info(&self) -> ErrorInfo {
        self.native().error_info()
    }

    pub async fn begin_transaction(&self) -> Result<&Self> {
        self.native()
            .begin()
            .await
            .map_err(|e| DbError::query("Failed to begin transaction", "BEGIN", e))?;
        Ok(self)
    }

    pub async fn commit(&self) -> Result<&Self> {
        self.native()
            .commit()
            .await
            .map_err(|e| DbError::query("Failed to commit", "COMMIT", e))?;
        Ok(self)
    }

    pub async fn roll_back(&self) -> Result<&Self> {
        self.native()
            .rollback()
            .await
            .map_err(|e| DbError::query("Failed to roll back", "ROLLBACK", e))?;
        Ok(self)
    }

    pub async fn in_transaction(&self) -> bool {
        self.native().in_transaction().await
    }

    /// Releases the native connection. The handle is unusable afterwards.
    pub async fn close(&self) -> Result<()> {
        log::debug!("[{}] closing connection", self.name);
        self.native().close().await.map_err(|e| {
            DbError::ConnectionError(format!("[{}] Failed to close connection: {}", self.name, e))
        })
    }
}
