use std::fmt;

use thiserror::Error;

use crate::udbc::NativeError;

/// The SQLSTATE / driver code / driver message triple reported by a native
/// driver at the moment a call failed.
///
/// All fields are `None` when no native information exists, e.g. before a
/// connection has been opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub sqlstate: Option<String>,
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl ErrorInfo {
    pub fn new(
        sqlstate: impl Into<String>,
        code: Option<i64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sqlstate: Some(sqlstate.into()),
            code,
            message: Some(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sqlstate.is_none() && self.code.is_none() && self.message.is_none()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SQLSTATE[{}] {}: {}",
            self.sqlstate.as_deref().unwrap_or("-"),
            self.code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            self.message.as_deref().unwrap_or("")
        )
    }
}

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Every failure surfaced by the handler.
///
/// `QueryError` is a refinement of `ConnectionError`: both report a problem
/// talking to the database, see [`DbError::is_connection_error`].
#[derive(Error, Debug)]
pub enum DbError {
    /// Missing or invalid parameters, unsupported driver, invalid identifier.
    #[error("Configuration Error: {0}")]
    ConfigurationError(String),
    /// The native connection could not be opened.
    #[error("Connection Error: {0}")]
    ConnectionError(String),
    /// exec/query/prepare/execute/fetch failed.
    #[error("Query Error: {message} (query: {sql})")]
    QueryError {
        message: String,
        sql: String,
        info: ErrorInfo,
    },
    /// Misuse of a statement, such as iterating before `execute`.
    #[error("Statement Error: {0}")]
    StatementError(String),
}

impl DbError {
    pub(crate) fn query(message: impl fmt::Display, sql: &str, err: NativeError) -> Self {
        DbError::QueryError {
            message: format!("{}: {}", message, err),
            sql: sql.to_string(),
            info: err.info,
        }
    }

    /// True for failures that happened while talking to the database.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DbError::ConnectionError(_) | DbError::QueryError { .. }
        )
    }

    /// The SQL text that caused a `QueryError`.
    pub fn sql(&self) -> Option<&str> {
        match self {
            DbError::QueryError { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Native error details; empty for errors raised before any native call.
    pub fn error_info(&self) -> ErrorInfo {
        match self {
            DbError::QueryError { info, .. } => info.clone(),
            _ => ErrorInfo::default(),
        }
    }
}
