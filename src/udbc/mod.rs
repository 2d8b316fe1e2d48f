use std::fmt;
use std::sync::Mutex;

use crate::error::ErrorInfo;

pub mod value;

pub mod connection;
pub mod driver;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(test)]
pub(crate) mod stub;

/// A failure reported by the native client library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeError {
    pub info: ErrorInfo,
}

impl NativeError {
    pub fn new(sqlstate: impl Into<String>, code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            info: ErrorInfo::new(sqlstate, code, message),
        }
    }

    /// A failure with only a message, e.g. an I/O error before any server reply.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            info: ErrorInfo {
                message: Some(message.into()),
                ..ErrorInfo::default()
            },
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.info.sqlstate, &self.info.code) {
            (None, None) => f.write_str(self.info.message.as_deref().unwrap_or("unknown error")),
            _ => self.info.fmt(f),
        }
    }
}

impl std::error::Error for NativeError {}

/// Remembers the last native failure of a connection for `error_info()`.
#[derive(Debug, Default)]
pub(crate) struct LastError(Mutex<ErrorInfo>);

impl LastError {
    pub(crate) fn record<T>(&self, result: Result<T, NativeError>) -> Result<T, NativeError> {
        if let Err(e) = &result {
            let mut slot = self.0.lock().unwrap_or_else(|p| p.into_inner());
            *slot = e.info.clone();
        }
        result
    }

    pub(crate) fn get(&self) -> ErrorInfo {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
