use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::options::ConnectionOptions;
use crate::parameters::DriverId;
use crate::udbc::NativeError;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc::sqlite::connection::SqliteConnection;

const MEMORY: &str = ":memory:";

enum SqliteTarget {
    Memory,
    Path(String),
}

/// Opens SQLite databases from `sqlite:<path>` or `sqlite::memory:`.
///
/// Credentials are ignored. Every `:memory:` connection is a fresh, empty
/// database, so a reconnect loses its content.
pub struct SqliteDriver;

impl SqliteDriver {
    fn parse_target(dsn: &str) -> Result<SqliteTarget, NativeError> {
        let trimmed = dsn.trim();
        let stripped = trimmed
            .strip_prefix("sqlite:")
            .unwrap_or(trimmed)
            .trim();

        if stripped.is_empty() {
            return Err(NativeError::message(format!(
                "invalid data source name: {}",
                dsn
            )));
        }

        if stripped == MEMORY {
            return Ok(SqliteTarget::Memory);
        }

        Ok(SqliteTarget::Path(stripped.to_string()))
    }

    fn open_connection(
        target: &SqliteTarget,
        timeout_secs: Option<u64>,
        init_command: Option<&str>,
    ) -> Result<rusqlite::Connection, NativeError> {
        let conn = match target {
            SqliteTarget::Memory => rusqlite::Connection::open_in_memory()?,
            SqliteTarget::Path(p) => rusqlite::Connection::open(p)?,
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if let Some(secs) = timeout_secs {
            conn.busy_timeout(Duration::from_secs(secs))?;
        }

        if let Some(sql) = init_command {
            conn.execute_batch(sql)?;
        }

        Ok(conn)
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn id(&self) -> DriverId {
        DriverId::Sqlite
    }

    async fn open(
        &self,
        dsn: &str,
        _username: &str,
        _password: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, NativeError> {
        let target = Self::parse_target(dsn)?;
        let timeout_secs = options.timeout_secs();
        let init_command = options.init_command().map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let conn = Self::open_connection(&target, timeout_secs, init_command.as_deref())?;
            Ok::<_, NativeError>(Arc::new(SqliteConnection::new(conn)) as Arc<dyn Connection>)
        })
        .await
        .map_err(|e| NativeError::message(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Attribute, OptionValue};
    use crate::udbc::value::{Params, Value};

    #[tokio::test]
    async fn test_sqlite_driver_in_memory() {
        let conn = SqliteDriver
            .open("sqlite::memory:", "", "", &ConnectionOptions::new())
            .await
            .unwrap();

        conn.exec("CREATE TABLE user (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)")
            .await
            .unwrap();

        let mut stmt = conn
            .prepare("INSERT INTO user(name) VALUES (?)", &ConnectionOptions::new())
            .await
            .unwrap();
        stmt.execute(&Params::positional(["alice"])).await.unwrap();
        assert_eq!(stmt.row_count(), 1);

        let id = conn.last_insert_id(None).await.unwrap();
        assert_eq!(id, "1");

        let mut stmt = conn
            .prepare("SELECT id, name FROM user WHERE id = :id", &ConnectionOptions::new())
            .await
            .unwrap();
        stmt.execute(&Params::named([("id", 1)])).await.unwrap();
        let rows = stmt.fetch_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Str("alice".to_string())));
    }

    #[tokio::test]
    async fn test_init_command_runs_on_open() {
        let options = ConnectionOptions::new().with(
            Attribute::InitCommand,
            OptionValue::Str("CREATE TABLE boot (x INTEGER)".to_string()),
        );
        let conn = SqliteDriver
            .open("sqlite::memory:", "", "", &options)
            .await
            .unwrap();
        assert_eq!(conn.exec("INSERT INTO boot VALUES (1)").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_dsn_is_rejected() {
        let err = SqliteDriver
            .open("sqlite:", "", "", &ConnectionOptions::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("invalid data source name"));
    }
}
