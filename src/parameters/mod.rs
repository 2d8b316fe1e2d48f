//! Per-backend connection parameters and connection-string (DSN) assembly.
//!
//! Every factory returns an immutable [`DriverParameters`] whose connection
//! string is fully formed at construction time:
//!
//! ```
//! use udbh::parameters::DriverParameters;
//!
//! let params = DriverParameters::mysql_via_host("test", "user", "pass", "localhost", Some(3306), "utf8");
//! assert_eq!(params.connection_string(), "mysql:dbname=test;host=localhost;port=3306;charset=utf8");
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;
use crate::error::DbError;

mod backend;
pub mod dsn;

pub use backend::{Backend, Endpoint, OdbcSource, SqlServerFlavor};
pub use dsn::{DsnSegment, build_dsn};

pub const DEFAULT_MYSQL_CHARSET: &str = "utf8";
pub const DEFAULT_OCI_CHARSET: &str = "UTF8";

const AZURE_DOMAIN: &str = ".database.windows.net";

/// Native driver ids, spelled the way they prefix a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum DriverId {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "pgsql")]
    PgSql,
    #[serde(rename = "sqlsrv")]
    SqlSrv,
    #[serde(rename = "mssql")]
    MsSql,
    #[serde(rename = "sybase")]
    Sybase,
    #[serde(rename = "dblib")]
    DbLib,
    #[serde(rename = "oci")]
    Oci,
    #[serde(rename = "odbc")]
    Odbc,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl DriverId {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverId::MySql => "mysql",
            DriverId::PgSql => "pgsql",
            DriverId::SqlSrv => "sqlsrv",
            DriverId::MsSql => "mssql",
            DriverId::Sybase => "sybase",
            DriverId::DbLib => "dblib",
            DriverId::Oci => "oci",
            DriverId::Odbc => "odbc",
            DriverId::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to reach one database: backend fields, the assembled connection
/// string and the credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct DriverParameters {
    backend: Backend,
    connection_string: String,
    username: String,
    password: String,
}

impl fmt::Debug for DriverParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverParameters")
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl DriverParameters {
    /// Builds parameters from any backend description.
    pub fn new(backend: Backend, username: impl Into<String>, password: impl Into<String>) -> Self {
        let connection_string = format!("{}:{}", backend.driver(), build_dsn(&backend.segments()));
        Self {
            backend,
            connection_string,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn mysql_via_host(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        charset: impl Into<String>,
    ) -> Self {
        Self::new(
            Backend::MySql {
                dbname: dbname.into(),
                endpoint: Endpoint::Host {
                    host: host.into(),
                    port,
                },
                charset: charset.into(),
            },
            username,
            password,
        )
    }

    /// # Errors
    /// `ConfigurationError` if `socket` does not exist.
    pub fn mysql_via_socket(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        socket: impl Into<PathBuf>,
        charset: impl Into<String>,
    ) -> Result<Self> {
        let socket = socket.into();
        if !socket.exists() {
            return Err(DbError::ConfigurationError(format!(
                "Invalid connection socket provided: {}",
                socket.display()
            )));
        }
        Ok(Self::new(
            Backend::MySql {
                dbname: dbname.into(),
                endpoint: Endpoint::Socket(socket),
                charset: charset.into(),
            },
            username,
            password,
        ))
    }

    pub fn pgsql_via_host(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
    ) -> Self {
        Self::new(
            Backend::PostgreSql {
                dbname: dbname.into(),
                host: host.into(),
                port,
            },
            username,
            password,
        )
    }

    /// Any libpq keywords, emitted in the given order.
    pub fn pgsql_custom<K, V>(
        username: impl Into<String>,
        password: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        Self::custom(DriverId::PgSql, username, password, pairs)
    }

    /// Microsoft SQL Server and Azure through the `sqlsrv` driver.
    ///
    /// Azure servers are named `XXXX.database.windows.net` and expect the
    /// username as `user@XXXX`; the tenant is appended when missing.
    pub fn sqlsrv_via_host(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
        port: Option<u16>,
    ) -> Self {
        let server = server.into();
        let mut username = username.into();
        if let Some(idx) = server.to_ascii_lowercase().find(AZURE_DOMAIN)
            && idx > 0
        {
            let tenant = format!("@{}", &server[..idx]);
            if !username.contains(&tenant) {
                username.push_str(&tenant);
            }
        }
        Self::new(
            Backend::SqlSrv {
                dbname: dbname.into(),
                server,
                port,
            },
            username,
            password,
        )
    }

    pub fn sqlsrv_custom<K, V>(
        username: impl Into<String>,
        password: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        Self::custom(DriverId::SqlSrv, username, password, pairs)
    }

    /// SQL Server through the official (`mssql`), Sybase or FreeTDS libraries.
    pub fn sql_server_via_host(
        flavor: SqlServerFlavor,
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
    ) -> Self {
        Self::new(
            Backend::SqlServer {
                flavor,
                dbname: dbname.into(),
                host: host.into(),
                port,
            },
            username,
            password,
        )
    }

    /// Oracle. Without a host, `dbname` names an entry of `tnsnames.ora`.
    pub fn oci_via_host(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: Option<String>,
        port: Option<u16>,
        charset: impl Into<String>,
    ) -> Self {
        Self::new(
            Backend::Oracle {
                dbname: dbname.into(),
                host,
                port,
                charset: charset.into(),
            },
            username,
            password,
        )
    }

    pub fn odbc_cataloged(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(
            Backend::Odbc(OdbcSource::Cataloged(dbname.into())),
            username,
            password,
        )
    }

    pub fn odbc_via_host(
        dbname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
        driver: Option<String>,
    ) -> Self {
        Self::new(
            Backend::Odbc(OdbcSource::Host {
                dbname: dbname.into(),
                server: server.into(),
                driver,
            }),
            username,
            password,
        )
    }

    /// Any ODBC connection-string segments, keyed or bare.
    pub fn odbc_custom(
        username: impl Into<String>,
        password: impl Into<String>,
        segments: Vec<DsnSegment>,
    ) -> Self {
        Self::new(
            Backend::Custom {
                driver: DriverId::Odbc,
                segments,
            },
            username,
            password,
        )
    }

    /// SQLite. `path` is `:memory:` or a database file whose directory must
    /// be writable (SQLite keeps journal files next to it).
    pub fn sqlite(
        path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(Backend::Sqlite { path: path.into() }, username, password)
    }

    fn custom<K, V>(
        driver: DriverId,
        username: impl Into<String>,
        password: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        let segments = pairs
            .into_iter()
            .map(|(k, v)| DsnSegment::pair(k, v))
            .collect();
        Self::new(Backend::Custom { driver, segments }, username, password)
    }

    pub fn driver(&self) -> DriverId {
        self.backend.driver()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// # Errors
    /// `ConfigurationError` naming the first missing required field.
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()
    }
}
