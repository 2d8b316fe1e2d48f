use serde::Deserialize;

use crate::Result;
use crate::error::DbError;
use crate::options::{Attribute, ConnectionOptions, OptionValue};
use crate::parameters::{
    DEFAULT_MYSQL_CHARSET, DEFAULT_OCI_CHARSET, DriverId, DriverParameters, DsnSegment,
    SqlServerFlavor,
};

const DEFAULT_HOST: &str = "localhost";

/// Connection settings as they appear in a configuration file.
///
/// ```json
/// {
///   "driver": "mysql",
///   "dbname": "shop",
///   "host": "db.internal",
///   "port": 3306,
///   "username": "app",
///   "password": "secret",
///   "timeout": 5
/// }
/// ```
///
/// For SQLite, `dbname` is the database file (or `:memory:`). `params` is an
/// ordered list of `[key, value]` pairs; when present, PostgreSQL, `sqlsrv`
/// and ODBC connections are built from those pairs alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub driver: Option<DriverId>,
    pub dbname: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    pub server: Option<String>,
    pub odbc_driver: Option<String>,
    pub username: String,
    pub password: String,
    pub charset: Option<String>,
    pub params: Vec<(String, String)>,
    pub timeout: Option<u64>,
    pub persistent: Option<bool>,
    pub init_command: Option<String>,
}

impl ConnectionConfig {
    /// Builds the parameters with the factory matching `driver`.
    ///
    /// # Errors
    /// `ConfigurationError` if `driver` or a field the backend needs is missing,
    /// or a MySQL socket does not exist.
    pub fn into_parameters(self) -> Result<DriverParameters> {
        let driver = self
            .driver
            .ok_or_else(|| DbError::ConfigurationError("missing `driver`".to_string()))?;
        let user = self.username.clone();
        let pass = self.password.clone();

        let params = match driver {
            DriverId::MySql => {
                let dbname = self.require_dbname(driver)?;
                let charset = self
                    .charset
                    .unwrap_or_else(|| DEFAULT_MYSQL_CHARSET.to_string());
                match self.socket {
                    Some(socket) => {
                        DriverParameters::mysql_via_socket(dbname, user, pass, socket, charset)?
                    }
                    None => DriverParameters::mysql_via_host(
                        dbname,
                        user,
                        pass,
                        self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                        self.port,
                        charset,
                    ),
                }
            }
            DriverId::PgSql if !self.params.is_empty() => {
                DriverParameters::pgsql_custom(user, pass, self.params)
            }
            DriverId::PgSql => {
                let dbname = self.require_dbname(driver)?;
                DriverParameters::pgsql_via_host(
                    dbname,
                    user,
                    pass,
                    self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                    self.port,
                )
            }
            DriverId::SqlSrv if !self.params.is_empty() => {
                DriverParameters::sqlsrv_custom(user, pass, self.params)
            }
            DriverId::SqlSrv => {
                let dbname = self.require_dbname(driver)?;
                let server = self.server.or(self.host).ok_or_else(|| missing("server", driver))?;
                DriverParameters::sqlsrv_via_host(dbname, user, pass, server, self.port)
            }
            DriverId::MsSql | DriverId::Sybase | DriverId::DbLib => {
                let flavor = match driver {
                    DriverId::MsSql => SqlServerFlavor::Official,
                    DriverId::Sybase => SqlServerFlavor::Sybase,
                    _ => SqlServerFlavor::FreeTds,
                };
                let dbname = self.require_dbname(driver)?;
                DriverParameters::sql_server_via_host(
                    flavor,
                    dbname,
                    user,
                    pass,
                    self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                    self.port,
                )
            }
            DriverId::Oci => {
                let dbname = self.require_dbname(driver)?;
                DriverParameters::oci_via_host(
                    dbname,
                    user,
                    pass,
                    self.host,
                    self.port,
                    self.charset
                        .unwrap_or_else(|| DEFAULT_OCI_CHARSET.to_string()),
                )
            }
            DriverId::Odbc if !self.params.is_empty() => {
                let segments = self
                    .params
                    .into_iter()
                    .map(|(k, v)| DsnSegment::pair(k, v))
                    .collect();
                DriverParameters::odbc_custom(user, pass, segments)
            }
            DriverId::Odbc => {
                let dbname = self.require_dbname(driver)?;
                match self.server {
                    Some(server) => {
                        DriverParameters::odbc_via_host(dbname, user, pass, server, self.odbc_driver)
                    }
                    None => DriverParameters::odbc_cataloged(dbname, user, pass),
                }
            }
            DriverId::Sqlite => {
                let path = self.require_dbname(driver)?;
                DriverParameters::sqlite(path, user, pass)
            }
        };
        Ok(params)
    }

    /// Connection attributes for the fields that map onto one.
    ///
    /// # Errors
    /// `ConfigurationError` if `timeout` does not fit an attribute value.
    pub fn options(&self) -> Result<ConnectionOptions> {
        let mut options = ConnectionOptions::new();
        if let Some(secs) = self.timeout {
            let secs = i64::try_from(secs).map_err(|_| {
                DbError::ConfigurationError(format!("timeout out of range: {}", secs))
            })?;
            options.set(Attribute::Timeout, OptionValue::Int(secs));
        }
        if let Some(persistent) = self.persistent {
            options.set(Attribute::Persistent, OptionValue::Bool(persistent));
        }
        if let Some(sql) = &self.init_command {
            options.set(Attribute::InitCommand, OptionValue::Str(sql.clone()));
        }
        Ok(options)
    }

    fn require_dbname(&self, driver: DriverId) -> Result<String> {
        self.dbname
            .clone()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| missing("dbname", driver))
    }
}

fn missing(field: &str, driver: DriverId) -> DbError {
    DbError::ConfigurationError(format!("missing `{}` for {} connection", field, driver))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ConnectionConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_mysql_defaults() {
        let p = parse(r#"{"driver": "mysql", "dbname": "shop", "username": "app"}"#)
            .into_parameters()
            .unwrap();
        assert_eq!(
            p.connection_string(),
            "mysql:dbname=shop;host=localhost;charset=utf8"
        );
        assert_eq!(p.username(), "app");
    }

    #[test]
    fn test_pgsql_custom_pairs_keep_order() {
        let p = parse(
            r#"{"driver": "pgsql", "params": [["host", "db"], ["sslmode", "require"], ["dbname", "x"]]}"#,
        )
        .into_parameters()
        .unwrap();
        assert_eq!(p.connection_string(), "pgsql:host=db;sslmode=require;dbname=x");
    }

    #[test]
    fn test_sybase_flavor_from_driver() {
        let p = parse(r#"{"driver": "sybase", "dbname": "legacy", "host": "syb", "port": 5000}"#)
            .into_parameters()
            .unwrap();
        assert_eq!(p.connection_string(), "sybase:host=syb:5000;dbname=legacy");
    }

    #[test]
    fn test_odbc_without_server_is_cataloged() {
        let p = parse(r#"{"driver": "odbc", "dbname": "SAMPLE"}"#)
            .into_parameters()
            .unwrap();
        assert_eq!(p.connection_string(), "odbc:SAMPLE");
    }

    #[test]
    fn test_missing_fields() {
        let err = parse(r#"{"dbname": "x"}"#).into_parameters().unwrap_err();
        assert!(matches!(err, DbError::ConfigurationError(_)));

        let err = parse(r#"{"driver": "sqlsrv", "dbname": "x"}"#)
            .into_parameters()
            .unwrap_err();
        assert!(err.to_string().contains("server"));
    }

    #[test]
    fn test_options() {
        let config = parse(
            r#"{"driver": "sqlite", "dbname": ":memory:", "timeout": 3, "init_command": "PRAGMA cache_size = 100"}"#,
        );
        let options = config.options().unwrap();
        assert_eq!(options.timeout_secs(), Some(3));
        assert_eq!(options.init_command(), Some("PRAGMA cache_size = 100"));
        assert_eq!(options.get(&Attribute::Persistent), None);
    }

    #[test]
    fn test_oversized_timeout_is_rejected() {
        let config = parse(r#"{"driver": "sqlite", "dbname": ":memory:", "timeout": 18446744073709551615}"#);
        let err = config.options().unwrap_err();
        assert!(matches!(err, DbError::ConfigurationError(_)));
    }
}
