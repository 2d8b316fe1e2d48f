use std::path::PathBuf;

use crate::error::DbError;
use crate::parameters::DriverId;
use crate::parameters::dsn::DsnSegment;

/// Where a MySQL server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Host { host: String, port: Option<u16> },
    Socket(PathBuf),
}

/// SQL Server client libraries that take `host`/`dbname` keys and glue the
/// port onto the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlServerFlavor {
    /// Official Microsoft libraries (`mssql`).
    Official,
    /// Sybase libraries (`sybase`).
    Sybase,
    /// FreeTDS libraries (`dblib`).
    FreeTds,
}

impl SqlServerFlavor {
    pub fn driver(self) -> DriverId {
        match self {
            SqlServerFlavor::Official => DriverId::MsSql,
            SqlServerFlavor::Sybase => DriverId::Sybase,
            SqlServerFlavor::FreeTds => DriverId::DbLib,
        }
    }

    pub fn port_separator(self) -> char {
        match self {
            SqlServerFlavor::Official => ',',
            SqlServerFlavor::Sybase | SqlServerFlavor::FreeTds => ':',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OdbcSource {
    /// A database cataloged in the ODBC driver manager or the DB2 catalog.
    Cataloged(String),
    Host {
        dbname: String,
        server: String,
        driver: Option<String>,
    },
}

/// The structured fields of each supported backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    MySql {
        dbname: String,
        endpoint: Endpoint,
        charset: String,
    },
    PostgreSql {
        dbname: String,
        host: String,
        port: Option<u16>,
    },
    /// Microsoft `sqlsrv` driver (SQL Server and Azure).
    SqlSrv {
        dbname: String,
        server: String,
        port: Option<u16>,
    },
    SqlServer {
        flavor: SqlServerFlavor,
        dbname: String,
        host: String,
        port: Option<u16>,
    },
    /// With no host, `dbname` is a TNS name from `tnsnames.ora`.
    Oracle {
        dbname: String,
        host: Option<String>,
        port: Option<u16>,
        charset: String,
    },
    Odbc(OdbcSource),
    /// `path` is either `:memory:` or a database file.
    Sqlite { path: String },
    /// Caller supplied segments, emitted verbatim in order.
    Custom {
        driver: DriverId,
        segments: Vec<DsnSegment>,
    },
}

impl Backend {
    pub fn driver(&self) -> DriverId {
        match self {
            Backend::MySql { .. } => DriverId::MySql,
            Backend::PostgreSql { .. } => DriverId::PgSql,
            Backend::SqlSrv { .. } => DriverId::SqlSrv,
            Backend::SqlServer { flavor, .. } => flavor.driver(),
            Backend::Oracle { .. } => DriverId::Oci,
            Backend::Odbc(_) => DriverId::Odbc,
            Backend::Sqlite { .. } => DriverId::Sqlite,
            Backend::Custom { driver, .. } => *driver,
        }
    }

    /// DSN body segments, in the order each backend expects them.
    pub fn segments(&self) -> Vec<DsnSegment> {
        match self {
            Backend::MySql {
                dbname,
                endpoint,
                charset,
            } => {
                let mut out = vec![DsnSegment::pair("dbname", dbname)];
                match endpoint {
                    Endpoint::Socket(path) => {
                        out.push(DsnSegment::pair("unix_socket", path.display()));
                    }
                    Endpoint::Host { host, port } => {
                        out.push(DsnSegment::pair("host", host));
                        if let Some(port) = port {
                            out.push(DsnSegment::pair("port", port));
                        }
                    }
                }
                out.push(DsnSegment::pair("charset", charset));
                out
            }
            Backend::PostgreSql { dbname, host, port } => {
                let mut out = vec![
                    DsnSegment::pair("host", host),
                    DsnSegment::pair("dbname", dbname),
                ];
                if let Some(port) = port {
                    out.push(DsnSegment::pair("port", port));
                }
                out
            }
            Backend::SqlSrv {
                dbname,
                server,
                port,
            } => vec![
                DsnSegment::pair("Server", with_port(server, ',', *port)),
                DsnSegment::pair("Database", dbname),
            ],
            Backend::SqlServer {
                flavor,
                dbname,
                host,
                port,
            } => vec![
                DsnSegment::pair("host", with_port(host, flavor.port_separator(), *port)),
                DsnSegment::pair("dbname", dbname),
            ],
            Backend::Oracle {
                dbname,
                host,
                port,
                charset,
            } => {
                let database = match host.as_deref().filter(|h| !h.is_empty()) {
                    Some(host) => {
                        let mut db = format!("//{}", host);
                        if let Some(port) = port {
                            db.push_str(&format!(":{}", port));
                        }
                        if !dbname.is_empty() {
                            db.push('/');
                            db.push_str(dbname);
                        }
                        db
                    }
                    None => dbname.clone(),
                };
                vec![
                    DsnSegment::pair("database", database),
                    DsnSegment::pair("charset", charset),
                ]
            }
            Backend::Odbc(OdbcSource::Cataloged(dbname)) => vec![DsnSegment::bare(dbname)],
            Backend::Odbc(OdbcSource::Host {
                dbname,
                server,
                driver,
            }) => {
                let mut out = Vec::with_capacity(3);
                if let Some(driver) = driver.as_deref().filter(|d| !d.is_empty()) {
                    out.push(DsnSegment::pair("Driver", driver));
                }
                out.push(DsnSegment::pair("Server", server));
                out.push(DsnSegment::pair("Database", dbname));
                out
            }
            Backend::Sqlite { path } => vec![DsnSegment::bare(path)],
            Backend::Custom { segments, .. } => segments.clone(),
        }
    }

    /// Reports the first missing required field.
    pub fn validate(&self) -> Result<(), DbError> {
        let missing = |field: &str| {
            Err(DbError::ConfigurationError(format!(
                "Missing database connection parameter '{}' for driver '{}'",
                field,
                self.driver()
            )))
        };
        match self {
            Backend::MySql {
                dbname, endpoint, ..
            } => {
                if dbname.is_empty() {
                    return missing("dbname");
                }
                if let Endpoint::Host { host, .. } = endpoint
                    && host.is_empty()
                {
                    return missing("host");
                }
                Ok(())
            }
            Backend::PostgreSql { dbname, host, .. } => {
                if dbname.is_empty() {
                    missing("dbname")
                } else if host.is_empty() {
                    missing("host")
                } else {
                    Ok(())
                }
            }
            Backend::SqlSrv { dbname, server, .. } => {
                if dbname.is_empty() {
                    missing("Database")
                } else if server.is_empty() {
                    missing("Server")
                } else {
                    Ok(())
                }
            }
            Backend::SqlServer { dbname, host, .. } => {
                if dbname.is_empty() {
                    missing("dbname")
                } else if host.is_empty() {
                    missing("host")
                } else {
                    Ok(())
                }
            }
            Backend::Oracle { dbname, host, .. } => {
                if dbname.is_empty() && host.as_deref().is_none_or(str::is_empty) {
                    missing("database")
                } else {
                    Ok(())
                }
            }
            Backend::Odbc(OdbcSource::Cataloged(dbname)) if dbname.is_empty() => {
                missing("dbname")
            }
            Backend::Odbc(OdbcSource::Host { server, .. }) if server.is_empty() => {
                missing("Server")
            }
            Backend::Odbc(_) => Ok(()),
            Backend::Sqlite { path } if path.is_empty() => missing("path"),
            Backend::Sqlite { .. } => Ok(()),
            Backend::Custom { segments, .. } if segments.is_empty() => missing("parameters"),
            Backend::Custom { .. } => Ok(()),
        }
    }
}

fn with_port(host: &str, separator: char, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}{}{}", host, separator, port),
        None => host.to_string(),
    }
}
