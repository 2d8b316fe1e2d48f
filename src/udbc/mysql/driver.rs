use async_trait::async_trait;
use mysql_async::{Conn, OptsBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::options::ConnectionOptions;
use crate::parameters::DriverId;
use crate::udbc::NativeError;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc::mysql::connection::MysqlConnection;

/// Connection settings read from a `mysql:` DSN.
#[derive(Debug, Default, PartialEq)]
struct MysqlTarget {
    host: Option<String>,
    port: Option<u16>,
    unix_socket: Option<String>,
    dbname: Option<String>,
    charset: Option<String>,
}

impl MysqlTarget {
    fn parse(dsn: &str) -> Result<Self, NativeError> {
        let body = dsn
            .trim()
            .strip_prefix("mysql:")
            .ok_or_else(|| NativeError::message(format!("invalid data source name: {}", dsn)))?;

        let mut target = MysqlTarget::default();
        for part in body.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(NativeError::message(format!(
                    "invalid data source name: {}",
                    dsn
                )));
            };
            let value = value.trim().to_string();
            match key.trim() {
                "host" => target.host = Some(value),
                "port" => {
                    let port = value.parse().map_err(|_| {
                        NativeError::message(format!("invalid port in data source name: {}", value))
                    })?;
                    target.port = Some(port);
                }
                "unix_socket" => target.unix_socket = Some(value),
                "dbname" => target.dbname = Some(value),
                "charset" => target.charset = Some(value),
                other => log::warn!("ignoring unknown mysql DSN key '{}'", other),
            }
        }
        Ok(target)
    }

    fn into_opts(self, username: &str, password: &str, options: &ConnectionOptions) -> OptsBuilder {
        let mut init = Vec::new();
        if let Some(charset) = &self.charset {
            init.push(format!("SET NAMES {}", charset));
        }
        if let Some(sql) = options.init_command() {
            init.push(sql.to_string());
        }

        let mut builder = OptsBuilder::default()
            .db_name(self.dbname)
            .user((!username.is_empty()).then(|| username.to_string()))
            .pass((!password.is_empty()).then(|| password.to_string()))
            .init(init);

        if let Some(socket) = self.unix_socket {
            builder = builder.socket(Some(socket));
        } else {
            builder = builder.ip_or_hostname(self.host.unwrap_or_else(|| "localhost".to_string()));
            if let Some(port) = self.port {
                builder = builder.tcp_port(port);
            }
        }
        builder
    }
}

/// Opens MySQL connections from `mysql:` DSNs.
///
/// Each handle owns exactly one server connection; there is no pooling.
pub struct MysqlDriver;

#[async_trait]
impl Driver for MysqlDriver {
    fn id(&self) -> DriverId {
        DriverId::MySql
    }

    async fn open(
        &self,
        dsn: &str,
        username: &str,
        password: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, NativeError> {
        let opts = MysqlTarget::parse(dsn)?.into_opts(username, password, options);
        let connect = Conn::new(opts);

        let conn = match options.timeout_secs().filter(|secs| *secs > 0) {
            Some(secs) => match timeout(Duration::from_secs(secs), connect).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(NativeError::new(
                        "HYT00",
                        None,
                        format!("Connection timed out (timeout: {}s)", secs),
                    ));
                }
            },
            None => connect.await?,
        };

        Ok(Arc::new(MysqlConnection::new(conn)))
    }
}
