pub mod connection;
pub mod driver;
mod value_codec;

pub use driver::MysqlDriver;

use crate::udbc::NativeError;

impl From<mysql_async::Error> for NativeError {
    fn from(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Server(err) => {
                NativeError::new(err.state, Some(err.code as i64), err.message)
            }
            other => NativeError::new("HY000", None, other.to_string()),
        }
    }
}
