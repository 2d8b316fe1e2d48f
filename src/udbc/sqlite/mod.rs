pub mod connection;
pub mod driver;
mod value_codec;

pub use driver::SqliteDriver;

use crate::udbc::NativeError;

impl From<rusqlite::Error> for NativeError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => {
                NativeError::new("HY000", Some(err.extended_code as i64), e.to_string())
            }
            _ => NativeError::new("HY000", None, e.to_string()),
        }
    }
}
