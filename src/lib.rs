//! Driver-agnostic database connection handling.
//!
//! Connections are described by [`DriverParameters`], opened and cached by
//! name in a [`ConnectionRegistry`], and checked for liveness (and
//! reconnected) each time they are looked up. Queries run through
//! [`ConnectionHandle`] and their results are read with [`StatementHandle`].
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use udbh::{ConnectionOptions, ConnectionRegistry, DriverParameters, Params};
//!
//! # async fn run() -> udbh::Result<()> {
//! let registry = ConnectionRegistry::new();
//! let db = registry
//!     .get_connection(
//!         "main",
//!         Some(DriverParameters::sqlite("app.db", "", "")),
//!         ConnectionOptions::new(),
//!     )
//!     .await?;
//!
//! let mut stmt = db
//!     .prepare("SELECT id, name FROM user WHERE id > ?", &ConnectionOptions::new())
//!     .await?;
//! stmt.execute(&Params::positional([10])).await?;
//! stmt.for_each_row(|row, _| {
//!     println!("{:?}", row.get("name"));
//!     ControlFlow::Continue(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod options;
pub mod parameters;
pub mod registry;
pub mod statement;
pub mod udbc;

pub use config::ConnectionConfig;
pub use error::{DbError, ErrorInfo, Result};
pub use handle::ConnectionHandle;
pub use options::{Attribute, ConnectionOptions, FetchMode, OptionValue, ParamType};
pub use parameters::{DriverId, DriverParameters};
pub use registry::{ConnectionRegistry, DEFAULT_CONNECTION_NAME};
pub use statement::{Record, StatementHandle};
pub use udbc::value::{Params, Row, ToValue, Value};
