use std::sync::Arc;

use crate::error::DbError;
use crate::options::ConnectionOptions;
use crate::parameters::DriverId;
use crate::udbc::NativeError;
use crate::udbc::connection::Connection;
use async_trait::async_trait;
use dashmap::DashMap;

/// `Driver` defines a common interface for native database drivers.
///
/// A driver is responsible for:
/// - Telling which driver id it serves
/// - Opening connections from a DSN and credentials
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the id this driver serves.
    ///
    /// Example: `DriverId::MySql`, `DriverId::Sqlite`
    fn id(&self) -> DriverId;

    /// Opens a new native connection.
    ///
    /// # Arguments
    /// * `dsn` - The full connection string, including the `driver:` prefix
    /// * `username` / `password` - Credentials, empty when not needed
    /// * `options` - Connection attributes (timeout, init command, ...)
    ///
    /// # Returns
    /// - `Ok(Arc<dyn Connection>)` if the connection is successfully established
    /// - `Err(NativeError)` if the native library refused it
    async fn open(
        &self,
        dsn: &str,
        username: &str,
        password: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, NativeError>;
}

/// The set of natively available drivers, keyed by id.
#[derive(Default)]
pub struct DriverTable {
    drivers: DashMap<DriverId, Arc<dyn Driver>>,
}

impl DriverTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, driver: Arc<dyn Driver>) {
        log::debug!("registering native driver '{}'", driver.id());
        self.drivers.insert(driver.id(), driver);
    }

    /// Available driver ids, sorted.
    pub fn available(&self) -> Vec<DriverId> {
        let mut ids: Vec<DriverId> = self.drivers.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Looks up the driver for `id`.
    ///
    /// # Errors
    /// `ConfigurationError` naming the available drivers if `id` is not one of them.
    pub fn resolve(&self, id: DriverId) -> Result<Arc<dyn Driver>, DbError> {
        if let Some(d) = self.drivers.get(&id) {
            return Ok(d.value().clone());
        }
        let available = self
            .available()
            .iter()
            .map(|d| format!("\"{}\"", d))
            .collect::<Vec<_>>()
            .join(", ");
        Err(DbError::ConfigurationError(format!(
            "Unsupported connection type \"{}\", only the following drivers are enabled: [{}]",
            id, available
        )))
    }
}
