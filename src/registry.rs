use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::Result;
use crate::error::DbError;
use crate::handle::ConnectionHandle;
use crate::options::ConnectionOptions;
use crate::parameters::{DriverId, DriverParameters};
use crate::udbc::driver::{Driver, DriverTable};

pub const DEFAULT_CONNECTION_NAME: &str = "default";

type Slot = Arc<OnceCell<Arc<ConnectionHandle>>>;

/// A registry of named database connections.
///
/// `ConnectionRegistry` hands out one [`ConnectionHandle`] per name and
/// revalidates it on every lookup: a handle whose connection went away is
/// reconnected in place before it is returned, so callers always receive a
/// live handle (or an error).
///
/// Create one registry per application (or tenant) and pass it around.
pub struct ConnectionRegistry {
    drivers: DriverTable,
    /// One slot per name. Creation happens inside the slot, so concurrent
    /// lookups of a new name connect once.
    handles: DashMap<String, Slot>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Creates a registry with the natively compiled drivers registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        #[cfg(feature = "sqlite")]
        registry.register_driver(crate::udbc::sqlite::SqliteDriver);
        #[cfg(feature = "mysql")]
        registry.register_driver(crate::udbc::mysql::MysqlDriver);
        registry
    }

    /// Creates a registry without any driver.
    pub fn empty() -> Self {
        Self {
            drivers: DriverTable::new(),
            handles: DashMap::new(),
        }
    }

    /// Registers (or replaces) the native driver for its id.
    pub fn register_driver(&self, driver: impl Driver + 'static) {
        self.drivers.register(Arc::new(driver));
    }

    pub fn available_drivers(&self) -> Vec<DriverId> {
        self.drivers.available()
    }

    /// Returns the handle registered under `name`, creating it on first use.
    ///
    /// For a known name, `parameters` and `options` are ignored; the handle
    /// is checked for liveness and reconnected with its original parameters
    /// if the check fails.
    ///
    /// # Errors
    /// - `ConfigurationError` if `name` is unknown and `parameters` is `None`,
    ///   or the parameters are invalid
    /// - `ConnectionError` if connecting (or reconnecting) fails
    pub async fn get_connection(
        &self,
        name: &str,
        parameters: Option<DriverParameters>,
        options: ConnectionOptions,
    ) -> Result<Arc<ConnectionHandle>> {
        let existing = self.handles.get(name).map(|e| e.value().clone());

        let Some(parameters) = parameters else {
            // never create or evict a slot here, another caller may be filling it
            let handle = existing
                .and_then(|slot| slot.get().cloned())
                .ok_or_else(|| {
                    DbError::ConfigurationError(format!(
                        "Cannot create connection '{}' without parameters",
                        name
                    ))
                })?;
            handle.ensure_live().await?;
            return Ok(handle);
        };

        let slot = self.slot(name);
        if let Some(handle) = slot.get() {
            handle.ensure_live().await?;
            return Ok(handle.clone());
        }

        let created = AtomicBool::new(false);
        let handle = slot
            .get_or_try_init(|| {
                let created = &created;
                async move {
                    created.store(true, Ordering::Relaxed);
                    ConnectionHandle::open(name, parameters, options, &self.drivers)
                        .await
                        .map(Arc::new)
                }
            })
            .await?;
        if !created.load(Ordering::Relaxed) {
            // another caller created it while we waited
            handle.ensure_live().await?;
        }
        Ok(handle.clone())
    }

    /// Shorthand for the connection named [`DEFAULT_CONNECTION_NAME`].
    pub async fn default_connection(
        &self,
        parameters: Option<DriverParameters>,
    ) -> Result<Arc<ConnectionHandle>> {
        self.get_connection(DEFAULT_CONNECTION_NAME, parameters, ConnectionOptions::new())
            .await
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles
            .get(name)
            .is_some_and(|s| s.value().initialized())
    }

    /// Names of all open connections, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handles
            .iter()
            .filter(|e| e.value().initialized())
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Removes `name` from the registry and closes its connection.
    ///
    /// Returns `false` if no connection with that name exists, including one
    /// that is still being opened.
    pub async fn close(&self, name: &str) -> Result<bool> {
        let Some((_, slot)) = self.handles.remove_if(name, |_, s| s.initialized()) else {
            return Ok(false);
        };
        match slot.get() {
            Some(handle) => {
                handle.close().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes every connection, reporting the first failure.
    pub async fn close_all(&self) -> Result<()> {
        let names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        let mut first_err = None;
        for name in names {
            if let Err(e) = self.close(&name).await {
                log::warn!("[{}] close failed: {}", name, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn slot(&self, name: &str) -> Slot {
        self.handles
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udbc::stub::{StubDriver, StubState};

    fn registry() -> (Arc<StubState>, ConnectionRegistry) {
        let driver = StubDriver::new(DriverId::MySql);
        let state = driver.state.clone();
        let registry = ConnectionRegistry::empty();
        registry.register_driver(driver);
        (state, registry)
    }

    fn params() -> DriverParameters {
        DriverParameters::mysql_via_host("test", "u", "p", "localhost", Some(3306), "utf8")
    }

    #[tokio::test]
    async fn test_same_name_returns_same_handle() {
        let (state, registry) = registry();
        let a = registry
            .get_connection("main", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();
        let b = registry
            .get_connection("main", None, ConnectionOptions::new())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(state.opens(), 1);
        assert_eq!(registry.names(), vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_name_without_parameters() {
        let (_state, registry) = registry();
        let err = registry
            .get_connection("nope", None, ConnectionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ConfigurationError(_)));
        assert!(!registry.contains("nope"));
    }

    #[tokio::test]
    async fn test_dead_connection_reconnects_once() {
        let (state, registry) = registry();
        let first = registry
            .get_connection("main", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();

        state.set_liveness_answer(None);
        // the stub keeps failing the liveness check, reconnect must still happen once
        let second = registry
            .get_connection("main", None, ConnectionOptions::new())
            .await
            .unwrap();
        assert_eq!(state.opens(), 2);
        assert!(Arc::ptr_eq(&first, &second));

        state.set_liveness_answer(Some(2));
        registry
            .get_connection("main", None, ConnectionOptions::new())
            .await
            .unwrap();
        assert_eq!(state.opens(), 2);
    }

    #[tokio::test]
    async fn test_wrong_liveness_answer_triggers_reconnect() {
        let (state, registry) = registry();
        registry
            .get_connection("main", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();
        state.set_liveness_answer(Some(0));
        registry
            .get_connection("main", None, ConnectionOptions::new())
            .await
            .unwrap();
        assert_eq!(state.opens(), 2);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_reported() {
        let (state, registry) = registry();
        registry
            .get_connection("main", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();
        state.set_liveness_answer(None);
        state
            .fail_open
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = registry
            .get_connection("main", None, ConnectionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ConnectionError(_)));
        assert!(registry.contains("main"));
    }

    #[tokio::test]
    async fn test_concurrent_first_lookup_connects_once() {
        let (state, registry) = registry();
        let registry = Arc::new(registry);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .get_connection("shared", Some(params()), ConnectionOptions::new())
                    .await
                    .unwrap()
            }));
        }
        let mut handles = Vec::new();
        for t in tasks {
            handles.push(t.await.unwrap());
        }
        assert_eq!(state.opens(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[tokio::test]
    async fn test_lookup_without_parameters_leaves_pending_slot_alone() {
        let (state, registry) = registry();
        let gate = state.gate_opens();
        let registry = Arc::new(registry);

        let opening = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .get_connection("x", Some(params()), ConnectionOptions::new())
                    .await
                    .unwrap()
            })
        };
        while state.opens() == 0 {
            tokio::task::yield_now().await;
        }

        let err = registry
            .get_connection("x", None, ConnectionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ConfigurationError(_)));
        assert!(!registry.close("x").await.unwrap());

        gate.notify_one();
        let first = opening.await.unwrap();
        assert!(registry.contains("x"));

        let second = registry
            .get_connection("x", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(state.opens(), 1);
    }

    #[tokio::test]
    async fn test_close_removes_handle() {
        let (state, registry) = registry();
        registry
            .get_connection("a", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();
        registry
            .get_connection("b", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();

        assert!(registry.close("a").await.unwrap());
        assert!(!registry.close("a").await.unwrap());
        assert!(!registry.contains("a"));

        registry.close_all().await.unwrap();
        assert!(registry.names().is_empty());
        assert_eq!(state.closed.load(std::sync::atomic::Ordering::SeqCst), 2);

        // a closed name can be opened again
        registry
            .get_connection("a", Some(params()), ConnectionOptions::new())
            .await
            .unwrap();
        assert_eq!(state.opens(), 3);
    }
}
