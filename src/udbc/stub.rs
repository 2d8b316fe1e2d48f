//! Scripted in-memory driver for unit tests.
//!
//! Results are looked up by exact SQL text. `SELECT 1+1` answers with the
//! configured liveness answer and `SELECT FOUND_ROWS()` with the configured
//! found-rows count; `None` makes either query fail.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::ErrorInfo;
use crate::options::{ConnectionOptions, ParamType};
use crate::parameters::DriverId;
use crate::udbc::connection::{Connection, Statement};
use crate::udbc::driver::Driver;
use crate::udbc::value::{Params, Row, Value};
use crate::udbc::{LastError, NativeError};

pub(crate) struct StubState {
    pub opens: AtomicUsize,
    pub fail_open: AtomicBool,
    pub liveness_answer: Mutex<Option<i64>>,
    pub found_rows: Mutex<Option<i64>>,
    /// Statements fail to fetch once this many rows have been read.
    pub fail_fetch_after: Mutex<Option<usize>>,
    pub results: Mutex<HashMap<String, Vec<Row>>>,
    pub failing: Mutex<HashSet<String>>,
    pub executed: Mutex<Vec<(String, Params)>>,
    pub quote_calls: AtomicUsize,
    pub closed: AtomicUsize,
    pub last_options: Mutex<Option<ConnectionOptions>>,
    /// When set, `open` waits for a notification before connecting.
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            liveness_answer: Mutex::new(Some(2)),
            found_rows: Mutex::new(None),
            fail_fetch_after: Mutex::new(None),
            results: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            executed: Mutex::new(Vec::new()),
            quote_calls: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            last_options: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }
}

impl StubState {
    pub fn set_liveness_answer(&self, value: Option<i64>) {
        *self.liveness_answer.lock().unwrap() = value;
    }

    pub fn set_found_rows(&self, value: Option<i64>) {
        *self.found_rows.lock().unwrap() = value;
    }

    /// Holds every following `open` until the returned `Notify` fires.
    pub fn gate_opens(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn fail_fetch_after(&self, rows: Option<usize>) {
        *self.fail_fetch_after.lock().unwrap() = rows;
    }

    pub fn fail(&self, sql: &str) {
        self.failing.lock().unwrap().insert(sql.to_string());
    }

    /// Registers `count` rows `(id, name)` as the result of `sql`.
    pub fn rows(&self, sql: &str, count: i64) {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let rows = (1..=count)
            .map(|i| Row::new(columns.clone(), vec![Value::I64(i), Value::Str(format!("row{}", i))]))
            .collect();
        self.results.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn scalar(value: Option<i64>, sql: &str) -> Result<VecDeque<Row>, NativeError> {
        let value = value.ok_or_else(|| {
            NativeError::new("HY000", Some(2006), format!("MySQL server has gone away ({})", sql))
        })?;
        let columns: Arc<[String]> = vec![sql.trim_start_matches("SELECT ").to_string()].into();
        Ok(VecDeque::from([Row::new(columns, vec![Value::I64(value)])]))
    }

    fn result_of(&self, sql: &str) -> Result<VecDeque<Row>, NativeError> {
        if self.failing.lock().unwrap().contains(sql) {
            return Err(NativeError::new("42000", Some(1064), "You have an error in your SQL syntax"));
        }
        match sql {
            "SELECT 1+1" => Self::scalar(*self.liveness_answer.lock().unwrap(), sql),
            "SELECT FOUND_ROWS()" => Self::scalar(*self.found_rows.lock().unwrap(), sql),
            _ => Ok(self
                .results
                .lock()
                .unwrap()
                .get(sql)
                .cloned()
                .unwrap_or_default()
                .into()),
        }
    }
}

pub(crate) struct StubDriver {
    id: DriverId,
    pub state: Arc<StubState>,
}

impl StubDriver {
    pub fn new(id: DriverId) -> Self {
        Self {
            id,
            state: Arc::new(StubState::default()),
        }
    }
}

#[async_trait]
impl Driver for StubDriver {
    fn id(&self) -> DriverId {
        self.id
    }

    async fn open(
        &self,
        dsn: &str,
        _username: &str,
        _password: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, NativeError> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        *self.state.last_options.lock().unwrap() = Some(options.clone());
        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(NativeError::new(
                "HY000",
                Some(2002),
                format!("Can't connect to server ({})", dsn),
            ));
        }
        Ok(Arc::new(StubConnection {
            state: self.state.clone(),
            last_error: LastError::default(),
            in_tx: AtomicBool::new(false),
        }))
    }
}

struct StubConnection {
    state: Arc<StubState>,
    last_error: LastError,
    in_tx: AtomicBool,
}

#[async_trait]
impl Connection for StubConnection {
    async fn exec(&self, sql: &str) -> Result<u64, NativeError> {
        self.last_error.record(self.state.result_of(sql).map(|_| {
            self.state
                .executed
                .lock()
                .unwrap()
                .push((sql.to_string(), Params::None));
            1
        }))
    }

    async fn query(&self, sql: &str) -> Result<Box<dyn Statement>, NativeError> {
        let rows = self.last_error.record(self.state.result_of(sql))?;
        Ok(Box::new(StubStatement {
            state: self.state.clone(),
            sql: sql.to_string(),
            rows,
            row_count: 0,
            fetched: 0,
        }))
    }

    async fn prepare(
        &self,
        sql: &str,
        _options: &ConnectionOptions,
    ) -> Result<Box<dyn Statement>, NativeError> {
        if sql.starts_with("BROKEN") {
            return self.last_error.record(Err(NativeError::new(
                "42000",
                Some(1064),
                "You have an error in your SQL syntax",
            )));
        }
        Ok(Box::new(StubStatement {
            state: self.state.clone(),
            sql: sql.to_string(),
            rows: VecDeque::new(),
            row_count: 0,
            fetched: 0,
        }))
    }

    fn quote(&self, value: &str, _hint: ParamType) -> String {
        self.state.quote_calls.fetch_add(1, Ordering::SeqCst);
        format!("'{}'", value.replace('\'', "''"))
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.get()
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<String, NativeError> {
        Ok("42".to_string())
    }

    async fn begin(&self) -> Result<(), NativeError> {
        if self.in_tx.swap(true, Ordering::SeqCst) {
            return Err(NativeError::new("25000", None, "There is already an active transaction"));
        }
        Ok(())
    }

    async fn commit(&self) -> Result<(), NativeError> {
        self.in_tx.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), NativeError> {
        self.in_tx.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn in_transaction(&self) -> bool {
        self.in_tx.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), NativeError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StubStatement {
    state: Arc<StubState>,
    sql: String,
    rows: VecDeque<Row>,
    row_count: u64,
    fetched: usize,
}

#[async_trait]
impl Statement for StubStatement {
    async fn execute(&mut self, params: &Params) -> Result<(), NativeError> {
        self.rows = self.state.result_of(&self.sql)?;
        self.row_count = self.rows.len() as u64;
        self.fetched = 0;
        self.state
            .executed
            .lock()
            .unwrap()
            .push((self.sql.clone(), params.clone()));
        Ok(())
    }

    async fn fetch(&mut self) -> Result<Option<Row>, NativeError> {
        if let Some(limit) = *self.state.fail_fetch_after.lock().unwrap()
            && self.fetched >= limit
        {
            return Err(NativeError::new(
                "HY000",
                Some(2013),
                "Lost connection to MySQL server during query",
            ));
        }
        self.fetched += 1;
        Ok(self.rows.pop_front())
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }
}
