//! Test doubles for the connection and executor seams.
//!
//! [`RecordingProvider`] hands out [`RecordingConnection`]s that record every
//! statement with its parameters, replay queued result rows, and count
//! acquisitions and releases. Nothing touches a database.

use crate::error::PersistenceError;
use crate::executor::DocExecutor;
use crate::pool::manager::ConnectionProvider;
use crate::query::value_conversion::SqlParam;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One statement as it reached the executor
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Recorded>,
    rows: VecDeque<Vec<String>>,
    fail_next: Option<String>,
    refuse: bool,
    acquired: usize,
    released: usize,
}

/// Spy connection provider
#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    state: Arc<Mutex<State>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue the JSON rows returned by the next query
    pub fn push_rows(&self, rows: Vec<String>) {
        self.state().rows.push_back(rows);
    }

    /// Make the next statement fail with `message`
    pub fn fail_next(&self, message: &str) {
        self.state().fail_next = Some(message.to_string());
    }

    /// Make every `acquire()` fail as if the pool were exhausted
    pub fn refuse_connections(&self) {
        self.state().refuse = true;
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.state().calls.clone()
    }

    pub fn acquire_count(&self) -> usize {
        self.state().acquired
    }

    pub fn released_count(&self) -> usize {
        self.state().released
    }
}

impl ConnectionProvider for RecordingProvider {
    type Connection = RecordingConnection;

    fn acquire(&self) -> Result<RecordingConnection, PersistenceError> {
        let mut state = self.state();
        if state.refuse {
            return Err(PersistenceError::PoolTimeout(Duration::ZERO));
        }
        state.acquired += 1;
        Ok(RecordingConnection {
            state: Arc::clone(&self.state),
        })
    }
}

/// Connection handed out by [`RecordingProvider`]
#[derive(Debug)]
pub struct RecordingConnection {
    state: Arc<Mutex<State>>,
}

impl RecordingConnection {
    fn record(&self, query: &str, params: &[SqlParam]) -> Result<MutexGuard<'_, State>, PersistenceError> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.calls.push(Recorded {
            sql: query.to_string(),
            params: params.to_vec(),
        });
        let failure = state.fail_next.take();
        match failure {
            Some(message) => Err(PersistenceError::Other(message)),
            None => Ok(state),
        }
    }
}

impl DocExecutor for RecordingConnection {
    fn execute(&self, query: &str, params: &[SqlParam]) -> Result<u64, PersistenceError> {
        self.record(query, params)?;
        Ok(1)
    }

    fn query_json(&self, query: &str, params: &[SqlParam], _column: &str) -> Result<Vec<String>, PersistenceError> {
        let mut state = self.record(query, params)?;
        Ok(state.rows.pop_front().unwrap_or_default())
    }
}

impl Drop for RecordingConnection {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.released += 1;
    }
}
