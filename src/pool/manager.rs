//! Connection pool and the [`ConnectionProvider`] seam.
//!
//! `DbPool` keeps a fixed set of `may_postgres` clients in a bounded
//! `crossbeam-channel` queue. `acquire()` takes one out, waiting at most the
//! configured timeout, and the returned [`PooledConnection`] puts it back when
//! dropped, whichever way the caller leaves its scope.
//!
//! A connection whose statement failed is health-checked on release. A client
//! that no longer answers is discarded and its slot goes back vacant; the next
//! `acquire()` that picks up a vacant slot opens a fresh connection.

use crate::connection::{connect, validate_connection_string, ConnectionError};
use crate::error::PersistenceError;
use crate::executor::{DocExecutor, MayPostgresExecutor};
use crate::pool::config::DatabaseConfig;
use crate::query::value_conversion::SqlParam;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use may_postgres::Client;
use std::cell::Cell;
use std::ops::Deref;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Supplies a connection for the duration of one operation
///
/// The connection is released when the returned value is dropped.
pub trait ConnectionProvider {
    type Connection: DocExecutor;

    /// # Errors
    ///
    /// Returns `PersistenceError` when no connection can be handed out.
    fn acquire(&self) -> Result<Self::Connection, PersistenceError>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection, PersistenceError> {
        (**self).acquire()
    }
}

/// One pool slot: a live client, or room for a new one
enum Slot {
    Ready(Client),
    Vacant,
}

/// Fixed-size pool of `may_postgres` clients
pub struct DbPool {
    idle_tx: Sender<Slot>,
    idle_rx: Receiver<Slot>,
    size: usize,
    acquire_timeout: Duration,
    /// Where vacant slots reconnect to; `None` for pools built from clients
    url: Option<String>,
}

impl DbPool {
    /// Open `max_connections` connections to `url`
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the configuration is invalid or any
    /// connection fails.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        validate_connection_string(&config.url)?;

        let size = usize::try_from(config.max_connections)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConnectionError::Other(format!(
                    "max_connections must be positive, got {}",
                    config.max_connections
                ))
            })?;

        let mut clients = Vec::with_capacity(size);
        for _ in 0..size {
            clients.push(connect(&config.url)?);
        }

        log::info!("Opened connection pool with {size} connection(s)");
        let mut pool = Self::from_clients(clients, Duration::from_secs(config.pool_timeout_seconds));
        pool.url = Some(config.url.clone());
        Ok(pool)
    }

    /// Build a pool over already-connected clients
    ///
    /// Such a pool has no URL to reconnect to, so a discarded client shrinks it.
    pub fn from_clients(clients: Vec<Client>, acquire_timeout: Duration) -> Self {
        let size = clients.len();
        let (idle_tx, idle_rx) = bounded(size.max(1));
        for client in clients {
            // Capacity equals the number of clients, so this cannot block.
            let _ = idle_tx.send(Slot::Ready(client));
        }

        DbPool {
            idle_tx,
            idle_rx,
            size,
            acquire_timeout,
            url: None,
        }
    }

    /// Open a client for a vacant slot, handing the slot back on failure
    fn reconnect(&self) -> Result<Client, PersistenceError> {
        let result = match &self.url {
            Some(url) => connect(url).map_err(PersistenceError::from),
            None => Err(PersistenceError::Other(
                "connection pool has no URL to reconnect a discarded connection".to_string(),
            )),
        };

        match result {
            Ok(client) => {
                log::info!("Reconnected vacant pool slot");
                Ok(client)
            }
            Err(e) => {
                let _ = self.idle_tx.send(Slot::Vacant);
                Err(e)
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently idle in the pool
    pub fn idle(&self) -> usize {
        self.idle_rx.len()
    }
}

impl ConnectionProvider for DbPool {
    type Connection = PooledConnection;

    fn acquire(&self) -> Result<PooledConnection, PersistenceError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        let start = Instant::now();
        let slot = match self.idle_rx.recv_timeout(self.acquire_timeout) {
            Ok(slot) => slot,
            Err(RecvTimeoutError::Timeout) => return Err(PersistenceError::PoolTimeout(self.acquire_timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(PersistenceError::Other("connection pool is closed".to_string()))
            }
        };

        let waited = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_connection_wait(waited);
        log::trace!("Acquired pooled connection after {waited:?}");

        let client = match slot {
            Slot::Ready(client) => client,
            Slot::Vacant => self.reconnect()?,
        };

        Ok(PooledConnection {
            executor: Some(MayPostgresExecutor::new(client)),
            home: self.idle_tx.clone(),
            failed: Cell::new(false),
        })
    }
}

/// A client checked out of a [`DbPool`]; returned to the pool on drop
pub struct PooledConnection {
    executor: Option<MayPostgresExecutor>,
    home: Sender<Slot>,
    /// A statement on this connection returned a database error
    failed: Cell<bool>,
}

impl PooledConnection {
    fn track<T>(&self, result: Result<T, PersistenceError>) -> Result<T, PersistenceError> {
        if let Err(PersistenceError::Postgres(_)) = &result {
            self.failed.set(true);
        }
        result
    }
}

/// Whether a released client may serve another operation
///
/// Only connections that saw a database error pay for the health check.
fn reusable(failed: bool, check_health: impl FnOnce() -> Result<bool, PersistenceError>) -> bool {
    !failed || matches!(check_health(), Ok(true))
}

impl Deref for PooledConnection {
    type Target = MayPostgresExecutor;

    fn deref(&self) -> &MayPostgresExecutor {
        // Only `drop` takes the executor out.
        match &self.executor {
            Some(executor) => executor,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl DocExecutor for PooledConnection {
    fn execute(&self, query: &str, params: &[SqlParam]) -> Result<u64, PersistenceError> {
        self.track((**self).execute(query, params))
    }

    fn query_json(&self, query: &str, params: &[SqlParam], column: &str) -> Result<Vec<String>, PersistenceError> {
        self.track((**self).query_json(query, params, column))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(executor) = self.executor.take() {
            let slot = if reusable(self.failed.get(), || executor.check_health()) {
                Slot::Ready(executor.into_client())
            } else {
                log::warn!("Discarding pooled connection that failed its health check");
                Slot::Vacant
            };

            if self.home.send(slot).is_err() {
                log::warn!("Connection pool dropped before connection was returned");
            }
        }
    }
}
