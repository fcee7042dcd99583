//! Connection establishment: URL resolution, timeout defaulting, handle
//! reuse and failure reporting.
//!
//! A [`ConnectionManager`] never returns an error from `connect`. Every
//! outcome, including connectivity failures, is described by the
//! [`ConnectionState`] returned next to the handle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongoconn::{ConnectionConfig, ConnectionManager, DocumentService};
//!
//! let manager = ConnectionManager::new();
//! let config = ConnectionConfig::from_url("mongodb://localhost:27017", "shop");
//!
//! let (mut handle, state) = manager.connect(&config).await;
//! if !state.connected {
//!     eprintln!("mongodb unavailable: {}", state.message);
//! }
//!
//! handle.set_collection_by_name("orders");
//! let orders = DocumentService::new(handle);
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, redact_url};
use crate::dialer::{Dialer, DriverDialer};
use crate::error::{MongoError, MongoResult};
use crate::handle::{StorageHandle, open_bucket};
use crate::state::ConnectionState;

/// Shared slot for the live handle plus the lock that serializes initial
/// dials.
///
/// Cloning shares the slot. Managers built from clones of the same guard
/// hand out the same handle; a fresh guard starts empty.
#[derive(Clone, Default)]
pub struct InitGuard {
    inner: Arc<GuardInner>,
}

#[derive(Default)]
struct GuardInner {
    slot: RwLock<Option<StorageHandle>>,
    init: Mutex<()>,
}

impl InitGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored handle, if a connect has succeeded.
    pub fn current(&self) -> Option<StorageHandle> {
        self.inner.slot.read().clone()
    }

    /// Whether a handle is stored.
    pub fn is_initialized(&self) -> bool {
        self.inner.slot.read().is_some()
    }

    /// Store `handle` unless one is already present.
    fn store(&self, handle: &StorageHandle) -> bool {
        let mut slot = self.inner.slot.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(handle.clone());
        true
    }

    fn take(&self) -> Option<StorageHandle> {
        self.inner.slot.write().take()
    }
}

impl std::fmt::Debug for InitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitGuard")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Produces [`StorageHandle`]s and reports how each connect went.
#[derive(Debug)]
pub struct ConnectionManager<D = DriverDialer> {
    dialer: D,
    guard: InitGuard,
}

impl ConnectionManager<DriverDialer> {
    /// Create a manager using the MongoDB driver and a fresh guard.
    pub fn new() -> Self {
        Self::with_dialer(DriverDialer)
    }
}

impl Default for ConnectionManager<DriverDialer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dialer> ConnectionManager<D> {
    /// Create a manager with a custom dialer and a fresh guard.
    pub fn with_dialer(dialer: D) -> Self {
        Self::with_guard(dialer, InitGuard::new())
    }

    /// Create a manager sharing `guard` with other managers.
    pub fn with_guard(dialer: D, guard: InitGuard) -> Self {
        Self { dialer, guard }
    }

    /// The guard holding the live handle.
    pub fn guard(&self) -> &InitGuard {
        &self.guard
    }

    /// The dialer in use.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// The stored handle, if any.
    pub fn current(&self) -> Option<StorageHandle> {
        self.guard.current()
    }

    /// Connect according to `config`.
    ///
    /// A disabled config returns immediately without dialing. A previously
    /// stored handle is handed back as-is with `new_instance == false`.
    /// Otherwise the URL is dialed and the primary pinged, both within one
    /// deadline of `config.timeout` (10s when zero). With
    /// `allow_conn_sync`, concurrent first callers wait for a single dial.
    pub async fn connect(&self, config: &ConnectionConfig) -> (StorageHandle, ConnectionState) {
        let state = ConnectionState::new(&config.database);

        if !config.enabled {
            debug!(database = %config.database, "MongoDB disabled by configuration");
            let state = state.unavailable();
            let mut handle = StorageHandle::default();
            handle.set_state(state.clone());
            return (handle, state);
        }

        if let Some(handle) = self.guard.current() {
            debug!(database = %config.database, "Reusing MongoDB connection");
            let state = state.reused();
            log_resolved(config, &state);
            return (handle, state);
        }

        let config = config.clone().with_default_timeout();

        let (handle, state) = if config.allow_conn_sync {
            let _init = self.guard.inner.init.lock().await;
            match self.guard.current() {
                Some(handle) => (handle, state.reused()),
                None => {
                    let outcome = self.dial(&config, state).await;
                    if outcome.1.connected {
                        self.guard.store(&outcome.0);
                    }
                    outcome
                }
            }
        } else {
            let outcome = self.dial(&config, state).await;
            if outcome.1.connected && !self.guard.store(&outcome.0) {
                debug!("Another caller stored a handle first");
            }
            outcome
        };

        log_resolved(&config, &state);
        (handle, state)
    }

    /// Close the stored handle and clear the guard.
    ///
    /// The next `connect` dials again.
    pub async fn close(&self) -> MongoResult<()> {
        match self.guard.take() {
            Some(handle) => handle.close().await,
            None => Ok(()),
        }
    }

    async fn dial(
        &self,
        config: &ConnectionConfig,
        state: ConnectionState,
    ) -> (StorageHandle, ConnectionState) {
        let url = config.resolve_url();
        let timeout = config.effective_timeout();
        let deadline = Instant::now() + timeout;

        debug!(
            url = %redact_url(&url),
            timeout_ms = timeout.as_millis() as u64,
            "Dialing MongoDB"
        );

        let client = match within(deadline, timeout, self.dialer.dial(&url, config)).await {
            Ok(client) => client,
            Err(e) => return failed(state, e),
        };

        if let Err(e) = within(deadline, timeout, self.dialer.ping(&client)).await {
            return failed(state, e);
        }

        let mut state = state.established();
        let mut handle = StorageHandle::new(client, &config.database);

        let bucket = handle
            .database()
            .map(|db| open_bucket(db, &config.bucket_name))
            .transpose();
        match bucket {
            Ok(bucket) => {
                handle.set_bucket(bucket);
            }
            Err(e) => {
                warn!(error = %e, "MongoDB bucket unavailable");
                state = state.with_error(format!("error bucket: {}", e));
            }
        }

        handle.set_state(state.clone());
        (handle, state)
    }
}

async fn within<T>(
    deadline: Instant,
    timeout: Duration,
    fut: impl Future<Output = MongoResult<T>>,
) -> MongoResult<T> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| MongoError::timeout(timeout))?
}

/// Debug-mode report of the resolved configuration and its outcome.
fn log_resolved(config: &ConnectionConfig, state: &ConnectionState) {
    if !config.debug_mode {
        return;
    }
    info!(config = %config.describe(), "MongoDB client connection");
    if state.connected {
        info!(
            url = %redact_url(&config.resolve_url()),
            database = %config.database,
            "Connected successfully to MongoDB"
        );
    }
}

fn failed(state: ConnectionState, error: MongoError) -> (StorageHandle, ConnectionState) {
    warn!(error = %error, "MongoDB connection failed");
    let state = state.failed(&error);
    let mut handle = StorageHandle::default();
    handle.set_state(state.clone());
    (handle, state)
}
