//! Connection manager behavior, driven through fake dialers.
//!
//! No server is required: fake dialers hand out lazily-connecting clients
//! and report ping success without touching the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mongoconn::prelude::*;
use mongoconn::state::{MSG_CONNECTED, MSG_REUSED, MSG_UNAVAILABLE};
use mongoconn::{Dialer, MongoError};
use mongodb::Client;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

#[derive(Default)]
struct FakeDialer {
    dials: AtomicUsize,
    pings: AtomicUsize,
    delay: Option<Duration>,
    ping_error: Option<&'static str>,
    urls: Mutex<Vec<String>>,
}

impl FakeDialer {
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn unpingable(message: &'static str) -> Self {
        Self {
            ping_error: Some(message),
            ..Self::default()
        }
    }

    fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self, url: &str, _config: &ConnectionConfig) -> MongoResult<Client> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Client::with_uri_str("mongodb://127.0.0.1:27017").await?)
    }

    async fn ping(&self, _client: &Client) -> MongoResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        match self.ping_error {
            Some(message) => Err(MongoError::connection(message)),
            None => Ok(()),
        }
    }
}

/// Records the message of every event emitted while installed.
#[derive(Clone, Default)]
struct MessageLog(Arc<Mutex<Vec<String>>>);

impl MessageLog {
    fn count(&self, message: &str) -> usize {
        self.0.lock().iter().filter(|m| m.as_str() == message).count()
    }

    fn contains(&self, needle: &str) -> bool {
        self.0.lock().iter().any(|m| m.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for MessageLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventText::default();
        event.record(&mut visitor);
        if let Some(message) = visitor.message {
            self.0.lock().push(message);
        }
        self.0.lock().extend(visitor.fields);
    }
}

#[derive(Default)]
struct EventText {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for EventText {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::builder()
        .host("db.test")
        .port(27017)
        .database("inventory")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_disabled_config_never_dials() {
    let dialer = Arc::new(FakeDialer::default());
    let manager = ConnectionManager::with_dialer(dialer.clone());
    let mut config = config();
    config.enabled = false;

    let (handle, state) = manager.connect(&config).await;

    assert_eq!(dialer.dials(), 0);
    assert!(!state.connected);
    assert!(!state.new_instance);
    assert_eq!(state.message, MSG_UNAVAILABLE);
    assert_eq!(state.database, "inventory");
    assert!(!handle.is_connected());
    assert_eq!(handle.state(), &state);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_uses_ten_seconds() {
    let dialer = Arc::new(FakeDialer::slow(Duration::from_secs(60)));
    let manager = ConnectionManager::with_dialer(dialer.clone());
    let mut config = config();
    config.timeout = Duration::ZERO;

    let started = tokio::time::Instant::now();
    let (handle, state) = manager.connect(&config).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(10), "gave up after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(11), "gave up after {:?}", elapsed);
    assert!(!state.connected);
    assert_eq!(
        state.error.as_deref(),
        Some("operation timed out after 10000ms")
    );
    assert!(!handle.is_connected());
}

#[tokio::test]
async fn test_explicit_url_takes_precedence() {
    let dialer = Arc::new(FakeDialer::default());
    let manager = ConnectionManager::with_dialer(dialer.clone());
    let config = ConnectionConfig::builder()
        .url("mongodb://X")
        .host("db.test")
        .credentials("admin", "secret")
        .database("inventory")
        .build()
        .unwrap();

    manager.connect(&config).await;

    assert_eq!(*dialer.urls.lock(), vec!["mongodb://X".to_string()]);
}

#[tokio::test]
async fn test_successful_connect() {
    let dialer = Arc::new(FakeDialer::default());
    let manager = ConnectionManager::with_dialer(dialer.clone());

    let (handle, state) = manager.connect(&config()).await;

    assert!(state.connected);
    assert!(state.new_instance);
    assert_eq!(state.message, MSG_CONNECTED);
    assert_eq!(state.pid, std::process::id());
    assert!(state.error.is_none());
    assert_eq!(dialer.pings.load(Ordering::SeqCst), 1);

    assert_eq!(handle.database().map(|db| db.name()), Some("inventory"));
    assert!(handle.bucket().is_some());
    assert!(handle.collection().is_none());
}

#[tokio::test]
async fn test_second_connect_reuses_handle() {
    let dialer = Arc::new(FakeDialer::default());
    let manager = ConnectionManager::with_dialer(dialer.clone());
    let mut config = config();
    config.allow_conn_sync = true;

    let (_, first) = manager.connect(&config).await;
    let (handle, second) = manager.connect(&config).await;

    assert_eq!(dialer.dials(), 1);
    assert!(first.new_instance);
    assert!(second.connected);
    assert!(!second.new_instance);
    assert_eq!(second.message, MSG_REUSED);
    assert_eq!(handle.state(), &first);
}

#[tokio::test]
async fn test_reuse_without_sync_init() {
    let dialer = Arc::new(FakeDialer::default());
    let manager = ConnectionManager::with_dialer(dialer.clone());

    manager.connect(&config()).await;
    let (_, state) = manager.connect(&config()).await;

    assert_eq!(dialer.dials(), 1);
    assert!(!state.new_instance);
}

#[tokio::test]
async fn test_concurrent_sync_init_dials_once() {
    let dialer = Arc::new(FakeDialer::slow(Duration::from_millis(50)));
    let manager = Arc::new(ConnectionManager::with_dialer(dialer.clone()));
    let mut config = config();
    config.allow_conn_sync = true;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        let config = config.clone();
        tasks.push(tokio::spawn(async move { manager.connect(&config).await.1 }));
    }

    let mut fresh = 0;
    for task in tasks {
        let state = task.await.unwrap();
        assert!(state.connected);
        if state.new_instance {
            fresh += 1;
        }
    }

    assert_eq!(dialer.dials(), 1);
    assert_eq!(fresh, 1);
}

#[tokio::test]
async fn test_independent_managers_do_not_share() {
    let dialer = Arc::new(FakeDialer::default());
    let first = ConnectionManager::with_dialer(dialer.clone());
    let second = ConnectionManager::with_dialer(dialer.clone());

    let (_, a) = first.connect(&config()).await;
    let (_, b) = second.connect(&config()).await;

    assert!(a.new_instance);
    assert!(b.new_instance);
    assert_eq!(dialer.dials(), 2);
}

#[tokio::test]
async fn test_shared_guard_shares_handle() {
    let dialer = Arc::new(FakeDialer::default());
    let guard = InitGuard::new();
    let first = ConnectionManager::with_guard(dialer.clone(), guard.clone());
    let second = ConnectionManager::with_guard(dialer.clone(), guard.clone());

    first.connect(&config()).await;
    let (_, state) = second.connect(&config()).await;

    assert!(guard.is_initialized());
    assert!(!state.new_instance);
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn test_ping_failure_reported_like_dial_failure() {
    let dialer = Arc::new(FakeDialer::unpingable("not primary"));
    let manager = ConnectionManager::with_dialer(dialer.clone());

    let (handle, state) = manager.connect(&config()).await;

    assert!(!state.connected);
    assert_eq!(state.message, "connection error: not primary");
    assert!(state.error.is_some());
    assert!(!handle.is_connected());
    assert!(manager.current().is_none());
}

#[tokio::test]
async fn test_bucket_failure_keeps_connection() {
    let manager = ConnectionManager::with_dialer(FakeDialer::default());
    let mut config = config();
    config.bucket_name = String::new();

    let (mut handle, state) = manager.connect(&config).await;

    assert!(state.connected);
    assert!(state.new_instance);
    assert!(state.error.as_deref().unwrap().starts_with("error bucket:"));
    assert!(handle.bucket().is_none());

    handle.set_collection_by_name("items");
    assert_eq!(DocumentService::new(handle).model_name(), Some("items"));
}

#[tokio::test]
async fn test_close_clears_guard() {
    let dialer = Arc::new(FakeDialer::default());
    let manager = ConnectionManager::with_dialer(dialer.clone());

    manager.connect(&config()).await;
    manager.close().await.unwrap();
    assert!(manager.current().is_none());

    let (_, state) = manager.connect(&config()).await;
    assert!(state.new_instance);
    assert_eq!(dialer.dials(), 2);
}

#[tokio::test]
async fn test_debug_mode_does_not_change_outcome() {
    let manager = ConnectionManager::with_dialer(FakeDialer::default());
    let mut config = config();
    config.debug_mode = true;
    config.password = "secret".to_string();
    config.username = "admin".to_string();

    let (_, state) = manager.connect(&config).await;

    assert!(state.connected);
    assert_eq!(state.message, MSG_CONNECTED);
}

#[tokio::test]
async fn test_debug_mode_logs_config_on_every_connect() {
    let log = MessageLog::default();
    let _subscriber = tracing::subscriber::set_default(Registry::default().with(log.clone()));

    let manager = ConnectionManager::with_dialer(FakeDialer::default());
    let mut config = config();
    config.debug_mode = true;

    let (_, first) = manager.connect(&config).await;
    let (_, second) = manager.connect(&config).await;

    assert!(first.new_instance);
    assert!(!second.new_instance);
    assert_eq!(log.count("MongoDB client connection"), 2);
    assert_eq!(log.count("Connected successfully to MongoDB"), 2);
}

#[tokio::test]
async fn test_logs_never_contain_multi_host_password() {
    let log = MessageLog::default();
    let _subscriber = tracing::subscriber::set_default(Registry::default().with(log.clone()));

    let manager = ConnectionManager::with_dialer(FakeDialer::default());
    let mut config =
        ConnectionConfig::from_url("mongodb://admin:hunter2@h1:27017,h2:27017/app", "app");
    config.debug_mode = true;

    manager.connect(&config).await;

    assert!(log.contains("admin:****@h1:27017,h2:27017"));
    assert!(!log.contains("hunter2"));
}
