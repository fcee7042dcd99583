//! # mongoconn
//!
//! One shared MongoDB connection and a uniform document-store surface.
//!
//! This crate provides:
//! - A connection manager that resolves the URL, applies a default timeout,
//!   reuses a live handle and reports every outcome as a [`ConnectionState`]
//! - A [`StorageHandle`] bundling client, database, collection and blob bucket
//! - A [`DocumentService`] facade for CRUD, bulk writes, aggregation,
//!   indexes, transactions, backup/restore and blob storage
//! - Per-operation deadlines and cancellation via [`OperationContext`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use mongoconn::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder()
//!         .host("localhost")
//!         .port(27017)
//!         .database("mydb")
//!         .allow_conn_sync(true)
//!         .build()?;
//!
//!     let manager = ConnectionManager::new();
//!     let (mut handle, state) = manager.connect(&config).await;
//!     println!("{}", state.to_json());
//!
//!     handle.set_collection_by_name("users");
//!     let users = DocumentService::new(handle);
//!
//!     users.create(&User { name: "Alice".into(), age: 30 }).await?;
//!     let alice: User = users.find(doc! { "name": "Alice" }).await?;
//!
//!     manager.close().await?;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod config;
pub mod context;
pub mod dialer;
pub mod document;
pub mod error;
pub mod handle;
pub mod manager;
pub mod service;
pub mod state;

pub use bson::oid::ObjectId;
pub use bson::{Bson, Document, doc};
pub use bulk::{BulkWriteResult, WriteModel};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use context::OperationContext;
pub use dialer::{Dialer, DriverDialer};
pub use error::{MongoError, MongoResult};
pub use handle::StorageHandle;
pub use manager::{ConnectionManager, InitGuard};
pub use service::DocumentService;
pub use state::ConnectionState;
pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::bulk::{BulkWriteResult, WriteModel};
    pub use crate::config::{ConnectionConfig, ConnectionConfigBuilder};
    pub use crate::context::OperationContext;
    pub use crate::error::{MongoError, MongoResult};
    pub use crate::handle::StorageHandle;
    pub use crate::manager::{ConnectionManager, InitGuard};
    pub use crate::service::DocumentService;
    pub use crate::state::ConnectionState;
    pub use bson::oid::ObjectId;
    pub use bson::{Bson, Document, doc};
}
