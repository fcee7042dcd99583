//! The live handle bundling a client, database, collection and blob bucket.

use std::fmt;
use std::time::Duration;

use bson::Document;
use mongodb::gridfs::GridFsBucket;
use mongodb::options::GridFsBucketOptions;
use mongodb::{Client, Collection, Database};
use tracing::debug;

use crate::config::DEFAULT_BUCKET;
use crate::error::{MongoError, MongoResult};
use crate::state::ConnectionState;

/// Upper bound for releasing the connection on close.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the live connection plus the database, collection and bucket
/// selected on it.
///
/// Every component is optional: a disabled or failed connect yields a handle
/// with nothing bound, and operations on it fail with a precondition error.
/// Clones share the same underlying connection pool.
///
/// Reselecting the collection or bucket while other tasks are issuing
/// operations through clones of this handle is not supported; configure
/// first, then share.
#[derive(Clone, Default)]
pub struct StorageHandle {
    client: Option<Client>,
    database: Option<Database>,
    collection: Option<Collection<Document>>,
    bucket: Option<GridFsBucket>,
    state: ConnectionState,
}

impl StorageHandle {
    /// Create a handle bound to `database` on `client`.
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            client: Some(client),
            database: Some(db),
            ..Self::default()
        }
    }

    pub fn set_client(&mut self, client: Option<Client>) -> &mut Self {
        self.client = client;
        self
    }

    pub fn set_database(&mut self, database: Option<Database>) -> &mut Self {
        self.database = database;
        self
    }

    pub fn set_collection(&mut self, collection: Option<Collection<Document>>) -> &mut Self {
        self.collection = collection;
        self
    }

    /// Select a collection of the bound database by name.
    ///
    /// Does nothing when no database is bound.
    pub fn set_collection_by_name(&mut self, name: &str) -> &mut Self {
        if let Some(ref db) = self.database {
            self.collection = Some(db.collection::<Document>(name));
        }
        self
    }

    pub fn set_bucket(&mut self, bucket: Option<GridFsBucket>) -> &mut Self {
        self.bucket = bucket;
        self
    }

    /// Bind the default-named blob bucket to the bound database.
    ///
    /// Leaves the current bucket untouched when no database is bound.
    pub fn set_bucket_for_database(&mut self) -> &mut Self {
        self.set_named_bucket(DEFAULT_BUCKET)
    }

    /// Bind a blob bucket named `bucket_name` to the bound database.
    ///
    /// Leaves the current bucket untouched when no database is bound or the
    /// name is rejected.
    pub fn set_named_bucket(&mut self, bucket_name: &str) -> &mut Self {
        if let Some(ref db) = self.database {
            if let Ok(bucket) = open_bucket(db, bucket_name) {
                self.bucket = Some(bucket);
            }
        }
        self
    }

    pub fn set_state(&mut self, state: ConnectionState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn collection(&self) -> Option<&Collection<Document>> {
        self.collection.as_ref()
    }

    pub fn bucket(&self) -> Option<&GridFsBucket> {
        self.bucket.as_ref()
    }

    /// The state recorded when this handle was produced.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Whether a client is bound.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub(crate) fn require_client(&self) -> MongoResult<&Client> {
        self.client.as_ref().ok_or(MongoError::MissingConnection)
    }

    pub(crate) fn require_database(&self) -> MongoResult<&Database> {
        self.database.as_ref().ok_or(MongoError::MissingConnection)
    }

    pub(crate) fn require_collection(&self) -> MongoResult<&Collection<Document>> {
        self.collection.as_ref().ok_or(MongoError::MissingCollection)
    }

    pub(crate) fn require_bucket(&self) -> MongoResult<&GridFsBucket> {
        self.bucket.as_ref().ok_or(MongoError::MissingBucket)
    }

    /// Release the underlying connection, waiting at most [`CLOSE_TIMEOUT`].
    ///
    /// Consumes the handle. Clones made earlier share the connection and
    /// fail on use once it is closed.
    pub async fn close(self) -> MongoResult<()> {
        let Some(client) = self.client else {
            return Ok(());
        };

        debug!("Closing MongoDB connection");
        tokio::time::timeout(CLOSE_TIMEOUT, client.shutdown())
            .await
            .map_err(|_| MongoError::timeout(CLOSE_TIMEOUT))
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("connected", &self.client.is_some())
            .field("database", &self.database.as_ref().map(|d| d.name()))
            .field("collection", &self.collection.as_ref().map(|c| c.name()))
            .field("bucket", &self.bucket.is_some())
            .field("state", &self.state)
            .finish()
    }
}

/// Open a blob bucket on `database`.
pub(crate) fn open_bucket(database: &Database, bucket_name: &str) -> MongoResult<GridFsBucket> {
    if bucket_name.trim().is_empty() {
        return Err(MongoError::config("bucket name must not be empty"));
    }

    let mut options = GridFsBucketOptions::default();
    if bucket_name != DEFAULT_BUCKET {
        options.bucket_name = Some(bucket_name.to_string());
    }

    Ok(database.gridfs_bucket(options))
}
