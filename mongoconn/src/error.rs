//! Error types for connection and document operations.

use thiserror::Error;

/// Result type for MongoDB operations.
pub type MongoResult<T> = Result<T, MongoError>;

/// Errors that can occur while connecting or issuing document operations.
#[derive(Error, Debug)]
pub enum MongoError {
    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// BSON serialization error.
    #[error("bson error: {0}")]
    Bson(#[from] bson::ser::Error),

    /// BSON deserialization error.
    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The handle has no active collection.
    #[error("missing collection")]
    MissingCollection,

    /// The handle has no blob bucket.
    #[error("missing bucket")]
    MissingBucket,

    /// The handle was never connected.
    #[error("missing connection")]
    MissingConnection,

    /// An update or delete matched nothing.
    #[error("no matching document")]
    NoMatchingDocument,

    /// Document not found.
    #[error("document not found: {0}")]
    NotFound(String),

    /// An admin command answered without `ok: 1`.
    #[error("{command} failed: {message}")]
    Command {
        /// Name of the command that failed.
        command: &'static str,
        /// The engine's `errmsg`.
        message: String,
    },

    /// A bulk write stopped at the write with the given index.
    #[error("bulk write failed at index {index} ({operation}): {source}")]
    BulkWrite {
        /// Position of the failing write in the input batch.
        index: usize,
        /// Kind of the failing write, e.g. `updateOne`.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<MongoError>,
    },

    /// Stream I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout error.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid ObjectId.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),
}

impl MongoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an admin command error.
    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }

    /// Create a timeout error from a duration.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout(after.as_millis() as u64)
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if an update or delete matched nothing.
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatchingDocument)
    }

    /// Check if the operation was rejected locally before reaching the server.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingCollection | Self::MissingBucket | Self::MissingConnection
        )
    }
}

impl From<bson::oid::Error> for MongoError {
    fn from(err: bson::oid::Error) -> Self {
        MongoError::InvalidObjectId(err.to_string())
    }
}
