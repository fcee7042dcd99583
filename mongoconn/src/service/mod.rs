//! Document-store facade over a [`StorageHandle`].
//!
//! Operations are grouped by capability:
//! - [`read`]: lookups, cursors, counts and aggregation
//! - [`write`]: inserts, updates, deletes and bulk writes
//! - [`admin`]: indexes, backup and restore
//! - [`blob`]: blob bucket upload and download
//! - [`transaction`]: session-scoped units of work
//!
//! Document operations fail with [`MongoError::MissingCollection`] when no
//! collection is selected, and blob operations with
//! [`MongoError::MissingBucket`] when no bucket is bound. Neither check
//! touches the network.
//!
//! Every network round-trip runs under the service's [`OperationContext`].

pub mod admin;
pub mod blob;
pub mod read;
pub mod transaction;
pub mod write;

use bson::Document;
use mongodb::Collection;

use crate::context::OperationContext;
use crate::error::{MongoError, MongoResult};
use crate::handle::StorageHandle;

/// Facade exposing document operations on a handle's active collection.
///
/// Cheap to clone; clones share the underlying connection.
#[derive(Debug, Clone, Default)]
pub struct DocumentService {
    handle: StorageHandle,
    ctx: OperationContext,
}

impl DocumentService {
    /// Wrap a handle.
    pub fn new(handle: StorageHandle) -> Self {
        Self {
            handle,
            ctx: OperationContext::default(),
        }
    }

    /// A service over the same handle, bound to `ctx`.
    pub fn with_context(&self, ctx: OperationContext) -> Self {
        Self {
            handle: self.handle.clone(),
            ctx,
        }
    }

    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }

    pub fn handle(&self) -> &StorageHandle {
        &self.handle
    }

    pub fn into_handle(self) -> StorageHandle {
        self.handle
    }

    /// Name of the active collection.
    pub fn model_name(&self) -> Option<&str> {
        self.handle.collection().map(|c| c.name())
    }

    fn collection(&self) -> MongoResult<&Collection<Document>> {
        self.handle.require_collection()
    }
}

/// Promote a zero-effect update or delete to an error.
pub(crate) fn ensure_matched(count: u64) -> MongoResult<()> {
    if count == 0 {
        return Err(MongoError::NoMatchingDocument);
    }
    Ok(())
}
