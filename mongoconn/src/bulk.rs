//! Heterogeneous write batches.

use std::collections::HashMap;

use bson::{Bson, Document};
use serde::Serialize;

use crate::document::to_document;
use crate::error::MongoResult;

/// One write in a [`bulk_write`](crate::DocumentService::bulk_write) batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl WriteModel {
    /// Insert a serializable value.
    pub fn insert<T: Serialize>(value: &T) -> MongoResult<Self> {
        Ok(Self::InsertOne {
            document: to_document(value)?,
        })
    }

    /// Update the first match without upserting.
    pub fn update_one(filter: Document, update: Document) -> Self {
        Self::UpdateOne {
            filter,
            update,
            upsert: false,
        }
    }

    /// Delete the first match.
    pub fn delete_one(filter: Document) -> Self {
        Self::DeleteOne { filter }
    }

    /// Operation name, as reported in [`MongoError::BulkWrite`](crate::MongoError::BulkWrite).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsertOne { .. } => "insertOne",
            Self::UpdateOne { .. } => "updateOne",
            Self::UpdateMany { .. } => "updateMany",
            Self::ReplaceOne { .. } => "replaceOne",
            Self::DeleteOne { .. } => "deleteOne",
            Self::DeleteMany { .. } => "deleteMany",
        }
    }
}

/// Per-batch outcome summary.
///
/// Id maps are keyed by the position of the write in the input batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,
    pub inserted_ids: HashMap<usize, Bson>,
    pub upserted_ids: HashMap<usize, Bson>,
}

impl BulkWriteResult {
    pub(crate) fn record_insert(&mut self, index: usize, id: Bson) {
        self.inserted_count += 1;
        self.inserted_ids.insert(index, id);
    }

    pub(crate) fn record_update(
        &mut self,
        index: usize,
        matched: u64,
        modified: u64,
        upserted_id: Option<Bson>,
    ) {
        self.matched_count += matched;
        self.modified_count += modified;
        if let Some(id) = upserted_id {
            self.upserted_count += 1;
            self.upserted_ids.insert(index, id);
        }
    }

    pub(crate) fn record_delete(&mut self, deleted: u64) {
        self.deleted_count += deleted;
    }

    /// Total number of documents touched.
    pub fn affected(&self) -> u64 {
        self.inserted_count + self.modified_count + self.deleted_count + self.upserted_count
    }
}
