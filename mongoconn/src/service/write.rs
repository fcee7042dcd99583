//! Inserts, updates, deletes and bulk writes.
//!
//! `update` and `delete` treat a match count of zero as
//! [`MongoError::NoMatchingDocument`], even though the server reports
//! success. Callers that want "update if present" semantics should match on
//! [`MongoError::is_no_match`].

use bson::{Bson, Document};
use mongodb::options::{
    FindOneAndDeleteOptions, FindOneAndUpdateOptions, ReplaceOptions, UpdateOptions,
};
use mongodb::{ClientSession, Collection};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{DocumentService, ensure_matched};
use crate::bulk::{BulkWriteResult, WriteModel};
use crate::document::{from_document, to_document, to_documents};
use crate::error::{MongoError, MongoResult};

impl DocumentService {
    /// Insert one value and return its generated `_id`.
    pub async fn create<T: Serialize>(&self, model: &T) -> MongoResult<Bson> {
        let collection = self.collection()?;
        let doc = to_document(model)?;

        self.ctx
            .run(async move { Ok(collection.insert_one(doc, None).await?.inserted_id) })
            .await
    }

    /// Insert many values, returning their `_id`s in input order.
    ///
    /// An empty slice succeeds without contacting the server.
    pub async fn create_many<T: Serialize>(&self, models: &[T]) -> MongoResult<Vec<Bson>> {
        let collection = self.collection()?;
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let docs = to_documents(models)?;

        self.ctx
            .run(async move {
                let result = collection.insert_many(docs, None).await?;
                let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
                ids.sort_by_key(|(index, _)| *index);
                Ok(ids.into_iter().map(|(_, id)| id).collect())
            })
            .await
    }

    /// Insert one value within `session`.
    pub async fn create_with_session<T: Serialize>(
        &self,
        session: &mut ClientSession,
        model: &T,
    ) -> MongoResult<Bson> {
        let collection = self.collection()?;
        let doc = to_document(model)?;

        self.ctx
            .run(async move {
                let result = collection
                    .insert_one_with_session(doc, None, session)
                    .await?;
                Ok(result.inserted_id)
            })
            .await
    }

    /// Apply `update` to the first document matching `filter`.
    pub async fn update(&self, filter: Document, update: Document) -> MongoResult<()> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let result = collection.update_one(filter, update, None).await?;
                ensure_matched(result.matched_count)
            })
            .await
    }

    pub async fn update_with_session(
        &self,
        session: &mut ClientSession,
        filter: Document,
        update: Document,
    ) -> MongoResult<()> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let result = collection
                    .update_one_with_session(filter, update, None, session)
                    .await?;
                ensure_matched(result.matched_count)
            })
            .await
    }

    /// Delete the first document matching `filter`.
    pub async fn delete(&self, filter: Document) -> MongoResult<()> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let result = collection.delete_one(filter, None).await?;
                ensure_matched(result.deleted_count)
            })
            .await
    }

    pub async fn delete_with_session(
        &self,
        session: &mut ClientSession,
        filter: Document,
    ) -> MongoResult<()> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let result = collection
                    .delete_one_with_session(filter, None, session)
                    .await?;
                ensure_matched(result.deleted_count)
            })
            .await
    }

    /// Atomically update one document and return it.
    ///
    /// Returns the pre-update document unless the options ask for the new one.
    pub async fn find_one_and_update<T: DeserializeOwned>(
        &self,
        filter: Document,
        update: Document,
    ) -> MongoResult<T> {
        self.find_one_and_update_with_options(filter, update, None)
            .await
    }

    pub async fn find_one_and_update_with_options<T: DeserializeOwned>(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<FindOneAndUpdateOptions>>,
    ) -> MongoResult<T> {
        let collection = self.collection()?;
        let options = options.into();

        self.ctx
            .run(async move {
                let found = collection
                    .find_one_and_update(filter, update, options)
                    .await?;
                decode_found(collection, found)
            })
            .await
    }

    /// Atomically delete one document and return it.
    pub async fn find_one_and_delete<T: DeserializeOwned>(
        &self,
        filter: Document,
    ) -> MongoResult<T> {
        self.find_one_and_delete_with_options(filter, None).await
    }

    pub async fn find_one_and_delete_with_options<T: DeserializeOwned>(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneAndDeleteOptions>>,
    ) -> MongoResult<T> {
        let collection = self.collection()?;
        let options = options.into();

        self.ctx
            .run(async move {
                let found = collection.find_one_and_delete(filter, options).await?;
                decode_found(collection, found)
            })
            .await
    }

    /// Execute `writes` in order, stopping at the first failure.
    ///
    /// The failing write's position is reported in
    /// [`MongoError::BulkWrite`]; writes before it stay applied.
    pub async fn bulk_write(&self, writes: Vec<WriteModel>) -> MongoResult<BulkWriteResult> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let mut result = BulkWriteResult::default();
                for (index, write) in writes.into_iter().enumerate() {
                    let operation = write.kind();
                    apply_write(collection, index, write, &mut result)
                        .await
                        .map_err(|e| MongoError::BulkWrite {
                            index,
                            operation,
                            source: Box::new(e),
                        })?;
                }
                Ok(result)
            })
            .await
    }
}

fn decode_found<T: DeserializeOwned>(
    collection: &Collection<Document>,
    found: Option<Document>,
) -> MongoResult<T> {
    let doc = found.ok_or_else(|| {
        MongoError::not_found(format!(
            "no document in '{}' matches the filter",
            collection.name()
        ))
    })?;
    from_document(doc)
}

async fn apply_write(
    collection: &Collection<Document>,
    index: usize,
    write: WriteModel,
    result: &mut BulkWriteResult,
) -> MongoResult<()> {
    match write {
        WriteModel::InsertOne { document } => {
            let inserted = collection.insert_one(document, None).await?;
            result.record_insert(index, inserted.inserted_id);
        }
        WriteModel::UpdateOne {
            filter,
            update,
            upsert,
        } => {
            let updated = collection
                .update_one(filter, update, upsert_options(upsert))
                .await?;
            result.record_update(
                index,
                updated.matched_count,
                updated.modified_count,
                updated.upserted_id,
            );
        }
        WriteModel::UpdateMany {
            filter,
            update,
            upsert,
        } => {
            let updated = collection
                .update_many(filter, update, upsert_options(upsert))
                .await?;
            result.record_update(
                index,
                updated.matched_count,
                updated.modified_count,
                updated.upserted_id,
            );
        }
        WriteModel::ReplaceOne {
            filter,
            replacement,
            upsert,
        } => {
            let mut options = ReplaceOptions::default();
            options.upsert = Some(upsert);
            let replaced = collection.replace_one(filter, replacement, options).await?;
            result.record_update(
                index,
                replaced.matched_count,
                replaced.modified_count,
                replaced.upserted_id,
            );
        }
        WriteModel::DeleteOne { filter } => {
            let deleted = collection.delete_one(filter, None).await?;
            result.record_delete(deleted.deleted_count);
        }
        WriteModel::DeleteMany { filter } => {
            let deleted = collection.delete_many(filter, None).await?;
            result.record_delete(deleted.deleted_count);
        }
    }
    Ok(())
}

fn upsert_options(upsert: bool) -> UpdateOptions {
    let mut options = UpdateOptions::default();
    options.upsert = Some(upsert);
    options
}
