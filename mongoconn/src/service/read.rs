//! Lookups, cursors, counts and aggregation.

use bson::{Bson, Document, doc};
use futures::{TryStreamExt, future};
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{ClientSession, Cursor};
use serde::de::DeserializeOwned;

use super::DocumentService;
use crate::document::from_document;
use crate::error::{MongoError, MongoResult};

impl DocumentService {
    /// First document matching `filter`.
    pub async fn find<T: DeserializeOwned>(&self, filter: Document) -> MongoResult<T> {
        self.find_one(filter, None).await
    }

    /// First document matching `filter`, honoring sort/projection/skip options.
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> MongoResult<T> {
        let collection = self.collection()?;
        let options = options.into();

        self.ctx
            .run(async move {
                let found = collection.find_one(filter, options).await?;
                let doc = found.ok_or_else(|| no_document(collection.name()))?;
                from_document(doc)
            })
            .await
    }

    /// Every document in the collection.
    pub async fn find_all<T: DeserializeOwned>(&self) -> MongoResult<Vec<T>> {
        self.filter(doc! {}).await
    }

    /// Every document matching `filter`.
    pub async fn filter<T: DeserializeOwned>(&self, filter: Document) -> MongoResult<Vec<T>> {
        self.find_with_options(filter, None).await
    }

    pub async fn find_with_options<T: DeserializeOwned>(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> MongoResult<Vec<T>> {
        let collection = self.collection()?;
        let options = options.into();

        self.ctx
            .run(async move {
                let cursor = collection.find(filter, options).await?;
                decode_all(cursor).await
            })
            .await
    }

    /// Open a cursor without draining it.
    ///
    /// `projection`, when given, replaces the projection in `options`. The
    /// caller owns the cursor; dropping it releases the server-side cursor.
    pub async fn find_with_options_return_cursor(
        &self,
        filter: Document,
        projection: Option<Document>,
        options: Option<FindOptions>,
    ) -> MongoResult<Cursor<Document>> {
        let collection = self.collection()?;

        let mut options = options.unwrap_or_default();
        if projection.is_some() {
            options.projection = projection;
        }

        self.ctx
            .run(async move { Ok(collection.find(filter, options).await?) })
            .await
    }

    /// First document matching `filter` within `session`.
    pub async fn find_with_session<T: DeserializeOwned>(
        &self,
        session: &mut ClientSession,
        filter: Document,
    ) -> MongoResult<T> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let found = collection
                    .find_one_with_session(filter, None, session)
                    .await?;
                let doc = found.ok_or_else(|| no_document(collection.name()))?;
                from_document(doc)
            })
            .await
    }

    pub async fn count(&self, filter: Document) -> MongoResult<u64> {
        let collection = self.collection()?;

        self.ctx
            .run(async move { Ok(collection.count_documents(filter, None).await?) })
            .await
    }

    /// Distinct values of `field` among documents matching `filter`.
    pub async fn distinct(&self, field: &str, filter: Document) -> MongoResult<Vec<Bson>> {
        let collection = self.collection()?;

        self.ctx
            .run(async move { Ok(collection.distinct(field, filter, None).await?) })
            .await
    }

    /// Run `pipeline` and decode every result.
    pub async fn aggregate<T: DeserializeOwned>(
        &self,
        pipeline: Vec<Document>,
    ) -> MongoResult<Vec<T>> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let cursor = collection.aggregate(pipeline, None).await?;
                decode_all(cursor).await
            })
            .await
    }

    /// Every document, without `_id`.
    pub async fn list_all_documents(&self) -> MongoResult<Vec<Document>> {
        self.aggregate(list_all_pipeline()).await
    }
}

pub(crate) fn list_all_pipeline() -> Vec<Document> {
    vec![
        doc! { "$match": {} },
        doc! { "$project": { "_id": 0 } },
    ]
}

/// Drain a cursor, decoding each document.
///
/// The cursor is dropped on every exit path, which releases it server-side.
pub(crate) async fn decode_all<T: DeserializeOwned>(cursor: Cursor<Document>) -> MongoResult<Vec<T>> {
    cursor
        .map_err(MongoError::from)
        .and_then(|doc| future::ready(from_document::<T>(doc)))
        .try_collect()
        .await
}

fn no_document(collection: &str) -> MongoError {
    MongoError::not_found(format!("no document in '{}' matches the filter", collection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_all_pipeline_strips_id() {
        let pipeline = list_all_pipeline();
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline[0].get_document("$match").unwrap().is_empty());
        assert_eq!(
            pipeline[1]
                .get_document("$project")
                .unwrap()
                .get_i32("_id")
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_no_document_message() {
        let err = no_document("users");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "document not found: no document in 'users' matches the filter"
        );
    }
}
