//! Indexes and admin commands.

use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::IndexModel;
use mongodb::error::ErrorKind;
use mongodb::options::IndexOptions;

use super::DocumentService;
use crate::document::{command_error, command_succeeded, to_document};
use crate::error::{MongoError, MongoResult};

impl DocumentService {
    /// Create an index on the active collection and return its name.
    pub async fn create_index_with_options(
        &self,
        keys: Document,
        options: IndexOptions,
    ) -> MongoResult<String> {
        let collection = self.collection()?;
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.ctx
            .run(async move { Ok(collection.create_index(model, None).await?.index_name) })
            .await
    }

    /// Describe every index on the active collection.
    pub async fn list_indexes(&self) -> MongoResult<Vec<Document>> {
        let collection = self.collection()?;

        self.ctx
            .run(async move {
                let models: Vec<IndexModel> = collection.list_indexes(None).await?.try_collect().await?;
                models.iter().map(to_document).collect()
            })
            .await
    }

    /// Ask the server to dump the bound database to `target`.
    pub async fn backup_database(&self, target: &str) -> MongoResult<()> {
        let database = self.handle.require_database()?;
        let command = doc! {
            "mongodump": 1,
            "db": database.name(),
            "out": target,
        };
        self.run_admin_command("backup", command).await
    }

    /// Ask the server to restore the bound database from `source`.
    pub async fn restore_database(&self, source: &str) -> MongoResult<()> {
        let database = self.handle.require_database()?;
        let command = doc! {
            "mongorestore": 1,
            "db": database.name(),
            "dir": source,
        };
        self.run_admin_command("restore", command).await
    }

    async fn run_admin_command(&self, name: &'static str, command: Document) -> MongoResult<()> {
        let admin = self.handle.require_client()?.database("admin");

        self.ctx
            .run(async move {
                let reply = admin
                    .run_command(command, None)
                    .await
                    .map_err(|e| command_failure(name, e))?;
                if command_succeeded(&reply) {
                    Ok(())
                } else {
                    Err(MongoError::command(name, command_error(&reply)))
                }
            })
            .await
    }
}

/// Report a server-side command rejection with the engine's own `errmsg`.
fn command_failure(name: &'static str, error: mongodb::error::Error) -> MongoError {
    if let ErrorKind::Command(failure) = error.kind.as_ref() {
        return MongoError::command(name, failure.message.clone());
    }
    MongoError::Driver(error)
}
