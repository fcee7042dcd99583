//! Dial and ping seam between the connection manager and the driver.

use async_trait::async_trait;
use bson::doc;
use mongodb::Client;
use mongodb::options::{ReadPreference, SelectionCriteria};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{MongoError, MongoResult};

/// Opens and validates connections.
///
/// The connection manager owns the deadline; implementations only perform
/// the round-trips.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a client for `url`.
    async fn dial(&self, url: &str, config: &ConnectionConfig) -> MongoResult<Client>;

    /// Check that the primary answers.
    async fn ping(&self, client: &Client) -> MongoResult<()>;
}

/// Dialer backed by the official MongoDB driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverDialer;

#[async_trait]
impl Dialer for DriverDialer {
    async fn dial(&self, url: &str, config: &ConnectionConfig) -> MongoResult<Client> {
        let options = config.to_client_options(url).await?;

        let client = Client::with_options(options)
            .map_err(|e| MongoError::connection(format!("failed to create client: {}", e)))?;

        debug!(database = %config.database, "MongoDB client created");
        Ok(client)
    }

    async fn ping(&self, client: &Client) -> MongoResult<()> {
        client
            .database("admin")
            .run_command(
                doc! { "ping": 1 },
                SelectionCriteria::ReadPreference(ReadPreference::Primary),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<D: Dialer + ?Sized> Dialer for std::sync::Arc<D> {
    async fn dial(&self, url: &str, config: &ConnectionConfig) -> MongoResult<Client> {
        (**self).dial(url, config).await
    }

    async fn ping(&self, client: &Client) -> MongoResult<()> {
        (**self).ping(client).await
    }
}
