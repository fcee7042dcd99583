//! Blob bucket upload and download.

use bson::{Bson, oid::ObjectId};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::DocumentService;
use crate::document::expect_object_id;
use crate::error::{MongoError, MongoResult};

impl DocumentService {
    /// Store the bytes of `content` under `filename` and return the new id.
    ///
    /// The id is taken from the stream before any byte is written. If
    /// copying fails the partial upload is aborted; dropping the stream early
    /// aborts it as well.
    pub async fn upload_file<R>(&self, filename: &str, mut content: R) -> MongoResult<ObjectId>
    where
        R: AsyncRead + Unpin + Send,
    {
        let bucket = self.handle.require_bucket()?;

        self.ctx
            .run(async move {
                let mut stream = bucket.open_upload_stream(filename, None);
                let id = expect_object_id(stream.id())?;

                match futures::io::copy(&mut content, &mut stream).await {
                    Ok(_) => {
                        stream.close().await?;
                        Ok(id)
                    }
                    Err(e) => {
                        // Abort failure is ignored; the copy error is returned.
                        let _ = stream.abort().await;
                        Err(MongoError::from(e))
                    }
                }
            })
            .await
    }

    /// Read the whole blob stored under `id` into memory.
    pub async fn download_file(&self, id: ObjectId) -> MongoResult<Vec<u8>> {
        let bucket = self.handle.require_bucket()?;

        self.ctx
            .run(async move {
                let mut stream = bucket.open_download_stream(Bson::ObjectId(id)).await?;
                let mut buffer = Vec::new();
                stream.read_to_end(&mut buffer).await?;
                Ok(buffer)
            })
            .await
    }
}
