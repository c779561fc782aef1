use crate::adapters::storage::ObjectStorage;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;

// DeleteObjects accepts at most 1000 keys per call
const DELETE_BATCH: usize = 1000;

#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    #[must_use]
    pub const fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn delete_batch(&self, keys: Vec<String>) -> Result<u64> {
        let count = keys.len() as u64;
        let objects = keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let output = self.client.delete_objects().bucket(&self.bucket).delete(delete).send().await.map_err(|e| {
            tracing::error!(error = ?e, "S3 batch delete failed");
            AppError::Storage(e.to_string())
        })?;

        if let Some(first) = output.errors().first() {
            tracing::error!(
                key = ?first.key(),
                code = ?first.code(),
                failed = output.errors().len(),
                "S3 refused to delete some objects"
            );
            return Err(AppError::Storage(format!(
                "{} objects could not be deleted, first: {:?}",
                output.errors().len(),
                first.key()
            )));
        }

        Ok(count)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(ToString::to_string))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, key = %key, "S3 Upload failed");
                AppError::Storage(e.to_string())
            })?;

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(error = ?e, prefix = %prefix, "S3 List failed");
                    AppError::Storage(e.to_string())
                })?;

            let keys: Vec<String> = page.contents().iter().filter_map(|o| o.key().map(ToString::to_string)).collect();
            for chunk in keys.chunks(DELETE_BATCH) {
                deleted += self.delete_batch(chunk.to_vec()).await?;
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::debug!(prefix = %prefix, deleted, "Prefix purged");
        Ok(deleted)
    }

    async fn check(&self) -> Result<()> {
        self.client.head_bucket().bucket(&self.bucket).send().await.map_err(|e| {
            tracing::debug!(error = ?e, bucket = %self.bucket, "S3 Head bucket failed");
            AppError::Storage(e.to_string())
        })?;
        Ok(())
    }
}
