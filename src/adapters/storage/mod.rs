use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod s3;

pub use s3::S3Storage;

#[async_trait]
pub trait ObjectStorage: Send + Sync + std::fmt::Debug + 'static {
    async fn put(&self, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Removes every object whose key starts with `prefix` and returns how many were deleted.
    ///
    /// An empty prefix is not an error.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Verifies the backing bucket is reachable.
    async fn check(&self) -> Result<()>;
}
