//! # store: bucket-level object storage for published archives
//!
//! The publisher talks to storage only through the [`BucketStore`] trait:
//! "does this bucket exist" and "put these bytes at this key". Backends are
//! built on the `object_store` crate:
//!
//! - [`S3BucketStore`]: Amazon S3 and S3-compatible services
//! - [`LocalBucketStore`]: one directory per bucket, for local runs
//! - [`MemoryBucketStore`]: in-memory buckets, for tests
//!
//! The trait is annotated for `mockall`, so tests can also script failures
//! (e.g. the second of two uploads being rejected).

pub mod error;
pub mod local;
pub mod memory;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;

pub use error::{StoreError, StoreResult};
pub use local::LocalBucketStore;
pub use memory::{MemoryBucketStore, StoredObject};
pub use s3::S3BucketStore;

use crate::config::StoreSettings;

/// One object write.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    /// Canned access-control value, e.g. `bucket-owner-full-control`.
    pub access_control: Option<String>,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Whether `bucket` exists and is reachable with the current credentials.
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    /// Write (or overwrite) a single object.
    async fn put_object(&self, req: PutObject) -> StoreResult<()>;
}

/// Builds the backend described by `settings`.
pub fn build_store(settings: &StoreSettings) -> StoreResult<Arc<dyn BucketStore>> {
    let store: Arc<dyn BucketStore> = match settings {
        StoreSettings::S3 {
            region,
            endpoint,
            timeout_secs,
        } => Arc::new(S3BucketStore::new(
            region.clone(),
            endpoint.clone(),
            timeout_secs.map(std::time::Duration::from_secs),
        )),
        StoreSettings::Local { root } => Arc::new(LocalBucketStore::new(root)?),
    };
    Ok(store)
}
