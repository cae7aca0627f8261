//! In-memory buckets backed by `object_store::memory::InMemory`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, ObjectStore, PutOptions, PutPayload,
};

use super::{BucketStore, PutObject, StoreError, StoreResult};

const ACCESS_CONTROL_METADATA: &str = "access-control";

/// Buckets must be created up front; writes to unknown buckets fail.
#[derive(Default)]
pub struct MemoryBucketStore {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
}

/// An object read back from a [`MemoryBucketStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub access_control: Option<String>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store.create_bucket(bucket);
        store
    }

    /// Creating an existing bucket keeps its objects.
    pub fn create_bucket(&self, bucket: &str) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()));
    }

    fn bucket(&self, bucket: &str) -> StoreResult<Arc<InMemory>> {
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .get(bucket)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            })
    }

    /// All keys in `bucket`, sorted.
    pub async fn object_keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let inner = self.bucket(bucket)?;
        let entries: Vec<_> = inner.list(None).try_collect().await?;
        let mut keys: Vec<String> = entries
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let inner = self.bucket(bucket)?;
        let result = inner
            .get_opts(&Path::from(key), GetOptions::default())
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                other => StoreError::ObjectStore(other),
            })?;
        let access_control = result
            .attributes
            .get(&Attribute::Metadata(ACCESS_CONTROL_METADATA.into()))
            .map(|value| value.as_ref().to_string());
        let body = result.bytes().await?;
        Ok(StoredObject {
            body,
            access_control,
        })
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.bucket(bucket).is_ok())
    }

    async fn put_object(&self, req: PutObject) -> StoreResult<()> {
        let inner = self.bucket(&req.bucket)?;
        let mut attributes = Attributes::new();
        if let Some(acl) = req.access_control {
            attributes.insert(
                Attribute::Metadata(ACCESS_CONTROL_METADATA.into()),
                AttributeValue::from(acl),
            );
        }
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };
        inner
            .put_opts(&Path::from(req.key), PutPayload::from_bytes(req.body), opts)
            .await?;
        Ok(())
    }
}
