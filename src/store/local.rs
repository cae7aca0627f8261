//! Buckets as directories under a local root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use object_store::local::LocalFileSystem;
use object_store::{ObjectStore, PutOptions, PutPayload};
use tracing::debug;

use super::{BucketStore, PutObject, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct LocalBucketStore {
    root: PathBuf,
}

impl LocalBucketStore {
    /// `root` must already exist; buckets are its subdirectories.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::InvalidSettings {
                reason: format!("local store root {} is not a directory", root.display()),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }
}

#[async_trait]
impl BucketStore for LocalBucketStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.bucket_dir(bucket).is_dir())
    }

    async fn put_object(&self, req: PutObject) -> StoreResult<()> {
        let dir = self.bucket_dir(&req.bucket);
        if !dir.is_dir() {
            return Err(StoreError::NoSuchBucket { bucket: req.bucket });
        }
        if let Some(acl) = &req.access_control {
            debug!(bucket = %req.bucket, key = %req.key, acl = %acl, "Access control ignored by local store");
        }
        let fs = LocalFileSystem::new_with_prefix(&dir)?;
        fs.put_opts(
            &object_store::path::Path::from(req.key),
            PutPayload::from_bytes(req.body),
            PutOptions::default(),
        )
        .await
        .map_err(|e| StoreError::from_object_store(e, &req.bucket))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_objects_below_the_bucket_dir() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("zips")).unwrap();
        let store = LocalBucketStore::new(tmp.path()).unwrap();

        assert!(store.bucket_exists("zips").await.unwrap());
        assert!(!store.bucket_exists("other").await.unwrap());

        store
            .put_object(PutObject {
                bucket: "zips".into(),
                key: "v1/palp.zip".into(),
                body: Bytes::from_static(b"testdata"),
                access_control: None,
            })
            .await
            .unwrap();

        let written = std::fs::read(tmp.path().join("zips/v1/palp.zip")).unwrap();
        assert_eq!(written, b"testdata");
    }

    #[tokio::test]
    async fn refuses_missing_bucket() {
        let tmp = tempdir().unwrap();
        let store = LocalBucketStore::new(tmp.path()).unwrap();
        let err = store
            .put_object(PutObject {
                bucket: "zips".into(),
                key: "k".into(),
                body: Bytes::new(),
                access_control: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_no_such_bucket());
        assert!(!tmp.path().join("zips").exists());
    }
}
