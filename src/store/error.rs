//! Error types for bucket store operations.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The bucket does not exist in the backing store.
    #[error("no such bucket: {bucket}")]
    NoSuchBucket { bucket: String },

    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The backend rejected the request for lack of permission.
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// Store settings could not be turned into a client.
    #[error("invalid store settings: {reason}")]
    InvalidSettings { reason: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

impl StoreError {
    /// Maps an `object_store` failure on `bucket` to the closest variant.
    pub fn from_object_store(err: object_store::Error, bucket: &str) -> Self {
        match &err {
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => StoreError::AccessDenied {
                message: err.to_string(),
            },
            _ if mentions_missing_bucket(&err) => StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            },
            _ => StoreError::ObjectStore(err),
        }
    }

    pub fn is_no_such_bucket(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. })
    }
}

// S3 reports a missing bucket as a generic client error carrying the code.
fn mentions_missing_bucket(err: &object_store::Error) -> bool {
    err.to_string().contains("NoSuchBucket")
}
