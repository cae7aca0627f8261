//! Publishing: the assembled archive goes to two keys in the bucket.
//!
//! ```text
//! {bucket_prefix}v{version}/{archive file}   # version-tagged key, written first
//! {bucket_prefix}latest/{archive file}       # latest alias, written second
//! ```
//!
//! The bucket is checked before anything is written, so a missing bucket
//! leaves the store untouched. A check the credentials may not perform is
//! skipped and the uploads decide. A failure on the second upload does not roll
//! back the first.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ProjectConfig;
use crate::store::{BucketStore, PutObject, StoreError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to read archive {}: {source}", path.display())]
    ReadArchive { path: PathBuf, source: io::Error },

    #[error("archive path {} has no usable file name", path.display())]
    InvalidArchiveName { path: PathBuf },

    #[error("no bucket name configured")]
    MissingBucketName,

    #[error("bucket '{bucket}' does not exist")]
    NoSuchBucket { bucket: String },

    #[error("failed to check bucket '{bucket}': {source}")]
    BucketCheck { bucket: String, source: StoreError },

    #[error("failed to upload {bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        source: StoreError,
    },
}

/// What a successful publish wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReport {
    pub bucket: String,
    /// Keys in upload order: version-tagged first, latest second.
    pub keys: Vec<String>,
    pub size: usize,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
}

/// The version-tagged and latest keys for `archive_path`, in upload order.
pub fn object_keys(config: &ProjectConfig, archive_path: &Path) -> Result<[String; 2], PublishError> {
    let file_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PublishError::InvalidArchiveName {
            path: archive_path.to_path_buf(),
        })?;
    let prefix = &config.bucket_prefix;
    Ok([
        format!("{prefix}v{}/{file_name}", config.version),
        format!("{prefix}latest/{file_name}"),
    ])
}

/// Uploads the archive at `archive_path` to the configured bucket.
pub async fn publish(
    config: &ProjectConfig,
    store: &dyn BucketStore,
    archive_path: &Path,
) -> Result<PublishReport, PublishError> {
    let body = tokio::fs::read(archive_path).await.map_err(|source| {
        error!(archive = %archive_path.display(), error = ?source, "Cannot read archive");
        PublishError::ReadArchive {
            path: archive_path.to_path_buf(),
            source,
        }
    })?;
    let body = Bytes::from(body);

    let bucket = config
        .bucket_name
        .clone()
        .ok_or(PublishError::MissingBucketName)?;
    let keys = object_keys(config, archive_path)?;

    match store.bucket_exists(&bucket).await {
        Ok(true) => {}
        Ok(false) => {
            error!(bucket = %bucket, "Bucket does not exist, nothing uploaded");
            return Err(PublishError::NoSuchBucket { bucket });
        }
        // Uploaders are often granted PutObject without ListBucket; the puts
        // below still map a missing bucket to `NoSuchBucket`.
        Err(StoreError::AccessDenied { message }) => {
            warn!(bucket = %bucket, error = %message, "Bucket check denied, uploading anyway");
        }
        Err(source) => {
            error!(bucket = %bucket, error = %source, "Bucket check failed");
            return Err(PublishError::BucketCheck { bucket, source });
        }
    }

    for key in &keys {
        info!(bucket = %bucket, key = %key, size = body.len(), "Uploading archive");
        let req = PutObject {
            bucket: bucket.clone(),
            key: key.clone(),
            body: body.clone(),
            access_control: config.access_control.clone(),
        };
        store.put_object(req).await.map_err(|source| {
            error!(bucket = %bucket, key = %key, error = %source, "Upload failed");
            match source {
                StoreError::NoSuchBucket { bucket } => PublishError::NoSuchBucket { bucket },
                source => PublishError::Upload {
                    bucket: bucket.clone(),
                    key: key.clone(),
                    source,
                },
            }
        })?;
    }

    let sha256 = format!("{:x}", Sha256::digest(&body));
    info!(bucket = %bucket, sha256 = %sha256, "Archive published");
    Ok(PublishReport {
        bucket,
        keys: keys.to_vec(),
        size: body.len(),
        sha256,
    })
}
