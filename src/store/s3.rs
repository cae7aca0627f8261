//! Amazon S3 (and S3-compatible) buckets.
//!
//! Credentials and the default region are read from the environment by
//! `AmazonS3Builder::from_env`. One client is built per call: the bucket and
//! the `x-amz-acl` header are part of the client configuration.

use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::{ClientOptions, ObjectStore, PutOptions, PutPayload};
use tracing::debug;

use super::{BucketStore, PutObject, StoreError, StoreResult};

const ACL_HEADER: &str = "x-amz-acl";

#[derive(Debug, Clone, Default)]
pub struct S3BucketStore {
    region: Option<String>,
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl S3BucketStore {
    pub fn new(region: Option<String>, endpoint: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            region,
            endpoint,
            timeout,
        }
    }

    fn client(&self, bucket: &str, access_control: Option<&str>) -> StoreResult<AmazonS3> {
        let mut options = ClientOptions::new();
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        if let Some(acl) = access_control {
            options = options.with_default_headers(acl_headers(acl)?);
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_client_options(options);
        if let Some(region) = &self.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        builder.build().map_err(|e| StoreError::InvalidSettings {
            reason: format!("failed to create S3 client for bucket {bucket}: {e}"),
        })
    }
}

fn acl_headers(acl: &str) -> StoreResult<HeaderMap> {
    let value = HeaderValue::from_str(acl).map_err(|e| StoreError::InvalidSettings {
        reason: format!("invalid access control value '{acl}': {e}"),
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(ACL_HEADER), value);
    Ok(headers)
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        let client = self.client(bucket, None)?;
        match client.list_with_delimiter(None).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => match StoreError::from_object_store(e, bucket) {
                StoreError::NoSuchBucket { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn put_object(&self, req: PutObject) -> StoreResult<()> {
        let client = self.client(&req.bucket, req.access_control.as_deref())?;
        debug!(bucket = %req.bucket, key = %req.key, size = req.body.len(), "PUT object");
        client
            .put_opts(
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

    #[test]
    fn acl_is_sent_as_canned_acl_header() {
        let headers = acl_headers("bucket-owner-full-control").unwrap();
        assert_eq!(
            headers.get(ACL_HEADER).and_then(|v| v.to_str().ok()),
            Some("bucket-owner-full-control")
        );
    }

    #[test]
    fn acl_with_control_characters_is_rejected() {
        let err = acl_headers("bad\nvalue").unwrap_err();
        assert!(matches!(err, StoreError::InvalidSettings { .. }));
    }
}
