//! Assemble then publish, fail-fast.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::assemble::{assemble, AssemblyError};
use crate::config::ProjectConfig;
use crate::dependencies::DependencyPreparer;
use crate::publish::{publish, PublishError, PublishReport};
use crate::store::BucketStore;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub archive: PathBuf,
    pub published: PublishReport,
}

pub async fn deploy(
    config: &ProjectConfig,
    preparer: &dyn DependencyPreparer,
    store: &dyn BucketStore,
) -> Result<DeployReport, PipelineError> {
    info!(project = %config.name, version = %config.version, "[DEPLOY] Starting");

    let archive = assemble(config, preparer).map_err(|e| {
        error!(error = %e, "[DEPLOY][ERROR] Assembly failed");
        e
    })?;

    let published = publish(config, store, &archive).await.map_err(|e| {
        error!(error = %e, "[DEPLOY][ERROR] Publish failed");
        e
    })?;

    info!(archive = %archive.display(), keys = ?published.keys, "[DEPLOY] Complete");
    Ok(DeployReport { archive, published })
}
