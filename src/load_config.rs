//! `load_config` module: reads a project's YAML build file into a [`ProjectConfig`].
//!
//! This is the only place user-supplied YAML is parsed. Relative paths are
//! resolved against the directory containing the file, and the bucket name
//! can be overridden from the environment (`LAMBDA_BUCKET_NAME`) so CI can
//! point the same project at different buckets.
//!
//! All errors use `anyhow::Error` and surface at the CLI boundary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::{ProjectConfig, StoreSettings, DEFAULT_ACCESS_CONTROL, DEFAULT_INSTALLER};

/// Environment variable that overrides `bucket_name`.
pub const BUCKET_NAME_ENV: &str = "LAMBDA_BUCKET_NAME";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    name: String,
    version: RawVersion,
    #[serde(default)]
    target_dir: Option<PathBuf>,
    #[serde(default)]
    source_dir: Option<PathBuf>,
    #[serde(default)]
    scripts_dir: Option<PathBuf>,
    #[serde(default)]
    dependencies_dir: Option<PathBuf>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    dependency_excludes: Vec<String>,
    #[serde(default)]
    installer: Option<String>,
    #[serde(default)]
    archive_name: Option<String>,
    #[serde(default)]
    bucket_name: Option<String>,
    #[serde(default)]
    bucket_prefix: String,
    // Absent means the default; an explicit `null` disables access control.
    #[serde(default = "default_access_control")]
    access_control: Option<String>,
    #[serde(default)]
    store: StoreSettings,
}

/// Versions may be written as integers (`123`) or strings (`"1.2.0"`).
///
/// A bare `1.10` is a YAML float and has already lost its trailing zero by
/// the time it is deserialized, so it is rejected instead of guessed at.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Number(i64),
    Float(f64),
    Text(String),
}

impl RawVersion {
    fn into_string(self) -> Result<String> {
        match self {
            RawVersion::Number(n) => Ok(n.to_string()),
            RawVersion::Float(f) => Err(anyhow::anyhow!(
                "version {f:?} is a YAML number; quote it (e.g. version: \"{f:?}\")"
            )),
            RawVersion::Text(s) => Ok(s),
        }
    }
}

fn default_access_control() -> Option<String> {
    Some(DEFAULT_ACCESS_CONTROL.to_string())
}

/// Loads the build file at `path` and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProjectConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path_ref)
    })?;

    let base_dir = match path_ref.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let mut config = resolve(raw, &base_dir).map_err(|e| {
        error!(error = %e, config_path = ?path_ref, "Invalid configuration");
        e
    })?;

    if let Ok(bucket) = std::env::var(BUCKET_NAME_ENV) {
        if !bucket.is_empty() {
            info!(bucket = %bucket, env = BUCKET_NAME_ENV, "Bucket name overridden from environment");
            config.bucket_name = Some(bucket);
        }
    }

    config.trace_loaded();
    Ok(config)
}

fn resolve(raw: RawConfig, base_dir: &Path) -> Result<ProjectConfig> {
    let mut config = ProjectConfig::new(raw.name, raw.version.into_string()?, base_dir);
    let at_base = |p: PathBuf| base_dir.join(p);

    if let Some(target) = raw.target_dir {
        config.set_target_dir(at_base(target));
    }
    if let Some(source) = raw.source_dir {
        config.source_dir = at_base(source);
    }
    config.scripts_dir = raw.scripts_dir.map(at_base);
    if let Some(deps) = raw.dependencies_dir {
        config.dependencies_dir = at_base(deps);
    }
    config.dependencies = raw.dependencies;
    config.dependency_excludes = raw.dependency_excludes;
    config.installer = raw.installer.unwrap_or_else(|| DEFAULT_INSTALLER.to_string());
    if let Some(archive_name) = raw.archive_name {
        config.archive_name = archive_name;
    }
    config.bucket_name = raw.bucket_name;
    config.bucket_prefix = raw.bucket_prefix;
    config.access_control = raw.access_control;
    config.store = match raw.store {
        StoreSettings::Local { root } => StoreSettings::Local { root: at_base(root) },
        s3 => s3,
    };
    Ok(config)
}
