//! Project configuration for a packaging run.
//!
//! A [`ProjectConfig`] is built once (usually by [`crate::load_config`]) and
//! passed by reference to the assembler and the publisher. It never changes
//! during a run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Access control applied to uploaded objects unless configured otherwise.
pub const DEFAULT_ACCESS_CONTROL: &str = "bucket-owner-full-control";

/// Installer used by [`crate::dependencies::PipDependencyPreparer`].
pub const DEFAULT_INSTALLER: &str = "pip";

const DEFAULT_TARGET_DIR: &str = "target";
const DEFAULT_SOURCE_DIR: &str = "src/main/python";
const DEPENDENCIES_DIR_NAME: &str = "lambda_dependencies";
const STAGING_DIR_NAME: &str = "lambda_package";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    /// Project name; also the default archive name.
    pub name: String,
    /// Version string used verbatim in the version-tagged object key.
    pub version: String,
    /// Directory relative paths were resolved against.
    pub base_dir: PathBuf,
    pub target_dir: PathBuf,
    pub source_dir: PathBuf,
    pub scripts_dir: Option<PathBuf>,
    /// Where third-party dependencies are materialized before staging.
    pub dependencies_dir: PathBuf,
    /// Requirement specifiers handed to the installer.
    pub dependencies: Vec<String>,
    /// Top-level packages removed from the dependency directory after install.
    pub dependency_excludes: Vec<String>,
    pub installer: String,
    /// Archive base name, without the `.zip` extension.
    pub archive_name: String,
    pub bucket_name: Option<String>,
    /// Prepended to both object keys.
    pub bucket_prefix: String,
    pub access_control: Option<String>,
    pub store: StoreSettings,
}

impl ProjectConfig {
    /// Configuration with the conventional project layout under `base_dir`.
    pub fn new(name: impl Into<String>, version: impl Into<String>, base_dir: impl AsRef<Path>) -> Self {
        let name = name.into();
        let base_dir = base_dir.as_ref().to_path_buf();
        let target_dir = base_dir.join(DEFAULT_TARGET_DIR);
        Self {
            archive_name: name.clone(),
            name,
            version: version.into(),
            source_dir: base_dir.join(DEFAULT_SOURCE_DIR),
            scripts_dir: None,
            dependencies_dir: target_dir.join(DEPENDENCIES_DIR_NAME),
            target_dir,
            base_dir,
            dependencies: Vec::new(),
            dependency_excludes: Vec::new(),
            installer: DEFAULT_INSTALLER.to_string(),
            bucket_name: None,
            bucket_prefix: String::new(),
            access_control: Some(DEFAULT_ACCESS_CONTROL.to_string()),
            store: StoreSettings::default(),
        }
    }

    /// Moves the target directory along with the default dependency directory.
    pub fn set_target_dir(&mut self, target_dir: PathBuf) {
        self.dependencies_dir = target_dir.join(DEPENDENCIES_DIR_NAME);
        self.target_dir = target_dir;
    }

    /// `<target>/<archive_name>.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.target_dir.join(format!("{}.zip", self.archive_name))
    }

    /// Ephemeral tree the archive is serialized from.
    pub fn staging_dir(&self) -> PathBuf {
        self.target_dir.join(STAGING_DIR_NAME)
    }

    /// Source roots in copy order, after the dependency directory.
    pub fn source_roots(&self) -> Vec<&Path> {
        let mut roots = vec![self.source_dir.as_path()];
        if let Some(scripts) = &self.scripts_dir {
            roots.push(scripts.as_path());
        }
        roots
    }

    pub fn trace_loaded(&self) {
        info!(
            project = %self.name,
            version = %self.version,
            target_dir = %self.target_dir.display(),
            archive = %self.archive_path().display(),
            bucket = self.bucket_name.as_deref().unwrap_or("<none>"),
            "Loaded project configuration"
        );
        debug!(?self, "Project configuration (full debug)");
    }
}

/// Where published archives go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreSettings {
    /// Amazon S3 or an S3-compatible service; credentials come from the environment.
    S3 {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    /// A directory per bucket under `root`.
    Local { root: PathBuf },
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::S3 {
            region: None,
            endpoint: None,
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_conventional_layout() {
        let config = ProjectConfig::new("palp", "123", "/work/palp");

        assert_eq!(config.target_dir, PathBuf::from("/work/palp/target"));
        assert_eq!(config.source_dir, PathBuf::from("/work/palp/src/main/python"));
        assert_eq!(
            config.dependencies_dir,
            PathBuf::from("/work/palp/target/lambda_dependencies")
        );
        assert_eq!(config.archive_path(), PathBuf::from("/work/palp/target/palp.zip"));
        assert_eq!(config.access_control.as_deref(), Some(DEFAULT_ACCESS_CONTROL));
        assert_eq!(config.store, StoreSettings::default());
    }

    #[test]
    fn source_roots_include_scripts_when_configured() {
        let mut config = ProjectConfig::new("palp", "1", "/p");
        assert_eq!(config.source_roots().len(), 1);

        config.scripts_dir = Some(PathBuf::from("/p/src/main/scripts"));
        assert_eq!(
            config.source_roots(),
            vec![Path::new("/p/src/main/python"), Path::new("/p/src/main/scripts")]
        );
    }
}
