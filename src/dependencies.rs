//! Dependency preparation: materializes third-party packages into a directory
//! the assembler can copy from.
//!
//! The assembler only sees the [`DependencyPreparer`] trait, so a test (or a
//! project whose dependencies are installed by another step) can hand it any
//! directory without touching the assembly logic.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use mockall::automock;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::ProjectConfig;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("failed to prepare dependency directory {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to launch installer '{command}': {source}")]
    Launch { command: String, source: io::Error },

    #[error("installer '{command}' exited with {status}")]
    InstallFailed { command: String, status: String },

    #[error("dependency directory {} does not exist", path.display())]
    Missing { path: PathBuf },
}

/// Given a configuration, return a directory of resolved dependency files.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait DependencyPreparer {
    fn prepare(&self, config: &ProjectConfig) -> Result<PathBuf, DependencyError>;
}

/// Installs `config.dependencies` with `<installer> install --target <dir>`.
#[derive(Debug, Default, Clone)]
pub struct PipDependencyPreparer;

impl PipDependencyPreparer {
    pub fn new() -> Self {
        Self
    }
}

impl DependencyPreparer for PipDependencyPreparer {
    fn prepare(&self, config: &ProjectConfig) -> Result<PathBuf, DependencyError> {
        let dir = &config.dependencies_dir;
        fs::create_dir_all(dir).map_err(|source| DependencyError::Io {
            path: dir.clone(),
            source,
        })?;

        if config.dependencies.is_empty() {
            info!(dir = %dir.display(), "No dependencies configured, skipping install");
        } else {
            let args = install_args(dir, &config.dependencies);
            info!(
                installer = %config.installer,
                count = config.dependencies.len(),
                dir = %dir.display(),
                "Installing dependencies"
            );
            let status = Command::new(&config.installer)
                .args(&args)
                .status()
                .map_err(|source| {
                    error!(installer = %config.installer, error = ?source, "Failed to launch installer");
                    DependencyError::Launch {
                        command: config.installer.clone(),
                        source,
                    }
                })?;
            if !status.success() {
                error!(installer = %config.installer, %status, "Installer failed");
                return Err(DependencyError::InstallFailed {
                    command: config.installer.clone(),
                    status: status.to_string(),
                });
            }
        }

        prune_excluded(dir, &config.dependency_excludes)?;
        Ok(dir.clone())
    }
}

/// Uses the configured dependency directory as-is.
#[derive(Debug, Default, Clone)]
pub struct ExistingDirectory;

impl DependencyPreparer for ExistingDirectory {
    fn prepare(&self, config: &ProjectConfig) -> Result<PathBuf, DependencyError> {
        let dir = &config.dependencies_dir;
        if !dir.is_dir() {
            return Err(DependencyError::Missing { path: dir.clone() });
        }
        debug!(dir = %dir.display(), "Using existing dependency directory");
        Ok(dir.clone())
    }
}

fn install_args(dir: &Path, dependencies: &[String]) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        "--target".to_string(),
        dir.to_string_lossy().into_owned(),
    ];
    args.extend(dependencies.iter().cloned());
    args
}

/// Removes top-level packages, modules and their install metadata by name.
fn prune_excluded(dir: &Path, excludes: &[String]) -> Result<(), DependencyError> {
    if excludes.is_empty() {
        return Ok(());
    }
    let io_err = |source: io::Error| DependencyError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !excludes.iter().any(|exclude| is_excluded(name, exclude)) {
            continue;
        }
        let path = entry.path();
        debug!(path = %path.display(), "Removing excluded dependency");
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|source| DependencyError::Io { path, source })?;
    }
    Ok(())
}

fn is_excluded(entry_name: &str, exclude: &str) -> bool {
    entry_name == exclude
        || entry_name.strip_suffix(".py") == Some(exclude)
        || (entry_name.ends_with(".dist-info")
            && entry_name.split('-').next() == Some(exclude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn install_args_target_the_dependency_dir() {
        let args = install_args(Path::new("/t/deps"), &["requests==2.32.3".to_string()]);
        assert_eq!(args, vec!["install", "--target", "/t/deps", "requests==2.32.3"]);
    }

    #[test]
    fn exclusion_matches_packages_modules_and_metadata() {
        assert!(is_excluded("boto3", "boto3"));
        assert!(is_excluded("six.py", "six"));
        assert!(is_excluded("boto3-1.34.0.dist-info", "boto3"));
        assert!(!is_excluded("boto3_extras", "boto3"));
        assert!(!is_excluded("botocore", "boto3"));
    }

    #[test]
    fn prune_removes_only_excluded_entries() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir_all(dir.join("boto3")).unwrap();
        fs::write(dir.join("boto3/__init__.py"), "").unwrap();
        fs::create_dir_all(dir.join("boto3-1.0.dist-info")).unwrap();
        fs::create_dir_all(dir.join("requests")).unwrap();
        fs::write(dir.join("six.py"), "").unwrap();

        prune_excluded(dir, &["boto3".to_string(), "six".to_string()]).unwrap();

        assert!(!dir.join("boto3").exists());
        assert!(!dir.join("boto3-1.0.dist-info").exists());
        assert!(!dir.join("six.py").exists());
        assert!(dir.join("requests").exists());
    }

    #[test]
    fn pip_preparer_without_dependencies_only_creates_the_dir() {
        let tmp = tempdir().unwrap();
        let mut config = ProjectConfig::new("palp", "1", tmp.path());
        // Never launched: no dependencies configured.
        config.installer = "definitely-not-an-installer".to_string();

        let dir = PipDependencyPreparer::new().prepare(&config).unwrap();

        assert_eq!(dir, config.dependencies_dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn pip_preparer_reports_unlaunchable_installer() {
        let tmp = tempdir().unwrap();
        let mut config = ProjectConfig::new("palp", "1", tmp.path());
        config.installer = "definitely-not-an-installer".to_string();
        config.dependencies = vec!["requests".to_string()];

        let err = PipDependencyPreparer::new().prepare(&config).unwrap_err();
        assert!(matches!(err, DependencyError::Launch { .. }), "got {err:?}");
    }

    #[test]
    fn existing_directory_requires_the_dir() {
        let tmp = tempdir().unwrap();
        let config = ProjectConfig::new("palp", "1", tmp.path());

        let err = ExistingDirectory.prepare(&config).unwrap_err();
        assert!(matches!(err, DependencyError::Missing { .. }));

        fs::create_dir_all(&config.dependencies_dir).unwrap();
        assert_eq!(ExistingDirectory.prepare(&config).unwrap(), config.dependencies_dir);
    }
}
