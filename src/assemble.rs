//! Archive assembly: dependencies, sources and scripts into one zip.
//!
//! Every run rebuilds the staging tree under the target directory, copies the
//! *contents* of each source root into it (dependencies first, then main
//! source, then scripts; later copies overwrite earlier ones), and serializes
//! the tree into `<target>/<archive_name>.zip`. The archive is written to a
//! temporary file next to its destination and renamed into place, so a failed
//! run never leaves a truncated archive at the final path.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ProjectConfig;
use crate::dependencies::{DependencyError, DependencyPreparer};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to prepare target directory {}: {source}", path.display())]
    TargetDir { path: PathBuf, source: io::Error },

    #[error("dependency preparation failed: {0}")]
    Dependencies(#[from] DependencyError),

    #[error("source directory {} does not exist or is not a directory", path.display())]
    MissingSource { path: PathBuf },

    #[error("failed to stage {}: {source}", path.display())]
    Stage { path: PathBuf, source: io::Error },

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("path {} is not valid UTF-8 and cannot be an archive member", path.display())]
    NonUtf8Path { path: PathBuf },

    #[error("failed to write archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("failed to write archive {}: {source}", path.display())]
    ArchiveIo { path: PathBuf, source: io::Error },
}

/// Builds the archive for `config` and returns its path.
pub fn assemble(
    config: &ProjectConfig,
    preparer: &dyn DependencyPreparer,
) -> Result<PathBuf, AssemblyError> {
    info!(project = %config.name, target = %config.target_dir.display(), "Assembling lambda archive");

    fs::create_dir_all(&config.target_dir).map_err(|source| {
        error!(path = %config.target_dir.display(), error = ?source, "Cannot create target directory");
        AssemblyError::TargetDir {
            path: config.target_dir.clone(),
            source,
        }
    })?;

    let dependencies_dir = preparer.prepare(config).map_err(|e| {
        error!(error = %e, "Dependency preparation failed");
        AssemblyError::from(e)
    })?;

    let mut roots = vec![dependencies_dir.as_path()];
    roots.extend(config.source_roots());
    for root in &roots {
        if !root.is_dir() {
            error!(path = %root.display(), "Source directory missing");
            return Err(AssemblyError::MissingSource {
                path: root.to_path_buf(),
            });
        }
    }

    // A root may contain the target directory (e.g. `source_dir: .`); the
    // staging tree must never be copied into itself.
    let target_dir =
        fs::canonicalize(&config.target_dir).map_err(|source| AssemblyError::TargetDir {
            path: config.target_dir.clone(),
            source,
        })?;

    let staging = config.staging_dir();
    reset_dir(&staging)?;
    for root in &roots {
        info!(from = %root.display(), to = %staging.display(), "Staging source root");
        copy_tree_contents(root, &staging, &target_dir)?;
    }

    let archive_path = config.archive_path();
    let members = write_archive(&staging, &archive_path)?;
    info!(archive = %archive_path.display(), members, "Lambda archive written");
    Ok(archive_path)
}

fn reset_dir(dir: &Path) -> Result<(), AssemblyError> {
    let stage_err = |source: io::Error| AssemblyError::Stage {
        path: dir.to_path_buf(),
        source,
    };
    if dir.exists() {
        debug!(path = %dir.display(), "Removing previous staging tree");
        fs::remove_dir_all(dir).map_err(stage_err)?;
    }
    fs::create_dir_all(dir).map_err(stage_err)
}

/// Copies everything below `src` into `dest`, replacing whatever already sits
/// at the same name. The directory `skip` (canonical path) is never entered.
fn copy_tree_contents(src: &Path, dest: &Path, skip: &Path) -> Result<(), AssemblyError> {
    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_same_dir(e, skip));
    for entry in walker {
        let entry = entry.map_err(|source| AssemblyError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        let copied = if entry.file_type().is_dir() {
            if target.exists() && !target.is_dir() {
                fs::remove_file(&target).map_err(|source| AssemblyError::Stage {
                    path: target.clone(),
                    source,
                })?;
            }
            fs::create_dir_all(&target)
        } else {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(|source| AssemblyError::Stage {
                    path: target.clone(),
                    source,
                })?;
            }
            fs::copy(entry.path(), &target).map(|_| ())
        };
        copied.map_err(|source| AssemblyError::Stage {
            path: target.clone(),
            source,
        })?;
        debug!(file = %rel.display(), "Staged");
    }
    Ok(())
}

fn is_same_dir(entry: &walkdir::DirEntry, dir: &Path) -> bool {
    entry.file_type().is_dir()
        && fs::canonicalize(entry.path()).map_or(false, |p| p == dir)
}

/// Zips every regular file below `root`; returns the member count.
fn write_archive(root: &Path, archive_path: &Path) -> Result<usize, AssemblyError> {
    let io_err = |source: io::Error| AssemblyError::ArchiveIo {
        path: archive_path.to_path_buf(),
        source,
    };
    let zip_err = |source: zip::result::ZipError| AssemblyError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let parent = archive_path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = archive_tempfile(parent).map_err(io_err)?;
    let mut writer = ZipWriter::new(tmp);

    let mut members = 0;
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| AssemblyError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = member_name(root, entry.path())?;
        let mut options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(mode) = unix_mode(entry.path()) {
            options = options.unix_permissions(mode);
        }
        writer.start_file(name.as_str(), options).map_err(zip_err)?;
        let mut file = File::open(entry.path()).map_err(io_err)?;
        io::copy(&mut file, &mut writer).map_err(io_err)?;
        debug!(member = %name, "Added archive member");
        members += 1;
    }

    let tmp = writer.finish().map_err(zip_err)?;
    tmp.persist(archive_path).map_err(|e| io_err(e.error))?;
    Ok(members)
}

/// Temporary archive file, world-readable (subject to umask) once persisted.
fn archive_tempfile(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    builder.suffix(".zip.tmp").tempfile_in(dir)
}

/// Archive member name: path relative to `root`, always `/`-separated.
fn member_name(root: &Path, path: &Path) -> Result<String, AssemblyError> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| AssemblyError::NonUtf8Path {
                path: path.to_path_buf(),
            })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn member_names_use_forward_slashes() {
        let root = Path::new("/stage");
        let path = root.join("pkg").join("sub").join("mod.py");
        assert_eq!(member_name(root, &path).unwrap(), "pkg/sub/mod.py");
    }

    #[test]
    fn copy_overwrites_existing_files() {
        let tmp = tempdir().unwrap();
        let (a, b, dest) = (tmp.path().join("a"), tmp.path().join("b"), tmp.path().join("d"));
        for dir in [&a, &b, &dest] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(a.join("same.py"), "first").unwrap();
        fs::write(b.join("same.py"), "second").unwrap();

        copy_tree_contents(&a, &dest, &tmp.path().join("none")).unwrap();
        copy_tree_contents(&b, &dest, &tmp.path().join("none")).unwrap();

        assert_eq!(fs::read_to_string(dest.join("same.py")).unwrap(), "second");
    }

    #[test]
    fn copy_replaces_file_with_directory_of_same_name() {
        let tmp = tempdir().unwrap();
        let (a, b, dest) = (tmp.path().join("a"), tmp.path().join("b"), tmp.path().join("d"));
        for dir in [&a, &b, &dest] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(a.join("six"), "module").unwrap();
        fs::create_dir_all(b.join("six")).unwrap();
        fs::write(b.join("six/__init__.py"), "package").unwrap();

        copy_tree_contents(&a, &dest, &tmp.path().join("none")).unwrap();
        copy_tree_contents(&b, &dest, &tmp.path().join("none")).unwrap();

        assert!(dest.join("six").is_dir());
        assert_eq!(fs::read_to_string(dest.join("six/__init__.py")).unwrap(), "package");
    }

    #[test]
    fn copy_never_enters_the_skipped_directory() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("out/stage")).unwrap();
        fs::write(src.join("out/old.zip"), "zip").unwrap();
        fs::write(src.join("mod.py"), "").unwrap();
        let skip = fs::canonicalize(src.join("out")).unwrap();
        let dest = src.join("out/stage");

        copy_tree_contents(&src, &dest, &skip).unwrap();

        assert!(dest.join("mod.py").is_file());
        assert!(!dest.join("out").exists());
    }

    #[test]
    fn write_archive_skips_directory_entries() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("stage");
        fs::create_dir_all(root.join("empty_dir")).unwrap();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/__init__.py"), "").unwrap();
        let archive = tmp.path().join("out.zip");

        let members = write_archive(&root, &archive).unwrap();

        assert_eq!(members, 1);
        let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names, vec!["pkg/__init__.py"]);
    }
}
