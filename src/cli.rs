//! CLI glue for `lambda-packager`: argument parsing and subcommand routing.
//!
//! All packaging and publishing logic lives in the library modules; this
//! module loads the project file, builds the configured dependency preparer and
//! bucket store, and prints a report.

use crate::assemble::assemble;
use crate::dependencies::{DependencyPreparer, ExistingDirectory, PipDependencyPreparer};
use crate::load_config::load_config;
use crate::pipeline::deploy;
use crate::publish::publish;
use crate::store::build_store;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for lambda-packager: build and publish lambda zips.
#[derive(Parser)]
#[clap(
    name = "lambda-packager",
    version,
    about = "Package project sources and dependencies into a lambda zip and publish it to a bucket"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the lambda zip into the target directory
    Package {
        /// Path to the YAML project file
        #[clap(long)]
        config: PathBuf,
        /// Package whatever is already in the dependency directory instead of installing
        #[clap(long)]
        skip_install: bool,
    },
    /// Upload an assembled zip to the version-tagged and latest keys
    Upload {
        /// Path to the YAML project file
        #[clap(long)]
        config: PathBuf,
        /// Archive to upload; defaults to the project's archive path
        #[clap(long)]
        archive: Option<PathBuf>,
    },
    /// Package, then upload
    Deploy {
        /// Path to the YAML project file
        #[clap(long)]
        config: PathBuf,
        /// Package whatever is already in the dependency directory instead of installing
        #[clap(long)]
        skip_install: bool,
    },
}

fn preparer(skip_install: bool) -> Box<dyn DependencyPreparer> {
    if skip_install {
        Box::new(ExistingDirectory)
    } else {
        Box::new(PipDependencyPreparer::new())
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Package {
            config,
            skip_install,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "package", "Assembling archive");
            let archive = assemble(&config, preparer(skip_install).as_ref())?;
            println!("Packaged {}", archive.display());
            Ok(())
        }
        Commands::Upload { config, archive } => {
            let config = load_config(config)?;
            let archive = archive.unwrap_or_else(|| config.archive_path());
            tracing::info!(command = "upload", archive = %archive.display(), "Publishing archive");
            let store = build_store(&config.store)?;
            let report = publish(&config, store.as_ref(), &archive).await?;
            println!("Published:\n{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Deploy {
            config,
            skip_install,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "deploy", "Packaging and publishing");
            let store = build_store(&config.store)?;
            let report = deploy(&config, preparer(skip_install).as_ref(), store.as_ref()).await?;
            println!("Deployed:\n{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
