#![doc = "lambda-packager: build a lambda zip from a project and publish it to a bucket."]

//! The crate has two independent halves, composed by [`pipeline::deploy`]:
//!
//! - [`assemble`]: dependencies, sources and scripts into `<target>/<name>.zip`
//! - [`publish`]: that zip to `v<version>/<name>.zip` and `latest/<name>.zip`
//!
//! Dependency installation and object storage sit behind traits
//! ([`dependencies::DependencyPreparer`], [`store::BucketStore`]) so either
//! half can be exercised with stand-ins.

pub mod assemble;
pub mod cli;
pub mod config;
pub mod dependencies;
pub mod load_config;
pub mod pipeline;
pub mod publish;
pub mod store;

pub use assemble::{assemble, AssemblyError};
pub use cli::{run, Cli, Commands};
pub use config::{ProjectConfig, StoreSettings};
pub use publish::{publish, PublishError, PublishReport};
