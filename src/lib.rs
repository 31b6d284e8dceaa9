//! Workflow deployer
//!
//! Uploads BPMN workflow files found below a directory to the workflow
//! database, validates them there and optionally deploys them:
//! - `args`: command-line parsing into a [`DeployerConfig`]
//! - `loader`: discovery of workflow files
//! - `db`: the deployer API contract and its PostgreSQL implementation
//! - `session`: the upload / validate / deploy protocol over one connection
//! - `deployer`: the end-to-end pipeline and exit status mapping

pub mod args;
pub mod config;
pub mod db;
pub mod deployer;
pub mod errors;
pub mod loader;
pub mod logging;
pub mod session;

pub use args::DeployerConfig;
pub use errors::{DeployerError, DeployerResult};
