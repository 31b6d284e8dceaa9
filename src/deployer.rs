//! Deployment pipeline
//!
//! Load files, connect, upload, validate and optionally deploy. Every failure
//! after the connection is opened goes through [`abort`], which logs and
//! disconnects before the error is returned.

use log::{error, info};
use std::fmt;

use crate::args::DeployerConfig;
use crate::config::Settings;
use crate::db::models::DeploymentId;
use crate::db::{Connector, DeployerApi};
use crate::errors::{DeployerError, DeployerResult};
use crate::loader::{self, DuplicatePolicy, FileSet};
use crate::session::{deployment_description, DeploymentSession, ValidationOutcome};

pub const EXIT_SUCCESS: u8 = 0;
/// `-1` as seen by the calling shell
pub const EXIT_FAILURE: u8 = 255;

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing to deploy, no connection was opened
    NoFiles,
    /// Uploaded and validated, deployment skipped by `--deploy`
    Validated {
        deployment_id: DeploymentId,
        files: usize,
        warnings: bool,
    },
    Deployed {
        deployment_id: DeploymentId,
        files: usize,
        warnings: bool,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoFiles => write!(f, "no workflow files found"),
            RunOutcome::Validated {
                deployment_id,
                files,
                warnings,
            } => write!(
                f,
                "{} files validated as deployment {}{}, deployment skipped",
                files,
                deployment_id,
                if *warnings { " with warnings" } else { "" }
            ),
            RunOutcome::Deployed {
                deployment_id,
                files,
                warnings,
            } => write!(
                f,
                "{} files deployed as deployment {}{}",
                files,
                deployment_id,
                if *warnings { " with warnings" } else { "" }
            ),
        }
    }
}

/// Run the whole pipeline for one configuration
pub async fn run<C: Connector>(
    config: &DeployerConfig,
    settings: &Settings,
    connector: &C,
) -> DeployerResult<RunOutcome> {
    let policy = if settings.reject_duplicate_names {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::KeepLast
    };

    info!("Going to load processes from directory {}", config.directory.display());
    let files = loader::load_from_directory(&config.directory, policy).map_err(|e| {
        error!("Unable to load workflow files: {}", e);
        e
    })?;
    info!("Loaded processes count: {}.", files.len());

    if files.is_empty() {
        info!("Skipping deployment of workflow because no processes found in input folder.");
        return Ok(RunOutcome::NoFiles);
    }

    let api = connector.connect(&config.credentials).await.map_err(|e| {
        error!("{}", e);
        e
    })?;
    let mut session = DeploymentSession::new(api, config.credentials.user_name.as_str());

    match execute(&mut session, &files, config.deploy).await {
        Ok(outcome) => {
            session.disconnect().await;
            Ok(outcome)
        }
        Err(e) => Err(abort(session, e).await),
    }
}

async fn execute<A: DeployerApi>(
    session: &mut DeploymentSession<A>,
    files: &FileSet,
    deploy: bool,
) -> DeployerResult<RunOutcome> {
    let deployment_id = session.upload_workflow(files).await?;
    let warnings = matches!(
        session.validate_workflow().await?,
        ValidationOutcome::ValidWithWarnings(_)
    );

    if !deploy {
        info!("Skipping deployment of workflow based on input parameter.");
        return Ok(RunOutcome::Validated {
            deployment_id,
            files: files.len(),
            warnings,
        });
    }

    session.deploy_workflow(&deployment_description()).await?;
    Ok(RunOutcome::Deployed {
        deployment_id,
        files: files.len(),
        warnings,
    })
}

/// Log a fatal error and release the connection
async fn abort<A: DeployerApi>(session: DeploymentSession<A>, err: DeployerError) -> DeployerError {
    error!("{}, workflow won't be deployed!", err);
    session.disconnect().await;
    err
}

/// Process exit status for a pipeline result
pub fn exit_status(result: &DeployerResult<RunOutcome>) -> u8 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FAILURE,
    }
}
