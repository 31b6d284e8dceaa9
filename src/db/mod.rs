//! Access to the workflow database
//!
//! [`DeployerApi`] is the remote contract of the deployer API procedures.
//! [`Connector`] opens the single connection a run works with.

pub mod models;
pub mod operations;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::args::Credentials;
use crate::errors::DeployerResult;
use models::{DeploymentId, RemoteCallResult, WorkflowFile};

/// Calls offered by the deployer API, issued one at a time
#[async_trait]
pub trait DeployerApi: Send {
    /// Remove files staged by previous, possibly incomplete, uploads
    async fn purge_workflow_files(&mut self) -> DeployerResult<RemoteCallResult>;

    /// Reserve the identifier for a new deployment
    async fn next_deployment_id(&mut self) -> DeployerResult<DeploymentId>;

    /// Stage raw file texts under `deployment`, returns the number of rows written
    async fn insert_workflow_files(
        &mut self,
        deployment: DeploymentId,
        files: &[WorkflowFile],
        user_name: &str,
    ) -> DeployerResult<u64>;

    /// Convert the staged texts into the structured workflow representation
    async fn convert_workflow_files(
        &mut self,
        deployment: DeploymentId,
    ) -> DeployerResult<RemoteCallResult>;

    async fn validate_workflow(&mut self, deployment: DeploymentId)
        -> DeployerResult<RemoteCallResult>;

    async fn deploy_workflow(
        &mut self,
        deployment: DeploymentId,
        description: &str,
    ) -> DeployerResult<RemoteCallResult>;

    /// Close the underlying connection
    async fn close(self) -> DeployerResult<()>;
}

/// Opens connections to the deployer API
#[async_trait]
pub trait Connector: Sync {
    type Api: DeployerApi;

    async fn connect(&self, credentials: &Credentials) -> DeployerResult<Self::Api>;
}
