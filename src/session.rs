//! Deployment session over one database connection
//!
//! Sequences the remote calls of a run and turns their status tokens into
//! results. Nothing here ends the process; errors go back to the caller,
//! which is expected to [`DeploymentSession::disconnect`] afterwards.

use log::{debug, error, info, warn};

use crate::db::models::{DeploymentId, RemoteCallResult, RemoteStep, StatusToken, WorkflowFile};
use crate::db::DeployerApi;
use crate::errors::{DeployerError, DeployerResult};
use crate::loader::FileSet;

/// Placeholder when the host or user name cannot be resolved
pub const UNKNOWN: &str = "Unknown";

/// Progress of a session through the deployment protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Uploaded,
    Validated,
    Deployed,
}

/// Non-fatal outcome of the validation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Files are deployable but break some rules
    ValidWithWarnings(String),
}

pub struct DeploymentSession<A: DeployerApi> {
    api: A,
    user_name: String,
    deployment_id: Option<DeploymentId>,
    state: SessionState,
}

impl<A: DeployerApi> DeploymentSession<A> {
    /// Wrap a freshly opened connection
    pub fn new(api: A, user_name: impl Into<String>) -> Self {
        Self {
            api,
            user_name: user_name.into(),
            deployment_id: None,
            state: SessionState::Connected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn deployment_id(&self) -> Option<DeploymentId> {
        self.deployment_id
    }

    /// Purge stale staged files, stage `files` under a new deployment id and
    /// convert them server-side
    pub async fn upload_workflow(&mut self, files: &FileSet) -> DeployerResult<DeploymentId> {
        self.expect_state(SessionState::Connected, "upload")?;

        info!("Purge workflow files before uploading to database.");
        let purged = self.api.purge_workflow_files().await?;
        check_step(RemoteStep::Purge, &purged)?;

        info!("Get deployment id.");
        let deployment_id = self.api.next_deployment_id().await?;
        self.deployment_id = Some(deployment_id);

        info!(
            "Uploading {} workflow files to database as deployment {}.",
            files.len(),
            deployment_id
        );
        let payload = read_workflow_files(files).await?;
        let inserted = self
            .api
            .insert_workflow_files(deployment_id, &payload, &self.user_name)
            .await?;
        debug!("Staged {} rows for deployment {}", inserted, deployment_id);

        info!("Convert workflow files to XML type.");
        let converted = self.api.convert_workflow_files(deployment_id).await?;
        check_step(RemoteStep::Convert, &converted)?;

        self.state = SessionState::Uploaded;
        Ok(deployment_id)
    }

    /// Run server-side validation, failing closed on unknown status tokens
    pub async fn validate_workflow(&mut self) -> DeployerResult<ValidationOutcome> {
        let deployment_id = self.deployment_in(SessionState::Uploaded, "validate")?;

        info!("Validate workflow files.");
        let RemoteCallResult { code, message } = self.api.validate_workflow(deployment_id).await?;
        let message = message.unwrap_or_default();

        let outcome = match code {
            StatusToken::Complete => {
                info!("Workflow files are valid.");
                ValidationOutcome::Valid
            }
            StatusToken::Warning => {
                warn!(
                    "Workflow files are valid, but do not meet all the rules. You should adjust the workflow! Following exceptions were found:\n{}",
                    message
                );
                ValidationOutcome::ValidWithWarnings(message)
            }
            StatusToken::Error => {
                return Err(DeployerError::Remote {
                    step: RemoteStep::Validate,
                    message,
                });
            }
            unknown @ StatusToken::Unrecognized(_) => {
                return Err(DeployerError::UnsupportedResult {
                    step: RemoteStep::Validate,
                    code: unknown.to_string(),
                    message,
                });
            }
        };

        self.state = SessionState::Validated;
        Ok(outcome)
    }

    /// Deploy the validated files, `description` is stored with the deployment
    pub async fn deploy_workflow(&mut self, description: &str) -> DeployerResult<()> {
        let deployment_id = self.deployment_in(SessionState::Validated, "deploy")?;

        info!("Deploy workflow files to repository.");
        let deployed = self.api.deploy_workflow(deployment_id, description).await?;
        check_step(RemoteStep::Deploy, &deployed)?;

        self.state = SessionState::Deployed;
        info!("Deployment {} finished.", deployment_id);
        Ok(())
    }

    /// Close the connection; failures are logged and otherwise ignored
    pub async fn disconnect(self) {
        match self.api.close().await {
            Ok(()) => debug!("Database connection closed"),
            Err(e) => error!("Close of database connection failed: {}", e),
        }
    }

    fn expect_state(&self, expected: SessionState, operation: &str) -> DeployerResult<()> {
        if self.state != expected {
            return Err(DeployerError::InvalidState(format!(
                "cannot {} in state {:?}, expected {:?}",
                operation, self.state, expected
            )));
        }
        Ok(())
    }

    fn deployment_in(&self, expected: SessionState, operation: &str) -> DeployerResult<DeploymentId> {
        self.expect_state(expected, operation)?;
        self.deployment_id.ok_or_else(|| {
            DeployerError::InvalidState(format!("cannot {} without a deployment id", operation))
        })
    }
}

/// Purge, convert and deploy only treat ERROR as fatal
fn check_step(step: RemoteStep, result: &RemoteCallResult) -> DeployerResult<()> {
    match &result.code {
        StatusToken::Error => Err(DeployerError::Remote {
            step,
            message: result.message_text().to_string(),
        }),
        StatusToken::Warning => {
            warn!("{} reported a warning: {}", step, result.message_text());
            Ok(())
        }
        StatusToken::Complete => Ok(()),
        StatusToken::Unrecognized(code) => {
            debug!("{} returned result code {:?}", step, code);
            Ok(())
        }
    }
}

async fn read_workflow_files(files: &FileSet) -> DeployerResult<Vec<WorkflowFile>> {
    let mut payload = Vec::with_capacity(files.len());
    for (name, path) in files {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DeployerError::FileRead {
                path: path.clone(),
                source,
            })?;
        payload.push(WorkflowFile {
            name: name.clone(),
            text,
        });
    }
    Ok(payload)
}

/// Text stored with a deployment to identify who ran it and from where
pub fn deployment_description() -> String {
    let user = name_or_unknown(whoami::fallible::username());
    describe_deployment(&user, &local_host_name())
}

pub fn local_host_name() -> String {
    name_or_unknown(whoami::fallible::hostname())
}

fn name_or_unknown<E: std::fmt::Display>(resolved: Result<String, E>) -> String {
    match resolved {
        Ok(name) if !name.trim().is_empty() => name,
        Ok(_) => UNKNOWN.to_string(),
        Err(e) => {
            debug!("Name lookup failed: {}", e);
            UNKNOWN.to_string()
        }
    }
}

fn describe_deployment(user: &str, host: &str) -> String {
    format!("workflow-deployer (executed by {} from machine {})", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockApi;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn file_set(dir: &TempDir, names: &[&str]) -> FileSet {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, format!("<definitions id=\"{}\"/>", name)).unwrap();
                (name.to_string(), path)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_protocol_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let files = file_set(&temp_dir, &["a.bpmn", "b.bpmn"]);
        let api = MockApi::new();
        let mut session = DeploymentSession::new(api.clone(), "deployer");

        let id = session.upload_workflow(&files).await.unwrap();
        assert_eq!(id, 42);
        assert_eq!(session.state(), SessionState::Uploaded);

        assert_eq!(session.validate_workflow().await.unwrap(), ValidationOutcome::Valid);
        session.deploy_workflow("test run").await.unwrap();
        assert_eq!(session.state(), SessionState::Deployed);
        session.disconnect().await;

        assert_eq!(
            api.calls(),
            vec![
                RemoteStep::Purge,
                RemoteStep::DeploymentId,
                RemoteStep::Insert,
                RemoteStep::Convert,
                RemoteStep::Validate,
                RemoteStep::Deploy,
            ]
        );
        assert!(api.closed());
        assert_eq!(api.uploaded_by().as_deref(), Some("deployer"));
        assert_eq!(api.description().as_deref(), Some("test run"));

        let uploaded = api.uploaded();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(uploaded[0].name, "a.bpmn");
        assert_eq!(uploaded[0].text, "<definitions id=\"a.bpmn\"/>");
    }

    #[tokio::test]
    async fn test_purge_error_stops_upload() {
        let temp_dir = TempDir::new().unwrap();
        let files = file_set(&temp_dir, &["a.bpmn"]);
        let api = MockApi::new().respond(RemoteStep::Purge, StatusToken::Error, "locked");
        let mut session = DeploymentSession::new(api.clone(), "deployer");

        match session.upload_workflow(&files).await {
            Err(DeployerError::Remote { step, message }) => {
                assert_eq!(step, RemoteStep::Purge);
                assert_eq!(message, "locked");
            }
            other => panic!("expected purge failure, got {:?}", other),
        }
        assert_eq!(api.calls(), vec![RemoteStep::Purge]);
        assert_eq!(session.deployment_id(), None);
    }

    #[tokio::test]
    async fn test_unknown_purge_code_continues() {
        let temp_dir = TempDir::new().unwrap();
        let files = file_set(&temp_dir, &["a.bpmn"]);
        let api = MockApi::new()
            .respond(RemoteStep::Purge, StatusToken::Unrecognized("NOTHING_TO_PURGE".to_string()), "")
            .respond(RemoteStep::Convert, StatusToken::Warning, "namespace missing");
        let mut session = DeploymentSession::new(api.clone(), "deployer");

        assert!(session.upload_workflow(&files).await.is_ok());
        assert_eq!(api.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_validation_warning_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let files = file_set(&temp_dir, &["a.bpmn"]);
        let api = MockApi::new().respond(RemoteStep::Validate, StatusToken::Warning, "gateway without default flow");
        let mut session = DeploymentSession::new(api, "deployer");

        session.upload_workflow(&files).await.unwrap();
        assert_eq!(
            session.validate_workflow().await.unwrap(),
            ValidationOutcome::ValidWithWarnings("gateway without default flow".to_string())
        );
        assert_eq!(session.state(), SessionState::Validated);
    }

    #[tokio::test]
    async fn test_unrecognized_validation_code_fails_closed() {
        let temp_dir = TempDir::new().unwrap();
        let files = file_set(&temp_dir, &["a.bpmn"]);
        let api = MockApi::new().respond(
            RemoteStep::Validate,
            StatusToken::Unrecognized("PENDING".to_string()),
            "queued",
        );
        let mut session = DeploymentSession::new(api, "deployer");

        session.upload_workflow(&files).await.unwrap();
        match session.validate_workflow().await {
            Err(DeployerError::UnsupportedResult { code, .. }) => assert_eq!(code, "PENDING"),
            other => panic!("expected unsupported result, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Uploaded);

        // A failed validation never unlocks deployment
        assert!(matches!(
            session.deploy_workflow("x").await,
            Err(DeployerError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_out_of_order_calls_are_rejected() {
        let api = MockApi::new();
        let mut session = DeploymentSession::new(api.clone(), "deployer");

        assert!(matches!(
            session.validate_workflow().await,
            Err(DeployerError::InvalidState(_))
        ));
        assert!(matches!(
            session.deploy_workflow("x").await,
            Err(DeployerError::InvalidState(_))
        ));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_deployment_id_is_protocol_error() {
        let temp_dir = TempDir::new().unwrap();
        let files = file_set(&temp_dir, &["a.bpmn"]);
        let api = MockApi::new().without_deployment_id();
        let mut session = DeploymentSession::new(api.clone(), "deployer");

        assert!(matches!(
            session.upload_workflow(&files).await,
            Err(DeployerError::Protocol(_))
        ));
        assert_eq!(api.calls(), vec![RemoteStep::Purge, RemoteStep::DeploymentId]);
    }

    #[tokio::test]
    async fn test_unreadable_file_aborts_before_insert() {
        let files: FileSet = vec![("gone.bpmn".to_string(), PathBuf::from("/nonexistent/gone.bpmn"))]
            .into_iter()
            .collect();
        let api = MockApi::new();
        let mut session = DeploymentSession::new(api.clone(), "deployer");

        assert!(matches!(
            session.upload_workflow(&files).await,
            Err(DeployerError::FileRead { .. })
        ));
        assert!(!api.calls().contains(&RemoteStep::Insert));
    }

    #[test]
    fn test_deployment_description() {
        assert_eq!(
            describe_deployment("jdoe", "build-01"),
            "workflow-deployer (executed by jdoe from machine build-01)"
        );
        assert!(deployment_description().starts_with("workflow-deployer (executed by "));
        assert!(!local_host_name().is_empty());
    }

    #[test]
    fn test_unresolved_names_fall_back_to_unknown() {
        let failed: Result<String, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no hostname"));
        assert_eq!(name_or_unknown(failed), UNKNOWN);
        assert_eq!(name_or_unknown(Ok::<_, std::io::Error>("  ".to_string())), UNKNOWN);
        assert_eq!(name_or_unknown(Ok::<_, std::io::Error>("build-01".to_string())), "build-01");
    }
}
