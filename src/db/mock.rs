//! Scripted in-memory deployer API for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::args::Credentials;
use crate::db::models::{DeploymentId, RemoteCallResult, RemoteStep, StatusToken, WorkflowFile};
use crate::db::{Connector, DeployerApi};
use crate::errors::{DeployerError, DeployerResult};

#[derive(Default)]
struct MockState {
    calls: Vec<RemoteStep>,
    closed: bool,
    close_fails: bool,
    deployment_id: Option<DeploymentId>,
    responses: HashMap<RemoteStep, RemoteCallResult>,
    faults: HashMap<RemoteStep, String>,
    uploaded: Vec<WorkflowFile>,
    uploaded_by: Option<String>,
    description: Option<String>,
}

/// Answers every call with COMPLETE unless scripted otherwise
#[derive(Clone)]
pub(crate) struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        let state = MockState {
            deployment_id: Some(42),
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn respond(self, step: RemoteStep, code: StatusToken, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(step, RemoteCallResult::new(code, Some(message.to_string())));
        self
    }

    /// Make `step` fail at the transport level
    pub fn fault(self, step: RemoteStep, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .faults
            .insert(step, message.to_string());
        self
    }

    pub fn without_deployment_id(self) -> Self {
        self.state.lock().unwrap().deployment_id = None;
        self
    }

    /// Mark the connection closed but report the close as failed
    pub fn failing_close(self) -> Self {
        self.state.lock().unwrap().close_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<RemoteStep> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn uploaded(&self) -> Vec<WorkflowFile> {
        self.state.lock().unwrap().uploaded.clone()
    }

    pub fn uploaded_by(&self) -> Option<String> {
        self.state.lock().unwrap().uploaded_by.clone()
    }

    pub fn description(&self) -> Option<String> {
        self.state.lock().unwrap().description.clone()
    }

    fn record(&self, step: RemoteStep) -> DeployerResult<()> {
        let mut state = self.state.lock().unwrap();
        assert!(!state.closed, "{:?} issued after close", step);
        state.calls.push(step);
        match state.faults.get(&step) {
            Some(message) => Err(DeployerError::Database(message.clone())),
            None => Ok(()),
        }
    }

    fn answer(&self, step: RemoteStep) -> DeployerResult<RemoteCallResult> {
        self.record(step)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .responses
            .get(&step)
            .cloned()
            .unwrap_or_else(RemoteCallResult::complete))
    }
}

#[async_trait]
impl DeployerApi for MockApi {
    async fn purge_workflow_files(&mut self) -> DeployerResult<RemoteCallResult> {
        self.answer(RemoteStep::Purge)
    }

    async fn next_deployment_id(&mut self) -> DeployerResult<DeploymentId> {
        self.record(RemoteStep::DeploymentId)?;
        self.state
            .lock()
            .unwrap()
            .deployment_id
            .ok_or_else(|| DeployerError::Protocol("get_id_deployment returned NULL".to_string()))
    }

    async fn insert_workflow_files(
        &mut self,
        _deployment: DeploymentId,
        files: &[WorkflowFile],
        user_name: &str,
    ) -> DeployerResult<u64> {
        self.record(RemoteStep::Insert)?;
        let mut state = self.state.lock().unwrap();
        state.uploaded.extend_from_slice(files);
        state.uploaded_by = Some(user_name.to_string());
        Ok(files.len() as u64)
    }

    async fn convert_workflow_files(
        &mut self,
        _deployment: DeploymentId,
    ) -> DeployerResult<RemoteCallResult> {
        self.answer(RemoteStep::Convert)
    }

    async fn validate_workflow(
        &mut self,
        _deployment: DeploymentId,
    ) -> DeployerResult<RemoteCallResult> {
        self.answer(RemoteStep::Validate)
    }

    async fn deploy_workflow(
        &mut self,
        _deployment: DeploymentId,
        description: &str,
    ) -> DeployerResult<RemoteCallResult> {
        self.state.lock().unwrap().description = Some(description.to_string());
        self.answer(RemoteStep::Deploy)
    }

    async fn close(self) -> DeployerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        if state.close_fails {
            return Err(DeployerError::Database("connection already terminated".to_string()));
        }
        Ok(())
    }
}

/// Hands out clones of one [`MockApi`] and counts connection attempts
pub(crate) struct MockConnector {
    api: MockApi,
    refuse: bool,
    attempts: Mutex<usize>,
}

impl MockConnector {
    pub fn new(api: MockApi) -> Self {
        Self {
            api,
            refuse: false,
            attempts: Mutex::new(0),
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(MockApi::new())
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Api = MockApi;

    async fn connect(&self, _credentials: &Credentials) -> DeployerResult<MockApi> {
        *self.attempts.lock().unwrap() += 1;
        if self.refuse {
            return Err(DeployerError::Connection("password authentication failed".to_string()));
        }
        Ok(self.api.clone())
    }
}
