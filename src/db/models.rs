//! Rows and result codes exchanged with the deployer API procedures

use sqlx::FromRow;
use std::fmt;

/// Server-issued identifier correlating one batch of uploaded files
pub type DeploymentId = i64;

/// Remote calls issued during a deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteStep {
    Purge,
    DeploymentId,
    Insert,
    Convert,
    Validate,
    Deploy,
}

impl RemoteStep {
    /// Name of the database object backing this step
    pub fn procedure(&self) -> &'static str {
        match self {
            RemoteStep::Purge => "purge_workflow_file",
            RemoteStep::DeploymentId => "get_id_deployment",
            RemoteStep::Insert => "staging table insert",
            RemoteStep::Convert => "convert_workflow_file2xmltype",
            RemoteStep::Validate => "validate_workflow",
            RemoteStep::Deploy => "deploy_workflow",
        }
    }
}

impl fmt::Display for RemoteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStep::Purge => write!(f, "Purge of workflow files before upload"),
            RemoteStep::DeploymentId => write!(f, "Retrieval of deployment id"),
            RemoteStep::Insert => write!(f, "Upload of workflow files"),
            RemoteStep::Convert => write!(f, "Conversion of workflow files"),
            RemoteStep::Validate => write!(f, "Validation of workflow files"),
            RemoteStep::Deploy => write!(f, "Deployment of workflow files"),
        }
    }
}

/// Status token carried in the `code_result` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusToken {
    Complete,
    Warning,
    Error,
    /// Anything outside the known vocabulary, including NULL (kept as "")
    Unrecognized(String),
}

impl StatusToken {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("COMPLETE") => StatusToken::Complete,
            Some("WARNING") => StatusToken::Warning,
            Some("ERROR") => StatusToken::Error,
            Some(other) => StatusToken::Unrecognized(other.to_string()),
            None => StatusToken::Unrecognized(String::new()),
        }
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusToken::Complete => write!(f, "COMPLETE"),
            StatusToken::Warning => write!(f, "WARNING"),
            StatusToken::Error => write!(f, "ERROR"),
            StatusToken::Unrecognized(raw) if raw.is_empty() => write!(f, "<null>"),
            StatusToken::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

/// Outcome of a status-returning procedure call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCallResult {
    pub code: StatusToken,
    pub message: Option<String>,
}

impl RemoteCallResult {
    pub fn new(code: StatusToken, message: Option<String>) -> Self {
        Self { code, message }
    }

    pub fn complete() -> Self {
        Self::new(StatusToken::Complete, None)
    }

    /// Diagnostic text, empty when the procedure returned none
    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Row shape `(code_result, text_message)` returned by every status procedure
#[derive(Debug, FromRow)]
pub struct ProcedureResultRow {
    pub code_result: Option<String>,
    pub text_message: Option<String>,
}

impl From<ProcedureResultRow> for RemoteCallResult {
    fn from(row: ProcedureResultRow) -> Self {
        RemoteCallResult::new(
            StatusToken::from_code(row.code_result.as_deref()),
            row.text_message,
        )
    }
}

/// One workflow file as uploaded to the staging table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFile {
    pub name: String,
    pub text: String,
}
