//! Runtime settings for the deployer
//!
//! Settings come from built-in defaults, an optional settings file and
//! `WFD_*` environment variables, in increasing precedence.

use config::{Config as ConfigLib, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;

use crate::errors::{DeployerError, DeployerResult};

/// Environment variable naming an explicit settings file
pub const CONFIG_PATH_VAR: &str = "WORKFLOW_DEPLOYER_CONFIG";

/// Settings file looked up in the working directory (any supported extension)
const DEFAULT_CONFIG_NAME: &str = "workflow-deployer";

/// Deployer settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Default log filter, `RUST_LOG` takes precedence
    pub log_filter: String,
    /// Schema holding the deployer API functions
    pub api_schema: String,
    /// Table the raw workflow files are staged into
    pub staging_table: String,
    /// Application name reported to the database session
    pub application_name: String,
    /// Rows per multi-row insert statement
    pub insert_batch_size: usize,
    /// Fail on duplicate workflow file names instead of keeping the last one
    pub reject_duplicate_names: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info,sqlx=warn".to_string(),
            api_schema: "lib_etl_wf_deployer_api".to_string(),
            staging_table: "owner_wfm.v_etl_wf_file2deployment".to_string(),
            application_name: "Workflow Deployer".to_string(),
            insert_batch_size: 500,
            reject_duplicate_names: false,
        }
    }
}

impl Settings {
    /// Load settings from the default file location and the environment
    pub fn from_env() -> DeployerResult<Self> {
        match env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(Some(Path::new(&path)), true),
            Err(_) => Self::load(Some(Path::new(DEFAULT_CONFIG_NAME)), false),
        }
    }

    /// Load settings with an optional file source
    ///
    /// `path` is passed to [`File::with_name`], so the extension may be left off.
    pub fn load(path: Option<&Path>, required: bool) -> DeployerResult<Self> {
        let defaults = Settings::default();
        let mut builder = ConfigLib::builder()
            .set_default("log_filter", defaults.log_filter)?
            .set_default("api_schema", defaults.api_schema)?
            .set_default("staging_table", defaults.staging_table)?
            .set_default("application_name", defaults.application_name)?
            .set_default("insert_batch_size", defaults.insert_batch_size as i64)?
            .set_default("reject_duplicate_names", defaults.reject_duplicate_names)?;

        if let Some(path) = path {
            let name = path.to_string_lossy();
            builder = builder.add_source(File::with_name(&name).required(required));
        }

        builder = builder.add_source(Environment::with_prefix("WFD").prefix_separator("_"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would be unsafe to splice into SQL text
    pub fn validate(&self) -> DeployerResult<()> {
        if !is_sql_identifier(&self.api_schema) {
            return Err(DeployerError::Config(format!(
                "api_schema '{}' is not a plain SQL identifier",
                self.api_schema
            )));
        }
        if !is_sql_identifier(&self.staging_table) {
            return Err(DeployerError::Config(format!(
                "staging_table '{}' is not a plain SQL identifier",
                self.staging_table
            )));
        }
        if self.insert_batch_size == 0 {
            return Err(DeployerError::Config(
                "insert_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Dot-separated identifiers made of ASCII letters, digits and underscores
fn is_sql_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
