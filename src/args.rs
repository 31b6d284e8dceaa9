//! Command-line argument handling
//!
//! Arguments are `--key=value` tokens in any order. Unknown tokens are
//! ignored, a repeated key keeps its last value.

use std::fmt;
use std::path::PathBuf;

use log::warn;

use crate::errors::{DeployerError, DeployerResult};

/// Scheme prepended to the `--connectionString` value
pub const CONNECTION_SCHEME: &str = "postgres://";

/// Value of `--deploy` that enables the deployment step
pub const DEPLOY_AFFIRMATIVE: &str = "Y";

/// Options that must be present for a run to start
pub const MANDATORY_OPTIONS: [&str; 4] = ["userName", "password", "connectionString", "directory"];

pub const USAGE: &str = "Usage example: workflow-deployer --userName=<databaseUserName> --password=<Password> \
--connectionString=<host:port/database> --directory=<path/to/workflows> [--deploy=Y|N]";

/// Credentials used to open the database connection
#[derive(Clone)]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
    /// Connection URL including the scheme, without credentials
    pub connection_url: String,
}

impl Credentials {
    /// Connection URL with any `user:password@` part removed, safe to log
    pub fn display_url(&self) -> String {
        strip_userinfo(&self.connection_url)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("connection_url", &self.display_url())
            .finish()
    }
}

fn strip_userinfo(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}

/// Run configuration parsed from the command line
#[derive(Debug, Clone)]
pub struct DeployerConfig {
    pub credentials: Credentials,
    /// Root of the recursive workflow file scan
    pub directory: PathBuf,
    /// Whether the deployment step runs after validation
    pub deploy: bool,
}

/// Names of mandatory options that no argument starts with
pub fn missing_mandatory_options<S: AsRef<str>>(args: &[S]) -> Vec<&'static str> {
    MANDATORY_OPTIONS
        .iter()
        .copied()
        .filter(|option| {
            let flag = format!("--{}", option);
            !args.iter().any(|arg| arg.as_ref().starts_with(&flag))
        })
        .collect()
}

/// Check the mandatory options, logging the usage message when some are missing
pub fn validate_arguments<S: AsRef<str>>(args: &[S]) -> bool {
    let missing = missing_mandatory_options(args);
    if missing.is_empty() {
        return true;
    }

    warn!(
        "ERROR running workflow deployer. Options {:?} are mandatory! Missing: {}\n{}",
        MANDATORY_OPTIONS,
        missing.join(", "),
        USAGE
    );
    false
}

impl DeployerConfig {
    /// Build the configuration from `--key=value` tokens
    ///
    /// Fails when a mandatory option never received a value, which happens
    /// for a bare `--userName` that passes [`validate_arguments`].
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> DeployerResult<Self> {
        let mut user_name = None;
        let mut password = None;
        let mut connection_string = None;
        let mut directory = None;
        let mut deploy = DEPLOY_AFFIRMATIVE.to_string();

        for arg in args {
            let arg = arg.as_ref();
            if let Some(value) = arg.strip_prefix("--userName=") {
                user_name = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("--password=") {
                password = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("--connectionString=") {
                connection_string = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("--directory=") {
                directory = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("--deploy=") {
                deploy = value.to_string();
            }
        }

        match (user_name, password, connection_string, directory) {
            (Some(user_name), Some(password), Some(connection_string), Some(directory)) => Ok(Self {
                credentials: Credentials {
                    user_name,
                    password,
                    connection_url: format!("{}{}", CONNECTION_SCHEME, connection_string),
                },
                directory: PathBuf::from(directory),
                deploy: deploy == DEPLOY_AFFIRMATIVE,
            }),
            (user_name, password, connection_string, directory) => {
                let missing = [
                    ("userName", user_name.is_none()),
                    ("password", password.is_none()),
                    ("connectionString", connection_string.is_none()),
                    ("directory", directory.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name.to_string())
                .collect();
                Err(DeployerError::MissingOptions(missing))
            }
        }
    }
}
