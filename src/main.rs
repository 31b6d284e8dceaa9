//! workflow-deployer entry point

use std::process::ExitCode;

use workflow_deployer::args::{self, DeployerConfig};
use workflow_deployer::config::Settings;
use workflow_deployer::db::operations::PgConnector;
use workflow_deployer::deployer::{self, EXIT_FAILURE};
use workflow_deployer::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(&Settings::default().log_filter);
            tracing::error!("Unable to load settings: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    logging::init(&settings.log_filter);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args::validate_arguments(&args) {
        return ExitCode::from(EXIT_FAILURE);
    }

    let config = match DeployerConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("ERROR running workflow deployer. {}\n{}", e, args::USAGE);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let connector = match PgConnector::new(&settings) {
        Ok(connector) => connector,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    let result = deployer::run(&config, &settings, &connector).await;
    if let Ok(outcome) = &result {
        tracing::info!("Workflow deployer finished: {}.", outcome);
    }

    ExitCode::from(deployer::exit_status(&result))
}
