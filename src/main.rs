#![allow(non_snake_case)]

use std::env;
use std::process::ExitCode;

use attendanceBot::cli::Cli;
use attendanceBot::config::{AppConfig, Settings};
use attendanceBot::error::AppError;
use attendanceBot::runtime;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = match cli.config.clone().or_else(|| env::var("CONFIG_FILE").ok()) {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::default(),
    };

    let get_prop = |key: &str| -> Option<String> {
        if key == "ELIGIBILITY_POLICY" {
            if let Some(policy) = &cli.policy {
                return Some(policy.clone());
            }
        }
        config.get(key).or_else(|| env::var(key).ok())
    };

    // Missing credentials stop here, before any browser is started.
    let settings = Settings::resolve(get_prop)?;
    runtime::run(settings, cli.dry_run).await?;
    Ok(())
}
