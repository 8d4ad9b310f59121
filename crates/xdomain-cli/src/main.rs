//! xdomain: runs scenario files through a cross-context driver session.

mod cli;
mod scenario;

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use xdomain_config::DriverConfig;
use xdomain_driver::Session;

use crate::cli::Command;

fn init_logging(level: Option<&str>, config: &DriverConfig) {
    // --log-level wins over RUST_LOG, which wins over the config file.
    let filter = match level {
        Some(level) => EnvFilter::try_new(format!("xdomain={level}")),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config.logging.directive())),
    }
    .unwrap_or_else(|_| EnvFilter::new("xdomain=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_scenario(config: &DriverConfig, path: &Path) -> ExitCode {
    let scenario = match scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("xdomain: {e}");
            return ExitCode::from(2);
        }
    };
    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("xdomain: {e}");
            return ExitCode::from(2);
        }
    };

    let report = scenario::run(&mut session, &scenario).await;
    session.shutdown();

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("xdomain: cannot encode report: {e}");
            return ExitCode::from(2);
        }
    }

    let failed = report.failed();
    tracing::info!(tests = report.tests.len(), failed, "scenario finished");
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let config = match xdomain_config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("xdomain: {e}");
            return ExitCode::from(2);
        }
    };
    init_logging(args.log_level.as_deref(), &config);

    match args.command {
        Command::Run { scenario } => run_scenario(&config, &scenario).await,
        Command::Config => {
            println!("{}", xdomain_config::config_to_json(&config));
            ExitCode::SUCCESS
        }
    }
}
