use siaet_dl::{Config, Error, MonthStatus};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    init_logging();

    let config = match Config::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            process::exit(1);
        }
    };

    info!(year = config.year, months = ?config.months, "Starting AET download process");

    match siaet_dl::run(&config).await {
        Ok(summary) => {
            for report in &summary.months {
                match &report.status {
                    MonthStatus::Saved { path, records } => info!(
                        period = %report.target,
                        records,
                        path = %path.display(),
                        "Saved"
                    ),
                    status => warn!(
                        period = %report.target,
                        attempts = report.attempts,
                        ?status,
                        "Skipped"
                    ),
                }
            }
        }
        Err(Error::Config { message, .. }) => {
            error!(%message, "Invalid configuration");
            process::exit(1);
        }
        Err(e) => error!(error = %e, "Download process failed"),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
