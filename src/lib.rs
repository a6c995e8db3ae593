//! # siaet-dl
//!
//! Downloads the monthly AET (authorization) records of a year from the SIAET
//! API and stores each month as a JSON file.
//!
//! Per month the pipeline is: fresh token, data request with a bounded
//! fixed-interval retry, then persist or skip. Months run strictly one after
//! the other and a failing month never stops the run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use siaet_dl::{Config, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::new(Credentials::new("my-id", "my-secret"), 2024);
//!     config.months = vec![1, 2, 3];
//!
//!     let summary = siaet_dl::run(&config).await?;
//!     println!("{} months saved", summary.saved());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Monthly record retrieval and response classification
pub mod fetcher;
/// Month-by-month download driver
pub mod orchestrator;
/// Fixed-interval retry policy
pub mod retry;
/// Start-time scheduling
pub mod schedule;
/// Artifact persistence
pub mod storage;
/// Token acquisition
pub mod token;
/// Outbound request seam
pub mod transport;
/// Core types
pub mod types;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{ApiConfig, Config, OutputConfig, RetryConfig};
pub use error::{AuthError, Error, Result, TransportFailure};
pub use fetcher::{FetchReport, RecordFetcher};
pub use orchestrator::MonthOrchestrator;
pub use retry::RetryPolicy;
pub use storage::ArtifactStore;
pub use token::TokenProvider;
pub use transport::{ApiTransport, HttpTransport, TransportResponse};
pub use types::{
    AccessToken, AetBatch, ApiOutcome, Credentials, MonthReport, MonthStatus, QueryTarget,
    RunSummary,
};

/// Run a complete download as described by `config`
///
/// Validates the configuration before any network activity, waits for the
/// configured start time if there is one, then processes every configured month.
pub async fn run(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    if let Some(start) = config.start_time {
        schedule::wait_until(start).await;
    }

    let orchestrator = MonthOrchestrator::from_config(config)?;
    orchestrator
        .run(&config.credentials, config.year, &config.months)
        .await
}
