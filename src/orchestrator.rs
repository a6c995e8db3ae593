//! Month-by-month download driver
//!
//! For every configured month, strictly in order:
//!
//! 1. acquire a fresh token (never reused across months)
//! 2. fetch the month with [`RecordFetcher`]
//! 3. persist the payload or log why the month is skipped
//! 4. pause for the inter-month delay before the next month
//!
//! A failing month never aborts the run. The only fatal condition is missing
//! credentials, checked once before the loop.

use crate::config::{Config, normalize_months};
use crate::error::{Error, Result};
use crate::fetcher::RecordFetcher;
use crate::retry::RetryPolicy;
use crate::storage::ArtifactStore;
use crate::token::TokenProvider;
use crate::transport::{ApiTransport, HttpTransport};
use crate::types::{ApiOutcome, Credentials, MonthReport, MonthStatus, QueryTarget, RunSummary};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Drives token acquisition, fetching and persistence for a list of months
#[derive(Clone, Debug)]
pub struct MonthOrchestrator {
    tokens: TokenProvider,
    fetcher: RecordFetcher,
    store: ArtifactStore,
    persist_empty: bool,
    month_delay: Duration,
}

impl MonthOrchestrator {
    /// Orchestrator with the default policies (empty months persisted, 2s between months)
    pub fn new(tokens: TokenProvider, fetcher: RecordFetcher, store: ArtifactStore) -> Self {
        Self {
            tokens,
            fetcher,
            store,
            persist_empty: true,
            month_delay: Duration::from_secs(2),
        }
    }

    /// Build every component from `config` over the reqwest transport
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.api.request_timeout)?);
        Self::with_transport(config, transport)
    }

    /// Build every component from `config` over any transport
    pub fn with_transport(config: &Config, transport: Arc<dyn ApiTransport>) -> Result<Self> {
        let tokens = TokenProvider::new(transport.clone(), config.api.token_url()?);
        let fetcher = RecordFetcher::new(
            transport,
            config.api.data_url()?,
            RetryPolicy::from(&config.retry),
        )
        .with_terminal_codes(config.retry.terminal_codes.clone());
        let store = ArtifactStore::new(config.output.base_dir.clone());

        Ok(Self::new(tokens, fetcher, store)
            .with_persist_empty(config.output.persist_empty)
            .with_month_delay(config.month_delay))
    }

    /// Whether a month with zero records still produces a file
    pub fn with_persist_empty(mut self, persist_empty: bool) -> Self {
        self.persist_empty = persist_empty;
        self
    }

    /// Pause between two months
    pub fn with_month_delay(mut self, delay: Duration) -> Self {
        self.month_delay = delay;
        self
    }

    /// Process `months` of `year` in order
    ///
    /// `months` is normalized first: duplicates and values outside 1..=12 are
    /// dropped, and an empty result means all twelve months.
    pub async fn run(
        &self,
        credentials: &Credentials,
        year: i32,
        months: &[u32],
    ) -> Result<RunSummary> {
        if !credentials.is_complete() {
            error!("SIAET_ID and SIAET_SECRET were not provided");
            return Err(Error::Config {
                message: "credentials are missing".to_string(),
                key: None,
            });
        }

        let months = normalize_months(months.iter().map(|&m| i64::from(m)));
        info!(year, months = ?months, "Starting AET download");

        let mut summary = RunSummary::default();
        for (index, month) in months.iter().enumerate() {
            let Some(target) = QueryTarget::new(*month, year) else {
                continue;
            };

            let report = self.process_month(credentials, target).await;
            summary.months.push(report);

            if index + 1 < months.len() && !self.month_delay.is_zero() {
                info!(delay_secs = self.month_delay.as_secs_f64(), "Waiting before next month");
                tokio::time::sleep(self.month_delay).await;
            }
        }

        info!(
            year,
            saved = summary.saved(),
            skipped = summary.skipped(),
            "AET download finished"
        );
        Ok(summary)
    }

    async fn process_month(&self, credentials: &Credentials, target: QueryTarget) -> MonthReport {
        info!(period = %target, "Processing month");

        let token = match self.tokens.acquire_token(credentials).await {
            Ok(token) => token,
            Err(e) => {
                error!(period = %target, error = %e, "Could not obtain token, skipping month");
                return MonthReport {
                    target,
                    attempts: 0,
                    status: MonthStatus::AuthFailed(e.to_string()),
                };
            }
        };

        let report = self.fetcher.fetch_month(&token, target).await;
        let status = match report.outcome {
            ApiOutcome::Success(batch) if batch.is_empty() && !self.persist_empty => {
                info!(period = %target, "No AET records, nothing saved");
                MonthStatus::SkippedEmpty
            }
            ApiOutcome::Success(batch) => match self.store.save(batch.payload(), target).await {
                Ok(path) => MonthStatus::Saved {
                    path,
                    records: batch.len(),
                },
                Err(e) => {
                    error!(period = %target, error = %e, "Failed to save data");
                    MonthStatus::PersistFailed(e.to_string())
                }
            },
            ApiOutcome::ApiError { code, message } => {
                warn!(period = %target, %code, %message, "No AET data returned, skipping month");
                MonthStatus::ApiRejected { code, message }
            }
            ApiOutcome::TransportError(message) => {
                warn!(period = %target, error = %message, "Persistent request failure, skipping month");
                MonthStatus::TransportFailed(message)
            }
            ApiOutcome::TokenInvalid => {
                warn!(period = %target, "Token expired during the month, skipping month");
                MonthStatus::TokenExpired
            }
        };

        MonthReport {
            target,
            attempts: report.attempts,
            status,
        }
    }
}
