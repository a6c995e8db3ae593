//! Monthly record retrieval
//!
//! [`RecordFetcher::fetch_month`] issues the data request for one month and
//! classifies every answer into an [`ApiOutcome`]:
//!
//! | Answer | Verdict |
//! |---|---|
//! | `{"AET": [...]}` (even empty) | `Success`, stop |
//! | error envelope, token invalid/expired | `TokenInvalid`, stop |
//! | error envelope, terminal code (`400.005`) | `ApiError`, stop |
//! | other error envelope | `ApiError`, retry |
//! | anything else | `ApiError("unrecognized")` or `TransportError`, retry |
//! | transport failure mentioning the token | `TokenInvalid`, stop |
//! | other transport failure | `TransportError`, retry |
//!
//! A retry keeps the same token. `TokenInvalid` is never retried here since the
//! same token cannot succeed.

use crate::error::TransportFailure;
use crate::retry::{Attempt, RetryPolicy, retry_attempts};
use crate::token::truncate;
use crate::transport::{ApiTransport, TransportResponse};
use crate::types::{
    AccessToken, AetBatch, ApiOutcome, QueryTarget, RECORDS_KEY, StatusEnvelope,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

/// Code reported when a body is neither records nor an error envelope
pub const UNRECOGNIZED_CODE: &str = "unrecognized";

/// Result of [`RecordFetcher::fetch_month`]
#[derive(Clone, Debug, PartialEq)]
pub struct FetchReport {
    /// Classified outcome of the last attempt
    pub outcome: ApiOutcome,
    /// Number of requests made
    pub attempts: u32,
}

/// Fetches one month of AET records with bounded retries
#[derive(Clone)]
pub struct RecordFetcher {
    transport: Arc<dyn ApiTransport>,
    url: Url,
    policy: RetryPolicy,
    terminal_codes: Vec<String>,
}

impl RecordFetcher {
    /// Fetcher calling the data endpoint at `url`
    pub fn new(transport: Arc<dyn ApiTransport>, url: Url, policy: RetryPolicy) -> Self {
        Self {
            transport,
            url,
            policy,
            terminal_codes: vec!["400.005".to_string()],
        }
    }

    /// Replace the error codes that end a month without retry
    pub fn with_terminal_codes(mut self, codes: Vec<String>) -> Self {
        self.terminal_codes = codes;
        self
    }

    /// Fetch the records of `target` using `token`
    pub async fn fetch_month(&self, token: &AccessToken, target: QueryTarget) -> FetchReport {
        let month = target.month_label();
        let year = target.year.to_string();
        let query = [
            ("token", token.as_str()),
            ("mesLiberacaoAet", month.as_str()),
            ("anoLiberacaoAet", year.as_str()),
        ];
        let query = &query;

        info!(period = %target, "Fetching AET records");

        let result = retry_attempts(&self.policy, move |attempt| async move {
            let response = self.transport.get(&self.url, query).await;
            let verdict = classify(response, &self.terminal_codes);
            log_attempt(target, attempt, self.policy.max_attempts(), &verdict);
            verdict
        })
        .await;

        FetchReport {
            outcome: result.value,
            attempts: result.attempts,
        }
    }
}

impl std::fmt::Debug for RecordFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFetcher")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("terminal_codes", &self.terminal_codes)
            .finish()
    }
}

/// Classify one answer of the data endpoint
pub fn classify(
    response: Result<TransportResponse, TransportFailure>,
    terminal_codes: &[String],
) -> Attempt<ApiOutcome> {
    let response = match response {
        Ok(response) => response,
        Err(failure) if is_token_invalid_message(&failure.message) => {
            return Attempt::Done(ApiOutcome::TokenInvalid);
        }
        Err(failure) => return Attempt::Retry(ApiOutcome::TransportError(failure.message)),
    };

    let value = match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => value,
        Err(_) => return Attempt::Retry(unreadable(&response)),
    };

    if value.get(RECORDS_KEY).is_some_and(Value::is_array) {
        return match AetBatch::from_payload(value) {
            Some(batch) => Attempt::Done(ApiOutcome::Success(batch)),
            None => Attempt::Retry(unreadable(&response)),
        };
    }

    let Some(envelope) = StatusEnvelope::from_value(&value).filter(StatusEnvelope::is_error)
    else {
        return Attempt::Retry(unreadable(&response));
    };

    if is_token_invalid_message(&envelope.mensagem) {
        return Attempt::Done(ApiOutcome::TokenInvalid);
    }
    let terminal = terminal_codes.iter().any(|code| *code == envelope.codigo);
    let outcome = ApiOutcome::ApiError {
        code: envelope.codigo,
        message: envelope.mensagem,
    };
    if terminal {
        Attempt::Done(outcome)
    } else {
        Attempt::Retry(outcome)
    }
}

fn unreadable(response: &TransportResponse) -> ApiOutcome {
    if response.is_success() {
        ApiOutcome::ApiError {
            code: UNRECOGNIZED_CODE.to_string(),
            message: truncate(&response.body, 200),
        }
    } else {
        ApiOutcome::TransportError(format!("HTTP {}", response.status))
    }
}

/// Whether an upstream message says the token is invalid or expired
pub fn is_token_invalid_message(message: &str) -> bool {
    let message = message.to_lowercase();
    ["token invalido", "token inválido", "token expirado"]
        .iter()
        .any(|needle| message.contains(needle))
}

fn log_attempt(
    target: QueryTarget,
    attempt: u32,
    max_attempts: u32,
    verdict: &Attempt<ApiOutcome>,
) {
    let (outcome, final_attempt) = match verdict {
        Attempt::Done(outcome) => (outcome, true),
        Attempt::Retry(outcome) => (outcome, attempt >= max_attempts),
    };
    match outcome {
        ApiOutcome::Success(batch) if batch.is_empty() => {
            info!(period = %target, attempt, "No AET records for this period");
        }
        ApiOutcome::Success(batch) => {
            info!(period = %target, attempt, records = batch.len(), "AET records received");
        }
        ApiOutcome::TokenInvalid => {
            warn!(period = %target, attempt, "Token invalid or expired");
        }
        ApiOutcome::ApiError { code, message } if final_attempt => {
            error!(
                period = %target,
                attempt,
                outcome = outcome.kind(),
                %code,
                %message,
                "API error, no more attempts for this month"
            );
        }
        ApiOutcome::ApiError { code, message } => {
            warn!(
                period = %target,
                attempt,
                max_attempts,
                outcome = outcome.kind(),
                %code,
                %message,
                "API error"
            );
        }
        ApiOutcome::TransportError(message) if final_attempt => {
            error!(
                period = %target,
                attempt,
                outcome = outcome.kind(),
                error = %message,
                "Request failed, no more attempts for this month"
            );
        }
        ApiOutcome::TransportError(message) => {
            warn!(
                period = %target,
                attempt,
                max_attempts,
                outcome = outcome.kind(),
                error = %message,
                "Request failed"
            );
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedTransport, error_body, ok_json, records_body};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn terminal() -> Vec<String> {
        vec!["400.005".to_string()]
    }

    fn fetcher(transport: Arc<ScriptedTransport>, policy: RetryPolicy) -> RecordFetcher {
        RecordFetcher::new(
            transport,
            Url::parse("https://siaet.example/api/aet/detalhe/v1/").unwrap(),
            policy,
        )
    }

    fn counting_policy() -> (RetryPolicy, Arc<AtomicU32>) {
        let delays = Arc::new(AtomicU32::new(0));
        let counter = delays.clone();
        let policy = RetryPolicy::with_delay_fn(3, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Duration::ZERO
        });
        (policy, delays)
    }

    fn token() -> AccessToken {
        AccessToken::new("tok")
    }

    #[test]
    fn test_classify_records() {
        let verdict = classify(Ok(ok_json(records_body(2))), &terminal());
        match verdict {
            Attempt::Done(ApiOutcome::Success(batch)) => assert_eq!(batch.len(), 2),
            other => panic!("expected success, got {:?}", other),
        }

        // A records array wins over an error envelope in the same body
        let mixed = json!({
            "AET": [{"numeroAet": "AET-0001"}],
            "siaet": {"retorno": "erro", "codigo": "500", "mensagem": "parcial"}
        });
        match classify(Ok(ok_json(mixed)), &terminal()) {
            Attempt::Done(ApiOutcome::Success(batch)) => assert_eq!(batch.len(), 1),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_envelopes() {
        assert_eq!(
            classify(Ok(ok_json(error_body("401", "token invalido"))), &terminal()),
            Attempt::Done(ApiOutcome::TokenInvalid)
        );
        assert_eq!(
            classify(Ok(ok_json(error_body("401", "Token Expirado"))), &terminal()),
            Attempt::Done(ApiOutcome::TokenInvalid)
        );
        assert_eq!(
            classify(Ok(ok_json(error_body("400.005", "sem dados"))), &terminal()),
            Attempt::Done(ApiOutcome::ApiError {
                code: "400.005".into(),
                message: "sem dados".into()
            })
        );
        assert_eq!(
            classify(Ok(ok_json(error_body("500", "erro interno"))), &terminal()),
            Attempt::Retry(ApiOutcome::ApiError {
                code: "500".into(),
                message: "erro interno".into()
            })
        );
    }

    #[test]
    fn test_classify_unrecognized() {
        assert!(matches!(
            classify(Ok(ok_json(json!({"dados": []}))), &terminal()),
            Attempt::Retry(ApiOutcome::ApiError { ref code, .. }) if code == UNRECOGNIZED_CODE
        ));
        let not_json = TransportResponse {
            status: 502,
            body: "Bad Gateway".into(),
        };
        assert_eq!(
            classify(Ok(not_json), &terminal()),
            Attempt::Retry(ApiOutcome::TransportError("HTTP 502".into()))
        );
    }

    #[test]
    fn test_classify_transport_failures() {
        assert_eq!(
            classify(Err(TransportFailure::new("token invalido")), &terminal()),
            Attempt::Done(ApiOutcome::TokenInvalid)
        );
        assert_eq!(
            classify(Err(TransportFailure::timeout("request timed out")), &terminal()),
            Attempt::Retry(ApiOutcome::TransportError("request timed out".into()))
        );
    }

    #[tokio::test]
    async fn test_empty_collection_is_success_on_first_attempt() {
        let transport = Arc::new(ScriptedTransport::new().data_json(json!({"AET": []})));
        let (policy, delays) = counting_policy();
        let target = QueryTarget::new(5, 2024).unwrap();

        let report = fetcher(transport.clone(), policy)
            .fetch_month(&token(), target)
            .await;

        match report.outcome {
            ApiOutcome::Success(batch) => assert!(batch.is_empty()),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(report.attempts, 1);
        assert_eq!(delays.load(Ordering::SeqCst), 0);

        let calls = transport.data_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].param("token"), Some("tok"));
        assert_eq!(calls[0].param("mesLiberacaoAet"), Some("05"));
        assert_eq!(calls[0].param("anoLiberacaoAet"), Some("2024"));
    }

    #[tokio::test]
    async fn test_three_timeouts_give_transport_error() {
        let transport = Arc::new(
            ScriptedTransport::new().data_reply(Err(TransportFailure::timeout("request timed out"))),
        );
        let (policy, delays) = counting_policy();
        let target = QueryTarget::new(3, 2023).unwrap();

        let report = fetcher(transport.clone(), policy)
            .fetch_month(&token(), target)
            .await;

        assert_eq!(
            report.outcome,
            ApiOutcome::TransportError("request timed out".into())
        );
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.data_calls().len(), 3);
        assert_eq!(delays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_invalid_stops_retries() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .data_json(error_body("500", "instavel"))
                .data_json(error_body("401", "token invalido"))
                .data_json(records_body(1)),
        );
        let (policy, delays) = counting_policy();

        let report = fetcher(transport.clone(), policy)
            .fetch_month(&token(), QueryTarget::new(1, 2024).unwrap())
            .await;

        assert_eq!(report.outcome, ApiOutcome::TokenInvalid);
        assert_eq!(report.attempts, 2);
        assert_eq!(transport.data_calls().len(), 2, "attempt 3 is never reached");
        assert_eq!(delays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_code_stops_immediately() {
        let transport =
            Arc::new(ScriptedTransport::new().data_json(error_body("400.005", "nenhuma aet")));
        let (policy, delays) = counting_policy();

        let report = fetcher(transport.clone(), policy)
            .fetch_month(&token(), QueryTarget::new(7, 2024).unwrap())
            .await;

        assert_eq!(
            report.outcome,
            ApiOutcome::ApiError {
                code: "400.005".into(),
                message: "nenhuma aet".into()
            }
        );
        assert_eq!(report.attempts, 1);
        assert_eq!(delays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_terminal_codes_are_configurable() {
        let transport = Arc::new(ScriptedTransport::new().data_json(error_body("400.005", "x")));

        let report = fetcher(transport.clone(), RetryPolicy::no_delay(3))
            .with_terminal_codes(vec![])
            .fetch_month(&token(), QueryTarget::new(7, 2024).unwrap())
            .await;

        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_retryable_error_then_success_keeps_token() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .data_json(error_body("500", "instavel"))
                .data_json(json!({"inesperado": true}))
                .data_json(records_body(4)),
        );
        let (policy, delays) = counting_policy();

        let report = fetcher(transport.clone(), policy)
            .fetch_month(&token(), QueryTarget::new(12, 2024).unwrap())
            .await;

        match report.outcome {
            ApiOutcome::Success(batch) => assert_eq!(batch.len(), 4),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(report.attempts, 3);
        assert_eq!(delays.load(Ordering::SeqCst), 2);
        assert!(
            transport
                .data_calls()
                .iter()
                .all(|c| c.param("token") == Some("tok"))
        );
    }

    #[tokio::test]
    async fn test_unrecognized_exhaustion() {
        let transport = Arc::new(ScriptedTransport::new().data_json(json!({"AET": "nada"})));

        let report = fetcher(transport, RetryPolicy::no_delay(3))
            .fetch_month(&token(), QueryTarget::new(2, 2024).unwrap())
            .await;

        assert!(matches!(
            report.outcome,
            ApiOutcome::ApiError { ref code, .. } if code == UNRECOGNIZED_CODE
        ));
        assert_eq!(report.attempts, 3);
    }

    #[test]
    fn test_token_message_detection() {
        assert!(is_token_invalid_message("token invalido"));
        assert!(is_token_invalid_message("Token inválido"));
        assert!(is_token_invalid_message("TOKEN EXPIRADO"));
        assert!(!is_token_invalid_message("periodo invalido"));
    }
}
