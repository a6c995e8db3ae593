//! Token acquisition
//!
//! One GET against the token endpoint exchanges the long-lived credentials for
//! a short-lived token. The body is a `siaet` status envelope and only
//! `retorno == "token"` together with `codigo == "200"` counts as success.
//! There is no retry here; the orchestrator asks again for the next month.

use crate::error::AuthError;
use crate::transport::ApiTransport;
use crate::types::{AccessToken, Credentials, StatusEnvelope};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Exchanges credentials for an [`AccessToken`]
#[derive(Clone)]
pub struct TokenProvider {
    transport: Arc<dyn ApiTransport>,
    url: Url,
}

impl TokenProvider {
    /// Provider calling the token endpoint at `url`
    pub fn new(transport: Arc<dyn ApiTransport>, url: Url) -> Self {
        Self { transport, url }
    }

    /// Request a fresh token
    ///
    /// Fails with [`AuthError::MissingCredentials`] without any request when
    /// either credential field is empty.
    pub async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken, AuthError> {
        if !credentials.is_complete() {
            warn!("Token request skipped: id or secret is empty");
            return Err(AuthError::MissingCredentials);
        }

        debug!(url = %self.url, "Requesting token");
        let response = self
            .transport
            .get(
                &self.url,
                &[
                    ("Id", credentials.id.as_str()),
                    ("Secret", credentials.secret.as_str()),
                ],
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "Token request failed");
                AuthError::Transport(e.message)
            })?;

        let envelope = serde_json::from_str::<Value>(&response.body)
            .ok()
            .as_ref()
            .and_then(StatusEnvelope::from_value);

        match envelope {
            Some(envelope) if envelope.is_token() && !response.is_success() => {
                // A token inside an HTTP error is not trusted
                warn!(status = response.status, "Token envelope with HTTP error status");
                Err(AuthError::Rejected {
                    code: response.status.to_string(),
                    message: "token returned with HTTP error status".to_string(),
                })
            }
            Some(envelope) if envelope.is_token() => {
                if envelope.mensagem.is_empty() {
                    return Err(AuthError::UnexpectedResponse(
                        "token envelope without a token".to_string(),
                    ));
                }
                info!("Token obtained");
                Ok(AccessToken::new(envelope.mensagem))
            }
            Some(envelope) => {
                warn!(
                    status = response.status,
                    code = %envelope.codigo,
                    message = %envelope.mensagem,
                    "Token request rejected"
                );
                Err(AuthError::Rejected {
                    code: envelope.codigo,
                    message: envelope.mensagem,
                })
            }
            None if !response.is_success() => {
                warn!(status = response.status, "Token request failed with HTTP error");
                Err(AuthError::Transport(format!("HTTP {}", response.status)))
            }
            None => {
                warn!(status = response.status, "Unrecognized token response");
                Err(AuthError::UnexpectedResponse(truncate(&response.body, 200)))
            }
        }
    }
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider").field("url", &self.url).finish()
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
