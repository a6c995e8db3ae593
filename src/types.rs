//! Core types for siaet-dl

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Key of the records collection in a data response
pub const RECORDS_KEY: &str = "AET";

/// Long-lived API credentials, fixed for the lifetime of the process
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Client identifier (`Id` query parameter)
    pub id: String,

    /// Client secret (`Secret` query parameter)
    #[serde(skip_serializing)]
    pub secret: String,
}

impl Credentials {
    /// Create credentials from an id and a secret
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// Both fields are non-empty
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty() && !self.secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &"***")
            .finish()
    }
}

/// Short-lived token issued by the token endpoint
///
/// Scoped to nothing in particular; the orchestrator acquires a fresh one for
/// every month and drops it afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw token value, as sent in the `token` query parameter
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(***)")
    }
}

/// One unit of work: a month of a year
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryTarget {
    /// Month, 1 through 12
    pub month: u32,
    /// Year
    pub year: i32,
}

impl QueryTarget {
    /// Create a target, rejecting months outside 1..=12
    pub fn new(month: u32, year: i32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { month, year })
    }

    /// Two-digit month as sent to the API and used in file names
    pub fn month_label(&self) -> String {
        format!("{:02}", self.month)
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// The `siaet` status envelope returned by both endpoints
///
/// Every field is a JSON string upstream (`codigo` is numeric-as-string). A
/// missing or null field reads as empty; any other JSON type makes the whole
/// envelope unreadable, so `"codigo": 200` never passes for `"200"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StatusEnvelope {
    /// Kind of answer: `"token"`, `"erro"`, ...
    #[serde(default, deserialize_with = "string_or_null")]
    pub retorno: String,

    /// Business code, e.g. `"200"` or `"400.005"`
    #[serde(default, deserialize_with = "string_or_null")]
    pub codigo: String,

    /// Token value on success, human-readable message otherwise
    #[serde(default, deserialize_with = "string_or_null")]
    pub mensagem: String,
}

#[derive(Deserialize)]
struct EnvelopeBody {
    siaet: StatusEnvelope,
}

impl StatusEnvelope {
    /// Extract the envelope from a response body, if it has one
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.get("siaet").is_some_and(Value::is_object) {
            return None;
        }
        serde_json::from_value::<EnvelopeBody>(value.clone())
            .ok()
            .map(|body| body.siaet)
    }

    /// `retorno == "token"` and `codigo == "200"`
    pub fn is_token(&self) -> bool {
        self.retorno == "token" && self.codigo == "200"
    }

    /// `retorno == "erro"`
    pub fn is_error(&self) -> bool {
        self.retorno == "erro"
    }
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A well-formed data response: the raw payload with its `AET` array
#[derive(Clone, Debug, PartialEq)]
pub struct AetBatch {
    payload: Value,
}

impl AetBatch {
    /// Accept a payload only if it carries an `AET` array (possibly empty)
    pub fn from_payload(payload: Value) -> Option<Self> {
        payload
            .get(RECORDS_KEY)
            .is_some_and(Value::is_array)
            .then_some(Self { payload })
    }

    /// The records, in upstream order
    pub fn records(&self) -> &[Value] {
        self.payload
            .get(RECORDS_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// No records for the period
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// The full payload, persisted verbatim
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Classified result of fetching one month
#[derive(Clone, Debug, PartialEq)]
pub enum ApiOutcome {
    /// Well-formed records collection (possibly empty)
    Success(AetBatch),
    /// Business-level rejection from the data endpoint
    ApiError {
        /// Upstream `codigo`, or `"unrecognized"` for unknown bodies
        code: String,
        /// Upstream `mensagem` or a description of the body
        message: String,
    },
    /// Network failure or timeout
    TransportError(String),
    /// The token was rejected as invalid or expired
    TokenInvalid,
}

impl ApiOutcome {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ApiOutcome::Success(_) => "success",
            ApiOutcome::ApiError { .. } => "api_error",
            ApiOutcome::TransportError(_) => "transport_error",
            ApiOutcome::TokenInvalid => "token_invalid",
        }
    }
}

/// What happened to one month
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonthStatus {
    /// Artifact written
    Saved {
        /// Where the artifact was written
        path: PathBuf,
        /// Number of records in it
        records: usize,
    },
    /// Empty collection and empty collections are not persisted
    SkippedEmpty,
    /// No token could be obtained
    AuthFailed(String),
    /// The data endpoint rejected the request
    ApiRejected {
        /// Upstream code
        code: String,
        /// Upstream message
        message: String,
    },
    /// Every attempt failed at the transport level
    TransportFailed(String),
    /// The token was rejected mid-run
    TokenExpired,
    /// The artifact could not be written
    PersistFailed(String),
}

impl MonthStatus {
    /// An artifact was written
    pub fn is_saved(&self) -> bool {
        matches!(self, MonthStatus::Saved { .. })
    }
}

/// Outcome of one month of a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthReport {
    /// The month processed
    pub target: QueryTarget,
    /// Data request attempts made (0 when no token was obtained)
    pub attempts: u32,
    /// Result
    pub status: MonthStatus,
}

/// Outcome of a whole run, in processing order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One report per processed month
    pub months: Vec<MonthReport>,
}

impl RunSummary {
    /// Months for which an artifact was written
    pub fn saved(&self) -> usize {
        self.months.iter().filter(|m| m.status.is_saved()).count()
    }

    /// Months that were skipped for any reason
    pub fn skipped(&self) -> usize {
        self.months.len() - self.saved()
    }
}
