//! Typed errors for every layer of the pipeline.
//!
//! Failures are recovered as low as possible: transport errors become
//! [`CallFailure`], backends turn those into [`ClassifyError`] and the
//! dispatcher degrades them to a safe default label. Only [`AppError`]
//! ever reaches `main`.

use thiserror::Error;

/// Outcome of a single HTTP exchange that did not produce a usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallFailure {
    /// Connection refused, DNS failure, reset before a response arrived.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request did not complete within its timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status code.
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request could not be built or sent for a non-network reason.
    #[error("request error: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("body error: {0}")]
    Body(String),
}

impl CallFailure {
    /// Status codes worth retrying.
    pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CallFailure::Connect(_) | CallFailure::Timeout(_) => true,
            CallFailure::Status { status, .. } => Self::TRANSIENT_STATUSES.contains(status),
            CallFailure::Request(_) | CallFailure::Body(_) => false,
        }
    }
}

impl From<reqwest::Error> for CallFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CallFailure::Timeout(e.to_string())
        } else if e.is_connect() {
            CallFailure::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            CallFailure::Body(e.to_string())
        } else if let Some(status) = e.status() {
            CallFailure::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            CallFailure::Request(e.to_string())
        }
    }
}

/// Why a classifier backend produced no label.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The backend could not be reached after all retries.
    #[error("backend unavailable: {0}")]
    Unavailable(#[from] CallFailure),

    /// The backend is not configured (e.g. no API key).
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// The response envelope did not have the expected shape.
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// The model answered, but no rule could map the answer to an allowed label.
    #[error("could not normalise model output {raw:?}")]
    Unparseable { raw: String },
}

/// Scraping failures for a single URL.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] CallFailure),

    #[error("page had no extractable content")]
    Empty,

    #[error("parse error: {0}")]
    Parse(String),
}

/// Request validation failures (the whole request is rejected).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{0}' is required")]
    Missing(&'static str),

    #[error("field '{0}' must not be empty")]
    Empty(&'static str),
}

/// Configuration load and update failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("batch finished with status {0}")]
    BatchStatus(String),
}
