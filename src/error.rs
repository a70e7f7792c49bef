//! Crate-wide error type and the classifier's error taxonomy.

use thiserror::Error;

/// The classification a failed request is bucketed into.
///
/// Only `Transient` errors are ever retried by [`crate::retry`]; every other kind
/// propagates to the caller on first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    /// A well-formed, server-reported error that is never retried and isn't one
    /// of the more specific kinds below (e.g. a 400 `InvalidQueryParameterValue`).
    /// Distinct from `Malformed`, which means the *response body itself* didn't
    /// parse — per spec section 3's taxonomy.
    Permanent,
    Auth,
    NotFound,
    Conflict,
    Malformed,
    Timeout,
    Network,
    Cancelled,
}

/// A structured error surfaced by the request pipeline.
///
/// Carries everything the taxonomy in spec section 3/7 asks for: the service error
/// `code`, a human message, the HTTP status if one was reached, the number of
/// attempts made, and an optional auth-specific detail string.
#[derive(Debug, Clone)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub retries: u32,
    pub detail: Option<String>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            status_code: None,
            retries: 0,
            detail: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// `name` is always `code + "Error"`, per spec section 4.7.
    pub fn name(&self) -> String {
        format!("{}Error", self.code)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient)
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

/// Construction-time configuration failures, surfaced synchronously before any I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingField(&'static str),
    #[error("exactly one credential must be configured, found {0}")]
    ConflictingCredentials(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// The crate-wide error type. Every fallible public entry point returns
/// `Result<T, Error>`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("request timed out after {retries} attempt(s)")]
    Timeout { retries: u32 },

    #[error("network error: {message}")]
    Network {
        message: String,
        /// The transport-level error code (e.g. `ECONNRESET`), when the underlying
        /// failure could be classified; `None` for errors with no such code
        /// (malformed request construction, an unrecognized transport failure).
        /// Only a code in [`TRANSIENT_NETWORK_CODES`] is retried, per spec section
        /// 4.5 — TLS/certificate failures and DNS `ENOTFOUND` are not.
        code: Option<String>,
        retries: u32,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to parse response body: {0}")]
    Malformed(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Auth,
            Error::Service(e) => e.kind,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Network { .. } => ErrorKind::Network,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Malformed(_) => ErrorKind::Malformed,
        }
    }

    pub fn retries(&self) -> u32 {
        match self {
            Error::Service(e) => e.retries,
            Error::Timeout { retries } | Error::Network { retries, .. } => *retries,
            _ => 0,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Service(e) => e.status_code,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Network-level error codes treated as transient, per spec section 4.5/GLOSSARY.
pub const TRANSIENT_NETWORK_CODES: &[&str] = &[
    "EAI_AGAIN",
    "ECONNRESET",
    "ETIMEDOUT",
    "ESOCKETTIMEDOUT",
    "ECONNREFUSED",
    "Timeout",
];

/// Whether a transport-level error code is one of the fixed set retried per spec
/// section 4.5, regardless of the caller's configured `transient_error_codes`
/// (that set only governs server-reported `<Code>`s, not transport failures).
pub fn is_transient_network_code(code: &str) -> bool {
    TRANSIENT_NETWORK_CODES.contains(&code)
}

/// Default transient service error codes, per spec section 6.
pub fn default_transient_error_codes() -> std::collections::HashSet<String> {
    let mut set: std::collections::HashSet<String> = ["InternalError", "ServerBusy"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    set.extend(TRANSIENT_NETWORK_CODES.iter().map(|s| s.to_string()));
    set
}
