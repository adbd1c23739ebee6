use thiserror::Error;

#[derive(Error, Debug)]
pub enum LensError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no APM metrics discovered for service '{service}' (tried: {tried:?})")]
    Discovery { service: String, tried: Vec<String> },

    #[error("insufficient metric data for service '{service}': {detail}")]
    InsufficientData { service: String, detail: String },

    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("rate limited by backend: {0}")]
    RateLimited(String),

    #[error("permanent backend error (status {status}): {message}")]
    Permanent { status: u16, message: String },

    #[error("authentication unavailable: {0}")]
    Auth(String),

    #[error("timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for spanlens operations
pub type Result<T> = std::result::Result<T, LensError>;

impl LensError {
    /// Creates a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a new transient backend error
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        Self::Transient(msg.into())
    }

    /// Creates a new permanent backend error
    pub fn permanent<S: Into<String>>(status: u16, msg: S) -> Self {
        Self::Permanent {
            status,
            message: msg.into(),
        }
    }

    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Creates a new authentication error
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if this error should be retried with backoff.
    ///
    /// Rate limits, 5xx responses, timeouts and connection-level failures
    /// are transient; everything else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) | Self::RateLimited(_) => true,
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Discovery { .. } => "discovery",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Transient(_) | Self::RateLimited(_) => "transient",
            Self::Permanent { .. } => "permanent",
            Self::Auth(_) => "auth",
            Self::Timeout { .. } => "timeout",
            Self::Parse { .. } | Self::Serialization(_) => "parse",
            Self::Http(_) => "network",
            Self::Config(_) => "config",
        }
    }
}
