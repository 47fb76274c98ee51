use serde_json::Value;
use std::fmt;

/// Errors raised while loading or validating credential configuration.
#[derive(Debug)]
pub enum Error {
    ConfigParse(String),
    IoError(std::io::Error),
    InvalidData(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigParse(msg) => write!(f, "Configuration parse error: {}", msg),
            Error::IoError(err) => write!(f, "IO error: {}", err),
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParse(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single proxied call.
///
/// Every variant is returned as data from the executor; none of them is
/// raised as a panic. `InvalidMethod`, `MissingCredential` and
/// `InvalidRequest` are all detected before any network I/O happens.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyError {
    /// The caller supplied a verb outside the supported set.
    InvalidMethod(String),
    /// No credentials are configured for the provider key.
    MissingCredential(String),
    /// The request could not be assembled (bad URL, illegal header value).
    InvalidRequest(String),
    /// DNS, connect, TLS, timeout, or body read failure.
    Transport(String),
    /// The provider answered with a non-success status.
    Remote {
        status: u16,
        detail: Option<String>,
        /// Best-effort decoded response body.
        body: Option<Value>,
    },
}

impl ProxyError {
    /// Stable tag for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidMethod(_) => "invalid_method",
            ProxyError::MissingCredential(_) => "missing_credential",
            ProxyError::InvalidRequest(_) => "invalid_request",
            ProxyError::Transport(_) => "transport_error",
            ProxyError::Remote { .. } => "remote_error",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::InvalidMethod(method) => {
                write!(f, "Unsupported HTTP method: '{}'", method)
            }
            ProxyError::MissingCredential(provider) => {
                write!(f, "No credentials configured for provider '{}'", provider)
            }
            ProxyError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProxyError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ProxyError::Remote {
                status,
                detail: Some(detail),
                ..
            } => write!(f, "Remote error ({}): {}", status, detail),
            ProxyError::Remote { status, .. } => write!(f, "Remote error ({})", status),
        }
    }
}

impl std::error::Error for ProxyError {}
