//! Error type shared by every network-facing source.

/// Errors that can occur while talking to an external service.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The request never produced a response (offline, DNS, CORS...).
    Network(String),
    /// The service answered with a non-success status.
    Status { status: u16, message: String },
    /// The response body could not be decoded.
    Decode(String),
    /// The service requires an access credential that is not configured.
    MissingCredential,
    /// The transport does not exist on this platform.
    Unavailable(String),
    /// The request was superseded and aborted before it completed.
    Aborted,
}

impl FetchError {
    /// HTTP status of the failure, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "Network request failed: {}", msg),
            FetchError::Status { status, message } => {
                write!(f, "Service responded with {}: {}", status, message)
            }
            FetchError::Decode(msg) => write!(f, "Failed to decode response: {}", msg),
            FetchError::MissingCredential => write!(f, "Access token not configured"),
            FetchError::Unavailable(msg) => write!(f, "Transport unavailable: {}", msg),
            FetchError::Aborted => write!(f, "Request aborted"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}
