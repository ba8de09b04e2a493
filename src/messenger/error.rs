//! Outbound send error types

use thiserror::Error;

/// Send failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SendError {
    pub kind: SendErrorKind,
    pub message: String,
}

impl SendError {
    pub fn new(kind: SendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SendErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SendErrorKind::Timeout, message)
    }

    /// Classify a non-2xx response from the messaging API
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => SendErrorKind::Auth,
            429 => SendErrorKind::RateLimit,
            500..=599 => SendErrorKind::Server,
            _ => SendErrorKind::Rejected,
        };
        Self::new(kind, message)
    }
}

/// The request URL carries the page access token, so it never reaches the message
impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            Self::timeout(e.to_string())
        } else {
            Self::network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    /// Connection failures, DNS
    Network,
    /// No answer within the send timeout
    Timeout,
    /// Bad or expired access token (401, 403)
    Auth,
    RateLimit,
    /// Other 4xx, e.g. the user can no longer be messaged
    Rejected,
    Server,
}

impl SendErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SendErrorKind::Network => "network",
            SendErrorKind::Timeout => "timeout",
            SendErrorKind::Auth => "auth",
            SendErrorKind::RateLimit => "rate_limit",
            SendErrorKind::Rejected => "rejected",
            SendErrorKind::Server => "server",
        }
    }
}
