//! Error taxonomy for platform calls and the actions built on them.

use serde::Deserialize;
use thiserror::Error;

/// A single error entry from a Cloud Controller error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// Transport-level failures returned by a platform client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Could not reach the platform or the connection dropped mid-request.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Cloud Controller answered with an error status.
    #[error("{}", describe_api_errors(.status, .errors))]
    Api {
        status: u16,
        errors: Vec<ApiErrorDetail>,
    },

    /// Routing API answered with an error status.
    #[error("{name}: {message}")]
    Router {
        status: u16,
        name: String,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to build request: {0}")]
    Request(String),
}

impl ClientError {
    /// Whether repeating the same request has a reasonable chance to succeed.
    ///
    /// Dropped connections, timeouts and server-side (5xx) errors qualify;
    /// client-side (4xx) and decoding failures do not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } | Self::Router { status, .. } => *status >= 500,
            Self::Decode(_) | Self::Request(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Router { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn describe_api_errors(status: &u16, errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return format!("Unexpected response status {}", status);
    }
    errors
        .iter()
        .map(|e| {
            if e.detail.is_empty() {
                e.title.clone()
            } else {
                e.detail.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Api {
                status: status.as_u16(),
                errors: Vec::new(),
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Failures surfaced by actor and push operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("App '{name}' not found")]
    ApplicationNotFound { name: String },

    #[error("Health check type must be 'http' to set a health check HTTP endpoint")]
    HttpHealthCheckInvalid,

    #[error("Router group '{name}' not found")]
    RouterGroupNotFound { name: String },

    #[error("Service instance '{name}' not found")]
    ServiceInstanceNotFound { name: String },

    #[error("Domain '{name}' not found")]
    DomainNotFound { name: String },

    /// The build reached the `FAILED` state.
    #[error("Staging failed: {reason}")]
    StagingFailed { reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// Local archive or digest work failed before anything was sent.
    #[error("{0}")]
    Resource(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ActionError {
    pub fn resource(err: impl std::fmt::Display) -> Self {
        Self::Resource(err.to_string())
    }
}
