//! Shared core types used across the client, actor and push layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Process type that receives routed traffic.
pub const PROCESS_TYPE_WEB: &str = "web";

/// Endpoint the platform checks when an http health check names none.
pub const DEFAULT_HEALTH_CHECK_ENDPOINT: &str = "/";

/// How the platform decides whether a process instance is healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckType {
    /// A TCP connection to the bound port succeeds.
    #[default]
    Port,
    /// The process is still running.
    Process,
    /// An HTTP GET against the configured endpoint returns 200.
    Http,
}

impl HealthCheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Port => "port",
            Self::Process => "process",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for HealthCheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthCheckType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "port" => Ok(Self::Port),
            "process" => Ok(Self::Process),
            "http" => Ok(Self::Http),
            other => anyhow::bail!(
                "Invalid health check type '{}'. Use 'port', 'process' or 'http'",
                other
            ),
        }
    }
}
