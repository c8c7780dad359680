//! Configuration schema for skyhook.toml

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::ConnectionOptions;

/// Root configuration structure for skyhook.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyhookConfig {
    /// Cloud Controller base URL, e.g. `https://api.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<Url>,

    /// Routing API base URL; the Cloud Controller URL is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_endpoint: Option<Url>,

    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Space targeted when a command names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_guid: Option<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub skip_ssl_validation: bool,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for SkyhookConfig {
    fn default() -> Self {
        Self {
            api_endpoint: None,
            router_endpoint: None,
            access_token: None,
            space_guid: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            skip_ssl_validation: false,
        }
    }
}

impl SkyhookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, endpoint) in [
            ("api_endpoint", &self.api_endpoint),
            ("router_endpoint", &self.router_endpoint),
        ] {
            if let Some(url) = endpoint
                && !matches!(url.scheme(), "http" | "https")
            {
                anyhow::bail!(
                    "Invalid {} '{}': only http and https are supported",
                    field,
                    url
                );
            }
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn require_api_endpoint(&self) -> anyhow::Result<&Url> {
        self.api_endpoint.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No API endpoint configured. Set api_endpoint in skyhook.toml")
        })
    }

    pub fn router_endpoint_or_api(&self) -> anyhow::Result<&Url> {
        match &self.router_endpoint {
            Some(url) => Ok(url),
            None => self.require_api_endpoint(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            skip_ssl_validation: self.skip_ssl_validation,
            ..ConnectionOptions::default()
        }
    }
}
