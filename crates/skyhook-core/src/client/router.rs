//! Routing API client over HTTP.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use url::Url;

use super::{ConnectionOptions, RouterClient, RouterGroup};
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct HttpRouterClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpRouterClient {
    pub fn new(
        base_url: Url,
        access_token: Option<String>,
        options: &ConnectionOptions,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: options.build_http_client()?,
            base_url,
            access_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RouterErrorBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl RouterClient for HttpRouterClient {
    async fn get_router_groups(&self) -> Result<Vec<RouterGroup>, ClientError> {
        let url = super::api_url(&self.base_url, "/routing/v1/router_groups")
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let mut request = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let parsed: RouterErrorBody =
                serde_json::from_slice(&body).unwrap_or(RouterErrorBody {
                    name: "UnknownError".to_string(),
                    message: String::from_utf8_lossy(&body).into_owned(),
                });
            return Err(ClientError::Router {
                status: status.as_u16(),
                name: parsed.name,
                message: parsed.message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
