//! Remote client facade for the platform APIs.
//!
//! Actors and the push pipeline talk to the platform only through the
//! traits in this module:
//! - [`CloudControllerClient`] for applications, processes, packages,
//!   builds, droplets, routes and domains
//! - [`RouterClient`] for the routing API
//!
//! Every Cloud Controller operation returns its warnings together with the
//! result, including on failure. HTTP implementations live in [`ccv3`] and
//! [`router`]; tests substitute their own implementations of the same traits.

pub mod ccv3;
pub mod router;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;
use crate::types::HealthCheckType;
use crate::warnings::Warned;

pub use ccv3::HttpCloudControllerClient;
pub use router::HttpRouterClient;

/// Result of a Cloud Controller call.
pub type CcReply<T> = Warned<T, ClientError>;

/// Transport settings shared by the HTTP clients.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub request_timeout: Duration,
    pub skip_ssl_validation: bool,
    pub user_agent: String,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            skip_ssl_validation: false,
            user_agent: format!("skyhook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConnectionOptions {
    pub(crate) fn build_http_client(&self) -> anyhow::Result<reqwest::Client> {
        use anyhow::Context;

        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(self.skip_ssl_validation)
            .build()
            .context("Failed to build HTTP client")
    }
}

/// Resolve an API path below `base`, keeping any path prefix `base` carries.
pub(crate) fn api_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }
    base.join(path.trim_start_matches('/'))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Application {
    pub guid: String,
    pub name: String,
    pub state: String,
    pub space_guid: String,
    pub stack: Option<String>,
    pub buildpacks: Vec<String>,
}

/// Desired identity and lifecycle of an application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplicationSpec {
    pub name: String,
    pub space_guid: String,
    pub stack: Option<String>,
    pub buildpacks: Vec<String>,
}

impl ApplicationSpec {
    pub fn new(name: impl Into<String>, space_guid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            space_guid: space_guid.into(),
            stack: None,
            buildpacks: Vec::new(),
        }
    }

    /// Whether an existing application should be patched to match this spec.
    pub fn requests_update(&self) -> bool {
        self.stack.is_some() || !self.buildpacks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Process {
    pub guid: String,
    pub process_type: String,
    pub health_check_type: HealthCheckType,
    pub health_check_endpoint: String,
    pub health_check_invocation_timeout: u64,
    pub instances: u32,
    pub memory_in_mb: u64,
    pub disk_in_mb: u64,
}

/// Requested change to a process' instance count or resources.
///
/// `None` fields are left as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessScale {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_in_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_in_mb: Option<u64>,
}

impl ProcessScale {
    pub fn is_empty(&self) -> bool {
        self.instances.is_none() && self.memory_in_mb.is_none() && self.disk_in_mb.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Package {
    pub guid: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    Staging,
    Staged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub guid: String,
    pub state: BuildState,
    pub error: Option<String>,
    pub droplet_guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Droplet {
    pub guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Domain {
    pub guid: String,
    pub name: String,
    pub internal: bool,
    pub router_group_guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    pub guid: String,
    pub host: String,
    pub path: String,
    pub domain_guid: String,
    pub space_guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceInstance {
    pub guid: String,
    pub name: String,
}

/// A group of routers sharing a port range, as reported by the routing API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouterGroup {
    pub guid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    #[serde(default)]
    pub reservable_ports: String,
}

/// One file of an application's source, identified by content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Path relative to the application root, `/` separated.
    pub path: String,
    /// Lowercase hex SHA-1 of the file contents.
    pub checksum: String,
    pub size_in_bytes: u64,
    /// Unix permission bits.
    pub mode: u32,
}

/// Cloud Controller v3 capability set consumed by actors and the push
/// pipeline.
#[async_trait]
pub trait CloudControllerClient: Send + Sync + Debug {
    async fn get_applications(&self, names: &[String], space_guid: &str)
    -> CcReply<Vec<Application>>;

    async fn create_application(&self, spec: &ApplicationSpec) -> CcReply<Application>;

    async fn update_application(&self, app_guid: &str, spec: &ApplicationSpec)
    -> CcReply<Application>;

    async fn get_application_processes(&self, app_guid: &str) -> CcReply<Vec<Process>>;

    async fn get_application_process_by_type(
        &self,
        app_guid: &str,
        process_type: &str,
    ) -> CcReply<Process>;

    /// Replace the health check of a process. An empty endpoint and a zero
    /// timeout are sent as "unset".
    async fn patch_application_process_health_check(
        &self,
        process_guid: &str,
        health_check_type: HealthCheckType,
        endpoint: &str,
        invocation_timeout: u64,
    ) -> CcReply<Process>;

    async fn scale_application_process(
        &self,
        app_guid: &str,
        process_type: &str,
        scale: &ProcessScale,
    ) -> CcReply<Process>;

    async fn get_service_instances(
        &self,
        space_guid: &str,
        names: &[String],
    ) -> CcReply<Vec<ServiceInstance>>;

    async fn create_service_binding(&self, app_guid: &str, service_instance_guid: &str)
    -> CcReply<()>;

    /// Return the subset of `resources` the platform already stores.
    async fn resource_match(&self, resources: &[Resource]) -> CcReply<Vec<Resource>>;

    async fn create_package(&self, app_guid: &str) -> CcReply<Package>;

    /// Upload a zip of unmatched files; `matched` lists files the platform
    /// should take from its own cache.
    async fn upload_bits_package(
        &self,
        package_guid: &str,
        matched: &[Resource],
        archive: Vec<u8>,
    ) -> CcReply<Package>;

    async fn create_build(&self, package_guid: &str) -> CcReply<Build>;

    async fn get_build(&self, build_guid: &str) -> CcReply<Build>;

    async fn create_droplet(&self, app_guid: &str) -> CcReply<Droplet>;

    async fn upload_droplet_bits(&self, droplet_guid: &str, droplet: Vec<u8>) -> CcReply<Droplet>;

    async fn set_application_droplet(&self, app_guid: &str, droplet_guid: &str) -> CcReply<()>;

    async fn get_domains(&self, names: &[String]) -> CcReply<Vec<Domain>>;

    async fn get_routes(&self, domain_guid: &str, host: &str, path: &str) -> CcReply<Vec<Route>>;

    async fn create_route(
        &self,
        space_guid: &str,
        domain_guid: &str,
        host: &str,
        path: &str,
    ) -> CcReply<Route>;

    async fn map_route(&self, route_guid: &str, app_guid: &str) -> CcReply<()>;

    async fn get_application_routes(&self, app_guid: &str) -> CcReply<Vec<Route>>;

    async fn unmap_route(&self, route_guid: &str, app_guid: &str) -> CcReply<()>;

    async fn create_shared_domain(
        &self,
        name: &str,
        internal: bool,
        router_group_guid: Option<&str>,
    ) -> CcReply<Domain>;
}

/// Routing API capability set. The routing API does not emit warnings.
#[async_trait]
pub trait RouterClient: Send + Sync + Debug {
    async fn get_router_groups(&self) -> Result<Vec<RouterGroup>, ClientError>;
}
