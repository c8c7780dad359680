//! Cloud Controller v3 client over HTTP.
//!
//! Maps the v3 JSON resources onto the facade records and collects the
//! `X-Cf-Warnings` header of every response, successful or not.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::{
    Application, ApplicationSpec, Build, BuildState, CcReply, CloudControllerClient,
    ConnectionOptions, Domain, Droplet, Package, Process, ProcessScale, Resource, Route,
    ServiceInstance,
};
use crate::error::{ApiErrorDetail, ClientError};
use crate::types::HealthCheckType;
use crate::warnings::{Warned, Warnings};

/// Response header carrying comma separated, query-escaped warnings.
pub const WARNINGS_HEADER: &str = "x-cf-warnings";

#[derive(Debug, Clone)]
pub struct HttpCloudControllerClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpCloudControllerClient {
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

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        super::api_url(&self.base_url, path)
            .map_err(|e| ClientError::Request(format!("invalid path {}: {}", path, e)))
    }

    fn url_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ClientError> {
        let mut url = self.url(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json");
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_raw(&self, builder: RequestBuilder) -> CcReply<Vec<u8>> {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return Warned::err(err.into(), Warnings::new()),
        };

        let warnings = parse_warnings(response.headers());
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(err) => return Warned::err(err.into(), warnings),
        };

        if !status.is_success() {
            return Warned::err(api_error(status, &body), warnings);
        }
        Warned::ok(body, warnings)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> CcReply<T> {
        let (result, warnings) = self.send_raw(builder).await.into_parts();
        let result = result.and_then(|body| {
            serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
        });
        Warned::new(result, warnings)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> CcReply<()> {
        self.send_raw(builder).await.map(|_| ())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> CcReply<T> {
        match self.url(path) {
            Ok(url) => self.send(self.request(Method::GET, url)).await,
            Err(err) => Warned::err(err, Warnings::new()),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: serde_json::Value,
    ) -> CcReply<T> {
        match self.url(path) {
            Ok(url) => self.send(self.request(method, url).json(&body)).await,
            Err(err) => Warned::err(err, Warnings::new()),
        }
    }

    async fn list<T: DeserializeOwned>(&self, url: Result<Url, ClientError>) -> CcReply<Vec<T>> {
        let mut warnings = Warnings::new();
        let result = match url {
            Ok(url) => self.collect_pages(url, &mut warnings).await,
            Err(err) => Err(err),
        };
        Warned::new(result, warnings)
    }

    async fn collect_pages<T: DeserializeOwned>(
        &self,
        first: Url,
        warnings: &mut Warnings,
    ) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: Page<T> = warnings.absorb(self.send(self.request(Method::GET, url)).await)?;
            items.extend(page.resources);
            if let Some(href) = page.pagination.and_then(|p| p.next).map(|link| link.href) {
                next = Some(
                    Url::parse(&href)
                        .map_err(|e| ClientError::Decode(format!("bad next link {}: {}", href, e)))?,
                );
            }
        }
        Ok(items)
    }

    async fn unmap_route_destinations(
        &self,
        route_guid: &str,
        app_guid: &str,
        warnings: &mut Warnings,
    ) -> Result<(), ClientError> {
        let destinations: DestinationsWire = warnings.absorb(
            self.get(&format!("/v3/routes/{}/destinations", route_guid))
                .await,
        )?;
        for destination in destinations
            .destinations
            .into_iter()
            .filter(|d| d.app.guid == app_guid)
        {
            let url = self.url(&format!(
                "/v3/routes/{}/destinations/{}",
                route_guid, destination.guid
            ))?;
            warnings.absorb(self.send_empty(self.request(Method::DELETE, url)).await)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CloudControllerClient for HttpCloudControllerClient {
    async fn get_applications(
        &self,
        names: &[String],
        space_guid: &str,
    ) -> CcReply<Vec<Application>> {
        let url = self.url_with_query(
            "/v3/apps",
            &[
                ("names", names.join(",")),
                ("space_guids", space_guid.to_string()),
            ],
        );
        self.list::<AppWire>(url)
            .await
            .map(|apps| apps.into_iter().map(Application::from).collect())
    }

    async fn create_application(&self, spec: &ApplicationSpec) -> CcReply<Application> {
        let mut body = json!({
            "name": spec.name,
            "relationships": { "space": { "data": { "guid": spec.space_guid } } },
        });
        if spec.requests_update() {
            body["lifecycle"] = lifecycle_body(spec);
        }
        self.send_json::<AppWire>(Method::POST, "/v3/apps", body)
            .await
            .map(Application::from)
    }

    async fn update_application(
        &self,
        app_guid: &str,
        spec: &ApplicationSpec,
    ) -> CcReply<Application> {
        let body = json!({ "lifecycle": lifecycle_body(spec) });
        self.send_json::<AppWire>(Method::PATCH, &format!("/v3/apps/{}", app_guid), body)
            .await
            .map(Application::from)
    }

    async fn get_application_processes(&self, app_guid: &str) -> CcReply<Vec<Process>> {
        let url = self.url(&format!("/v3/apps/{}/processes", app_guid));
        self.list::<ProcessWire>(url)
            .await
            .map(|processes| processes.into_iter().map(Process::from).collect())
    }

    async fn get_application_process_by_type(
        &self,
        app_guid: &str,
        process_type: &str,
    ) -> CcReply<Process> {
        self.get::<ProcessWire>(&format!("/v3/apps/{}/processes/{}", app_guid, process_type))
            .await
            .map(Process::from)
    }

    async fn patch_application_process_health_check(
        &self,
        process_guid: &str,
        health_check_type: HealthCheckType,
        endpoint: &str,
        invocation_timeout: u64,
    ) -> CcReply<Process> {
        let endpoint = (!endpoint.is_empty()).then_some(endpoint);
        let invocation_timeout = (invocation_timeout != 0).then_some(invocation_timeout);
        let body = json!({
            "health_check": {
                "type": health_check_type,
                "data": {
                    "endpoint": endpoint,
                    "invocation_timeout": invocation_timeout,
                },
            },
        });
        self.send_json::<ProcessWire>(Method::PATCH, &format!("/v3/processes/{}", process_guid), body)
            .await
            .map(Process::from)
    }

    async fn scale_application_process(
        &self,
        app_guid: &str,
        process_type: &str,
        scale: &ProcessScale,
    ) -> CcReply<Process> {
        let body = match serde_json::to_value(scale) {
            Ok(body) => body,
            Err(err) => return Warned::err(ClientError::Request(err.to_string()), Warnings::new()),
        };
        self.send_json::<ProcessWire>(
            Method::POST,
            &format!("/v3/apps/{}/processes/{}/actions/scale", app_guid, process_type),
            body,
        )
        .await
        .map(Process::from)
    }

    async fn get_service_instances(
        &self,
        space_guid: &str,
        names: &[String],
    ) -> CcReply<Vec<ServiceInstance>> {
        let url = self.url_with_query(
            "/v3/service_instances",
            &[
                ("names", names.join(",")),
                ("space_guids", space_guid.to_string()),
            ],
        );
        self.list::<ServiceInstanceWire>(url).await.map(|instances| {
            instances
                .into_iter()
                .map(|i| ServiceInstance {
                    guid: i.guid,
                    name: i.name,
                })
                .collect()
        })
    }

    async fn create_service_binding(
        &self,
        app_guid: &str,
        service_instance_guid: &str,
    ) -> CcReply<()> {
        let body = json!({
            "type": "app",
            "relationships": {
                "service_instance": { "data": { "guid": service_instance_guid } },
                "app": { "data": { "guid": app_guid } },
            },
        });
        match self.url("/v3/service_credential_bindings") {
            Ok(url) => {
                self.send_empty(self.request(Method::POST, url).json(&body))
                    .await
            }
            Err(err) => Warned::err(err, Warnings::new()),
        }
    }

    async fn resource_match(&self, resources: &[Resource]) -> CcReply<Vec<Resource>> {
        let body = json!({
            "resources": resources.iter().map(ResourceWire::from).collect::<Vec<_>>(),
        });
        self.send_json::<ResourceMatchWire>(Method::POST, "/v3/resource_matches", body)
            .await
            .map(|matched| {
                matched
                    .resources
                    .into_iter()
                    .map(Resource::from)
                    .collect()
            })
    }

    async fn create_package(&self, app_guid: &str) -> CcReply<Package> {
        let body = json!({
            "type": "bits",
            "relationships": { "app": { "data": { "guid": app_guid } } },
        });
        self.send_json::<PackageWire>(Method::POST, "/v3/packages", body)
            .await
            .map(Package::from)
    }

    async fn upload_bits_package(
        &self,
        package_guid: &str,
        matched: &[Resource],
        archive: Vec<u8>,
    ) -> CcReply<Package> {
        let url = match self.url(&format!("/v3/packages/{}/upload", package_guid)) {
            Ok(url) => url,
            Err(err) => return Warned::err(err, Warnings::new()),
        };
        let resources: Vec<ResourceWire> = matched.iter().map(ResourceWire::from).collect();
        let resources = match serde_json::to_string(&resources) {
            Ok(resources) => resources,
            Err(err) => return Warned::err(ClientError::Request(err.to_string()), Warnings::new()),
        };
        let bits = match Part::bytes(archive)
            .file_name("application.zip")
            .mime_str("application/zip")
        {
            Ok(part) => part,
            Err(err) => return Warned::err(ClientError::Request(err.to_string()), Warnings::new()),
        };
        let form = Form::new().text("resources", resources).part("bits", bits);

        self.send::<PackageWire>(self.request(Method::POST, url).multipart(form))
            .await
            .map(Package::from)
    }

    async fn create_build(&self, package_guid: &str) -> CcReply<Build> {
        let body = json!({ "package": { "guid": package_guid } });
        self.send_json::<BuildWire>(Method::POST, "/v3/builds", body)
            .await
            .map(Build::from)
    }

    async fn get_build(&self, build_guid: &str) -> CcReply<Build> {
        self.get::<BuildWire>(&format!("/v3/builds/{}", build_guid))
            .await
            .map(Build::from)
    }

    async fn create_droplet(&self, app_guid: &str) -> CcReply<Droplet> {
        let body = json!({
            "relationships": { "app": { "data": { "guid": app_guid } } },
        });
        self.send_json::<GuidRef>(Method::POST, "/v3/droplets", body)
            .await
            .map(|d| Droplet { guid: d.guid })
    }

    async fn upload_droplet_bits(&self, droplet_guid: &str, droplet: Vec<u8>) -> CcReply<Droplet> {
        let url = match self.url(&format!("/v3/droplets/{}/upload", droplet_guid)) {
            Ok(url) => url,
            Err(err) => return Warned::err(err, Warnings::new()),
        };
        let bits = match Part::bytes(droplet)
            .file_name("droplet.tgz")
            .mime_str("application/octet-stream")
        {
            Ok(part) => part,
            Err(err) => return Warned::err(ClientError::Request(err.to_string()), Warnings::new()),
        };
        let form = Form::new().part("bits", bits);
        self.send_empty(self.request(Method::POST, url).multipart(form))
            .await
            .map(|_| Droplet {
                guid: droplet_guid.to_string(),
            })
    }

    async fn set_application_droplet(&self, app_guid: &str, droplet_guid: &str) -> CcReply<()> {
        let body = json!({ "data": { "guid": droplet_guid } });
        match self.url(&format!("/v3/apps/{}/relationships/current_droplet", app_guid)) {
            Ok(url) => {
                self.send_empty(self.request(Method::PATCH, url).json(&body))
                    .await
            }
            Err(err) => Warned::err(err, Warnings::new()),
        }
    }

    async fn get_domains(&self, names: &[String]) -> CcReply<Vec<Domain>> {
        let url = self.url_with_query("/v3/domains", &[("names", names.join(","))]);
        self.list::<DomainWire>(url)
            .await
            .map(|domains| domains.into_iter().map(Domain::from).collect())
    }

    async fn get_routes(&self, domain_guid: &str, host: &str, path: &str) -> CcReply<Vec<Route>> {
        let url = self.url_with_query(
            "/v3/routes",
            &[
                ("domain_guids", domain_guid.to_string()),
                ("hosts", host.to_string()),
                ("paths", path.to_string()),
            ],
        );
        self.list::<RouteWire>(url)
            .await
            .map(|routes| routes.into_iter().map(Route::from).collect())
    }

    async fn create_route(
        &self,
        space_guid: &str,
        domain_guid: &str,
        host: &str,
        path: &str,
    ) -> CcReply<Route> {
        let body = json!({
            "host": host,
            "path": path,
            "relationships": {
                "space": { "data": { "guid": space_guid } },
                "domain": { "data": { "guid": domain_guid } },
            },
        });
        self.send_json::<RouteWire>(Method::POST, "/v3/routes", body)
            .await
            .map(Route::from)
    }

    async fn map_route(&self, route_guid: &str, app_guid: &str) -> CcReply<()> {
        let body = json!({ "destinations": [ { "app": { "guid": app_guid } } ] });
        match self.url(&format!("/v3/routes/{}/destinations", route_guid)) {
            Ok(url) => {
                self.send_empty(self.request(Method::POST, url).json(&body))
                    .await
            }
            Err(err) => Warned::err(err, Warnings::new()),
        }
    }

    async fn get_application_routes(&self, app_guid: &str) -> CcReply<Vec<Route>> {
        let url = self.url(&format!("/v3/apps/{}/routes", app_guid));
        self.list::<RouteWire>(url)
            .await
            .map(|routes| routes.into_iter().map(Route::from).collect())
    }

    async fn unmap_route(&self, route_guid: &str, app_guid: &str) -> CcReply<()> {
        let mut warnings = Warnings::new();
        let result = self
            .unmap_route_destinations(route_guid, app_guid, &mut warnings)
            .await;
        Warned::new(result, warnings)
    }

    async fn create_shared_domain(
        &self,
        name: &str,
        internal: bool,
        router_group_guid: Option<&str>,
    ) -> CcReply<Domain> {
        let mut body = json!({ "name": name, "internal": internal });
        if let Some(guid) = router_group_guid {
            body["router_group"] = json!({ "guid": guid });
        }
        self.send_json::<DomainWire>(Method::POST, "/v3/domains", body)
            .await
            .map(Domain::from)
    }
}

/// Split the warnings header into individual, unescaped messages.
pub fn parse_warnings(headers: &HeaderMap) -> Warnings {
    let Some(value) = headers
        .get(WARNINGS_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Warnings::new();
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            url::form_urlencoded::parse(part.as_bytes())
                .next()
                .map(|(message, _)| message.into_owned())
        })
        .collect()
}

fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    let errors = serde_json::from_slice::<ErrorsWire>(body)
        .map(|wire| wire.errors)
        .unwrap_or_default();
    ClientError::Api {
        status: status.as_u16(),
        errors,
    }
}

fn lifecycle_body(spec: &ApplicationSpec) -> serde_json::Value {
    json!({
        "type": "buildpack",
        "data": LifecycleData {
            buildpacks: spec.buildpacks.clone(),
            stack: spec.stack.clone(),
        },
    })
}

#[derive(Debug, Deserialize)]
struct ErrorsWire {
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    resources: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct GuidRef {
    #[serde(default)]
    guid: String,
}

#[derive(Debug, Default, Deserialize)]
struct Relationship {
    data: Option<GuidRef>,
}

impl Relationship {
    fn into_guid(self) -> String {
        self.data.map(|d| d.guid).unwrap_or_default()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LifecycleData {
    #[serde(default)]
    buildpacks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LifecycleWire {
    #[serde(default)]
    data: LifecycleData,
}

#[derive(Debug, Default, Deserialize)]
struct AppRelationships {
    #[serde(default)]
    space: Relationship,
}

#[derive(Debug, Deserialize)]
struct AppWire {
    guid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    lifecycle: Option<LifecycleWire>,
    #[serde(default)]
    relationships: AppRelationships,
}

impl From<AppWire> for Application {
    fn from(wire: AppWire) -> Self {
        let lifecycle = wire.lifecycle.map(|l| l.data).unwrap_or_default();
        Self {
            guid: wire.guid,
            name: wire.name,
            state: wire.state,
            space_guid: wire.relationships.space.into_guid(),
            stack: lifecycle.stack.filter(|s| !s.is_empty()),
            buildpacks: lifecycle.buildpacks,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HealthCheckData {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    invocation_timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HealthCheckWire {
    #[serde(rename = "type")]
    kind: HealthCheckType,
    #[serde(default)]
    data: HealthCheckData,
}

#[derive(Debug, Deserialize)]
struct ProcessWire {
    guid: String,
    #[serde(rename = "type")]
    process_type: String,
    #[serde(default)]
    instances: u32,
    #[serde(default)]
    memory_in_mb: u64,
    #[serde(default)]
    disk_in_mb: u64,
    health_check: HealthCheckWire,
}

impl From<ProcessWire> for Process {
    fn from(wire: ProcessWire) -> Self {
        Self {
            guid: wire.guid,
            process_type: wire.process_type,
            health_check_type: wire.health_check.kind,
            health_check_endpoint: wire.health_check.data.endpoint.unwrap_or_default(),
            health_check_invocation_timeout: wire
                .health_check
                .data
                .invocation_timeout
                .unwrap_or_default(),
            instances: wire.instances,
            memory_in_mb: wire.memory_in_mb,
            disk_in_mb: wire.disk_in_mb,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceInstanceWire {
    guid: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChecksumWire {
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceWire {
    checksum: ChecksumWire,
    size_in_bytes: u64,
    path: String,
    #[serde(default)]
    mode: String,
}

impl From<&Resource> for ResourceWire {
    fn from(resource: &Resource) -> Self {
        Self {
            checksum: ChecksumWire {
                value: resource.checksum.clone(),
            },
            size_in_bytes: resource.size_in_bytes,
            path: resource.path.clone(),
            mode: format!("{:o}", resource.mode),
        }
    }
}

impl From<ResourceWire> for Resource {
    fn from(wire: ResourceWire) -> Self {
        Self {
            path: wire.path,
            checksum: wire.checksum.value,
            size_in_bytes: wire.size_in_bytes,
            mode: u32::from_str_radix(&wire.mode, 8).unwrap_or(0o644),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResourceMatchWire {
    #[serde(default)]
    resources: Vec<ResourceWire>,
}

#[derive(Debug, Deserialize)]
struct PackageWire {
    guid: String,
    #[serde(default)]
    state: String,
}

impl From<PackageWire> for Package {
    fn from(wire: PackageWire) -> Self {
        Self {
            guid: wire.guid,
            state: wire.state,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BuildWire {
    guid: String,
    state: BuildState,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    droplet: Option<GuidRef>,
}

impl From<BuildWire> for Build {
    fn from(wire: BuildWire) -> Self {
        Self {
            guid: wire.guid,
            state: wire.state,
            error: wire.error,
            droplet_guid: wire.droplet.map(|d| d.guid),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DomainWire {
    guid: String,
    name: String,
    #[serde(default)]
    internal: bool,
    #[serde(default)]
    router_group: Option<GuidRef>,
}

impl From<DomainWire> for Domain {
    fn from(wire: DomainWire) -> Self {
        Self {
            guid: wire.guid,
            name: wire.name,
            internal: wire.internal,
            router_group_guid: wire.router_group.map(|g| g.guid),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RouteRelationships {
    #[serde(default)]
    domain: Relationship,
    #[serde(default)]
    space: Relationship,
}

#[derive(Debug, Deserialize)]
struct RouteWire {
    guid: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    relationships: RouteRelationships,
}

impl From<RouteWire> for Route {
    fn from(wire: RouteWire) -> Self {
        Self {
            guid: wire.guid,
            host: wire.host,
            path: wire.path,
            domain_guid: wire.relationships.domain.into_guid(),
            space_guid: wire.relationships.space.into_guid(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DestinationWire {
    guid: String,
    app: GuidRef,
}

#[derive(Debug, Deserialize)]
struct DestinationsWire {
    #[serde(default)]
    destinations: Vec<DestinationWire>,
}
