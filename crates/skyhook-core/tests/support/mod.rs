//! Recording test doubles for the platform clients.
//!
//! Every call is recorded in order. Replies come from per-operation queues;
//! an empty queue falls back to a plausible successful reply.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use skyhook_core::client::{
    Application, ApplicationSpec, Build, BuildState, CcReply, CloudControllerClient, Domain,
    Droplet, Package, Process, ProcessScale, Resource, Route, RouterClient, RouterGroup,
    ServiceInstance,
};
use skyhook_core::error::ClientError;
use skyhook_core::types::HealthCheckType;
use skyhook_core::warnings::{Warned, Warnings};

/// One recorded facade call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetApplications {
        names: Vec<String>,
        space_guid: String,
    },
    CreateApplication(String),
    UpdateApplication(String),
    GetApplicationProcesses(String),
    GetApplicationProcessByType {
        app_guid: String,
        process_type: String,
    },
    PatchHealthCheck {
        process_guid: String,
        health_check_type: HealthCheckType,
        endpoint: String,
        invocation_timeout: u64,
    },
    ScaleProcess {
        app_guid: String,
        process_type: String,
        scale: ProcessScale,
    },
    GetServiceInstances {
        space_guid: String,
        names: Vec<String>,
    },
    CreateServiceBinding {
        app_guid: String,
        service_instance_guid: String,
    },
    ResourceMatch(Vec<String>),
    CreatePackage(String),
    UploadBitsPackage {
        package_guid: String,
        matched: Vec<String>,
    },
    CreateBuild(String),
    GetBuild(String),
    CreateDroplet(String),
    UploadDropletBits {
        droplet_guid: String,
        size: usize,
    },
    SetApplicationDroplet {
        app_guid: String,
        droplet_guid: String,
    },
    GetDomains(Vec<String>),
    GetRoutes {
        domain_guid: String,
        host: String,
        path: String,
    },
    CreateRoute {
        domain_guid: String,
        host: String,
        path: String,
    },
    MapRoute {
        route_guid: String,
        app_guid: String,
    },
    GetApplicationRoutes(String),
    UnmapRoute {
        route_guid: String,
        app_guid: String,
    },
    CreateSharedDomain {
        name: String,
        internal: bool,
        router_group_guid: Option<String>,
    },
}

/// Scripted replies for one operation.
#[derive(Debug)]
pub struct Queue<T>(Mutex<VecDeque<(Result<T, ClientError>, Vec<String>)>>);

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T> Queue<T> {
    pub fn push_ok(&self, value: T, warnings: &[&str]) {
        self.push(Ok(value), warnings);
    }

    pub fn push_err(&self, error: ClientError, warnings: &[&str]) {
        self.push(Err(error), warnings);
    }

    fn push(&self, result: Result<T, ClientError>, warnings: &[&str]) {
        let warnings = warnings.iter().map(|w| w.to_string()).collect();
        self.0.lock().unwrap().push_back((result, warnings));
    }

    fn next_or(&self, fallback: impl FnOnce() -> T) -> CcReply<T> {
        match self.0.lock().unwrap().pop_front() {
            Some((result, warnings)) => Warned::new(result, Warnings::from(warnings)),
            None => Warned::ok(fallback(), Warnings::new()),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeCloudController {
    calls: Mutex<Vec<Call>>,
    pub get_applications: Queue<Vec<Application>>,
    pub create_application: Queue<Application>,
    pub update_application: Queue<Application>,
    pub get_application_processes: Queue<Vec<Process>>,
    pub get_application_process_by_type: Queue<Process>,
    pub patch_health_check: Queue<Process>,
    pub scale_process: Queue<Process>,
    pub get_service_instances: Queue<Vec<ServiceInstance>>,
    pub create_service_binding: Queue<()>,
    pub resource_match: Queue<Vec<Resource>>,
    pub create_package: Queue<Package>,
    pub upload_bits_package: Queue<Package>,
    pub create_build: Queue<Build>,
    pub get_build: Queue<Build>,
    pub create_droplet: Queue<Droplet>,
    pub upload_droplet_bits: Queue<Droplet>,
    pub set_application_droplet: Queue<()>,
    pub get_domains: Queue<Vec<Domain>>,
    pub get_routes: Queue<Vec<Route>>,
    pub create_route: Queue<Route>,
    pub map_route: Queue<()>,
    pub get_application_routes: Queue<Vec<Route>>,
    pub unmap_route: Queue<()>,
    pub create_shared_domain: Queue<Domain>,
}

impl FakeCloudController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn application(name: &str, guid: &str) -> Application {
    Application {
        guid: guid.to_string(),
        name: name.to_string(),
        state: "STOPPED".to_string(),
        space_guid: "space-guid".to_string(),
        ..Application::default()
    }
}

pub fn build(guid: &str, state: BuildState) -> Build {
    Build {
        guid: guid.to_string(),
        state,
        error: None,
        droplet_guid: (state == BuildState::Staged).then(|| "droplet-guid".to_string()),
    }
}

pub fn route(guid: &str, host: &str, domain_guid: &str) -> Route {
    Route {
        guid: guid.to_string(),
        host: host.to_string(),
        path: String::new(),
        domain_guid: domain_guid.to_string(),
        space_guid: "space-guid".to_string(),
    }
}

fn names(resources: &[Resource]) -> Vec<String> {
    resources.iter().map(|r| r.path.clone()).collect()
}

#[async_trait]
impl CloudControllerClient for FakeCloudController {
    async fn get_applications(
        &self,
        names: &[String],
        space_guid: &str,
    ) -> CcReply<Vec<Application>> {
        self.record(Call::GetApplications {
            names: names.to_vec(),
            space_guid: space_guid.to_string(),
        });
        self.get_applications.next_or(Vec::new)
    }

    async fn create_application(&self, spec: &ApplicationSpec) -> CcReply<Application> {
        self.record(Call::CreateApplication(spec.name.clone()));
        self.create_application
            .next_or(|| application(&spec.name, "app-guid"))
    }

    async fn update_application(
        &self,
        app_guid: &str,
        spec: &ApplicationSpec,
    ) -> CcReply<Application> {
        self.record(Call::UpdateApplication(app_guid.to_string()));
        self.update_application
            .next_or(|| application(&spec.name, app_guid))
    }

    async fn get_application_processes(&self, app_guid: &str) -> CcReply<Vec<Process>> {
        self.record(Call::GetApplicationProcesses(app_guid.to_string()));
        self.get_application_processes.next_or(Vec::new)
    }

    async fn get_application_process_by_type(
        &self,
        app_guid: &str,
        process_type: &str,
    ) -> CcReply<Process> {
        self.record(Call::GetApplicationProcessByType {
            app_guid: app_guid.to_string(),
            process_type: process_type.to_string(),
        });
        self.get_application_process_by_type.next_or(|| Process {
            guid: format!("{}-process-guid", process_type),
            process_type: process_type.to_string(),
            ..Process::default()
        })
    }

    async fn patch_application_process_health_check(
        &self,
        process_guid: &str,
        health_check_type: HealthCheckType,
        endpoint: &str,
        invocation_timeout: u64,
    ) -> CcReply<Process> {
        self.record(Call::PatchHealthCheck {
            process_guid: process_guid.to_string(),
            health_check_type,
            endpoint: endpoint.to_string(),
            invocation_timeout,
        });
        self.patch_health_check.next_or(|| Process {
            guid: process_guid.to_string(),
            health_check_type,
            health_check_endpoint: endpoint.to_string(),
            health_check_invocation_timeout: invocation_timeout,
            ..Process::default()
        })
    }

    async fn scale_application_process(
        &self,
        app_guid: &str,
        process_type: &str,
        scale: &ProcessScale,
    ) -> CcReply<Process> {
        self.record(Call::ScaleProcess {
            app_guid: app_guid.to_string(),
            process_type: process_type.to_string(),
            scale: *scale,
        });
        self.scale_process.next_or(Process::default)
    }

    async fn get_service_instances(
        &self,
        space_guid: &str,
        names: &[String],
    ) -> CcReply<Vec<ServiceInstance>> {
        self.record(Call::GetServiceInstances {
            space_guid: space_guid.to_string(),
            names: names.to_vec(),
        });
        self.get_service_instances.next_or(|| {
            names
                .iter()
                .map(|name| ServiceInstance {
                    guid: format!("{}-guid", name),
                    name: name.clone(),
                })
                .collect()
        })
    }

    async fn create_service_binding(
        &self,
        app_guid: &str,
        service_instance_guid: &str,
    ) -> CcReply<()> {
        self.record(Call::CreateServiceBinding {
            app_guid: app_guid.to_string(),
            service_instance_guid: service_instance_guid.to_string(),
        });
        self.create_service_binding.next_or(|| ())
    }

    async fn resource_match(&self, resources: &[Resource]) -> CcReply<Vec<Resource>> {
        self.record(Call::ResourceMatch(names(resources)));
        self.resource_match.next_or(Vec::new)
    }

    async fn create_package(&self, app_guid: &str) -> CcReply<Package> {
        self.record(Call::CreatePackage(app_guid.to_string()));
        self.create_package.next_or(|| Package {
            guid: "package-guid".to_string(),
            state: "AWAITING_UPLOAD".to_string(),
        })
    }

    async fn upload_bits_package(
        &self,
        package_guid: &str,
        matched: &[Resource],
        _archive: Vec<u8>,
    ) -> CcReply<Package> {
        self.record(Call::UploadBitsPackage {
            package_guid: package_guid.to_string(),
            matched: names(matched),
        });
        self.upload_bits_package.next_or(|| Package {
            guid: package_guid.to_string(),
            state: "PROCESSING_UPLOAD".to_string(),
        })
    }

    async fn create_build(&self, package_guid: &str) -> CcReply<Build> {
        self.record(Call::CreateBuild(package_guid.to_string()));
        self.create_build
            .next_or(|| build("build-guid", BuildState::Staging))
    }

    async fn get_build(&self, build_guid: &str) -> CcReply<Build> {
        self.record(Call::GetBuild(build_guid.to_string()));
        self.get_build
            .next_or(|| build(build_guid, BuildState::Staged))
    }

    async fn create_droplet(&self, app_guid: &str) -> CcReply<Droplet> {
        self.record(Call::CreateDroplet(app_guid.to_string()));
        self.create_droplet.next_or(|| Droplet {
            guid: "droplet-guid".to_string(),
        })
    }

    async fn upload_droplet_bits(&self, droplet_guid: &str, droplet: Vec<u8>) -> CcReply<Droplet> {
        self.record(Call::UploadDropletBits {
            droplet_guid: droplet_guid.to_string(),
            size: droplet.len(),
        });
        self.upload_droplet_bits.next_or(|| Droplet {
            guid: droplet_guid.to_string(),
        })
    }

    async fn set_application_droplet(&self, app_guid: &str, droplet_guid: &str) -> CcReply<()> {
        self.record(Call::SetApplicationDroplet {
            app_guid: app_guid.to_string(),
            droplet_guid: droplet_guid.to_string(),
        });
        self.set_application_droplet.next_or(|| ())
    }

    async fn get_domains(&self, names: &[String]) -> CcReply<Vec<Domain>> {
        self.record(Call::GetDomains(names.to_vec()));
        self.get_domains.next_or(|| {
            names
                .iter()
                .map(|name| Domain {
                    guid: format!("{}-guid", name),
                    name: name.clone(),
                    ..Domain::default()
                })
                .collect()
        })
    }

    async fn get_routes(&self, domain_guid: &str, host: &str, path: &str) -> CcReply<Vec<Route>> {
        self.record(Call::GetRoutes {
            domain_guid: domain_guid.to_string(),
            host: host.to_string(),
            path: path.to_string(),
        });
        self.get_routes.next_or(Vec::new)
    }

    async fn create_route(
        &self,
        _space_guid: &str,
        domain_guid: &str,
        host: &str,
        path: &str,
    ) -> CcReply<Route> {
        self.record(Call::CreateRoute {
            domain_guid: domain_guid.to_string(),
            host: host.to_string(),
            path: path.to_string(),
        });
        self.create_route
            .next_or(|| route(&format!("{}-route-guid", host), host, domain_guid))
    }

    async fn map_route(&self, route_guid: &str, app_guid: &str) -> CcReply<()> {
        self.record(Call::MapRoute {
            route_guid: route_guid.to_string(),
            app_guid: app_guid.to_string(),
        });
        self.map_route.next_or(|| ())
    }

    async fn get_application_routes(&self, app_guid: &str) -> CcReply<Vec<Route>> {
        self.record(Call::GetApplicationRoutes(app_guid.to_string()));
        self.get_application_routes.next_or(Vec::new)
    }

    async fn unmap_route(&self, route_guid: &str, app_guid: &str) -> CcReply<()> {
        self.record(Call::UnmapRoute {
            route_guid: route_guid.to_string(),
            app_guid: app_guid.to_string(),
        });
        self.unmap_route.next_or(|| ())
    }

    async fn create_shared_domain(
        &self,
        name: &str,
        internal: bool,
        router_group_guid: Option<&str>,
    ) -> CcReply<Domain> {
        self.record(Call::CreateSharedDomain {
            name: name.to_string(),
            internal,
            router_group_guid: router_group_guid.map(str::to_string),
        });
        self.create_shared_domain.next_or(|| Domain {
            guid: "domain-guid".to_string(),
            name: name.to_string(),
            internal,
            router_group_guid: router_group_guid.map(str::to_string),
        })
    }
}

/// Routing API double returning a fixed reply.
#[derive(Debug)]
pub struct FakeRouter {
    reply: Result<Vec<RouterGroup>, ClientError>,
    calls: AtomicUsize,
}

impl FakeRouter {
    pub fn with_groups(groups: Vec<RouterGroup>) -> Self {
        Self {
            reply: Ok(groups),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouterClient for FakeRouter {
    async fn get_router_groups(&self) -> Result<Vec<RouterGroup>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub fn router_group(name: &str, guid: &str) -> RouterGroup {
    RouterGroup {
        guid: guid.to_string(),
        name: name.to_string(),
        group_type: "tcp".to_string(),
        reservable_ports: "1024-1033".to_string(),
    }
}
