//! Immutable description of a single push.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::client::{ApplicationSpec, ProcessScale, Resource};
use crate::error::ActionError;
use crate::resources;
use crate::types::HealthCheckType;

/// Where the application bits come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushSource {
    /// A directory that is zipped before upload.
    Directory(PathBuf),
    /// A prebuilt zip archive.
    Archive(PathBuf),
    /// An already staged droplet; staging is skipped.
    Droplet(PathBuf),
}

impl PushSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Archive(path) | Self::Droplet(path) => path,
        }
    }

    pub fn is_droplet(&self) -> bool {
        matches!(self, Self::Droplet(_))
    }
}

/// A route written as `host.domain[/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub host: String,
    pub domain: String,
    pub path: String,
}

impl FromStr for RouteSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, path) = match s.find('/') {
            Some(idx) => (&s[..idx], &s[idx..]),
            None => (s, ""),
        };
        let Some((host, domain)) = address.split_once('.') else {
            anyhow::bail!("Invalid route '{}'. Expected host.domain[/path]", s);
        };
        if host.is_empty() || domain.is_empty() {
            anyhow::bail!("Invalid route '{}'. Expected host.domain[/path]", s);
        }

        Ok(Self {
            host: host.to_string(),
            domain: domain.to_string(),
            path: path.to_string(),
        })
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.host, self.domain, self.path)
    }
}

/// What the push does with the application's routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoutePlan {
    #[default]
    Unchanged,
    Map(Vec<RouteSpec>),
    UnmapAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSettings {
    pub health_check_type: HealthCheckType,
    pub endpoint: String,
    pub invocation_timeout: u64,
}

/// Desired end state of one application push.
///
/// Fields are fixed once built; pushing again means building a new plan.
#[derive(Debug, Clone)]
pub struct PushPlan {
    application: ApplicationSpec,
    source: PushSource,
    resources: Vec<Resource>,
    services: Vec<String>,
    scale: Option<ProcessScale>,
    health_check: Option<HealthCheckSettings>,
    routes: RoutePlan,
}

impl PushPlan {
    pub fn builder(
        app_name: impl Into<String>,
        space_guid: impl Into<String>,
        source: PushSource,
    ) -> PushPlanBuilder {
        PushPlanBuilder {
            plan: PushPlan {
                application: ApplicationSpec::new(app_name, space_guid),
                source,
                resources: Vec::new(),
                services: Vec::new(),
                scale: None,
                health_check: None,
                routes: RoutePlan::Unchanged,
            },
        }
    }

    pub fn application(&self) -> &ApplicationSpec {
        &self.application
    }

    pub fn source(&self) -> &PushSource {
        &self.source
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Requested web process scale, if it changes anything.
    pub fn scale(&self) -> Option<&ProcessScale> {
        self.scale.as_ref().filter(|scale| !scale.is_empty())
    }

    pub fn health_check(&self) -> Option<&HealthCheckSettings> {
        self.health_check.as_ref()
    }

    pub fn routes(&self) -> &RoutePlan {
        &self.routes
    }
}

#[derive(Debug, Clone)]
pub struct PushPlanBuilder {
    plan: PushPlan,
}

impl PushPlanBuilder {
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.plan.application.stack = Some(stack.into());
        self
    }

    pub fn with_buildpacks(mut self, buildpacks: Vec<String>) -> Self {
        self.plan.application.buildpacks = buildpacks;
        self
    }

    /// Digest the source and use the result as the resource manifest.
    ///
    /// Droplet sources have no manifest.
    pub async fn with_gathered_resources(mut self) -> Result<Self, ActionError> {
        self.plan.resources = match &self.plan.source {
            PushSource::Directory(dir) => resources::gather_directory_resources(dir).await?,
            PushSource::Archive(zip) => resources::gather_archive_resources(zip).await?,
            PushSource::Droplet(_) => Vec::new(),
        };
        Ok(self)
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.plan.services = services;
        self
    }

    pub fn with_scale(mut self, scale: ProcessScale) -> Self {
        self.plan.scale = Some(scale);
        self
    }

    pub fn with_health_check(mut self, settings: HealthCheckSettings) -> Self {
        self.plan.health_check = Some(settings);
        self
    }

    pub fn with_routes(mut self, routes: RoutePlan) -> Self {
        self.plan.routes = routes;
        self
    }

    pub fn build(self) -> PushPlan {
        self.plan
    }
}
