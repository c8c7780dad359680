//! Push pipeline driver.
//!
//! The [`Actuator`] walks [`push_steps`] in order against one [`PushPlan`].
//! Progress goes to a [`PushSink`] as two ordered streams: milestone
//! [`Event`]s, and the warnings each step collected, tagged with the step
//! name. The same warnings are concatenated into the returned [`Warned`].
//!
//! The first fatal error stops the pipeline. Whatever was emitted before it
//! stays valid, and remote resources created so far are left in place.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::Event;
use super::plan::{PushPlan, RoutePlan, RouteSpec};
use super::steps::{StepKind, push_steps};
use crate::actor::Actor;
use crate::actor::health_check::normalize_endpoint;
use crate::client::{Application, CloudControllerClient, Resource, Route};
use crate::error::ActionError;
use crate::types::PROCESS_TYPE_WEB;
use crate::warnings::{Warned, Warnings};

/// Default pause between two build status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Warnings collected by one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWarnings {
    pub step: &'static str,
    pub warnings: Warnings,
}

/// Sending half of a push's progress streams.
///
/// Sending never fails; progress for dropped receivers is discarded.
#[derive(Debug, Clone)]
pub struct PushSink {
    events: UnboundedSender<Event>,
    warnings: UnboundedSender<StepWarnings>,
}

/// Receiving half of a push's progress streams.
#[derive(Debug)]
pub struct PushReceivers {
    pub events: UnboundedReceiver<Event>,
    pub warnings: UnboundedReceiver<StepWarnings>,
}

impl PushSink {
    pub fn channel() -> (Self, PushReceivers) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (warnings_tx, warnings_rx) = mpsc::unbounded_channel();
        (
            Self {
                events: events_tx,
                warnings: warnings_tx,
            },
            PushReceivers {
                events: events_rx,
                warnings: warnings_rx,
            },
        )
    }

    pub fn emit(&self, event: Event) {
        debug!(%event, "push event");
        let _ = self.events.send(event);
    }

    fn step_warnings(&self, step: &'static str, warnings: &Warnings) {
        if warnings.is_empty() {
            return;
        }
        let _ = self.warnings.send(StepWarnings {
            step,
            warnings: warnings.clone(),
        });
    }
}

/// What a successful push produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub application: Application,
    pub package_guid: Option<String>,
    pub build_guid: Option<String>,
    pub droplet_guid: String,
}

/// Values handed from one step to the next.
#[derive(Debug, Default)]
pub(super) struct PushState {
    pub(super) application: Option<Application>,
    pub(super) matched: Vec<Resource>,
    pub(super) package_guid: Option<String>,
    pub(super) build_guid: Option<String>,
    pub(super) droplet_guid: Option<String>,
}

impl PushState {
    pub(super) fn application(&self, plan: &PushPlan) -> Result<&Application, ActionError> {
        self.application
            .as_ref()
            .ok_or_else(|| ActionError::ApplicationNotFound {
                name: plan.application().name.clone(),
            })
    }

    fn into_outcome(self, plan: &PushPlan) -> Result<PushOutcome, ActionError> {
        let application = self
            .application
            .ok_or_else(|| ActionError::ApplicationNotFound {
                name: plan.application().name.clone(),
            })?;
        let droplet_guid = self.droplet_guid.ok_or_else(|| ActionError::StagingFailed {
            reason: "No droplet was produced".to_string(),
        })?;
        Ok(PushOutcome {
            application,
            package_guid: self.package_guid,
            build_guid: self.build_guid,
            droplet_guid,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Actuator {
    actor: Actor,
    poll_interval: Duration,
}

impl Actuator {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub(super) fn client(&self) -> &dyn CloudControllerClient {
        self.actor.client()
    }

    pub(super) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run the whole pipeline for `plan`.
    ///
    /// Returns only after [`Event::Complete`] was emitted, or with the first
    /// fatal error. Cancelling `cancel` stops the pipeline between steps and
    /// interrupts build polling with [`ActionError::Cancelled`].
    ///
    /// A health check that can never be applied is rejected before any
    /// remote call.
    pub async fn actualize(
        &self,
        plan: &PushPlan,
        sink: &PushSink,
        cancel: &CancellationToken,
    ) -> Warned<PushOutcome, ActionError> {
        let mut warnings = Warnings::new();
        let mut state = PushState::default();

        if let Some(settings) = plan.health_check()
            && let Err(err) = normalize_endpoint(settings.health_check_type, &settings.endpoint)
        {
            warn!(app = %plan.application().name, error = %err, "push rejected");
            return Warned::err(err, warnings);
        }

        info!(app = %plan.application().name, "starting push");

        for step in push_steps() {
            if !step.should_run(plan) {
                debug!(step = step.name, "skipping step");
                continue;
            }
            if cancel.is_cancelled() {
                return Warned::err(ActionError::Cancelled, warnings);
            }

            debug!(step = step.name, "running step");
            let reply = self.run_step(step.kind, plan, &mut state, sink, cancel).await;
            sink.step_warnings(step.name, &reply.warnings);

            if let Err(err) = warnings.absorb(reply) {
                warn!(step = step.name, error = %err, "push aborted");
                return Warned::err(err, warnings);
            }
        }

        info!(app = %plan.application().name, "push complete");
        Warned::new(state.into_outcome(plan), warnings)
    }

    async fn run_step(
        &self,
        kind: StepKind,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        cancel: &CancellationToken,
    ) -> Warned<(), ActionError> {
        let mut warnings = Warnings::new();
        let result = match kind {
            StepKind::Application => self.setup_application(plan, state, sink, &mut warnings).await,
            StepKind::Services => self.bind_services(plan, state, sink, &mut warnings).await,
            StepKind::ResourceMatching => {
                self.match_resources(plan, state, sink, &mut warnings).await
            }
            StepKind::Upload => self.upload(plan, state, sink, &mut warnings).await,
            StepKind::Staging => self.stage(state, sink, cancel, &mut warnings).await,
            StepKind::Droplet => self.set_droplet(plan, state, sink, &mut warnings).await,
            StepKind::Routes => self.apply_routes(plan, state, sink, &mut warnings).await,
            StepKind::Scale => self.scale_web(plan, state, sink, &mut warnings).await,
            StepKind::HealthCheck => self.apply_health_check(plan, state, sink, &mut warnings).await,
            StepKind::Complete => {
                sink.emit(Event::Complete);
                Ok(())
            }
        };
        Warned::new(result, warnings)
    }

    async fn setup_application(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        sink.emit(Event::SettingUpApplication);
        let spec = plan.application();

        let existing = self
            .actor
            .find_application(&spec.name, &spec.space_guid, warnings)
            .await?;

        let application = match existing {
            Some(app) if spec.requests_update() => {
                let app = warnings.absorb(self.client().update_application(&app.guid, spec).await)?;
                sink.emit(Event::UpdatedApplication);
                app
            }
            Some(app) => {
                sink.emit(Event::SkippingApplicationCreation);
                app
            }
            None => {
                let app = warnings.absorb(self.client().create_application(spec).await)?;
                sink.emit(Event::CreatedApplication);
                app
            }
        };

        debug!(app = %application.name, guid = %application.guid, "application ready");
        state.application = Some(application);
        Ok(())
    }

    async fn bind_services(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        sink.emit(Event::ConfiguringServices);
        let app = state.application(plan)?;

        let instances = warnings.absorb(
            self.client()
                .get_service_instances(&app.space_guid, plan.services())
                .await,
        )?;

        for name in plan.services() {
            let instance = instances
                .iter()
                .find(|instance| &instance.name == name)
                .ok_or_else(|| ActionError::ServiceInstanceNotFound { name: name.clone() })?;
            warnings.absorb(
                self.client()
                    .create_service_binding(&app.guid, &instance.guid)
                    .await,
            )?;
        }

        sink.emit(Event::BoundServices);
        Ok(())
    }

    async fn match_resources(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        sink.emit(Event::ResourceMatching);
        state.matched = warnings.absorb(self.client().resource_match(plan.resources()).await)?;
        debug!(
            total = plan.resources().len(),
            matched = state.matched.len(),
            "resource match finished"
        );
        Ok(())
    }

    async fn set_droplet(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        sink.emit(Event::SettingDroplet);
        let app = state.application(plan)?;
        let droplet_guid = state
            .droplet_guid
            .as_deref()
            .ok_or_else(|| ActionError::StagingFailed {
                reason: "No droplet was produced".to_string(),
            })?;

        warnings.absorb(
            self.client()
                .set_application_droplet(&app.guid, droplet_guid)
                .await,
        )?;
        sink.emit(Event::SetDropletComplete);
        Ok(())
    }

    async fn apply_routes(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let app = state.application(plan)?;
        match plan.routes() {
            RoutePlan::Unchanged => Ok(()),
            RoutePlan::Map(routes) => {
                sink.emit(Event::CreatingAndMappingRoutes);
                self.map_routes(app, routes, sink, warnings).await
            }
            RoutePlan::UnmapAll => {
                sink.emit(Event::UnmappingRoutes);
                let current =
                    warnings.absorb(self.client().get_application_routes(&app.guid).await)?;
                for route in current {
                    warnings.absorb(self.client().unmap_route(&route.guid, &app.guid).await)?;
                }
                Ok(())
            }
        }
    }

    async fn map_routes(
        &self,
        app: &Application,
        routes: &[RouteSpec],
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let current = warnings.absorb(self.client().get_application_routes(&app.guid).await)?;

        let mut resolved: Vec<Route> = Vec::with_capacity(routes.len());
        let mut created = false;
        for spec in routes {
            let domain = warnings
                .absorb(self.client().get_domains(&[spec.domain.clone()]).await)?
                .into_iter()
                .next()
                .ok_or_else(|| ActionError::DomainNotFound {
                    name: spec.domain.clone(),
                })?;

            let existing = warnings.absorb(
                self.client()
                    .get_routes(&domain.guid, &spec.host, &spec.path)
                    .await,
            )?;
            let route = match existing.into_iter().next() {
                Some(route) => route,
                None => {
                    debug!(route = %spec, "creating route");
                    created = true;
                    warnings.absorb(
                        self.client()
                            .create_route(&app.space_guid, &domain.guid, &spec.host, &spec.path)
                            .await,
                    )?
                }
            };
            resolved.push(route);
        }
        if created {
            sink.emit(Event::CreatedRoutes);
        }

        let mut mapped = false;
        for route in resolved {
            if current.iter().any(|c| c.guid == route.guid) {
                continue;
            }
            warnings.absorb(self.client().map_route(&route.guid, &app.guid).await)?;
            mapped = true;
        }
        if mapped {
            sink.emit(Event::BoundRoutes);
        }
        Ok(())
    }

    async fn scale_web(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let Some(scale) = plan.scale() else {
            return Ok(());
        };
        sink.emit(Event::ScaleWebProcess);
        let app = state.application(plan)?;
        warnings.absorb(
            self.client()
                .scale_application_process(&app.guid, PROCESS_TYPE_WEB, scale)
                .await,
        )?;
        sink.emit(Event::ScaleWebProcessComplete);
        Ok(())
    }

    async fn apply_health_check(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let Some(settings) = plan.health_check() else {
            return Ok(());
        };
        sink.emit(Event::SetHealthCheck);
        let app = state.application(plan)?;
        warnings.absorb(
            self.actor
                .set_process_health_check_by_process_type_and_application(
                    PROCESS_TYPE_WEB,
                    &app.guid,
                    settings.health_check_type,
                    &settings.endpoint,
                    settings.invocation_timeout,
                )
                .await,
        )?;
        sink.emit(Event::SetHealthCheckComplete);
        Ok(())
    }
}
