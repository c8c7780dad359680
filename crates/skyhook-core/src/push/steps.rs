//! Ordered step list of the push pipeline.
//!
//! The order here is the order of execution. A step is skipped when its
//! predicate holds for the plan; steps are never reordered.

use super::plan::{PushPlan, RoutePlan};

/// What a step does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Application,
    Services,
    ResourceMatching,
    Upload,
    Staging,
    Droplet,
    Routes,
    Scale,
    HealthCheck,
    Complete,
}

#[derive(Debug, Clone, Copy)]
pub struct PushStep {
    /// Stable name, used to correlate step warnings.
    pub name: &'static str,
    pub kind: StepKind,
    pub skip: fn(&PushPlan) -> bool,
}

impl PushStep {
    pub fn should_run(&self, plan: &PushPlan) -> bool {
        !(self.skip)(plan)
    }
}

fn never(_: &PushPlan) -> bool {
    false
}

fn no_services(plan: &PushPlan) -> bool {
    plan.services().is_empty()
}

fn nothing_to_match(plan: &PushPlan) -> bool {
    plan.source().is_droplet() || plan.resources().is_empty()
}

fn droplet_source(plan: &PushPlan) -> bool {
    plan.source().is_droplet()
}

fn routes_unchanged(plan: &PushPlan) -> bool {
    matches!(plan.routes(), RoutePlan::Unchanged)
}

fn no_scale(plan: &PushPlan) -> bool {
    plan.scale().is_none()
}

fn no_health_check(plan: &PushPlan) -> bool {
    plan.health_check().is_none()
}

static PUSH_STEPS: [PushStep; 10] = [
    PushStep {
        name: "application",
        kind: StepKind::Application,
        skip: never,
    },
    PushStep {
        name: "services",
        kind: StepKind::Services,
        skip: no_services,
    },
    PushStep {
        name: "resource-matching",
        kind: StepKind::ResourceMatching,
        skip: nothing_to_match,
    },
    PushStep {
        name: "upload",
        kind: StepKind::Upload,
        skip: never,
    },
    PushStep {
        name: "staging",
        kind: StepKind::Staging,
        skip: droplet_source,
    },
    PushStep {
        name: "droplet",
        kind: StepKind::Droplet,
        skip: never,
    },
    PushStep {
        name: "routes",
        kind: StepKind::Routes,
        skip: routes_unchanged,
    },
    PushStep {
        name: "scale",
        kind: StepKind::Scale,
        skip: no_scale,
    },
    PushStep {
        name: "health-check",
        kind: StepKind::HealthCheck,
        skip: no_health_check,
    },
    PushStep {
        name: "complete",
        kind: StepKind::Complete,
        skip: never,
    },
];

/// The pipeline, in execution order.
pub fn push_steps() -> &'static [PushStep] {
    &PUSH_STEPS
}
