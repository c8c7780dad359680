//! Application push pipeline.
//!
//! A push turns a [`PushPlan`] into platform state by running the steps of
//! [`steps::push_steps`] in order. Each step reports progress as [`Event`]s
//! and returns its own warnings.

pub mod actuator;
pub mod event;
pub mod plan;
pub mod staging;
pub mod steps;
pub mod upload;

pub use actuator::{
    Actuator, DEFAULT_POLL_INTERVAL, PushOutcome, PushReceivers, PushSink, StepWarnings,
};
pub use event::Event;
pub use plan::{HealthCheckSettings, PushPlan, PushPlanBuilder, PushSource, RoutePlan, RouteSpec};
pub use steps::{PushStep, StepKind, push_steps};
