//! Skyhook Core Library
//!
//! Orchestrates application pushes and process health checks against a
//! Cloud Foundry style platform, reporting warnings alongside every result.

pub mod actor;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod push;
pub mod resources;
pub mod types;
pub mod warnings;

/// Re-exports of commonly used types
pub mod prelude {
    // Actions
    pub use crate::actor::{Actor, ProcessHealthCheck, ProcessHealthChecks};

    // Clients
    pub use crate::client::{
        CloudControllerClient, ConnectionOptions, HttpCloudControllerClient, HttpRouterClient,
        RouterClient,
    };

    // Configuration
    pub use crate::config::{ConfigStore, SkyhookConfig};
    pub use crate::context::AppContext;

    // Errors and warnings
    pub use crate::error::{ActionError, ClientError};
    pub use crate::warnings::{Warned, Warnings};

    // Push
    pub use crate::push::{
        Actuator, Event, HealthCheckSettings, PushOutcome, PushPlan, PushReceivers, PushSink,
        PushSource, RoutePlan, RouteSpec, StepWarnings,
    };

    pub use crate::types::HealthCheckType;
}
