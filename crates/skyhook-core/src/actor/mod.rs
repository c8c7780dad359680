//! Actions composed from Cloud Controller calls.
//!
//! An [`Actor`] owns a handle to the remote client facade and turns single
//! user intents into ordered facade calls, collecting warnings from each.

pub mod application;
pub mod domain;
pub mod health_check;
pub mod router_group;

use std::sync::Arc;

use crate::client::CloudControllerClient;

pub use health_check::{ProcessHealthCheck, ProcessHealthChecks};

#[derive(Debug, Clone)]
pub struct Actor {
    client: Arc<dyn CloudControllerClient>,
}

impl Actor {
    pub fn new(client: Arc<dyn CloudControllerClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &dyn CloudControllerClient {
        self.client.as_ref()
    }
}
