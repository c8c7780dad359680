//! Application context for unified dependency injection.

use std::sync::Arc;

use crate::actor::Actor;
use crate::client::{
    CloudControllerClient, HttpCloudControllerClient, HttpRouterClient, RouterClient,
};
use crate::config::SkyhookConfig;
use crate::push::Actuator;

/// Builds the platform clients and the services on top of them.
///
/// Frontends create this once from the loaded configuration and ask it for
/// an [`Actor`] or an [`Actuator`].
#[derive(Debug, Clone)]
pub struct AppContext {
    config: SkyhookConfig,
}

impl AppContext {
    pub fn new(config: SkyhookConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SkyhookConfig {
        &self.config
    }

    /// Space to target when a command does not name one.
    pub fn space_guid(&self) -> anyhow::Result<&str> {
        self.config.space_guid.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No space targeted. Pass --space-guid or set space_guid in skyhook.toml")
        })
    }

    pub fn cloud_controller_client(&self) -> anyhow::Result<Arc<dyn CloudControllerClient>> {
        let client = HttpCloudControllerClient::new(
            self.config.require_api_endpoint()?.clone(),
            self.config.access_token.clone(),
            &self.config.connection_options(),
        )?;
        Ok(Arc::new(client))
    }

    pub fn router_client(&self) -> anyhow::Result<Arc<dyn RouterClient>> {
        let client = HttpRouterClient::new(
            self.config.router_endpoint_or_api()?.clone(),
            self.config.access_token.clone(),
            &self.config.connection_options(),
        )?;
        Ok(Arc::new(client))
    }

    pub fn actor(&self) -> anyhow::Result<Actor> {
        Ok(Actor::new(self.cloud_controller_client()?))
    }

    pub fn actuator(&self) -> anyhow::Result<Actuator> {
        Ok(Actuator::new(self.actor()?).with_poll_interval(self.config.poll_interval()))
    }
}
