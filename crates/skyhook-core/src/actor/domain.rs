//! Shared domain administration.

use tracing::info;

use super::Actor;
use crate::client::{Domain, RouterClient};
use crate::error::ActionError;
use crate::warnings::{Warned, Warnings};

impl Actor {
    /// Create a shared domain, optionally bound to a named router group.
    ///
    /// The router group is resolved first; if that fails nothing is created.
    pub async fn create_shared_domain(
        &self,
        domain_name: &str,
        router_group_name: Option<&str>,
        internal: bool,
        router_client: &dyn RouterClient,
    ) -> Warned<Domain, ActionError> {
        let router_group_guid = match router_group_name {
            Some(name) => match self.get_router_group_by_name(name, router_client).await {
                Ok(group) => Some(group.guid),
                Err(err) => return Warned::err(err, Warnings::new()),
            },
            None => None,
        };

        let reply = self
            .client()
            .create_shared_domain(domain_name, internal, router_group_guid.as_deref())
            .await
            .map_err(ActionError::from);

        if reply.is_ok() {
            info!(domain = domain_name, internal, "shared domain created");
        }
        reply
    }
}
