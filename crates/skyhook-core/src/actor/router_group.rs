//! Router group lookup through the routing API.

use tracing::debug;

use super::Actor;
use crate::client::{RouterClient, RouterGroup};
use crate::error::ActionError;

impl Actor {
    /// Find a router group by exact name.
    ///
    /// Router API failures are returned as they are.
    pub async fn get_router_group_by_name(
        &self,
        name: &str,
        router_client: &dyn RouterClient,
    ) -> Result<RouterGroup, ActionError> {
        debug!(router_group = name, "looking up router group");
        let groups = router_client.get_router_groups().await?;

        groups
            .into_iter()
            .find(|group| group.name == name)
            .ok_or_else(|| ActionError::RouterGroupNotFound {
                name: name.to_string(),
            })
    }
}
