//! Application lookup.

use tracing::debug;

use super::Actor;
use crate::client::Application;
use crate::error::ActionError;
use crate::warnings::{Warned, Warnings};

impl Actor {
    /// Look up a single application by name within a space.
    pub async fn get_application_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
    ) -> Warned<Application, ActionError> {
        let mut warnings = Warnings::new();
        let result = self
            .find_application(app_name, space_guid, &mut warnings)
            .await
            .and_then(|app| {
                app.ok_or_else(|| ActionError::ApplicationNotFound {
                    name: app_name.to_string(),
                })
            });
        Warned::new(result, warnings)
    }

    /// Resolve an application, treating an empty result as `None` rather
    /// than an error.
    pub(crate) async fn find_application(
        &self,
        app_name: &str,
        space_guid: &str,
        warnings: &mut Warnings,
    ) -> Result<Option<Application>, ActionError> {
        debug!(app = app_name, space = space_guid, "looking up application");
        let apps = warnings.absorb(
            self.client()
                .get_applications(&[app_name.to_string()], space_guid)
                .await,
        )?;
        Ok(apps.into_iter().next())
    }
}
