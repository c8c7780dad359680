//! Process health-check configuration.
//!
//! Reads the health checks of every process of an application and applies
//! a new health check to one process. Invalid combinations are rejected
//! before any remote call, so a rejected request never leaves a process
//! half-configured.

use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use tracing::{debug, info};

use super::Actor;
use crate::client::Process;
use crate::error::ActionError;
use crate::types::{DEFAULT_HEALTH_CHECK_ENDPOINT, HealthCheckType, PROCESS_TYPE_WEB};
use crate::warnings::{Warned, Warnings};

/// Health check settings of a single process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHealthCheck {
    pub process_type: String,
    pub health_check_type: HealthCheckType,
    /// Only meaningful for [`HealthCheckType::Http`].
    pub endpoint: String,
    /// Seconds; `0` means the platform default.
    pub invocation_timeout: u64,
}

impl From<Process> for ProcessHealthCheck {
    fn from(process: Process) -> Self {
        Self {
            process_type: process.process_type,
            health_check_type: process.health_check_type,
            endpoint: process.health_check_endpoint,
            invocation_timeout: process.health_check_invocation_timeout,
        }
    }
}

/// Health checks of an application, sortable for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessHealthChecks(pub Vec<ProcessHealthCheck>);

impl ProcessHealthChecks {
    /// Order `web` first, then the remaining processes by type.
    pub fn sort(&mut self) {
        self.0.sort_by(display_order);
    }
}

fn display_order(a: &ProcessHealthCheck, b: &ProcessHealthCheck) -> Ordering {
    let a_web = a.process_type == PROCESS_TYPE_WEB;
    let b_web = b.process_type == PROCESS_TYPE_WEB;
    b_web
        .cmp(&a_web)
        .then_with(|| a.process_type.cmp(&b.process_type))
}

impl From<Vec<ProcessHealthCheck>> for ProcessHealthChecks {
    fn from(value: Vec<ProcessHealthCheck>) -> Self {
        Self(value)
    }
}

impl Deref for ProcessHealthChecks {
    type Target = Vec<ProcessHealthCheck>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ProcessHealthChecks {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for ProcessHealthChecks {
    type Item = ProcessHealthCheck;
    type IntoIter = std::vec::IntoIter<ProcessHealthCheck>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Actor {
    /// Fetch the health check of every process of the named application.
    ///
    /// Endpoints are returned exactly as stored on the platform.
    pub async fn get_application_process_health_checks_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
    ) -> Warned<Vec<ProcessHealthCheck>, ActionError> {
        let mut warnings = Warnings::new();
        let result = self
            .read_health_checks(app_name, space_guid, &mut warnings)
            .await;
        Warned::new(result, warnings)
    }

    async fn read_health_checks(
        &self,
        app_name: &str,
        space_guid: &str,
        warnings: &mut Warnings,
    ) -> Result<Vec<ProcessHealthCheck>, ActionError> {
        let app = self
            .find_application(app_name, space_guid, warnings)
            .await?
            .ok_or_else(|| ActionError::ApplicationNotFound {
                name: app_name.to_string(),
            })?;

        let processes = warnings.absorb(self.client().get_application_processes(&app.guid).await)?;
        Ok(processes.into_iter().map(ProcessHealthCheck::from).collect())
    }

    /// Replace the health check of one process of an application.
    ///
    /// For non-http types the endpoint must be empty or the default `/`, and
    /// is always sent empty.
    pub async fn set_process_health_check_by_process_type_and_application(
        &self,
        process_type: &str,
        app_guid: &str,
        health_check_type: HealthCheckType,
        endpoint: &str,
        invocation_timeout: u64,
    ) -> Warned<(), ActionError> {
        let endpoint = match normalize_endpoint(health_check_type, endpoint) {
            Ok(endpoint) => endpoint,
            Err(err) => return Warned::err(err, Warnings::new()),
        };

        let mut warnings = Warnings::new();
        let result = self
            .apply_health_check(
                process_type,
                app_guid,
                health_check_type,
                endpoint,
                invocation_timeout,
                &mut warnings,
            )
            .await;
        Warned::new(result, warnings)
    }

    async fn apply_health_check(
        &self,
        process_type: &str,
        app_guid: &str,
        health_check_type: HealthCheckType,
        endpoint: &str,
        invocation_timeout: u64,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let process = warnings.absorb(
            self.client()
                .get_application_process_by_type(app_guid, process_type)
                .await,
        )?;

        debug!(
            process = %process.guid,
            r#type = %health_check_type,
            endpoint,
            invocation_timeout,
            "patching process health check"
        );
        warnings.absorb(
            self.client()
                .patch_application_process_health_check(
                    &process.guid,
                    health_check_type,
                    endpoint,
                    invocation_timeout,
                )
                .await,
        )?;

        info!(process_type, %health_check_type, "health check updated");
        Ok(())
    }
}

pub(crate) fn normalize_endpoint(
    health_check_type: HealthCheckType,
    endpoint: &str,
) -> Result<&str, ActionError> {
    if health_check_type == HealthCheckType::Http {
        return Ok(endpoint);
    }
    if !endpoint.is_empty() && endpoint != DEFAULT_HEALTH_CHECK_ENDPOINT {
        return Err(ActionError::HttpHealthCheckInvalid);
    }
    Ok("")
}
