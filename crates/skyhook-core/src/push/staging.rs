//! Staging step: create a build and poll it until it settles.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::actuator::{Actuator, PushSink, PushState};
use super::event::Event;
use crate::client::BuildState;
use crate::error::ActionError;
use crate::warnings::Warnings;

impl Actuator {
    /// Poll without an iteration cap; only a terminal build state or
    /// `cancel` ends the loop.
    pub(super) async fn stage(
        &self,
        state: &mut PushState,
        sink: &PushSink,
        cancel: &CancellationToken,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let package_guid = state
            .package_guid
            .clone()
            .ok_or_else(|| ActionError::StagingFailed {
                reason: "No package was uploaded".to_string(),
            })?;

        sink.emit(Event::StartingStaging);
        let build = warnings.absorb(self.client().create_build(&package_guid).await)?;
        state.build_guid = Some(build.guid.clone());
        debug!(build = %build.guid, "build created");

        loop {
            sink.emit(Event::PollingBuild);
            let current = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ActionError::Cancelled),
                reply = self.client().get_build(&build.guid) => warnings.absorb(reply)?,
            };

            match current.state {
                BuildState::Staged => {
                    let droplet_guid =
                        current.droplet_guid.ok_or_else(|| ActionError::StagingFailed {
                            reason: "Build staged without a droplet".to_string(),
                        })?;
                    info!(build = %build.guid, droplet = %droplet_guid, "staging complete");
                    state.droplet_guid = Some(droplet_guid);
                    sink.emit(Event::StagingComplete);
                    return Ok(());
                }
                BuildState::Failed => {
                    return Err(ActionError::StagingFailed {
                        reason: current
                            .error
                            .unwrap_or_else(|| "Build failed without a reason".to_string()),
                    });
                }
                BuildState::Staging => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ActionError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval()) => {}
            }
        }
    }
}
