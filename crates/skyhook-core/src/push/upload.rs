//! Upload step: application bits or a prebuilt droplet.
//!
//! A transient failure earns exactly one more attempt. The request body is
//! built again for that attempt.

use std::future::Future;
use std::path::Path;

use tracing::{debug, warn};

use super::actuator::{Actuator, PushSink, PushState};
use super::event::Event;
use super::plan::{PushPlan, PushSource};
use crate::client::CcReply;
use crate::error::ActionError;
use crate::resources;
use crate::warnings::Warnings;

impl Actuator {
    pub(super) async fn upload(
        &self,
        plan: &PushPlan,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        match plan.source() {
            PushSource::Directory(dir) => {
                let bits = PackageBits::Directory(dir);
                self.upload_package(plan, bits, state, sink, warnings).await
            }
            PushSource::Archive(zip) => {
                let bits = PackageBits::Archive(zip);
                self.upload_package(plan, bits, state, sink, warnings).await
            }
            PushSource::Droplet(path) => {
                self.upload_droplet(plan, path, state, sink, warnings).await
            }
        }
    }

    async fn upload_package(
        &self,
        plan: &PushPlan,
        bits: PackageBits<'_>,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let app_guid = state.application(plan)?.guid.clone();

        sink.emit(Event::CreatingPackage);
        let package = warnings.absorb(self.client().create_package(&app_guid).await)?;

        let (prepare, uploading) = match bits {
            PackageBits::Directory(_) => (Event::CreatingArchive, Event::UploadingApplication),
            PackageBits::Archive(_) => (Event::ReadingArchive, Event::UploadingApplicationWithArchive),
        };
        sink.emit(prepare);

        let unmatched = resources::unmatched(plan.resources(), &state.matched);
        debug!(
            package = %package.guid,
            files = unmatched.len(),
            cached = state.matched.len(),
            "uploading package bits"
        );
        sink.emit(uploading);

        let client = self.client();
        let matched = state.matched.as_slice();
        let unmatched = unmatched.as_slice();
        let package_guid = package.guid.as_str();
        with_upload_retry(sink, warnings, || async move {
            let archive = match bits {
                PackageBits::Directory(dir) => {
                    resources::zip_directory_resources(dir, unmatched).await?
                }
                PackageBits::Archive(zip) => resources::zip_archive_resources(zip, unmatched).await?,
            };
            Ok(client.upload_bits_package(package_guid, matched, archive).await)
        })
        .await?;

        sink.emit(Event::UploadWithArchiveComplete);
        state.package_guid = Some(package.guid);
        Ok(())
    }

    async fn upload_droplet(
        &self,
        plan: &PushPlan,
        path: &Path,
        state: &mut PushState,
        sink: &PushSink,
        warnings: &mut Warnings,
    ) -> Result<(), ActionError> {
        let app_guid = state.application(plan)?.guid.clone();

        sink.emit(Event::UploadingDroplet);
        let droplet = warnings.absorb(self.client().create_droplet(&app_guid).await)?;

        let client = self.client();
        let droplet_guid = droplet.guid.as_str();
        let uploaded = with_upload_retry(sink, warnings, || async move {
            let bits = tokio::fs::read(path).await.map_err(|err| {
                ActionError::Resource(format!("Failed to read droplet {}: {}", path.display(), err))
            })?;
            Ok(client.upload_droplet_bits(droplet_guid, bits).await)
        })
        .await?;

        sink.emit(Event::UploadDropletComplete);
        state.droplet_guid = Some(uploaded.guid);
        Ok(())
    }
}

/// Local bits of a package upload.
#[derive(Debug, Clone, Copy)]
enum PackageBits<'a> {
    Directory(&'a Path),
    Archive(&'a Path),
}

/// Run `attempt`, repeating it once if the platform call fails transiently.
///
/// Local failures while preparing the request are never retried.
async fn with_upload_retry<T, F, Fut>(
    sink: &PushSink,
    warnings: &mut Warnings,
    attempt: F,
) -> Result<T, ActionError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<CcReply<T>, ActionError>>,
{
    let mut retried = false;
    loop {
        let reply = attempt().await?;
        match warnings.absorb(reply) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && !retried => {
                warn!(error = %err, "upload failed, retrying once");
                sink.emit(Event::RetryUpload);
                retried = true;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
