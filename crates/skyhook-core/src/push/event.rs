//! Milestones reported while a push runs.

use std::fmt;

/// A milestone reached by the push pipeline.
///
/// Events are emitted in pipeline order. Only [`Event::RetryUpload`] and
/// [`Event::PollingBuild`] can be emitted more than once per push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    SettingUpApplication,
    SkippingApplicationCreation,
    CreatedApplication,
    UpdatedApplication,
    ConfiguringServices,
    BoundServices,
    ResourceMatching,
    CreatingPackage,
    CreatingArchive,
    ReadingArchive,
    UploadingApplication,
    UploadingApplicationWithArchive,
    UploadingDroplet,
    RetryUpload,
    UploadWithArchiveComplete,
    UploadDropletComplete,
    StartingStaging,
    PollingBuild,
    StagingComplete,
    SettingDroplet,
    SetDropletComplete,
    CreatingAndMappingRoutes,
    CreatedRoutes,
    BoundRoutes,
    UnmappingRoutes,
    ScaleWebProcess,
    ScaleWebProcessComplete,
    SetHealthCheck,
    SetHealthCheckComplete,
    Complete,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SettingUpApplication => "setting up application",
            Self::SkippingApplicationCreation => "skipping creation",
            Self::CreatedApplication => "created application",
            Self::UpdatedApplication => "updated application",
            Self::ConfiguringServices => "configuring services",
            Self::BoundServices => "bound services",
            Self::ResourceMatching => "resource matching",
            Self::CreatingPackage => "creating package",
            Self::CreatingArchive => "creating archive",
            Self::ReadingArchive => "reading archive",
            Self::UploadingApplication => "uploading application",
            Self::UploadingApplicationWithArchive => "uploading application with archive",
            Self::UploadingDroplet => "uploading droplet",
            Self::RetryUpload => "retry upload",
            Self::UploadWithArchiveComplete => "upload complete",
            Self::UploadDropletComplete => "upload droplet complete",
            Self::StartingStaging => "starting staging",
            Self::PollingBuild => "polling build",
            Self::StagingComplete => "staging complete",
            Self::SettingDroplet => "setting droplet",
            Self::SetDropletComplete => "set droplet complete",
            Self::CreatingAndMappingRoutes => "creating and mapping routes",
            Self::CreatedRoutes => "created routes",
            Self::BoundRoutes => "bound routes",
            Self::UnmappingRoutes => "unmapping routes",
            Self::ScaleWebProcess => "scaling the web process",
            Self::ScaleWebProcessComplete => "scaling the web process complete",
            Self::SetHealthCheck => "setting the health check type on the process",
            Self::SetHealthCheckComplete => {
                "completed setting the health check type on the process"
            }
            Self::Complete => "complete",
        }
    }

    /// Whether the event may legitimately appear more than once in a push.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, Self::RetryUpload | Self::PollingBuild)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
