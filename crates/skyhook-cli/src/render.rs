//! Terminal output for push progress, warnings and health checks.

use std::io::Write;

use anyhow::Result;
use console::style;

use skyhook_core::actor::ProcessHealthChecks;
use skyhook_core::client::RouterGroup;
use skyhook_core::push::{Event, PushOutcome, PushReceivers, StepWarnings};
use skyhook_core::warnings::Warnings;

/// Writes human readable progress for one command.
pub struct Renderer<W: Write> {
    writer: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Print one pipeline event. Build polling is reported once.
    pub fn event(&mut self, event: Event, app_name: &str, polled: &mut bool) -> Result<()> {
        let message = match event {
            Event::SettingUpApplication => format!("Setting up application {}", app_name),
            Event::SkippingApplicationCreation => {
                format!("Using existing application {}", app_name)
            }
            Event::CreatedApplication => format!("Created application {}", app_name),
            Event::UpdatedApplication => format!("Updated application {}", app_name),
            Event::ConfiguringServices => "Binding service instances".to_string(),
            Event::BoundServices => "Bound service instances".to_string(),
            Event::ResourceMatching => "Checking for unchanged files".to_string(),
            Event::CreatingPackage => "Creating package".to_string(),
            Event::CreatingArchive => "Packing application files".to_string(),
            Event::ReadingArchive => "Reading application archive".to_string(),
            Event::UploadingApplication => "Uploading application files".to_string(),
            Event::UploadingApplicationWithArchive => "Uploading application archive".to_string(),
            Event::UploadingDroplet => "Uploading droplet".to_string(),
            Event::RetryUpload => "Upload failed, retrying".to_string(),
            Event::UploadWithArchiveComplete => "Upload complete".to_string(),
            Event::UploadDropletComplete => "Droplet upload complete".to_string(),
            Event::StartingStaging => "Staging application".to_string(),
            Event::PollingBuild => {
                if *polled {
                    return Ok(());
                }
                *polled = true;
                "Waiting for staging to finish".to_string()
            }
            Event::StagingComplete => "Staging complete".to_string(),
            Event::SettingDroplet => "Setting current droplet".to_string(),
            Event::SetDropletComplete => "Current droplet set".to_string(),
            Event::CreatingAndMappingRoutes => "Mapping routes".to_string(),
            Event::CreatedRoutes => "Created routes".to_string(),
            Event::BoundRoutes => "Mapped routes".to_string(),
            Event::UnmappingRoutes => "Unmapping routes".to_string(),
            Event::ScaleWebProcess => "Scaling web process".to_string(),
            Event::ScaleWebProcessComplete => "Scaled web process".to_string(),
            Event::SetHealthCheck => "Setting health check on web process".to_string(),
            Event::SetHealthCheckComplete => "Health check set".to_string(),
            Event::Complete => return Ok(()),
        };

        if event == Event::RetryUpload {
            writeln!(self.writer, "  {} {}", style("↻").yellow(), message)?;
        } else {
            writeln!(self.writer, "  {}", message)?;
        }
        Ok(())
    }

    pub fn step_warnings(&mut self, step: &StepWarnings) -> Result<()> {
        for warning in step.warnings.iter() {
            writeln!(
                self.writer,
                "  {} {} {}",
                style("⚠").yellow(),
                style(format!("[{}]", step.step)).dim(),
                warning
            )?;
        }
        Ok(())
    }

    pub fn warnings(&mut self, warnings: &Warnings) -> Result<()> {
        for warning in warnings.iter() {
            writeln!(self.writer, "  {} {}", style("⚠").yellow(), warning)?;
        }
        Ok(())
    }

    pub fn success(&mut self, message: &str) -> Result<()> {
        writeln!(self.writer, "{} {}", style("✓").green(), message)?;
        Ok(())
    }

    pub fn failure(&mut self, message: &str) -> Result<()> {
        writeln!(self.writer, "{} {}", style("✗").red(), message)?;
        Ok(())
    }

    pub fn push_outcome(&mut self, outcome: &PushOutcome) -> Result<()> {
        self.success(&format!("Pushed {}", outcome.application.name))?;
        writeln!(self.writer, "  App:     {}", outcome.application.guid)?;
        if let Some(build) = &outcome.build_guid {
            writeln!(self.writer, "  Build:   {}", build)?;
        }
        writeln!(self.writer, "  Droplet: {}", outcome.droplet_guid)?;
        Ok(())
    }

    pub fn health_checks(&mut self, checks: &ProcessHealthChecks) -> Result<()> {
        writeln!(
            self.writer,
            "  {:<15} {:<14} {:<22} Invocation timeout",
            "Process", "Health check", "Endpoint (for http)"
        )?;
        writeln!(self.writer, "  {}", "-".repeat(70))?;

        for check in checks.iter() {
            let timeout = if check.invocation_timeout == 0 {
                "-".to_string()
            } else {
                check.invocation_timeout.to_string()
            };
            writeln!(
                self.writer,
                "  {:<15} {:<14} {:<22} {}",
                truncate(&check.process_type, 15),
                check.health_check_type,
                truncate(&check.endpoint, 22),
                timeout
            )?;
        }
        Ok(())
    }

    pub fn router_group(&mut self, group: &RouterGroup) -> Result<()> {
        writeln!(self.writer, "  Name:  {}", style(&group.name).green())?;
        writeln!(self.writer, "  GUID:  {}", group.guid)?;
        writeln!(self.writer, "  Type:  {}", group.group_type)?;
        if !group.reservable_ports.is_empty() {
            writeln!(self.writer, "  Ports: {}", group.reservable_ports)?;
        }
        Ok(())
    }
}

/// Drain both progress streams until the push drops its sink.
pub async fn drain<W: Write>(
    renderer: &mut Renderer<W>,
    mut receivers: PushReceivers,
    app_name: &str,
) -> Result<()> {
    let mut polled = false;
    let mut events_open = true;
    let mut warnings_open = true;

    while events_open || warnings_open {
        tokio::select! {
            event = receivers.events.recv(), if events_open => match event {
                Some(event) => renderer.event(event, app_name, &mut polled)?,
                None => events_open = false,
            },
            step = receivers.warnings.recv(), if warnings_open => match step {
                Some(step) => renderer.step_warnings(&step)?,
                None => warnings_open = false,
            },
        }
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
