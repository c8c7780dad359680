mod support;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use skyhook_core::actor::Actor;
use skyhook_core::client::{Build, BuildState, ProcessScale, ServiceInstance};
use skyhook_core::error::{ActionError, ApiErrorDetail, ClientError};
use skyhook_core::push::{
    Actuator, Event, HealthCheckSettings, PushOutcome, PushPlan, PushReceivers, PushSink,
    PushSource, RoutePlan, StepWarnings,
};
use skyhook_core::types::HealthCheckType;
use skyhook_core::warnings::Warned;

use support::{Call, FakeCloudController, application, build, route};

fn write_app(dir: &Path) {
    std::fs::write(dir.join("index.html"), "<html/>").unwrap();
    std::fs::create_dir_all(dir.join("lib")).unwrap();
    std::fs::write(dir.join("lib").join("app.js"), "console.log('hi')").unwrap();
}

async fn directory_plan(dir: &Path) -> skyhook_core::push::PushPlanBuilder {
    PushPlan::builder(
        "some-app",
        "space-guid",
        PushSource::Directory(dir.to_path_buf()),
    )
    .with_gathered_resources()
    .await
    .unwrap()
}

fn actuator(fake: &Arc<FakeCloudController>) -> Actuator {
    Actuator::new(Actor::new(fake.clone())).with_poll_interval(Duration::from_millis(1))
}

struct Run {
    reply: Warned<PushOutcome, ActionError>,
    events: Vec<Event>,
    step_warnings: Vec<StepWarnings>,
}

async fn run(actuator: &Actuator, plan: &PushPlan) -> Run {
    let (sink, receivers) = PushSink::channel();
    let reply = actuator
        .actualize(plan, &sink, &CancellationToken::new())
        .await;
    drop(sink);
    let (events, step_warnings) = drain(receivers);
    Run {
        reply,
        events,
        step_warnings,
    }
}

fn drain(mut receivers: PushReceivers) -> (Vec<Event>, Vec<StepWarnings>) {
    let mut events = Vec::new();
    while let Ok(event) = receivers.events.try_recv() {
        events.push(event);
    }
    let mut warnings = Vec::new();
    while let Ok(step) = receivers.warnings.try_recv() {
        warnings.push(step);
    }
    (events, warnings)
}

fn count(events: &[Event], event: Event) -> usize {
    events.iter().filter(|e| **e == event).count()
}

// =========================================================================
// Full pipeline
// =========================================================================

#[tokio::test]
async fn directory_push_emits_events_in_pipeline_order() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    let outcome = run.reply.result.unwrap();
    assert_eq!(outcome.application.guid, "app-guid");
    assert_eq!(outcome.package_guid.as_deref(), Some("package-guid"));
    assert_eq!(outcome.build_guid.as_deref(), Some("build-guid"));
    assert_eq!(outcome.droplet_guid, "droplet-guid");
    assert_eq!(
        run.events,
        vec![
            Event::SettingUpApplication,
            Event::CreatedApplication,
            Event::ResourceMatching,
            Event::CreatingPackage,
            Event::CreatingArchive,
            Event::UploadingApplication,
            Event::UploadWithArchiveComplete,
            Event::StartingStaging,
            Event::PollingBuild,
            Event::StagingComplete,
            Event::SettingDroplet,
            Event::SetDropletComplete,
            Event::Complete,
        ]
    );
    assert!(fake.calls().contains(&Call::SetApplicationDroplet {
        app_guid: "app-guid".to_string(),
        droplet_guid: "droplet-guid".to_string(),
    }));
}

#[tokio::test]
async fn matched_resources_are_sent_with_the_upload() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    let plan = directory_plan(tmp.path()).await.build();
    let cached = plan
        .resources()
        .iter()
        .find(|r| r.path == "index.html")
        .cloned()
        .unwrap();
    fake.resource_match.push_ok(vec![cached], &[]);

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert!(fake.calls().contains(&Call::ResourceMatch(vec![
        "index.html".to_string(),
        "lib/app.js".to_string(),
    ])));
    assert!(fake.calls().contains(&Call::UploadBitsPackage {
        package_guid: "package-guid".to_string(),
        matched: vec!["index.html".to_string()],
    }));
}

#[tokio::test]
async fn existing_application_without_changes_is_skipped() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_applications
        .push_ok(vec![application("some-app", "existing-guid")], &[]);
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    assert_eq!(run.reply.result.unwrap().application.guid, "existing-guid");
    assert_eq!(count(&run.events, Event::SkippingApplicationCreation), 1);
    assert_eq!(count(&run.events, Event::CreatedApplication), 0);
    assert_eq!(fake.count(|c| matches!(c, Call::CreateApplication(_))), 0);
}

#[tokio::test]
async fn existing_application_with_buildpacks_is_updated() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_applications
        .push_ok(vec![application("some-app", "existing-guid")], &[]);
    let plan = directory_plan(tmp.path())
        .await
        .with_buildpacks(vec!["nodejs_buildpack".to_string()])
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert_eq!(count(&run.events, Event::UpdatedApplication), 1);
    assert!(fake.calls().contains(&Call::UpdateApplication("existing-guid".to_string())));
}

// =========================================================================
// Upload retry
// =========================================================================

#[tokio::test]
async fn transient_upload_failure_is_retried_once() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.upload_bits_package.push_err(
        ClientError::Connection("connection reset by peer".to_string()),
        &["upload-warning"],
    );
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert_eq!(count(&run.events, Event::RetryUpload), 1);
    assert_eq!(run.events.last(), Some(&Event::Complete));
    assert_eq!(
        fake.count(|c| matches!(c, Call::UploadBitsPackage { .. })),
        2
    );
    assert_eq!(run.reply.warnings.as_slice(), ["upload-warning"]);
}

#[tokio::test]
async fn second_upload_failure_aborts_before_staging() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    let server_error = ClientError::Api {
        status: 502,
        errors: Vec::new(),
    };
    fake.upload_bits_package
        .push_err(server_error.clone(), &["first"]);
    fake.upload_bits_package
        .push_err(server_error.clone(), &["second"]);
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    assert_eq!(run.reply.result, Err(ActionError::Client(server_error)));
    assert_eq!(run.reply.warnings.as_slice(), ["first", "second"]);
    assert_eq!(count(&run.events, Event::RetryUpload), 1);
    assert_eq!(count(&run.events, Event::StartingStaging), 0);
    assert_eq!(count(&run.events, Event::Complete), 0);
    assert_eq!(fake.count(|c| matches!(c, Call::CreateBuild(_))), 0);
}

#[tokio::test]
async fn client_side_upload_failure_is_not_retried() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.upload_bits_package.push_err(
        ClientError::Api {
            status: 422,
            errors: vec![ApiErrorDetail {
                code: 10008,
                title: "CF-UnprocessableEntity".to_string(),
                detail: "Package is not in AWAITING_UPLOAD state".to_string(),
            }],
        },
        &[],
    );
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    let err = run.reply.result.unwrap_err();
    assert_eq!(err.to_string(), "Package is not in AWAITING_UPLOAD state");
    assert_eq!(count(&run.events, Event::RetryUpload), 0);
    assert_eq!(
        fake.count(|c| matches!(c, Call::UploadBitsPackage { .. })),
        1
    );
}

// =========================================================================
// Staging
// =========================================================================

#[tokio::test]
async fn polling_emits_one_event_per_iteration() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_build
        .push_ok(build("build-guid", BuildState::Staging), &[]);
    fake.get_build
        .push_ok(build("build-guid", BuildState::Staging), &[]);
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert_eq!(count(&run.events, Event::PollingBuild), 3);
    assert_eq!(count(&run.events, Event::StagingComplete), 1);
}

#[tokio::test]
async fn failed_build_reports_staging_error() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_build.push_ok(
        Build {
            guid: "build-guid".to_string(),
            state: BuildState::Failed,
            error: Some("StagingError - No buildpack detected".to_string()),
            droplet_guid: None,
        },
        &["staging-warning"],
    );
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    assert_eq!(
        run.reply.result,
        Err(ActionError::StagingFailed {
            reason: "StagingError - No buildpack detected".to_string()
        })
    );
    assert_eq!(count(&run.events, Event::SettingDroplet), 0);
    assert_eq!(
        run.step_warnings.last().map(|s| s.step),
        Some("staging")
    );
}

#[tokio::test]
async fn cancellation_interrupts_polling() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_build
        .push_ok(build("build-guid", BuildState::Staging), &[]);
    let plan = directory_plan(tmp.path()).await.build();
    let actuator =
        Actuator::new(Actor::new(fake.clone())).with_poll_interval(Duration::from_secs(3600));

    let (sink, mut receivers) = PushSink::channel();
    let cancel = CancellationToken::new();

    let (reply, ()) = tokio::join!(actuator.actualize(&plan, &sink, &cancel), async {
        while let Some(event) = receivers.events.recv().await {
            if event == Event::PollingBuild {
                cancel.cancel();
                break;
            }
        }
    });

    assert_eq!(reply.result, Err(ActionError::Cancelled));
    assert_eq!(fake.count(|c| matches!(c, Call::GetBuild(_))), 1);
    assert_eq!(
        fake.count(|c| matches!(c, Call::SetApplicationDroplet { .. })),
        0
    );
}

// =========================================================================
// Droplet sources
// =========================================================================

#[tokio::test]
async fn archive_push_reads_the_zip() {
    let tmp = TempDir::new().unwrap();
    let zip_path = tmp.path().join("app.zip");
    {
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("index.html", options).unwrap();
        zip.write_all(b"<html/>").unwrap();
        zip.finish().unwrap();
    }
    let fake = Arc::new(FakeCloudController::new());
    let plan = PushPlan::builder("some-app", "space-guid", PushSource::Archive(zip_path))
        .with_gathered_resources()
        .await
        .unwrap()
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    let upload: Vec<_> = run
        .events
        .iter()
        .skip_while(|e| **e != Event::CreatingPackage)
        .take(4)
        .copied()
        .collect();
    assert_eq!(
        upload,
        vec![
            Event::CreatingPackage,
            Event::ReadingArchive,
            Event::UploadingApplicationWithArchive,
            Event::UploadWithArchiveComplete,
        ]
    );
    assert!(fake.calls().contains(&Call::ResourceMatch(vec![
        "index.html".to_string()
    ])));
}

#[tokio::test]
async fn droplet_push_skips_matching_and_staging() {
    let tmp = TempDir::new().unwrap();
    let droplet = tmp.path().join("droplet.tgz");
    std::fs::write(&droplet, b"droplet-bits").unwrap();
    let fake = Arc::new(FakeCloudController::new());
    let plan = PushPlan::builder("some-app", "space-guid", PushSource::Droplet(droplet))
        .with_gathered_resources()
        .await
        .unwrap()
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert_eq!(
        run.events,
        vec![
            Event::SettingUpApplication,
            Event::CreatedApplication,
            Event::UploadingDroplet,
            Event::UploadDropletComplete,
            Event::SettingDroplet,
            Event::SetDropletComplete,
            Event::Complete,
        ]
    );
    assert!(fake.calls().contains(&Call::UploadDropletBits {
        droplet_guid: "droplet-guid".to_string(),
        size: 12,
    }));
}

// =========================================================================
// Services, routes, scale and health check
// =========================================================================

#[tokio::test]
async fn missing_service_instance_aborts() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_service_instances.push_ok(
        vec![ServiceInstance {
            guid: "db-guid".to_string(),
            name: "db".to_string(),
        }],
        &[],
    );
    let plan = directory_plan(tmp.path())
        .await
        .with_services(vec!["db".to_string(), "cache".to_string()])
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert_eq!(
        run.reply.result,
        Err(ActionError::ServiceInstanceNotFound {
            name: "cache".to_string()
        })
    );
    assert_eq!(count(&run.events, Event::ConfiguringServices), 1);
    assert_eq!(count(&run.events, Event::BoundServices), 0);
    assert_eq!(count(&run.events, Event::ResourceMatching), 0);
}

#[tokio::test]
async fn routes_are_created_and_mapped() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_routes.push_ok(Vec::new(), &[]);
    fake.get_routes
        .push_ok(vec![route("api-route-guid", "api", "example.com-guid")], &[]);
    fake.get_application_routes
        .push_ok(vec![route("api-route-guid", "api", "example.com-guid")], &[]);
    let plan = directory_plan(tmp.path())
        .await
        .with_routes(RoutePlan::Map(vec![
            "www.example.com".parse().unwrap(),
            "api.example.com".parse().unwrap(),
        ]))
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    let tail: Vec<_> = run
        .events
        .iter()
        .skip_while(|e| **e != Event::CreatingAndMappingRoutes)
        .copied()
        .collect();
    assert_eq!(
        tail,
        vec![
            Event::CreatingAndMappingRoutes,
            Event::CreatedRoutes,
            Event::BoundRoutes,
            Event::Complete,
        ]
    );
    assert_eq!(fake.count(|c| matches!(c, Call::CreateRoute { .. })), 1);
    assert_eq!(
        fake.count(|c| matches!(c, Call::MapRoute { .. })),
        1,
        "already mapped routes are left alone"
    );
}

#[tokio::test]
async fn unknown_domain_aborts_routes() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_domains.push_ok(Vec::new(), &[]);
    let plan = directory_plan(tmp.path())
        .await
        .with_routes(RoutePlan::Map(vec!["www.missing.io".parse().unwrap()]))
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert_eq!(
        run.reply.result,
        Err(ActionError::DomainNotFound {
            name: "missing.io".to_string()
        })
    );
}

#[tokio::test]
async fn unmap_all_removes_current_routes() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_application_routes.push_ok(
        vec![
            route("route-1", "www", "domain-guid"),
            route("route-2", "api", "domain-guid"),
        ],
        &[],
    );
    let plan = directory_plan(tmp.path())
        .await
        .with_routes(RoutePlan::UnmapAll)
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert_eq!(count(&run.events, Event::UnmappingRoutes), 1);
    assert_eq!(fake.count(|c| matches!(c, Call::UnmapRoute { .. })), 2);
}

#[tokio::test]
async fn scale_and_health_check_target_web_process() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    let scale = ProcessScale {
        instances: Some(3),
        memory_in_mb: Some(256),
        disk_in_mb: None,
    };
    let plan = directory_plan(tmp.path())
        .await
        .with_scale(scale)
        .with_health_check(HealthCheckSettings {
            health_check_type: HealthCheckType::Port,
            endpoint: "/".to_string(),
            invocation_timeout: 0,
        })
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    let tail: Vec<_> = run
        .events
        .iter()
        .skip_while(|e| **e != Event::ScaleWebProcess)
        .copied()
        .collect();
    assert_eq!(
        tail,
        vec![
            Event::ScaleWebProcess,
            Event::ScaleWebProcessComplete,
            Event::SetHealthCheck,
            Event::SetHealthCheckComplete,
            Event::Complete,
        ]
    );
    assert!(fake.calls().contains(&Call::ScaleProcess {
        app_guid: "app-guid".to_string(),
        process_type: "web".to_string(),
        scale,
    }));
    assert!(fake.calls().contains(&Call::PatchHealthCheck {
        process_guid: "web-process-guid".to_string(),
        health_check_type: HealthCheckType::Port,
        endpoint: String::new(),
        invocation_timeout: 0,
    }));
}

#[tokio::test]
async fn invalid_health_check_is_rejected_before_any_call() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    let plan = directory_plan(tmp.path())
        .await
        .with_health_check(HealthCheckSettings {
            health_check_type: HealthCheckType::Port,
            endpoint: "/health".to_string(),
            invocation_timeout: 0,
        })
        .build();

    let run = run(&actuator(&fake), &plan).await;

    assert_eq!(run.reply.result, Err(ActionError::HttpHealthCheckInvalid));
    assert!(run.reply.warnings.is_empty());
    assert!(run.events.is_empty());
    assert!(fake.calls().is_empty());
}

// =========================================================================
// Warnings
// =========================================================================

#[tokio::test]
async fn warnings_are_reported_per_step_and_concatenated() {
    let tmp = TempDir::new().unwrap();
    write_app(tmp.path());
    let fake = Arc::new(FakeCloudController::new());
    fake.get_applications.push_ok(Vec::new(), &["lookup-warning"]);
    fake.create_application
        .push_ok(application("some-app", "app-guid"), &["create-warning"]);
    fake.create_build
        .push_ok(build("build-guid", BuildState::Staging), &["build-warning"]);
    let plan = directory_plan(tmp.path()).await.build();

    let run = run(&actuator(&fake), &plan).await;

    assert!(run.reply.result.is_ok());
    assert_eq!(
        run.reply.warnings.as_slice(),
        ["lookup-warning", "create-warning", "build-warning"]
    );
    let steps: Vec<_> = run.step_warnings.iter().map(|s| s.step).collect();
    assert_eq!(steps, ["application", "staging"]);
    assert_eq!(
        run.step_warnings[0].warnings.as_slice(),
        ["lookup-warning", "create-warning"]
    );
}
