//! Skyhook - application push and health check client
//!
//! Usage:
//!   skyhook push my-app --path ./build           # Push a directory
//!   skyhook get-health-check my-app               # Show process health checks
//!   skyhook set-health-check my-app http --endpoint /health
//!   skyhook router-groups default-tcp             # Look up a router group
//!   skyhook create-shared-domain tcp.example.com --router-group default-tcp

mod render;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skyhook_core::actor::ProcessHealthChecks;
use skyhook_core::client::ProcessScale;
use skyhook_core::config::{ConfigStore, SkyhookConfig};
use skyhook_core::context::AppContext;
use skyhook_core::push::{
    HealthCheckSettings, PushPlan, PushSink, PushSource, RoutePlan, RouteSpec,
};
use skyhook_core::types::{HealthCheckType, PROCESS_TYPE_WEB};

use crate::render::Renderer;

#[derive(Parser)]
#[command(name = "skyhook")]
#[command(about = "Push applications and manage process health checks", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to skyhook.toml (defaults to the user config directory)
    #[arg(long, global = true, env = "SKYHOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Cloud Controller URL, overrides api_endpoint
    #[arg(long, global = true, env = "SKYHOOK_API")]
    api: Option<String>,

    /// Bearer token, overrides access_token
    #[arg(long, global = true, env = "SKYHOOK_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Target space, overrides space_guid
    #[arg(long, global = true, env = "SKYHOOK_SPACE_GUID")]
    space_guid: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    skip_ssl_validation: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Push an application from a directory, zip archive or droplet
    Push(Box<PushArgs>),

    /// Show the health check of every process of an application
    GetHealthCheck {
        /// Application name
        app: String,
    },

    /// Change the health check of one process
    SetHealthCheck {
        /// Application name
        app: String,
        /// Health check type (port, process, http)
        health_check_type: HealthCheckType,
        /// HTTP endpoint, only valid for the http type
        #[arg(long, default_value = "/")]
        endpoint: String,
        /// Process type to change
        #[arg(long, default_value = PROCESS_TYPE_WEB)]
        process: String,
        /// Seconds to wait for a single check; 0 keeps the platform default
        #[arg(long, default_value_t = 0)]
        invocation_timeout: u64,
    },

    /// Look up a router group by name
    RouterGroups {
        /// Router group name
        name: String,
    },

    /// Create a domain shared by all organizations
    CreateSharedDomain {
        /// Domain name
        domain: String,
        /// Router group for TCP routes
        #[arg(long)]
        router_group: Option<String>,
        /// Only reachable from inside the platform
        #[arg(long)]
        internal: bool,
    },
}

#[derive(Args)]
struct PushArgs {
    /// Application name
    app: String,
    /// Directory to upload (default: current directory)
    #[arg(long, short, conflicts_with_all = ["archive", "droplet"])]
    path: Option<PathBuf>,
    /// Zip archive to upload
    #[arg(long, conflicts_with = "droplet")]
    archive: Option<PathBuf>,
    /// Prebuilt droplet to upload; staging is skipped
    #[arg(long)]
    droplet: Option<PathBuf>,
    /// Buildpack to stage with (repeatable)
    #[arg(long = "buildpack", short = 'b', value_name = "NAME")]
    buildpacks: Vec<String>,
    /// Stack to stage on
    #[arg(long, short = 's')]
    stack: Option<String>,
    /// Web process instance count
    #[arg(long, short = 'i')]
    instances: Option<u32>,
    /// Web process memory in MB
    #[arg(long, short = 'm')]
    memory: Option<u64>,
    /// Web process disk in MB
    #[arg(long, short = 'k')]
    disk: Option<u64>,
    /// Web process health check type (port, process, http)
    #[arg(long, short = 'u')]
    health_check_type: Option<HealthCheckType>,
    /// Health check HTTP endpoint
    #[arg(long, requires = "health_check_type")]
    endpoint: Option<String>,
    /// Health check invocation timeout in seconds
    #[arg(long, requires = "health_check_type")]
    invocation_timeout: Option<u64>,
    /// Route to map, as host.domain[/path] (repeatable)
    #[arg(long = "route", value_name = "ROUTE", conflicts_with = "no_route")]
    routes: Vec<RouteSpec>,
    /// Unmap every route of the application
    #[arg(long)]
    no_route: bool,
    /// Service instance to bind (repeatable)
    #[arg(long = "service", value_name = "NAME")]
    services: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyhook=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::new(load_config(&cli.global)?);

    match cli.command {
        Commands::Push(args) => run_push(&ctx, *args).await,
        Commands::GetHealthCheck { app } => run_get_health_check(&ctx, &app).await,
        Commands::SetHealthCheck {
            app,
            health_check_type,
            endpoint,
            process,
            invocation_timeout,
        } => {
            run_set_health_check(
                &ctx,
                &app,
                &process,
                health_check_type,
                &endpoint,
                invocation_timeout,
            )
            .await
        }
        Commands::RouterGroups { name } => run_router_groups(&ctx, &name).await,
        Commands::CreateSharedDomain {
            domain,
            router_group,
            internal,
        } => run_create_shared_domain(&ctx, &domain, router_group.as_deref(), internal).await,
    }
}

/// Load skyhook.toml and apply command-line overrides.
fn load_config(args: &GlobalArgs) -> Result<SkyhookConfig> {
    let store = match &args.config {
        Some(path) => ConfigStore::from_path(path.clone()),
        None => ConfigStore::from_default_dir()?,
    };
    let mut config = store.load()?;

    if let Some(api) = &args.api {
        config.api_endpoint = Some(
            api.parse()
                .with_context(|| format!("Invalid API endpoint: {}", api))?,
        );
    }
    if let Some(token) = &args.access_token {
        config.access_token = Some(token.clone());
    }
    if let Some(space) = &args.space_guid {
        config.space_guid = Some(space.clone());
    }
    if args.skip_ssl_validation {
        config.skip_ssl_validation = true;
    }

    config.validate()?;
    Ok(config)
}

fn push_source(args: &PushArgs) -> PushSource {
    if let Some(droplet) = &args.droplet {
        PushSource::Droplet(droplet.clone())
    } else if let Some(archive) = &args.archive {
        PushSource::Archive(archive.clone())
    } else {
        PushSource::Directory(args.path.clone().unwrap_or_else(|| PathBuf::from(".")))
    }
}

async fn build_plan(args: PushArgs, space_guid: &str) -> Result<PushPlan> {
    let source = push_source(&args);
    let mut builder = PushPlan::builder(&args.app, space_guid, source)
        .with_buildpacks(args.buildpacks)
        .with_services(args.services)
        .with_scale(ProcessScale {
            instances: args.instances,
            memory_in_mb: args.memory,
            disk_in_mb: args.disk,
        });

    if let Some(stack) = args.stack {
        builder = builder.with_stack(stack);
    }
    if let Some(health_check_type) = args.health_check_type {
        builder = builder.with_health_check(HealthCheckSettings {
            health_check_type,
            endpoint: args.endpoint.unwrap_or_default(),
            invocation_timeout: args.invocation_timeout.unwrap_or_default(),
        });
    }
    if args.no_route {
        builder = builder.with_routes(RoutePlan::UnmapAll);
    } else if !args.routes.is_empty() {
        builder = builder.with_routes(RoutePlan::Map(args.routes));
    }

    let builder = builder
        .with_gathered_resources()
        .await
        .context("Failed to read application files")?;
    Ok(builder.build())
}

async fn run_push(ctx: &AppContext, args: PushArgs) -> Result<()> {
    let space_guid = ctx.space_guid()?.to_string();
    let app_name = args.app.clone();
    let actuator = ctx.actuator()?;
    let plan = build_plan(args, &space_guid).await?;

    println!(
        "Pushing {} from {}",
        console::style(&app_name).bold(),
        plan.source().path().display()
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling push");
            interrupt.cancel();
        }
    });

    let (sink, receivers) = PushSink::channel();
    let progress = tokio::spawn(async move {
        let mut renderer = Renderer::new(io::stdout());
        render::drain(&mut renderer, receivers, &app_name).await
    });

    let reply = actuator.actualize(&plan, &sink, &cancel).await;
    drop(sink);
    progress.await.context("Progress output task failed")??;

    let mut renderer = Renderer::new(io::stdout());
    match reply.result {
        Ok(outcome) => renderer.push_outcome(&outcome),
        Err(err) => {
            renderer.failure(&format!("Push of {} failed", plan.application().name))?;
            Err(err.into())
        }
    }
}

async fn run_get_health_check(ctx: &AppContext, app: &str) -> Result<()> {
    let space_guid = ctx.space_guid()?;
    let actor = ctx.actor()?;

    println!("Getting health check type for app {}", console::style(app).bold());
    let reply = actor
        .get_application_process_health_checks_by_name_and_space(app, space_guid)
        .await;

    let mut renderer = Renderer::new(io::stdout());
    renderer.warnings(&reply.warnings)?;
    let mut checks = ProcessHealthChecks::from(reply.result?);
    checks.sort();
    renderer.health_checks(&checks)
}

async fn run_set_health_check(
    ctx: &AppContext,
    app: &str,
    process: &str,
    health_check_type: HealthCheckType,
    endpoint: &str,
    invocation_timeout: u64,
) -> Result<()> {
    let space_guid = ctx.space_guid()?;
    let actor = ctx.actor()?;
    let mut renderer = Renderer::new(io::stdout());

    println!(
        "Updating health check type for app {} process {}",
        console::style(app).bold(),
        console::style(process).bold()
    );

    let lookup = actor.get_application_by_name_and_space(app, space_guid).await;
    renderer.warnings(&lookup.warnings)?;
    let application = lookup.result?;

    let reply = actor
        .set_process_health_check_by_process_type_and_application(
            process,
            &application.guid,
            health_check_type,
            endpoint,
            invocation_timeout,
        )
        .await;
    renderer.warnings(&reply.warnings)?;
    reply.result?;

    renderer.success("OK")
}

async fn run_router_groups(ctx: &AppContext, name: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let router = ctx.router_client()?;

    let group = actor.get_router_group_by_name(name, router.as_ref()).await?;
    Renderer::new(io::stdout()).router_group(&group)
}

async fn run_create_shared_domain(
    ctx: &AppContext,
    domain: &str,
    router_group: Option<&str>,
    internal: bool,
) -> Result<()> {
    let actor = ctx.actor()?;
    let router = ctx.router_client()?;

    println!("Creating shared domain {}", console::style(domain).bold());
    let reply = actor
        .create_shared_domain(domain, router_group, internal, router.as_ref())
        .await;

    let mut renderer = Renderer::new(io::stdout());
    renderer.warnings(&reply.warnings)?;
    reply.result?;
    renderer.success("OK")
}
