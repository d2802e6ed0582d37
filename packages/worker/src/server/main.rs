// Main entry point for the question generation worker

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worker_core::domains::generation::GenerationPass;
use worker_core::kernel::{scheduled_tasks, GenerationRateLimiter, OpenAIGenerator, WorkerDeps};
use worker_core::{server::build_app, Config};

#[derive(Parser)]
#[command(name = "worker", about = "Question generation worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP trigger and run the schedule (default)
    Serve,
    /// Run a single generation pass, print its summary and exit
    RunOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let ai = OpenAIGenerator::from_config(&config)?;
    let rate_limiter = GenerationRateLimiter::per_minute(
        config.generation_requests_per_minute,
        config.generation_burst,
    )?;
    let deps = WorkerDeps::postgres(pool.clone(), Arc::new(ai), rate_limiter);
    let pass = Arc::new(
        GenerationPass::new(deps, config.generation.clone())
            .context("Invalid generation settings")?,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::RunOnce => {
            let summary = pass.run().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Serve => serve(config, pool, pass).await,
    }
}

async fn serve(config: Config, pool: sqlx::PgPool, pass: Arc<GenerationPass>) -> Result<()> {
    let _scheduler = if config.scheduler_enabled {
        Some(
            scheduled_tasks::start_scheduler(pass.clone(), &config.schedule_cron)
                .await
                .context("Failed to start scheduler")?,
        )
    } else {
        tracing::info!("Scheduler disabled, passes run only on /run");
        None
    };

    let app = build_app(pool, pass);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Trigger: http://localhost:{}/run", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,worker_core=debug,sqlx=warn".into());

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
