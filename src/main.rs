//! Carhaul Planner - daily route planning worker for car-carrier fleets
//!
//! Loads the day's transport services and trailer fleet, solves routes
//! in capacity-bounded rounds and stores the result.

mod cli;
mod config;
mod db;
mod services;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use services::geocoding::create_geocoder;
use services::planner::{plan_day, warm_day_coordinates, PlanRequest};
use services::solver::{InsertionSearch, RouteSearch};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOG_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "planner.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,carhaul_planner=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();

    info!("Starting Carhaul Planner...");

    // Load configuration
    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    // Run migrations
    db::run_migrations(&pool).await?;
    info!("Database migrations complete");

    match cli.command {
        Command::Migrate => {
            // migrations already ran above
            info!("Migrations applied, exiting");
        }
        Command::WarmCoords { day } => {
            let geocoder = create_geocoder(&config)?;
            let resolved = warm_day_coordinates(&pool, geocoder.as_ref(), day).await?;
            info!(day = %day, resolved, "Coordinate warm-up complete");
        }
        Command::Plan { day, registry, restricted_categories, rounds, time_budget, dry_run } => {
            let geocoder = create_geocoder(&config)?;
            let solver: Arc<dyn RouteSearch> = Arc::new(InsertionSearch::new());
            let request = PlanRequest {
                day,
                registry_filter: registry,
                restricted: restricted_categories,
                max_rounds: rounds.unwrap_or(config.max_rounds),
                time_budget: time_budget
                    .map(Duration::from_secs)
                    .unwrap_or(config.solver_time_budget),
                dry_run,
            };
            let outcome = plan_day(&pool, geocoder.as_ref(), solver, &request).await?;
            info!(
                day = %outcome.day,
                routes = outcome.routes.len(),
                planned = outcome.planned_services,
                pending = outcome.pending.len(),
                "Planner finished"
            );
        }
    }

    Ok(())
}
