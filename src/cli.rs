//! CLI argument parsing for the carhaul-planner binary.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "carhaul-planner",
    about = "Daily route planner for car-carrier trailer fleets",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Plan routes for one day and store them
    Plan {
        /// Planning day, YYYY-MM-DD
        #[arg(long)]
        day: NaiveDate,

        /// Restrict the run to these trailer registries (repeatable)
        #[arg(long = "registry")]
        registry: Vec<String>,

        /// Plan only the restricted categories, through base pickups
        #[arg(long)]
        restricted_categories: bool,

        /// Override the configured round cap
        #[arg(long)]
        rounds: Option<u32>,

        /// Override the configured per-round solve budget, in seconds
        #[arg(long)]
        time_budget: Option<u64>,

        /// Solve and report without writing routes
        #[arg(long)]
        dry_run: bool,
    },
    /// Geocode and cache every city a day's plan would touch
    WarmCoords {
        /// Planning day, YYYY-MM-DD
        #[arg(long)]
        day: NaiveDate,
    },
    /// Run database migrations and exit
    Migrate,
}
