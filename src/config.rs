//! Configuration management

use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Geocoding backend: "mock" or "tomtom"
    pub geocoder_provider: String,

    /// TomTom API key, required when the provider is "tomtom"
    pub tomtom_api_key: Option<String>,

    /// TomTom API base URL
    pub tomtom_base_url: String,

    /// Country appended to every geocoding query
    pub geocode_country: String,

    /// Directory the rolling log file is written to
    pub log_dir: String,

    /// Wall-clock budget for a single solve round
    pub solver_time_budget: Duration,

    /// Upper bound on solve rounds per planning run
    pub max_rounds: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let geocoder_provider = std::env::var("GEOCODER_PROVIDER")
            .unwrap_or_else(|_| "mock".to_string())
            .to_lowercase();

        let tomtom_api_key = std::env::var("TOMTOM_API_KEY").ok();

        let tomtom_base_url = std::env::var("TOMTOM_BASE_URL")
            .unwrap_or_else(|_| "https://api.tomtom.com".to_string());

        let geocode_country = std::env::var("GEOCODE_COUNTRY")
            .unwrap_or_else(|_| "PORTUGAL".to_string());

        let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());

        let budget_secs: u64 = std::env::var("SOLVER_TIME_BUDGET_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("SOLVER_TIME_BUDGET_SECS must be a whole number of seconds")?;

        let max_rounds: u32 = std::env::var("MAX_ROUNDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("MAX_ROUNDS must be a whole number")?;

        Ok(Self {
            database_url,
            geocoder_provider,
            tomtom_api_key,
            tomtom_base_url,
            geocode_country,
            log_dir,
            solver_time_budget: Duration::from_secs(budget_secs),
            max_rounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults_when_only_database_url_is_set() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::remove_var("GEOCODER_PROVIDER");
        std::env::remove_var("SOLVER_TIME_BUDGET_SECS");
        std::env::remove_var("MAX_ROUNDS");

        let config = Config::from_env().unwrap();
        assert_eq!(config.geocoder_provider, "mock");
        assert_eq!(config.tomtom_base_url, "https://api.tomtom.com");
        assert_eq!(config.geocode_country, "PORTUGAL");
        assert_eq!(config.solver_time_budget, Duration::from_secs(60));
        assert_eq!(config.max_rounds, 10);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_provider_is_lowercased() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("GEOCODER_PROVIDER", "TomTom");

        let config = Config::from_env().unwrap();
        assert_eq!(config.geocoder_provider, "tomtom");

        // Cleanup
        std::env::remove_var("GEOCODER_PROVIDER");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_rejects_non_numeric_budget() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("SOLVER_TIME_BUDGET_SECS", "soon");

        assert!(Config::from_env().is_err());

        // Cleanup
        std::env::remove_var("SOLVER_TIME_BUDGET_SECS");
    }
}
