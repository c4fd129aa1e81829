//! Configuration management for the insert node
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Simulated network latency per insert step, in milliseconds
    pub insert_latency_ms: u64,

    /// Probability in [0, 1] that a simulated insert fails
    pub failure_rate: f64,

    /// Largest payload the simulated node accepts
    pub max_insert_bytes: usize,

    /// How long a batch waits for its inserts to settle
    pub timeout_secs: u64,

    /// How often a batch checks on its inserts, in milliseconds
    pub poll_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            insert_latency_ms: parse_var(&var, "INSERT_LATENCY_MS", 250)?,
            failure_rate: parse_var(&var, "INSERT_FAILURE_RATE", 0.0)?,
            max_insert_bytes: parse_var(&var, "INSERT_MAX_BYTES", 20_000_000)?,
            timeout_secs: parse_var(&var, "INSERT_TIMEOUT_SECS", 30)?,
            poll_interval_ms: parse_var(&var, "INSERT_POLL_INTERVAL_MS", 50)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            anyhow::bail!("INSERT_FAILURE_RATE must be between 0 and 1");
        }

        if self.timeout_secs == 0 {
            anyhow::bail!("INSERT_TIMEOUT_SECS must be greater than 0");
        }

        if self.poll_interval_ms == 0 {
            anyhow::bail!("INSERT_POLL_INTERVAL_MS must be greater than 0");
        }

        Ok(())
    }

    pub fn insert_latency(&self) -> Duration {
        Duration::from_millis(self.insert_latency_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            insert_latency_ms: 250,
            failure_rate: 0.0,
            max_insert_bytes: 20_000_000,
            timeout_secs: 30,
            poll_interval_ms: 50,
        }
    }
}

fn parse_var<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}
