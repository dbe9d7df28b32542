use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::scheduler::memory::MemoryParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
}

/// Connection settings for the Postgres-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    /// Load from the environment, reading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .map(|value| value.parse::<u32>())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS"))?
            .unwrap_or(10);

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .map(|value| value.parse::<u64>())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("DB_ACQUIRE_TIMEOUT_SECS"))?
            .unwrap_or(5);

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }
}

/// Scheduling policy knobs. The defaults are usable as-is; deployments
/// override via the environment or by constructing the struct directly.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Weight vector of the memory model.
    pub params: MemoryParams,
    /// Target recall probability used to derive review intervals.
    pub desired_retention: f64,
    /// Minute intervals for the Learning steps; a card graduates to
    /// Review after passing each step once.
    pub learning_steps_minutes: Vec<i64>,
    /// Minute intervals for the Relearning steps after a lapse.
    pub relearning_steps_minutes: Vec<i64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            params: MemoryParams::default(),
            desired_retention: 0.9,
            learning_steps_minutes: vec![1, 10],
            relearning_steps_minutes: vec![10],
        }
    }
}

impl SchedulerConfig {
    /// Load from the environment, falling back to defaults per field.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let desired_retention = env::var("DESIRED_RETENTION")
            .ok()
            .map(|value| value.parse::<f64>())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("DESIRED_RETENTION"))?
            .unwrap_or(defaults.desired_retention);
        if !(0.0..1.0).contains(&desired_retention) {
            return Err(ConfigError::InvalidValue("DESIRED_RETENTION"));
        }

        let learning_steps_minutes = match env::var("LEARNING_STEPS_MINUTES") {
            Ok(raw) => parse_steps(&raw).ok_or(ConfigError::InvalidValue("LEARNING_STEPS_MINUTES"))?,
            Err(_) => defaults.learning_steps_minutes,
        };

        let relearning_steps_minutes = match env::var("RELEARNING_STEPS_MINUTES") {
            Ok(raw) => {
                parse_steps(&raw).ok_or(ConfigError::InvalidValue("RELEARNING_STEPS_MINUTES"))?
            }
            Err(_) => defaults.relearning_steps_minutes,
        };

        Ok(Self {
            params: defaults.params,
            desired_retention,
            learning_steps_minutes,
            relearning_steps_minutes,
        })
    }
}

/// Parse a comma-separated minute list, e.g. `"1,10"`. Empty or
/// non-positive entries are rejected.
fn parse_steps(raw: &str) -> Option<Vec<i64>> {
    let steps: Vec<i64> = raw
        .split(',')
        .map(|part| part.trim().parse::<i64>().ok())
        .collect::<Option<_>>()?;
    if steps.is_empty() || steps.iter().any(|&minutes| minutes <= 0) {
        return None;
    }
    Some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_steps_accepts_comma_list() {
        assert_eq!(parse_steps("1,10"), Some(vec![1, 10]));
        assert_eq!(parse_steps(" 5 , 25 "), Some(vec![5, 25]));
    }

    #[test]
    fn parse_steps_rejects_garbage() {
        assert_eq!(parse_steps(""), None);
        assert_eq!(parse_steps("1,x"), None);
        assert_eq!(parse_steps("0"), None);
        assert_eq!(parse_steps("-5,10"), None);
    }

    #[test]
    fn scheduler_defaults_are_sane() {
        let config = SchedulerConfig::default();
        assert_eq!(config.desired_retention, 0.9);
        assert_eq!(config.learning_steps_minutes.len(), 2);
        assert_eq!(config.relearning_steps_minutes.len(), 1);
    }
}
