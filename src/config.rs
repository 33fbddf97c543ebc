use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const STEP_DELAY_VAR: &str = "QTUTOR_STEP_DELAY_MS";
pub const SIM_LATENCY_VAR: &str = "QTUTOR_SIM_LATENCY_MS";
pub const SIM_CMD_VAR: &str = "QTUTOR_SIM_CMD";
pub const TUTOR_CMD_VAR: &str = "QTUTOR_TUTOR_CMD";
pub const RUN_ON_START_VAR: &str = "QTUTOR_RUN_ON_START";
pub const LOG_FILE_VAR: &str = "QTUTOR_LOG_FILE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Delay between two columns of the run scan.
    pub step_delay: Duration,
    /// Extra latency of the built-in simulator.
    pub simulator_latency: Duration,
    /// External simulation oracle command; the built-in simulator when unset.
    pub sim_command: Option<String>,
    /// External conversation oracle command; the built-in tutor when unset.
    pub tutor_command: Option<String>,
    pub run_on_start: bool,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(300),
            simulator_latency: Duration::ZERO,
            sim_command: None,
            tutor_command: None,
            run_on_start: true,
            log_file: PathBuf::from("q-tutor.log"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, falling back to defaults for
    /// unset or blank variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(v) = get(STEP_DELAY_VAR) {
            config.step_delay = parse_millis(STEP_DELAY_VAR, &v)?;
        }
        if let Some(v) = get(SIM_LATENCY_VAR) {
            config.simulator_latency = parse_millis(SIM_LATENCY_VAR, &v)?;
        }
        config.sim_command = get(SIM_CMD_VAR);
        config.tutor_command = get(TUTOR_CMD_VAR);
        if let Some(v) = get(RUN_ON_START_VAR) {
            config.run_on_start = parse_bool(RUN_ON_START_VAR, &v)?;
        }
        if let Some(v) = get(LOG_FILE_VAR) {
            config.log_file = PathBuf::from(v);
        }

        Ok(config)
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
