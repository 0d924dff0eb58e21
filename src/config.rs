use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

use crate::counter::CounterPolicy;
use crate::error::ConfigError;

/// Largest tooth count whose revolution threshold (`4 × teeth`) fits in `i32`.
pub const MAX_TEETH: u32 = (i32::MAX / 4) as u32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mode {
    FreeRun,
    TickLimited { tick_limit: u32 },
}

impl Default for Mode {
    fn default() -> Self {
        Mode::FreeRun
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub number_of_teeth: u32,
    pub quarter_period_ms: u32,
    pub mode: Mode,
    // Off by default: tick-limited mode is tracked but never stops the encoder
    pub enforce_tick_limit: bool,
    pub counter_policy: CounterPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            number_of_teeth: 25,
            quarter_period_ms: 10,
            mode: Mode::FreeRun,
            enforce_tick_limit: false,
            counter_policy: CounterPolicy::Wrapping,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_teeth(self.number_of_teeth)?;
        validate_quarter_period(self.quarter_period_ms)?;
        validate_mode(self.mode)
    }

    /// Transitions per revolution.
    pub fn threshold(&self) -> i32 {
        4 * self.number_of_teeth as i32
    }

    /// `1000 / (quarter period × 4 × teeth)`, revolutions per second.
    pub fn revolutions_per_second(&self) -> f64 {
        1000.0 / (f64::from(self.quarter_period_ms) * 4.0 * f64::from(self.number_of_teeth))
    }
}

pub(crate) fn validate_teeth(teeth: u32) -> Result<(), ConfigError> {
    match teeth {
        0 => Err(ConfigError::ZeroTeeth),
        t if t > MAX_TEETH => Err(ConfigError::TooManyTeeth(t)),
        _ => Ok(()),
    }
}

pub(crate) fn validate_quarter_period(quarter_period_ms: u32) -> Result<(), ConfigError> {
    if quarter_period_ms == 0 {
        return Err(ConfigError::ZeroQuarterPeriod);
    }
    Ok(())
}

pub(crate) fn validate_mode(mode: Mode) -> Result<(), ConfigError> {
    match mode {
        Mode::TickLimited { tick_limit: 0 } => Err(ConfigError::ZeroTickLimit),
        _ => Ok(()),
    }
}

/// Settings of the host binary, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub pin_a: u64,
    pub pin_b: u64,
    pub gpio_enabled: bool,
    pub poll_interval_ms: u64,
    pub bind: String,
    pub log_dir: String,
    pub simulation: SimulationConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            pin_a: 13,
            pin_b: 27,
            gpio_enabled: false,
            poll_interval_ms: 1,
            bind: "127.0.0.1:8080".to_string(),
            log_dir: "log".to_string(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn load_from_path(path: &str) -> Result<HostConfig> {
        let f = File::open(path).with_context(|| format!("could not open {}", path))?;
        let reader = BufReader::new(f);
        let config: HostConfig =
            serde_json::from_reader(reader).with_context(|| format!("could not parse {}", path))?;
        config.simulation.validate()?;
        Ok(config)
    }

    pub fn write_to_path(&self, path: &str) -> Result<()> {
        let f = File::create(path)?;
        serde_json::to_writer_pretty(&f, self)?;
        Ok(())
    }
}
