use crate::error::{Result, SensorError};
use crate::hal::MAX_DUTY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sensor: SensorConfig,
    pub led: LedConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// GPIO line offset of the motion detector output.
    pub line: u32,
    /// Capacity of the edge queue between the line and the engine.
    pub queue_depth: usize,
    /// Initial unoccupied delay, until the controller writes a new one.
    pub unoccupied_delay_secs: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedConfig {
    /// GPIO line offset of the indicator LED.
    pub line: u32,
    /// Ambient duty level (10-bit resolution).
    pub dim_duty: u16,
    /// Alert duty level (10-bit resolution).
    pub bright_duty: u16,
    pub blink_period_ms: u64,
    pub blink_cycles: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds between simulated motion bursts.
    pub burst_interval_secs: u64,
    /// How long the simulated raw signal stays high per burst.
    pub hold_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                line: 4,
                queue_depth: 10,
                unoccupied_delay_secs: 900,
            },
            led: LedConfig {
                line: 5,
                dim_duty: 102,
                bright_duty: 1023,
                blink_period_ms: 150,
                blink_cycles: 3,
            },
            simulation: SimulationConfig {
                burst_interval_secs: 30,
                hold_secs: 2,
            },
        }
    }
}

impl Config {
    /// Default config file location under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("presence-sensor").join("config.json"))
    }

    /// Load configuration: file if present, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(line) = std::env::var("PIR_LINE")
            && let Ok(l) = line.parse()
        {
            self.sensor.line = l;
        }
        if let Ok(depth) = std::env::var("PIR_QUEUE_DEPTH")
            && let Ok(d) = depth.parse()
        {
            self.sensor.queue_depth = d;
        }
        if let Ok(delay) = std::env::var("UNOCCUPIED_DELAY_SECS")
            && let Ok(d) = delay.parse()
        {
            self.sensor.unoccupied_delay_secs = d;
        }
        if let Ok(line) = std::env::var("LED_LINE")
            && let Ok(l) = line.parse()
        {
            self.led.line = l;
        }
        if let Ok(interval) = std::env::var("SIM_BURST_INTERVAL_SECS")
            && let Ok(i) = interval.parse()
        {
            self.simulation.burst_interval_secs = i;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sensor.queue_depth == 0 {
            return Err(SensorError::InvalidConfig(
                "sensor.queue_depth must be at least 1".to_string(),
            ));
        }
        if self.led.bright_duty > MAX_DUTY {
            return Err(SensorError::InvalidConfig(format!(
                "led.bright_duty {} exceeds the {}-step duty range",
                self.led.bright_duty, MAX_DUTY
            )));
        }
        if self.led.dim_duty >= self.led.bright_duty {
            return Err(SensorError::InvalidConfig(
                "led.dim_duty must be below led.bright_duty".to_string(),
            ));
        }
        if self.led.blink_period_ms == 0 || self.led.blink_cycles == 0 {
            return Err(SensorError::InvalidConfig(
                "led.blink_period_ms and led.blink_cycles must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensor.queue_depth, 10);
        assert_eq!(config.sensor.unoccupied_delay_secs, 900);
        assert_eq!(config.led.blink_cycles, 3);
    }

    #[test]
    fn test_rejects_inverted_duty_levels() {
        let mut config = Config::default();
        config.led.dim_duty = 1023;
        assert!(matches!(
            config.validate(),
            Err(SensorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_queue_depth() {
        let mut config = Config::default();
        config.sensor.queue_depth = 0;
        assert!(config.validate().is_err());
    }
}
