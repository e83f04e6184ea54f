// src/config.rs
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signal::{StreamError, SynthSettings};
use crate::types::CHANNEL_COUNT;

/// Everything the engine needs at construction. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub channel_count: usize,
    pub buffer_len: usize,
    pub tick_period_ms: u64,
    pub samples_per_tick: usize,
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub spike_probability: f64,
    pub spike_gain: f64,
    pub fill_noise_std: f64,
    pub step_noise_std: f64,
    /// Bounded wait for the scheduler thread to exit on stop.
    pub stop_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_count: CHANNEL_COUNT,
            buffer_len: 500,
            tick_period_ms: 100,
            samples_per_tick: 5,
            seed: None,
            spike_probability: 0.2,
            spike_gain: 1.2,
            fill_noise_std: 0.03,
            step_noise_std: 0.05,
            stop_timeout_ms: 500,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, StreamError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.channel_count != CHANNEL_COUNT {
            return Err(StreamError::ChannelMismatch {
                expected: CHANNEL_COUNT,
                actual: self.channel_count,
            });
        }
        if self.buffer_len < 2 {
            return Err(StreamError::Config(format!(
                "buffer_len must be at least 2, got {}",
                self.buffer_len
            )));
        }
        if self.samples_per_tick == 0 {
            return Err(StreamError::EmptyStep);
        }
        if self.samples_per_tick > self.buffer_len {
            return Err(StreamError::RollTooLarge {
                requested: self.samples_per_tick,
                capacity: self.buffer_len,
            });
        }
        if self.tick_period_ms == 0 {
            return Err(StreamError::Config("tick_period_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.spike_probability) {
            return Err(StreamError::Config(format!(
                "spike_probability must be within [0, 1], got {}",
                self.spike_probability
            )));
        }
        for (name, value) in [
            ("spike_gain", self.spike_gain),
            ("fill_noise_std", self.fill_noise_std),
            ("step_noise_std", self.step_noise_std),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(StreamError::Config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn synth_settings(&self) -> SynthSettings {
        SynthSettings {
            buffer_len: self.buffer_len,
            spike_probability: self.spike_probability,
            spike_gain: self.spike_gain,
            fill_noise_std: self.fill_noise_std,
            step_noise_std: self.step_noise_std,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tick_period(), Duration::from_millis(100));
        assert_eq!(config.synth_settings(), SynthSettings::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "samples_per_tick": 2, "tick_period_ms": 500, "seed": 42 }"#,
        )
        .unwrap();
        assert_eq!(config.samples_per_tick, 2);
        assert_eq!(config.tick_period_ms, 500);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.buffer_len, 500);
        assert_eq!(config.channel_count, 12);
    }

    #[test]
    fn rejects_contract_violations() {
        let bad = [
            r#"{ "channel_count": 8 }"#,
            r#"{ "samples_per_tick": 0 }"#,
            r#"{ "buffer_len": 4, "samples_per_tick": 5 }"#,
            r#"{ "tick_period_ms": 0 }"#,
            r#"{ "spike_probability": 1.5 }"#,
            r#"{ "step_noise_std": -0.1 }"#,
        ];
        for text in bad {
            assert!(EngineConfig::from_json_str(text).is_err(), "{text}");
        }
        assert!(matches!(
            EngineConfig::from_json_str("not json"),
            Err(StreamError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            EngineConfig::from_json_file("/nonexistent/leadstream.json"),
            Err(StreamError::Io(_))
        ));
    }
}
