//! Sync session configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{SyncError, SyncResult};
use crate::location::{FuzzConfig, FuzzPolicy};

/// Reconnect backoff settings.
///
/// The delay before attempt `n` is `initial_delay_ms * multiplier^(n - 1)`,
/// capped at `max_delay_ms`, then jittered down by up to half.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between attempts (>= 1.0)
    pub multiplier: f64,
    /// Retries before giving up (>= 1)
    pub max_attempts: u32,
}

impl BackoffConfig {
    /// Un-jittered delay before retry `attempt` (1-based).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Jittered delay before retry `attempt`, in `[base / 2, base]`.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        if base.is_zero() {
            return base;
        }
        base.mul_f64(rng.gen_range(0.5..=1.0))
    }

    fn validate(&self) -> SyncResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "initial_delay_ms must be positive".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(SyncError::InvalidConfig(
                "max_delay_ms must be at least initial_delay_ms".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(
                "multiplier must be finite and at least 1.0".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 8,
        }
    }
}

/// Settings for one [`SyncSession`](super::SyncSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reconnect backoff
    pub backoff: BackoffConfig,

    /// Capacity of the caller command queue
    pub command_buffer: usize,

    /// Capacity of the notice broadcast channel
    pub notice_buffer: usize,

    /// Push-channel messages read ahead of the worker
    pub stream_buffer: usize,

    /// Fuzz band for participants with fuzzy location
    pub fuzz: FuzzConfig,

    /// How long a fuzz offset is kept
    pub fuzz_policy: FuzzPolicy,
}

impl SyncConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the JSON is malformed or the
    /// resulting config fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the config to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if serialization fails.
    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string(self).map_err(|e| SyncError::InvalidConfig(e.to_string()))
    }

    /// Checks every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> SyncResult<()> {
        self.backoff.validate()?;
        if self.command_buffer == 0 {
            return Err(SyncError::InvalidConfig(
                "command_buffer must be positive".to_string(),
            ));
        }
        if self.notice_buffer == 0 {
            return Err(SyncError::InvalidConfig(
                "notice_buffer must be positive".to_string(),
            ));
        }
        if self.stream_buffer == 0 {
            return Err(SyncError::InvalidConfig(
                "stream_buffer must be positive".to_string(),
            ));
        }
        if !self.fuzz.is_valid() {
            return Err(SyncError::InvalidConfig(
                "fuzz offsets must be finite, non-negative and ordered".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            command_buffer: 32,
            notice_buffer: 64,
            stream_buffer: 64,
            fuzz: FuzzConfig::default(),
            fuzz_policy: FuzzPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn base_delay_grows_and_caps() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.base_delay(1), Duration::from_millis(500));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(1_000));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(2_000));
        assert_eq!(backoff.base_delay(20), Duration::from_millis(30_000));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn jittered_delay_stays_in_band() {
        let backoff = BackoffConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for attempt in 1..10 {
            let base = backoff.base_delay(attempt);
            let delay = backoff.delay(attempt, &mut rng);
            assert!(delay <= base);
            assert!(delay >= base / 2);
        }
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = SyncConfig::from_json(r#"{"fuzz_policy":"jitter"}"#).unwrap();
        assert_eq!(config.fuzz_policy, FuzzPolicy::Jitter);
        assert_eq!(config.backoff, BackoffConfig::default());
        assert_eq!(config.command_buffer, 32);
    }

    #[test]
    fn json_roundtrip() {
        let config = SyncConfig {
            command_buffer: 4,
            ..SyncConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(SyncConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_malformed_json() {
        let result = SyncConfig::from_json("{not json");
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_command_buffer() {
        let config = SyncConfig {
            command_buffer: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(msg)) if msg.contains("command_buffer")
        ));
    }

    #[test]
    fn rejects_zero_stream_buffer() {
        let config = SyncConfig {
            stream_buffer: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(msg)) if msg.contains("stream_buffer")
        ));
    }

    #[test]
    fn rejects_shrinking_multiplier() {
        let config = SyncConfig::from_json(r#"{"backoff":{"multiplier":0.5}}"#);
        assert!(matches!(
            config,
            Err(SyncError::InvalidConfig(msg)) if msg.contains("multiplier")
        ));
    }

    #[test]
    fn rejects_inverted_fuzz_band() {
        let config = SyncConfig {
            fuzz: FuzzConfig {
                min_offset_degrees: 0.02,
                max_offset_degrees: 0.01,
            },
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = SyncConfig {
            backoff: BackoffConfig {
                max_attempts: 0,
                ..BackoffConfig::default()
            },
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
