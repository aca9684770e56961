//! Location fuzzing types.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{normalize_longitude, Location};

/// Default smallest per-axis offset in degrees (~550m of latitude).
pub const DEFAULT_MIN_OFFSET_DEGREES: f64 = 0.005;

/// Default largest per-axis offset in degrees (~1.1km of latitude).
pub const DEFAULT_MAX_OFFSET_DEGREES: f64 = 0.01;

/// Band from which per-axis fuzz offsets are drawn.
///
/// Every fuzzed point lies in an annulus around the true location: never
/// closer than `min_offset_degrees` and never farther than
/// `max_offset_degrees` on either axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzConfig {
    /// Smallest absolute offset per axis, in degrees
    pub min_offset_degrees: f64,
    /// Largest absolute offset per axis, in degrees
    pub max_offset_degrees: f64,
}

impl FuzzConfig {
    /// Returns whether the band is usable (finite, non-negative, ordered).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_offset_degrees.is_finite()
            && self.max_offset_degrees.is_finite()
            && self.min_offset_degrees >= 0.0
            && self.min_offset_degrees <= self.max_offset_degrees
    }
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            min_offset_degrees: DEFAULT_MIN_OFFSET_DEGREES,
            max_offset_degrees: DEFAULT_MAX_OFFSET_DEGREES,
        }
    }
}

/// How long a participant keeps the same fuzz offset.
///
/// Every draw produces a new offset, so a participant fuzzed on every
/// refresh would visibly jump around the map. This is a deliberate choice
/// point rather than a fixed behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FuzzPolicy {
    /// One offset per participant for the life of the session. The fuzzy
    /// marker moves only when the participant actually moves.
    #[default]
    PerSession,
    /// A fresh offset each time the participant's state is (re)applied.
    /// The marker jitters on every update and reconciliation.
    Jitter,
}

/// A drawn per-axis offset in degrees.
///
/// Kept separately from the location so the same offset can be re-applied
/// after the participant moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzOffset {
    /// Latitude offset in degrees
    pub latitude: f64,
    /// Longitude offset in degrees
    pub longitude: f64,
}

impl FuzzOffset {
    /// Draws a random offset from the configured band.
    ///
    /// Magnitude is uniform in `[min, max]` and the sign is chosen
    /// independently per axis.
    pub fn random<R: Rng + ?Sized>(config: &FuzzConfig, rng: &mut R) -> Self {
        Self {
            latitude: random_axis_offset(config, rng),
            longitude: random_axis_offset(config, rng),
        }
    }

    /// Applies this offset to a location.
    ///
    /// A latitude offset that would cross a pole is mirrored so that its
    /// magnitude stays in the band. Longitude wraps at the antimeridian.
    #[must_use]
    pub fn apply(&self, location: &Location) -> Location {
        let mut latitude = location.latitude + self.latitude;
        if !(-90.0..=90.0).contains(&latitude) {
            latitude = location.latitude - self.latitude;
        }
        let longitude = normalize_longitude(location.longitude + self.longitude);
        Location::new(latitude, longitude)
    }
}

fn random_axis_offset<R: Rng + ?Sized>(config: &FuzzConfig, rng: &mut R) -> f64 {
    let magnitude = if config.max_offset_degrees > config.min_offset_degrees {
        rng.gen_range(config.min_offset_degrees..=config.max_offset_degrees)
    } else {
        config.min_offset_degrees
    };
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn fuzz_config_default_band() {
        let config = FuzzConfig::default();
        assert_eq!(config.min_offset_degrees, 0.005);
        assert_eq!(config.max_offset_degrees, 0.01);
        assert!(config.is_valid());
    }

    #[test]
    fn fuzz_config_rejects_inverted_band() {
        let config = FuzzConfig {
            min_offset_degrees: 0.02,
            max_offset_degrees: 0.01,
        };
        assert!(!config.is_valid());
    }

    #[test]
    fn fuzz_config_rejects_negative_and_nan() {
        let negative = FuzzConfig {
            min_offset_degrees: -0.01,
            max_offset_degrees: 0.01,
        };
        let nan = FuzzConfig {
            min_offset_degrees: f64::NAN,
            max_offset_degrees: 0.01,
        };
        assert!(!negative.is_valid());
        assert!(!nan.is_valid());
    }

    #[test]
    fn fuzz_policy_default_is_per_session() {
        assert_eq!(FuzzPolicy::default(), FuzzPolicy::PerSession);
    }

    #[test]
    fn fuzz_policy_serializes_snake_case() {
        let json = serde_json::to_string(&FuzzPolicy::PerSession).unwrap();
        assert_eq!(json, "\"per_session\"");
    }

    #[test]
    fn random_offset_stays_in_band() {
        let config = FuzzConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let offset = FuzzOffset::random(&config, &mut rng);
            assert!((0.005..=0.01).contains(&offset.latitude.abs()));
            assert!((0.005..=0.01).contains(&offset.longitude.abs()));
        }
    }

    #[test]
    fn random_offset_uses_both_signs() {
        let config = FuzzConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let offsets: Vec<FuzzOffset> = (0..200)
            .map(|_| FuzzOffset::random(&config, &mut rng))
            .collect();
        assert!(offsets.iter().any(|o| o.latitude > 0.0));
        assert!(offsets.iter().any(|o| o.latitude < 0.0));
        assert!(offsets.iter().any(|o| o.longitude > 0.0));
        assert!(offsets.iter().any(|o| o.longitude < 0.0));
    }

    #[test]
    fn fixed_band_yields_fixed_magnitude() {
        let config = FuzzConfig {
            min_offset_degrees: 0.007,
            max_offset_degrees: 0.007,
        };
        let offset = FuzzOffset::random(&config, &mut StdRng::seed_from_u64(9));
        assert_eq!(offset.latitude.abs(), 0.007);
        assert_eq!(offset.longitude.abs(), 0.007);
    }

    #[test]
    fn apply_mirrors_at_pole() {
        let offset = FuzzOffset {
            latitude: 0.01,
            longitude: 0.0,
        };
        let fuzzed = offset.apply(&Location::new(89.995, 0.0));
        assert!((fuzzed.latitude - 89.985).abs() < 1e-9);
    }

    #[test]
    fn apply_wraps_longitude() {
        let offset = FuzzOffset {
            latitude: 0.0,
            longitude: 0.01,
        };
        let fuzzed = offset.apply(&Location::new(0.0, 179.995));
        assert!((fuzzed.longitude + 179.995).abs() < 1e-9);
    }
}
