//! Privacy-focused location fuzzing.
//!
//! This module provides functions for:
//! - Coordinate fuzzing (random per-axis offset inside a fixed band)
//! - Address fuzzing (dropping the house number and everything below city)

use rand::Rng;

use super::types::{FuzzConfig, FuzzOffset};
use crate::geometry::Location;

/// Fuzzes a location with the default offset band.
///
/// Every call draws a new random offset, so two calls on the same input
/// almost surely differ.
///
/// # Examples
///
/// ```
/// use convene_core::geometry::Location;
/// use convene_core::location::fuzz;
///
/// let truth = Location::new(40.7484, -73.9857);
/// let fuzzed = fuzz(&truth);
///
/// let d_lat = (fuzzed.latitude - truth.latitude).abs();
/// assert!((0.005 - 1e-9..=0.01 + 1e-9).contains(&d_lat));
/// ```
#[must_use]
pub fn fuzz(location: &Location) -> Location {
    fuzz_with_rng(location, &FuzzConfig::default(), &mut rand::thread_rng())
}

/// Fuzzes a location with an explicit band and RNG.
///
/// # Arguments
///
/// * `location` - True location
/// * `config` - Offset band
/// * `rng` - Random source (seed it for reproducible tests)
pub fn fuzz_with_rng<R: Rng + ?Sized>(
    location: &Location,
    config: &FuzzConfig,
    rng: &mut R,
) -> Location {
    FuzzOffset::random(config, rng).apply(location)
}

/// Reduces a full street address to an approximate one.
///
/// Splits on commas, strips a leading house number from the first segment,
/// and renders `"Near {street}, {city}"`. Addresses with fewer than two
/// segments render as `"Near {original}"`.
///
/// # Examples
///
/// ```
/// use convene_core::location::fuzz_address;
///
/// assert_eq!(
///     fuzz_address("350 5th Ave, New York, NY 10118"),
///     "Near 5th Ave, New York"
/// );
/// assert_eq!(fuzz_address("Central Park"), "Near Central Park");
/// ```
#[must_use]
pub fn fuzz_address(full_address: &str) -> String {
    let segments: Vec<&str> = full_address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        [street, city, ..] => format!("Near {}, {city}", strip_house_number(street)),
        _ => format!("Near {}", full_address.trim()),
    }
}

/// Drops a leading house number such as `350`, `12B` or `10-12`.
///
/// Ordinal street names like `5th Ave` are left alone. If nothing would
/// remain, the segment is returned unchanged.
fn strip_house_number(segment: &str) -> &str {
    let Some((first, rest)) = segment.split_once(char::is_whitespace) else {
        return segment;
    };
    let rest = rest.trim_start();
    if rest.is_empty() || !is_house_number(first) {
        return segment;
    }
    rest
}

fn is_house_number(token: &str) -> bool {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return false;
    }

    let suffix = &token[digits_end..];
    if suffix.is_empty() {
        return true;
    }
    if let Some(range_end) = suffix.strip_prefix('-') {
        return !range_end.is_empty() && range_end.chars().all(|c| c.is_ascii_digit());
    }
    let mut chars = suffix.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn fuzz_address_strips_house_number() {
        assert_eq!(
            fuzz_address("350 5th Ave, New York, NY 10118"),
            "Near 5th Ave, New York"
        );
    }

    #[test]
    fn fuzz_address_keeps_street_without_number() {
        assert_eq!(
            fuzz_address("Baker Street, London, UK"),
            "Near Baker Street, London"
        );
    }

    #[test]
    fn fuzz_address_single_segment() {
        assert_eq!(fuzz_address("Times Square"), "Near Times Square");
    }

    #[test]
    fn fuzz_address_trims_whitespace() {
        assert_eq!(
            fuzz_address("  221B   Baker Street ,  London "),
            "Near Baker Street, London"
        );
    }

    #[test]
    fn fuzz_address_handles_letter_suffix_and_ranges() {
        assert_eq!(
            fuzz_address("12B Main St, Springfield"),
            "Near Main St, Springfield"
        );
        assert_eq!(
            fuzz_address("10-12 Main St, Springfield"),
            "Near Main St, Springfield"
        );
    }

    #[test]
    fn fuzz_address_keeps_ordinal_street() {
        assert_eq!(
            fuzz_address("5th Ave, New York"),
            "Near 5th Ave, New York"
        );
    }

    #[test]
    fn fuzz_address_number_only_first_segment() {
        assert_eq!(fuzz_address("350, New York"), "Near 350, New York");
    }

    #[test]
    fn fuzz_address_empty_input() {
        assert_eq!(fuzz_address(""), "Near ");
    }

    #[test]
    fn fuzz_stays_within_band() {
        let truth = Location::new(37.7749, -122.4194);
        let config = FuzzConfig::default();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..500 {
            let fuzzed = fuzz_with_rng(&truth, &config, &mut rng);
            let d_lat = (fuzzed.latitude - truth.latitude).abs();
            let d_lng = (fuzzed.longitude - truth.longitude).abs();
            assert!((0.005 - 1e-9..=0.01 + 1e-9).contains(&d_lat));
            assert!((0.005 - 1e-9..=0.01 + 1e-9).contains(&d_lng));
        }
    }

    #[test]
    fn successive_fuzz_calls_differ() {
        let truth = Location::new(51.5074, -0.1278);
        assert_ne!(fuzz(&truth), fuzz(&truth));
    }

    #[test]
    fn fuzz_never_returns_true_location() {
        let truth = Location::new(0.0, 0.0);
        let fuzzed = fuzz(&truth);
        assert_ne!(fuzzed.latitude, truth.latitude);
        assert_ne!(fuzzed.longitude, truth.longitude);
    }
}
