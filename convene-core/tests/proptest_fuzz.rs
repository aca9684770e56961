//! Property-based tests for location and address fuzzing.

use convene_core::geometry::Location;
use convene_core::location::{fuzz, fuzz_address, fuzz_with_rng, FuzzConfig};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const EPS: f64 = 1e-9;

proptest! {
    #[test]
    fn offset_stays_in_band(
        lat in -80.0..80.0f64,
        lng in -170.0..170.0f64,
        seed in any::<u64>(),
    ) {
        let truth = Location::new(lat, lng);
        let config = FuzzConfig::default();
        let fuzzed = fuzz_with_rng(&truth, &config, &mut StdRng::seed_from_u64(seed));

        let d_lat = (fuzzed.latitude - truth.latitude).abs();
        let d_lng = (fuzzed.longitude - truth.longitude).abs();
        for d in [d_lat, d_lng] {
            prop_assert!(d >= config.min_offset_degrees - EPS, "offset {} too small", d);
            prop_assert!(d <= config.max_offset_degrees + EPS, "offset {} too large", d);
        }
    }

    #[test]
    fn offset_stays_in_band_near_poles(lat in 89.995..=90.0f64, seed in any::<u64>()) {
        let truth = Location::new(lat, 0.0);
        let fuzzed = fuzz_with_rng(&truth, &FuzzConfig::default(), &mut StdRng::seed_from_u64(seed));

        prop_assert!(fuzzed.is_valid());
        let d_lat = (fuzzed.latitude - truth.latitude).abs();
        prop_assert!(d_lat >= 0.005 - EPS);
    }

    #[test]
    fn address_never_keeps_house_number(
        number in 1u32..10_000,
        street in "[A-Z][a-z]{2,10} (St|Ave|Rd)",
        city in "[A-Z][a-z]{2,12}",
    ) {
        let full = format!("{number} {street}, {city}, USA");
        let fuzzed = fuzz_address(&full);

        prop_assert_eq!(fuzzed, format!("Near {street}, {city}"));
    }

    #[test]
    fn fuzzed_address_always_starts_with_near(address in "[A-Za-z0-9 ,]{0,60}") {
        prop_assert!(fuzz_address(&address).starts_with("Near "));
    }
}

#[test]
fn successive_calls_differ() {
    let truth = Location::new(40.7484, -73.9857);
    let a = fuzz(&truth);
    let b = fuzz(&truth);
    assert_ne!(a, b);
}
