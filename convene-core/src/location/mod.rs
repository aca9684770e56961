//! Location privacy for Convene.
//!
//! Participants who opt into fuzzy location never expose their true
//! coordinates to other participants. Instead the replica shows:
//! - A fuzzed coordinate, offset by 0.005-0.01 degrees on each axis
//! - A fuzzed address of the form `"Near {street}, {city}"`
//!
//! # Privacy Guarantees
//!
//! - The fuzzed point is never closer than the inner band and never farther
//!   than the outer band on either axis
//! - House numbers are never shown for fuzzy participants
//! - Offset lifetime is governed by [`FuzzPolicy`]
//!
//! # Example Usage
//!
//! ```
//! use convene_core::geometry::Location;
//! use convene_core::location::{fuzz, fuzz_address};
//!
//! let fuzzed = fuzz(&Location::new(40.7484, -73.9857));
//! println!("Fuzzed: {}, {}", fuzzed.latitude, fuzzed.longitude);
//!
//! let address = fuzz_address("350 5th Ave, New York, NY 10118");
//! assert_eq!(address, "Near 5th Ave, New York");
//! ```

pub mod privacy;
pub mod types;

pub use privacy::{fuzz, fuzz_address, fuzz_with_rng};
pub use types::{FuzzConfig, FuzzOffset, FuzzPolicy};
