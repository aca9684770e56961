//! Geometry engine for fair meeting regions.
//!
//! Computes the minimum enclosing circle (MEC) of participant locations.
//! The circle is the fairness region: its center is the point that
//! minimizes the longest trip, and its bounding box bounds venue search.
//!
//! # Metric
//!
//! Distances are great-circle (haversine) distances in meters. This is an
//! approximation of the real earth, accurate for the tens-of-kilometers
//! spans a meeting group covers.
//!
//! # Failure Semantics
//!
//! Nothing here returns an error. Malformed input degrades to the smallest
//! well-defined circle, because callers always need something to render.
//!
//! # Example Usage
//!
//! ```
//! use convene_core::geometry::{compute_mec, haversine_distance, Location};
//!
//! let points = [
//!     Location::new(40.70, -74.00),
//!     Location::new(40.70, -74.00),
//!     Location::new(40.75, -73.98),
//! ];
//! let circle = compute_mec(&points);
//!
//! let half = haversine_distance(&points[0], &points[2]) / 2.0;
//! assert!((circle.radius_meters - half).abs() < 1e-6);
//! ```

mod distance;
mod mec;
mod types;

pub use distance::{haversine_distance, midpoint, normalize_longitude, EARTH_RADIUS_METERS};
pub use mec::{compute_mec, compute_mec_with_rng};
pub use types::{BoundingBox, Circle, Location, CONTAINMENT_EPSILON_METERS};
