//! Great-circle distance helpers.
//!
//! All distances are on a spherical earth. This is an approximation that
//! holds well for the tens-of-kilometers radii a meeting group spans.

use super::types::Location;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two locations, in meters.
///
/// # Examples
///
/// ```
/// use convene_core::geometry::{haversine_distance, Location};
///
/// let a = Location::new(40.70, -74.00);
/// let b = Location::new(40.75, -73.98);
/// let d = haversine_distance(&a, &b);
/// assert!((5_000.0..6_000.0).contains(&d));
/// ```
#[must_use]
pub fn haversine_distance(a: &Location, b: &Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Clamp guards asin against h drifting past 1.0
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Great-circle midpoint of two locations.
///
/// Both endpoints are equidistant from the result, which is what makes it
/// usable as the center of a two-point enclosing circle.
#[must_use]
pub fn midpoint(a: &Location, b: &Location) -> Location {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let lng1 = a.longitude.to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let bx = lat2.cos() * d_lng.cos();
    let by = lat2.cos() * d_lng.sin();

    let lat = (lat1.sin() + lat2.sin()).atan2(((lat1.cos() + bx).powi(2) + by.powi(2)).sqrt());
    let lng = lng1 + by.atan2(lat1.cos() + bx);

    Location::new(lat.to_degrees(), normalize_longitude(lng.to_degrees()))
}

/// Wraps a longitude into [-180, 180].
#[must_use]
pub fn normalize_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}
