//! Geometry data types.

use serde::{Deserialize, Serialize};

use super::distance::{haversine_distance, EARTH_RADIUS_METERS};

/// Slack added to a circle's radius when testing containment.
///
/// Absorbs floating-point noise from the haversine and midpoint math
/// (a few centimeters).
pub const CONTAINMENT_EPSILON_METERS: f64 = 0.05;

/// A point on the earth's surface in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, -90.0 to 90.0
    pub latitude: f64,
    /// Longitude in degrees, -180.0 to 180.0
    pub longitude: f64,
}

impl Location {
    /// Creates a new location. No validation is performed.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns whether both coordinates are finite and within range.
    ///
    /// # Examples
    ///
    /// ```
    /// use convene_core::geometry::Location;
    ///
    /// assert!(Location::new(40.7, -74.0).is_valid());
    /// assert!(!Location::new(f64::NAN, -74.0).is_valid());
    /// assert!(!Location::new(91.0, 0.0).is_valid());
    /// ```
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A minimum enclosing circle.
///
/// Always derived from participant locations and never mutated directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Circle center
    pub center: Location,
    /// Radius in meters (never negative)
    pub radius_meters: f64,
}

impl Circle {
    /// Creates a circle, clamping negative or non-finite radii to zero.
    #[must_use]
    pub fn new(center: Location, radius_meters: f64) -> Self {
        let radius_meters = if radius_meters.is_finite() && radius_meters > 0.0 {
            radius_meters
        } else {
            0.0
        };
        Self {
            center,
            radius_meters,
        }
    }

    /// The circle returned when there is nothing to enclose.
    #[must_use]
    pub const fn degenerate() -> Self {
        Self {
            center: Location::new(0.0, 0.0),
            radius_meters: 0.0,
        }
    }

    /// A zero-radius circle at `center`.
    #[must_use]
    pub const fn point(center: Location) -> Self {
        Self {
            center,
            radius_meters: 0.0,
        }
    }

    /// Returns whether this circle has zero radius.
    ///
    /// Callers must not use a degenerate circle directly as a search
    /// region; pad it to a sensible minimum first.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.radius_meters <= 0.0
    }

    /// Returns whether `location` lies inside the circle (with epsilon).
    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        haversine_distance(&self.center, location)
            <= self.radius_meters + CONTAINMENT_EPSILON_METERS
    }

    /// Returns a latitude/longitude box that encloses this circle.
    ///
    /// Used to bound venue search requests. Latitude is clamped to the
    /// poles; longitude spans the full range when the circle reaches a pole.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        let angular = (self.radius_meters / EARTH_RADIUS_METERS).to_degrees();
        let south = (self.center.latitude - angular).max(-90.0);
        let north = (self.center.latitude + angular).min(90.0);

        let cos_lat = self.center.latitude.to_radians().cos();
        if north >= 90.0 || south <= -90.0 || cos_lat <= f64::EPSILON {
            return BoundingBox {
                south,
                west: -180.0,
                north,
                east: 180.0,
            };
        }

        let lng_span = (angular / cos_lat).min(180.0);
        BoundingBox {
            south,
            west: (self.center.longitude - lng_span).max(-180.0),
            north,
            east: (self.center.longitude + lng_span).min(180.0),
        }
    }
}

/// An axis-aligned latitude/longitude box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern latitude bound
    pub south: f64,
    /// Western longitude bound
    pub west: f64,
    /// Northern latitude bound
    pub north: f64,
    /// Eastern longitude bound
    pub east: f64,
}

impl BoundingBox {
    /// Returns whether `location` falls inside the box (inclusive).
    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        (self.south..=self.north).contains(&location.latitude)
            && (self.west..=self.east).contains(&location.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_validity_checks_range_and_finiteness() {
        assert!(Location::new(90.0, 180.0).is_valid());
        assert!(Location::new(-90.0, -180.0).is_valid());
        assert!(!Location::new(90.1, 0.0).is_valid());
        assert!(!Location::new(0.0, -180.1).is_valid());
        assert!(!Location::new(f64::INFINITY, 0.0).is_valid());
    }

    #[test]
    fn circle_new_clamps_bad_radius() {
        let center = Location::new(1.0, 2.0);
        assert_eq!(Circle::new(center, -5.0).radius_meters, 0.0);
        assert_eq!(Circle::new(center, f64::NAN).radius_meters, 0.0);
        assert_eq!(Circle::new(center, 12.5).radius_meters, 12.5);
    }

    #[test]
    fn degenerate_circle_is_at_origin() {
        let circle = Circle::degenerate();
        assert!(circle.is_degenerate());
        assert_eq!(circle.center, Location::new(0.0, 0.0));
    }

    #[test]
    fn point_circle_contains_its_center() {
        let center = Location::new(40.7, -74.0);
        let circle = Circle::point(center);
        assert!(circle.contains(&center));
        assert!(!circle.contains(&Location::new(40.7001, -74.0)));
    }

    #[test]
    fn bounding_box_encloses_circle_edge() {
        let circle = Circle::new(Location::new(40.7, -74.0), 1_000.0);
        let bbox = circle.bounding_box();

        assert!(bbox.contains(&circle.center));
        assert!(bbox.south < 40.7 && bbox.north > 40.7);
        assert!(bbox.west < -74.0 && bbox.east > -74.0);
        // ~1km is ~0.009 degrees of latitude
        assert!((bbox.north - 40.7 - 0.009).abs() < 0.001);
    }

    #[test]
    fn bounding_box_near_pole_spans_all_longitudes() {
        let circle = Circle::new(Location::new(89.999, 10.0), 5_000.0);
        let bbox = circle.bounding_box();
        assert_eq!(bbox.north, 90.0);
        assert_eq!(bbox.west, -180.0);
        assert_eq!(bbox.east, 180.0);
    }
}
