//! Minimum enclosing circle (Welzl's algorithm).
//!
//! The algorithm runs on the sphere: two-point circles are centered on the
//! great-circle midpoint, and three-point circles use the spherical
//! circumcenter (the normal of the plane through the three points). All
//! containment checks use haversine distance, so the result is consistent
//! with the metric callers measure against.
//!
//! The implementation is the iterative form of Welzl with an explicit
//! support set of at most three boundary points, so there is no recursion
//! depth to worry about for large inputs.

use rand::seq::SliceRandom;
use rand::Rng;

use super::distance::{haversine_distance, midpoint, normalize_longitude};
use super::types::{Circle, Location};

/// Relative tolerance below which three points are treated as lying on one
/// great circle.
const COLLINEAR_EPSILON: f64 = 1e-10;

/// Computes the minimum enclosing circle of `points`.
///
/// Uses a fresh random permutation on every call. Use
/// [`compute_mec_with_rng`] for reproducible runs.
///
/// Invalid points (non-finite or out-of-range coordinates) are ignored. If
/// nothing valid remains, returns [`Circle::degenerate`].
///
/// # Examples
///
/// ```
/// use convene_core::geometry::{compute_mec, Location};
///
/// let circle = compute_mec(&[Location::new(40.70, -74.00)]);
/// assert_eq!(circle.center, Location::new(40.70, -74.00));
/// assert_eq!(circle.radius_meters, 0.0);
/// ```
#[must_use]
pub fn compute_mec(points: &[Location]) -> Circle {
    compute_mec_with_rng(points, &mut rand::thread_rng())
}

/// Computes the minimum enclosing circle using the supplied RNG for the
/// shuffle.
#[must_use]
pub fn compute_mec_with_rng<R: Rng + ?Sized>(points: &[Location], rng: &mut R) -> Circle {
    let mut sanitized: Vec<Location> = points.iter().copied().filter(Location::is_valid).collect();

    match sanitized.len() {
        0 => return Circle::degenerate(),
        1 => return Circle::point(sanitized[0]),
        2 => return diameter_circle(&sanitized[0], &sanitized[1]),
        _ => {}
    }

    sanitized.shuffle(rng);
    let circle = welzl(&sanitized);

    // Absorb rounding left over from the incremental construction
    let farthest = sanitized
        .iter()
        .map(|p| haversine_distance(&circle.center, p))
        .fold(circle.radius_meters, f64::max);
    Circle::new(circle.center, farthest)
}

fn welzl(points: &[Location]) -> Circle {
    let mut circle = circle_from_support(&[points[0]]);

    for i in 1..points.len() {
        if circle.contains(&points[i]) {
            continue;
        }
        // points[i] is on the boundary of the circle over points[..=i]
        circle = circle_from_support(&[points[i]]);

        for j in 0..i {
            if circle.contains(&points[j]) {
                continue;
            }
            circle = circle_from_support(&[points[i], points[j]]);

            for k in 0..j {
                if !circle.contains(&points[k]) {
                    circle = circle_from_support(&[points[i], points[j], points[k]]);
                }
            }
        }
    }

    circle
}

/// Builds the smallest circle with every support point on its boundary.
fn circle_from_support(support: &[Location]) -> Circle {
    match support {
        [] => Circle::degenerate(),
        [a] => Circle::point(*a),
        [a, b] => diameter_circle(a, b),
        [a, b, c, ..] => circumcircle(a, b, c),
    }
}

fn diameter_circle(a: &Location, b: &Location) -> Circle {
    Circle::new(midpoint(a, b), haversine_distance(a, b) / 2.0)
}

/// Circle through three points, falling back to the farthest pair when the
/// points lie on one great circle.
fn circumcircle(a: &Location, b: &Location, c: &Location) -> Circle {
    let (va, vb, vc) = (Vec3::from(a), Vec3::from(b), Vec3::from(c));

    let ab = vb.sub(&va);
    let ac = vc.sub(&va);
    let bc = vc.sub(&vb);
    let normal = ab.cross(&ac);

    let max_side_sq = ab.norm_sq().max(ac.norm_sq()).max(bc.norm_sq());
    let det = normal.norm_sq().sqrt();
    if max_side_sq <= 0.0 || det <= COLLINEAR_EPSILON * max_side_sq {
        return farthest_pair_circle(a, b, c);
    }

    let mut center = normal.scale(1.0 / det);
    if center.dot(&va) < 0.0 {
        center = center.scale(-1.0);
    }
    let center = center.to_location();

    let radius = haversine_distance(&center, a)
        .max(haversine_distance(&center, b))
        .max(haversine_distance(&center, c));
    Circle::new(center, radius)
}

fn farthest_pair_circle(a: &Location, b: &Location, c: &Location) -> Circle {
    let ab = haversine_distance(a, b);
    let ac = haversine_distance(a, c);
    let bc = haversine_distance(b, c);

    if ab >= ac && ab >= bc {
        diameter_circle(a, b)
    } else if ac >= bc {
        diameter_circle(a, c)
    } else {
        diameter_circle(b, c)
    }
}

/// Unit-sphere cartesian coordinates.
#[derive(Debug, Clone, Copy)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    fn sub(&self, other: &Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y.mul_add(other.z, -(self.z * other.y)),
            y: self.z.mul_add(other.x, -(self.x * other.z)),
            z: self.x.mul_add(other.y, -(self.y * other.x)),
        }
    }

    fn dot(&self, other: &Self) -> f64 {
        self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
    }

    fn norm_sq(&self) -> f64 {
        self.dot(self)
    }

    fn scale(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }

    fn to_location(self) -> Location {
        let latitude = self.z.clamp(-1.0, 1.0).asin().to_degrees();
        let longitude = self.y.atan2(self.x).to_degrees();
        Location::new(latitude, normalize_longitude(longitude))
    }
}

impl From<&Location> for Vec3 {
    fn from(location: &Location) -> Self {
        let lat = location.latitude.to_radians();
        let lng = location.longitude.to_radians();
        Self {
            x: lat.cos() * lng.cos(),
            y: lat.cos() * lng.sin(),
            z: lat.sin(),
        }
    }
}
