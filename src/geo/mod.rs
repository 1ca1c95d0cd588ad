use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),
}

/// A WGS84-style coordinate. Only planar containment is computed; no
/// projection or antimeridian handling is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Region used for containment queries over item locations.
///
/// Box corners may be supplied in any order; they are normalized before use.
/// Polygons may be given open or closed (first vertex repeated at the end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundingRegion {
    Box { top_right: Point, bottom_left: Point },
    Polygon { points: Vec<Point> },
}

/// Axis-aligned envelope, inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn contains(&self, point: &Point) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

impl BoundingRegion {
    pub fn from_corners(top_right: Point, bottom_left: Point) -> Self {
        Self::Box { top_right, bottom_left }
    }

    pub fn polygon(points: Vec<Point>) -> Self {
        Self::Polygon { points }
    }

    /// Check the region is well formed. Boxes must enclose a non-zero area,
    /// polygons need at least three distinct vertices.
    pub fn validate(&self) -> Result<(), GeoError> {
        match self {
            Self::Box { top_right, bottom_left } => {
                if !top_right.is_finite() || !bottom_left.is_finite() {
                    return Err(GeoError::InvalidRegion(
                        "box corners must be finite coordinates".to_string(),
                    ));
                }
                if top_right.lat == bottom_left.lat || top_right.lng == bottom_left.lng {
                    return Err(GeoError::InvalidRegion(
                        "box corners must differ on both axes".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Polygon { points } => {
                if points.iter().any(|p| !p.is_finite()) {
                    return Err(GeoError::InvalidRegion(
                        "polygon vertices must be finite coordinates".to_string(),
                    ));
                }
                let distinct = count_distinct(points, 3);
                if distinct < 3 {
                    return Err(GeoError::InvalidRegion(format!(
                        "polygon needs at least 3 distinct vertices, got {}",
                        distinct
                    )));
                }
                Ok(())
            }
        }
    }

    /// Envelope of the region, used by stores to pre-filter candidates.
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Box { top_right, bottom_left } => Bounds {
                min_lat: top_right.lat.min(bottom_left.lat),
                max_lat: top_right.lat.max(bottom_left.lat),
                min_lng: top_right.lng.min(bottom_left.lng),
                max_lng: top_right.lng.max(bottom_left.lng),
            },
            Self::Polygon { points } => points.iter().fold(
                Bounds {
                    min_lat: f64::INFINITY,
                    max_lat: f64::NEG_INFINITY,
                    min_lng: f64::INFINITY,
                    max_lng: f64::NEG_INFINITY,
                },
                |b, p| Bounds {
                    min_lat: b.min_lat.min(p.lat),
                    max_lat: b.max_lat.max(p.lat),
                    min_lng: b.min_lng.min(p.lng),
                    max_lng: b.max_lng.max(p.lng),
                },
            ),
        }
    }

    /// The same region as a closed vertex loop. A box becomes the 5-point
    /// rectangle that returns to its starting corner.
    pub fn to_polygon(&self) -> Vec<Point> {
        match self {
            Self::Box { top_right, bottom_left } => vec![
                Point::new(top_right.lat, top_right.lng),
                Point::new(top_right.lat, bottom_left.lng),
                Point::new(bottom_left.lat, bottom_left.lng),
                Point::new(bottom_left.lat, top_right.lng),
                Point::new(top_right.lat, top_right.lng),
            ],
            Self::Polygon { points } => close_ring(points),
        }
    }
}

/// Anything that has a location can be filtered by region.
pub trait Located {
    fn location(&self) -> Point;
}

/// Whether `point` lies inside `region`. Boundaries are inclusive for both
/// region kinds.
pub fn contains(region: &BoundingRegion, point: &Point) -> Result<bool, GeoError> {
    region.validate()?;
    Ok(contains_valid(region, point))
}

/// Filter `items` down to those located inside `region`, keeping order.
pub fn query_by_region<T: Located>(
    items: Vec<T>,
    region: &BoundingRegion,
) -> Result<Vec<T>, GeoError> {
    region.validate()?;
    Ok(filter_validated(items, region))
}

/// `query_by_region` for a region the caller has already validated
pub(crate) fn filter_validated<T: Located>(items: Vec<T>, region: &BoundingRegion) -> Vec<T> {
    match region {
        BoundingRegion::Box { .. } => {
            let bounds = region.bounds();
            items
                .into_iter()
                .filter(|item| bounds.contains(&item.location()))
                .collect()
        }
        BoundingRegion::Polygon { points } => {
            let ring = close_ring(points);
            items
                .into_iter()
                .filter(|item| ring_contains(&ring, &item.location()))
                .collect()
        }
    }
}

/// Distinct vertices, counted up to `limit`. `-0.0` and `0.0` are the same
/// coordinate.
fn count_distinct(points: &[Point], limit: usize) -> usize {
    let key = |v: f64| if v == 0.0 { 0u64 } else { v.to_bits() };
    let mut seen = HashSet::with_capacity(limit);
    for p in points {
        seen.insert((key(p.lat), key(p.lng)));
        if seen.len() >= limit {
            break;
        }
    }
    seen.len()
}

fn contains_valid(region: &BoundingRegion, point: &Point) -> bool {
    match region {
        BoundingRegion::Box { .. } => region.bounds().contains(point),
        BoundingRegion::Polygon { points } => ring_contains(&close_ring(points), point),
    }
}

fn close_ring(points: &[Point]) -> Vec<Point> {
    let mut ring = points.to_vec();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    ring
}

/// Even-odd ray casting along the latitude axis. Points on an edge or vertex
/// are reported inside.
fn ring_contains(ring: &[Point], point: &Point) -> bool {
    let mut inside = false;
    for (a, b) in ring.iter().zip(ring.iter().skip(1)) {
        if on_segment(a, b, point) {
            return true;
        }
        if (a.lng > point.lng) != (b.lng > point.lng) {
            let crossing = a.lat + (point.lng - a.lng) * (b.lat - a.lat) / (b.lng - a.lng);
            if point.lat < crossing {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_segment(a: &Point, b: &Point, p: &Point) -> bool {
    let cross = (b.lat - a.lat) * (p.lng - a.lng) - (b.lng - a.lng) * (p.lat - a.lat);
    if cross != 0.0 {
        return false;
    }
    p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
        && p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
}
