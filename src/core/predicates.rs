//! Line predicates used by the topology checks.
//!
//! Relations between lines come from `geo`'s DE-9IM `Relate`; self contact
//! is decided segment by segment.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BoundingRect, Coord, Intersects, Line, LineString, MultiLineString, Relate};

/// Coordinates compared at millimetre (REP) or decimetre (MTT) precision.
pub type CoordKey = (i64, i64);

pub fn coord_key(coord: Coord<f64>, decimetres: bool) -> CoordKey {
    let scale = if decimetres { 10.0 } else { 1000.0 };
    (
        (coord.x * scale).round() as i64,
        (coord.y * scale).round() as i64,
    )
}

fn boxes_meet(a: &MultiLineString<f64>, b: &MultiLineString<f64>) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    }
}

/// A line string that closes on itself.
pub fn is_ring(part: &LineString<f64>) -> bool {
    part.0.len() > 2 && part.0.first() == part.0.last()
}

/// True when a part touches or crosses itself anywhere other than between
/// consecutive segments (and the closing vertex of a ring).
pub fn is_simple(part: &LineString<f64>) -> bool {
    let segs: Vec<Line<f64>> = part.lines().collect();
    let closed = is_ring(part);

    for i in 0..segs.len() {
        for j in (i + 1)..segs.len() {
            let Some(hit) = line_intersection(segs[i], segs[j]) else {
                continue;
            };
            let adjacent = j == i + 1;
            let closing = closed && i == 0 && j == segs.len() - 1;
            match hit {
                LineIntersection::Collinear { intersection } => {
                    if intersection.start != intersection.end {
                        return false;
                    }
                    if !adjacent && !closing {
                        return false;
                    }
                }
                LineIntersection::SinglePoint { .. } if adjacent || closing => {}
                LineIntersection::SinglePoint { .. } => return false,
            }
        }
    }
    true
}

/// DE-9IM crosses: the interiors meet in points only.
pub fn crosses(a: &MultiLineString<f64>, b: &MultiLineString<f64>) -> bool {
    boxes_meet(a, b) && a.relate(b).is_crosses()
}

/// DE-9IM overlaps: the lines share a stretch and neither covers the other.
pub fn overlaps(a: &MultiLineString<f64>, b: &MultiLineString<f64>) -> bool {
    boxes_meet(a, b) && a.relate(b).is_overlaps()
}
