//! Site boundary checks.
//!
//! Boundaries are stored as JSON polygon rings of `[lon, lat]` pairs. A
//! reported position counts as on site when it falls inside a ring or
//! within a tolerance band around it, measured in meters along the
//! great circle. Coordinates of exactly (0, 0) are the firmware's
//! "no GPS fix" sentinel and never pass.

use geo::{Contains, HaversineBearing, HaversineDistance, LineString, Point, Polygon};

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Parsed site boundary, one or more polygons.
#[derive(Debug, Clone)]
pub struct Boundary {
    polygons: Vec<Polygon<f64>>,
}

impl Boundary {
    /// Build from rings of `[lon, lat]` vertices. Rings with fewer than
    /// three vertices are dropped; unclosed rings are closed.
    pub fn from_rings(rings: &[Vec<[f64; 2]>]) -> Option<Self> {
        let polygons: Vec<Polygon<f64>> = rings
            .iter()
            .filter(|ring| ring.len() >= 3)
            .map(|ring| {
                let coords: Vec<(f64, f64)> = ring.iter().map(|p| (p[0], p[1])).collect();
                Polygon::new(LineString::from(coords), vec![])
            })
            .collect();

        if polygons.is_empty() {
            None
        } else {
            Some(Self { polygons })
        }
    }

    /// Parse the stored JSON form: either a single ring `[[lon, lat], ..]`
    /// or a list of rings.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let outer = value.as_array()?;
        let first = outer.first()?.as_array()?;

        let rings: Vec<Vec<[f64; 2]>> = if first.first()?.is_number() {
            vec![parse_ring(outer)?]
        } else {
            outer
                .iter()
                .map(|ring| parse_ring(ring.as_array()?))
                .collect::<Option<Vec<_>>>()?
        };

        Self::from_rings(&rings)
    }

    /// True when the position is inside a polygon or within
    /// `tolerance_meters` of its edge.
    pub fn is_within_tolerance(&self, lat: f64, lon: f64, tolerance_meters: f64) -> bool {
        if lat == 0.0 && lon == 0.0 {
            return false;
        }

        let point = Point::new(lon, lat);
        if self.polygons.iter().any(|poly| poly.contains(&point)) {
            return true;
        }

        self.edge_distance_meters(&point)
            .is_some_and(|d| d <= tolerance_meters)
    }

    /// Great-circle distance from the point to the nearest boundary edge.
    fn edge_distance_meters(&self, point: &Point<f64>) -> Option<f64> {
        self.polygons
            .iter()
            .flat_map(|poly| poly.exterior().lines())
            .map(|line| {
                point_to_segment_meters(*point, line.start.into(), line.end.into())
            })
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Distance in meters from `p` to the great-circle segment `a`..`b`,
/// via the cross-track/along-track construction. Falls back to the
/// nearer endpoint when the perpendicular foot lies off the segment.
fn point_to_segment_meters(p: Point<f64>, a: Point<f64>, b: Point<f64>) -> f64 {
    let d_ap = a.haversine_distance(&p);
    if d_ap == 0.0 {
        return 0.0;
    }
    let d_ab = a.haversine_distance(&b);
    if d_ab == 0.0 {
        return d_ap;
    }

    let bearing_ap = a.haversine_bearing(p).to_radians();
    let bearing_ab = a.haversine_bearing(b).to_radians();

    let mut relative = bearing_ap - bearing_ab;
    while relative > std::f64::consts::PI {
        relative -= 2.0 * std::f64::consts::PI;
    }
    while relative < -std::f64::consts::PI {
        relative += 2.0 * std::f64::consts::PI;
    }

    // Foot of the perpendicular lies behind `a`.
    if relative.abs() > std::f64::consts::FRAC_PI_2 {
        return d_ap;
    }

    let angular_ap = d_ap / EARTH_RADIUS_METERS;
    let cross_track = (angular_ap.sin() * relative.sin()).asin();
    let along_track =
        (angular_ap.cos() / cross_track.cos()).clamp(-1.0, 1.0).acos() * EARTH_RADIUS_METERS;

    // Foot of the perpendicular lies past `b`.
    if along_track > d_ab {
        return b.haversine_distance(&p);
    }

    cross_track.abs() * EARTH_RADIUS_METERS
}

fn parse_ring(raw: &[serde_json::Value]) -> Option<Vec<[f64; 2]>> {
    raw.iter()
        .map(|pair| {
            let pair = pair.as_array()?;
            Some([pair.first()?.as_f64()?, pair.get(1)?.as_f64()?])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Roughly 670 m x 630 m site square near 55.75N.
    fn site() -> Boundary {
        Boundary::from_rings(&[vec![
            [37.600, 55.750],
            [37.610, 55.750],
            [37.610, 55.756],
            [37.600, 55.756],
            [37.600, 55.750],
        ]])
        .unwrap()
    }

    #[test]
    fn point_inside_passes() {
        assert!(site().is_within_tolerance(55.753, 37.605, 200.0));
    }

    #[test]
    fn origin_sentinel_fails_even_inside() {
        let around_origin = Boundary::from_rings(&[vec![
            [-0.01, -0.01],
            [0.01, -0.01],
            [0.01, 0.01],
            [-0.01, 0.01],
        ]])
        .unwrap();
        assert!(around_origin.is_within_tolerance(0.005, 0.005, 200.0));
        assert!(!around_origin.is_within_tolerance(0.0, 0.0, 200.0));
    }

    #[test]
    fn point_within_tolerance_band_passes() {
        // ~145 m north of the top edge.
        assert!(site().is_within_tolerance(55.7573, 37.605, 200.0));
    }

    #[test]
    fn point_beyond_tolerance_fails() {
        // ~610 m north of the top edge.
        assert!(!site().is_within_tolerance(55.7615, 37.605, 200.0));
    }

    #[test]
    fn corner_distance_uses_nearest_vertex() {
        // Diagonal off the north-east corner, ~140 m away.
        assert!(site().is_within_tolerance(55.7569, 37.6114, 200.0));
        assert!(!site().is_within_tolerance(55.7646, 37.6214, 200.0));
    }

    #[test]
    fn second_polygon_of_a_multi_site_counts() {
        let boundary = Boundary::from_rings(&[
            vec![[37.600, 55.750], [37.610, 55.750], [37.610, 55.756], [37.600, 55.756]],
            vec![[37.700, 55.800], [37.710, 55.800], [37.710, 55.806], [37.700, 55.806]],
        ])
        .unwrap();
        assert!(boundary.is_within_tolerance(55.803, 37.705, 200.0));
    }

    #[test]
    fn unclosed_ring_is_closed() {
        let boundary = Boundary::from_rings(&[vec![
            [37.600, 55.750],
            [37.610, 55.750],
            [37.610, 55.756],
            [37.600, 55.756],
        ]])
        .unwrap();
        assert!(boundary.is_within_tolerance(55.753, 37.605, 200.0));
    }

    #[test]
    fn degenerate_rings_yield_no_boundary() {
        assert!(Boundary::from_rings(&[vec![[37.6, 55.75], [37.61, 55.75]]]).is_none());
        assert!(Boundary::from_rings(&[]).is_none());
    }

    #[test]
    fn json_single_ring_and_ring_list_both_parse() {
        let single = json!([[37.600, 55.750], [37.610, 55.750], [37.610, 55.756], [37.600, 55.756]]);
        let multi = json!([
            [[37.600, 55.750], [37.610, 55.750], [37.610, 55.756], [37.600, 55.756]],
            [[37.700, 55.800], [37.710, 55.800], [37.710, 55.806], [37.700, 55.806]]
        ]);
        assert!(Boundary::from_json(&single).is_some());
        assert!(Boundary::from_json(&multi).is_some());
        assert!(Boundary::from_json(&json!("not a boundary")).is_none());
    }
}
