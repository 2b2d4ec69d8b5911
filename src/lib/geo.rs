use super::items::{TaggedNode, TaggedWay};
use super::tags::HIGHWAY;
use geo::prelude::*;
use geo_types::{Coordinate, LineString, MultiPolygon, Polygon};
use rstar::{RTreeObject, AABB};

const INTERSECTION_EPSILON: f64 = 1e-9;
const PARALLEL_EPSILON: f64 = 1e-12;

/// Compass bearing in degrees, clockwise from north, in `[0, 360)`.
pub fn bearing(dx: f64, dy: f64) -> f64 {
    let degrees = dx.atan2(dy).to_degrees();
    (degrees + 360.) % 360.
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    dx: f64,
    dy: f64,
    len2: f64,
}

impl Edge {
    fn new(from: (f64, f64), to: (f64, f64), cos_lat: f64) -> Self {
        let dx = (to.0 - from.0) * cos_lat;
        let dy = to.1 - from.1;
        Edge {
            dx,
            dy,
            len2: dx * dx + dy * dy,
        }
    }

    fn is_degenerate(&self) -> bool {
        !(self.len2 > 0.)
    }
}

/// The edge of `way` leading into `idx`, or the one leading out of it when
/// the node starts the way.
fn approach_edge(way: &TaggedWay, idx: usize, cos_lat: f64) -> Option<Edge> {
    let here = *way.coordinates.get(idx)?;
    let inbound = idx
        .checked_sub(1)
        .and_then(|prev| way.coordinates.get(prev))
        .map(|&prev| Edge::new(prev, here, cos_lat))
        .filter(|edge| !edge.is_degenerate());
    let outbound = way
        .coordinates
        .get(idx + 1)
        .map(|&next| Edge::new(here, next, cos_lat))
        .filter(|edge| !edge.is_degenerate());
    inbound.or(outbound)
}

/// Bearing of travel approaching `node` along the ways it is part of.
///
/// Roads carrying motor traffic (per `is_motorised`) are preferred over
/// other ways, then the longer edge.
pub fn approach_bearing<'a>(
    node: &TaggedNode,
    ways: impl IntoIterator<Item = &'a TaggedWay>,
    is_motorised: impl Fn(&str) -> bool,
    epsilon: f64,
) -> Option<f64> {
    let cos_lat = match node.lat.to_radians().cos() {
        c if c == 0. => 1.,
        c => c,
    };

    let best = ways
        .into_iter()
        .filter_map(|way| {
            let idx = way.position_of(node, epsilon)?;
            let edge = approach_edge(way, idx, cos_lat)?;
            let priority = match way.tags.get(HIGHWAY) {
                Some(highway) if is_motorised(highway) => 2,
                _ => 1,
            };
            Some((priority, edge))
        })
        .fold(None, |best: Option<(u8, Edge)>, (priority, edge)| match best {
            Some((best_priority, best_edge))
                if best_priority > priority
                    || (best_priority == priority && best_edge.len2 >= edge.len2) =>
            {
                best
            }
            _ => Some((priority, edge)),
        });

    let (_, edge) = best?;
    Some(bearing(edge.dx, edge.dy))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub point: (f64, f64),
    /// Position along the first segment, 0 at its start and 1 at its end.
    pub t: f64,
}

pub fn segment_intersection(
    p0: (f64, f64),
    p1: (f64, f64),
    q0: (f64, f64),
    q1: (f64, f64),
) -> Option<Crossing> {
    let (x1, y1) = p0;
    let (x2, y2) = p1;
    let (x3, y3) = q0;
    let (x4, y4) = q1;
    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
    let u = ((x1 - x3) * (y1 - y2) - (y1 - y3) * (x1 - x2)) / denom;
    let range = -INTERSECTION_EPSILON..=1. + INTERSECTION_EPSILON;
    if !range.contains(&t) || !range.contains(&u) {
        return None;
    }
    let point = (x1 + t * (x2 - x1), y1 + t * (y2 - y1));
    Some(Crossing { point, t })
}

fn ring_contains(ring: &LineString<f64>, (x, y): (f64, f64)) -> bool {
    let coordinates = &ring.0;
    if coordinates.is_empty() {
        return false;
    }
    let mut inside = false;
    let mut j = coordinates.len() - 1;
    for (i, ci) in coordinates.iter().enumerate() {
        let cj = coordinates[j];
        if (ci.y > y) != (cj.y > y) && x < (cj.x - ci.x) * (y - ci.y) / (cj.y - ci.y) + ci.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// An administrative area, one or more polygons with optional holes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    geometry: MultiPolygon<f64>,
}

fn to_line_string(ring: &[(f64, f64)]) -> LineString<f64> {
    ring.to_vec().into()
}

impl BoundaryPolygon {
    /// Builds a boundary from GeoJSON style nesting: polygons of rings of
    /// coordinates, the first ring of each polygon being the outer one.
    pub fn new(polygons: &[Vec<Vec<(f64, f64)>>]) -> Self {
        let polygons = polygons
            .iter()
            .filter_map(|rings| {
                let (exterior, interiors) = rings.split_first()?;
                let interiors = interiors.iter().map(|r| to_line_string(r)).collect();
                Some(Polygon::new(to_line_string(exterior), interiors))
            })
            .collect();
        BoundaryPolygon {
            geometry: MultiPolygon(polygons),
        }
    }

    pub fn from_rings(rings: &[Vec<(f64, f64)>]) -> Self {
        let polygons: Vec<Vec<Vec<(f64, f64)>>> = rings.iter().map(|r| vec![r.clone()]).collect();
        BoundaryPolygon::new(&polygons)
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    /// Even-odd test: inside an outer ring and in none of its holes.
    pub fn contains(&self, point: (f64, f64)) -> bool {
        self.geometry.0.iter().any(|polygon| {
            ring_contains(polygon.exterior(), point)
                && !polygon
                    .interiors()
                    .iter()
                    .any(|hole| ring_contains(hole, point))
        })
    }

    /// Every edge of every ring, outer rings and holes alike.
    pub fn edges(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        self.geometry
            .0
            .iter()
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
            .flat_map(|ring| {
                ring.0
                    .windows(2)
                    .map(|w| ((w[0].x, w[0].y), (w[1].x, w[1].y)))
            })
    }

    /// All crossings of the segment with the boundary, ordered along it.
    pub fn crossings(&self, p0: (f64, f64), p1: (f64, f64)) -> Vec<Crossing> {
        let mut crossings: Vec<Crossing> = self
            .edges()
            .filter_map(|(q0, q1)| segment_intersection(p0, p1, q0, q1))
            .collect();
        crossings.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
        crossings
    }

    pub fn sw_ne(&self) -> ([f64; 2], [f64; 2]) {
        match self.geometry.bounding_rect() {
            Some(rect) => (
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
            None => ([0., 0.], [0., 0.]),
        }
    }

    pub fn coordinates(&self) -> Vec<Vec<Vec<(f64, f64)>>> {
        let ring = |ls: &LineString<f64>| -> Vec<(f64, f64)> {
            ls.0.iter().map(|c: &Coordinate<f64>| (c.x, c.y)).collect()
        };
        self.geometry
            .0
            .iter()
            .map(|polygon| {
                std::iter::once(ring(polygon.exterior()))
                    .chain(polygon.interiors().iter().map(ring))
                    .collect()
            })
            .collect()
    }
}

impl RTreeObject for BoundaryPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let (sw, ne) = self.sw_ne();
        AABB::from_corners(sw, ne)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tags;
    use approx::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
    }

    #[test]
    fn cardinal_bearings() {
        assert_relative_eq!(bearing(0., 1.), 0.);
        assert_relative_eq!(bearing(1., 0.), 90.);
        assert_relative_eq!(bearing(0., -1.), 180.);
        assert_relative_eq!(bearing(-1., 0.), 270.);
        assert_relative_eq!(bearing(1., 1.), 45.);
    }

    #[test]
    fn bearing_range() {
        for &(dx, dy) in &[(-0., -1.), (-1e-20, 1.), (-1., -1e-20)] {
            let b = bearing(dx, dy);
            assert!((0. ..360.).contains(&b), "{} out of range", b);
        }
    }

    fn node(id: i64, lon: f64, lat: f64, tags: &[(&str, &str)]) -> TaggedNode {
        TaggedNode {
            id,
            lon,
            lat,
            tags: tags.iter().cloned().collect(),
        }
    }

    fn way(id: i64, highway: &str, nodes: Vec<i64>, coordinates: Vec<(f64, f64)>) -> TaggedWay {
        let mut tags = Tags::new();
        tags.insert("highway", highway);
        TaggedWay {
            id,
            tags,
            nodes,
            coordinates,
        }
    }

    fn is_motorised(highway: &str) -> bool {
        highway == "primary" || highway == "residential"
    }

    #[test]
    fn inbound_edge_is_preferred() {
        // heading east into node 2, then north out of it
        let road = way(1, "primary", vec![1, 2, 3], vec![(0., 0.), (1., 0.), (1., 5.)]);
        let asl = node(2, 1., 0., &[("cycleway", "asl")]);
        let b = approach_bearing(&asl, vec![&road], is_motorised, 1e-9).unwrap();
        assert_relative_eq!(b, 90., epsilon = 1e-9);
    }

    #[test]
    fn outbound_edge_at_way_start() {
        let road = way(1, "primary", vec![2, 3], vec![(1., 0.), (1., 5.)]);
        let asl = node(2, 1., 0., &[]);
        let b = approach_bearing(&asl, vec![&road], is_motorised, 1e-9).unwrap();
        assert_relative_eq!(b, 0., epsilon = 1e-9);
    }

    #[test]
    fn motorised_road_beats_longer_path() {
        let path = way(1, "cycleway", vec![1, 2], vec![(1., -10.), (1., 0.)]);
        let road = way(2, "residential", vec![3, 2], vec![(0.9, 0.), (1., 0.)]);
        let asl = node(2, 1., 0., &[]);
        let b = approach_bearing(&asl, vec![&path, &road], is_motorised, 1e-9).unwrap();
        assert_relative_eq!(b, 90., epsilon = 1e-9);
    }

    #[test]
    fn longer_edge_breaks_ties() {
        let short = way(1, "primary", vec![1, 2], vec![(0.9, 0.), (1., 0.)]);
        let long = way(2, "primary", vec![3, 2], vec![(1., -5.), (1., 0.)]);
        let asl = node(2, 1., 0., &[]);
        let b = approach_bearing(&asl, vec![&short, &long], is_motorised, 1e-9).unwrap();
        assert_relative_eq!(b, 0., epsilon = 1e-9);
    }

    #[test]
    fn degenerate_edges_are_skipped() {
        let road = way(1, "primary", vec![1, 2, 3], vec![(1., 0.), (1., 0.), (2., 0.)]);
        let asl = node(2, 1., 0., &[]);
        let b = approach_bearing(&asl, vec![&road], is_motorised, 1e-9).unwrap();
        assert_relative_eq!(b, 90., epsilon = 1e-9);

        let stub = way(2, "primary", vec![4, 2], vec![(1., 0.), (1., 0.)]);
        assert_eq!(approach_bearing(&asl, vec![&stub], is_motorised, 1e-9), None);
    }

    #[test]
    fn direction_tag_is_left_to_the_caller() {
        let road = way(1, "primary", vec![1, 2], vec![(0., 0.), (1., 0.)]);
        let asl = node(2, 1., 0., &[("direction", "backward")]);
        let b = approach_bearing(&asl, vec![&road], is_motorised, 1e-9).unwrap();
        assert_relative_eq!(b, 90., epsilon = 1e-9);
    }

    #[test]
    fn node_outside_ways() {
        let road = way(1, "primary", vec![1, 2], vec![(0., 0.), (1., 0.)]);
        let asl = node(9, 5., 5., &[]);
        assert_eq!(approach_bearing(&asl, vec![&road], is_motorised, 1e-9), None);
    }

    #[test]
    fn crossing_segments() {
        let crossing = segment_intersection((0., 0.), (2., 0.), (1., -1.), (1., 1.)).unwrap();
        assert_relative_eq!(crossing.point.0, 1.);
        assert_relative_eq!(crossing.point.1, 0.);
        assert_relative_eq!(crossing.t, 0.5);
    }

    #[test]
    fn parallel_and_disjoint_segments() {
        assert_eq!(segment_intersection((0., 0.), (2., 0.), (0., 1.), (2., 1.)), None);
        assert_eq!(segment_intersection((0., 0.), (1., 0.), (2., -1.), (2., 1.)), None);
    }

    #[test]
    fn touching_endpoint_counts() {
        let crossing = segment_intersection((0., 0.), (1., 0.), (1., -1.), (1., 1.)).unwrap();
        assert_relative_eq!(crossing.t, 1.);
    }

    #[test]
    fn point_in_simple_polygon() {
        let boundary = BoundaryPolygon::from_rings(&[square(0., 0., 4., 4.)]);
        assert!(boundary.contains((2., 2.)));
        assert!(!boundary.contains((5., 2.)));
        assert!(!boundary.contains((-1., -1.)));
    }

    #[test]
    fn point_in_hole_is_outside() {
        let boundary =
            BoundaryPolygon::new(&[vec![square(0., 0., 4., 4.), square(1., 1., 3., 3.)]]);
        assert!(boundary.contains((0.5, 0.5)));
        assert!(!boundary.contains((2., 2.)));
    }

    #[test]
    fn point_in_multi_polygon() {
        let boundary =
            BoundaryPolygon::from_rings(&[square(0., 0., 1., 1.), square(5., 5., 6., 6.)]);
        assert!(boundary.contains((0.5, 0.5)));
        assert!(boundary.contains((5.5, 5.5)));
        assert!(!boundary.contains((3., 3.)));
    }

    #[test]
    fn crossings_are_sorted() {
        let boundary = BoundaryPolygon::from_rings(&[square(0., 0., 4., 4.)]);
        let crossings = boundary.crossings((5., 2.), (-1., 2.));
        assert_eq!(crossings.len(), 2);
        assert_relative_eq!(crossings[0].point.0, 4.);
        assert_relative_eq!(crossings[1].point.0, 0.);
    }

    #[test]
    fn envelope() {
        let boundary = BoundaryPolygon::from_rings(&[square(1., 2., 4., 3.)]);
        assert_eq!(boundary.sw_ne(), ([1., 2.], [4., 3.]));
        assert_eq!(boundary.coordinates()[0][0].len(), 5);
    }
}
