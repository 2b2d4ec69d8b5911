use super::geo::BoundaryPolygon;
use super::geojson::{Feature, Geometry};
use rstar::{Envelope, RTreeObject, AABB};

fn line_envelope(line: &[(f64, f64)]) -> AABB<[f64; 2]> {
    let points: Vec<[f64; 2]> = line.iter().map(|&(x, y)| [x, y]).collect();
    AABB::from_points(&points)
}

struct SubLines {
    done: Vec<Vec<(f64, f64)>>,
    current: Option<Vec<(f64, f64)>>,
}

impl SubLines {
    fn extend(&mut self, from: (f64, f64), to: (f64, f64)) {
        self.current.get_or_insert_with(|| vec![from]).push(to);
    }

    fn start(&mut self, at: (f64, f64)) {
        self.close();
        self.current = Some(vec![at]);
    }

    fn close(&mut self) {
        if let Some(line) = self.current.take() {
            self.done.push(line);
        }
    }
}

/// Portions of `line` inside `boundary`, in line order.
///
/// Sub-lines with fewer than two points are dropped. Segments with both
/// ends inside are kept whole.
pub fn clip_line(line: &[(f64, f64)], boundary: &BoundaryPolygon) -> Vec<Vec<(f64, f64)>> {
    if line.len() < 2 || boundary.is_empty() {
        return vec![];
    }
    if !boundary.envelope().intersects(&line_envelope(line)) {
        return vec![];
    }

    let mut lines = SubLines {
        done: vec![],
        current: None,
    };
    for segment in line.windows(2) {
        let (p0, p1) = (segment[0], segment[1]);
        match (boundary.contains(p0), boundary.contains(p1)) {
            (true, true) => lines.extend(p0, p1),
            (true, false) => {
                let crossings = boundary.crossings(p0, p1);
                match crossings.first() {
                    Some(crossing) => lines.extend(p0, crossing.point),
                    None if lines.current.is_none() => lines.current = Some(vec![p0]),
                    None => {}
                }
                lines.close();
            }
            (false, true) => {
                let crossings = boundary.crossings(p0, p1);
                let entry = crossings.last().map_or(p1, |crossing| crossing.point);
                lines.start(entry);
                if entry != p1 {
                    lines.extend(entry, p1);
                }
            }
            (false, false) => {
                let crossings = boundary.crossings(p0, p1);
                if crossings.len() >= 2 {
                    lines.close();
                    lines
                        .done
                        .push(vec![crossings[0].point, crossings[crossings.len() - 1].point]);
                }
            }
        }
    }
    lines.close();

    lines.done.retain(|line| line.len() >= 2);
    lines.done
}

/// Clips a line feature, each inside portion becoming a feature with the
/// source properties. Other geometries pass through when they touch the
/// inside.
pub fn clip_feature(feature: &Feature, boundary: &BoundaryPolygon) -> Vec<Feature> {
    match &feature.geometry {
        Geometry::LineString { coordinates } => clip_line(coordinates, boundary)
            .into_iter()
            .map(|coordinates| {
                Feature::new(
                    Geometry::LineString { coordinates },
                    feature.properties.clone(),
                )
            })
            .collect(),
        Geometry::Point { coordinates } if boundary.contains(*coordinates) => {
            vec![feature.clone()]
        }
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::Properties;
    use approx::*;
    use serde_json::json;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]
    }

    fn unit_square() -> BoundaryPolygon {
        BoundaryPolygon::from_rings(&[square(0., 0., 10., 10.)])
    }

    fn assert_line_eq(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
        assert_eq!(actual.len(), expected.len(), "{:?} != {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert_relative_eq!(a.0, e.0, epsilon = 1e-9);
            assert_relative_eq!(a.1, e.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn inside_line_is_unchanged() {
        let line = vec![(1., 1.), (2., 3.), (5., 5.), (9., 2.)];
        let clipped = clip_line(&line, &unit_square());
        assert_eq!(clipped, vec![line]);
    }

    #[test]
    fn outside_line_is_discarded() {
        let line = vec![(11., 1.), (12., 3.), (15., 5.)];
        assert!(clip_line(&line, &unit_square()).is_empty());

        // inside the envelope, outside the polygon
        let triangle = BoundaryPolygon::from_rings(&[vec![(0., 0.), (10., 0.), (0., 10.), (0., 0.)]]);
        let line = vec![(8., 8.), (9., 9.)];
        assert!(clip_line(&line, &triangle).is_empty());
    }

    #[test]
    fn leaving_line_ends_at_boundary() {
        let line = vec![(5., 5.), (8., 5.), (15., 5.)];
        let clipped = clip_line(&line, &unit_square());
        assert_eq!(clipped.len(), 1);
        assert_line_eq(&clipped[0], &[(5., 5.), (8., 5.), (10., 5.)]);
    }

    #[test]
    fn entering_line_starts_at_boundary() {
        let line = vec![(-5., 5.), (5., 5.), (6., 6.)];
        let clipped = clip_line(&line, &unit_square());
        assert_eq!(clipped.len(), 1);
        assert_line_eq(&clipped[0], &[(0., 5.), (5., 5.), (6., 6.)]);
    }

    #[test]
    fn crossing_line_keeps_the_chord() {
        let line = vec![(-5., 5.), (15., 5.)];
        let clipped = clip_line(&line, &unit_square());
        assert_eq!(clipped.len(), 1);
        assert_line_eq(&clipped[0], &[(0., 5.), (10., 5.)]);
    }

    #[test]
    fn weaving_line_yields_several_parts() {
        let line = vec![(5., 5.), (15., 5.), (15., 8.), (5., 8.)];
        let clipped = clip_line(&line, &unit_square());
        assert_eq!(clipped.len(), 2);
        assert_line_eq(&clipped[0], &[(5., 5.), (10., 5.)]);
        assert_line_eq(&clipped[1], &[(10., 8.), (5., 8.)]);
    }

    #[test]
    fn hole_is_cut_out() {
        let boundary = BoundaryPolygon::new(&[vec![square(0., 0., 10., 10.), square(4., 4., 6., 6.)]]);
        let line = vec![(1., 5.), (3., 5.), (5., 5.), (7., 5.), (9., 5.)];
        let clipped = clip_line(&line, &boundary);
        assert_eq!(clipped.len(), 2);
        assert_line_eq(&clipped[0], &[(1., 5.), (3., 5.), (4., 5.)]);
        assert_line_eq(&clipped[1], &[(6., 5.), (7., 5.), (9., 5.)]);
    }

    #[test]
    fn degenerate_input() {
        assert!(clip_line(&[(1., 1.)], &unit_square()).is_empty());
        assert!(clip_line(&[(1., 1.), (2., 2.)], &BoundaryPolygon::new(&[])).is_empty());
    }

    #[test]
    fn features_keep_properties() {
        let mut properties = Properties::new();
        properties.insert("osm_id".into(), json!(3));
        let feature = Feature::new(
            Geometry::LineString {
                coordinates: vec![(5., 5.), (15., 5.), (15., 8.), (5., 8.)],
            },
            properties,
        );
        let clipped = clip_feature(&feature, &unit_square());
        assert_eq!(clipped.len(), 2);
        assert!(clipped
            .iter()
            .all(|f| f.property("osm_id") == Some(&json!(3))));
    }
}
