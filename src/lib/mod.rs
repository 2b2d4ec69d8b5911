use self::geo::{approach_bearing, BoundaryPolygon};
use classify::{classify_node, is_mountain_bike_trail, NodeFacility};
use clip::clip_feature;
use config::Config;
use emit::{emit_way, line_feature, point_feature};
use error::{Error, Result};
use filter::{Filter, Group};
use self::geojson::{Feature, Geometry, Properties};
use items::{Dataset, MemberType, TaggedRelation, TaggedWay};
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use stitch::stitch_rings;
use tags::Tags;

pub mod classify;
pub mod clip;
pub mod collisions;
pub mod config;
pub mod emit;
pub mod error;
pub mod filter;
pub mod geo;
pub mod geojson;
pub mod items;
pub mod output;
pub mod rules;
pub mod source;
pub mod stitch;
pub mod tags;

/// Ways carrying cycle infrastructure, paths and roads with lanes or tracks.
pub const CYCLEWAY_FILTER: &str = "highway~cycleway,\
    highway~path+bicycle~designated,\
    highway~pedestrian+bicycle~designated,\
    highway~pedestrian+bicycle~yes,\
    highway+cycleway,\
    highway+cycleway:left,\
    highway+cycleway:right,\
    highway+cycleway:both";
pub const ASL_FILTER: &str = "cycleway~asl";
pub const BOUNDARY_FILTER: &str = "boundary~administrative";
pub const LOCAL_ROUTE_FILTER: &str = "lcn~yes,route~bicycle+network~lcn";

fn emit_cycleway(way: &TaggedWay, config: &Config) -> Vec<Feature> {
    if config.exclude_mountain_bike_trails && is_mountain_bike_trail(&way.tags) {
        debug!("skipping mountain bike trail {}", way.id);
        return vec![];
    }
    emit_way(way, config)
}

/// Classifies every way and emits one line feature per facility side, in
/// input order.
pub fn cycleways(dataset: &Dataset, config: &Config) -> Vec<Feature> {
    let features: Vec<Feature> = if config.parallelize {
        dataset
            .ways
            .par_iter()
            .flat_map(|way| emit_cycleway(way, config))
            .collect()
    } else {
        dataset
            .ways
            .iter()
            .flat_map(|way| emit_cycleway(way, config))
            .collect()
    };
    info!(
        "{} cycleway features from {} ways",
        features.len(),
        dataset.ways.len()
    );
    features
}

/// Advanced stop lines as points, with the bearing of the approach they
/// face when it can be derived from the ways through them.
pub fn asl_markers(dataset: &Dataset, config: &Config) -> Vec<Feature> {
    let node_ways: HashMap<i64, Vec<&TaggedWay>> = dataset
        .ways
        .iter()
        .flat_map(|way| way.nodes.iter().unique().map(move |&id| (id, way)))
        .into_group_map();

    dataset
        .nodes
        .iter()
        .filter_map(|node| Some((node, classify_node(&node.tags)?)))
        .filter_map(|(node, facility)| {
            let NodeFacility::AdvancedStopLine { direction } = facility;
            let bearing = match node_ways.get(&node.id) {
                Some(ways) => approach_bearing(
                    node,
                    ways.iter().copied(),
                    |highway| config.is_motorised(highway),
                    config.stitch_epsilon,
                ),
                // no node ids in the source, match ways by location
                None => approach_bearing(
                    node,
                    dataset.ways.iter().filter(|way| way.nodes.is_empty()),
                    |highway| config.is_motorised(highway),
                    config.stitch_epsilon,
                ),
            };
            if bearing.is_none() {
                debug!("no approach bearing for asl {}", node.id);
            }
            let mut properties = Properties::new();
            if let Some(bearing) = bearing.map(|b| direction.orient(b)) {
                properties.insert("bearing".into(), json!(bearing));
            }
            point_feature(node, properties)
        })
        .collect()
}

fn selected_properties(tags: &Tags, groups: &[Group]) -> Properties {
    let mut properties = Properties::new();
    for group in groups {
        if !filter::matches(tags, std::slice::from_ref(group)) {
            continue;
        }
        for key in group.keys() {
            if let Some(value) = tags.get(key) {
                properties.insert(key.into(), json!(value));
            }
        }
    }
    properties
}

/// Every node and way matching `groups`, as points and lines carrying the
/// values of the keys the selector names.
pub fn tagged_features(dataset: &Dataset, groups: &[Group]) -> Vec<Feature> {
    let points = dataset
        .nodes
        .iter()
        .filter(|node| node.filter(groups))
        .filter_map(|node| point_feature(node, selected_properties(&node.tags, groups)));
    let lines = dataset
        .ways
        .iter()
        .filter(|way| way.filter(groups))
        .filter_map(|way| line_feature(way, selected_properties(&way.tags, groups)));
    let features: Vec<Feature> = points.chain(lines).collect();
    info!("{} features match the selector", features.len());
    features
}

fn is_admin_boundary(relation: &TaggedRelation) -> bool {
    relation.tags.is("boundary", "administrative")
}

/// The administrative relation at the configured `admin_level`, or the
/// first administrative relation. A configured name narrows both.
fn boundary_relation<'a>(dataset: &'a Dataset, config: &Config) -> Option<&'a TaggedRelation> {
    let named = |r: &TaggedRelation| match &config.boundary_name {
        Some(name) => r.tags.is("name", name),
        None => true,
    };
    let mut candidates = dataset
        .relations
        .iter()
        .filter(|r| is_admin_boundary(r) && named(r));
    let first = candidates.clone().next();
    candidates
        .find(|r| r.tags.is("admin_level", &config.boundary_admin_level))
        .or(first)
}

/// Stitches the outer ways of the administrative boundary into a polygon.
pub fn boundary_polygon(dataset: &Dataset, config: &Config) -> Result<BoundaryPolygon> {
    let relation = boundary_relation(dataset, config).ok_or(Error::NoBoundaryRelation)?;
    let fragments: Vec<Vec<(f64, f64)>> = relation
        .members
        .iter()
        .filter(|m| m.member_type == MemberType::Way && m.role == "outer")
        .filter_map(|m| dataset.member_coordinates(m))
        .filter(|coordinates| coordinates.len() >= 2)
        .map(|coordinates| coordinates.to_vec())
        .collect();
    if fragments.is_empty() {
        return Err(Error::NoOuterWays(relation.id));
    }
    let rings = stitch_rings(fragments, config.stitch_epsilon);
    info!(
        "boundary relation {} stitched into {} rings",
        relation.id,
        rings.len()
    );
    Ok(BoundaryPolygon::from_rings(&rings))
}

/// The boundary as a feature, a Polygon for a single ring, else a
/// MultiPolygon.
pub fn boundary(dataset: &Dataset, config: &Config) -> Result<Feature> {
    let polygon = boundary_polygon(dataset, config)?;
    let mut properties = Properties::new();
    if let Some(relation) = boundary_relation(dataset, config) {
        properties.insert("osm_id".into(), json!(relation.id));
        for key in &["name", "admin_level"] {
            if let Some(value) = relation.tags.get(key) {
                properties.insert((*key).into(), json!(value));
            }
        }
    }
    Ok(Feature::new(Geometry::from(&polygon), properties))
}

fn is_local_route(relation: &TaggedRelation) -> bool {
    relation.tags.is("route", "bicycle") && relation.tags.is("network", "lcn")
}

/// Local cycle network ways, tagged directly or through a route relation,
/// clipped to `boundary`.
pub fn local_routes(dataset: &Dataset, boundary: &BoundaryPolygon) -> Vec<Feature> {
    let route_members: Vec<(i64, Vec<(f64, f64)>)> = dataset
        .relations
        .iter()
        .filter(|r| is_local_route(r))
        .flat_map(|r| r.members.iter())
        .filter(|m| m.member_type == MemberType::Way)
        .filter_map(|m| Some((m.id, dataset.member_coordinates(m)?.to_vec())))
        .collect();

    let mut seen = BTreeSet::new();
    let tagged = dataset
        .ways
        .iter()
        .filter(|way| way.tags.is("lcn", "yes"))
        .map(|way| (way.id, way.coordinates.clone()));
    let features: Vec<Feature> = tagged
        .chain(route_members)
        .filter(|(id, _)| seen.insert(*id))
        .filter_map(|(id, coordinates)| {
            let way = TaggedWay::new(id, Default::default(), coordinates);
            let mut properties = Properties::new();
            properties.insert("lcn".into(), json!("yes"));
            line_feature(&way, properties)
        })
        .flat_map(|feature| clip_feature(&feature, boundary))
        .collect();
    if features.is_empty() {
        warn!("no local cycle network ways inside the boundary");
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Member, TaggedNode};
    use crate::tags::Tags;
    use approx::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().cloned().collect()
    }

    fn way(id: i64, pairs: &[(&str, &str)], coordinates: Vec<(f64, f64)>) -> TaggedWay {
        TaggedWay::new(id, tags(pairs), coordinates)
    }

    fn member(id: i64, role: &str) -> Member {
        Member {
            member_type: MemberType::Way,
            id,
            role: role.into(),
            coordinates: vec![],
        }
    }

    #[test]
    fn cycleways_keep_input_order() {
        let line = vec![(0., 0.), (1., 1.)];
        let dataset = Dataset {
            ways: vec![
                way(1, &[("highway", "cycleway")], line.clone()),
                way(2, &[("highway", "residential")], line.clone()),
                way(3, &[("highway", "primary"), ("cycleway:both", "lane")], line.clone()),
                way(4, &[("highway", "cycleway"), ("mtb", "yes")], line),
            ],
            ..Dataset::default()
        };
        for &parallelize in &[true, false] {
            let config = Config {
                parallelize,
                ..Config::default()
            };
            let ids: Vec<_> = cycleways(&dataset, &config)
                .iter()
                .map(|f| f.property("osm_id").cloned())
                .collect();
            assert_eq!(
                ids,
                vec![Some(json!(1)), Some(json!(3)), Some(json!(3))]
            );
        }
    }

    #[test]
    fn mountain_bike_trails_can_be_kept() {
        let dataset = Dataset {
            ways: vec![way(4, &[("highway", "cycleway"), ("mtb", "yes")], vec![(0., 0.), (1., 1.)])],
            ..Dataset::default()
        };
        let config = Config {
            exclude_mountain_bike_trails: false,
            ..Config::default()
        };
        assert_eq!(cycleways(&dataset, &config).len(), 1);
    }

    #[test]
    fn asl_bearing_from_parent_way() {
        let mut road = way(10, &[("highway", "primary")], vec![(0., 0.), (0., 0.001)]);
        road.nodes = vec![1, 2];
        let dataset = Dataset {
            nodes: vec![TaggedNode {
                id: 2,
                lon: 0.,
                lat: 0.001,
                tags: tags(&[("cycleway", "asl")]),
            }],
            ways: vec![road],
            ..Dataset::default()
        };
        let markers = asl_markers(&dataset, &Config::default());
        assert_eq!(markers.len(), 1);
        let bearing = markers[0].property("bearing").and_then(|b| b.as_f64()).unwrap();
        assert_relative_eq!(bearing, 0., epsilon = 1e-9);
    }

    #[test]
    fn asl_facing_backward() {
        let mut road = way(10, &[("highway", "primary")], vec![(0., 0.), (0.001, 0.)]);
        road.nodes = vec![1, 2];
        let dataset = Dataset {
            nodes: vec![TaggedNode {
                id: 2,
                lon: 0.001,
                lat: 0.,
                tags: tags(&[("cycleway", "asl"), ("direction", "backward")]),
            }],
            ways: vec![road],
            ..Dataset::default()
        };
        let markers = asl_markers(&dataset, &Config::default());
        let bearing = markers[0].property("bearing").and_then(|b| b.as_f64()).unwrap();
        assert_relative_eq!(bearing, 270., epsilon = 1e-9);
    }

    #[test]
    fn asl_without_ways_has_no_bearing() {
        let dataset = Dataset {
            nodes: vec![
                TaggedNode {
                    id: 2,
                    lon: 1.,
                    lat: 1.,
                    tags: tags(&[("cycleway", "asl")]),
                },
                TaggedNode {
                    id: 3,
                    lon: 1.,
                    lat: 1.,
                    tags: tags(&[("highway", "traffic_signals")]),
                },
            ],
            ..Dataset::default()
        };
        let markers = asl_markers(&dataset, &Config::default());
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].property("bearing"), None);
    }

    fn boundary_dataset() -> Dataset {
        let relation = TaggedRelation {
            id: 100,
            tags: tags(&[
                ("boundary", "administrative"),
                ("admin_level", "8"),
                ("name", "Town"),
            ]),
            members: vec![member(1, "outer"), member(2, "outer"), member(3, "inner")],
        };
        let other = TaggedRelation {
            id: 99,
            tags: tags(&[("boundary", "administrative"), ("admin_level", "6")]),
            members: vec![],
        };
        Dataset {
            ways: vec![
                way(1, &[], vec![(0., 0.), (10., 0.), (10., 10.)]),
                way(2, &[], vec![(0., 0.), (0., 10.), (10., 10.)]),
                way(3, &[], vec![(4., 4.), (6., 6.)]),
            ],
            relations: vec![other, relation],
            ..Dataset::default()
        }
    }

    #[test]
    fn boundary_from_outer_ways() {
        let dataset = boundary_dataset();
        let polygon = boundary_polygon(&dataset, &Config::default()).unwrap();
        assert!(polygon.contains((5., 5.)));
        assert!(!polygon.contains((11., 5.)));

        let feature = boundary(&dataset, &Config::default()).unwrap();
        assert_eq!(feature.geometry.type_name(), "Polygon");
        assert_eq!(feature.property("name"), Some(&json!("Town")));
        assert_eq!(feature.property("osm_id"), Some(&json!(100)));
    }

    #[test]
    fn boundary_chosen_by_name() {
        let mut dataset = boundary_dataset();
        dataset.relations.insert(
            0,
            TaggedRelation {
                id: 98,
                tags: tags(&[
                    ("boundary", "administrative"),
                    ("admin_level", "8"),
                    ("name", "Elsewhere"),
                ]),
                members: vec![member(7, "outer")],
            },
        );
        // without a name the first relation at the level is taken
        assert!(matches!(
            boundary_polygon(&dataset, &Config::default()),
            Err(Error::NoOuterWays(98))
        ));

        let config = Config {
            boundary_name: Some("Town".into()),
            ..Config::default()
        };
        let feature = boundary(&dataset, &config).unwrap();
        assert_eq!(feature.property("osm_id"), Some(&json!(100)));

        let config = Config {
            boundary_name: Some("Nowhere".into()),
            ..Config::default()
        };
        assert!(matches!(
            boundary_polygon(&dataset, &config),
            Err(Error::NoBoundaryRelation)
        ));
    }

    #[test]
    fn features_matching_a_selector() {
        let dataset = Dataset {
            nodes: vec![
                TaggedNode {
                    id: 1,
                    lon: 0.5,
                    lat: 0.5,
                    tags: tags(&[("barrier", "cycle_barrier"), ("access", "yes")]),
                },
                TaggedNode {
                    id: 2,
                    lon: 0.6,
                    lat: 0.6,
                    tags: tags(&[("traffic_calming", "bump")]),
                },
                TaggedNode {
                    id: 3,
                    lon: 0.7,
                    lat: 0.7,
                    tags: tags(&[("barrier", "gate")]),
                },
            ],
            ways: vec![
                way(10, &[("railway", "tram"), ("embedded_rails", "tram")], vec![(0., 0.), (1., 0.)]),
                way(11, &[("highway", "residential")], vec![(0., 0.), (0., 1.)]),
            ],
            ..Dataset::default()
        };
        let groups = filter::parse("barrier~cycle_barrier,traffic_calming,embedded_rails~tram");
        let features = tagged_features(&dataset, &groups);
        let ids: Vec<_> = features
            .iter()
            .map(|f| f.property("osm_id").cloned())
            .collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(2)), Some(json!(10))]);

        assert_eq!(features[0].property("barrier"), Some(&json!("cycle_barrier")));
        assert_eq!(features[0].property("access"), None);
        assert_eq!(features[1].property("traffic_calming"), Some(&json!("bump")));
        assert_eq!(features[2].geometry.type_name(), "LineString");
        assert_eq!(features[2].property("embedded_rails"), Some(&json!("tram")));
    }

    #[test]
    fn boundary_errors() {
        let dataset = Dataset::default();
        assert!(matches!(
            boundary_polygon(&dataset, &Config::default()),
            Err(Error::NoBoundaryRelation)
        ));

        let mut dataset = boundary_dataset();
        dataset.ways.clear();
        assert!(matches!(
            boundary_polygon(&dataset, &Config::default()),
            Err(Error::NoOuterWays(100))
        ));
    }

    #[test]
    fn local_routes_are_clipped_and_deduplicated() {
        let boundary = BoundaryPolygon::from_rings(&[vec![
            (0., 0.),
            (10., 0.),
            (10., 10.),
            (0., 10.),
            (0., 0.),
        ]]);
        let route = TaggedRelation {
            id: 50,
            tags: tags(&[("route", "bicycle"), ("network", "lcn")]),
            members: vec![member(1, ""), member(2, "")],
        };
        let dataset = Dataset {
            ways: vec![
                way(1, &[("lcn", "yes")], vec![(5., 5.), (15., 5.)]),
                way(2, &[("highway", "residential")], vec![(1., 1.), (2., 2.)]),
                way(3, &[("highway", "residential")], vec![(3., 3.), (4., 4.)]),
                way(4, &[("lcn", "yes")], vec![(20., 20.), (30., 30.)]),
            ],
            relations: vec![route],
            ..Dataset::default()
        };
        let features = local_routes(&dataset, &boundary);
        assert_eq!(features.len(), 2);
        assert_eq!(
            features[0].geometry,
            Geometry::LineString {
                coordinates: vec![(5., 5.), (10., 5.)]
            }
        );
        assert_eq!(features[1].property("osm_id"), Some(&json!(2)));
    }
}
