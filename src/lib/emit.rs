use super::classify::{classify_way, interpret, Facility, FacilityDescriptor, Kind};
use super::config::Config;
use super::error::{Error, Result};
use super::geojson::{Feature, Geometry, Properties};
use super::items::{TaggedNode, TaggedWay};
use log::debug;
use serde_json::{json, Value};

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Flat properties of a facility, as consumed by the map layers.
pub fn properties(descriptor: &FacilityDescriptor, config: &Config) -> Properties {
    let mut properties = Properties::new();
    properties.insert("kind".into(), json!(descriptor.kind.to_string()));
    match descriptor.kind {
        Kind::Path => {
            if let Some(side) = descriptor.side {
                properties.insert("trackSide".into(), json!(side.to_string()));
            }
        }
        Kind::Lane => {
            if let Some(side) = descriptor.side {
                properties.insert("laneSide".into(), json!(side.to_string()));
            }
            let width = descriptor.width.unwrap_or(config.default_lane_width);
            properties.insert("laneWidth".into(), json!(width));
        }
    }
    if let Some(segregated) = descriptor.segregated {
        properties.insert("segregated".into(), json!(yes_no(segregated)));
    }
    properties.insert(
        "effectiveOneway".into(),
        json!(descriptor.effective_oneway.to_string()),
    );
    properties.insert("oneway".into(), json!(descriptor.oneway));
    properties
}

/// A line feature for one facility of a way.
pub fn emit_line(
    way: &TaggedWay,
    descriptor: &FacilityDescriptor,
    config: &Config,
) -> Result<Feature> {
    if way.coordinates.len() < 2 {
        return Err(Error::TooFewCoordinates(way.id, way.coordinates.len()));
    }
    let mut properties = properties(descriptor, config);
    properties.insert("osm_id".into(), json!(way.id));
    let geometry = Geometry::LineString {
        coordinates: way.coordinates.clone(),
    };
    Ok(Feature::new(geometry, properties))
}

/// Line features for a facility, one per side when it sits on both.
pub fn emit_facility(way: &TaggedWay, facility: &Facility, config: &Config) -> Result<Vec<Feature>> {
    facility
        .expand(config)
        .iter()
        .map(|descriptor| emit_line(way, descriptor, config))
        .collect()
}

/// Classifies a way and emits its facilities. Ways without a usable line
/// geometry are skipped.
pub fn emit_way(way: &TaggedWay, config: &Config) -> Vec<Feature> {
    if way.coordinates.len() < 2 {
        if !classify_way(&way.tags, config).is_empty() {
            debug!(
                "skipping way {} with {} coordinates",
                way.id,
                way.coordinates.len()
            );
        }
        return vec![];
    }
    interpret(&way.tags)
        .iter()
        .filter_map(|facility| emit_facility(way, facility, config).ok())
        .flatten()
        .collect()
}

/// A plain line feature for a way, without classification.
pub fn line_feature(way: &TaggedWay, mut properties: Properties) -> Option<Feature> {
    if way.coordinates.len() < 2 {
        return None;
    }
    properties.insert("osm_id".into(), json!(way.id));
    let geometry = Geometry::LineString {
        coordinates: way.coordinates.clone(),
    };
    Some(Feature::new(geometry, properties))
}

pub fn point_feature(node: &TaggedNode, extra: Properties) -> Option<Feature> {
    if !node.lon.is_finite() || !node.lat.is_finite() {
        return None;
    }
    let mut properties = Properties::new();
    properties.insert("osm_id".into(), json!(node.id));
    properties.insert("osm_type".into(), Value::from("node"));
    properties.extend(extra);
    let geometry = Geometry::Point {
        coordinates: (node.lon, node.lat),
    };
    Some(Feature::new(geometry, properties))
}
