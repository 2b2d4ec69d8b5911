use super::error::Error;
use super::geo::BoundaryPolygon;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::convert::TryFrom;

pub type Properties = BTreeMap<String, Value>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: (f64, f64),
    },
    LineString {
        coordinates: Vec<(f64, f64)>,
    },
    Polygon {
        coordinates: Vec<Vec<(f64, f64)>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<(f64, f64)>>>,
    },
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::LineString { .. } => "LineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub struct Feature {
    pub properties: Properties,
    pub geometry: Geometry,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Properties) -> Self {
        Feature {
            properties,
            geometry,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl TryFrom<&Geometry> for BoundaryPolygon {
    type Error = Error;

    fn try_from(geometry: &Geometry) -> Result<Self, Self::Error> {
        match geometry {
            Geometry::Polygon { coordinates } => Ok(BoundaryPolygon::new(&[coordinates.clone()])),
            Geometry::MultiPolygon { coordinates } => Ok(BoundaryPolygon::new(coordinates)),
            other => Err(Error::InvalidBoundary(other.type_name())),
        }
    }
}

impl TryFrom<&FeatureCollection> for BoundaryPolygon {
    type Error = Error;

    /// The boundary is the geometry of the first feature.
    fn try_from(collection: &FeatureCollection) -> Result<Self, Self::Error> {
        let feature = collection
            .features
            .first()
            .ok_or(Error::InvalidBoundary("empty FeatureCollection"))?;
        BoundaryPolygon::try_from(&feature.geometry)
    }
}

impl From<&BoundaryPolygon> for Geometry {
    fn from(boundary: &BoundaryPolygon) -> Self {
        let mut polygons = boundary.coordinates();
        if polygons.len() == 1 {
            Geometry::Polygon {
                coordinates: polygons.remove(0),
            }
        } else {
            Geometry::MultiPolygon {
                coordinates: polygons,
            }
        }
    }
}
