use super::config::Config;
use super::geo::BoundaryPolygon;
use super::geojson::{Feature, Geometry, Properties};
use log::info;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

const PEDAL_CYCLE: &str = "1";
const FATAL: &str = "1";

/// Codes arrive as strings or numbers depending on the conversion.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Blank and malformed values read as absent.
fn number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    })
}

/// One row of the national road casualty tables, already parsed into JSON.
/// Coordinates are WGS84.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Collision {
    #[serde(deserialize_with = "text")]
    pub collision_index: String,
    #[serde(deserialize_with = "number")]
    pub longitude: Option<f64>,
    #[serde(deserialize_with = "number")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "text")]
    pub date: String,
    #[serde(deserialize_with = "text")]
    pub time: String,
    #[serde(deserialize_with = "text")]
    pub collision_severity: String,
    #[serde(deserialize_with = "text")]
    pub enhanced_severity_collision: String,
    #[serde(deserialize_with = "number")]
    pub number_of_casualties: Option<u32>,
    #[serde(deserialize_with = "number")]
    pub number_of_vehicles: Option<u32>,
    #[serde(deserialize_with = "text")]
    pub road_type: String,
    #[serde(deserialize_with = "text")]
    pub light_conditions: String,
    #[serde(deserialize_with = "text")]
    pub weather_conditions: String,
    #[serde(deserialize_with = "text")]
    pub urban_or_rural_area: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Vehicle {
    #[serde(deserialize_with = "text")]
    pub collision_index: String,
    #[serde(deserialize_with = "text")]
    pub vehicle_reference: String,
    #[serde(deserialize_with = "text")]
    pub vehicle_type: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Casualty {
    #[serde(deserialize_with = "text")]
    pub collision_index: String,
    #[serde(deserialize_with = "text")]
    pub vehicle_reference: String,
}

impl Collision {
    pub fn is_fatal(&self) -> bool {
        self.collision_severity == FATAL || self.enhanced_severity_collision == FATAL
    }

    fn position(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Some((lon, lat)),
            _ => None,
        }
    }
}

pub fn vehicle_type_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "2" => "Motorcycle ≤50cc",
        "3" => "Motorcycle ≤125cc",
        "4" => "Motorcycle ≤500cc",
        "5" => "Motorcycle >500cc",
        "8" => "Taxi/Private hire",
        "9" => "Car",
        "10" => "Minibus",
        "11" => "Bus/Coach",
        "16" => "Horse",
        "17" => "Agricultural",
        "18" => "Tram",
        "19" => "Van ≤3.5t",
        "20" => "Goods 3.5–7.5t",
        "21" => "Goods >7.5t",
        "22" => "Mobility scooter",
        "23" => "E-motorcycle/scooter",
        "90" => "Other motor vehicle",
        "97" => "Motor unknown",
        "98" => "Goods unknown weight",
        "99" => "Unknown vehicle",
        _ => return None,
    };
    Some(label)
}

/// Cyclist casualty count of one collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclistCasualties {
    pub count: usize,
    pub inferred: bool,
}

/// Links casualties and vehicles of a batch of collisions.
#[derive(Debug, Default)]
pub struct Linkage<'a> {
    pedal_cycles: HashMap<&'a str, HashSet<&'a str>>,
    other_vehicles: HashMap<&'a str, BTreeSet<&'a str>>,
    casualties: HashMap<&'a str, usize>,
    cyclists: HashMap<&'a str, usize>,
}

impl<'a> Linkage<'a> {
    pub fn new(vehicles: &'a [Vehicle], casualties: &'a [Casualty]) -> Self {
        let mut linkage = Linkage::default();
        for vehicle in vehicles {
            let collision = vehicle.collision_index.as_str();
            if vehicle.vehicle_type == PEDAL_CYCLE {
                linkage
                    .pedal_cycles
                    .entry(collision)
                    .or_default()
                    .insert(vehicle.vehicle_reference.as_str());
            } else {
                linkage
                    .other_vehicles
                    .entry(collision)
                    .or_default()
                    .insert(vehicle.vehicle_type.as_str());
            }
        }
        for casualty in casualties {
            let collision = casualty.collision_index.as_str();
            *linkage.casualties.entry(collision).or_default() += 1;
            let by_cycle = linkage
                .pedal_cycles
                .get(collision)
                .map_or(false, |refs| refs.contains(casualty.vehicle_reference.as_str()));
            if by_cycle {
                *linkage.cyclists.entry(collision).or_default() += 1;
            }
        }
        linkage
    }

    pub fn involves_pedal_cycle(&self, collision: &Collision) -> bool {
        self.pedal_cycles
            .contains_key(collision.collision_index.as_str())
    }

    /// Casualties travelling on a pedal cycle. A fatal pedal cycle collision
    /// without a linked cyclist casualty counts one, if inference is enabled.
    pub fn cyclist_casualties(&self, collision: &Collision, config: &Config) -> CyclistCasualties {
        let count = self
            .cyclists
            .get(collision.collision_index.as_str())
            .copied()
            .unwrap_or(0);
        if count == 0
            && config.infer_fatal_cyclist
            && self.involves_pedal_cycle(collision)
            && collision.is_fatal()
        {
            return CyclistCasualties {
                count: 1,
                inferred: true,
            };
        }
        CyclistCasualties {
            count,
            inferred: false,
        }
    }

    /// Labels of the other vehicle types involved, sorted, joined by `; `.
    pub fn other_vehicle_types(&self, collision: &Collision) -> Option<String> {
        let types = self.other_vehicles.get(collision.collision_index.as_str())?;
        let mut labels: Vec<&str> = types.iter().filter_map(|t| vehicle_type_label(t)).collect();
        if labels.is_empty() {
            return None;
        }
        labels.sort_by_key(|label| label.to_lowercase());
        Some(labels.join("; "))
    }

    fn casualty_count(&self, collision: &Collision) -> u32 {
        match self.casualties.get(collision.collision_index.as_str()) {
            Some(&count) => count as u32,
            None => collision.number_of_casualties.unwrap_or(0),
        }
    }
}

/// Point features for collisions involving a pedal cycle, optionally limited
/// to a boundary.
pub fn collision_features(
    collisions: &[Collision],
    vehicles: &[Vehicle],
    casualties: &[Casualty],
    boundary: Option<&BoundaryPolygon>,
    config: &Config,
) -> Vec<Feature> {
    let linkage = Linkage::new(vehicles, casualties);
    let features: Vec<Feature> = collisions
        .iter()
        .filter(|collision| linkage.involves_pedal_cycle(collision))
        .filter_map(|collision| {
            let position = collision.position()?;
            if let Some(boundary) = boundary {
                if !boundary.contains(position) {
                    return None;
                }
            }
            let cyclists = linkage.cyclist_casualties(collision, config);
            let mut properties = Properties::new();
            properties.insert("accident_index".into(), json!(collision.collision_index));
            properties.insert("date".into(), json!(collision.date));
            properties.insert("time".into(), json!(collision.time));
            properties.insert("severity".into(), json!(collision.collision_severity));
            properties.insert("casualties".into(), json!(linkage.casualty_count(collision)));
            properties.insert("cyclist_casualties".into(), json!(cyclists.count));
            properties.insert("cyclist_casualties_inferred".into(), json!(cyclists.inferred));
            properties.insert(
                "vehicles".into(),
                json!(collision.number_of_vehicles.unwrap_or(0)),
            );
            properties.insert("road_type".into(), json!(collision.road_type));
            properties.insert("light_conditions".into(), json!(collision.light_conditions));
            properties.insert("weather".into(), json!(collision.weather_conditions));
            properties.insert("urban_or_rural".into(), json!(collision.urban_or_rural_area));
            if let Some(others) = linkage.other_vehicle_types(collision) {
                properties.insert("other_vehicle_types".into(), json!(others));
            }
            let geometry = Geometry::Point {
                coordinates: position,
            };
            Some(Feature::new(geometry, properties))
        })
        .collect();
    info!(
        "kept {} of {} collisions",
        features.len(),
        collisions.len()
    );
    features
}
