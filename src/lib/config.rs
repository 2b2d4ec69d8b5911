use super::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::TryFrom;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenericLanePlacement {
    Left,
    Right,
    Both,
}

/// Jurisdiction specific defaults for the classification and pipelines.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Where a plain `cycleway=lane` without side qualifier is placed. Left
    /// for left-hand traffic.
    pub generic_lane_placement: GenericLanePlacement,
    /// Lane width in meters surfaced when none is tagged.
    pub default_lane_width: f64,
    /// Highway classes carrying motor traffic, preferred when picking the
    /// approach bearing of an ASL.
    pub motorised_highways: BTreeSet<String>,
    /// Preferred `admin_level` when several boundary relations match.
    pub boundary_admin_level: String,
    /// Only consider boundary relations with this `name`.
    pub boundary_name: Option<String>,
    /// Tolerance in degrees for matching ring fragment endpoints.
    pub stitch_epsilon: f64,
    pub infer_fatal_cyclist: bool,
    /// Leave out paths tagged `mtb=yes` or with an `mtb:scale` of 1 and up.
    pub exclude_mountain_bike_trails: bool,
    pub parallelize: bool,
}

pub const DEFAULT_MOTORISED_HIGHWAYS: [&str; 9] = [
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "living_street",
    "service",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            generic_lane_placement: GenericLanePlacement::Left,
            default_lane_width: 1.2,
            motorised_highways: DEFAULT_MOTORISED_HIGHWAYS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            boundary_admin_level: "8".into(),
            boundary_name: None,
            stitch_epsilon: 1e-6,
            infer_fatal_cyclist: true,
            exclude_mountain_bike_trails: true,
            parallelize: true,
        }
    }
}

impl Config {
    pub fn is_motorised(&self, highway: &str) -> bool {
        self.motorised_highways.contains(highway)
    }

    fn validate(self) -> Result<Self, Error> {
        if !(self.default_lane_width > 0.) {
            return Err(Error::Configuration(format!(
                "default_lane_width must be positive, got {}",
                self.default_lane_width
            )));
        }
        if !(self.stitch_epsilon >= 0.) {
            return Err(Error::Configuration(format!(
                "stitch_epsilon must not be negative, got {}",
                self.stitch_epsilon
            )));
        }
        Ok(self)
    }

    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s)
            .map_err(|e| Error::Configuration(format!("failure decoding toml: {}", e)))?;
        config.validate()
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(s)
            .map_err(|e| Error::Configuration(format!("failure decoding json: {}", e)))?;
        config.validate()
    }
}

impl TryFrom<&str> for Config {
    type Error = Error;

    /// Loads a config file, `.toml` or `.json`.
    fn try_from(f: &str) -> Result<Self, Self::Error> {
        let read = || {
            std::fs::read_to_string(f)
                .map_err(|e| Error::Configuration(format!("failure reading {}: {}", f, e)))
        };
        if f.ends_with(".toml") {
            Config::from_toml(&read()?)
        } else if f.ends_with(".json") {
            Config::from_json(&read()?)
        } else {
            Err(Error::Configuration(format!("unsupported file type: {}", f)))
        }
    }
}
