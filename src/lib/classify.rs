use super::config::{Config, GenericLanePlacement};
use super::rules::{Chain, Rule};
use super::tags::{is_no, parse_bool, parse_width, Tags, CYCLEWAY, HIGHWAY};
use serde::Serialize;
use std::fmt;

const CYCLEWAY_LEFT: &str = "cycleway:left";
const CYCLEWAY_RIGHT: &str = "cycleway:right";
const CYCLEWAY_BOTH: &str = "cycleway:both";

const CYCLEWAY_ONEWAY_KEYS: [&str; 4] = [
    "cycleway:oneway",
    "cycleway:both:oneway",
    "cycleway:left:oneway",
    "cycleway:right:oneway",
];

const SEGREGATION_KEYS: [&str; 4] = [
    "segregated",
    "cycleway:segregated",
    "cycleway:left:segregated",
    "cycleway:right:segregated",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Off-carriageway infrastructure: cycleways, shared paths, tracks.
    Path,
    /// Painted on-carriageway lane.
    Lane,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Side(Side),
    /// Present on both sides, expanded into one descriptor per side.
    Both,
    /// No side tagged. Paths stay undifferentiated, lanes take the
    /// configured default.
    Unspecified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Oneway {
    Yes,
    No,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Path => write!(f, "path"),
            Kind::Lane => write!(f, "lane"),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

impl fmt::Display for Oneway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oneway::Yes => write!(f, "yes"),
            Oneway::No => write!(f, "no"),
        }
    }
}

/// Lane widths as resolved for each side of the way.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Widths {
    pub left: Option<f64>,
    pub right: Option<f64>,
}

impl Widths {
    fn resolve(tags: &Tags) -> Self {
        Widths {
            left: side_width(Side::Left).resolve(tags),
            right: side_width(Side::Right).resolve(tags),
        }
    }

    pub fn on(&self, side: Side) -> Option<f64> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// A facility as read from the tags, before side expansion.
#[derive(Clone, Debug, PartialEq)]
pub struct Facility {
    pub kind: Kind,
    pub placement: Placement,
    pub segregated: Option<bool>,
    pub widths: Widths,
    pub effective_oneway: Oneway,
    pub oneway: String,
}

/// A facility on a concrete side (or an undifferentiated path).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityDescriptor {
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segregated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    pub effective_oneway: Oneway,
    pub oneway: String,
}

impl Facility {
    fn on(&self, side: Option<Side>) -> FacilityDescriptor {
        FacilityDescriptor {
            kind: self.kind,
            side,
            segregated: self.segregated,
            width: side.and_then(|side| self.widths.on(side)),
            effective_oneway: self.effective_oneway,
            oneway: self.oneway.clone(),
        }
    }

    /// Resolves the placement into per-side descriptors.
    pub fn expand(&self, config: &Config) -> Vec<FacilityDescriptor> {
        let both = || vec![self.on(Some(Side::Left)), self.on(Some(Side::Right))];
        match (self.placement, self.kind) {
            (Placement::Side(side), _) => vec![self.on(Some(side))],
            (Placement::Both, _) => both(),
            (Placement::Unspecified, Kind::Path) => vec![self.on(None)],
            (Placement::Unspecified, Kind::Lane) => match config.generic_lane_placement {
                GenericLanePlacement::Left => vec![self.on(Some(Side::Left))],
                GenericLanePlacement::Right => vec![self.on(Some(Side::Right))],
                GenericLanePlacement::Both => both(),
            },
        }
    }
}

fn indicates_lane(value: Option<&str>) -> bool {
    value.map_or(false, |v| v.contains("lane"))
}

fn is_under_construction(tags: &Tags) -> bool {
    tags.is(HIGHWAY, "construction") || tags.contains_key("construction")
}

fn has_track(tags: &Tags) -> bool {
    [CYCLEWAY, CYCLEWAY_LEFT, CYCLEWAY_RIGHT, CYCLEWAY_BOTH]
        .iter()
        .any(|key| tags.is(key, "track"))
}

fn is_path(tags: &Tags) -> bool {
    let cycle_highway = tags.is(HIGHWAY, "cycleway");
    let designated_path = tags.is_any(HIGHWAY, &["path", "pedestrian"])
        && tags.is_any("bicycle", &["designated", "yes"]);
    cycle_highway || designated_path || has_track(tags)
}

/// Which of the side keys tag a lane.
struct LaneTagging {
    left: bool,
    right: bool,
    both: bool,
    generic: bool,
}

impl LaneTagging {
    fn new(tags: &Tags) -> Self {
        let left = indicates_lane(tags.get(CYCLEWAY_LEFT));
        let right = indicates_lane(tags.get(CYCLEWAY_RIGHT));
        let both = indicates_lane(tags.get(CYCLEWAY_BOTH));
        let generic = indicates_lane(tags.get(CYCLEWAY)) && !left && !right && !both;
        LaneTagging {
            left,
            right,
            both,
            generic,
        }
    }

    fn single_sided(&self) -> bool {
        !self.both && self.left != self.right
    }
}

fn oneway_value(value: &str) -> Option<Oneway> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" | "-1" => Some(Oneway::Yes),
        v if is_no(v) => Some(Oneway::No),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn highway_oneway() -> Chain<Oneway> {
    Chain::of_keys(&["oneway:bicycle", "oneway"], oneway_value)
}

fn surfaced_oneway() -> Chain<String> {
    Chain::of_keys(&["oneway:bicycle", "oneway"], non_empty)
}

fn segregation() -> Chain<bool> {
    Chain::of_keys(&SEGREGATION_KEYS, parse_bool)
}

fn side_width(side: Side) -> Chain<f64> {
    Chain::new(vec![
        Rule::new(format!("cycleway:{}:width", side), parse_width),
        Rule::new("cycleway:both:width", parse_width),
        Rule::new("cycleway:width", parse_width),
    ])
}

/// Explicit cycleway oneway tags first ("no" anywhere wins), then the
/// structural defaults, then the road's own oneway.
pub fn effective_oneway(tags: &Tags) -> Oneway {
    let explicit: Vec<&str> = CYCLEWAY_ONEWAY_KEYS
        .iter()
        .filter_map(|key| tags.get(key))
        .collect();
    if explicit.iter().any(|v| is_no(v)) {
        return Oneway::No;
    }
    if !explicit.is_empty() {
        return Oneway::Yes;
    }

    let lanes = LaneTagging::new(tags);
    if lanes.generic || lanes.both || lanes.single_sided() || is_path(tags) {
        return Oneway::Yes;
    }
    highway_oneway().resolve(tags).unwrap_or(Oneway::No)
}

fn path_facilities(tags: &Tags, effective_oneway: Oneway, oneway: &str) -> Vec<Facility> {
    let both = tags.is(CYCLEWAY_BOTH, "track");
    let left = tags.is(CYCLEWAY_LEFT, "track");
    let right = tags.is(CYCLEWAY_RIGHT, "track");
    let placement = match (both || (left && right), left, right) {
        (true, _, _) => Placement::Both,
        (false, true, _) => Placement::Side(Side::Left),
        (false, _, true) => Placement::Side(Side::Right),
        _ => Placement::Unspecified,
    };

    let tagged = SEGREGATION_KEYS.iter().any(|key| tags.contains_key(key));
    let segregated = if tagged {
        segregation().resolve(tags)
    } else if tags.is_any("foot", &["no", "discouraged"]) {
        Some(true)
    } else {
        None
    };

    vec![Facility {
        kind: Kind::Path,
        placement,
        segregated,
        widths: Widths::default(),
        effective_oneway,
        oneway: oneway.to_string(),
    }]
}

fn lane_facilities(tags: &Tags, effective_oneway: Oneway, oneway: &str) -> Vec<Facility> {
    let lanes = LaneTagging::new(tags);
    let placement = match (lanes.left || lanes.both, lanes.right || lanes.both) {
        (true, true) => Placement::Both,
        (true, false) => Placement::Side(Side::Left),
        (false, true) => Placement::Side(Side::Right),
        (false, false) if lanes.generic => Placement::Unspecified,
        (false, false) => return vec![],
    };
    vec![Facility {
        kind: Kind::Lane,
        placement,
        segregated: None,
        widths: Widths::resolve(tags),
        effective_oneway,
        oneway: oneway.to_string(),
    }]
}

/// Reads the facilities a way carries, without expanding sides.
pub fn interpret(tags: &Tags) -> Vec<Facility> {
    if is_under_construction(tags) {
        return vec![];
    }
    let effective_oneway = effective_oneway(tags);
    let oneway = surfaced_oneway()
        .resolve(tags)
        .unwrap_or_else(|| effective_oneway.to_string());

    if is_path(tags) {
        path_facilities(tags, effective_oneway, &oneway)
    } else {
        lane_facilities(tags, effective_oneway, &oneway)
    }
}

/// Off-road paths tagged for mountain biking. Ways with a track alongside a
/// road are never trails.
pub fn is_mountain_bike_trail(tags: &Tags) -> bool {
    if has_track(tags) || !is_path(tags) {
        return false;
    }
    let graded = tags
        .get("mtb:scale")
        .and_then(|scale| scale.chars().next())
        .map_or(false, |c| ('1'..='9').contains(&c));
    tags.is("mtb", "yes") || graded
}

/// Classifies a way into per-side facility descriptors.
pub fn classify_way(tags: &Tags, config: &Config) -> Vec<FacilityDescriptor> {
    interpret(tags)
        .iter()
        .flat_map(|facility| facility.expand(config))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Unspecified,
}

impl Direction {
    /// Turns the bearing of travel along a way into the bearing the node
    /// faces.
    pub fn orient(self, bearing: f64) -> f64 {
        match self {
            Direction::Backward => (bearing + 180.) % 360.,
            Direction::Forward | Direction::Unspecified => bearing,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeFacility {
    /// Advanced stop line at a junction approach.
    AdvancedStopLine { direction: Direction },
}

pub fn classify_node(tags: &Tags) -> Option<NodeFacility> {
    if !tags.is(CYCLEWAY, "asl") {
        return None;
    }
    let direction = match tags.get("direction").map(str::to_lowercase).as_deref() {
        Some("forward") => Direction::Forward,
        Some("backward") => Direction::Backward,
        _ => Direction::Unspecified,
    };
    Some(NodeFacility::AdvancedStopLine { direction })
}
