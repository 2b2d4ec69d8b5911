use super::items::{Dataset, TaggedNode, TaggedRelation, TaggedWay};
use super::tags::Tags;
use osmpbfreader::objects::OsmObj;
use smartstring::alias::String;

#[derive(PartialEq, Debug, Clone)]
pub enum Condition {
    TagPresence(String),
    ValueMatch(String, String),
    ValueMismatch(String, String),
}

impl Condition {
    pub fn new(tag: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            return Condition::ValueMatch(tag.into(), value.into());
        }
        Condition::TagPresence(tag.into())
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Group {
    pub conditions: Vec<Condition>,
}

impl Group {
    /// Keys a matching element is certain to carry.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().filter_map(|condition| match condition {
            Condition::TagPresence(key) | Condition::ValueMatch(key, _) => Some(key.as_str()),
            Condition::ValueMismatch(..) => None,
        })
    }
}

fn parse_condition(condition_str: &str) -> Condition {
    if let Some(idx) = condition_str.find("!~") {
        let key = &condition_str[..idx];
        let value = &condition_str[idx + 2..];
        return Condition::ValueMismatch(key.into(), value.into());
    }
    let split_str: Vec<&str> = condition_str.splitn(2, '~').collect();
    if split_str.len() < 2 {
        Condition::TagPresence(condition_str.into())
    } else {
        let key = split_str[0];
        let value = split_str[1];
        Condition::ValueMatch(key.into(), value.into())
    }
}

fn parse_group(group_str: &str) -> Group {
    let condition_strs: Vec<&str> = group_str.split('+').collect();
    let conditions = condition_strs.into_iter().map(parse_condition).collect();
    Group { conditions }
}

/// Parse an expression into filter groups
///
/// Stating a key (`highway`), will pick all elements which are tagged using that key.
/// To further narrow down the results, a specific value can be given using a `~` field
/// separator (`highway~cycleway`), or excluded using `!~` (`mtb!~yes`, which also keeps
/// elements without an `mtb` tag). Statements for the same element are combined using
/// the `+` operator (`highway~path+bicycle~designated`). Groups of statements are
/// separated by `,` (`highway~cycleway,lcn~yes`); an element matching either group is
/// selected.
///
/// # Example
///
/// ```
/// use osm_cycleways::filter::parse;
///
/// let groups = parse("highway~path+bicycle~designated+mtb!~yes,lcn~yes");
/// assert_eq!(groups.len(), 2);
/// let group = &groups[0];
/// assert_eq!(group.conditions.len(), 3);
/// ```
pub fn parse(selector_str: &str) -> Vec<Group> {
    let group_strs: Vec<&str> = selector_str.split(',').collect();
    group_strs.into_iter().map(parse_group).collect()
}

/// Read access to tags, shared by pbf objects and our own elements.
pub trait TagLookup {
    fn tag(&self, key: &str) -> Option<&str>;
}

impl TagLookup for Tags {
    fn tag(&self, key: &str) -> Option<&str> {
        self.get(key)
    }
}

impl TagLookup for osmpbfreader::objects::Tags {
    fn tag(&self, key: &str) -> Option<&str> {
        self.get(key).map(|value| value.as_str())
    }
}

fn check_condition(tags: &impl TagLookup, condition: &Condition) -> bool {
    match condition {
        Condition::TagPresence(key) => tags.tag(key).is_some(),
        Condition::ValueMatch(key, value) => tags.tag(key) == Some(value.as_str()),
        Condition::ValueMismatch(key, value) => tags.tag(key) != Some(value.as_str()),
    }
}

fn check_group(tags: &impl TagLookup, group: &Group) -> bool {
    group.conditions.iter().all(|c| check_condition(tags, c))
}

pub fn matches(tags: &impl TagLookup, groups: &[Group]) -> bool {
    groups.iter().any(|c| check_group(tags, c))
}

pub trait Filter {
    fn filter(&self, groups: &[Group]) -> bool;
}

impl Filter for OsmObj {
    fn filter(&self, groups: &[Group]) -> bool {
        matches(self.tags(), groups)
    }
}

impl Filter for TaggedNode {
    fn filter(&self, groups: &[Group]) -> bool {
        matches(&self.tags, groups)
    }
}

impl Filter for TaggedWay {
    fn filter(&self, groups: &[Group]) -> bool {
        matches(&self.tags, groups)
    }
}

impl Filter for TaggedRelation {
    fn filter(&self, groups: &[Group]) -> bool {
        matches(&self.tags, groups)
    }
}

/// Keeps the ways matching `groups`, nodes and relations are untouched.
/// An empty selector keeps everything.
pub fn select_ways(mut dataset: Dataset, groups: &[Group]) -> Dataset {
    if !groups.is_empty() {
        dataset.ways.retain(|way| way.filter(groups));
    }
    dataset
}

/// Keeps the relations matching `groups`.
pub fn select_relations(mut dataset: Dataset, groups: &[Group]) -> Dataset {
    if !groups.is_empty() {
        dataset.relations.retain(|relation| relation.filter(groups));
    }
    dataset
}
