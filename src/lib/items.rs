use super::tags::Tags;

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedNode {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedWay {
    pub id: i64,
    pub tags: Tags,
    /// Node ids in way order. May be empty when the source only provides
    /// geometry.
    pub nodes: Vec<i64>,
    pub coordinates: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub member_type: MemberType,
    pub id: i64,
    pub role: String,
    /// Inline member geometry, if the source resolved it.
    pub coordinates: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRelation {
    pub id: i64,
    pub tags: Tags,
    pub members: Vec<Member>,
}

/// The elements read from one source.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub nodes: Vec<TaggedNode>,
    pub ways: Vec<TaggedWay>,
    pub relations: Vec<TaggedRelation>,
}

impl TaggedWay {
    pub fn new(id: i64, tags: Tags, coordinates: Vec<(f64, f64)>) -> Self {
        TaggedWay {
            id,
            tags,
            nodes: vec![],
            coordinates,
        }
    }

    /// Index of a node within the way, by id when node ids are known,
    /// otherwise by location.
    pub fn position_of(&self, node: &TaggedNode, epsilon: f64) -> Option<usize> {
        if self.nodes.len() == self.coordinates.len() && !self.nodes.is_empty() {
            return self.nodes.iter().position(|&id| id == node.id);
        }
        self.coordinates.iter().position(|&(lon, lat)| {
            (lon - node.lon).abs() < epsilon && (lat - node.lat).abs() < epsilon
        })
    }
}

impl Dataset {
    pub fn way(&self, id: i64) -> Option<&TaggedWay> {
        self.ways.iter().find(|way| way.id == id)
    }

    /// Geometry of a relation member, inline or from the referenced way.
    pub fn member_coordinates<'a>(&'a self, member: &'a Member) -> Option<&'a [(f64, f64)]> {
        if !member.coordinates.is_empty() {
            return Some(&member.coordinates);
        }
        if member.member_type != MemberType::Way {
            return None;
        }
        self.way(member.id).map(|way| way.coordinates.as_slice())
    }
}
