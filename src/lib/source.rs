use super::error::{Error, Result};
use super::filter::{Filter, Group};
use super::items::{Dataset, Member, MemberType, TaggedNode, TaggedRelation, TaggedWay};
use super::tags::Tags;
use log::{debug, info};
use osmpbfreader::objects::{NodeId, OsmId, OsmObj};
use osmpbfreader::OsmPbfReader;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek};

#[derive(Deserialize, Debug, Clone, Copy)]
struct LatLon {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize, Debug)]
struct OverpassMember {
    #[serde(rename = "type")]
    member_type: String,
    #[serde(rename = "ref")]
    id: i64,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        #[serde(default)]
        tags: Tags,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        geometry: Vec<Option<LatLon>>,
        #[serde(default)]
        tags: Tags,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<OverpassMember>,
        #[serde(default)]
        tags: Tags,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct Response {
    #[serde(default)]
    elements: Vec<Element>,
}

fn to_coordinates(geometry: &[Option<LatLon>]) -> Vec<(f64, f64)> {
    geometry
        .iter()
        .flatten()
        .map(|point| (point.lon, point.lat))
        .collect()
}

fn member_type(name: &str) -> Option<MemberType> {
    match name {
        "node" => Some(MemberType::Node),
        "way" => Some(MemberType::Way),
        "relation" => Some(MemberType::Relation),
        _ => None,
    }
}

fn overpass_member(member: OverpassMember) -> Option<Member> {
    let member_type = member_type(&member.member_type)?;
    let coordinates = match (member.lon, member.lat) {
        (Some(lon), Some(lat)) => vec![(lon, lat)],
        _ => to_coordinates(&member.geometry),
    };
    Some(Member {
        member_type,
        id: member.id,
        role: member.role,
        coordinates,
    })
}

/// Decodes an Overpass API JSON response, as produced by `[out:json]` with
/// `out geom` or `out body` plus the referenced nodes.
pub fn read_overpass(reader: impl Read) -> Result<Dataset> {
    let response: Response = serde_json::from_reader(reader)?;
    let mut dataset = Dataset::default();
    for element in response.elements {
        match element {
            Element::Node { id, lat, lon, tags } => {
                if let (Some(lon), Some(lat)) = (lon, lat) {
                    dataset.nodes.push(TaggedNode { id, lon, lat, tags });
                }
            }
            Element::Way {
                id,
                nodes,
                geometry,
                tags,
            } => {
                let coordinates = to_coordinates(&geometry);
                dataset.ways.push(TaggedWay {
                    id,
                    tags,
                    nodes,
                    coordinates,
                });
            }
            Element::Relation { id, members, tags } => {
                let members = members.into_iter().filter_map(overpass_member).collect();
                dataset.relations.push(TaggedRelation { id, tags, members });
            }
            Element::Other => (),
        }
    }
    resolve_way_geometry(&mut dataset);
    info!(
        "read {} nodes, {} ways and {} relations from overpass json",
        dataset.nodes.len(),
        dataset.ways.len(),
        dataset.relations.len()
    );
    Ok(dataset)
}

/// Fills in the geometry of ways that only carry node ids.
fn resolve_way_geometry(dataset: &mut Dataset) {
    let positions: HashMap<i64, (f64, f64)> = dataset
        .nodes
        .iter()
        .map(|node| (node.id, (node.lon, node.lat)))
        .collect();
    for way in dataset.ways.iter_mut() {
        if way.coordinates.is_empty() && !way.nodes.is_empty() {
            way.coordinates = way
                .nodes
                .iter()
                .filter_map(|id| positions.get(id).copied())
                .collect();
        }
    }
}

fn pbf_error(e: impl std::fmt::Display) -> Error {
    Error::Pbf(e.to_string())
}

fn get_coordinates(objs: &BTreeMap<OsmId, OsmObj>, node_ids: &[NodeId]) -> Vec<(f64, f64)> {
    node_ids
        .iter()
        .filter_map(|id| {
            let obj = objs.get(&OsmId::Node(*id))?;
            obj.node()
        })
        .map(|node| (node.lon(), node.lat()))
        .collect()
}

fn to_member(osm_ref: &osmpbfreader::objects::Ref) -> Member {
    let (member_type, id) = match osm_ref.member {
        OsmId::Node(id) => (MemberType::Node, id.0),
        OsmId::Way(id) => (MemberType::Way, id.0),
        OsmId::Relation(id) => (MemberType::Relation, id.0),
    };
    Member {
        member_type,
        id,
        role: osm_ref.role.to_string(),
        coordinates: vec![],
    }
}

/// Nodes are only kept when they match `groups`, ways and relations are kept
/// along with the dependencies of matching elements.
fn to_dataset(objs: &BTreeMap<OsmId, OsmObj>, groups: &[Group]) -> Dataset {
    let mut dataset = Dataset::default();
    for obj in objs.values() {
        match obj {
            OsmObj::Node(node) => {
                if obj.filter(groups) {
                    dataset.nodes.push(TaggedNode {
                        id: node.id.0,
                        lon: node.lon(),
                        lat: node.lat(),
                        tags: (&node.tags).into(),
                    });
                }
            }
            OsmObj::Way(way) => {
                let coordinates = get_coordinates(objs, &way.nodes);
                dataset.ways.push(TaggedWay {
                    id: way.id.0,
                    tags: (&way.tags).into(),
                    nodes: way.nodes.iter().map(|id| id.0).collect(),
                    coordinates,
                });
            }
            OsmObj::Relation(relation) => {
                dataset.relations.push(TaggedRelation {
                    id: relation.id.0,
                    tags: (&relation.tags).into(),
                    members: relation.refs.iter().map(to_member).collect(),
                });
            }
        }
    }
    dataset
}

/// Reads the elements matching `groups` and everything they reference.
pub fn read_pbf(file: impl Seek + Read, groups: &[Group]) -> Result<Dataset> {
    let mut pbf = OsmPbfReader::new(file);
    let objs = pbf
        .get_objs_and_deps(|obj| obj.filter(groups))
        .map_err(pbf_error)?;
    let dataset = to_dataset(&objs, groups);
    info!(
        "read {} nodes, {} ways and {} relations from pbf",
        dataset.nodes.len(),
        dataset.ways.len(),
        dataset.relations.len()
    );
    Ok(dataset)
}

/// Reads the nodes matching `groups` together with every way passing
/// through them. Takes two passes over the file.
pub fn read_pbf_with_parent_ways(file: impl Seek + Read, groups: &[Group]) -> Result<Dataset> {
    let mut pbf = OsmPbfReader::new(file);
    let nodes = pbf
        .get_objs_and_deps(|obj| obj.node().is_some() && obj.filter(groups))
        .map_err(pbf_error)?;
    let node_ids: HashSet<NodeId> = nodes
        .values()
        .filter_map(|obj| obj.node())
        .map(|node| node.id)
        .collect();
    debug!("{} matching nodes, looking up parent ways", node_ids.len());

    pbf.rewind().map_err(pbf_error)?;
    let objs = pbf
        .get_objs_and_deps(|obj| match obj {
            OsmObj::Node(node) => node_ids.contains(&node.id),
            OsmObj::Way(way) => way.nodes.iter().any(|id| node_ids.contains(id)),
            OsmObj::Relation(_) => false,
        })
        .map_err(pbf_error)?;
    let dataset = to_dataset(&objs, groups);
    info!(
        "read {} nodes and {} parent ways from pbf",
        dataset.nodes.len(),
        dataset.ways.len()
    );
    Ok(dataset)
}

/// Reads a `.pbf` or Overpass `.json` file. Pbf reads are narrowed down by
/// `groups`, Overpass responses are taken as they are.
pub fn read(path: &str, groups: &[Group], with_parent_ways: bool) -> Result<Dataset> {
    if path.ends_with(".pbf") {
        let file = File::open(path)?;
        if with_parent_ways {
            read_pbf_with_parent_ways(file, groups)
        } else {
            read_pbf(file, groups)
        }
    } else if path.ends_with(".json") {
        read_overpass(BufReader::new(File::open(path)?))
    } else {
        Err(Error::UnsupportedInput(path.to_string()))
    }
}
