use log::info;
use osm_cycleways::collisions::{collision_features, Casualty, Collision, Vehicle};
use osm_cycleways::config::Config;
use osm_cycleways::geo::BoundaryPolygon;
use osm_cycleways::geojson::{Feature, FeatureCollection};
use osm_cycleways::output::Output;
use osm_cycleways::{filter, source};
use serde::de::DeserializeOwned;
use std::convert::TryFrom;
use std::error::Error;
use std::fs::File;
use std::io::{stdout, BufReader, BufWriter, Write};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(about = "Maps cycle infrastructure from OpenStreetMap data")]
struct Opts {
    /// Configuration file, .toml or .json
    #[structopt(long, short)]
    config: Option<String>,
    /// Write to this file instead of stdout
    #[structopt(long, short)]
    output: Option<String>,
    /// Write one feature per line instead of a FeatureCollection
    #[structopt(long)]
    json_lines: bool,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Cycle paths, tracks and lanes as lines
    Cycleways {
        /// .pbf extract or Overpass .json response
        input: String,
        /// Selector for the ways to consider, e.g. "highway~cycleway"
        #[structopt(long, short)]
        filter: Option<String>,
    },
    /// Advanced stop lines as points with their approach bearing
    Asl {
        input: String,
        #[structopt(long, short)]
        filter: Option<String>,
    },
    /// The administrative boundary polygon
    Boundary {
        input: String,
        /// Selector for the boundary relation, e.g. "boundary~administrative+name~Sheffield"
        #[structopt(long, short)]
        filter: Option<String>,
    },
    /// Local cycle network ways clipped to a boundary
    Lcn {
        input: String,
        /// GeoJSON FeatureCollection holding the boundary
        #[structopt(long, short)]
        boundary: String,
    },
    /// Any nodes and ways matching a selector, e.g. "barrier~cycle_barrier"
    Features {
        input: String,
        #[structopt(long, short)]
        filter: String,
    },
    /// Collisions involving pedal cycles, from JSON record arrays
    Collisions {
        collisions: String,
        vehicles: String,
        casualties: String,
        #[structopt(long, short)]
        boundary: Option<String>,
    },
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn read_boundary(path: &str) -> Result<BoundaryPolygon, Box<dyn Error>> {
    let collection: FeatureCollection = read_json(path)?;
    Ok(BoundaryPolygon::try_from(&collection)?)
}

fn run(opts: Opts) -> Result<Vec<Feature>, Box<dyn Error>> {
    let config = match &opts.config {
        Some(path) => Config::try_from(path.as_str())?,
        None => Config::default(),
    };

    let features = match opts.cmd {
        Command::Cycleways { input, filter: selector } => {
            let selector = selector.as_deref().unwrap_or(osm_cycleways::CYCLEWAY_FILTER);
            let groups = filter::parse(selector);
            let dataset = source::read(&input, &groups, false)?;
            let dataset = filter::select_ways(dataset, &groups);
            osm_cycleways::cycleways(&dataset, &config)
        }
        Command::Asl { input, filter: selector } => {
            let selector = selector.as_deref().unwrap_or(osm_cycleways::ASL_FILTER);
            let groups = filter::parse(selector);
            let dataset = source::read(&input, &groups, true)?;
            osm_cycleways::asl_markers(&dataset, &config)
        }
        Command::Boundary { input, filter: selector } => {
            let selector = selector.as_deref().unwrap_or(osm_cycleways::BOUNDARY_FILTER);
            let groups = filter::parse(selector);
            let dataset = source::read(&input, &groups, false)?;
            let dataset = filter::select_relations(dataset, &groups);
            vec![osm_cycleways::boundary(&dataset, &config)?]
        }
        Command::Features { input, filter: selector } => {
            let groups = filter::parse(&selector);
            let dataset = source::read(&input, &groups, false)?;
            osm_cycleways::tagged_features(&dataset, &groups)
        }
        Command::Lcn { input, boundary } => {
            let boundary = read_boundary(&boundary)?;
            let groups = filter::parse(osm_cycleways::LOCAL_ROUTE_FILTER);
            let dataset = source::read(&input, &groups, false)?;
            osm_cycleways::local_routes(&dataset, &boundary)
        }
        Command::Collisions {
            collisions,
            vehicles,
            casualties,
            boundary,
        } => {
            let collisions: Vec<Collision> = read_json(&collisions)?;
            let vehicles: Vec<Vehicle> = read_json(&vehicles)?;
            let casualties: Vec<Casualty> = read_json(&casualties)?;
            let boundary = boundary.as_deref().map(read_boundary).transpose()?;
            collision_features(
                &collisions,
                &vehicles,
                &casualties,
                boundary.as_ref(),
                &config,
            )
        }
    };
    Ok(features)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let opts = Opts::from_args();
    let json_lines = opts.json_lines;
    let mut writer: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(stdout()),
    };

    let features = run(opts)?;
    info!("writing {} features", features.len());
    if json_lines {
        features.write_json_lines(&mut writer)?;
    } else {
        features.write_geojson(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}
