use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("failure reading .pbf file: {0}")]
    Pbf(String),
    #[error("failure decoding overpass json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failure reading or writing data: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported input file type: {0}")]
    UnsupportedInput(String),
    #[error("way {0} has {1} coordinates, at least 2 are required for a line")]
    TooFewCoordinates(i64, usize),
    #[error("no administrative boundary relation found")]
    NoBoundaryRelation,
    #[error("boundary relation {0} has no usable outer ways")]
    NoOuterWays(i64),
    #[error("geometry of type {0} cannot be used as a boundary")]
    InvalidBoundary(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
