use crate::projection::Crs;
use crate::types::RegionField;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("No regions have a {field} starting with {prefix:?}")]
    EmptyResult { field: RegionField, prefix: String },

    #[error("Unrecognised phase of education: {0:?}")]
    UnknownPhase(String),

    #[error("Unrecognised Ofsted rating: {0:?}")]
    UnknownRating(String),

    #[error("Coordinate ({x}, {y}) is outside the {crs} domain")]
    OutOfRange { x: f64, y: f64, crs: Crs },

    #[error("Download of {url} failed with HTTP status {status}")]
    DownloadStatus { url: String, status: u16 },
}
