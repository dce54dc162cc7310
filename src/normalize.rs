use crate::projection::{reproject, Crs};
use crate::types::{RawSchool, School, SchoolAttributes};
use anyhow::{Context, Result};
use geo::{Coord, Point};
use rayon::prelude::*;
use tracing::info;

/// Rows that have both grid coordinates, plus how many were thrown away.
#[derive(Debug)]
pub struct Complete {
    pub records: Vec<(SchoolAttributes, Coord<f64>)>,
    pub dropped: usize,
}

pub fn drop_incomplete(records: Vec<RawSchool>) -> Complete {
    let total = records.len();
    let records: Vec<(SchoolAttributes, Coord<f64>)> = records
        .into_iter()
        .filter_map(|raw| match (raw.easting, raw.northing) {
            (Some(x), Some(y)) => Some((raw.attributes, Coord { x, y })),
            _ => None,
        })
        .collect();
    let dropped = total - records.len();

    info!(dropped, kept = records.len(), "Dropped schools with missing coordinates");
    Complete { records, dropped }
}

/// Drops incomplete rows and moves the rest from the national grid to WGS84.
///
/// Output order matches input order. Any coordinate outside the grid aborts
/// the whole batch.
pub fn normalize(records: Vec<RawSchool>) -> Result<Vec<School>> {
    let complete = drop_incomplete(records);

    let schools: Vec<School> = complete
        .records
        .into_par_iter()
        .map(|(attributes, grid)| -> Result<School> {
            let geographic = reproject(grid, Crs::Bng, Crs::Wgs84)
                .with_context(|| format!("Failed to reproject school {}", attributes.urn))?;
            Ok(School {
                attributes,
                grid,
                location: Point::from(geographic),
                region: None,
            })
        })
        .collect::<Result<Vec<School>>>()?;

    info!(count = schools.len(), "Reprojected schools to WGS84");
    Ok(schools)
}
