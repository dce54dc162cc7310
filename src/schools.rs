use crate::config::SchoolColumns;
use crate::types::{OfstedRating, Phase, RawSchool, SchoolAttributes};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub fn load_schools(path: &Path, columns: &SchoolColumns) -> Result<Vec<RawSchool>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open schools CSV: {:?}", path))?;
    let schools = read_schools(file, columns)
        .with_context(|| format!("Failed to read schools CSV: {:?}", path))?;
    info!(count = schools.len(), path = ?path, "Loaded school records");
    Ok(schools)
}

struct ColumnIndex {
    urn: usize,
    laestab: usize,
    name: usize,
    phase: usize,
    rating: usize,
    pupils: usize,
    easting: usize,
    northing: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, columns: &SchoolColumns) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| anyhow!("Column '{}' not found in schools CSV", name))
        };
        Ok(Self {
            urn: find(&columns.urn)?,
            laestab: find(&columns.laestab)?,
            name: find(&columns.name)?,
            phase: find(&columns.phase)?,
            rating: find(&columns.rating)?,
            pupils: find(&columns.pupils)?,
            easting: find(&columns.easting)?,
            northing: find(&columns.northing)?,
        })
    }
}

pub fn read_schools<R: Read>(reader: R, columns: &SchoolColumns) -> Result<Vec<RawSchool>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let idx = ColumnIndex::resolve(&headers, columns)?;

    let mut schools = Vec::new();
    let mut unrated = 0;

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = row + 2;
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let attributes = SchoolAttributes {
            urn: field(idx.urn).to_string(),
            laestab: field(idx.laestab).to_string(),
            name: field(idx.name).to_string(),
            phase: field(idx.phase)
                .parse::<Phase>()
                .with_context(|| format!("Bad phase on line {}", line))?,
            rating: parse_rating(field(idx.rating), line),
            pupils: field(idx.pupils).parse::<u32>().ok(),
        };

        if attributes.rating.is_none() {
            unrated += 1;
        }
        schools.push(RawSchool {
            attributes,
            easting: parse_coordinate(field(idx.easting)),
            northing: parse_coordinate(field(idx.northing)),
        });
    }

    if unrated > 0 {
        info!(unrated, "Schools without a recognised Ofsted rating");
    }
    Ok(schools)
}

/// Blank cells mean "not inspected". Anything else unrecognised is logged.
fn parse_rating(value: &str, line: usize) -> Option<OfstedRating> {
    if value.is_empty() {
        return None;
    }
    match value.parse::<OfstedRating>() {
        Ok(rating) => Some(rating),
        Err(e) => {
            warn!(line, "{}", e);
            None
        }
    }
}

/// Empty cells, "NA" and anything non-numeric count as missing.
fn parse_coordinate(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
