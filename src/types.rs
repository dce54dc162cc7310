use crate::error::AtlasError;
use geo::{Coord, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub area: f64,
    pub geometry: MultiPolygon<f64>,
}

/// Region attribute a prefix filter can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionField {
    Id,
    Name,
}

impl RegionField {
    pub fn value<'a>(&self, region: &'a Region) -> &'a str {
        match self {
            RegionField::Id => &region.id,
            RegionField::Name => &region.name,
        }
    }
}

impl fmt::Display for RegionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionField::Id => write!(f, "id"),
            RegionField::Name => write!(f, "name"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Primary,
    Secondary,
}

impl FromStr for Phase {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Phase::Primary),
            "secondary" => Ok(Phase::Secondary),
            _ => Err(AtlasError::UnknownPhase(s.to_string())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Primary => write!(f, "Primary"),
            Phase::Secondary => write!(f, "Secondary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OfstedRating {
    Outstanding,
    Good,
    RequiresImprovement,
    Inadequate,
    SeriousWeaknesses,
    SpecialMeasures,
}

impl OfstedRating {
    pub fn band(&self) -> RatingBand {
        match self {
            OfstedRating::Outstanding => RatingBand::Outstanding,
            OfstedRating::Good => RatingBand::Good,
            OfstedRating::RequiresImprovement
            | OfstedRating::Inadequate
            | OfstedRating::SeriousWeaknesses
            | OfstedRating::SpecialMeasures => RatingBand::Other,
        }
    }
}

impl FromStr for OfstedRating {
    type Err = AtlasError;

    // Extracts spell these "Requires improvement", "Requires Improvement" or "RequiresImprovement"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "outstanding" => Ok(OfstedRating::Outstanding),
            "good" => Ok(OfstedRating::Good),
            "requiresimprovement" => Ok(OfstedRating::RequiresImprovement),
            "inadequate" => Ok(OfstedRating::Inadequate),
            "seriousweaknesses" => Ok(OfstedRating::SeriousWeaknesses),
            "specialmeasures" => Ok(OfstedRating::SpecialMeasures),
            _ => Err(AtlasError::UnknownRating(s.to_string())),
        }
    }
}

impl fmt::Display for OfstedRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OfstedRating::Outstanding => "Outstanding",
            OfstedRating::Good => "Good",
            OfstedRating::RequiresImprovement => "Requires improvement",
            OfstedRating::Inadequate => "Inadequate",
            OfstedRating::SeriousWeaknesses => "Serious Weaknesses",
            OfstedRating::SpecialMeasures => "Special Measures",
        };
        f.write_str(label)
    }
}

/// Three-way partition of ratings used for marker colour and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingBand {
    Outstanding,
    Good,
    Other,
}

impl RatingBand {
    pub const ALL: [RatingBand; 3] = [RatingBand::Outstanding, RatingBand::Good, RatingBand::Other];
}

/// Everything about a school except where it is.
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolAttributes {
    pub urn: String,
    pub laestab: String,
    pub name: String,
    pub phase: Phase,
    // None for schools not yet inspected or with a grade we don't recognise
    pub rating: Option<OfstedRating>,
    pub pupils: Option<u32>,
}

impl SchoolAttributes {
    pub fn band(&self) -> RatingBand {
        self.rating.map_or(RatingBand::Other, |r| r.band())
    }
}

/// A row as read from the CSV. Either coordinate may be missing.
#[derive(Debug, Clone)]
pub struct RawSchool {
    pub attributes: SchoolAttributes,
    pub easting: Option<f64>,
    pub northing: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct School {
    pub attributes: SchoolAttributes,
    pub grid: Coord<f64>,
    // x = longitude, y = latitude
    pub location: Point<f64>,
    pub region: Option<String>,
}

impl School {
    pub fn band(&self) -> RatingBand {
        self.attributes.band()
    }
}
