use crate::projection::Crs;
use crate::types::RegionField;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub schools: SchoolColumns,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub map: MapConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Where to download the boundary file from. Without it the local copy is used as-is.
    pub boundary_url: Option<String>,
    pub boundary_path: PathBuf,
    #[serde(default = "default_boundary_crs")]
    pub boundary_crs: Crs,
    pub schools_csv: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BoundaryConfig {
    pub id_field: String,
    pub name_field: String,
    // Computed from the geometry when absent
    pub area_field: Option<String>,
    #[serde(default = "default_filter_field")]
    pub filter_field: RegionField,
    pub prefix: String,
}

/// CSV header names for each school attribute. Defaults follow the GIAS extract.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchoolColumns {
    pub urn: String,
    pub laestab: String,
    pub name: String,
    pub phase: String,
    pub rating: String,
    pub pupils: String,
    pub easting: String,
    pub northing: String,
    pub clip_to_regions: bool,
}

impl Default for SchoolColumns {
    fn default() -> Self {
        Self {
            urn: "URN".to_string(),
            laestab: "LAESTAB".to_string(),
            name: "EstablishmentName".to_string(),
            phase: "PhaseOfEducation (name)".to_string(),
            rating: "OfstedRating (name)".to_string(),
            pupils: "NumberOfPupils".to_string(),
            easting: "Easting".to_string(),
            northing: "Northing".to_string(),
            clip_to_regions: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StyleConfig {
    /// Regions with an area above this (in the units of the area field) get filled.
    pub area_threshold: f64,
    pub fill_opacity: f64,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_weight: f64,
    pub colors: BandColors,
    pub icons: PhaseIcons,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            area_threshold: 1.0e9,
            fill_opacity: 0.5,
            fill_color: "#3388ff".to_string(),
            stroke_color: "#555555".to_string(),
            stroke_weight: 1.0,
            colors: BandColors::default(),
            icons: PhaseIcons::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BandColors {
    pub outstanding: String,
    pub good: String,
    pub other: String,
}

impl Default for BandColors {
    fn default() -> Self {
        Self {
            outstanding: "green".to_string(),
            good: "blue".to_string(),
            other: "red".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PhaseIcons {
    pub primary: String,
    pub secondary: String,
}

impl Default for PhaseIcons {
    fn default() -> Self {
        Self {
            primary: "child".to_string(),
            secondary: "graduation-cap".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
    pub disable_clustering_at_zoom: Option<u8>,
    pub groups: GroupsConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "Schools by Ofsted rating".to_string(),
            zoom: 7,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors".to_string(),
            disable_clustering_at_zoom: Some(14),
            groups: GroupsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GroupsConfig {
    pub outstanding: GroupConfig,
    pub good: GroupConfig,
    pub other: GroupConfig,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            outstanding: GroupConfig::new("Outstanding", true),
            good: GroupConfig::new("Good", true),
            other: GroupConfig::new("Requires improvement or worse", false),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    pub label: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub clustered: bool,
}

impl GroupConfig {
    fn new(label: &str, visible: bool) -> Self {
        Self {
            label: label.to_string(),
            visible,
            clustered: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub document: PathBuf,
}

fn default_boundary_crs() -> Crs {
    Crs::Wgs84
}

fn default_filter_field() -> RegionField {
    RegionField::Id
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
