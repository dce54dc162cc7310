use crate::config::{GroupConfig, MapConfig, StyleConfig};
use crate::popup::popup_content;
use crate::styling::StylePolicy;
use crate::types::{RatingBand, Region, School};
use anyhow::{Context, Result};
use geo::{BoundingRect, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Everything a front end needs to draw the map. Coordinates in `view` are
/// `[lat, lon]`, matching Leaflet.
#[derive(Debug, Serialize)]
pub struct MapDocument {
    pub title: String,
    pub view: View,
    pub base_layer: BaseLayer,
    pub boundaries: BoundaryLayer,
    pub marker_groups: Vec<MarkerGroup>,
}

#[derive(Debug, Serialize)]
pub struct View {
    pub center: [f64; 2],
    pub zoom: u8,
    pub bounds: [[f64; 2]; 2],
}

#[derive(Debug, Serialize)]
pub struct BaseLayer {
    pub url: String,
    pub attribution: String,
}

#[derive(Debug, Serialize)]
pub struct BoundaryLayer {
    pub name: String,
    pub features: FeatureCollection,
}

#[derive(Debug, Serialize)]
pub struct MarkerGroup {
    pub band: RatingBand,
    pub name: String,
    pub visible: bool,
    pub color: String,
    pub cluster: Option<ClusterOptions>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Serialize)]
pub struct ClusterOptions {
    pub disable_clustering_at_zoom: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct Marker {
    pub urn: String,
    pub lat: f64,
    pub lon: f64,
    pub icon: String,
    pub color: String,
    pub popup: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

pub fn compose(
    regions: &[Region],
    schools: &[School],
    style: &StyleConfig,
    map: &MapConfig,
) -> MapDocument {
    let policy = StylePolicy::new(style);

    let features = regions
        .iter()
        .map(|region| region_feature(region, &policy))
        .collect();

    let mut by_band = group_by_band(schools);
    let marker_groups: Vec<MarkerGroup> = RatingBand::ALL
        .iter()
        .map(|&band| {
            let members = by_band.remove(&band).unwrap_or_default();
            marker_group(band, &members, &policy, map)
        })
        .collect();

    for group in &marker_groups {
        info!(group = %group.name, markers = group.markers.len(), visible = group.visible, "Composed marker group");
    }

    MapDocument {
        title: map.title.clone(),
        view: view(regions, map.zoom),
        base_layer: BaseLayer {
            url: map.tile_url.clone(),
            attribution: map.attribution.clone(),
        },
        boundaries: BoundaryLayer {
            name: "Local Authority Districts".to_string(),
            features: FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
        },
        marker_groups,
    }
}

/// Splits schools into rating bands. Every school lands in exactly one band.
pub fn group_by_band(schools: &[School]) -> HashMap<RatingBand, Vec<&School>> {
    let mut groups: HashMap<RatingBand, Vec<&School>> = HashMap::new();
    for school in schools {
        groups.entry(school.band()).or_default().push(school);
    }
    groups
}

pub fn write_document(doc: &MapDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(doc).context("Failed to serialize map document")?;
    fs::write(path, json).with_context(|| format!("Failed to write map document: {:?}", path))?;
    info!(path = ?path, "Wrote map document");
    Ok(())
}

fn group_settings(band: RatingBand, map: &MapConfig) -> &GroupConfig {
    match band {
        RatingBand::Outstanding => &map.groups.outstanding,
        RatingBand::Good => &map.groups.good,
        RatingBand::Other => &map.groups.other,
    }
}

fn marker_group(
    band: RatingBand,
    members: &[&School],
    policy: &StylePolicy<'_>,
    map: &MapConfig,
) -> MarkerGroup {
    let settings = group_settings(band, map);
    let markers = members
        .iter()
        .map(|school| {
            let style = policy.marker_style(&school.attributes);
            Marker {
                urn: school.attributes.urn.clone(),
                lat: school.location.y(),
                lon: school.location.x(),
                icon: style.icon,
                color: style.color,
                popup: popup_content(&school.attributes),
                region: school.region.clone(),
            }
        })
        .collect();

    MarkerGroup {
        band,
        name: settings.label.clone(),
        visible: settings.visible,
        color: policy.band_color(band).to_string(),
        cluster: settings.clustered.then(|| ClusterOptions {
            disable_clustering_at_zoom: map.disable_clustering_at_zoom,
        }),
        markers,
    }
}

fn region_feature(region: &Region, policy: &StylePolicy<'_>) -> Feature {
    let style = policy.region_style(region);

    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), json!(region.id));
    properties.insert("name".to_string(), json!(region.name));
    properties.insert("area".to_string(), json!(region.area));
    properties.insert("style".to_string(), json!(style));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
        id: Some(geojson::feature::Id::String(region.id.clone())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn view(regions: &[Region], zoom: u8) -> View {
    let rect = regions
        .iter()
        .filter_map(|r| r.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        });

    match rect {
        Some(rect) => {
            let center = rect.center();
            View {
                center: [center.y, center.x],
                zoom,
                bounds: [[rect.min().y, rect.min().x], [rect.max().y, rect.max().x]],
            }
        }
        None => View {
            center: [0.0, 0.0],
            zoom,
            bounds: [[0.0, 0.0], [0.0, 0.0]],
        },
    }
}
