use crate::config::StyleConfig;
use crate::types::{OfstedRating, Phase, RatingBand, Region, SchoolAttributes};
use serde::Serialize;

/// Leaflet-style path options for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStyle {
    pub fill_color: String,
    pub fill_opacity: f64,
    pub color: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub icon: String,
    pub color: String,
}

/// Maps entity attributes to visual parameters. Every method is a pure
/// function of its arguments and the configured constants.
#[derive(Debug, Clone, Copy)]
pub struct StylePolicy<'a> {
    config: &'a StyleConfig,
}

impl<'a> StylePolicy<'a> {
    pub fn new(config: &'a StyleConfig) -> Self {
        Self { config }
    }

    /// Large regions are filled, the rest drawn as outline only.
    pub fn fill_opacity(&self, area: f64) -> f64 {
        if area > self.config.area_threshold {
            self.config.fill_opacity
        } else {
            0.0
        }
    }

    pub fn region_style(&self, region: &Region) -> RegionStyle {
        RegionStyle {
            fill_color: self.config.fill_color.clone(),
            fill_opacity: self.fill_opacity(region.area),
            color: self.config.stroke_color.clone(),
            weight: self.config.stroke_weight,
        }
    }

    pub fn band_color(&self, band: RatingBand) -> &'a str {
        let colors = &self.config.colors;
        match band {
            RatingBand::Outstanding => &colors.outstanding,
            RatingBand::Good => &colors.good,
            RatingBand::Other => &colors.other,
        }
    }

    pub fn marker_color(&self, rating: OfstedRating) -> &'a str {
        self.band_color(rating.band())
    }

    pub fn marker_icon(&self, phase: Phase) -> &'a str {
        let icons = &self.config.icons;
        match phase {
            Phase::Primary => &icons.primary,
            Phase::Secondary => &icons.secondary,
        }
    }

    pub fn marker_style(&self, school: &SchoolAttributes) -> MarkerStyle {
        MarkerStyle {
            icon: self.marker_icon(school.phase).to_string(),
            color: self.band_color(school.band()).to_string(),
        }
    }
}
