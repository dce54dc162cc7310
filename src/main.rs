pub mod boundary;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetch;
pub mod locate;
pub mod normalize;
pub mod popup;
pub mod projection;
pub mod schools;
pub mod styling;
pub mod types;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use geo::Coord;
use projection::Crs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the boundary file only
    Fetch {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Build the map document from boundaries and schools
    Compose {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Use the boundary file already on disk instead of downloading it
        #[arg(long)]
        offline: bool,
    },
    /// Print the latitude/longitude of a national grid reference
    Reproject {
        #[arg(short, long)]
        easting: f64,
        #[arg(short, long)]
        northing: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Fetch { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let url = app_config
                .input
                .boundary_url
                .as_deref()
                .ok_or_else(|| anyhow!("No input.boundary_url set in {:?}", config))?;
            fetch::download(url, &app_config.input.boundary_path).await?;
        }
        Commands::Compose { config, offline } => {
            info!(config = ?config, "Composing map");
            let app_config = config::AppConfig::load_from_file(config)?;
            compose_map(&app_config, *offline).await?;
        }
        Commands::Reproject { easting, northing } => {
            let grid = Coord {
                x: *easting,
                y: *northing,
            };
            let wgs = projection::reproject(grid, Crs::Bng, Crs::Wgs84)?;
            println!("{:.6}, {:.6}", wgs.y, wgs.x);
        }
    }

    Ok(())
}

async fn compose_map(app_config: &config::AppConfig, offline: bool) -> Result<()> {
    let input = &app_config.input;

    // 1. Boundaries
    match (&input.boundary_url, offline) {
        (Some(url), false) => fetch::download(url, &input.boundary_path).await?,
        _ => info!(path = ?input.boundary_path, "Using boundary file on disk"),
    }
    let regions = boundary::load_regions(&input.boundary_path, &app_config.boundary, input.boundary_crs)?;
    let regions = boundary::filter_by_prefix(
        &regions,
        app_config.boundary.filter_field,
        &app_config.boundary.prefix,
    )?;

    // 2. Schools
    let raw = schools::load_schools(&input.schools_csv, &app_config.schools)?;
    let schools = normalize::normalize(raw)?;
    let schools = locate::assign_regions(schools, &regions, app_config.schools.clip_to_regions);

    // 3. Map
    let doc = compose::compose(&regions, &schools, &app_config.style, &app_config.map);
    compose::write_document(&doc, &app_config.output.document)?;

    println!(
        "Map document with {} regions and {} schools written to {:?}",
        regions.len(),
        schools.len(),
        app_config.output.document
    );
    Ok(())
}
