use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use crate::controller::DEFAULT_ZOOM;
use crate::geolocation::{Locator, DEFAULT_GEO_URL};
use crate::map::{MAX_ZOOM, MIN_ZOOM};
use crate::map_view::OSM_TILE_URL;
use crate::models::Coords;

#[derive(Parser, Debug)]
#[command(name = "mapty", about = "Log running and cycling workouts on a map")]
pub struct Cli {
    /// Directory holding the saved workouts.
    ///
    /// Default: the platform data directory, e.g. ~/.local/share/mapty
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Use this position instead of looking it up.
    #[arg(long, value_name = "LAT,LNG", value_parser = parse_position)]
    pub position: Option<Coords>,

    /// IP geolocation endpoint answering with `lat`/`lon` JSON.
    #[arg(long, value_name = "URL", default_value = DEFAULT_GEO_URL)]
    pub geo_url: String,

    /// Never look up the position; the map stays unavailable.
    #[arg(long, conflicts_with = "position")]
    pub no_geolocation: bool,

    /// Zoom level for the initial view and when jumping to a workout.
    #[arg(long, default_value_t = DEFAULT_ZOOM,
          value_parser = clap::value_parser!(u8).range(MIN_ZOOM as i64..=MAX_ZOOM as i64))]
    pub zoom: u8,

    /// Raster tile URL template with {z}, {x} and {y}.
    #[arg(long, value_name = "TEMPLATE", default_value = OSM_TILE_URL)]
    pub tile_url: String,

    /// Draw a plain grid instead of fetching map tiles.
    #[arg(long)]
    pub no_tiles: bool,

    /// Increase log verbosity (-v, -vv). Defaults to INFO.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq). Defaults to INFO.
    #[arg(short = 'q', long, action = ArgAction::Count, global = true)]
    pub quiet: u8,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub locator: Locator,
    pub zoom: u8,
    pub tile_url: Option<String>,
}

impl Cli {
    pub fn settings(&self) -> Result<Settings> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|d| d.join("mapty"))
                .context("no platform data directory, pass --data-dir")?,
        };

        let locator = match (self.position, self.no_geolocation) {
            (Some(coords), _) => Locator::Fixed(coords),
            (None, true) => Locator::Disabled,
            (None, false) => Locator::Ip { url: self.geo_url.clone() },
        };

        Ok(Settings {
            data_dir,
            locator,
            zoom: self.zoom,
            tile_url: (!self.no_tiles).then(|| self.tile_url.clone()),
        })
    }
}

fn parse_position(s: &str) -> Result<Coords, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("position out of range: {lat},{lng}"));
    }
    Ok(Coords::new(lat, lng))
}
