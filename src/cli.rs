use clap::Parser;
use std::path::PathBuf;

/// Download a cloud-free Sentinel-2 composite GeoTIFF for an area of interest
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Area of interest in the GeoJSON format
    #[arg(short = 'i', long)]
    pub geojson: PathBuf,

    /// Starting date for the composite (yyyy-mm-dd)
    #[arg(short, long)]
    pub start_date: String,

    /// End date for the composite (yyyy-mm-dd)
    #[arg(short, long)]
    pub end_date: String,

    /// File to write the results to
    #[arg(short, long)]
    pub output_file: PathBuf,

    /// TOML file with Earth Engine connection settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log request details
    #[arg(short, long)]
    pub verbose: bool,
}
