use clap::Parser;
use std::path::PathBuf;

/// Convert coordinates to Mercator, look up their addresses and plot them on a map
#[derive(Parser, Debug)]
#[command(name = "geoconv")]
#[command(author = "4n6h4x0r")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive geospatial converter: Mercator projection, address lookup and map output", long_about = None)]
pub struct Args {
    /// CSV file of coordinates (new coordinates are appended to it)
    #[arg(value_name = "FILE", default_value = "coordinates.csv")]
    pub coordinates: PathBuf,

    /// Enter new coordinates interactively without being asked first
    #[arg(short = 'a', long = "add")]
    pub add: bool,

    /// Look up an address and add its coordinates (repeatable)
    #[arg(long = "address", value_name = "ADDRESS")]
    pub addresses: Vec<String>,

    /// Look up addresses for all coordinates without being asked
    #[arg(short = 'g', long = "geocode", conflicts_with = "no_geocode")]
    pub geocode: bool,

    /// Skip address lookup
    #[arg(long = "no-geocode")]
    pub no_geocode: bool,

    /// Never prompt; questions not settled by flags are answered "no"
    #[arg(long = "no-prompt")]
    pub no_prompt: bool,

    /// Converted coordinates CSV
    #[arg(short = 'o', long = "output", default_value = "converted_coordinates.csv")]
    pub output: PathBuf,

    /// Interactive HTML map
    #[arg(short = 'm', long = "map", default_value = "geo_map.html")]
    pub map: PathBuf,

    /// Geocoding cache file
    #[arg(long = "cache", default_value = "geo_cache.json")]
    pub cache: PathBuf,

    /// Keep the geocoding cache in memory only
    #[arg(long = "no-cache-file")]
    pub no_cache_file: bool,

    /// Re-fetch cached addresses older than this many days
    #[arg(long = "cache-max-age-days", value_name = "DAYS")]
    pub cache_max_age_days: Option<u64>,

    /// Nominatim instance to query
    #[arg(long = "nominatim-url", value_name = "URL")]
    pub nominatim_url: Option<String>,

    /// User-Agent sent to Nominatim (should identify you)
    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    /// Don't open the map in a browser
    #[arg(long = "no-open")]
    pub no_open: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}
