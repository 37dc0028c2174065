use anyhow::Result;
use colored::Colorize;
use geoconv_core::{GeoConfig, GeoEngine, GeocodingClient, NominatimConfig, NominatimGeocoder};
use std::io;
use std::time::Duration;

mod browser;
mod cli;
mod prompt;

use prompt::Prompter;

type Client = GeocodingClient<NominatimGeocoder>;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

fn main() {
    let args = cli::parse_args();

    // Initialize logger with appropriate level based on verbose flag
    if std::env::var("RUST_LOG").is_err() {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    println!("\n{}", "Interactive Geospatial Converter".cyan());
    println!("{}\n", "===============================".yellow());

    let result = run(&args);
    if let Err(e) = &result {
        eprintln!("\n{}", format!("ERROR: {:#}", e).red());
    }
    println!("\n{}", "Process completed".cyan());

    if result.is_err() {
        std::process::exit(1);
    }
}

fn build_config(args: &cli::Args) -> GeoConfig {
    let defaults = NominatimConfig::default();
    GeoConfig {
        coordinates_path: args.coordinates.clone(),
        report_path: args.output.clone(),
        map_path: args.map.clone(),
        cache_path: (!args.no_cache_file).then(|| args.cache.clone()),
        cache_max_age: args.cache_max_age_days.map(cache_max_age),
        nominatim: NominatimConfig {
            base_url: args.nominatim_url.clone().unwrap_or(defaults.base_url),
            user_agent: args.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        },
        ..GeoConfig::default()
    }
}

/// Huge day counts saturate instead of overflowing
fn cache_max_age(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY))
}

/// The geocoding client is only built once something needs it
fn client<'a>(engine: &GeoEngine, slot: &'a mut Option<Client>) -> Result<&'a mut Client> {
    let client = match slot.take() {
        Some(client) => client,
        None => engine.geocoding_client()?,
    };
    Ok(slot.insert(client))
}

fn run(args: &cli::Args) -> Result<()> {
    let engine = GeoEngine::new(build_config(args))?;
    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
    let mut geocoder: Option<Client> = None;

    let result = convert(args, &engine, &mut prompter, &mut geocoder);

    // Keep whatever was looked up, even if a later step failed
    if let Some(client) = &geocoder {
        let stats = client.stats();
        log::debug!(
            "Geocoding: {} cache hits, {} requests, {} failures",
            stats.cache_hits,
            stats.outbound_calls,
            stats.failures
        );
        if let Err(e) = client.save_cache() {
            log::warn!("Cache saving failed: {:#}", e);
        }
    }

    result
}

fn convert<R: io::BufRead, W: io::Write>(
    args: &cli::Args,
    engine: &GeoEngine,
    prompter: &mut Prompter<R, W>,
    geocoder: &mut Option<Client>,
) -> Result<()> {
    // New coordinates, typed in
    let add = args.add
        || (!args.no_prompt && prompter.confirm("Would you like to add new coordinates?")?);
    if add {
        match prompter.read_coordinates()? {
            Some(coordinates) if !coordinates.is_empty() => {
                engine.add_coordinates(&coordinates)?;
                println!("{}", "Existing coordinates preserved, new ones added".cyan());
            }
            _ => println!("{}", "No new coordinates added".yellow()),
        }
    }

    // New coordinates, from addresses
    if !args.addresses.is_empty() {
        let client = client(engine, geocoder)?;
        let mut located = Vec::new();
        for (address, result) in engine.locate_addresses(client, &args.addresses) {
            match result {
                Ok(place) => {
                    println!(
                        "{}",
                        format!("Found {:?}: {} ({})", address, place.coordinate, place.display_name)
                            .green()
                    );
                    located.push(place.coordinate);
                }
                Err(e) => println!("{}", format!("Address {:?}: {}", address, e).red()),
            }
        }
        if !located.is_empty() {
            engine.add_coordinates(&located)?;
        }
    }

    let loaded = engine.load_coordinates()?;
    if loaded.skipped > 0 {
        println!(
            "{}",
            format!("Skipped {} invalid rows", loaded.skipped).yellow()
        );
    }
    if loaded.coordinates.is_empty() {
        anyhow::bail!(
            "No valid coordinates in {}",
            engine.config().coordinates_path.display()
        );
    }

    let geocode = if args.geocode {
        true
    } else if args.no_geocode || args.no_prompt {
        false
    } else {
        prompter.confirm("Enable address lookup?")?
    };

    let addresses = if geocode {
        let client = client(engine, geocoder)?;
        engine.resolve_addresses(client, &loaded.coordinates)
    } else {
        // Still show addresses looked up on earlier runs
        engine.cached_addresses(&loaded.coordinates)
    };

    let records = engine.convert(&loaded.coordinates, Some(&addresses));

    println!("{}", "\nCreating interactive map...".green());
    let outputs = engine.write_outputs(&records)?;

    println!("{}", "\nOutput files created:".cyan());
    println!("- Converted coordinates: {}", outputs.report.display());
    println!("- Interactive map: {}", outputs.map.display());

    if !args.no_open {
        if let Err(e) = browser::open(&outputs.map) {
            log::warn!("Could not open the map in a browser: {:#}", e);
        }
    }

    Ok(())
}
