//! Command-line front end: compute a driving route or a single point and
//! write it out as GPX for a location simulator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};
use gpx_creator::providers::{OsmClient, OsmConfig};
use gpx_creator::{Coordinate, Field, GpxCreatorError, GpxExport, Providers, Session, SessionConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gpx-creator")]
#[command(about = "Create GPX files for simulated device locations", long_about = None)]
struct Args {
    /// JSON session config; `GPX_CREATOR_*` variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export a driving route between two points
    Route {
        /// Start as LAT,LON
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        from: Coordinate,

        /// Destination as LAT,LON
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        to: Coordinate,

        /// Simulated travel speed in km/h (20-100)
        #[arg(long)]
        speed: Option<f64>,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Export a single named waypoint
    Waypoint {
        /// Location as LAT,LON
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        at: Coordinate,

        /// Waypoint name; defaults to the reverse-geocoded address
        #[arg(long)]
        name: Option<String>,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Look up places by name
    Search {
        query: String,
    },
}

fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {s:?}"))?;
    let latitude = lat.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let longitude = lon.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Coordinate::new(latitude, longitude)
        .validate()
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?.with_env_overrides(),
        None => SessionConfig::from_env(),
    };
    let client = Arc::new(OsmClient::new(OsmConfig::default())?);
    let session = Session::new(config, Providers::from_shared(client));

    match args.command {
        Command::Route {
            from,
            to,
            speed,
            out,
        } => {
            place(&session, from).await?;
            place(&session, to).await?;
            if let Some(speed) = speed {
                session.set_simulation_speed(speed);
            }

            let route = session.calculate_route().await?;
            tracing::info!("Route has {} points", route.len());
            let export = session.export_route()?;
            write_export(&out, &export).await?;
        }
        Command::Waypoint { at, name, out } => {
            place(&session, at).await?;
            if let Some(name) = name {
                session.set_field_text(Field::Start, name);
            }

            let export = session.export_waypoint()?;
            write_export(&out, &export).await?;
        }
        Command::Search { query } => {
            session.search_single(&query);
            while session.is_searching(Field::Start) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }

            let results = session.snapshot().start_field.results;
            if results.is_empty() {
                match session.active_notices().into_iter().next() {
                    Some(notice) => bail!("{}", notice.message),
                    None => println!("No results for {query:?}"),
                }
            }
            for (i, result) in results.iter().enumerate() {
                println!("{}. {}", i + 1, result.label());
                println!("   {}  ({})", result.subtitle, result.coordinate);
            }
        }
    }

    Ok(())
}

/// Places a point and waits for its address so the export has a label.
async fn place(session: &Session, coordinate: Coordinate) -> anyhow::Result<()> {
    let click = session.handle_map_click(coordinate)?;
    if let Some(geocode) = click.geocode {
        geocode.await?;
    }
    tracing::info!(
        "{} set to {}",
        click.field,
        session.field_text(click.field)
    );
    Ok(())
}

async fn write_export(dir: &std::path::Path, export: &GpxExport) -> Result<(), GpxCreatorError> {
    let path = dir.join(export.file_name());
    tokio::fs::write(&path, &export.content).await?;
    println!("Wrote {}", path.display());
    Ok(())
}
