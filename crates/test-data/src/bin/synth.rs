//! Writes a synthetic route export without network access.
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin synth
//! ```
//!
//! `SYNTH_OUT` sets the output directory (default `.`), `SYNTH_POINTS` the
//! vertex count and `SYNTH_SPEED_KMH` the simulated speed.

use test_data::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let out_dir = std::env::var("SYNTH_OUT").unwrap_or_else(|_| ".".to_string());
    let points = std::env::var("SYNTH_POINTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(3000);
    let speed = std::env::var("SYNTH_SPEED_KMH")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(60.0);

    let mut rng = StdRng::seed_from_u64(12345); // Reproducible route
    let route = RouteGenerator::new()
        .with_points(points)
        .with_length(80_000.0)
        .with_jitter(3.0)
        .generate(Place::SAN_FRANCISCO, Place::SAN_JOSE, &mut rng);

    let services = ScriptedServices::new()
        .with_route(route)
        .with_geocoder(
            ScriptedGeocoder::new()
                .with_name(Place::SAN_FRANCISCO, "San Francisco, CA")
                .with_name(Place::SAN_JOSE, "San Jose, CA"),
        );
    let session = Session::new(SessionConfig::from_env(), services.providers());

    for place in [Place::SAN_FRANCISCO, Place::SAN_JOSE] {
        if let Some(geocode) = session.handle_map_click(place)?.geocode {
            geocode.await?;
        }
    }
    session.update_simulation_speed(speed);

    let route = session.calculate_route().await?;
    let export = session.export_route()?;

    let path = std::path::Path::new(&out_dir).join(export.file_name());
    tokio::fs::write(&path, &export.content).await?;

    let parsed = GpxReader::load_file(&path)?;
    tracing::info!("Synth completed!");
    tracing::info!("  Route vertices: {}", route.len());
    tracing::info!("  Exported waypoints: {}", parsed.waypoints.len());
    tracing::info!("  Simulated seconds: {}", parsed.elapsed_seconds().unwrap_or(0));
    tracing::info!("  File: {}", path.display());

    Ok(())
}
