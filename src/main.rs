//! # Tide Prediction Command Line
//!
//! Predicts water levels for a station file and prints an ASCII chart, a
//! table of high and low waters, or JSON. Subordinate stations need their
//! reference station file as well.
//!
//! ```text
//! tide-predict --station stations/9414290.json --hours 48 --extremes
//! tide-predict --station sub.json --reference ref.json --json
//! ```

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tide_harmonics::config::Config;
use tide_harmonics::renderer::{draw_ascii, format_extremes};
use tide_harmonics::{
    Extreme, ExtremesOptions, Registry, Station, Strategy, TimelineOptions, TimelinePoint,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tide-predict", about = "Harmonic tide predictions")]
struct Cli {
    /// Station JSON file
    #[arg(long)]
    station: Option<PathBuf>,
    /// Reference station JSON file for a subordinate station
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Start time, RFC 3339 or YYYY-MM-DD (default: current hour)
    #[arg(long, value_parser = parse_time)]
    start: Option<DateTime<Utc>>,
    /// End time, RFC 3339 or YYYY-MM-DD
    #[arg(long, value_parser = parse_time, conflicts_with = "hours")]
    end: Option<DateTime<Utc>>,
    /// Span length in hours
    #[arg(long)]
    hours: Option<i64>,
    /// Nodal correction strategy: iho or schureman
    #[arg(long)]
    strategy: Option<Strategy>,
    /// Timeline sampling interval in seconds
    #[arg(long)]
    fidelity: Option<i64>,
    /// Datum from the station's datums table to add to every level
    #[arg(long)]
    datum: Option<String>,
    /// Print high and low waters instead of the timeline
    #[arg(long)]
    extremes: bool,
    /// Print JSON
    #[arg(long)]
    json: bool,
    /// Configuration file (default: tide-config.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a> {
    station: &'a str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeline: Option<&'a [TimelinePoint]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extremes: Option<&'a [Extreme]>,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("`{value}` is neither RFC 3339 nor YYYY-MM-DD"))
}

fn current_hour() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let station_path = cli
        .station
        .or(config.station.path.clone())
        .context("no station given; pass --station or set [station] path in the config")?;
    let station = Station::load(&station_path)
        .with_context(|| format!("loading station {}", station_path.display()))?;

    // Subordinate stations predict from their reference's constituents
    let source = match &station.offsets {
        Some(_) => {
            let Some(reference_path) = cli.reference.or(config.station.reference.clone()) else {
                bail!(
                    "station {} is subordinate to {}; pass --reference",
                    station.id,
                    station.reference_id.as_deref().unwrap_or("an unnamed reference")
                );
            };
            let reference = Station::load(&reference_path)
                .with_context(|| format!("loading reference {}", reference_path.display()))?;
            info!(station = %station.id, reference = %reference.id, "using reference station");
            reference
        }
        None => station.clone(),
    };

    let mut options = config.prediction.options();
    if let Some(strategy) = cli.strategy {
        options.strategy = strategy;
    }
    if let Some(seconds) = cli.fidelity {
        options.time_fidelity = Duration::seconds(seconds);
    }
    if let Some(name) = cli.datum.or(config.station.datum.clone()) {
        options.offset += source
            .datum(&name)
            .with_context(|| format!("station {} has no datum `{name}`", source.id))?;
    }

    let start = cli.start.unwrap_or_else(current_hour);
    let end = match (cli.end, cli.hours) {
        (Some(end), _) => end,
        (None, Some(hours)) => start + Duration::hours(hours),
        (None, None) => start + Duration::hours(config.prediction.span_hours),
    };
    debug!(%start, %end, strategy = %options.strategy, "predicting");

    let prediction = source.predict(Registry::standard(), start, end, &options)?;

    if cli.extremes {
        let extremes = prediction.extremes(&ExtremesOptions {
            labels: config.prediction.labels(),
            offsets: station.offsets,
        });
        if cli.json {
            let output = Output {
                station: &station.name,
                start,
                end,
                timeline: None,
                extremes: Some(&extremes),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{} ({})", station.name, station.id);
            print!("{}", format_extremes(&extremes));
        }
    } else {
        let timeline = prediction.timeline(&TimelineOptions {
            offsets: station.offsets,
        });
        if cli.json {
            let output = Output {
                station: &station.name,
                start,
                end,
                timeline: Some(&timeline),
                extremes: None,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            let extremes = prediction.extremes(&ExtremesOptions {
                labels: config.prediction.labels(),
                offsets: station.offsets,
            });
            println!("{} ({})", station.name, station.id);
            print!("{}", draw_ascii(&timeline, &extremes));
        }
    }

    Ok(())
}
