use std::{io::Write, sync::Arc};

use anyhow::{bail, Context, Result};
use args::{calendar_options, parse_args, Args, Command};
use clap::builder::styling::AnsiColor;
use env_logger::Builder;
use formatting::format_track_summary;
use log::{debug, info};
use serde::Serialize;
use waymark_core::{
    calendar::{
        build_google_calendar_link, build_ics_content_with, build_ics_data_uri_with,
        build_outlook_calendar_link, CalendarEvent,
    },
    events::{format_event_date_range, format_event_primary_date, EventDateInput},
    fetch::{load_into, CancelFlag, TrackSource, TRACK_UNAVAILABLE},
    model::{Bounds, GpxPoint, GpxWaypoint, TrackStats},
    sync::{TrackSelection, TrackView},
};

mod args;
mod formatting;

pub const PROGRAM_NAME: &str = env!("CARGO_PKG_NAME");

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    info!("Starting {PROGRAM_NAME}");

    let args = parse_args();
    debug!("{:?}", &args);

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let fallback_waypoints = args.fallback_waypoints;
    if fallback_waypoints {
        info!("'--fallback-waypoints' specified, tracks without waypoints get a trailhead, midpoint and summit");
    }

    match args.command {
        Command::Track { source, json } => {
            let (_, view) = load_selection(&source, fallback_waypoints).await?;
            if json {
                print_json(&TrackReport::new(&view))?;
            } else {
                print!("{}", format_track_summary(&view));
            }
        }
        Command::Profile { source } => {
            let (_, view) = load_selection(&source, fallback_waypoints).await?;
            print_json(&view.profile)?;
        }
        Command::Nearest { source, lat, lon } => {
            let (selection, _) = load_selection(&source, fallback_waypoints).await?;
            let Some(highlight) = selection.select_on_map(lat, lon) else {
                bail!("The track from {source} has no trackpoints");
            };
            let state = selection.state();
            println!(
                "Point {} at {:.6}, {:.6}{}",
                highlight.index,
                highlight.lat,
                highlight.lon,
                if highlight.is_checkpoint { " (checkpoint)" } else { "" }
            );
            if let Some(coordinates) = state.coordinates {
                println!("Selected {coordinates}");
            }
        }
        Command::EventRange { dates, primary } => {
            let input = EventDateInput::from(dates);
            if primary {
                println!("{}", format_event_primary_date(&input));
            } else {
                println!("{}", format_event_date_range(&input));
            }
        }
        Command::Ics {
            event,
            output,
            force,
            product_id,
            data_uri,
        } => {
            let event = CalendarEvent::from(event);
            let options = calendar_options(product_id);
            let content = if data_uri {
                build_ics_data_uri_with(&event, &options)?
            } else {
                build_ics_content_with(&event, &options)?
            };

            match output {
                Some(path) => {
                    if path.exists() && !force {
                        bail!("{path:?} already exists, use '--force' to overwrite it");
                    }
                    std::fs::write(&path, content)
                        .with_context(|| format!("Could not write {path:?}"))?;
                    info!("Wrote calendar file {:?}", path);
                }
                None => println!("{content}"),
            }
        }
        Command::Google { event } => {
            println!("{}", build_google_calendar_link(&event.into())?);
        }
        Command::Outlook { event } => {
            println!("{}", build_outlook_calendar_link(&event.into())?);
        }
    }

    Ok(())
}

/// Loads the track into a fresh selection. The detailed reason for a failure
/// has already been logged, the error only carries the message for users.
async fn load_selection(
    source: &TrackSource,
    fallback_waypoints: bool,
) -> Result<(TrackSelection, Arc<TrackView>)> {
    let selection = TrackSelection::new(fallback_waypoints);
    match load_into(&selection, source, &CancelFlag::new()).await {
        Some(view) => Ok((selection, view)),
        None => {
            let message = selection.state().error.unwrap_or_else(|| TRACK_UNAVAILABLE.to_string());
            bail!("{message}")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer_pretty(&mut lock, value)?;
    writeln!(lock)?;
    Ok(())
}

/// The JSON emitted by 'track --json'.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackReport<'a> {
    stats: TrackStats,
    bounds: Option<Bounds>,
    polyline: Vec<[f64; 2]>,
    points: &'a [GpxPoint],
    waypoints: &'a [GpxWaypoint],
    checkpoint_indices: &'a [usize],
}

impl<'a> TrackReport<'a> {
    fn new(view: &'a TrackView) -> Self {
        Self {
            stats: view.stats,
            bounds: view.bounds,
            polyline: view.track.polyline(),
            points: &view.track.points,
            waypoints: &view.waypoints,
            checkpoint_indices: &view.checkpoint_indices,
        }
    }
}

fn configure_logging() {
    let mut builder = Builder::from_default_env();

    builder.format(|buf, record| {
        let level_style = buf.default_level_style(record.level());
        let level_style = match record.level() {
            log::Level::Error => level_style.fg_color(Some(AnsiColor::Red.into())),
            log::Level::Warn => level_style.fg_color(Some(AnsiColor::Yellow.into())),
            log::Level::Info => level_style.fg_color(Some(AnsiColor::Green.into())),
            log::Level::Debug => level_style.fg_color(Some(AnsiColor::Blue.into())),
            log::Level::Trace => level_style.fg_color(Some(AnsiColor::Magenta.into())),
        };

        let line_number_style = buf
            .default_level_style(record.level())
            .fg_color(Some(AnsiColor::Cyan.into()));

        match (record.file(), record.line()) {
            (Some(file), Some(line)) => writeln!(
                buf,
                "[{} {level_style}{}{level_style:#} {}/{line_number_style}{}{line_number_style:#}] {}",
                buf.timestamp(),
                record.level(),
                file,
                line,
                record.args()
            ),
            (Some(file), None) => writeln!(
                buf,
                "[{} {level_style}{}{level_style:#} {}] {}",
                buf.timestamp(),
                record.level(),
                file,
                record.args()
            ),
            (None, _) => writeln!(
                buf,
                "[{} {level_style}{}{level_style:#}] {}",
                buf.timestamp(),
                record.level(),
                record.args()
            ),
        }
    });

    builder.init();
}
