use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use waymark_core::{
    calendar::{CalendarEvent, CalendarOptions},
    events::EventDateInput,
    fetch::TrackSource,
};

/*
 track SOURCE [--json]                 summarise a track
 profile SOURCE                        elevation profile as JSON
 nearest SOURCE --lat LAT --lon LON    snap a coordinate onto the track
 event-range DATE-ARGS [--primary]     format the dates of an event
 ics EVENT-ARGS [--output FILE]        ICS file for an event
 google EVENT-ARGS                     Google Calendar link
 outlook EVENT-ARGS                    Outlook web calendar link

 SOURCE is a path or an http(s) URL.
 --fallback-waypoints                  synthesise checkpoints for tracks
                                       without waypoints. Global option.
*/

/// Returns the parsed command line options.
pub fn parse_args() -> Args {
    Args::parse()
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(
        long,
        global = true,
        default_value = "false",
        help = "If a track has no waypoints, show a trailhead, a midpoint and a summit instead"
    )]
    pub fallback_waypoints: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a track and print its distance, ascent, descent and checkpoints
    Track {
        #[arg(help = "Path or http(s) URL of a GPX file")]
        source: TrackSource,

        #[arg(long, help = "Print the track and its statistics as JSON")]
        json: bool,
    },

    /// Print the elevation profile of a track as JSON
    Profile {
        #[arg(help = "Path or http(s) URL of a GPX file")]
        source: TrackSource,
    },

    /// Find the trackpoint nearest to a coordinate
    Nearest {
        #[arg(help = "Path or http(s) URL of a GPX file")]
        source: TrackSource,

        #[arg(long, allow_hyphen_values = true, help = "Latitude in degrees")]
        lat: f64,

        #[arg(long, allow_hyphen_values = true, help = "Longitude in degrees")]
        lon: f64,
    },

    /// Format the dates of an event the way event pages show them
    EventRange {
        #[command(flatten)]
        dates: EventDateArgs,

        #[arg(long, help = "Only print the start date")]
        primary: bool,
    },

    /// Write an ICS file for an event
    Ics {
        #[command(flatten)]
        event: EventArgs,

        #[arg(short, long, help = "Write the ICS to FILE instead of stdout")]
        output: Option<PathBuf>,

        #[arg(
            short,
            long,
            default_value = "false",
            help = "Overwrite the output file even if it already exists"
        )]
        force: bool,

        #[arg(long, help = "The PRODID to put in the file")]
        product_id: Option<String>,

        #[arg(long, help = "Print a data: URI instead of the ICS text")]
        data_uri: bool,
    },

    /// Print a link that adds an event to Google Calendar
    Google {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Print a link that adds an event to the Outlook web calendar
    Outlook {
        #[command(flatten)]
        event: EventArgs,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct EventDateArgs {
    #[arg(long, help = "First day of the event, e.g. 2024-06-01")]
    pub date: String,

    #[arg(long, help = "Last day of the event, inclusive")]
    pub end_date: Option<String>,

    #[arg(long, help = "Start time, e.g. 14, 14:30 or 14:30:00")]
    pub start_time: Option<String>,

    #[arg(long, help = "End time, same formats as --start-time")]
    pub end_time: Option<String>,
}

impl From<EventDateArgs> for EventDateInput {
    fn from(args: EventDateArgs) -> Self {
        EventDateInput {
            date: args.date,
            end_date: args.end_date,
            start_time: args.start_time,
            end_time: args.end_time,
        }
    }
}

#[derive(Debug, Clone, ClapArgs)]
pub struct EventArgs {
    #[command(flatten)]
    pub dates: EventDateArgs,

    #[arg(long, help = "Title of the event")]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long, help = "Link to the event page")]
    pub url: Option<String>,
}

impl From<EventArgs> for CalendarEvent {
    fn from(args: EventArgs) -> Self {
        CalendarEvent {
            title: args.title,
            description: args.description,
            location: args.location,
            url: args.url,
            dates: args.dates.into(),
        }
    }
}

/// Builds the calendar options from the 'ics' arguments.
pub fn calendar_options(product_id: Option<String>) -> CalendarOptions {
    match product_id {
        Some(product_id) => CalendarOptions { product_id },
        None => CalendarOptions::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_with_global_flag_after_subcommand() {
        let args = Args::parse_from(["waymark", "track", "hike.gpx", "--fallback-waypoints", "--json"]);
        assert!(args.fallback_waypoints);
        match args.command {
            Command::Track { source, json } => {
                assert_eq!(source, TrackSource::Path("hike.gpx".into()));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn negative_coordinates_are_accepted() {
        let args = Args::parse_from([
            "waymark",
            "nearest",
            "https://example.com/t.gpx",
            "--lat",
            "-33.9",
            "--lon",
            "-70.1",
        ]);
        match args.command {
            Command::Nearest { source, lat, lon } => {
                assert!(matches!(source, TrackSource::Url(_)));
                assert_eq!((lat, lon), (-33.9, -70.1));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn event_args_become_a_calendar_event() {
        let args = Args::parse_from([
            "waymark",
            "google",
            "--date",
            "2024-06-01",
            "--start-time",
            "14",
            "--title",
            "Hike",
            "--location",
            "Hut",
        ]);
        let Command::Google { event } = args.command else {
            panic!("expected the google command");
        };
        let event = CalendarEvent::from(event);
        assert_eq!(event.title, "Hike");
        assert_eq!(event.dates, EventDateInput::new("2024-06-01").with_start_time("14"));
        assert_eq!(event.location.as_deref(), Some("Hut"));
    }
}
