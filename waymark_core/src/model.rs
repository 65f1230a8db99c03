use std::{fmt, path::PathBuf};

use serde::Serialize;
use time::OffsetDateTime;

pub type Lat = f64; // -90..90
pub type Lon = f64; // -180..180

/// The data this crate extracts from a GPX file. Only the parts needed to
/// draw a hike are kept: the trail itself and the points of interest along
/// it. See https://www.topografix.com/GPX/1/1/gpx.xsd for the full format.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GpxTrack {
    /// Not part of the XSD. Set when the track was read from a file so
    /// that it can be used in log messages.
    #[serde(skip)]
    pub filename: Option<PathBuf>,
    /// Every 'trkpt' in the document, in document order. The index into
    /// this vector is what the map and the chart use to refer to a point.
    pub points: Vec<GpxPoint>,
    /// Every 'wpt' in the document, in document order.
    pub waypoints: Vec<GpxWaypoint>,
}

/// A pair of (lat, lon) coordinates which constitute a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// The minimum latitude.
    pub min_lat: Lat,
    /// The minimum longitude.
    pub min_lon: Lon,
    /// The maximum latitude.
    pub max_lat: Lat,
    /// The maximum longitude.
    pub max_lon: Lon,
}

/// One recorded position on the trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpxPoint {
    /// The latitude, read from the "lat" attribute.
    pub lat: Lat,
    /// The longitude, read from the "lon" attribute.
    pub lon: Lon,
    /// The elevation in metres, as read from the <ele> tag. None when the
    /// tag is missing or does not contain a number.
    pub elevation: Option<f64>,
    /// The time as read from the <time> tag.
    #[serde(with = "time::serde::rfc3339::option")]
    pub time: Option<OffsetDateTime>,
}

impl GpxPoint {
    pub fn with_lat_lon(lat: Lat, lon: Lon) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            time: None,
        }
    }

    /// Returns the point as the [lat, lon] pair that map libraries expect.
    pub fn lat_lon(&self) -> [f64; 2] {
        [self.lat, self.lon]
    }
}

/// A named point of interest such as a trailhead, a spring or a summit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpxWaypoint {
    pub lat: Lat,
    pub lon: Lon,
    /// The <name> of the waypoint.
    pub name: Option<String>,
    /// The <desc> of the waypoint.
    pub description: Option<String>,
    /// Best-effort classification of the <sym>, <name> or <desc> text.
    pub icon: Option<WaypointIcon>,
}

impl GpxWaypoint {
    pub fn with_lat_lon(lat: Lat, lon: Lon) -> Self {
        Self {
            lat,
            lon,
            name: None,
            description: None,
            icon: None,
        }
    }

    /// The label shown in marker popups and chart tooltips, e.g.
    /// "Spring: Refill here" or just "Spring".
    pub fn label(&self) -> String {
        let name = self.name.as_deref().unwrap_or("Checkpoint");
        match &self.description {
            Some(desc) => format!("{name}: {desc}"),
            None => name.to_string(),
        }
    }
}

/// The kind of marker drawn for a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointIcon {
    Start,
    Finish,
    Water,
    Food,
    Rest,
    Pin,
}

impl WaypointIcon {
    /// Classifies free text from a GPX file. The keywords are checked in
    /// order, so "Summit spring" is a Finish, not Water.
    pub fn classify(hint: &str) -> Self {
        const KEYWORDS: [(&[&str], WaypointIcon); 5] = [
            (&["start", "trailhead"], WaypointIcon::Start),
            (&["summit", "finish", "peak"], WaypointIcon::Finish),
            (&["water", "spring"], WaypointIcon::Water),
            (&["food", "meal", "snack"], WaypointIcon::Food),
            (&["camp", "rest"], WaypointIcon::Rest),
        ];

        let lower = hint.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
            .map(|(_, icon)| *icon)
            .unwrap_or(WaypointIcon::Pin)
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            WaypointIcon::Start => "🥾",
            WaypointIcon::Finish => "🎉",
            WaypointIcon::Water => "💧",
            WaypointIcon::Food => "🥪",
            WaypointIcon::Rest => "⛺️",
            WaypointIcon::Pin => "📍",
        }
    }
}

impl fmt::Display for WaypointIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

/// Summary figures for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    /// Total distance along the trail, including the slope.
    pub distance_km: f64,
    /// Total climb in metres. None when there is nothing to report, which
    /// covers both "no elevation data" and "perfectly flat".
    pub ascent: Option<f64>,
    /// Total drop in metres, with the same None semantics as 'ascent'.
    pub descent: Option<f64>,
}

impl Default for TrackStats {
    fn default() -> Self {
        Self {
            distance_km: 0.0,
            ascent: None,
            descent: None,
        }
    }
}

impl fmt::Display for TrackStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} km", self.distance_km)?;
        match self.ascent {
            Some(a) => write!(f, ", +{a:.0} m")?,
            None => write!(f, ", +n/a")?,
        }
        match self.descent {
            Some(d) => write!(f, " / -{d:.0} m"),
            None => write!(f, " / -n/a"),
        }
    }
}
