use geo::{coord, BoundingRect, LineString};
use log::debug;

use crate::{
    model::{Bounds, GpxPoint, GpxTrack, GpxWaypoint, TrackStats, WaypointIcon},
    stats::compute_stats,
};

impl GpxTrack {
    /// Creates a track from already-parsed points and waypoints.
    pub fn new(points: Vec<GpxPoint>, waypoints: Vec<GpxWaypoint>) -> Self {
        Self {
            filename: None,
            points,
            waypoints,
        }
    }

    /// Returns the number of trackpoints.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Returns true if there is no route to draw.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the distance, ascent and descent of the track.
    pub fn stats(&self) -> TrackStats {
        compute_stats(&self.points)
    }

    /// Returns the trail as the ordered list of [lat, lon] pairs that map
    /// libraries take for a polyline.
    pub fn polyline(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(GpxPoint::lat_lon).collect()
    }

    /// Returns the smallest box containing every trackpoint, or None for an
    /// empty track. Used to fit the map view to the trail.
    pub fn bounds(&self) -> Option<Bounds> {
        // n.b. x=lon, y=lat.
        let line_string: LineString<f64> = self
            .points
            .iter()
            .map(|p| coord! { x: p.lon, y: p.lat })
            .collect();

        line_string.bounding_rect().map(|rect| Bounds {
            min_lat: rect.min().y,
            min_lon: rect.min().x,
            max_lat: rect.max().y,
            max_lon: rect.max().x,
        })
    }

    /// Synthesises a trailhead, a midpoint and a summit from the first,
    /// middle and last points, for tracks whose file has no waypoints.
    /// Returns an empty list for an empty track.
    pub fn fallback_waypoints(&self) -> Vec<GpxWaypoint> {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return Vec::new();
        };
        let middle = &self.points[self.points.len() / 2];

        vec![
            synthetic_waypoint(first, "Trailhead", "Starting point", WaypointIcon::Start),
            synthetic_waypoint(middle, "Midpoint", "Halfway through the trail", WaypointIcon::Food),
            synthetic_waypoint(last, "Summit", "Finish line", WaypointIcon::Finish),
        ]
    }

    /// Returns the waypoints from the file, or the fallback set if the file
    /// has none and 'use_fallback' is true.
    pub fn waypoints_or_fallback(&self, use_fallback: bool) -> Vec<GpxWaypoint> {
        if !self.waypoints.is_empty() || !use_fallback {
            return self.waypoints.clone();
        }

        debug!("Track has no waypoints, synthesising trailhead/midpoint/summit");
        self.fallback_waypoints()
    }
}

fn synthetic_waypoint(
    point: &GpxPoint,
    name: &str,
    description: &str,
    icon: WaypointIcon,
) -> GpxWaypoint {
    GpxWaypoint {
        lat: point.lat,
        lon: point.lon,
        name: Some(name.to_string()),
        description: Some(description.to_string()),
        icon: Some(icon),
    }
}
