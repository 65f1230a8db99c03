//! The data behind the elevation chart: one entry per trackpoint, with a
//! sparse second series marking the checkpoints.

use serde::Serialize;

use crate::{
    model::{GpxPoint, GpxWaypoint},
    nearest::waypoint_indices,
    stats::cumulative_distances,
};

/// Everything a chart needs to draw the profile of a track. All the vectors
/// except 'badges' have one entry per trackpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevationProfile {
    /// The x-axis: cumulative distance in km, to 2 decimal places.
    pub labels: Vec<String>,
    /// The main series. None where the point has no elevation.
    pub elevations: Vec<Option<f64>>,
    /// The checkpoint series. Only indices that a waypoint snaps to have
    /// a value, which is 0 where the point has no elevation so the
    /// checkpoint is still drawn.
    pub checkpoints: Vec<Option<f64>>,
    /// The tooltip label for every index.
    pub tooltips: Vec<String>,
    /// One badge per rendered waypoint, in waypoint order.
    pub badges: Vec<CheckpointBadge>,
}

/// The short marker drawn above the chart for a waypoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointBadge {
    pub point_index: usize,
    pub text: String,
}

impl ElevationProfile {
    /// Builds the profile for 'points' with 'waypoints' snapped onto it.
    /// The waypoints should be the ones actually rendered on the map, which
    /// may be the fallback set.
    pub fn build(points: &[GpxPoint], waypoints: &[GpxWaypoint]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let indices = waypoint_indices(points, waypoints);
        Self::build_with_indices(points, waypoints, &indices)
    }

    /// As 'build', for callers that have already snapped the waypoints.
    /// 'indices' must be parallel to 'waypoints'.
    pub fn build_with_indices(
        points: &[GpxPoint],
        waypoints: &[GpxWaypoint],
        indices: &[usize],
    ) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let indices = &indices[..indices.len().min(waypoints.len())];

        let labels = cumulative_distances(points)
            .into_iter()
            .map(|metres| format!("{:.2}", metres / 1000.0))
            .collect();

        let elevations: Vec<Option<f64>> = points.iter().map(|p| p.elevation).collect();

        let checkpoints = elevations
            .iter()
            .enumerate()
            .map(|(idx, ele)| indices.contains(&idx).then(|| ele.unwrap_or(0.0)))
            .collect();

        let tooltips = elevations
            .iter()
            .enumerate()
            .map(|(idx, ele)| {
                // When two waypoints snap to the same point the first one wins.
                indices
                    .iter()
                    .position(|&i| i == idx)
                    .and_then(|wpt_idx| waypoints.get(wpt_idx))
                    .map(GpxWaypoint::label)
                    .unwrap_or_else(|| ele.map(elevation_label).unwrap_or_default())
            })
            .collect();

        let badges = indices
            .iter()
            .zip(waypoints)
            .enumerate()
            .map(|(wpt_idx, (&point_index, waypoint))| CheckpointBadge {
                point_index,
                text: badge_text(waypoint, wpt_idx),
            })
            .collect();

        Self {
            labels,
            elevations,
            checkpoints,
            tooltips,
            badges,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The tooltip title for an index, e.g. "Distance 1.25 km".
    pub fn tooltip_title(&self, index: usize) -> Option<String> {
        self.labels.get(index).map(|label| format!("Distance {label} km"))
    }

    /// True if a checkpoint sits on this index.
    pub fn is_checkpoint(&self, index: usize) -> bool {
        self.badges.iter().any(|b| b.point_index == index)
    }
}

fn elevation_label(metres: f64) -> String {
    format!("Elevation {} m", metres.round())
}

/// The first 3 characters of the name, upper-cased, or CP1, CP2... for
/// waypoints without a name. 'wpt_idx' is 0-based.
pub fn badge_text(waypoint: &GpxWaypoint, wpt_idx: usize) -> String {
    let name = match &waypoint.name {
        Some(name) => name.clone(),
        None => format!("CP{}", wpt_idx + 1),
    };

    name.chars().take(3).collect::<String>().to_uppercase()
}
