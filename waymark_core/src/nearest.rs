use crate::model::{GpxPoint, GpxWaypoint, Lat, Lon};

/// Returns the index of the point closest to (lat, lon).
///
/// The metric is plain Euclidean distance on the raw degrees. That is only
/// meaningful over a small area, which is all we need to snap a click or a
/// waypoint onto a trail, but it must not be used to rank points that are
/// far apart. When several points are equally close the lowest index wins.
/// An empty slice returns 0, so callers must check for an empty track first.
pub fn find_closest_point_index(points: &[GpxPoint], lat: Lat, lon: Lon) -> usize {
    let mut closest_index = 0;
    let mut min_distance = f64::INFINITY;

    for (index, point) in points.iter().enumerate() {
        let d_lat = point.lat - lat;
        let d_lon = point.lon - lon;
        let distance = (d_lat * d_lat + d_lon * d_lon).sqrt();

        // Strictly less-than keeps the first of several equal candidates.
        if distance < min_distance {
            min_distance = distance;
            closest_index = index;
        }
    }

    closest_index
}

/// Snaps every waypoint onto the trail, returning one point index per
/// waypoint, in the same order as the waypoints.
pub fn waypoint_indices(points: &[GpxPoint], waypoints: &[GpxWaypoint]) -> Vec<usize> {
    waypoints
        .iter()
        .map(|w| find_closest_point_index(points, w.lat, w.lon))
        .collect()
}
