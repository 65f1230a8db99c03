//! Distance, ascent and descent for a track.
//!
//! Distances are measured along the slope: the great-circle distance
//! between two consecutive points is combined with the change in elevation
//! using Pythagoras. On a steep trail this makes a noticeable difference
//! compared to a flat haversine distance.

use log::debug;
use logging_timer::time;

use crate::model::{GpxPoint, TrackStats};

/// The radius of the Earth in metres, as used by the haversine formula.
pub const EARTH_RADIUS_METRES: f64 = 6_371_000.0;

/// Great-circle distance in metres between two lat-lon positions.
pub fn haversine_metres(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METRES * a.sqrt().atan2((1.0 - a).sqrt())
}

/// The change in elevation from p1 to p2, if both elevations are known.
pub fn elevation_delta(p1: &GpxPoint, p2: &GpxPoint) -> Option<f64> {
    Some(p2.elevation? - p1.elevation?)
}

/// Distance in metres from p1 to p2, taking the slope into account. If either
/// elevation is unknown the segment is treated as level.
pub fn segment_distance_metres(p1: &GpxPoint, p2: &GpxPoint) -> f64 {
    let surface = haversine_metres(p1.lat, p1.lon, p2.lat, p2.lon);
    let ele_delta = elevation_delta(p1, p2).unwrap_or(0.0);
    (surface * surface + ele_delta * ele_delta).sqrt()
}

/// Returns the running distance in metres to every point. The first entry is
/// always 0 and the sequence never decreases. An empty input gives [0.0], so
/// the result is never empty.
pub fn cumulative_distances(points: &[GpxPoint]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(points.len().max(1));
    distances.push(0.0);

    let mut running_metres = 0.0;
    for pair in points.windows(2) {
        running_metres += segment_distance_metres(&pair[0], &pair[1]);
        distances.push(running_metres);
    }

    distances
}

/// Calculates the total distance, ascent and descent of a track.
///
/// Ascent and descent only count segments where both ends have a known
/// elevation. A total of zero is reported as None, the same as when there
/// is no elevation data at all.
#[time]
pub fn compute_stats(points: &[GpxPoint]) -> TrackStats {
    if points.len() < 2 {
        return TrackStats::default();
    }

    let mut running_metres = 0.0;
    let mut ascent_metres = 0.0;
    let mut descent_metres = 0.0;

    for pair in points.windows(2) {
        running_metres += segment_distance_metres(&pair[0], &pair[1]);

        match elevation_delta(&pair[0], &pair[1]) {
            Some(delta) if delta > 0.0 => ascent_metres += delta,
            Some(delta) => descent_metres += delta.abs(),
            None => (),
        }
    }

    debug!(
        "Computed stats for {} points: {running_metres:.1}m, +{ascent_metres:.1}m, -{descent_metres:.1}m",
        points.len()
    );

    TrackStats {
        distance_km: running_metres / 1000.0,
        ascent: (ascent_metres > 0.0).then_some(ascent_metres),
        descent: (descent_metres > 0.0).then_some(descent_metres),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64, ele: Option<f64>) -> GpxPoint {
        let mut p = GpxPoint::with_lat_lon(lat, lon);
        p.elevation = ele;
        p
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = expected.abs() * 1e-3;
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn one_degree_of_latitude() {
        // 2 * PI * R / 360
        assert_close(haversine_metres(0.0, 0.0, 1.0, 0.0), 111_194.93);
    }

    #[test]
    fn slope_is_included_in_segment_distance() {
        let p1 = point(46.0, 7.0, Some(1000.0));
        let p2 = point(46.001, 7.0, Some(1100.0));
        let flat = haversine_metres(46.0, 7.0, 46.001, 7.0);
        let expected = (flat * flat + 100.0 * 100.0).sqrt();
        assert_close(segment_distance_metres(&p1, &p2), expected);
    }

    #[test]
    fn unknown_elevation_counts_as_level_for_distance() {
        let p1 = point(46.0, 7.0, Some(1000.0));
        let p2 = point(46.001, 7.0, None);
        assert_close(
            segment_distance_metres(&p1, &p2),
            haversine_metres(46.0, 7.0, 46.001, 7.0),
        );
    }

    #[test]
    fn right_angle_trail_matches_hand_calculation() {
        let points = vec![
            point(0.0, 0.0, Some(100.0)),
            point(0.01, 0.0, Some(150.0)),
            point(0.01, 0.01, Some(120.0)),
        ];

        // Leg 1 runs due north along a meridian: R * dLat.
        let leg1_surface = EARTH_RADIUS_METRES * 0.01_f64.to_radians();
        let leg1 = (leg1_surface.powi(2) + 50.0_f64.powi(2)).sqrt();
        // Leg 2 runs due east at latitude 0.01 degrees.
        let lat = 0.01_f64.to_radians();
        let a = lat.cos().powi(2) * (0.01_f64.to_radians() / 2.0).sin().powi(2);
        let leg2_surface = 2.0 * EARTH_RADIUS_METRES * a.sqrt().asin();
        let leg2 = (leg2_surface.powi(2) + 30.0_f64.powi(2)).sqrt();

        let distances = cumulative_distances(&points);
        assert_eq!(distances[0], 0.0);
        assert_close(distances[1], leg1);
        assert_close(distances[2], leg1 + leg2);

        let stats = compute_stats(&points);
        assert_close(stats.distance_km, (leg1 + leg2) / 1000.0);
        assert_eq!(stats.ascent, Some(50.0));
        assert_eq!(stats.descent, Some(30.0));
    }

    #[test]
    fn cumulative_distances_never_decrease() {
        let points = vec![
            point(46.0, 7.0, Some(10.0)),
            point(46.0, 7.0, Some(10.0)),
            point(46.1, 7.1, None),
            point(46.0, 7.0, Some(5.0)),
        ];
        let distances = cumulative_distances(&points);
        assert_eq!(distances.len(), 4);
        assert!(distances.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn fewer_than_two_points_is_degenerate() {
        assert_eq!(compute_stats(&[]), TrackStats::default());
        assert_eq!(compute_stats(&[point(1.0, 1.0, Some(5.0))]), TrackStats::default());
    }

    #[test]
    fn constant_elevation_reports_no_ascent_or_descent() {
        let points = vec![
            point(46.0, 7.0, Some(500.0)),
            point(46.01, 7.0, Some(500.0)),
            point(46.02, 7.0, Some(500.0)),
        ];
        let stats = compute_stats(&points);
        assert!(stats.distance_km > 0.0);
        assert_eq!(stats.ascent, None);
        assert_eq!(stats.descent, None);
    }

    #[test]
    fn segments_with_unknown_elevation_do_not_climb() {
        let points = vec![
            point(46.0, 7.0, Some(500.0)),
            point(46.01, 7.0, None),
            point(46.02, 7.0, Some(900.0)),
            point(46.03, 7.0, Some(950.0)),
        ];
        let stats = compute_stats(&points);
        assert_eq!(stats.ascent, Some(50.0));
        assert_eq!(stats.descent, None);
    }
}
