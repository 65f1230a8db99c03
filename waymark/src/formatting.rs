use std::fmt::Write;

use time::format_description::well_known;
use time::OffsetDateTime;
use waymark_core::sync::TrackView;

/// Formats 'date' into a string like "2024-09-01T05:10:44Z". This is the
/// format that GPX files contain.
pub fn format_date(date: &OffsetDateTime) -> String {
    date.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| date.to_string())
}

/// A few lines describing a track, for the terminal.
pub fn format_track_summary(view: &TrackView) -> String {
    let mut s = String::new();
    let track = &view.track;

    if let Some(filename) = &track.filename {
        let _ = writeln!(s, "{}", filename.display());
    }

    if track.is_empty() {
        s.push_str("No trackpoints\n");
        return s;
    }

    let _ = writeln!(s, "{} trackpoints, {}", track.num_points(), view.stats);

    let first = track.points.first().and_then(|p| p.time);
    let last = track.points.last().and_then(|p| p.time);
    if let (Some(first), Some(last)) = (first, last) {
        let _ = writeln!(s, "Recorded {} to {}", format_date(&first), format_date(&last));
    }

    for (waypoint, index) in view.waypoints.iter().zip(&view.checkpoint_indices) {
        let icon = waypoint.icon.map(|i| i.glyph()).unwrap_or(" ");
        let _ = writeln!(
            s,
            "  {icon} {:<24} km {:>7}  (point {index})",
            waypoint.label(),
            view.profile.labels.get(*index).map(String::as_str).unwrap_or("?")
        );
    }

    s
}
