//! Keeps a map and an elevation chart pointing at the same trackpoint.
//!
//! [`TrackSelection`] is the only writer. It publishes a [`SelectionState`]
//! over a `watch` channel and each view owns a controller that reads it.
//! The views never talk to each other. When a new track is loaded the
//! generation is bumped and every controller throws away its overlays and
//! draws them again from scratch.

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::watch;

use crate::{
    model::{Bounds, GpxTrack, GpxWaypoint, Lat, Lon, TrackStats},
    nearest::{find_closest_point_index, waypoint_indices},
    profile::ElevationProfile,
};

/// Everything derived from a track when it is loaded. Nothing here changes
/// while the track is selected, so it is shared behind an Arc.
#[derive(Debug, Clone)]
pub struct TrackView {
    pub track: GpxTrack,
    pub stats: TrackStats,
    /// The waypoints drawn on the map. Either the ones in the file or the
    /// synthesised fallback set.
    pub waypoints: Vec<GpxWaypoint>,
    /// Parallel to 'waypoints': the trackpoint each waypoint snaps to.
    pub checkpoint_indices: Vec<usize>,
    pub profile: ElevationProfile,
    pub bounds: Option<Bounds>,
}

impl TrackView {
    pub fn new(track: GpxTrack, use_fallback_waypoints: bool) -> Self {
        let stats = track.stats();
        let waypoints = track.waypoints_or_fallback(use_fallback_waypoints);
        let checkpoint_indices = if track.is_empty() {
            Vec::new()
        } else {
            waypoint_indices(&track.points, &waypoints)
        };
        let profile =
            ElevationProfile::build_with_indices(&track.points, &waypoints, &checkpoint_indices);
        let bounds = track.bounds();

        Self {
            track,
            stats,
            waypoints,
            checkpoint_indices,
            profile,
            bounds,
        }
    }

    pub fn is_checkpoint(&self, index: usize) -> bool {
        self.checkpoint_indices.contains(&index)
    }

    fn highlight_at(&self, index: usize) -> Option<Highlight> {
        let last = self.track.num_points().checked_sub(1)?;
        let index = index.min(last);
        let point = &self.track.points[index];
        Some(Highlight {
            index,
            lat: point.lat,
            lon: point.lon,
            is_checkpoint: self.is_checkpoint(index),
        })
    }
}

/// The currently highlighted trackpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    pub index: usize,
    pub lat: Lat,
    pub lon: Lon,
    /// True if a waypoint snaps to this index, in which case the chart
    /// also activates the checkpoint series.
    pub is_checkpoint: bool,
}

/// What every view observes.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    /// Bumped every time the track is loaded, replaced or cleared.
    pub generation: u64,
    pub view: Option<Arc<TrackView>>,
    pub highlight: Option<Highlight>,
    /// The last selected coordinate as "lat, lon", ready to be copied.
    pub coordinates: Option<String>,
    /// Set when the last load failed. Safe to show to users.
    pub error: Option<String>,
}

impl SelectionState {
    pub fn has_points(&self) -> bool {
        self.view.as_ref().is_some_and(|v| !v.track.is_empty())
    }
}

/// Formats a coordinate for display and copying, e.g. "46.500000, 7.900000".
pub fn format_coordinates(lat: Lat, lon: Lon) -> String {
    format!("{lat:.6}, {lon:.6}")
}

/// The single owner of the highlighted index.
#[derive(Debug)]
pub struct TrackSelection {
    sender: watch::Sender<SelectionState>,
    use_fallback_waypoints: bool,
}

impl Default for TrackSelection {
    fn default() -> Self {
        Self::new(false)
    }
}

impl TrackSelection {
    pub fn new(use_fallback_waypoints: bool) -> Self {
        let (sender, _) = watch::channel(SelectionState::default());
        Self {
            sender,
            use_fallback_waypoints,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.sender.subscribe()
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> SelectionState {
        self.sender.borrow().clone()
    }

    pub fn view(&self) -> Option<Arc<TrackView>> {
        self.sender.borrow().view.clone()
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.sender.borrow().highlight
    }

    /// Replaces the current track. The first point is highlighted straight
    /// away. An empty track leaves nothing highlighted.
    pub fn load_track(&self, track: GpxTrack) -> Arc<TrackView> {
        let view = Arc::new(TrackView::new(track, self.use_fallback_waypoints));
        info!(
            "Selected track with {} points and {} checkpoints: {}",
            view.track.num_points(),
            view.checkpoint_indices.len(),
            view.stats
        );

        let highlight = view.highlight_at(0);
        let published = Arc::clone(&view);
        self.sender.send_modify(|state| {
            state.generation += 1;
            state.view = Some(published);
            state.highlight = highlight;
            state.coordinates = None;
            state.error = None;
        });

        view
    }

    /// Drops the current track, e.g. because loading a new one failed.
    /// 'user_message' is shown in place of the map.
    pub fn fail(&self, user_message: impl Into<String>) {
        let user_message = user_message.into();
        self.sender.send_modify(|state| {
            state.generation += 1;
            state.view = None;
            state.highlight = None;
            state.error = Some(user_message);
        });
    }

    /// Drops the current track.
    pub fn clear(&self) {
        self.sender.send_modify(|state| {
            *state = SelectionState {
                generation: state.generation + 1,
                ..Default::default()
            };
        });
    }

    /// Moves the highlight to 'index', clamped to the track. Used for chart
    /// hovering, so the coordinate readout is left alone. Returns the new
    /// highlight, or None if there are no points.
    pub fn set_index(&self, index: usize) -> Option<Highlight> {
        self.update(index, None)
    }

    /// As 'set_index', but also publishes the coordinate of the point.
    /// Used for chart clicks.
    pub fn select_index(&self, index: usize) -> Option<Highlight> {
        self.update(index, Some(Readout::Snapped))
    }

    /// Handles a click on the trail: the nearest point is highlighted and
    /// the clicked coordinate, not the snapped one, is published.
    pub fn select_on_map(&self, lat: Lat, lon: Lon) -> Option<Highlight> {
        let index = self.view().and_then(|v| {
            (!v.track.is_empty()).then(|| find_closest_point_index(&v.track.points, lat, lon))
        })?;
        self.update(index, Some(Readout::Clicked(lat, lon)))
    }

    /// Handles a click on the k-th rendered waypoint.
    pub fn select_waypoint(&self, waypoint_index: usize) -> Option<Highlight> {
        let index = self
            .view()
            .and_then(|v| v.checkpoint_indices.get(waypoint_index).copied())?;
        self.select_index(index)
    }

    /// Handles a click on the map away from the trail. Only the coordinate
    /// readout changes.
    pub fn pin_coordinate(&self, lat: Lat, lon: Lon) {
        let formatted = format_coordinates(lat, lon);
        self.sender.send_modify(|state| state.coordinates = Some(formatted));
    }

    fn update(&self, index: usize, readout: Option<Readout>) -> Option<Highlight> {
        let mut result = None;

        self.sender.send_if_modified(|state| {
            let Some(highlight) = state.view.as_ref().and_then(|v| v.highlight_at(index)) else {
                return false;
            };

            let coordinates = match readout {
                Some(Readout::Snapped) => Some((highlight.lat, highlight.lon)),
                Some(Readout::Clicked(lat, lon)) => Some((lat, lon)),
                None => None,
            };
            if let Some((lat, lon)) = coordinates {
                state.coordinates = Some(format_coordinates(lat, lon));
            }

            debug!("Highlight moved to index {}", highlight.index);
            state.highlight = Some(highlight);
            result = Some(highlight);
            true
        });

        result
    }
}

#[derive(Debug, Clone, Copy)]
enum Readout {
    Snapped,
    Clicked(Lat, Lon),
}

/// The operations the map view needs from a mapping library.
pub trait MapSurface {
    fn draw_polyline(&mut self, latlngs: &[[f64; 2]]);
    fn fit_bounds(&mut self, bounds: Bounds);
    fn add_waypoint_marker(&mut self, waypoint: &GpxWaypoint, point_index: usize);
    /// Places the highlight marker, or moves it if it is already there.
    fn place_highlight_marker(&mut self, lat: Lat, lon: Lon);
    /// Removes everything this crate has drawn.
    fn clear(&mut self);
}

/// The operations the chart view needs from a charting library.
pub trait ChartSurface {
    fn render_profile(&mut self, profile: &ElevationProfile);
    /// Activates the elevation point at 'index', and the checkpoint point
    /// too if 'checkpoint' is true.
    fn set_active_point(&mut self, index: usize, checkpoint: bool);
    fn clear_active_point(&mut self);
    fn clear(&mut self);
}

/// Drives a [`MapSurface`] from a selection.
#[derive(Debug)]
pub struct MapController<M> {
    surface: M,
    receiver: watch::Receiver<SelectionState>,
    generation: Option<u64>,
    highlight: Option<Highlight>,
}

impl<M: MapSurface> MapController<M> {
    pub fn new(surface: M, receiver: watch::Receiver<SelectionState>) -> Self {
        Self {
            surface,
            receiver,
            generation: None,
            highlight: None,
        }
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut M {
        &mut self.surface
    }

    /// Brings the surface up to date with the latest published state.
    pub fn sync(&mut self) {
        let state = self.receiver.borrow_and_update().clone();

        if self.generation != Some(state.generation) {
            self.rebuild(&state);
        } else if state.highlight != self.highlight {
            if let Some(h) = state.highlight {
                self.surface.place_highlight_marker(h.lat, h.lon);
            }
            self.highlight = state.highlight;
        }
    }

    fn rebuild(&mut self, state: &SelectionState) {
        debug!("Rebuilding map overlays for generation {}", state.generation);
        self.surface.clear();
        self.generation = Some(state.generation);
        self.highlight = None;

        let Some(view) = state.view.as_ref().filter(|v| !v.track.is_empty()) else {
            return;
        };

        self.surface.draw_polyline(&view.track.polyline());
        if let Some(bounds) = view.bounds {
            self.surface.fit_bounds(bounds);
        }
        for (waypoint, &point_index) in view.waypoints.iter().zip(&view.checkpoint_indices) {
            self.surface.add_waypoint_marker(waypoint, point_index);
        }
        if let Some(h) = state.highlight {
            self.surface.place_highlight_marker(h.lat, h.lon);
        }
        self.highlight = state.highlight;
    }

    /// Follows the selection until its writer is dropped, then hands the
    /// surface back.
    pub async fn run(mut self) -> M {
        self.sync();
        while self.receiver.changed().await.is_ok() {
            self.sync();
        }
        self.surface
    }
}

/// Drives a [`ChartSurface`] from a selection.
#[derive(Debug)]
pub struct ChartController<C> {
    surface: C,
    receiver: watch::Receiver<SelectionState>,
    generation: Option<u64>,
    highlight: Option<Highlight>,
}

impl<C: ChartSurface> ChartController<C> {
    pub fn new(surface: C, receiver: watch::Receiver<SelectionState>) -> Self {
        Self {
            surface,
            receiver,
            generation: None,
            highlight: None,
        }
    }

    pub fn surface(&self) -> &C {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut C {
        &mut self.surface
    }

    /// Brings the surface up to date with the latest published state.
    pub fn sync(&mut self) {
        let state = self.receiver.borrow_and_update().clone();

        if self.generation != Some(state.generation) {
            debug!("Rebuilding chart for generation {}", state.generation);
            self.surface.clear();
            self.generation = Some(state.generation);
            self.highlight = None;

            if let Some(view) = state.view.as_ref().filter(|v| !v.track.is_empty()) {
                self.surface.render_profile(&view.profile);
            } else {
                return;
            }
        }

        if state.highlight != self.highlight {
            if let Some(h) = state.highlight {
                self.surface.set_active_point(h.index, h.is_checkpoint);
            }
            self.highlight = state.highlight;
        }
    }

    /// The pointer has left the chart. The active point is cleared but the
    /// selection is unchanged, so the map keeps its marker. The next sync
    /// activates the highlight again, even if it has not moved.
    pub fn pointer_left(&mut self) {
        if self.generation.is_some() {
            self.surface.clear_active_point();
            self.highlight = None;
        }
    }

    /// Follows the selection until its writer is dropped, then hands the
    /// surface back.
    pub async fn run(mut self) -> C {
        self.sync();
        while self.receiver.changed().await.is_ok() {
            self.sync();
        }
        self.surface
    }
}

#[cfg(test)]
mod tests {
    use crate::model::GpxPoint;

    use super::*;

    #[derive(Debug, Default)]
    struct FakeMap {
        calls: Vec<String>,
    }

    impl MapSurface for FakeMap {
        fn draw_polyline(&mut self, latlngs: &[[f64; 2]]) {
            self.calls.push(format!("polyline {}", latlngs.len()));
        }

        fn fit_bounds(&mut self, bounds: Bounds) {
            self.calls.push(format!("fit {:.2} {:.2}", bounds.min_lat, bounds.max_lat));
        }

        fn add_waypoint_marker(&mut self, waypoint: &GpxWaypoint, point_index: usize) {
            self.calls
                .push(format!("marker {} @{point_index}", waypoint.name.as_deref().unwrap_or("?")));
        }

        fn place_highlight_marker(&mut self, lat: Lat, lon: Lon) {
            self.calls.push(format!("highlight {lat:.2} {lon:.2}"));
        }

        fn clear(&mut self) {
            self.calls.push("clear".into());
        }
    }

    #[derive(Debug, Default)]
    struct FakeChart {
        calls: Vec<String>,
    }

    impl ChartSurface for FakeChart {
        fn render_profile(&mut self, profile: &ElevationProfile) {
            self.calls.push(format!("render {}", profile.len()));
        }

        fn set_active_point(&mut self, index: usize, checkpoint: bool) {
            self.calls.push(format!("active {index} {checkpoint}"));
        }

        fn clear_active_point(&mut self) {
            self.calls.push("inactive".into());
        }

        fn clear(&mut self) {
            self.calls.push("clear".into());
        }
    }

    fn track() -> GpxTrack {
        let points = (0..5)
            .map(|i| {
                let mut p = GpxPoint::with_lat_lon(46.0 + i as f64 * 0.01, 7.0);
                p.elevation = Some(1000.0 + i as f64 * 10.0);
                p
            })
            .collect();
        let mut spring = GpxWaypoint::with_lat_lon(46.0299, 7.0);
        spring.name = Some("Spring".into());
        GpxTrack::new(points, vec![spring])
    }

    #[test]
    fn loading_highlights_the_first_point() {
        let selection = TrackSelection::default();
        let view = selection.load_track(track());
        assert_eq!(view.checkpoint_indices, vec![3]);

        let state = selection.state();
        assert_eq!(state.generation, 1);
        let highlight = state.highlight.unwrap();
        assert_eq!((highlight.index, highlight.lat), (0, 46.0));
        assert!(!highlight.is_checkpoint);
    }

    #[test]
    fn set_index_clamps_into_range() {
        let selection = TrackSelection::default();
        selection.load_track(track());
        assert_eq!(selection.set_index(99).unwrap().index, 4);
        assert!(selection.set_index(3).unwrap().is_checkpoint);
    }

    #[test]
    fn set_index_without_points_is_a_no_op() {
        let selection = TrackSelection::default();
        let mut rx = selection.subscribe();
        let _ = rx.borrow_and_update();

        assert_eq!(selection.set_index(2), None);
        selection.load_track(GpxTrack::default());
        let _ = rx.borrow_and_update();
        assert_eq!(selection.set_index(2), None);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(selection.highlight(), None);
    }

    #[test]
    fn map_click_snaps_index_but_reports_clicked_coordinate() {
        let selection = TrackSelection::default();
        selection.load_track(track());

        let h = selection.select_on_map(46.0201, 7.0003).unwrap();
        assert_eq!(h.index, 2);
        assert_eq!(selection.state().coordinates.as_deref(), Some("46.020100, 7.000300"));
    }

    #[test]
    fn chart_hover_leaves_the_readout_alone() {
        let selection = TrackSelection::default();
        selection.load_track(track());
        selection.select_index(1);
        assert_eq!(selection.state().coordinates.as_deref(), Some("46.010000, 7.000000"));

        selection.set_index(4);
        assert_eq!(selection.state().coordinates.as_deref(), Some("46.010000, 7.000000"));
        assert_eq!(selection.highlight().unwrap().index, 4);
    }

    #[test]
    fn waypoint_click_uses_the_precomputed_index() {
        let selection = TrackSelection::default();
        selection.load_track(track());
        assert_eq!(selection.select_waypoint(0).unwrap().index, 3);
        assert_eq!(selection.select_waypoint(1), None);
    }

    #[test]
    fn pinning_a_coordinate_does_not_move_the_highlight() {
        let selection = TrackSelection::default();
        selection.load_track(track());
        selection.set_index(2);
        selection.pin_coordinate(1.5, -2.25);

        let state = selection.state();
        assert_eq!(state.coordinates.as_deref(), Some("1.500000, -2.250000"));
        assert_eq!(state.highlight.unwrap().index, 2);
    }

    #[test]
    fn failure_clears_the_track() {
        let selection = TrackSelection::default();
        selection.load_track(track());
        selection.fail("Unable to display GPX track");

        let state = selection.state();
        assert_eq!(state.generation, 2);
        assert!(state.view.is_none());
        assert!(state.highlight.is_none());
        assert_eq!(state.error.as_deref(), Some("Unable to display GPX track"));

        selection.load_track(track());
        assert_eq!(selection.state().error, None);
    }

    #[test]
    fn map_controller_rebuilds_per_generation_and_moves_marker_otherwise() {
        let selection = TrackSelection::default();
        let mut map = MapController::new(FakeMap::default(), selection.subscribe());

        selection.load_track(track());
        map.sync();
        assert_eq!(
            map.surface().calls,
            vec![
                "clear",
                "polyline 5",
                "fit 46.00 46.04",
                "marker Spring @3",
                "highlight 46.00 7.00"
            ]
        );

        map.surface_mut().calls.clear();
        selection.select_on_map(46.03, 7.0);
        map.sync();
        assert_eq!(map.surface().calls, vec!["highlight 46.03 7.00"]);

        map.surface_mut().calls.clear();
        selection.clear();
        map.sync();
        assert_eq!(map.surface().calls, vec!["clear"]);
    }

    #[test]
    fn chart_controller_activates_checkpoint_series() {
        let selection = TrackSelection::default();
        let mut chart = ChartController::new(FakeChart::default(), selection.subscribe());

        selection.load_track(track());
        chart.sync();
        assert_eq!(chart.surface().calls, vec!["clear", "render 5", "active 0 false"]);

        chart.surface_mut().calls.clear();
        selection.set_index(3);
        chart.sync();
        assert_eq!(chart.surface().calls, vec!["active 3 true"]);
    }

    #[test]
    fn pointer_leave_only_clears_the_chart() {
        let selection = TrackSelection::default();
        let mut chart = ChartController::new(FakeChart::default(), selection.subscribe());
        let mut map = MapController::new(FakeMap::default(), selection.subscribe());

        selection.load_track(track());
        selection.set_index(2);
        chart.sync();
        map.sync();
        chart.surface_mut().calls.clear();
        map.surface_mut().calls.clear();

        chart.pointer_left();
        map.sync();
        assert_eq!(chart.surface().calls, vec!["inactive"]);
        assert!(map.surface().calls.is_empty());
        assert_eq!(selection.highlight().unwrap().index, 2);
    }

    #[test]
    fn returning_to_the_same_point_reactivates_the_chart() {
        let selection = TrackSelection::default();
        let mut chart = ChartController::new(FakeChart::default(), selection.subscribe());

        selection.load_track(track());
        selection.set_index(2);
        chart.sync();
        chart.pointer_left();
        chart.surface_mut().calls.clear();

        selection.set_index(2);
        chart.sync();
        assert_eq!(chart.surface().calls, vec!["active 2 false"]);
    }

    #[tokio::test]
    async fn controllers_follow_until_selection_is_dropped() {
        let selection = TrackSelection::default();
        let map = tokio::spawn(MapController::new(FakeMap::default(), selection.subscribe()).run());
        let chart =
            tokio::spawn(ChartController::new(FakeChart::default(), selection.subscribe()).run());

        selection.load_track(track());
        drop(selection);

        // Whatever intermediate states were skipped, both views end up
        // showing the loaded track.
        let map = map.await.unwrap();
        let chart = chart.await.unwrap();
        assert!(map.calls.contains(&"polyline 5".to_string()));
        assert_eq!(chart.calls.last().map(String::as_str), Some("active 0 false"));
    }
}
