//! Bridge from position updates to the map widget.

use shared::{domain::Position, error::SyncError};
use tracing::{debug, info};

pub const DEFAULT_ZOOM: f32 = 12.0;
pub const DEFAULT_MARKER_LABEL: &str = "Location";

/// Map widget driven by the sink. Calls are synchronous and do not fail.
pub trait MapRenderer {
    fn ready(&self) -> bool;
    fn clear_markers(&mut self);
    fn add_marker(&mut self, latitude: f64, longitude: f64, label: &str);
    fn center_on(&mut self, latitude: f64, longitude: f64, zoom: f32);
}

pub struct PositionSink<R> {
    renderer: R,
    zoom: f32,
    label: String,
    pending: Option<Position>,
    rendered: Option<Position>,
}

impl<R: MapRenderer> PositionSink<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_view(renderer, DEFAULT_ZOOM, DEFAULT_MARKER_LABEL)
    }

    pub fn with_view(renderer: R, zoom: f32, label: impl Into<String>) -> Self {
        Self {
            renderer,
            zoom,
            label: label.into(),
            pending: None,
            rendered: None,
        }
    }

    /// Absent positions leave the map as it is. While the map is not ready
    /// only the latest position is kept.
    pub fn on_position(&mut self, position: Option<Position>) {
        let Some(position) = position else {
            debug!("position absent; keeping current marker");
            return;
        };
        if !self.renderer.ready() {
            debug!(%position, "map not ready; buffering position");
            self.pending = Some(position);
            return;
        }
        self.render(position);
    }

    pub fn on_map_ready(&mut self) {
        if !self.renderer.ready() {
            return;
        }
        if let Some(position) = self.pending.take() {
            self.render(position);
        }
    }

    /// Anything still buffered is older than `position` and is dropped.
    fn render(&mut self, position: Position) {
        self.pending = None;
        self.renderer.clear_markers();
        self.renderer
            .add_marker(position.latitude, position.longitude, &self.label);
        self.renderer
            .center_on(position.latitude, position.longitude, self.zoom);
        self.rendered = Some(position);
        info!(%position, zoom = self.zoom, "marker moved");
    }

    pub fn rendered(&self) -> Option<Position> {
        self.rendered
    }

    pub fn pending(&self) -> Option<Position> {
        self.pending
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

/// Text for the coordinate label next to the map.
pub fn status_text(result: &Result<Position, SyncError>) -> String {
    match result {
        Ok(position) => format!(
            "Latitude: {}\nLongitude: {}",
            position.latitude, position.longitude
        ),
        Err(SyncError::Decode { .. }) => "GPS data is incomplete.".to_string(),
        Err(SyncError::NotFound { .. }) => "GPS data is not available.".to_string(),
        Err(err) => format!("Could not load GPS data: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use shared::{error::StoreError, protocol::gps_path};

    use super::*;

    #[derive(Default)]
    struct RecordingMap {
        ready: bool,
        markers: Vec<(f64, f64, String)>,
        center: Option<(f64, f64, f32)>,
        renders: usize,
    }

    impl MapRenderer for RecordingMap {
        fn ready(&self) -> bool {
            self.ready
        }

        fn clear_markers(&mut self) {
            self.markers.clear();
        }

        fn add_marker(&mut self, latitude: f64, longitude: f64, label: &str) {
            self.markers.push((latitude, longitude, label.to_string()));
            self.renders += 1;
        }

        fn center_on(&mut self, latitude: f64, longitude: f64, zoom: f32) {
            self.center = Some((latitude, longitude, zoom));
        }
    }

    fn ready_map() -> RecordingMap {
        RecordingMap {
            ready: true,
            ..RecordingMap::default()
        }
    }

    #[test]
    fn places_single_marker_and_centers() {
        let mut sink = PositionSink::new(ready_map());
        sink.on_position(Some(Position::new(39.92, 32.85)));

        let map = sink.renderer();
        assert_eq!(map.markers, vec![(39.92, 32.85, "Location".to_string())]);
        assert_eq!(map.center, Some((39.92, 32.85, 12.0)));
        assert_eq!(sink.rendered(), Some(Position::new(39.92, 32.85)));
    }

    #[test]
    fn duplicate_positions_leave_one_marker() {
        let mut sink = PositionSink::new(ready_map());
        sink.on_position(Some(Position::new(1.0, 2.0)));
        sink.on_position(Some(Position::new(1.0, 2.0)));
        assert_eq!(sink.renderer().markers.len(), 1);
    }

    #[test]
    fn new_position_replaces_marker() {
        let mut sink = PositionSink::with_view(ready_map(), 15.0, "Device");
        sink.on_position(Some(Position::new(1.0, 2.0)));
        sink.on_position(Some(Position::new(3.0, 4.0)));
        assert_eq!(
            sink.renderer().markers,
            vec![(3.0, 4.0, "Device".to_string())]
        );
        assert_eq!(sink.renderer().center, Some((3.0, 4.0, 15.0)));
    }

    #[test]
    fn absent_position_keeps_last_marker() {
        let mut sink = PositionSink::new(ready_map());
        sink.on_position(Some(Position::new(1.0, 2.0)));
        sink.on_position(None);
        assert_eq!(sink.renderer().markers.len(), 1);
        assert_eq!(sink.rendered(), Some(Position::new(1.0, 2.0)));
    }

    #[test]
    fn buffers_latest_position_until_map_is_ready() {
        let mut sink = PositionSink::new(RecordingMap::default());
        sink.on_position(Some(Position::new(1.0, 2.0)));
        sink.on_position(Some(Position::new(3.0, 4.0)));
        assert!(sink.renderer().markers.is_empty());
        assert_eq!(sink.pending(), Some(Position::new(3.0, 4.0)));

        sink.on_map_ready();
        assert!(sink.renderer().markers.is_empty());

        sink.renderer_mut().ready = true;
        sink.on_map_ready();
        sink.on_map_ready();

        assert_eq!(sink.renderer().renders, 1);
        assert_eq!(
            sink.renderer().markers,
            vec![(3.0, 4.0, "Location".to_string())]
        );
        assert_eq!(sink.pending(), None);
    }

    #[test]
    fn direct_render_discards_older_buffered_position() {
        let mut sink = PositionSink::new(RecordingMap::default());
        sink.on_position(Some(Position::new(1.0, 2.0)));

        sink.renderer_mut().ready = true;
        sink.on_position(Some(Position::new(3.0, 4.0)));
        assert_eq!(sink.pending(), None);

        sink.on_map_ready();
        assert_eq!(sink.rendered(), Some(Position::new(3.0, 4.0)));
        assert_eq!(
            sink.renderer().markers,
            vec![(3.0, 4.0, "Location".to_string())]
        );
        assert_eq!(sink.renderer().renders, 1);
    }

    #[test]
    fn status_text_variants() {
        assert_eq!(
            status_text(&Ok(Position::new(39.92, 32.85))),
            "Latitude: 39.92\nLongitude: 32.85"
        );
        assert_eq!(
            status_text(&Err(SyncError::decode(&gps_path(), "missing"))),
            "GPS data is incomplete."
        );
        assert_eq!(
            status_text(&Err(SyncError::not_found(&gps_path()))),
            "GPS data is not available."
        );
        assert!(
            status_text(&Err(SyncError::Store(StoreError::Network("offline".into()))))
                .starts_with("Could not load GPS data")
        );
    }
}
