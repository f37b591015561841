use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::{
    poller::{PollPhase, TrackerState},
    position::{Coordinates, Position},
};

pub const DEFAULT_ZOOM: u8 = 13;
pub const DEFAULT_HISTORY_OPACITY: f32 = 0.5;

/// Marker images used by the map widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSet {
    pub icon_url: String,
    pub icon_retina_url: String,
    pub shadow_url: String,
}

impl Default for IconSet {
    fn default() -> Self {
        Self {
            icon_url: "https://unpkg.com/leaflet@1.7.1/dist/images/marker-icon.png".into(),
            icon_retina_url: "https://unpkg.com/leaflet@1.7.1/dist/images/marker-icon-2x.png"
                .into(),
            shadow_url: "https://unpkg.com/leaflet@1.7.1/dist/images/marker-shadow.png".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayer {
    pub url: String,
    pub attribution: String,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors".into(),
        }
    }
}

/// Presentation settings, built once at startup and passed to every
/// [`MapView::from_state`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub zoom: u8,
    pub tiles: TileLayer,
    pub icons: IconSet,
    /// Opacity of the history markers, the current marker being opaque.
    pub history_opacity: f32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            tiles: TileLayer::default(),
            icons: IconSet::default(),
            history_opacity: DEFAULT_HISTORY_OPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub title: String,
    /// Latitude with six decimals.
    pub latitude: String,
    /// Longitude with six decimals.
    pub longitude: String,
    /// Local time of the last fix, or `N/A`.
    pub last_update: String,
    pub updating: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Coordinates,
    pub opacity: f32,
    pub icons: IconSet,
    pub popup: Option<Popup>,
}

/// Overlay shown on top of the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Banner {
    Loading,
    Error(String),
}

impl Banner {
    pub fn message(&self) -> String {
        match self {
            Banner::Loading => "Loading GPS data...".to_string(),
            Banner::Error(err) => format!("Error: {err}"),
        }
    }
}

/// Everything the map widget needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinates,
    pub zoom: u8,
    pub tiles: TileLayer,
    /// Current position first, then the history oldest first.
    pub markers: Vec<Marker>,
    pub connected: bool,
    pub banner: Option<Banner>,
}

impl MapView {
    pub fn from_state(state: &TrackerState, style: &MapStyle) -> Self {
        let fetching = state.phase == PollPhase::Fetching;

        let current = Marker {
            position: state.position,
            opacity: 1.0,
            icons: style.icons.clone(),
            popup: Some(Popup {
                title: "Bus position".to_string(),
                latitude: format!("{:.6}", state.position.latitude),
                longitude: format!("{:.6}", state.position.longitude),
                last_update: last_update(state),
                updating: fetching,
            }),
        };

        let history = state.history.iter().map(|position| Marker {
            position: position.coordinates(),
            opacity: style.history_opacity,
            icons: style.icons.clone(),
            popup: None,
        });

        let banner = if fetching {
            Some(Banner::Loading)
        } else {
            state.last_error.clone().map(Banner::Error)
        };

        Self {
            center: state.position,
            zoom: style.zoom,
            tiles: style.tiles.clone(),
            markers: std::iter::once(current).chain(history).collect(),
            connected: state.connected,
            banner,
        }
    }
}

/// Time of the freshest fix: the latest endpoint first, the history otherwise.
fn last_update(state: &TrackerState) -> String {
    state
        .latest
        .as_ref()
        .or(state.history.last())
        .map(local_time)
        .unwrap_or_else(|| "N/A".to_string())
}

fn local_time(position: &Position) -> String {
    position
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::MockSource,
        poller::{HistoryMode, PollerConfig, PositionPoller},
    };
    use chrono::{DateTime, Utc};

    fn position(latitude: f64, longitude: f64) -> Position {
        position_at(latitude, longitude, 1_740_817_800)
    }

    fn position_at(latitude: f64, longitude: f64, seconds: i64) -> Position {
        let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0).unwrap();
        Position::new(latitude, longitude, timestamp).unwrap()
    }

    #[tokio::test]
    async fn view_of_fresh_poller() {
        let poller = PositionPoller::new(MockSource::new(), PollerConfig::default());
        let view = MapView::from_state(poller.state(), &MapStyle::default());

        assert_eq!(view.center.as_array(), [36.8065, 10.1815]);
        assert_eq!(view.zoom, 13);
        assert_eq!(view.markers.len(), 1);
        assert_eq!(view.banner, None);

        let popup = view.markers[0].popup.as_ref().unwrap();
        assert_eq!(popup.latitude, "36.806500");
        assert_eq!(popup.longitude, "10.181500");
        assert_eq!(popup.last_update, "N/A");
    }

    #[tokio::test]
    async fn history_markers_are_faded() {
        let source = MockSource::new();
        source.set_latest(Ok(position(36.8, 10.2)));
        source.set_all(Ok(vec![position(36.7, 10.1), position(36.75, 10.15)]));
        let config = PollerConfig {
            mode: HistoryMode::Full,
            ..PollerConfig::default()
        };
        let mut poller = PositionPoller::new(source, config);
        poller.poll_cycle().await;

        let view = MapView::from_state(poller.state(), &MapStyle::default());

        assert_eq!(view.center.as_array(), [36.8, 10.2]);
        assert_eq!(view.markers.len(), 3);
        assert_eq!(view.markers[0].opacity, 1.0);
        assert!(view.markers[1..].iter().all(|m| m.opacity == DEFAULT_HISTORY_OPACITY));
        assert!(view.markers[1..].iter().all(|m| m.popup.is_none()));
        assert_ne!(view.markers[0].popup.as_ref().unwrap().last_update, "N/A");
    }

    #[tokio::test]
    async fn popup_time_comes_from_latest_fix() {
        let latest = position_at(36.8, 10.2, 1_740_817_900);
        let source = MockSource::new();
        source.set_latest(Ok(latest.clone()));
        // History served newest first, so its last entry is the oldest.
        source.set_all(Ok(vec![
            position_at(36.79, 10.19, 1_740_817_890),
            position_at(36.7, 10.1, 1_740_817_000),
        ]));
        let config = PollerConfig {
            mode: HistoryMode::Full,
            ..PollerConfig::default()
        };
        let mut poller = PositionPoller::new(source, config);
        poller.poll_cycle().await;

        let view = MapView::from_state(poller.state(), &MapStyle::default());

        let popup = view.markers[0].popup.as_ref().unwrap();
        assert_eq!(popup.last_update, local_time(&latest));
    }

    #[tokio::test]
    async fn popup_time_falls_back_to_history() {
        let oldest = position_at(36.7, 10.1, 1_740_817_000);
        let source = MockSource::new();
        source.set_all(Ok(vec![oldest.clone()]));
        let config = PollerConfig {
            mode: HistoryMode::Full,
            ..PollerConfig::default()
        };
        let mut poller = PositionPoller::new(source, config);
        poller.poll_cycle().await;

        let view = MapView::from_state(poller.state(), &MapStyle::default());

        let popup = view.markers[0].popup.as_ref().unwrap();
        assert_eq!(popup.last_update, local_time(&oldest));
    }

    #[tokio::test]
    async fn failed_fetch_shows_error_banner() {
        let mut poller = PositionPoller::new(MockSource::new(), PollerConfig::default());
        poller.poll_cycle().await;

        let view = MapView::from_state(poller.state(), &MapStyle::default());

        assert!(!view.connected);
        assert_eq!(
            view.banner.map(|banner| banner.message()),
            Some("Error: unexpected HTTP status 500".to_string())
        );
    }
}
