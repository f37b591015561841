//! Keeps a bus position in sync with a remote GPS API and describes it as a
//! map for a rendering layer.

pub mod error;
pub mod history;
pub mod mock;
pub mod poller;
pub mod position;
pub mod source;
pub mod view;

pub use error::FetchError;
pub use poller::{HistoryMode, PollerConfig, PollerHandle, PositionPoller, TrackerState};
pub use position::{Coordinates, Position};
pub use source::{HttpPositionSource, PositionSource};
pub use view::{MapStyle, MapView};
