use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    error::FetchError,
    history::HistoryBuffer,
    position::{Coordinates, Position},
    source::PositionSource,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_CENTER: Coordinates = Coordinates {
    latitude: 36.8065,
    longitude: 10.1815,
};

/// How the history shown next to the current position is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Every successful latest fetch is appended to a buffer of at most
    /// `capacity` positions.
    Rolling { capacity: usize },
    /// Every cycle also fetches the full history, which replaces the buffer.
    Full,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between two poll cycles.
    pub interval: Duration,
    pub mode: HistoryMode,
    /// Point displayed until the first successful fetch.
    pub initial: Coordinates,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            mode: HistoryMode::Rolling {
                capacity: DEFAULT_HISTORY_CAPACITY,
            },
            initial: DEFAULT_CENTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollPhase {
    Idle,
    Fetching,
}

/// Snapshot of everything the rendering layer needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerState {
    /// The displayed point: the last successful fix, or the initial center.
    pub position: Coordinates,
    /// The last successfully fetched position.
    pub latest: Option<Position>,
    pub history: HistoryBuffer,
    /// Whether the most recent latest-position fetch succeeded.
    pub connected: bool,
    pub phase: PollPhase,
    pub last_error: Option<String>,
    /// Number of completed poll cycles.
    pub cycles: u64,
}

impl TrackerState {
    fn new(config: &PollerConfig) -> Self {
        let history = match config.mode {
            HistoryMode::Rolling { capacity } => HistoryBuffer::bounded(capacity),
            HistoryMode::Full => HistoryBuffer::unbounded(),
        };

        Self {
            position: config.initial,
            latest: None,
            history,
            connected: false,
            phase: PollPhase::Idle,
            last_error: None,
            cycles: 0,
        }
    }
}

/// Keeps a [`TrackerState`] in sync with a [`PositionSource`].
///
/// The poller can be driven by hand with [`poll_cycle`](PositionPoller::poll_cycle),
/// or moved into a background task with [`start`](PositionPoller::start).
/// Every state change is published to the receivers returned by
/// [`subscribe`](PositionPoller::subscribe).
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tracker::{
///     poller::{PollerConfig, PositionPoller},
///     source::{DEFAULT_BASE_URL, HttpPositionSource},
/// };
///
/// #[tokio::main]
/// async fn main() {
///     let source = HttpPositionSource::new(DEFAULT_BASE_URL, Duration::from_secs(10)).unwrap();
///     let handle = PositionPoller::new(source, PollerConfig::default()).start();
///
///     let mut states = handle.subscribe();
///     while states.changed().await.is_ok() {
///         let state = states.borrow_and_update().clone();
///         println!("{:?} (connected: {})", state.position, state.connected);
///     }
/// }
/// ```
pub struct PositionPoller<S> {
    source: S,
    config: PollerConfig,
    state: TrackerState,
    publisher: watch::Sender<TrackerState>,
}

impl<S: PositionSource> PositionPoller<S> {
    /// Creates an idle poller.
    ///
    /// # Panics
    ///
    /// Panics if `config.interval` is zero.
    pub fn new(source: S, config: PollerConfig) -> Self {
        assert!(!config.interval.is_zero(), "poll interval must be non-zero");

        let state = TrackerState::new(&config);
        let (publisher, _) = watch::channel(state.clone());

        Self {
            source,
            config,
            state,
            publisher,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.publisher.subscribe()
    }

    /// Fetches the latest position and applies the outcome to the state.
    ///
    /// On failure the displayed position is left untouched and the
    /// connection is marked as down.
    pub async fn fetch_latest(&mut self) -> Result<(), FetchError> {
        let response = self.source.latest().await;
        self.apply_latest(response)
    }

    /// Fetches the full history and replaces the buffer with it.
    ///
    /// On failure the buffer is left untouched.
    pub async fn fetch_history(&mut self) -> Result<(), FetchError> {
        let response = self.source.all().await;
        self.apply_history(response)
    }

    /// Runs one poll cycle. Errors are logged and never returned.
    ///
    /// Both responses are awaited before either is applied, so an abandoned
    /// cycle leaves the state as it was.
    pub async fn poll_cycle(&mut self) {
        self.set_phase(PollPhase::Fetching);

        let latest = self.source.latest().await;
        let history = match self.config.mode {
            HistoryMode::Full => Some(self.source.all().await),
            HistoryMode::Rolling { .. } => None,
        };

        if let Err(err) = self.apply_latest(latest) {
            warn!("Error fetching latest position: {err}");
        }

        if let Some(Err(err)) = history.map(|response| self.apply_history(response)) {
            warn!("Error fetching position history: {err}");
        }

        self.state.cycles += 1;
        self.set_phase(PollPhase::Idle);
    }

    fn apply_latest(&mut self, response: Result<Position, FetchError>) -> Result<(), FetchError> {
        match response {
            Ok(position) => {
                self.state.position = position.coordinates();
                if let HistoryMode::Rolling { .. } = self.config.mode {
                    self.state.history.push(position.clone());
                }
                self.state.latest = Some(position);
                self.state.connected = true;
                self.state.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.state.connected = false;
                self.state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn apply_history(
        &mut self,
        response: Result<Vec<Position>, FetchError>,
    ) -> Result<(), FetchError> {
        let positions = response?;
        debug!("Received {} historical positions", positions.len());
        self.state.history.replace(positions);
        Ok(())
    }

    /// Moves the poller into a background task.
    ///
    /// The first cycle runs immediately, then one runs every interval until
    /// the returned handle is stopped or dropped.
    pub fn start(self) -> PollerHandle
    where
        S: 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));

        PollerHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
            state,
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        info!("Polling position every {:?}", self.config.interval);

        let mut ticks = time::interval(self.config.interval);
        // A slow fetch must not cause a burst of catch-up cycles.
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticks.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Discarding in-flight poll cycle");
                    break;
                }
                _ = self.poll_cycle() => {}
            }
        }

        if self.state.phase == PollPhase::Fetching {
            self.set_phase(PollPhase::Idle);
        }

        info!("Position poller stopped after {} cycles", self.state.cycles);
    }

    fn set_phase(&mut self, phase: PollPhase) {
        self.state.phase = phase;
        self.publisher.send_replace(self.state.clone());
    }
}

/// Owned handle to a running [`PositionPoller`].
///
/// Dropping the handle stops the poller as well.
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<TrackerState>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state.clone()
    }

    /// Returns the most recently published state.
    pub fn current(&self) -> TrackerState {
        self.state.borrow().clone()
    }

    /// Stops the poller and waits for its task to finish.
    ///
    /// A fetch in flight is abandoned and its response never applied. No
    /// request is issued once this returns.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!("Position poller task failed: {err}");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
