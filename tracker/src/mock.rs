use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{error::FetchError, position::Position, source::PositionSource};

/// A scripted [`PositionSource`] that counts how often it is called.
///
/// Clones share the same script and counters, so a test can keep one clone
/// while the poller owns another.
#[derive(Debug, Clone)]
pub struct MockSource {
    latest: Arc<Mutex<Result<Position, FetchError>>>,
    all: Arc<Mutex<Result<Vec<Position>, FetchError>>>,
    delay: Arc<Mutex<Duration>>,
    latest_calls: Arc<AtomicUsize>,
    all_calls: Arc<AtomicUsize>,
}

impl MockSource {
    /// Creates a source that answers every request with HTTP 500 until scripted.
    pub fn new() -> Self {
        Self {
            latest: Arc::new(Mutex::new(Err(FetchError::HttpStatus(500)))),
            all: Arc::new(Mutex::new(Err(FetchError::HttpStatus(500)))),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
            latest_calls: Arc::new(AtomicUsize::new(0)),
            all_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_latest(&self, response: Result<Position, FetchError>) {
        *self.latest.lock().unwrap() = response;
    }

    pub fn set_all(&self, response: Result<Vec<Position>, FetchError>) {
        *self.all.lock().unwrap() = response;
    }

    /// Makes every later request wait `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    pub fn all_calls(&self) -> usize {
        self.all_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSource for MockSource {
    async fn latest(&self) -> Result<Position, FetchError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.latest.lock().unwrap().clone()
    }

    async fn all(&self) -> Result<Vec<Position>, FetchError> {
        self.all_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        self.all.lock().unwrap().clone()
    }
}
