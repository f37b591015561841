use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::{error::FetchError, position::Position};

pub const DEFAULT_BASE_URL: &str = "https://gps-application-latest.onrender.com/api/gps";

/// A remote service reporting the bus position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Fetches the most recent known position.
    async fn latest(&self) -> Result<Position, FetchError>;

    /// Fetches every recorded position, oldest first.
    async fn all(&self) -> Result<Vec<Position>, FetchError>;
}

/// A [`PositionSource`] backed by the HTTP API.
///
/// Requests go to `{base_url}/latest` and `{base_url}/all`, carry no body,
/// headers or query parameters, and fail after `timeout`.
#[derive(Debug, Clone)]
pub struct HttpPositionSource {
    client: Client,
    latest_url: String,
    all_url: String,
}

impl HttpPositionSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/');

        Ok(Self {
            client,
            latest_url: format!("{base_url}/latest"),
            all_url: format!("{base_url}/all"),
        })
    }

    pub fn latest_url(&self) -> &str {
        &self.latest_url
    }

    pub fn all_url(&self) -> &str {
        &self.all_url
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl PositionSource for HttpPositionSource {
    async fn latest(&self) -> Result<Position, FetchError> {
        let body = self.get(&self.latest_url).await?;
        Position::from_json(&body)
    }

    async fn all(&self) -> Result<Vec<Position>, FetchError> {
        let body = self.get(&self.all_url).await?;
        Position::list_from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let source = HttpPositionSource::new("http://localhost:8080/api/gps/", Duration::from_secs(1))
            .unwrap();

        assert_eq!(source.latest_url(), "http://localhost:8080/api/gps/latest");
        assert_eq!(source.all_url(), "http://localhost:8080/api/gps/all");
    }
}
