use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FetchError;

pub type Degrees = f64;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, in degrees.
    pub latitude: Degrees,
    /// Longitude, in degrees.
    pub longitude: Degrees,
}

impl Coordinates {
    pub fn new(latitude: Degrees, longitude: Degrees) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns the point as `[latitude, longitude]`, the order map widgets expect.
    pub fn as_array(&self) -> [Degrees; 2] {
        [self.latitude, self.longitude]
    }
}

/// A GPS fix reported by the remote API.
///
/// Positions are validated when deserialized: both coordinates must be finite
/// and in range, and the timestamp must be either an RFC 3339 string or an
/// epoch value in milliseconds.
///
/// ```
/// use tracker::position::Position;
///
/// let body = br#"{"latitude": 36.8, "longitude": 10.2, "timestamp": "2025-03-01T08:30:00Z"}"#;
/// let position = Position::from_json(body).unwrap();
/// assert_eq!(position.coordinates().as_array(), [36.8, 10.2]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    pub latitude: Degrees,
    pub longitude: Degrees,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(
        latitude: Degrees,
        longitude: Degrees,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, InvalidPosition> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidPosition::Latitude(latitude));
        }

        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidPosition::Longitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
            timestamp,
        })
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Parses the body of the latest-position endpoint.
    pub fn from_json(body: &[u8]) -> Result<Self, FetchError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Parses the body of the history endpoint.
    pub fn list_from_json(body: &[u8]) -> Result<Vec<Self>, FetchError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Reason a decoded body was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidPosition {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

/// The position exactly as it appears on the wire.
#[derive(Deserialize)]
struct RawPosition {
    latitude: f64,
    longitude: f64,
    timestamp: RawTimestamp,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
    FractionalMillis(f64),
}

impl RawTimestamp {
    fn into_utc(self) -> Result<DateTime<Utc>, InvalidPosition> {
        match self {
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| InvalidPosition::Timestamp(text)),
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| InvalidPosition::Timestamp(ms.to_string())),
            RawTimestamp::FractionalMillis(ms) => {
                if !ms.is_finite() {
                    return Err(InvalidPosition::Timestamp(ms.to_string()));
                }

                DateTime::from_timestamp_millis(ms.trunc() as i64)
                    .ok_or_else(|| InvalidPosition::Timestamp(ms.to_string()))
            }
        }
    }
}

impl TryFrom<RawPosition> for Position {
    type Error = InvalidPosition;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        let timestamp = raw.timestamp.into_utc()?;
        Position::new(raw.latitude, raw.longitude, timestamp)
    }
}
