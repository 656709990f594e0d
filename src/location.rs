//! Location-fix provider for the enrichment form.
//!
//! This module is the "device sensor" of the workflow: [`read_position`]
//! returns the coordinates used to pre-fill the form when the user has not
//! typed any. The fix comes from IP geolocation (IpApi via `ipgeolocate`),
//! which is the closest thing a terminal app has to a location sensor.

use ipgeolocate::{Locator, Service};
use std::fmt;
use tracing::info;

/// A coordinate fix in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Why a fix could not be obtained.
///
/// `PermissionDenied` is the one condition surfaced to the user; every
/// other failure aborts the acquisition silently.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    PermissionDenied,
    Other(String),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::PermissionDenied => write!(f, "location permission denied"),
            SensorError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Resolves an approximate position for the given probe address.
///
/// On success returns the reported latitude and longitude. Service errors
/// that indicate a refused or quota-blocked request map to
/// [`SensorError::PermissionDenied`]; everything else, including a fix the
/// service reports with unparseable coordinates, is [`SensorError::Other`].
pub async fn read_position(probe_ip: &str) -> Result<Position, SensorError> {
    // Using IpApi as the service, it's pretty reliable.
    match Locator::get(probe_ip, Service::IpApi).await {
        Ok(loc) => {
            let latitude = loc
                .latitude
                .parse::<f64>()
                .map_err(|e| SensorError::Other(format!("bad latitude in fix: {}", e)))?;
            let longitude = loc
                .longitude
                .parse::<f64>()
                .map_err(|e| SensorError::Other(format!("bad longitude in fix: {}", e)))?;
            info!("Location fix acquired - ({}, {})", latitude, longitude);
            Ok(Position { latitude, longitude })
        }
        Err(e) => Err(classify(&e.to_string())),
    }
}

fn classify(msg: &str) -> SensorError {
    let lower = msg.to_lowercase();
    if lower.contains("denied") || lower.contains("forbidden") || lower.contains("quota") {
        SensorError::PermissionDenied
    } else {
        SensorError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_service_messages_classify_as_permission_errors() {
        assert_eq!(classify("request denied by service"), SensorError::PermissionDenied);
        assert_eq!(classify("HTTP 403 Forbidden"), SensorError::PermissionDenied);
        assert_eq!(
            classify("connection reset by peer"),
            SensorError::Other("connection reset by peer".to_string())
        );
    }
}
