//! Wi-Fi scan acquisition and parsing.
//!
//! Platform scan commands print free-form text; the parsers here turn that
//! text into typed readings and [`scan_once`] combines a reading with a
//! location into a row for the sample log.

pub mod netsh;
mod platform;
mod single;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use platform::{build_row, current_connection, scan_all, scan_once};
pub use single::{parse_airport, parse_termux};

/// Label used for networks that broadcast an empty SSID.
pub const HIDDEN_SSID: &str = "Hidden";

/// One network seen in a multi-network scan listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReading {
    pub ssid: String,
    /// Access point MAC address when the listing reported one.
    pub bssid: Option<String>,
    pub rssi_dbm: f64,
    pub signal_percent: u32,
}

impl NetworkReading {
    pub fn new(ssid: String, bssid: Option<String>, signal_percent: u32) -> Self {
        Self {
            ssid,
            bssid,
            rssi_dbm: percent_to_dbm(signal_percent),
            signal_percent,
        }
    }
}

/// Signal of the currently associated network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReading {
    pub ssid: Option<String>,
    pub rssi_dbm: f64,
}

impl From<NetworkReading> for ConnectionReading {
    fn from(reading: NetworkReading) -> Self {
        Self {
            ssid: Some(reading.ssid),
            rssi_dbm: reading.rssi_dbm,
        }
    }
}

/// Why a scan produced no readings.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scanning requires elevated privileges or location permission")]
    PermissionDenied,
    #[error("No Wi-Fi scanner is available on this platform")]
    UnsupportedPlatform,
    #[error("Scan command `{0}` is not available")]
    CommandUnavailable(String),
    #[error("Scan command `{command}` failed: {source}")]
    CommandFailed {
        command: String,
        source: std::io::Error,
    },
    #[error("Scan output contained no signal reading")]
    NoReading,
}

impl ScanError {
    /// Stable short code for API responses.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "admin_required",
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::CommandUnavailable(_) => "scanner_unavailable",
            Self::CommandFailed { .. } => "scan_failed",
            Self::NoReading => "no_reading",
        }
    }
}

/// Linear map of signal quality onto dBm: 0% is -100 dBm, 100% is -50 dBm.
pub fn percent_to_dbm(percent: u32) -> f64 {
    percent as f64 / 2.0 - 100.0
}

/// Reading with the highest RSSI.
pub fn strongest(readings: &[NetworkReading]) -> Option<&NetworkReading> {
    readings
        .iter()
        .max_by(|a, b| a.rssi_dbm.total_cmp(&b.rssi_dbm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_mapping_matches_reference_points() {
        assert_eq!(percent_to_dbm(100), -50.0);
        assert_eq!(percent_to_dbm(0), -100.0);
        assert_eq!(percent_to_dbm(60), -70.0);
        assert_eq!(percent_to_dbm(55), -72.5);
    }

    #[test]
    fn strongest_picks_highest_rssi() {
        let readings = vec![
            NetworkReading::new("a".into(), None, 30),
            NetworkReading::new("b".into(), None, 90),
            NetworkReading::new("c".into(), None, 60),
        ];
        assert_eq!(strongest(&readings).map(|r| r.ssid.as_str()), Some("b"));
        assert!(strongest(&[]).is_none());
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(ScanError::PermissionDenied.reason_code(), "admin_required");
        assert_eq!(ScanError::UnsupportedPlatform.reason_code(), "unsupported_platform");
    }
}
