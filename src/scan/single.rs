use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::ConnectionReading;

/// Parse `airport -I` output from macOS.
///
/// Returns `None` when no numeric `agrCtlRSSI` line is present.
pub fn parse_airport(output: &str) -> Option<ConnectionReading> {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    let (ssid_re, rssi_re) = PATTERNS.get_or_init(|| {
        (
            Regex::new(r"^SSID:\s*(.*)$").expect("airport ssid regex must compile"),
            Regex::new(r"^agrCtlRSSI:\s*(-?\d+)$").expect("airport rssi regex must compile"),
        )
    });
    let mut ssid = None;
    let mut rssi = None;
    for line in output.lines().map(str::trim) {
        if let Some(caps) = ssid_re.captures(line) {
            ssid = caps.get(1).map(|m| m.as_str().trim().to_string());
        }
        if let Some(value) = rssi_re
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
        {
            rssi = Some(value);
        }
    }
    Some(ConnectionReading {
        ssid,
        rssi_dbm: rssi?,
    })
}

#[derive(Debug, Deserialize)]
struct TermuxConnectionInfo {
    ssid: Option<String>,
    rssi: Option<f64>,
}

/// Parse `termux-wifi-connectioninfo` JSON from Android.
pub fn parse_termux(output: &str) -> Option<ConnectionReading> {
    let text = if output.trim().is_empty() { "{}" } else { output };
    let info: TermuxConnectionInfo = serde_json::from_str(text).ok()?;
    Some(ConnectionReading {
        ssid: info.ssid,
        rssi_dbm: info.rssi.filter(|v| v.is_finite())?,
    })
}
