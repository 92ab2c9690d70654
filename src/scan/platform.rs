use std::io::ErrorKind;
use std::process::Command;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::geo::Locate;
use crate::samples::RawSampleRow;

use super::{ConnectionReading, NetworkReading, ScanError, netsh, parse_airport, parse_termux, strongest};

const AIRPORT: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";
const TERMUX_INFO: &str = "termux-wifi-connectioninfo";

fn run_command(program: &str, args: &[&str]) -> Result<String, ScanError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| match source.kind() {
            ErrorKind::NotFound => ScanError::CommandUnavailable(program.to_string()),
            _ => ScanError::CommandFailed {
                command: program.to_string(),
                source,
            },
        })?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// List every visible network. Only Windows exposes a multi-network listing.
pub fn scan_all() -> Result<Vec<NetworkReading>, ScanError> {
    if !cfg!(target_os = "windows") {
        return Err(ScanError::UnsupportedPlatform);
    }
    let output = run_command("netsh", &["wlan", "show", "networks", "mode=bssid"])?;
    let readings = netsh::parse_networks(&output)?;
    tracing::debug!(networks = readings.len(), "parsed netsh listing");
    Ok(readings)
}

/// Signal of the network this machine would report right now.
///
/// Termux is tried first when present, then the platform scanner.
pub fn current_connection() -> Result<ConnectionReading, ScanError> {
    match run_command(TERMUX_INFO, &[]) {
        Ok(output) => {
            if let Some(reading) = parse_termux(&output) {
                return Ok(reading);
            }
        }
        Err(err) => tracing::trace!(%err, "termux scanner not usable"),
    }
    if cfg!(target_os = "windows") {
        let readings = scan_all()?;
        strongest(&readings)
            .cloned()
            .map(ConnectionReading::from)
            .ok_or(ScanError::NoReading)
    } else if cfg!(target_os = "macos") {
        parse_airport(&run_command(AIRPORT, &["-I"])?).ok_or(ScanError::NoReading)
    } else {
        Err(ScanError::UnsupportedPlatform)
    }
}

/// Combine a reading with a location into a sample log row.
///
/// `location` wins when given; otherwise `locator` is asked and the
/// coordinates stay empty if it has no answer.
pub fn build_row(
    reading: &ConnectionReading,
    location: Option<(f64, f64)>,
    locator: &dyn Locate,
    timestamp: String,
) -> RawSampleRow {
    let position = location.or_else(|| locator.locate());
    RawSampleRow::from_values(
        timestamp,
        reading.ssid.clone().unwrap_or_default(),
        Some(reading.rssi_dbm),
        position.map(|(lat, _)| lat),
        position.map(|(_, lon)| lon),
    )
}

/// Take one reading and turn it into a timestamped row.
pub fn scan_once(
    location: Option<(f64, f64)>,
    locator: &dyn Locate,
) -> Result<RawSampleRow, ScanError> {
    let reading = current_connection()?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let row = build_row(&reading, location, locator, timestamp);
    tracing::info!(ssid = %row.ssid, rssi = reading.rssi_dbm, "recorded scan");
    Ok(row)
}
