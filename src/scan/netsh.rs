//! Parser for `netsh wlan show networks mode=bssid` listings.
//!
//! The listing nests BSSID blocks under SSID headers:
//!
//! ```text
//! SSID 1 : HomeNet
//!     Network type            : Infrastructure
//!     BSSID 1                 : aa:bb:cc:dd:ee:01
//!          Signal             : 82%
//!     BSSID 2                 : aa:bb:cc:dd:ee:02
//!          Signal             : 40%
//! ```
//!
//! Each `Signal` line yields one reading for the SSID and BSSID seen most
//! recently above it.

use std::sync::OnceLock;

use regex::Regex;

use super::{HIDDEN_SSID, NetworkReading, ScanError};

/// Lower-case phrases netsh prints when it refuses to list networks.
const PERMISSION_PHRASES: [&str; 2] = ["requires elevation", "location permission"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserState {
    SeekingSsid,
    HaveSsid { ssid: String },
    HaveBssid { ssid: String, bssid: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'a> {
    Ssid(&'a str),
    Bssid(&'a str),
    Signal(u32),
    Other,
}

struct Patterns {
    ssid: Regex,
    bssid: Regex,
    signal: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        ssid: Regex::new(r"(?i)^SSID\s+\d+\s*:\s*(.*)$").expect("ssid regex must compile"),
        bssid: Regex::new(r"(?i)^BSSID\s+\d+\s*:\s*([0-9a-f:]{17})$")
            .expect("bssid regex must compile"),
        signal: Regex::new(r"(?i)^Signal\s*:\s*(\d+)%$").expect("signal regex must compile"),
    })
}

fn classify(line: &str) -> Line<'_> {
    let patterns = patterns();
    if let Some(caps) = patterns.ssid.captures(line) {
        return Line::Ssid(caps.get(1).map_or("", |m| m.as_str().trim()));
    }
    if let Some(caps) = patterns.bssid.captures(line) {
        return caps.get(1).map_or(Line::Other, |m| Line::Bssid(m.as_str()));
    }
    if let Some(percent) = patterns
        .signal
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return Line::Signal(percent);
    }
    Line::Other
}

/// True when the output says the scan needs elevation or location access.
pub fn indicates_permission_error(output: &str) -> bool {
    let lower = output.to_lowercase();
    PERMISSION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Turn a netsh network listing into one reading per reported signal.
///
/// Unrecognised lines are ignored. Output that reports a permission problem
/// yields [`ScanError::PermissionDenied`] without any partial readings.
pub fn parse_networks(output: &str) -> Result<Vec<NetworkReading>, ScanError> {
    if indicates_permission_error(output) {
        return Err(ScanError::PermissionDenied);
    }
    let mut readings = Vec::new();
    let mut state = ParserState::SeekingSsid;
    for raw in output.lines() {
        state = match (classify(raw.trim()), state) {
            (Line::Ssid(label), _) => {
                let ssid = if label.is_empty() { HIDDEN_SSID } else { label };
                ParserState::HaveSsid {
                    ssid: ssid.to_string(),
                }
            }
            (Line::Bssid(mac), ParserState::HaveSsid { ssid })
            | (Line::Bssid(mac), ParserState::HaveBssid { ssid, .. }) => ParserState::HaveBssid {
                ssid,
                bssid: mac.to_string(),
            },
            (Line::Signal(percent), ParserState::HaveSsid { ssid }) => {
                readings.push(NetworkReading::new(ssid.clone(), None, percent));
                ParserState::HaveSsid { ssid }
            }
            (Line::Signal(percent), ParserState::HaveBssid { ssid, bssid }) => {
                readings.push(NetworkReading::new(ssid.clone(), Some(bssid.clone()), percent));
                ParserState::HaveBssid { ssid, bssid }
            }
            (_, state) => state,
        };
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Interface name : Wi-Fi
There are 3 networks currently visible.

SSID 1 : HomeNet
    Network type            : Infrastructure
    Authentication          : WPA2-Personal
    Encryption              : CCMP
    BSSID 1                 : AA:bb:cc:dd:ee:01
         Signal             : 82%
         Radio type         : 802.11ac
         Channel            : 44
    BSSID 2                 : aa:bb:cc:dd:ee:02
         Signal             : 40%

SSID 2 :
    Network type            : Infrastructure
    BSSID 1                 : 11:22:33:44:55:66
         Signal             : 100%

SSID 3 : Cafe Guest
    Network type            : Infrastructure
         Signal             : 0%
";

    #[test]
    fn parses_one_reading_per_bssid_signal() {
        let readings = parse_networks(LISTING).unwrap();
        assert_eq!(readings.len(), 4);

        assert_eq!(readings[0].ssid, "HomeNet");
        assert_eq!(readings[0].bssid.as_deref(), Some("AA:bb:cc:dd:ee:01"));
        assert_eq!(readings[0].signal_percent, 82);
        assert_eq!(readings[0].rssi_dbm, -59.0);

        assert_eq!(readings[1].bssid.as_deref(), Some("aa:bb:cc:dd:ee:02"));
        assert_eq!(readings[1].rssi_dbm, -80.0);

        assert_eq!(readings[2].ssid, HIDDEN_SSID);
        assert_eq!(readings[2].rssi_dbm, -50.0);

        assert_eq!(readings[3].ssid, "Cafe Guest");
        assert_eq!(readings[3].bssid, None);
        assert_eq!(readings[3].rssi_dbm, -100.0);
    }

    #[test]
    fn new_ssid_clears_previous_bssid() {
        let text = "SSID 1 : A\nBSSID 1 : 00:11:22:33:44:55\nSSID 2 : B\nSignal : 60%\n";
        let readings = parse_networks(text).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].ssid, "B");
        assert_eq!(readings[0].bssid, None);
        assert_eq!(readings[0].rssi_dbm, -70.0);
    }

    #[test]
    fn signal_before_any_ssid_is_ignored() {
        let text = "Signal : 90%\nBSSID 1 : 00:11:22:33:44:55\nSignal : 50%\n";
        assert!(parse_networks(text).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "SSID 1 : Lab\nBSSID 1 : not-a-mac\nSignal : high\nSignal : 70%\n";
        let readings = parse_networks(text).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].bssid, None);
        assert_eq!(readings[0].signal_percent, 70);
    }

    #[test]
    fn permission_errors_short_circuit() {
        let text = "The hosted network couldn't be started.\n\
                    This command REQUIRES ELEVATION (Run as administrator).\n\
                    SSID 1 : Visible\nSignal : 99%\n";
        assert!(matches!(parse_networks(text), Err(ScanError::PermissionDenied)));
        assert!(indicates_permission_error(
            "netsh needs Location Permission to list networks"
        ));
        assert!(!indicates_permission_error(LISTING));
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(parse_networks(LISTING).unwrap(), parse_networks(LISTING).unwrap());
    }
}
